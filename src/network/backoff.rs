//! Fixed-floor retry timer keyed on the time of the last attempt.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    floor_ms: u64,
    last_attempt: Option<u64>,
}

impl Backoff {
    pub const fn new(floor_ms: u64) -> Self {
        Self {
            floor_ms,
            last_attempt: None,
        }
    }

    /// No attempt yet, or the floor has passed since the last one.
    pub fn ready(&self, now_ms: u64) -> bool {
        match self.last_attempt {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.floor_ms,
        }
    }

    pub fn record(&mut self, now_ms: u64) {
        self.last_attempt = Some(now_ms);
    }

    /// Forget the last attempt so the next opportunity fires immediately.
    pub fn reset(&mut self) {
        self.last_attempt = None;
    }

    pub fn last_attempt(&self) -> Option<u64> {
        self.last_attempt
    }
}
