//! Single-colour status LED on a GPIO.
//!
//! Implements [`StatusIndicatorPort`] over any `embedded_hal` output pin,
//! so the same driver runs on an `esp_idf_hal::gpio::PinDriver` and on a
//! recording pin in host tests.
//!
//! | Pattern | Meaning (set by the orchestrator) |
//! |---------|-----------------------------------|
//! | Off     | station connected                 |
//! | Solid   | configuration access point open   |
//! | Blink   | not connected                     |
//!
//! Blink toggles the pin every `blink_ms` from [`tick`](StatusLed::tick).
//! Pin write errors are logged once and otherwise ignored.

use embedded_hal::digital::OutputPin;
use log::{debug, warn};

use crate::app::ports::StatusIndicatorPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Off,
    Solid,
    Blink { period_ms: u32 },
}

pub struct StatusLed<P: OutputPin> {
    pin: P,
    /// Active-low wiring (LED between VCC and the pin).
    inverted: bool,
    pattern: Pattern,
    lit: bool,
    last_toggle: Option<u64>,
    write_failed: bool,
}

impl<P: OutputPin> StatusLed<P> {
    pub fn new(pin: P, inverted: bool) -> Self {
        let mut led = Self {
            pin,
            inverted,
            pattern: Pattern::Off,
            lit: false,
            last_toggle: None,
            write_failed: false,
        };
        led.drive(false);
        led
    }

    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    pub fn release(self) -> P {
        self.pin
    }

    fn drive(&mut self, lit: bool) {
        let high = lit != self.inverted;
        let result = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if result.is_err() && !self.write_failed {
            warn!("StatusLed: pin write failed");
            self.write_failed = true;
        }
        self.lit = lit;
    }
}

impl<P: OutputPin> StatusIndicatorPort for StatusLed<P> {
    fn set_on(&mut self, on: bool, blink_ms: u32) {
        let pattern = match (on, blink_ms) {
            (false, _) => Pattern::Off,
            (true, 0) => Pattern::Solid,
            (true, period_ms) => Pattern::Blink { period_ms },
        };
        if pattern == self.pattern {
            return;
        }
        debug!("StatusLed: {:?}", pattern);
        self.pattern = pattern;
        self.last_toggle = None;
        self.drive(on);
    }

    fn tick(&mut self, now_ms: u64) {
        let Pattern::Blink { period_ms } = self.pattern else {
            return;
        };
        match self.last_toggle {
            None => self.last_toggle = Some(now_ms),
            Some(t) if now_ms.saturating_sub(t) >= u64::from(period_ms) => {
                self.last_toggle = Some(now_ms);
                let lit = !self.lit;
                self.drive(lit);
            }
            Some(_) => {}
        }
    }
}
