//! Firmware update sub-machine driven by the chunked HTTP upload.
//!
//! ```text
//!  Idle ──start──▶ InProgress ──finish(ok)──▶ Idle
//!                      │  write/begin/finish error
//!                      ▼
//!                    Error (first error kept, later chunks still written)
//! ```

use log::{info, warn};

use crate::app::ports::{FlashError, FlasherPort};

/// Space reserved at the end of the free region.
const RESERVED: u32 = 0x1000;
const SECTOR_MASK: u32 = 0xFFFF_F000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    InProgress,
    Error,
}

/// Erase size for an image: free space minus 4 KB, rounded down to 4 KB.
pub fn erase_size(free_sketch_space: u32) -> u32 {
    free_sketch_space.saturating_sub(RESERVED) & SECTOR_MASK
}

#[derive(Debug)]
pub struct FirmwareUpdate {
    state: UpdateState,
    error: Option<FlashError>,
    bytes_written: u32,
}

impl Default for FirmwareUpdate {
    fn default() -> Self {
        Self::new()
    }
}

impl FirmwareUpdate {
    pub const fn new() -> Self {
        Self {
            state: UpdateState::Idle,
            error: None,
            bytes_written: 0,
        }
    }

    pub fn state(&self) -> UpdateState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state != UpdateState::Idle
    }

    pub fn error(&self) -> Option<FlashError> {
        self.error
    }

    pub fn bytes_written(&self) -> u32 {
        self.bytes_written
    }

    fn fail(&mut self, e: FlashError) {
        if self.error.is_none() {
            warn!("Update: {}", e);
            self.error = Some(e);
        }
        self.state = UpdateState::Error;
    }

    /// Open a new image of [`erase_size`] bytes.
    pub fn start(&mut self, flasher: &mut dyn FlasherPort, free_sketch_space: u32, filename: &str) {
        if self.state == UpdateState::InProgress {
            flasher.abort();
        }
        self.state = UpdateState::InProgress;
        self.error = None;
        self.bytes_written = 0;

        let size = erase_size(free_sketch_space);
        info!("Update: starting '{}' ({} bytes available)", filename, size);
        if let Err(e) = flasher.begin(size) {
            self.fail(e);
        }
    }

    pub fn write(&mut self, flasher: &mut dyn FlasherPort, data: &[u8]) {
        if self.state == UpdateState::Idle {
            return;
        }
        match flasher.write(data) {
            Ok(n) if n == data.len() => self.bytes_written += n as u32,
            Ok(n) => {
                self.bytes_written += n as u32;
                self.fail(FlashError::WriteFailed);
            }
            Err(e) => self.fail(e),
        }
    }

    /// Verify and activate the image.  Returns the first error seen.
    pub fn finish(&mut self, flasher: &mut dyn FlasherPort) -> Result<(), FlashError> {
        match self.state {
            UpdateState::Idle => return Err(FlashError::NotStarted),
            UpdateState::InProgress => match flasher.end() {
                Ok(()) => {
                    info!("Update: complete ({} bytes)", self.bytes_written);
                    self.state = UpdateState::Idle;
                }
                Err(e) => self.fail(e),
            },
            UpdateState::Error => flasher.abort(),
        }
        self.error.map_or(Ok(()), Err)
    }

    /// Drop any session state before a reset.
    pub fn clear(&mut self) {
        self.state = UpdateState::Idle;
    }
}
