//! Firmware image writer.
//!
//! Implements [`FlasherPort`] on top of the inactive OTA partition.
//!
//! - **`target_os = "espidf"`**: `esp_ota::OtaUpdate`.  `end` validates the
//!   image and marks the partition bootable; the new firmware runs after
//!   the next restart.
//! - **all other targets**: an in-memory image bounded by the announced
//!   size.

use log::{info, warn};

use crate::app::ports::{FlashError, FlasherPort};

pub struct OtaFlasher {
    capacity: u32,
    written: u32,
    #[cfg(target_os = "espidf")]
    update: Option<esp_ota::OtaUpdate>,
    #[cfg(not(target_os = "espidf"))]
    image: Option<Vec<u8>>,
    #[cfg(not(target_os = "espidf"))]
    last_image: Option<Vec<u8>>,
}

impl Default for OtaFlasher {
    fn default() -> Self {
        Self::new()
    }
}

impl OtaFlasher {
    pub fn new() -> Self {
        Self {
            capacity: 0,
            written: 0,
            #[cfg(target_os = "espidf")]
            update: None,
            #[cfg(not(target_os = "espidf"))]
            image: None,
            #[cfg(not(target_os = "espidf"))]
            last_image: None,
        }
    }

    /// Image accepted by the last successful `end`.
    #[cfg(not(target_os = "espidf"))]
    pub fn last_image(&self) -> Option<&[u8]> {
        self.last_image.as_deref()
    }

    fn is_open(&self) -> bool {
        #[cfg(target_os = "espidf")]
        {
            self.update.is_some()
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.image.is_some()
        }
    }
}

impl FlasherPort for OtaFlasher {
    fn begin(&mut self, size: u32) -> Result<(), FlashError> {
        self.abort();
        if size == 0 {
            return Err(FlashError::NotEnoughSpace);
        }

        #[cfg(target_os = "espidf")]
        {
            let update = esp_ota::OtaUpdate::begin().map_err(|e| {
                warn!("esp-ota begin failed: {:?}", e);
                FlashError::EraseFailed
            })?;
            self.update = Some(update);
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.image = Some(Vec::new());
        }

        self.capacity = size;
        self.written = 0;
        info!("Flasher: session open ({} bytes max)", size);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, FlashError> {
        if !self.is_open() {
            return Err(FlashError::NotStarted);
        }
        if self.written as usize + data.len() > self.capacity as usize {
            return Err(FlashError::NotEnoughSpace);
        }

        #[cfg(target_os = "espidf")]
        {
            if let Some(update) = self.update.as_mut() {
                update.write(data).map_err(|e| {
                    warn!("esp-ota write failed: {:?}", e);
                    FlashError::WriteFailed
                })?;
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            if let Some(image) = self.image.as_mut() {
                image.extend_from_slice(data);
            }
        }

        self.written += data.len() as u32;
        Ok(data.len())
    }

    fn end(&mut self) -> Result<(), FlashError> {
        #[cfg(target_os = "espidf")]
        {
            let update = self.update.take().ok_or(FlashError::NotStarted)?;
            let mut completed = update.finalize().map_err(|e| {
                warn!("esp-ota finalize failed: {:?}", e);
                FlashError::VerifyFailed
            })?;
            completed.set_as_boot_partition().map_err(|e| {
                warn!("esp-ota set_as_boot_partition failed: {:?}", e);
                FlashError::VerifyFailed
            })?;
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let image = self.image.take().ok_or(FlashError::NotStarted)?;
            if image.is_empty() {
                return Err(FlashError::VerifyFailed);
            }
            self.last_image = Some(image);
        }

        info!("Flasher: image of {} bytes accepted", self.written);
        Ok(())
    }

    fn abort(&mut self) {
        // esp-ota aborts the session when OtaUpdate is dropped.
        #[cfg(target_os = "espidf")]
        let open = self.update.take().is_some();
        #[cfg(not(target_os = "espidf"))]
        let open = self.image.take().is_some();
        if open {
            warn!("Flasher: session aborted after {} bytes", self.written);
        }
        self.written = 0;
    }
}
