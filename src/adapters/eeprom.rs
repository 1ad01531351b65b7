//! NVS-backed settings region.
//!
//! Implements [`EepromPort`] by keeping the whole settings region as a
//! single NVS blob.  `nvs_set_blob` + `nvs_commit` replace the blob in
//! one step, which gives the atomic whole-region commit the store needs.
//!
//! - **`target_os = "espidf"`**: namespace `thingnode`, key `settings`.
//! - **all other targets**: an in-memory blob.  Clones share the same
//!   blob so a test can "reboot" by opening a second store on a clone.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{EepromPort, StorageError};

#[cfg(not(target_os = "espidf"))]
use std::{cell::RefCell, rc::Rc};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const NAMESPACE: &[u8] = b"thingnode\0";
#[cfg(target_os = "espidf")]
const KEY: &[u8] = b"settings\0";

#[cfg_attr(not(target_os = "espidf"), derive(Clone))]
pub struct NvsRegion {
    size: usize,
    #[cfg(not(target_os = "espidf"))]
    blob: Rc<RefCell<Option<Vec<u8>>>>,
}

impl NvsRegion {
    /// Initialise NVS flash and expose a region of `size` bytes.
    ///
    /// On first boot or after a partition layout change the NVS partition
    /// is erased and re-initialised.
    pub fn new(size: usize) -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            info!("NvsRegion: {} bytes in NVS", size);
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsRegion: simulation backend ({} bytes)", size);

        Ok(Self {
            size,
            #[cfg(not(target_os = "espidf"))]
            blob: Rc::new(RefCell::new(None)),
        })
    }

    /// Open the namespace, run `f`, close.
    #[cfg(target_os = "espidf")]
    fn with_handle<T>(write: bool, f: impl FnOnce(nvs_handle_t) -> Result<T, i32>) -> Result<T, i32> {
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    /// Forget the stored region (factory reset).
    pub fn erase(&mut self) -> Result<(), StorageError> {
        #[cfg(target_os = "espidf")]
        {
            Self::with_handle(true, |handle| {
                let ret = unsafe { nvs_erase_key(handle, KEY.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                match unsafe { nvs_commit(handle) } {
                    ESP_OK => Ok(()),
                    e => Err(e),
                }
            })
            .map_err(|_| StorageError::IoError)
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.blob.borrow_mut().take();
            Ok(())
        }
    }
}

impl EepromPort for NvsRegion {
    fn size(&self) -> usize {
        self.size
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_handle(false, |handle| {
                let mut len = buf.len();
                let ret = unsafe {
                    nvs_get_blob(handle, KEY.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut len)
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(len)
            });
            match result {
                Ok(n) => Ok(n),
                // A missing namespace reports NOT_FOUND from nvs_open as well.
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(e) => {
                    warn!("NvsRegion: read error {}", e);
                    Err(StorageError::IoError)
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let stored = self.blob.borrow();
            let data = stored.as_ref().ok_or(StorageError::NotFound)?;
            let n = data.len().min(buf.len());
            buf[..n].copy_from_slice(&data[..n]);
            Ok(n)
        }
    }

    fn commit(&mut self, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > self.size {
            return Err(StorageError::Full);
        }

        #[cfg(target_os = "espidf")]
        {
            Self::with_handle(true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(handle, KEY.as_ptr() as *const _, data.as_ptr() as *const _, data.len())
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                match unsafe { nvs_commit(handle) } {
                    ESP_OK => Ok(()),
                    e => Err(e),
                }
            })
            .map_err(|e| {
                warn!("NvsRegion: write error {}", e);
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }

        #[cfg(not(target_os = "espidf"))]
        {
            *self.blob.borrow_mut() = Some(data.to_vec());
            Ok(())
        }
    }
}
