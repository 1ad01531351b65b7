//! Chip facts, delays, restart and deep sleep.
//!
//! Implements [`SystemPort`].  The simulation backend reports fixed
//! sizes and records restart / sleep requests instead of acting on them.

use log::info;
#[cfg(not(target_os = "espidf"))]
use log::debug;

use super::device_id::{chip_id, read_mac};
use crate::app::ports::SystemPort;

#[cfg(not(target_os = "espidf"))]
const SIM_FLASH_SIZE: u32 = 4 * 1024 * 1024;
#[cfg(not(target_os = "espidf"))]
const SIM_PARTITION_SIZE: u32 = 0x1E_0000;
#[cfg(not(target_os = "espidf"))]
const SIM_SKETCH_SIZE: u32 = 0xC_8000;

#[derive(Default)]
pub struct SystemAdapter {
    #[cfg(not(target_os = "espidf"))]
    restarts: u32,
    #[cfg(not(target_os = "espidf"))]
    sleeps: Vec<u32>,
}

impl SystemAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Requested deep-sleep durations, in seconds.
    #[cfg(not(target_os = "espidf"))]
    pub fn sleeps(&self) -> &[u32] {
        &self.sleeps
    }
}

#[cfg(target_os = "espidf")]
impl SystemPort for SystemAdapter {
    fn chip_id(&self) -> u32 {
        chip_id(&read_mac())
    }

    fn flash_chip_id(&self) -> u32 {
        let mut id: u32 = 0;
        // SAFETY: a null chip pointer selects the default SPI flash.
        unsafe {
            esp_idf_svc::sys::esp_flash_read_id(core::ptr::null_mut(), &mut id);
        }
        id
    }

    fn flash_chip_size(&self) -> u32 {
        let mut size: u32 = 0;
        // SAFETY: as above.
        unsafe {
            esp_idf_svc::sys::esp_flash_get_size(core::ptr::null_mut(), &mut size);
        }
        size
    }

    fn sketch_size(&self) -> u32 {
        // SAFETY: the running partition pointer is static for the
        // lifetime of the firmware.
        unsafe {
            let p = esp_idf_svc::sys::esp_ota_get_running_partition();
            if p.is_null() { 0 } else { (*p).size }
        }
    }

    fn free_sketch_space(&self) -> u32 {
        // SAFETY: a null start selects the partition after the running one.
        unsafe {
            let p = esp_idf_svc::sys::esp_ota_get_next_update_partition(core::ptr::null());
            if p.is_null() { 0 } else { (*p).size }
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(ms);
    }

    fn restart(&mut self) {
        info!("System: restarting");
        esp_idf_svc::hal::reset::restart();
    }

    fn deep_sleep(&mut self, secs: u32) {
        info!("System: deep sleep for {} s", secs);
        // SAFETY: plain ESP-IDF calls; esp_deep_sleep_start does not return.
        unsafe {
            esp_idf_svc::sys::esp_sleep_enable_timer_wakeup(u64::from(secs) * 1_000_000);
            esp_idf_svc::sys::esp_deep_sleep_start();
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl SystemPort for SystemAdapter {
    fn chip_id(&self) -> u32 {
        chip_id(&read_mac())
    }

    fn flash_chip_id(&self) -> u32 {
        0x16_40EF
    }

    fn flash_chip_size(&self) -> u32 {
        SIM_FLASH_SIZE
    }

    fn sketch_size(&self) -> u32 {
        SIM_SKETCH_SIZE
    }

    fn free_sketch_space(&self) -> u32 {
        SIM_PARTITION_SIZE
    }

    // Simulated time only advances through `tick`.
    fn delay_ms(&mut self, ms: u32) {
        debug!("System(sim): delay {} ms", ms);
    }

    fn restart(&mut self) {
        self.restarts += 1;
        info!("System(sim): restart #{}", self.restarts);
    }

    fn deep_sleep(&mut self, secs: u32) {
        self.sleeps.push(secs);
        info!("System(sim): deep sleep for {} s", secs);
    }
}
