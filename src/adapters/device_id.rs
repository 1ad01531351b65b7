//! Device identity derived from the ESP32 factory MAC address.
//!
//! - chip id: last 3 MAC bytes as a 24-bit number (stable across reboots)
//! - client name: `{application}_{chip id}`, used as soft-AP SSID and MQTT
//!   client id, and (lower-cased) as the default `idx`
//! - host name: the configured `idx` made DNS-safe

use core::fmt::Write;

use crate::config::CLIENT_NAME_MAX;

/// Client / host name buffer.
pub type NameString = heapless::String<CLIENT_NAME_MAX>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: the buffer is exactly 6 bytes as the API requires.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn chip_id(mac: &MacAddress) -> u32 {
    u32::from_be_bytes([0, mac[3], mac[4], mac[5]])
}

/// `{application}_{chip_id}`, prefix shortened to fit [`CLIENT_NAME_MAX`].
///
/// Spaces become `-`.  The lower-case form also drops the dashes.
pub fn client_name(application: &str, chip_id: u32, lower_case: bool) -> NameString {
    let app = if application.is_empty() {
        "ESP"
    } else {
        application
    };

    let mut suffix = heapless::String::<12>::new();
    let _ = write!(suffix, "_{}", chip_id);
    let room = CLIENT_NAME_MAX - suffix.len();

    let mut name = NameString::new();
    for c in app.chars() {
        let c = match c {
            ' ' if lower_case => continue,
            '-' if lower_case => continue,
            ' ' => '-',
            c if lower_case => c.to_ascii_lowercase(),
            c => c,
        };
        if name.len() + c.len_utf8() > room {
            break;
        }
        let _ = name.push(c);
    }
    let _ = name.push_str(&suffix);
    name
}

/// Station host name: `idx` with `.` and spaces turned into `-`, or the
/// upper-case client name when no `idx` is set.
pub fn host_name(idx: &str, application: &str, chip_id: u32) -> NameString {
    if idx.is_empty() {
        let mut name = client_name(application, chip_id, false);
        name.make_ascii_uppercase();
        return name;
    }
    let mut name = NameString::new();
    for c in idx.chars() {
        let c = if c == '.' || c == ' ' { '-' } else { c };
        if name.push(c).is_err() {
            break;
        }
    }
    name
}
