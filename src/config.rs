//! Construction-time parameters and protocol constants.
//!
//! Runtime configuration (SSID, broker, topic, ...) lives in the
//! [`SettingsStore`](crate::settings::SettingsStore); this struct only holds
//! what the firmware image decides at build/boot time.

use serde::{Deserialize, Serialize};

/// Size of the persistent settings region in bytes.
pub const SETTINGS_REGION_SIZE: usize = 512;

/// Password of the configuration access point.
pub const SOFT_AP_PASSWORD: &str = "12345678";

pub const HTTP_PORT: u16 = 80;
pub const DNS_PORT: u16 = 53;
pub const MQTT_PORT: u16 = 1883;

/// Upper bound for generated client names and host names.
pub const CLIENT_NAME_MAX: usize = 32;

/// Requests dispatched per tick before yielding to the other stages.
pub const MAX_HTTP_REQUESTS_PER_TICK: usize = 4;

/// Inbound MQTT messages drained per tick.
pub const MAX_MQTT_MESSAGES_PER_TICK: usize = 8;

/// Connectivity core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    // --- Identity ---
    /// Verbose logging and "(debug)" marker in page captions
    pub debug: bool,
    /// Application name; base of the AP SSID and MQTT client id
    pub application_name: String,
    /// Firmware revision shown in page captions
    pub firmware_version: String,

    // --- Behaviour ---
    /// Open the configuration server when settings are missing or MQTT fails
    pub auto_start_web_server: bool,
    /// GPIO of the status LED, if one is fitted
    pub status_led_pin: Option<u8>,
    /// Deep-sleep duration after a full state push (0 = never sleep)
    pub deep_sleep_secs: u32,

    // --- Timing ---
    /// Minimum spacing between WiFi or MQTT connection attempts (ms)
    pub reconnect_backoff_ms: u64,
    /// Association deadline when deep sleep needs a known outcome (ms)
    pub association_timeout_ms: u64,
    /// Delay between stopping the server and resetting (ms)
    pub restart_grace_ms: u32,
    /// Delay between stopping the server and entering deep sleep (ms)
    pub sleep_grace_ms: u32,
    /// Status LED blink period while not connected (ms)
    pub status_blink_ms: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            debug: false,
            application_name: String::from("ThingNode"),
            firmware_version: String::from(env!("CARGO_PKG_VERSION")),

            auto_start_web_server: true,
            status_led_pin: None,
            deep_sleep_secs: 0,

            reconnect_backoff_ms: 300_000, // 5 min
            association_timeout_ms: 5_000,
            restart_grace_ms: 1_000,
            sleep_grace_ms: 500,
            status_blink_ms: 500,
        }
    }
}

impl NetworkConfig {
    /// Convenience constructor mirroring the firmware's boot parameters.
    pub fn new(
        debug: bool,
        application_name: &str,
        firmware_version: &str,
        auto_start_web_server: bool,
        status_led_pin: Option<u8>,
    ) -> Self {
        Self {
            debug,
            application_name: application_name.into(),
            firmware_version: firmware_version.into(),
            auto_start_web_server,
            status_led_pin,
            ..Self::default()
        }
    }
}
