//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements          | Connects to                     |
//! |---------------|---------------------|---------------------------------|
//! | `eeprom`      | EepromPort          | NVS blob / in-memory region     |
//! | `wifi`        | WifiPort            | ESP-IDF WiFi STA + soft AP      |
//! | `http_server` | HttpServerPort      | TCP listener (lwIP / host std)  |
//! | `dns`         | CaptiveDnsPort      | UDP responder on the soft AP    |
//! | `mqtt`        | MqttPort            | ESP-IDF MQTT client / loopback  |
//! | `mdns`        | DiscoveryPort       | ESP-IDF mDNS responder          |
//! | `flasher`     | FlasherPort         | OTA partition writer            |
//! | `system`      | SystemPort          | chip info, reset, deep sleep    |
//! | `log_sink`    | EventSink           | Serial log output               |
//! | `platform`    | Platform            | bundles all of the above        |
//! | `time`        | -                   | ESP32 system timer              |
//! | `device_id`   | -                   | factory MAC, generated names    |

pub mod device_id;
pub mod dns;
pub mod eeprom;
pub mod flasher;
pub mod http_server;
pub mod log_sink;
pub mod mdns;
pub mod mqtt;
pub mod platform;
pub mod system;
pub mod time;
pub(super) mod utils;
pub mod wifi;
