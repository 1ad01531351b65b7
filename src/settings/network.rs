//! The network field set: identity, WiFi credentials and broker access.
//!
//! Registration order defines the persistent layout and must never change:
//!
//! | id                   | kind        | default              |
//! |----------------------|-------------|----------------------|
//! | `idx`                | String(32)  | lower-case client name |
//! | `ssid`               | String(32)  | ""                   |
//! | `password`           | String(64)  | ""                   |
//! | `supportingWebThing` | Boolean     | true                 |
//! | `supportingMqtt`     | Boolean     | false                |
//! | `mqttServer`         | String(32)  | ""                   |
//! | `mqttUser`           | String(32)  | ""                   |
//! | `mqttPassword`       | String(64)  | ""                   |
//! | `mqttTopic`          | String(64)  | current `idx`        |

use log::{info, warn};

use super::{SettingId, SettingValue, SettingsError, SettingsStore};

pub const IDX: &str = "idx";
pub const SSID: &str = "ssid";
pub const PASSWORD: &str = "password";
pub const SUPPORTING_WEBTHING: &str = "supportingWebThing";
pub const SUPPORTING_MQTT: &str = "supportingMqtt";
pub const MQTT_SERVER: &str = "mqttServer";
pub const MQTT_USER: &str = "mqttUser";
pub const MQTT_PASSWORD: &str = "mqttPassword";
pub const MQTT_TOPIC: &str = "mqttTopic";

/// Handles of the registered network fields.
#[derive(Debug, Clone, Copy)]
pub struct NetworkSettings {
    idx: SettingId,
    ssid: SettingId,
    password: SettingId,
    webthing: SettingId,
    mqtt: SettingId,
    mqtt_server: SettingId,
    mqtt_user: SettingId,
    mqtt_password: SettingId,
    mqtt_topic: SettingId,
}

/// What [`NetworkSettings::register`] found in the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Absent,
    Incomplete,
    Complete,
}

impl NetworkSettings {
    /// Register the field set (must be the first registration on `store`).
    pub fn register(store: &mut SettingsStore, client_name_lower: &str) -> Result<Self, SettingsError> {
        let idx = store.register_string(IDX, 32, client_name_lower)?;
        let ssid = store.register_string(SSID, 32, "")?;
        let password = store.register_string(PASSWORD, 64, "")?;
        let webthing = store.register_bool(SUPPORTING_WEBTHING, true)?;
        let mqtt = store.register_bool(SUPPORTING_MQTT, false)?;
        let mqtt_server = store.register_string(MQTT_SERVER, 32, "")?;
        let mqtt_user = store.register_string(MQTT_USER, 32, "")?;
        let mqtt_password = store.register_string(MQTT_PASSWORD, 64, "")?;
        let current_idx = store.string(IDX).to_owned();
        let mqtt_topic = store.register_string(MQTT_TOPIC, 64, &current_idx)?;

        let fields = Self {
            idx,
            ssid,
            password,
            webthing,
            mqtt,
            mqtt_server,
            mqtt_user,
            mqtt_password,
            mqtt_topic,
        };

        if store.exists_settings() && fields.mqtt_topic(store).is_empty() {
            store.set_string(MQTT_TOPIC, client_name_lower)?;
        }
        fields.log_outcome(store);
        Ok(fields)
    }

    fn text(store: &SettingsStore, handle: SettingId) -> &str {
        match store.value(handle) {
            Some(SettingValue::String(s)) => s,
            _ => "",
        }
    }

    fn flag(store: &SettingsStore, handle: SettingId) -> bool {
        matches!(store.value(handle), Some(SettingValue::Boolean(true)))
    }

    pub fn idx<'a>(&self, store: &'a SettingsStore) -> &'a str {
        Self::text(store, self.idx)
    }

    pub fn ssid<'a>(&self, store: &'a SettingsStore) -> &'a str {
        Self::text(store, self.ssid)
    }

    pub fn password<'a>(&self, store: &'a SettingsStore) -> &'a str {
        Self::text(store, self.password)
    }

    pub fn supports_webthing(&self, store: &SettingsStore) -> bool {
        Self::flag(store, self.webthing)
    }

    pub fn supports_mqtt(&self, store: &SettingsStore) -> bool {
        Self::flag(store, self.mqtt)
    }

    pub fn mqtt_server<'a>(&self, store: &'a SettingsStore) -> &'a str {
        Self::text(store, self.mqtt_server)
    }

    pub fn mqtt_user<'a>(&self, store: &'a SettingsStore) -> &'a str {
        Self::text(store, self.mqtt_user)
    }

    pub fn mqtt_password<'a>(&self, store: &'a SettingsStore) -> &'a str {
        Self::text(store, self.mqtt_password)
    }

    pub fn mqtt_topic<'a>(&self, store: &'a SettingsStore) -> &'a str {
        Self::text(store, self.mqtt_topic)
    }

    /// MQTT enabled with a broker and topic configured.
    pub fn mqtt_usable(&self, store: &SettingsStore) -> bool {
        self.supports_mqtt(store)
            && !self.mqtt_server(store).is_empty()
            && !self.mqtt_topic(store).is_empty()
    }

    /// A station network is known and at least one protocol can be used.
    pub fn is_complete(&self, store: &SettingsStore) -> bool {
        !self.ssid(store).is_empty()
            && ((self.supports_mqtt(store) && !self.mqtt_server(store).is_empty())
                || self.supports_webthing(store))
    }

    pub fn outcome(&self, store: &SettingsStore) -> LoadOutcome {
        if !store.exists_settings() {
            LoadOutcome::Absent
        } else if self.is_complete(store) {
            LoadOutcome::Complete
        } else {
            LoadOutcome::Incomplete
        }
    }

    fn log_outcome(&self, store: &SettingsStore) {
        match self.outcome(store) {
            LoadOutcome::Absent => warn!("Settings: none stored, configuration required"),
            LoadOutcome::Incomplete => warn!(
                "Settings: incomplete (ssid='{}', webthing={}, mqtt={})",
                self.ssid(store),
                self.supports_webthing(store),
                self.supports_mqtt(store)
            ),
            LoadOutcome::Complete => info!(
                "Settings: loaded (ssid='{}', webthing={}, mqtt={} server='{}' topic='{}')",
                self.ssid(store),
                self.supports_webthing(store),
                self.supports_mqtt(store),
                self.mqtt_server(store),
                self.mqtt_topic(store)
            ),
        }
    }
}
