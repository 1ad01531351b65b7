//! Device model consumed by the connectivity core.
//!
//! A [`Device`] owns an ordered list of [`Property`] values.  The core reads
//! and writes properties, describes them over HTTP and MQTT, and asks the
//! device whether its state is complete enough to publish.  What a device
//! actually does in [`Device::tick`] is its own business.

pub mod property;

use core::fmt;

pub use property::{Property, PropertyKind, PropertyValue, Visibility};

use crate::settings::{SettingsError, SettingsStore};

/// Outward channel a property may be exposed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Web,
    Mqtt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueError {
    Unparseable,
    WrongKind,
    ReadOnly,
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unparseable => write!(f, "value unparseable"),
            Self::WrongKind => write!(f, "value of wrong type"),
            Self::ReadOnly => write!(f, "property is read-only"),
        }
    }
}

pub trait Device {
    fn id(&self) -> &str;

    fn title(&self) -> &str;

    fn properties(&self) -> &[Property];

    fn properties_mut(&mut self) -> &mut [Property];

    /// Periodic MQTT push interval; `0` pushes only once after connect.
    fn push_interval_ms(&self) -> u64 {
        0
    }

    fn tick(&mut self, _now_ms: u64) {}

    fn provides_config_page(&self) -> bool {
        false
    }

    /// HTML fragment for `/device_{id}`.
    fn config_page(&self, _settings: &SettingsStore) -> String {
        String::new()
    }

    /// Apply the `/saveDeviceConfiguration_{id}` query to the settings.
    fn save_config_page(
        &mut self,
        _query: &[(String, String)],
        _settings: &mut SettingsStore,
    ) -> Result<(), SettingsError> {
        Ok(())
    }

    /// Called right before deep sleep.  Returning `false` cancels it.
    fn prepare_sleep(&mut self) -> bool {
        true
    }

    /// Every property carries a value.
    fn is_state_complete(&self) -> bool {
        self.properties().iter().all(|p| p.value.is_some())
    }

    /// Every web-visible property was read over HTTP since boot.
    fn all_properties_requested(&self) -> bool {
        self.properties()
            .iter()
            .filter(|p| p.is_visible(Channel::Web))
            .all(|p| p.requested)
    }

    fn is_visible(&self, channel: Channel) -> bool {
        self.properties().iter().any(|p| p.is_visible(channel))
    }

    fn property(&self, id: &str) -> Option<&Property> {
        self.properties().iter().find(|p| p.id == id)
    }

    fn property_mut(&mut self, id: &str) -> Option<&mut Property> {
        self.properties_mut().iter_mut().find(|p| p.id == id)
    }
}

/// Registered device plus the bookkeeping the core keeps for it.
pub struct DeviceSlot {
    pub device: Box<dyn Device>,
    /// Time of the last MQTT state push.
    pub last_push: Option<u64>,
}

impl DeviceSlot {
    pub fn new(device: Box<dyn Device>) -> Self {
        Self {
            device,
            last_push: None,
        }
    }

    /// Never pushed, or the push interval has elapsed.
    pub fn push_due(&self, now_ms: u64) -> bool {
        match self.last_push {
            None => true,
            Some(last) => {
                let interval = self.device.push_interval_ms();
                interval > 0 && now_ms.saturating_sub(last) >= interval
            }
        }
    }
}

/// Position of `id` in `slots`.
pub fn find_device(slots: &[DeviceSlot], id: &str) -> Option<usize> {
    slots.iter().position(|s| s.device.id() == id)
}
