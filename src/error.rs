//! Unified error types for the ThingNode connectivity core.
//!
//! Every subsystem error converts into [`Error`] so that construction and
//! the handful of fallible public calls share one shape.  Transient network
//! conditions never reach the caller of `Network::tick`; they are absorbed
//! by backoff and only show up in the log and on the status indicator.

use core::fmt;

use crate::app::ports::{FlashError, MqttError, StorageError, WifiError};
use crate::settings::SettingsError;
use crate::thing::ValueError;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// No usable network target: no SSID, or neither MQTT nor WebThing usable.
    ConfigurationIncomplete,
    /// Station association failed or timed out.
    NetworkUnavailable(WifiError),
    /// Broker handshake failed (carries the client return code).
    BrokerUnavailable(i32),
    /// Firmware upload could not be erased, written, or verified.
    UpdateFailure(FlashError),
    /// Inbound JSON or raw payload could not be applied.
    PayloadUnparseable(ValueError),
    /// Registered settings do not fit into the persistent region.
    StorageBounds { needed: usize, available: usize },
    /// Settings lookup or type error.
    Settings(SettingsError),
    /// Backing store read/commit failed.
    Storage(StorageError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigurationIncomplete => write!(f, "configuration incomplete"),
            Self::NetworkUnavailable(e) => write!(f, "network unavailable: {e}"),
            Self::BrokerUnavailable(rc) => write!(f, "broker unavailable (rc={rc})"),
            Self::UpdateFailure(e) => write!(f, "update failure: {e}"),
            Self::PayloadUnparseable(e) => write!(f, "payload unparseable: {e}"),
            Self::StorageBounds { needed, available } => write!(
                f,
                "settings need {needed} bytes, region has {available}"
            ),
            Self::Settings(e) => write!(f, "settings: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<SettingsError> for Error {
    fn from(e: SettingsError) -> Self {
        match e {
            SettingsError::OutOfSpace { needed, available } => {
                Self::StorageBounds { needed, available }
            }
            SettingsError::Storage(s) => Self::Storage(s),
            other => Self::Settings(other),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<WifiError> for Error {
    fn from(e: WifiError) -> Self {
        Self::NetworkUnavailable(e)
    }
}

impl From<MqttError> for Error {
    fn from(e: MqttError) -> Self {
        match e {
            MqttError::ConnectFailed(rc) => Self::BrokerUnavailable(rc),
            _ => Self::BrokerUnavailable(-1),
        }
    }
}

impl From<FlashError> for Error {
    fn from(e: FlashError) -> Self {
        Self::UpdateFailure(e)
    }
}

impl From<ValueError> for Error {
    fn from(e: ValueError) -> Self {
        Self::PayloadUnparseable(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
