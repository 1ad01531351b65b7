//! Outbound connectivity events.
//!
//! The [`Network`](crate::network::Network) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  The default adapter logs
//! them; a test sink records them for assertions.

use core::net::Ipv4Addr;

/// Structured events emitted by the connectivity core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// Association attempt started.
    StationConnecting { ssid: String },

    /// Station link is up with the given address.
    StationUp(Ipv4Addr),

    /// Station link dropped.
    StationDown,

    /// Association did not finish within the deep-sleep deadline.
    AssociationTimedOut,

    /// HTTP server is accepting requests; `soft_ap` carries the AP address
    /// when the configuration access point was opened.
    WebServerStarted { soft_ap: Option<Ipv4Addr> },

    WebServerStopped,

    /// Configuration server closed; the device leaves setup mode.
    ConfigurationFinished,

    MqttConnected,

    MqttConnectFailed { rc: i32 },

    /// A device's full state was published to the broker.
    StatePushed { device: String },

    UpdateStarted { filename: String },

    UpdateFinished { ok: bool },

    RestartRequested { reason: String },

    DeepSleep { secs: u32 },

    /// Status indicator re-evaluated after a connectivity change.
    Notified,
}
