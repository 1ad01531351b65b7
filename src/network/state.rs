//! Connectivity sub-states owned by the orchestrator.

use super::update::UpdateState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    /// Association under way; `deadline` is set only when deep sleep needs
    /// a known outcome.
    Connecting { deadline: Option<u64> },
    ConnectedStation,
    SoftApFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpServerState {
    Stopped,
    /// `things` is set when the WebThing routes are bound.
    Running { things: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttState {
    Disconnected,
    Connecting,
    Connected,
}

/// Device flagged for deep sleep after its full state went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeepSleepRequest {
    None,
    Pending(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    pub wifi: WifiState,
    pub http: HttpServerState,
    pub mqtt: MqttState,
    pub update: UpdateState,
    pub deep_sleep: DeepSleepRequest,
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityState {
    pub const fn new() -> Self {
        Self {
            wifi: WifiState::Disconnected,
            http: HttpServerState::Stopped,
            mqtt: MqttState::Disconnected,
            update: UpdateState::Idle,
            deep_sleep: DeepSleepRequest::None,
        }
    }

    pub fn is_web_server_running(&self) -> bool {
        matches!(self.http, HttpServerState::Running { .. })
    }

    pub fn is_soft_ap(&self) -> bool {
        self.wifi == WifiState::SoftApFallback
    }

    pub fn is_update_running(&self) -> bool {
        self.update != UpdateState::Idle
    }

    /// Station link usable for MQTT and discovery.
    pub fn is_station_connected(&self) -> bool {
        self.wifi == WifiState::ConnectedStation && !self.is_update_running()
    }

    pub fn is_mqtt_connected(&self) -> bool {
        self.mqtt == MqttState::Connected
    }
}
