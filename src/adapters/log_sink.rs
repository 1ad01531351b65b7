//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing connectivity events to the
//! ESP-IDF logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::NetworkEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`NetworkEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &NetworkEvent) {
        match event {
            NetworkEvent::StationConnecting { ssid } => info!("WIFI  | connecting to '{}'", ssid),
            NetworkEvent::StationUp(ip) => info!("WIFI  | up, ip={}", ip),
            NetworkEvent::StationDown => warn!("WIFI  | down"),
            NetworkEvent::AssociationTimedOut => warn!("WIFI  | association timed out"),
            NetworkEvent::WebServerStarted { soft_ap: Some(ip) } => {
                info!("HTTP  | started, access point at {}", ip);
            }
            NetworkEvent::WebServerStarted { soft_ap: None } => info!("HTTP  | started"),
            NetworkEvent::WebServerStopped => info!("HTTP  | stopped"),
            NetworkEvent::ConfigurationFinished => info!("HTTP  | configuration finished"),
            NetworkEvent::MqttConnected => info!("MQTT  | connected"),
            NetworkEvent::MqttConnectFailed { rc } => warn!("MQTT  | connect failed, rc={}", rc),
            NetworkEvent::StatePushed { device } => info!("MQTT  | state of '{}' pushed", device),
            NetworkEvent::UpdateStarted { filename } => info!("OTA   | receiving '{}'", filename),
            NetworkEvent::UpdateFinished { ok: true } => info!("OTA   | image accepted"),
            NetworkEvent::UpdateFinished { ok: false } => warn!("OTA   | image rejected"),
            NetworkEvent::RestartRequested { reason } => info!("SYS   | restart: {}", reason),
            NetworkEvent::DeepSleep { secs } => info!("SYS   | deep sleep for {} s", secs),
            NetworkEvent::Notified => {}
        }
    }
}
