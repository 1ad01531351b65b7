//! The production [`Platform`]: one concrete adapter per port.

use crate::app::ports::{
    CaptiveDnsPort, DiscoveryPort, EventSink, FlasherPort, HttpServerPort, MqttPort, Platform,
    StatusIndicatorPort, SystemPort, WifiPort,
};

use super::dns::CaptiveDns;
use super::flasher::OtaFlasher;
use super::http_server::TcpHttpServer;
use super::log_sink::LogEventSink;
use super::mdns::MdnsAdapter;
use super::mqtt::MqttAdapter;
use super::system::SystemAdapter;
use super::wifi::WifiAdapter;

pub struct DevicePlatform {
    pub wifi: WifiAdapter,
    pub http: TcpHttpServer,
    pub dns: CaptiveDns,
    pub mqtt: MqttAdapter,
    pub discovery: MdnsAdapter,
    pub flasher: OtaFlasher,
    pub system: SystemAdapter,
    pub status_led: Option<Box<dyn StatusIndicatorPort>>,
    pub events: LogEventSink,
}

impl DevicePlatform {
    pub fn new(wifi: WifiAdapter, mqtt: MqttAdapter) -> Self {
        Self {
            wifi,
            http: TcpHttpServer::new(),
            dns: CaptiveDns::new(),
            mqtt,
            discovery: MdnsAdapter::new(),
            flasher: OtaFlasher::new(),
            system: SystemAdapter::new(),
            status_led: None,
            events: LogEventSink::new(),
        }
    }

    #[must_use]
    pub fn with_status_led(mut self, led: Box<dyn StatusIndicatorPort>) -> Self {
        self.status_led = Some(led);
        self
    }
}

impl Platform for DevicePlatform {
    fn wifi(&mut self) -> &mut dyn WifiPort {
        &mut self.wifi
    }

    fn http(&mut self) -> &mut dyn HttpServerPort {
        &mut self.http
    }

    fn dns(&mut self) -> &mut dyn CaptiveDnsPort {
        &mut self.dns
    }

    fn mqtt(&mut self) -> &mut dyn MqttPort {
        &mut self.mqtt
    }

    fn discovery(&mut self) -> &mut dyn DiscoveryPort {
        &mut self.discovery
    }

    fn flasher(&mut self) -> &mut dyn FlasherPort {
        &mut self.flasher
    }

    fn system(&mut self) -> &mut dyn SystemPort {
        &mut self.system
    }

    fn status_indicator(&mut self) -> Option<&mut dyn StatusIndicatorPort> {
        self.status_led
            .as_deref_mut()
            .map(|led| led as &mut dyn StatusIndicatorPort)
    }

    fn events(&mut self) -> &mut dyn EventSink {
        &mut self.events
    }
}
