//! Recording mock platform for integration tests.
//!
//! Every port records its calls so tests can assert on the full history
//! without sockets, radio or flash.  Behaviour knobs (`reachable`,
//! `accept`, `fail_write`, ...) are plain public fields.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::Ipv4Addr;

use thingnode::adapters::eeprom::NvsRegion;
use thingnode::app::events::NetworkEvent;
use thingnode::app::ports::{
    CaptiveDnsPort, DiscoveryPort, EventSink, FlashError, FlasherPort, HttpEvent, HttpMethod,
    HttpRequest, HttpResponse, HttpServerPort, MqttError, MqttMessage, MqttPort, Platform,
    SocketError, StatusIndicatorPort, SystemPort, UploadEvent, WifiError, WifiPort,
};
use thingnode::config::SETTINGS_REGION_SIZE;
use thingnode::settings::SettingsStore;
use thingnode::settings::network::NetworkSettings;
use thingnode::thing::{Device, Property, PropertyKind, PropertyValue, Visibility};
use thingnode::{Network, NetworkConfig};

pub const STATION_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 77);
pub const SOFT_AP_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
/// Lower-case client name for the host-side MAC DE:AD:BE:EF:CA:FE.
pub const CLIENT_NAME: &str = "thingnode_15715070";
pub const MINUTES_5: u64 = 300_000;

// ── WiFi ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockWifi {
    /// Associating succeeds immediately.
    pub reachable: bool,
    pub connected: bool,
    pub begins: Vec<(String, String, String)>,
    pub disconnects: usize,
    pub soft_ap: Option<String>,
    pub soft_ap_stops: usize,
}

impl WifiPort for MockWifi {
    fn begin_station(&mut self, ssid: &str, password: &str, hostname: &str) -> Result<(), WifiError> {
        self.begins.push((ssid.into(), password.into(), hostname.into()));
        self.connected = self.reachable;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
        self.connected = false;
    }

    fn is_station_connected(&self) -> bool {
        self.connected
    }

    fn station_ip(&self) -> Option<Ipv4Addr> {
        self.connected.then_some(STATION_IP)
    }

    fn start_soft_ap(&mut self, ssid: &str, _password: &str) -> Result<Ipv4Addr, WifiError> {
        self.soft_ap = Some(ssid.into());
        Ok(SOFT_AP_IP)
    }

    fn stop_soft_ap(&mut self) {
        self.soft_ap = None;
        self.soft_ap_stops += 1;
    }

    fn mac_address(&self) -> [u8; 6] {
        [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
    }
}

// ── HTTP ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockHttp {
    pub running: bool,
    pub begins: usize,
    pub stops: usize,
    pub queue: VecDeque<HttpEvent>,
    pub responses: Vec<HttpResponse>,
}

impl MockHttp {
    pub fn push(&mut self, request: HttpRequest) {
        self.queue.push_back(HttpEvent::Request(request));
    }

    pub fn get(&mut self, path: &str) {
        self.push(HttpRequest::new(HttpMethod::Get, path));
    }

    pub fn upload(&mut self, event: UploadEvent) {
        self.queue.push_back(HttpEvent::Upload(event));
    }

    pub fn last(&self) -> &HttpResponse {
        self.responses.last().expect("no response recorded")
    }
}

impl HttpServerPort for MockHttp {
    fn begin(&mut self, _port: u16) -> Result<(), SocketError> {
        self.running = true;
        self.begins += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
        self.stops += 1;
    }

    fn poll(&mut self) -> Option<HttpEvent> {
        self.queue.pop_front()
    }

    fn respond(&mut self, response: HttpResponse) {
        self.responses.push(response);
    }
}

// ── DNS ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockDns {
    pub answer: Option<Ipv4Addr>,
    pub processed: usize,
    pub stops: usize,
}

impl CaptiveDnsPort for MockDns {
    fn start(&mut self, _port: u16, answer: Ipv4Addr) -> Result<(), SocketError> {
        self.answer = Some(answer);
        Ok(())
    }

    fn stop(&mut self) {
        self.answer = None;
        self.stops += 1;
    }

    fn process_next_request(&mut self) {
        self.processed += 1;
    }
}

// ── MQTT ──────────────────────────────────────────────────────

pub struct MockMqtt {
    /// Broker accepts the handshake.
    pub accept: bool,
    pub connected: bool,
    pub connects: Vec<(String, String)>,
    pub disconnects: usize,
    pub published: Vec<(String, String)>,
    pub subscribed: Vec<String>,
    pub unsubscribed: Vec<String>,
    pub inbox: VecDeque<MqttMessage>,
}

impl Default for MockMqtt {
    fn default() -> Self {
        Self {
            accept: true,
            connected: false,
            connects: Vec::new(),
            disconnects: 0,
            published: Vec::new(),
            subscribed: Vec::new(),
            unsubscribed: Vec::new(),
            inbox: VecDeque::new(),
        }
    }
}

impl MockMqtt {
    pub fn inject(&mut self, topic: &str, payload: &str) {
        self.inbox.push_back(MqttMessage {
            topic: topic.into(),
            payload: payload.as_bytes().to_vec(),
        });
    }

    pub fn published_to(&self, topic: &str) -> Vec<&str> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.as_str())
            .collect()
    }
}

impl MqttPort for MockMqtt {
    fn connect(
        &mut self,
        server: &str,
        _port: u16,
        client_id: &str,
        _user: &str,
        _password: &str,
    ) -> Result<(), MqttError> {
        self.connects.push((server.into(), client_id.into()));
        if self.accept {
            self.connected = true;
            Ok(())
        } else {
            Err(MqttError::ConnectFailed(-2))
        }
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), MqttError> {
        if !self.connected {
            return Err(MqttError::NotConnected);
        }
        self.published
            .push((topic.into(), String::from_utf8_lossy(payload).into_owned()));
        Ok(())
    }

    fn subscribe(&mut self, filter: &str) -> Result<(), MqttError> {
        self.subscribed.push(filter.into());
        Ok(())
    }

    fn unsubscribe(&mut self, filter: &str) -> Result<(), MqttError> {
        self.unsubscribed.push(filter.into());
        Ok(())
    }

    fn poll(&mut self) -> Option<MqttMessage> {
        self.inbox.pop_front()
    }
}

// ── Discovery ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockDiscovery {
    pub active: bool,
    pub starts: Vec<(String, u16, Vec<(String, String)>)>,
    pub updates: usize,
    pub stops: usize,
}

impl DiscoveryPort for MockDiscovery {
    fn start(&mut self, hostname: &str, port: u16, txt: &[(&str, &str)]) -> bool {
        let txt = txt.iter().map(|(k, v)| ((*k).into(), (*v).into())).collect();
        self.starts.push((hostname.into(), port, txt));
        self.active = true;
        true
    }

    fn update(&mut self) {
        self.updates += 1;
    }

    fn stop(&mut self) {
        self.active = false;
        self.stops += 1;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

// ── Flasher ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockFlasher {
    pub fail_write: bool,
    pub fail_verify: bool,
    pub begins: Vec<u32>,
    pub image: Vec<u8>,
    pub ends: usize,
    pub aborts: usize,
}

impl FlasherPort for MockFlasher {
    fn begin(&mut self, size: u32) -> Result<(), FlashError> {
        self.begins.push(size);
        self.image.clear();
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, FlashError> {
        if self.fail_write {
            return Err(FlashError::WriteFailed);
        }
        self.image.extend_from_slice(data);
        Ok(data.len())
    }

    fn end(&mut self) -> Result<(), FlashError> {
        self.ends += 1;
        if self.fail_verify {
            Err(FlashError::VerifyFailed)
        } else {
            Ok(())
        }
    }

    fn abort(&mut self) {
        self.aborts += 1;
    }
}

// ── System ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockSystem {
    pub restarts: usize,
    pub sleeps: Vec<u32>,
    pub delays: Vec<u32>,
}

impl SystemPort for MockSystem {
    fn chip_id(&self) -> u32 {
        0xEF_CAFE
    }

    fn flash_chip_id(&self) -> u32 {
        0x16_40EF
    }

    fn flash_chip_size(&self) -> u32 {
        4 * 1024 * 1024
    }

    fn sketch_size(&self) -> u32 {
        0xC_8000
    }

    fn free_sketch_space(&self) -> u32 {
        0x1E_0000
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
    }

    fn restart(&mut self) {
        self.restarts += 1;
    }

    fn deep_sleep(&mut self, secs: u32) {
        self.sleeps.push(secs);
    }
}

// ── Status LED / event sink ───────────────────────────────────

#[derive(Default)]
pub struct MockLed {
    pub calls: Vec<(bool, u32)>,
    pub ticks: usize,
}

impl MockLed {
    pub fn last(&self) -> Option<(bool, u32)> {
        self.calls.last().copied()
    }
}

impl StatusIndicatorPort for MockLed {
    fn set_on(&mut self, on: bool, blink_ms: u32) {
        self.calls.push((on, blink_ms));
    }

    fn tick(&mut self, _now_ms: u64) {
        self.ticks += 1;
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<NetworkEvent>,
}

impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&NetworkEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &NetworkEvent) {
        self.events.push(event.clone());
    }
}

// ── Platform bundle ───────────────────────────────────────────

#[derive(Default)]
pub struct MockPlatform {
    pub wifi: MockWifi,
    pub http: MockHttp,
    pub dns: MockDns,
    pub mqtt: MockMqtt,
    pub discovery: MockDiscovery,
    pub flasher: MockFlasher,
    pub system: MockSystem,
    pub led: MockLed,
    pub events: RecordingSink,
}

impl Platform for MockPlatform {
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
        Some(&mut self.led)
    }

    fn events(&mut self) -> &mut dyn EventSink {
        &mut self.events
    }
}

// ── Test device ───────────────────────────────────────────────

/// Lamp with a writable switch, a read-only level and a web-only label.
pub struct Lamp {
    pub properties: Vec<Property>,
    pub interval_ms: u64,
    pub ticks: usize,
    pub allow_sleep: bool,
}

impl Lamp {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            properties: vec![
                Property::new("on", "On", PropertyKind::Boolean)
                    .with_value(PropertyValue::Boolean(false)),
                Property::new("level", "Level", PropertyKind::Integer)
                    .read_only()
                    .with_unit("percent")
                    .with_value(PropertyValue::Integer(40)),
                Property::new("label", "Label", PropertyKind::String)
                    .with_visibility(Visibility {
                        web: true,
                        mqtt: false,
                    })
                    .with_value(PropertyValue::String("desk".into())),
            ],
            interval_ms,
            ticks: 0,
            allow_sleep: true,
        }
    }
}

impl Device for Lamp {
    fn id(&self) -> &str {
        "lamp"
    }

    fn title(&self) -> &str {
        "Desk Lamp"
    }

    fn properties(&self) -> &[Property] {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut [Property] {
        &mut self.properties
    }

    fn push_interval_ms(&self) -> u64 {
        self.interval_ms
    }

    fn tick(&mut self, _now_ms: u64) {
        self.ticks += 1;
    }

    fn prepare_sleep(&mut self) -> bool {
        self.allow_sleep
    }
}

// ── Fixtures ──────────────────────────────────────────────────

pub fn region() -> NvsRegion {
    NvsRegion::new(SETTINGS_REGION_SIZE).unwrap()
}

/// Persist a network configuration into `region` the way the web form does.
pub fn seed(region: &NvsRegion, apply: impl FnOnce(&mut SettingsStore)) {
    let mut store = SettingsStore::open(Box::new(region.clone()));
    NetworkSettings::register(&mut store, CLIENT_NAME).unwrap();
    apply(&mut store);
    store.save().unwrap();
}

pub fn webthing_settings(store: &mut SettingsStore) {
    store.set_string("ssid", "MyWifi").unwrap();
    store.set_string("password", "secret12").unwrap();
    store.set_bool("supportingWebThing", true).unwrap();
    store.set_bool("supportingMqtt", false).unwrap();
}

pub fn mqtt_only_settings(store: &mut SettingsStore) {
    store.set_string("ssid", "MyWifi").unwrap();
    store.set_string("password", "secret12").unwrap();
    store.set_bool("supportingWebThing", false).unwrap();
    store.set_bool("supportingMqtt", true).unwrap();
    store.set_string("mqttServer", "broker.local").unwrap();
    store.set_string("mqttTopic", "home/node").unwrap();
}

pub fn network(region: &NvsRegion, config: NetworkConfig) -> Network<MockPlatform> {
    Network::new(config, Box::new(region.clone()), MockPlatform::default()).unwrap()
}

/// A node whose station link comes up on the first attempt.
pub fn online_network(
    apply: impl FnOnce(&mut SettingsStore),
    config: NetworkConfig,
) -> Network<MockPlatform> {
    let region = region();
    seed(&region, apply);
    let mut net = network(&region, config);
    net.platform_mut().wifi.reachable = true;
    net
}

/// Tick until `done` holds or `limit` ticks pass; returns the final time.
pub fn run_until(
    net: &mut Network<MockPlatform>,
    mut now: u64,
    step: u64,
    limit: usize,
    done: impl Fn(&Network<MockPlatform>) -> bool,
) -> u64 {
    for _ in 0..limit {
        if done(net) {
            break;
        }
        net.tick(now);
        now += step;
    }
    now
}
