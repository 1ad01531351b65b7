//! Connectivity orchestrator.
//!
//! [`Network::tick`] is called once per loop iteration and advances every
//! subsystem in a fixed order:
//!
//! ```text
//!  1. bootstrap        no complete settings + auto-start → config server
//!  2. WiFi             (server stopped) station connect with 300 s floor
//!  3. HTTP             (server running) dispatch requests, captive DNS
//!  4. MQTT             connect with 300 s floor, drain inbound messages
//!  5. devices          tick each device, periodic state push
//!  6. discovery        mDNS maintenance
//!  7. restart / sleep  deferred reset or timed deep sleep
//! ```
//!
//! Nothing in here blocks except the grace delays right before a reset or
//! deep sleep.  Station events arrive through [`Network::on_station_up`] and
//! [`Network::on_station_down`]; the WiFi status is also polled each tick.

pub mod backoff;
pub mod http;
pub mod pages;
pub mod state;
pub mod update;

use core::net::Ipv4Addr;

use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::adapters::device_id::{NameString, client_name, host_name};
use crate::app::events::NetworkEvent;
use crate::app::ports::{EepromPort, MqttError, Platform};
use crate::bridge::{self, InboundAction, json, topic};
use crate::config::{
    DNS_PORT, HTTP_PORT, MAX_MQTT_MESSAGES_PER_TICK, MQTT_PORT, NetworkConfig, SOFT_AP_PASSWORD,
};
use crate::error::Result;
use crate::settings::SettingsStore;
use crate::settings::network::{LoadOutcome, NetworkSettings};
use crate::thing::{Channel, Device, DeviceSlot};

use backoff::Backoff;
use state::{ConnectivityState, DeepSleepRequest, HttpServerState, MqttState, WifiState};
use update::FirmwareUpdate;

pub struct Network<P: Platform> {
    config: NetworkConfig,
    platform: P,
    settings: SettingsStore,
    fields: NetworkSettings,
    /// Settings were complete at boot.
    settings_found: bool,
    devices: Vec<DeviceSlot>,
    state: ConnectivityState,
    update: FirmwareUpdate,
    wifi_backoff: Backoff,
    mqtt_backoff: Backoff,
    restart_reason: Option<String>,
    chip_id: u32,
    station_ip: Option<Ipv4Addr>,
    soft_ap_ip: Option<Ipv4Addr>,
    now: u64,
}

impl<P: Platform> Network<P> {
    /// Open the settings region, register the network fields and prepare
    /// the status indicator.
    pub fn new(config: NetworkConfig, region: Box<dyn EepromPort>, mut platform: P) -> Result<Self> {
        let chip_id = platform.system().chip_id();
        let mut settings = SettingsStore::open(region);
        let lower = client_name(&config.application_name, chip_id, true);
        let fields = NetworkSettings::register(&mut settings, &lower)?;
        let settings_found = fields.outcome(&settings) == LoadOutcome::Complete;

        if let Some(led) = platform.status_indicator() {
            led.set_on(true, config.status_blink_ms);
        }
        info!(
            "Network: '{}' rev {} (chip {}), settings {}",
            config.application_name,
            config.firmware_version,
            chip_id,
            if settings_found { "found" } else { "missing" }
        );

        Ok(Self {
            wifi_backoff: Backoff::new(config.reconnect_backoff_ms),
            mqtt_backoff: Backoff::new(config.reconnect_backoff_ms),
            config,
            platform,
            settings,
            fields,
            settings_found,
            devices: Vec::new(),
            state: ConnectivityState::new(),
            update: FirmwareUpdate::new(),
            restart_reason: None,
            chip_id,
            station_ip: None,
            soft_ap_ip: None,
            now: 0,
        })
    }

    // ── Registry & accessors ──

    /// Register a device; returns its index.
    pub fn add_device(&mut self, device: Box<dyn Device>) -> usize {
        debug!("Network: device '{}' added", device.id());
        self.devices.push(DeviceSlot::new(device));
        self.devices.len() - 1
    }

    pub fn device(&self, index: usize) -> Option<&dyn Device> {
        self.devices.get(index).map(|s| s.device.as_ref())
    }

    pub fn device_mut(&mut self, index: usize) -> Option<&mut (dyn Device + 'static)> {
        self.devices.get_mut(index).map(|s| s.device.as_mut())
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SettingsStore {
        &mut self.settings
    }

    pub fn network_settings(&self) -> &NetworkSettings {
        &self.fields
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn state(&self) -> &ConnectivityState {
        &self.state
    }

    pub fn set_deep_sleep_secs(&mut self, secs: u32) {
        self.config.deep_sleep_secs = secs;
    }

    pub fn restart_reason(&self) -> Option<&str> {
        self.restart_reason.as_deref()
    }

    /// Schedule a reset at the end of the current tick.
    pub fn request_restart(&mut self, reason: &str) {
        info!("Network: restart requested ({})", reason);
        self.restart_reason = Some(reason.into());
    }

    // ── Queries ──

    pub fn is_web_server_running(&self) -> bool {
        self.state.is_web_server_running()
    }

    pub fn is_soft_ap(&self) -> bool {
        self.state.is_soft_ap()
    }

    pub fn is_station_connected(&self) -> bool {
        self.state.is_station_connected()
    }

    pub fn is_mqtt_connected(&self) -> bool {
        self.supports_mqtt() && self.state.is_mqtt_connected()
    }

    pub fn is_update_running(&self) -> bool {
        self.update.is_running()
    }

    pub fn device_ip(&self) -> Option<Ipv4Addr> {
        if self.is_soft_ap() {
            self.soft_ap_ip
        } else {
            self.station_ip
        }
    }

    pub fn client_name(&self, lower_case: bool) -> NameString {
        client_name(&self.config.application_name, self.chip_id, lower_case)
    }

    fn supports_webthing(&self) -> bool {
        self.fields.supports_webthing(&self.settings)
    }

    fn supports_mqtt(&self) -> bool {
        self.fields.supports_mqtt(&self.settings)
    }

    fn mqtt_topic(&self) -> String {
        self.fields.mqtt_topic(&self.settings).to_owned()
    }

    fn emit(&mut self, event: NetworkEvent) {
        self.platform.events().emit(&event);
    }

    fn sync_update_state(&mut self) {
        self.state.update = self.update.state();
    }

    // ── Tick ──

    /// Advance every subsystem once.  Returns `false` while the soft AP is
    /// open or an update is running.
    pub fn tick(&mut self, now: u64) -> bool {
        self.now = now;
        let mut result = true;

        // 1. bootstrap
        if !self.settings_found && self.config.auto_start_web_server {
            self.start_web_server();
        }

        self.watch_station(now);

        // 2. The station is re-associated even while the server keeps
        // running for WebThing; only the soft AP owns the radio.
        if !self.state.is_soft_ap() {
            self.maintain_wifi(now);
        }

        // 3.
        if self.state.is_web_server_running() {
            if self.state.is_soft_ap() {
                self.platform.dns().process_next_request();
            }
            self.serve_http();
            result = !self.state.is_soft_ap() && !self.update.is_running();
        }

        // 4.
        self.maintain_mqtt(now);

        if let Some(led) = self.platform.status_indicator() {
            led.tick(now);
        }

        // 5.
        for index in 0..self.devices.len() {
            self.devices[index].device.tick(now);
            if !self.update.is_running()
                && self.is_mqtt_connected()
                && self.devices[index].push_due(now)
                && self.devices[index].device.is_state_complete()
            {
                self.push_state(index);
            }
        }

        // 6.
        if !self.update.is_running() && self.supports_webthing() && self.state.is_station_connected() {
            self.platform.discovery().update();
        }

        // 7.
        if let Some(reason) = self.restart_reason.take() {
            self.update.clear();
            self.sync_update_state();
            self.emit(NetworkEvent::RestartRequested { reason });
            self.close_web_server();
            let grace = self.config.restart_grace_ms;
            let system = self.platform.system();
            system.delay_ms(grace);
            system.restart();
        } else if let DeepSleepRequest::Pending(index) = self.state.deep_sleep {
            if !self.update.is_running() {
                self.enter_deep_sleep(index);
            }
        }

        result
    }

    fn enter_deep_sleep(&mut self, index: usize) {
        let ready = self
            .devices
            .get_mut(index)
            .is_some_and(|slot| slot.device.prepare_sleep());
        self.state.deep_sleep = DeepSleepRequest::None;
        if !ready {
            debug!("Network: deep sleep cancelled by device {}", index);
            return;
        }
        let secs = self.config.deep_sleep_secs;
        info!("Network: going to deep sleep for {} s", secs);
        self.emit(NetworkEvent::DeepSleep { secs });
        self.close_web_server();
        let grace = self.config.sleep_grace_ms;
        let system = self.platform.system();
        system.delay_ms(grace);
        system.deep_sleep(secs);
    }

    // ── WiFi ──

    /// Reconcile the station sub-state with the radio and the deadline.
    fn watch_station(&mut self, now: u64) {
        let connected = self.platform.wifi().is_station_connected();
        let wifi = self.state.wifi;
        match wifi {
            WifiState::Disconnected | WifiState::Connecting { .. } if connected => {
                let ip = self
                    .platform
                    .wifi()
                    .station_ip()
                    .unwrap_or(Ipv4Addr::UNSPECIFIED);
                self.on_station_up(ip);
            }
            WifiState::Connecting {
                deadline: Some(deadline),
            } if now >= deadline => {
                warn!("WiFi: association timed out");
                self.state.wifi = WifiState::Disconnected;
                self.emit(NetworkEvent::AssociationTimedOut);
            }
            WifiState::ConnectedStation if !connected => self.on_station_down(),
            _ => {}
        }
    }

    fn maintain_wifi(&mut self, now: u64) {
        let ssid = self.fields.ssid(&self.settings).to_owned();
        if ssid.is_empty() {
            return;
        }
        let idle = matches!(
            self.state.wifi,
            WifiState::Disconnected | WifiState::Connecting { .. }
        );
        if !idle || !self.wifi_backoff.ready(now) {
            return;
        }

        let password = self.fields.password(&self.settings).to_owned();
        let host = host_name(
            self.fields.idx(&self.settings),
            &self.config.application_name,
            self.chip_id,
        );
        info!("WiFi: connecting to '{}' as '{}'", ssid, host);
        self.wifi_backoff.record(now);

        let wifi = self.platform.wifi();
        // Stale associations make the first attempt after boot fail.
        wifi.disconnect();
        match wifi.begin_station(&ssid, &password, &host) {
            Ok(()) => {
                let deadline = (self.config.deep_sleep_secs > 0)
                    .then(|| now + self.config.association_timeout_ms);
                self.state.wifi = WifiState::Connecting { deadline };
                self.emit(NetworkEvent::StationConnecting { ssid });
            }
            Err(e) => {
                warn!("WiFi: {}", e);
                self.state.wifi = WifiState::Disconnected;
            }
        }
    }

    /// Station received an address.
    pub fn on_station_up(&mut self, ip: Ipv4Addr) {
        match self.state.wifi {
            WifiState::SoftApFallback => {
                debug!("WiFi: station up ignored while soft AP is open");
                return;
            }
            WifiState::ConnectedStation if self.station_ip == Some(ip) => return,
            _ => {}
        }
        info!("WiFi: station connected, IP {}", ip);
        self.state.wifi = WifiState::ConnectedStation;
        self.station_ip = Some(ip);
        self.emit(NetworkEvent::StationUp(ip));
        if self.supports_webthing() {
            self.start_web_server();
        }
        self.notify(false);
    }

    /// Station lost its link: drop MQTT and allow an immediate reconnect.
    pub fn on_station_down(&mut self) {
        info!("WiFi: station disconnected");
        if matches!(
            self.state.wifi,
            WifiState::ConnectedStation | WifiState::Connecting { .. }
        ) {
            self.state.wifi = WifiState::Disconnected;
        }
        self.station_ip = None;
        self.drop_mqtt();
        self.mqtt_backoff.reset();
        self.emit(NetworkEvent::StationDown);
        self.notify(false);
    }

    // ── Web server ──

    /// Start the HTTP server; opens the soft AP when no station link exists.
    pub fn start_web_server(&mut self) {
        if self.state.is_web_server_running() {
            return;
        }
        if let Err(e) = self.platform.http().begin(HTTP_PORT) {
            warn!("HTTP: server start failed: {}", e);
            return;
        }

        let mut soft_ap = None;
        if self.state.wifi != WifiState::ConnectedStation {
            let ssid = self.client_name(false);
            info!(
                "HTTP: opening access point '{}' (password '{}')",
                ssid, SOFT_AP_PASSWORD
            );
            let wifi = self.platform.wifi();
            wifi.disconnect();
            match wifi.start_soft_ap(&ssid, SOFT_AP_PASSWORD) {
                Ok(ip) => {
                    if let Err(e) = self.platform.dns().start(DNS_PORT, ip) {
                        warn!("DNS: captive responder failed: {}", e);
                    }
                    self.state.wifi = WifiState::SoftApFallback;
                    self.soft_ap_ip = Some(ip);
                    soft_ap = Some(ip);
                }
                Err(e) => warn!("HTTP: {}", e),
            }
        } else if let Some(ip) = self.station_ip {
            info!("HTTP: configuration server at {}", ip);
        }

        let things = self.supports_webthing() && self.state.wifi == WifiState::ConnectedStation;
        if things {
            self.start_discovery();
        }
        self.state.http = HttpServerState::Running { things };
        self.emit(NetworkEvent::WebServerStarted { soft_ap });
        self.notify(true);
    }

    fn start_discovery(&mut self) {
        let Some(ip) = self.station_ip else {
            return;
        };
        let host = ip.to_string();
        let url = format!("http://{ip}/");
        let txt = [("url", url.as_str()), ("webthing", "true")];
        if self.platform.discovery().start(&host, HTTP_PORT, &txt) {
            info!("mDNS: responder started at {}", host);
        } else {
            warn!("mDNS: responder failed to start");
        }
    }

    /// Stop the HTTP server unless WebThing needs it or an update runs.
    pub fn stop_web_server(&mut self) {
        if !self.state.is_web_server_running() || self.supports_webthing() || self.update.is_running() {
            return;
        }
        info!("HTTP: closing web configuration");
        self.close_web_server();
        self.emit(NetworkEvent::ConfigurationFinished);
        self.notify(true);
    }

    pub fn enable_web_server(&mut self, enable: bool) {
        if enable {
            self.start_web_server();
        } else {
            self.stop_web_server();
        }
    }

    /// Tear down server, DNS, soft AP and discovery without any guard.
    fn close_web_server(&mut self) {
        if !self.state.is_web_server_running() {
            return;
        }
        self.platform.http().stop();
        if self.state.is_soft_ap() {
            self.platform.dns().stop();
            self.platform.wifi().stop_soft_ap();
            self.state.wifi = WifiState::Disconnected;
            self.soft_ap_ip = None;
        }
        if self.platform.discovery().is_active() {
            self.platform.discovery().stop();
        }
        self.state.http = HttpServerState::Stopped;
        self.emit(NetworkEvent::WebServerStopped);
    }

    // ── MQTT ──

    fn maintain_mqtt(&mut self, now: u64) {
        if self.update.is_running() {
            return;
        }
        if self.state.mqtt == MqttState::Connected && !self.platform.mqtt().is_connected() {
            warn!("MQTT: connection lost");
            // Released so the client cannot quietly resume a session we
            // have not resubscribed.
            self.drop_mqtt();
        }
        if self.supports_mqtt()
            && self.state.is_station_connected()
            && self.state.mqtt != MqttState::Connected
            && !self.fields.mqtt_server(&self.settings).is_empty()
            && self.mqtt_backoff.ready(now)
        {
            self.mqtt_backoff.record(now);
            self.connect_mqtt();
        }
        if self.is_mqtt_connected() {
            for _ in 0..MAX_MQTT_MESSAGES_PER_TICK {
                let Some(message) = self.platform.mqtt().poll() else {
                    break;
                };
                let base = self.mqtt_topic();
                debug!("MQTT: <- {} ({} bytes)", message.topic, message.payload.len());
                match bridge::route_inbound(&base, &message, &mut self.devices) {
                    InboundAction::PushState { device } => {
                        self.push_state(device);
                    }
                    InboundAction::EnableWebServer(enable) => self.enable_web_server(enable),
                    InboundAction::Ignored => {}
                }
            }
        }
    }

    fn connect_mqtt(&mut self) {
        let server = self.fields.mqtt_server(&self.settings).to_owned();
        let user = self.fields.mqtt_user(&self.settings).to_owned();
        let password = self.fields.mqtt_password(&self.settings).to_owned();
        let client_id = self.client_name(true);
        info!("MQTT: connecting to {} as '{}' (user '{}')", server, client_id, user);

        self.state.mqtt = MqttState::Connecting;
        match self
            .platform
            .mqtt()
            .connect(&server, MQTT_PORT, &client_id, &user, &password)
        {
            Ok(()) => {
                info!("MQTT: connected");
                self.state.mqtt = MqttState::Connected;
                self.emit(NetworkEvent::MqttConnected);
                if self.config.deep_sleep_secs == 0 {
                    self.announce_structure();
                }
                let filter = topic::command_filter(&self.mqtt_topic());
                if let Err(e) = self.platform.mqtt().subscribe(&filter) {
                    warn!("MQTT: subscribe {} failed: {}", filter, e);
                }
                self.notify(false);
            }
            Err(e) => {
                let rc = match e {
                    MqttError::ConnectFailed(rc) => rc,
                    _ => -1,
                };
                warn!("MQTT: connection to {} failed, rc={}", server, rc);
                self.state.mqtt = MqttState::Disconnected;
                self.emit(NetworkEvent::MqttConnectFailed { rc });
                if self.config.auto_start_web_server && !self.supports_webthing() {
                    self.start_web_server();
                }
                self.notify(false);
            }
        }
    }

    /// One structure message per MQTT-visible property.
    fn announce_structure(&mut self) {
        let base = self.mqtt_topic();
        let mqtt = self.platform.mqtt();
        if let Err(e) = mqtt.subscribe(topic::ANNOUNCE_FILTER) {
            debug!("MQTT: announce subscribe failed: {}", e);
        }
        for slot in &self.devices {
            let href = topic::device_href(&base, slot.device.id());
            for p in slot.device.properties().iter().filter(|p| p.is_visible(Channel::Mqtt)) {
                let t = topic::property(&base, slot.device.id(), &p.id);
                let payload = json::mqtt_structure(p, &href).to_string();
                if let Err(e) = mqtt.publish(&t, payload.as_bytes()) {
                    warn!("MQTT: structure for {} not sent: {}", t, e);
                }
            }
        }
        if let Err(e) = mqtt.unsubscribe(topic::ANNOUNCE_FILTER) {
            debug!("MQTT: announce unsubscribe failed: {}", e);
        }
    }

    fn drop_mqtt(&mut self) {
        self.platform.mqtt().disconnect();
        self.state.mqtt = MqttState::Disconnected;
    }

    /// Publish the full state of device `index`.
    fn push_state(&mut self, index: usize) -> bool {
        if self.update.is_running() || !self.is_mqtt_connected() {
            return false;
        }
        let Some(slot) = self.devices.get(index) else {
            return false;
        };
        if !slot.device.is_state_complete() {
            return false;
        }
        let id = slot.device.id().to_owned();
        let t = topic::device_properties(&self.mqtt_topic(), &id);
        let payload = json::values(slot.device.as_ref(), Channel::Mqtt).to_string();

        if let Err(e) = self.platform.mqtt().publish(&t, payload.as_bytes()) {
            warn!("MQTT: sending state of '{}' failed: {}", id, e);
            self.drop_mqtt();
            return false;
        }
        debug!("MQTT: -> {} {}", t, payload);
        self.devices[index].last_push = Some(self.now);
        self.emit(NetworkEvent::StatePushed { device: id });

        if self.config.deep_sleep_secs > 0
            && (!self.supports_webthing() || self.devices[index].device.all_properties_requested())
        {
            self.state.deep_sleep = DeepSleepRequest::Pending(index);
        }
        true
    }

    /// Flat `{"key":"value"}` message under the configured topic.
    pub fn publish(&mut self, topic_suffix: &str, key: &str, value: &str) -> bool {
        if !self.supports_mqtt() {
            return false;
        }
        if !self.is_mqtt_connected() {
            if !self.fields.mqtt_server(&self.settings).is_empty() {
                debug!("MQTT: not connected, '{}' not sent", key);
            }
            return false;
        }
        let t = topic::under(&self.mqtt_topic(), topic_suffix);
        let mut map = Map::new();
        map.insert(key.into(), Value::String(value.into()));
        let payload = Value::Object(map).to_string();
        match self.platform.mqtt().publish(&t, payload.as_bytes()) {
            Ok(()) => true,
            Err(e) => {
                warn!("MQTT: sending to {} failed: {}", t, e);
                self.drop_mqtt();
                false
            }
        }
    }

    // ── Status ──

    /// Re-evaluate the status indicator and optionally push every device.
    pub fn notify(&mut self, send_state: bool) {
        let station = self.state.is_station_connected();
        let soft_ap = self.state.is_soft_ap();
        let blink = self.config.status_blink_ms;
        if let Some(led) = self.platform.status_indicator() {
            if station {
                led.set_on(false, 0);
            } else if soft_ap {
                led.set_on(true, 0);
            } else {
                led.set_on(true, blink);
            }
        }
        if send_state {
            for index in 0..self.devices.len() {
                self.push_state(index);
            }
        }
        self.emit(NetworkEvent::Notified);
    }
}
