//! WiFi adapter: station association plus the configuration access point.
//!
//! Implements [`WifiPort`].  Association is started here and completes in
//! the background; the orchestrator polls [`WifiPort::is_station_connected`]
//! against its own deadline.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi`.
//! - **all other targets**: a simulated radio with one reachable network,
//!   for host-side tests.

use core::net::Ipv4Addr;

use log::{info, warn};

use super::utils::is_printable_ascii;
use crate::app::ports::{WifiError, WifiPort};

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
};

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), WifiError> {
    if ssid.is_empty() {
        return Err(WifiError::NoCredentials);
    }
    if ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(WifiError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), WifiError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(WifiError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
const SIM_STATION_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);
#[cfg(not(target_os = "espidf"))]
const SIM_SOFT_AP_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

pub struct WifiAdapter {
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(not(target_os = "espidf"))]
    reachable: Option<(heapless::String<32>, heapless::String<64>)>,
    #[cfg(not(target_os = "espidf"))]
    station_up: bool,
    soft_ap: Option<Ipv4Addr>,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    pub fn new(wifi: EspWifi<'static>) -> Self {
        Self { wifi, soft_ap: None }
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    /// A radio that sees no network at all.
    pub fn new() -> Self {
        Self {
            reachable: None,
            station_up: false,
            soft_ap: None,
        }
    }

    /// Make one network reachable: associating with these exact
    /// credentials succeeds.
    pub fn with_network(mut self, ssid: &str, password: &str) -> Self {
        let mut s = heapless::String::new();
        let mut p = heapless::String::new();
        if s.push_str(ssid).is_ok() && p.push_str(password).is_ok() {
            self.reachable = Some((s, p));
        }
        self
    }

    /// Simulate the access point going away.
    pub fn drop_link(&mut self) {
        if self.station_up {
            warn!("WiFi(sim): link lost");
        }
        self.station_up = false;
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl WifiAdapter {
    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_begin(&mut self, ssid: &str, password: &str, hostname: &str) -> Result<(), WifiError> {
        if let Err(e) = self.wifi.sta_netif_mut().set_hostname(hostname) {
            warn!("WiFi: hostname '{}' rejected: {}", hostname, e);
        }
        let config = Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| WifiError::InvalidSsid)?,
            password: password.try_into().map_err(|_| WifiError::InvalidPassword)?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        });
        self.wifi.set_configuration(&config).map_err(|e| {
            warn!("WiFi: set_configuration failed: {}", e);
            WifiError::ConnectionFailed
        })?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|_| WifiError::ConnectionFailed)?;
        }
        self.wifi.connect().map_err(|e| {
            warn!("WiFi: connect failed: {}", e);
            WifiError::ConnectionFailed
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_begin(&mut self, ssid: &str, password: &str, hostname: &str) -> Result<(), WifiError> {
        self.station_up = self
            .reachable
            .as_ref()
            .is_some_and(|(s, p)| s.as_str() == ssid && p.as_str() == password);
        info!(
            "WiFi(sim): '{}' as {} -> {}",
            ssid,
            hostname,
            if self.station_up { "associated" } else { "no answer" }
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if self.wifi.is_connected().unwrap_or(false) {
            let _ = self.wifi.disconnect();
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.station_up = false;
    }

    #[cfg(target_os = "espidf")]
    fn platform_station_ip(&self) -> Option<Ipv4Addr> {
        if !self.wifi.is_connected().unwrap_or(false) {
            return None;
        }
        self.wifi
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
            .filter(|ip| !ip.is_unspecified())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_station_ip(&self) -> Option<Ipv4Addr> {
        self.station_up.then_some(SIM_STATION_IP)
    }

    #[cfg(target_os = "espidf")]
    fn platform_start_ap(&mut self, ssid: &str, password: &str) -> Result<Ipv4Addr, WifiError> {
        let config = Configuration::AccessPoint(AccessPointConfiguration {
            ssid: ssid.try_into().map_err(|_| WifiError::InvalidSsid)?,
            password: password.try_into().map_err(|_| WifiError::InvalidPassword)?,
            auth_method: AuthMethod::WPA2Personal,
            channel: 1,
            ..Default::default()
        });
        self.wifi
            .set_configuration(&config)
            .and_then(|()| self.wifi.start())
            .map_err(|e| {
                warn!("WiFi: soft AP failed: {}", e);
                WifiError::AccessPointFailed
            })?;
        self.wifi
            .ap_netif()
            .get_ip_info()
            .map(|info| info.ip)
            .map_err(|_| WifiError::AccessPointFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start_ap(&mut self, _ssid: &str, _password: &str) -> Result<Ipv4Addr, WifiError> {
        Ok(SIM_SOFT_AP_IP)
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop_ap(&mut self) {
        let _ = self.wifi.stop();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop_ap(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// WifiPort
// ───────────────────────────────────────────────────────────────

impl WifiPort for WifiAdapter {
    fn begin_station(&mut self, ssid: &str, password: &str, hostname: &str) -> Result<(), WifiError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        info!("WiFi: connecting to '{}' as {}", ssid, hostname);
        self.platform_begin(ssid, password, hostname)
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        info!("WiFi: station disconnected");
    }

    fn is_station_connected(&self) -> bool {
        self.platform_station_ip().is_some()
    }

    fn station_ip(&self) -> Option<Ipv4Addr> {
        self.platform_station_ip()
    }

    fn start_soft_ap(&mut self, ssid: &str, password: &str) -> Result<Ipv4Addr, WifiError> {
        validate_ssid(ssid)?;
        if password.len() < 8 {
            return Err(WifiError::InvalidPassword);
        }
        let ip = self.platform_start_ap(ssid, password)?;
        self.soft_ap = Some(ip);
        info!("WiFi: access point '{}' at {}", ssid, ip);
        Ok(ip)
    }

    fn stop_soft_ap(&mut self) {
        if self.soft_ap.take().is_some() {
            self.platform_stop_ap();
            info!("WiFi: access point closed");
        }
    }

    #[cfg(target_os = "espidf")]
    fn mac_address(&self) -> [u8; 6] {
        self.wifi.sta_netif().get_mac().unwrap_or([0; 6])
    }

    #[cfg(not(target_os = "espidf"))]
    fn mac_address(&self) -> [u8; 6] {
        super::device_id::read_mac()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
