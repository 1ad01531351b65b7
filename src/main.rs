//! ThingNode firmware main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiAdapter   TcpHttpServer   CaptiveDns    MqttAdapter       │
//! │  MdnsAdapter   OtaFlasher      SystemAdapter LogEventSink      │
//! │  NvsRegion (EepromPort)        StatusLed (StatusIndicatorPort) │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │          Network (connectivity orchestrator)           │    │
//! │  │  settings · HTTP routes · MQTT bridge · OTA · sleep    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Devices (Heartbeat) register properties with the core         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{AnyOutputPin, PinDriver};
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;

use thingnode::adapters::eeprom::NvsRegion;
use thingnode::adapters::mqtt::MqttAdapter;
use thingnode::adapters::platform::DevicePlatform;
use thingnode::adapters::time::Clock;
use thingnode::adapters::wifi::WifiAdapter;
use thingnode::config::SETTINGS_REGION_SIZE;
use thingnode::drivers::status_led::StatusLed;
use thingnode::thing::{Device, Property, PropertyKind, PropertyValue};
use thingnode::{Network, NetworkConfig};

const APPLICATION_NAME: &str = "ThingNode";
const DEBUG: bool = cfg!(debug_assertions);
/// On-board LED of most ESP32 dev kits.
const STATUS_LED_GPIO: u8 = 2;
const LOOP_DELAY_MS: u32 = 10;

// ── Heartbeat device ──────────────────────────────────────────
//
// Publishes the uptime once a minute so a freshly configured node shows
// up on the broker and in the WebThing gateway.

struct Heartbeat {
    properties: [Property; 1],
}

impl Heartbeat {
    fn new() -> Self {
        Self {
            properties: [Property::new("uptime", "Uptime", PropertyKind::Integer)
                .read_only()
                .with_unit("s")],
        }
    }
}

impl Device for Heartbeat {
    fn id(&self) -> &str {
        "heartbeat"
    }

    fn title(&self) -> &str {
        "Heartbeat"
    }

    fn properties(&self) -> &[Property] {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut [Property] {
        &mut self.properties
    }

    fn push_interval_ms(&self) -> u64 {
        60_000
    }

    fn tick(&mut self, now_ms: u64) {
        let secs = i64::try_from(now_ms / 1_000).unwrap_or(i64::MAX);
        if let Err(e) = self.properties[0].set(PropertyValue::Integer(secs)) {
            warn!("Heartbeat: {}", e);
        }
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    log::set_max_level(if DEBUG {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });

    info!("╔══════════════════════════════════════╗");
    info!("║  {} v{}                     ║", APPLICATION_NAME, env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Radio + persistent region ──────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let esp_wifi = EspWifi::new(peripherals.modem, sysloop, Some(nvs))?;

    let region = NvsRegion::new(SETTINGS_REGION_SIZE)
        .map_err(|e| anyhow::anyhow!("settings region: {}", e))?;

    // ── 3. Platform ───────────────────────────────────────────
    let config = NetworkConfig::new(
        DEBUG,
        APPLICATION_NAME,
        env!("CARGO_PKG_VERSION"),
        true,
        Some(STATUS_LED_GPIO),
    );

    let mut platform = DevicePlatform::new(WifiAdapter::new(esp_wifi), MqttAdapter::new());
    if let Some(gpio) = config.status_led_pin {
        // SAFETY: the GPIO number comes from the board configuration and
        // is not claimed by any other driver.
        let pin = unsafe { AnyOutputPin::new(i32::from(gpio)) };
        match PinDriver::output(pin) {
            Ok(driver) => {
                platform = platform.with_status_led(Box::new(StatusLed::new(driver, false)));
            }
            Err(e) => warn!("StatusLed: GPIO{} unavailable: {}", gpio, e),
        }
    }

    // ── 4. Connectivity core ──────────────────────────────────
    let mut network = Network::new(config, Box::new(region), platform)?;
    network.add_device(Box::new(Heartbeat::new()));

    let clock = Clock::new();
    info!("System ready. Entering main loop.");

    // ── 5. Main loop ──────────────────────────────────────────
    loop {
        network.tick(clock.uptime_ms());
        FreeRtos::delay_ms(LOOP_DELAY_MS);
    }
}
