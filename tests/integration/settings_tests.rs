//! Settings persistence through the connectivity core.

use thingnode::Error;
use thingnode::NetworkConfig;
use thingnode::app::ports::EepromPort;
use thingnode::settings::network::NetworkSettings;
use thingnode::settings::{SENTINEL, SettingsError, SettingsStore};

use crate::mock_platform::{
    CLIENT_NAME, mqtt_only_settings, network, region, seed, webthing_settings,
};

#[test]
fn blank_region_yields_network_defaults() {
    let region = region();
    let net = network(&region, NetworkConfig::default());
    let s = net.settings();
    let f = net.network_settings();

    assert!(!s.exists_settings());
    assert_eq!(f.idx(s), CLIENT_NAME);
    assert_eq!(f.ssid(s), "");
    assert!(f.supports_webthing(s));
    assert!(!f.supports_mqtt(s));
    assert_eq!(f.mqtt_topic(s), CLIENT_NAME);
}

#[test]
fn seeded_values_survive_a_reboot() {
    let region = region();
    seed(&region, mqtt_only_settings);

    let net = network(&region, NetworkConfig::default());
    let s = net.settings();
    let f = net.network_settings();
    assert!(s.exists_settings());
    assert_eq!(f.ssid(s), "MyWifi");
    assert_eq!(f.password(s), "secret12");
    assert!(!f.supports_webthing(s));
    assert!(f.supports_mqtt(s));
    assert_eq!(f.mqtt_server(s), "broker.local");
    assert_eq!(f.mqtt_topic(s), "home/node");
}

#[test]
fn sentinel_is_first_byte_after_save() {
    let region = region();
    seed(&region, webthing_settings);

    let mut bytes = vec![0u8; region.size()];
    assert_eq!(region.read(&mut bytes), Ok(region.size()));
    assert_eq!(bytes[0], SENTINEL);
    assert_eq!(&bytes[1..1 + CLIENT_NAME.len()], CLIENT_NAME.as_bytes());
}

#[test]
fn empty_saved_topic_falls_back_to_client_name() {
    let region = region();
    seed(&region, |s| {
        webthing_settings(s);
        s.set_string("mqttTopic", "").unwrap();
    });

    let net = network(&region, NetworkConfig::default());
    assert_eq!(
        net.network_settings().mqtt_topic(net.settings()),
        CLIENT_NAME
    );
}

#[test]
fn device_fields_follow_network_fields() {
    let region = region();
    let mut net = network(&region, NetworkConfig::default());
    let network_end = net.settings().footprint();

    let settings = net.settings_mut();
    settings.register_integer("interval", 60).unwrap();
    assert_eq!(settings.address("interval"), Some(network_end));

    // Same id again: same slot, no growth.
    settings.register_integer("interval", 99).unwrap();
    assert_eq!(settings.footprint(), network_end + 2);
    assert_eq!(settings.integer("interval"), 60);
}

#[test]
fn integers_persist_as_sixteen_bits() {
    let region = region();
    {
        let mut net = network(&region, NetworkConfig::default());
        let s = net.settings_mut();
        s.register_integer("interval", 0).unwrap();
        s.register_integer("offset", 0).unwrap();
        s.set_integer("interval", 70_000).unwrap();
        s.set_integer("offset", -1).unwrap();
        s.save().unwrap();
    }

    let mut net = network(&region, NetworkConfig::default());
    let s = net.settings_mut();
    s.register_integer("interval", 0).unwrap();
    s.register_integer("offset", 0).unwrap();
    assert_eq!(s.integer("interval"), 70_000 & 0xFFFF);
    assert_eq!(s.integer("offset"), 65_535);
}

#[test]
fn oversized_registration_is_a_storage_bounds_error() {
    let region = region();
    let mut net = network(&region, NetworkConfig::default());

    let err = net
        .settings_mut()
        .register_string("certificate", 500, "")
        .unwrap_err();
    assert!(matches!(err, SettingsError::OutOfSpace { available: 512, .. }));
    assert!(matches!(
        Error::from(err),
        Error::StorageBounds {
            available: 512,
            ..
        }
    ));
}

#[test]
fn network_fields_reject_a_tiny_region() {
    let mut store = SettingsStore::open(Box::new(
        thingnode::adapters::eeprom::NvsRegion::new(64).unwrap(),
    ));
    let err = NetworkSettings::register(&mut store, CLIENT_NAME).unwrap_err();
    assert!(matches!(err, SettingsError::OutOfSpace { available: 64, .. }));
}

#[test]
fn complete_settings_skip_the_configuration_server() {
    let region = region();
    seed(&region, webthing_settings);
    let mut net = network(&region, NetworkConfig::default());

    net.tick(0);
    assert!(!net.is_web_server_running());
    assert!(!net.is_soft_ap());
    assert_eq!(net.platform().wifi.begins.len(), 1);
}
