//! WiFi, MQTT session, firmware update and deep-sleep behaviour of
//! `Network::tick` against the recording mock platform.

use thingnode::NetworkConfig;
use thingnode::app::events::NetworkEvent;
use thingnode::app::ports::{HttpMethod, HttpRequest, UploadEvent};

use crate::mock_platform::{
    Lamp, MINUTES_5, STATION_IP, mqtt_only_settings, network, online_network, region, seed,
    webthing_settings,
};

fn no_auto_start() -> NetworkConfig {
    NetworkConfig {
        auto_start_web_server: false,
        ..NetworkConfig::default()
    }
}

fn sleepy(secs: u32) -> NetworkConfig {
    NetworkConfig {
        deep_sleep_secs: secs,
        ..NetworkConfig::default()
    }
}

fn webthing_and_mqtt(s: &mut thingnode::settings::SettingsStore) {
    mqtt_only_settings(s);
    s.set_bool("supportingWebThing", true).unwrap();
}

// ── WiFi ──────────────────────────────────────────────────────

#[test]
fn wifi_attempts_inside_the_floor_collapse() {
    let region = region();
    seed(&region, webthing_settings);
    let mut net = network(&region, NetworkConfig::default());

    net.tick(0);
    net.tick(1_000);
    net.tick(MINUTES_5 - 1);
    assert_eq!(net.platform().wifi.begins.len(), 1);

    net.tick(MINUTES_5);
    assert_eq!(net.platform().wifi.begins.len(), 2);

    // Stale associations are dropped before every attempt.
    assert!(net.platform().wifi.disconnects >= 2);
}

#[test]
fn association_uses_configured_credentials_and_host_name() {
    let region = region();
    seed(&region, |s| {
        webthing_settings(s);
        s.set_string("idx", "living room.lamp").unwrap();
    });
    let mut net = network(&region, NetworkConfig::default());
    net.tick(0);

    let (ssid, password, host) = &net.platform().wifi.begins[0];
    assert_eq!(ssid, "MyWifi");
    assert_eq!(password, "secret12");
    assert_eq!(host, "living-room-lamp");
}

#[test]
fn station_up_with_webthing_starts_server_and_discovery() {
    let mut net = online_network(webthing_settings, NetworkConfig::default());
    net.tick(0);
    assert!(net.tick(10));

    assert!(net.is_station_connected());
    assert!(net.is_web_server_running());
    assert!(!net.is_soft_ap());
    assert_eq!(net.device_ip(), Some(STATION_IP));

    let p = net.platform();
    assert!(p.wifi.soft_ap.is_none());
    let (host, port, txt) = &p.discovery.starts[0];
    assert_eq!(host, "192.168.1.77");
    assert_eq!(*port, 80);
    assert!(txt.contains(&("url".to_string(), "http://192.168.1.77/".to_string())));
    assert!(txt.contains(&("webthing".to_string(), "true".to_string())));
    assert_eq!(p.discovery.updates, 1);
    assert_eq!(p.events.count(|e| matches!(e, NetworkEvent::StationUp(ip) if *ip == STATION_IP)), 1);
}

#[test]
fn association_deadline_applies_only_with_deep_sleep() {
    let sleepy_region = region();
    seed(&sleepy_region, webthing_settings);
    let mut net = network(&sleepy_region, sleepy(30));

    net.tick(0);
    net.tick(4_999);
    assert_eq!(net.platform().events.count(|e| *e == NetworkEvent::AssociationTimedOut), 0);
    net.tick(5_000);
    net.tick(6_000);
    assert_eq!(net.platform().events.count(|e| *e == NetworkEvent::AssociationTimedOut), 1);

    let awake_region = region();
    seed(&awake_region, webthing_settings);
    let mut awake = network(&awake_region, NetworkConfig::default());
    awake.tick(0);
    awake.tick(60_000);
    assert_eq!(awake.platform().events.count(|e| *e == NetworkEvent::AssociationTimedOut), 0);
}

#[test]
fn station_is_reassociated_while_webthing_server_runs() {
    let mut net = online_network(webthing_settings, NetworkConfig::default());
    net.tick(0);
    net.tick(10_000);
    assert!(net.is_station_connected());
    assert!(net.is_web_server_running());

    net.platform_mut().wifi.connected = false;
    net.tick(20_000);
    assert!(!net.is_station_connected());
    // The server stays up for WebThing clients.
    assert!(net.is_web_server_running());
    assert_eq!(net.platform().wifi.begins.len(), 1);

    net.tick(MINUTES_5 - 1);
    assert_eq!(net.platform().wifi.begins.len(), 1);
    net.tick(MINUTES_5);
    assert_eq!(net.platform().wifi.begins.len(), 2);
    net.tick(MINUTES_5 + 10);

    assert!(net.is_station_connected());
    assert!(!net.is_soft_ap());
    let p = net.platform();
    assert_eq!(p.http.begins, 1);
    assert_eq!(p.events.count(|e| matches!(e, NetworkEvent::StationUp(_))), 2);
}

// ── MQTT session ──────────────────────────────────────────────

#[test]
fn broker_attempts_respect_the_floor() {
    let mut net = online_network(mqtt_only_settings, no_auto_start());
    net.platform_mut().mqtt.accept = false;

    net.tick(0);
    net.tick(10);
    net.tick(20);
    net.tick(MINUTES_5 + 9);
    assert_eq!(net.platform().mqtt.connects.len(), 1);

    net.tick(MINUTES_5 + 10);
    assert_eq!(net.platform().mqtt.connects.len(), 2);
}

#[test]
fn station_drop_resets_the_broker_floor() {
    let mut net = online_network(mqtt_only_settings, no_auto_start());
    net.platform_mut().mqtt.accept = false;

    net.tick(0);
    net.tick(10);
    assert_eq!(net.platform().mqtt.connects.len(), 1);

    net.platform_mut().wifi.connected = false;
    net.tick(30);
    assert!(!net.is_station_connected());
    assert_eq!(net.platform().events.count(|e| *e == NetworkEvent::StationDown), 1);

    net.platform_mut().wifi.connected = true;
    net.tick(40);
    assert_eq!(net.platform().mqtt.connects.len(), 2);
}

#[test]
fn broker_failure_on_mqtt_only_device_opens_configuration_server() {
    let mut net = online_network(mqtt_only_settings, NetworkConfig::default());
    net.platform_mut().mqtt.accept = false;

    net.tick(0);
    net.tick(10);

    assert!(net.is_web_server_running());
    assert!(!net.is_soft_ap());
    assert!(!net.is_mqtt_connected());
    assert_eq!(
        net.platform()
            .events
            .count(|e| *e == NetworkEvent::MqttConnectFailed { rc: -2 }),
        1
    );
}

#[test]
fn broker_failure_with_webthing_keeps_server_choice() {
    let region = region();
    seed(&region, webthing_and_mqtt);
    let mut net = network(&region, NetworkConfig::default());
    net.platform_mut().wifi.reachable = true;
    net.platform_mut().mqtt.accept = false;

    net.tick(0);
    net.tick(10);
    // Running because of WebThing, not because of the failure.
    assert!(net.is_web_server_running());
    assert_eq!(net.platform().http.begins, 1);
}

#[test]
fn lost_broker_session_is_noticed() {
    let mut net = online_network(mqtt_only_settings, no_auto_start());
    net.add_device(Box::new(Lamp::new(0)));
    net.tick(0);
    net.tick(10);
    assert!(net.is_mqtt_connected());

    net.platform_mut().mqtt.connected = false;
    net.tick(20);
    assert!(!net.is_mqtt_connected());
    // Reconnect waits for the floor.
    assert_eq!(net.platform().mqtt.connects.len(), 1);
    net.tick(MINUTES_5 + 10);
    assert!(net.is_mqtt_connected());
}

#[test]
fn long_broker_outage_in_webthing_mode_recovers() {
    let mut net = online_network(webthing_and_mqtt, NetworkConfig::default());
    net.add_device(Box::new(Lamp::new(60_000)));
    net.tick(0);
    net.tick(10);
    assert!(net.is_mqtt_connected());
    let state_topic = "home/node/things/lamp/properties";
    assert_eq!(net.platform().mqtt.published_to(state_topic).len(), 1);

    net.platform_mut().mqtt.accept = false;
    net.platform_mut().mqtt.connected = false;
    net.tick(20);
    assert!(!net.is_mqtt_connected());

    // First retry after the floor fails; nothing else changes.
    net.tick(MINUTES_5 + 10);
    assert_eq!(net.platform().mqtt.connects.len(), 2);
    assert!(!net.is_mqtt_connected());
    assert!(net.is_station_connected());
    assert!(!net.is_soft_ap());
    assert_eq!(net.platform().http.begins, 1);

    net.platform_mut().mqtt.accept = true;
    net.tick(2 * MINUTES_5);
    assert_eq!(net.platform().mqtt.connects.len(), 2);
    net.tick(2 * MINUTES_5 + 10);
    assert!(net.is_mqtt_connected());
    assert_eq!(net.platform().mqtt.connects.len(), 3);
    // Pushes resume on the restored session.
    assert_eq!(net.platform().mqtt.published_to(state_topic).len(), 2);
}

// ── Firmware update ───────────────────────────────────────────

#[test]
fn update_suppresses_mqtt_discovery_and_sleep() {
    let region = region();
    seed(&region, webthing_and_mqtt);
    let mut net = network(&region, sleepy(30));
    net.platform_mut().wifi.reachable = true;
    net.add_device(Box::new(Lamp::new(1_000)));

    net.tick(0);
    net.tick(10);
    assert!(net.is_mqtt_connected());
    let published = net.platform().mqtt.published.len();
    let updates = net.platform().discovery.updates;
    let connects = net.platform().mqtt.connects.len();

    let http = &mut net.platform_mut().http;
    http.upload(UploadEvent::Start {
        filename: "thingnode.bin".into(),
    });
    http.upload(UploadEvent::Data(vec![0xE9; 1024]));
    http.upload(UploadEvent::Data(vec![0x00; 1024]));
    assert!(!net.tick(20));
    assert!(net.is_update_running());
    assert!(!net.is_mqtt_connected());

    // All web properties read: would make the device sleep-ready.
    for prop in ["on", "level", "label"] {
        let path = format!("/things/lamp/properties/{prop}");
        let response = net.handle_request(&HttpRequest::new(HttpMethod::Get, &path));
        assert_eq!(response.status, 200);
    }

    for now in [400_000, 800_000, 1_200_000] {
        assert!(!net.tick(now));
    }

    let p = net.platform();
    assert_eq!(p.mqtt.published.len(), published);
    assert_eq!(p.mqtt.connects.len(), connects);
    assert_eq!(p.discovery.updates, updates);
    assert!(p.system.sleeps.is_empty());
    assert_eq!(p.flasher.begins, vec![0x1D_F000]);
    assert_eq!(p.flasher.image.len(), 2048);
}

#[test]
fn successful_update_restarts_with_message() {
    let mut net = online_network(webthing_settings, NetworkConfig::default());
    net.tick(0);
    net.tick(10);

    let http = &mut net.platform_mut().http;
    http.upload(UploadEvent::Start {
        filename: "thingnode.bin".into(),
    });
    http.upload(UploadEvent::Data(vec![0xE9; 512]));
    http.upload(UploadEvent::End);
    http.push(HttpRequest::new(HttpMethod::Post, "/firmware"));
    net.tick(20);

    let p = net.platform();
    assert_eq!(p.http.last().status, 302);
    assert_eq!(p.http.last().body, "Update successful.");
    assert_eq!(p.flasher.ends, 1);
    assert_eq!(p.system.restarts, 1);
    assert_eq!(p.events.count(|e| *e == NetworkEvent::UpdateFinished { ok: true }), 1);
    assert!(!net.is_update_running());
}

#[test]
fn failed_update_restarts_with_error_message() {
    let mut net = online_network(webthing_settings, NetworkConfig::default());
    net.platform_mut().flasher.fail_write = true;
    net.tick(0);
    net.tick(10);

    let http = &mut net.platform_mut().http;
    http.upload(UploadEvent::Start {
        filename: "broken.bin".into(),
    });
    http.upload(UploadEvent::Data(vec![0xFF; 256]));
    http.upload(UploadEvent::End);
    http.push(HttpRequest::new(HttpMethod::Post, "/firmware"));
    net.tick(20);

    let p = net.platform();
    assert_eq!(p.http.last().status, 302);
    assert_eq!(p.http.last().header("Location"), Some("/config"));
    assert_eq!(p.http.last().body, "Update error: Flash Write Failed");
    assert_eq!(p.flasher.ends, 0);
    assert!(p.flasher.aborts >= 1);
    assert_eq!(p.system.restarts, 1);
    assert_eq!(p.events.count(|e| *e == NetworkEvent::UpdateFinished { ok: false }), 1);
}

// ── Deep sleep ────────────────────────────────────────────────

#[test]
fn deep_sleep_follows_first_state_push() {
    let mut net = online_network(mqtt_only_settings, sleepy(30));
    net.add_device(Box::new(Lamp::new(0)));

    net.tick(0);
    net.tick(10);

    let p = net.platform();
    assert_eq!(p.system.sleeps, vec![30]);
    assert!(p.system.delays.contains(&net.config().sleep_grace_ms));
    // No structure announcement when sleeping right away.
    assert_eq!(p.mqtt.subscribed, vec!["home/node/#".to_string()]);
    assert_eq!(p.mqtt.published.len(), 1);
    assert_eq!(p.events.count(|e| *e == NetworkEvent::DeepSleep { secs: 30 }), 1);
}

#[test]
fn device_can_veto_deep_sleep() {
    let mut net = online_network(mqtt_only_settings, sleepy(30));
    let mut lamp = Lamp::new(0);
    lamp.allow_sleep = false;
    net.add_device(Box::new(lamp));

    net.tick(0);
    net.tick(10);
    net.tick(20);
    assert!(net.platform().system.sleeps.is_empty());
}

#[test]
fn webthing_device_sleeps_once_every_property_was_read() {
    let mut net = online_network(webthing_settings, sleepy(60));
    net.add_device(Box::new(Lamp::new(0)));
    net.tick(0);
    net.tick(10);

    for prop in ["on", "level"] {
        let path = format!("/things/lamp/properties/{prop}");
        net.handle_request(&HttpRequest::new(HttpMethod::Get, &path));
    }
    net.tick(20);
    assert!(net.platform().system.sleeps.is_empty());

    net.handle_request(&HttpRequest::new(
        HttpMethod::Get,
        "/things/lamp/properties/label",
    ));
    net.tick(30);
    assert_eq!(net.platform().system.sleeps, vec![60]);
    assert!(!net.is_web_server_running());
}

// ── Status indicator ──────────────────────────────────────────

#[test]
fn status_led_tracks_connectivity() {
    let mut net = online_network(webthing_settings, NetworkConfig::default());
    assert_eq!(net.platform().led.last(), Some((true, 500)));

    net.tick(0);
    net.tick(10);
    assert_eq!(net.platform().led.last(), Some((false, 0)));
    assert_eq!(net.platform().led.ticks, 2);

    net.platform_mut().wifi.connected = false;
    net.tick(20);
    assert_eq!(net.platform().led.last(), Some((true, 500)));
}

#[test]
fn fresh_device_led_is_solid_in_access_point_mode() {
    let region = region();
    let mut net = network(&region, NetworkConfig::default());
    net.tick(0);
    assert_eq!(net.platform().led.last(), Some((true, 0)));
}
