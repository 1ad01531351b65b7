//! Configuration pages and the WebThing API, driven through
//! `Network::handle_request` and the mock HTTP queue.

use serde_json::{Value, json};

use thingnode::NetworkConfig;
use thingnode::app::ports::{HttpMethod, HttpRequest, HttpResponse};
use thingnode::settings::{SettingsError, SettingsStore};
use thingnode::thing::{Device, Property, PropertyKind, PropertyValue};

use crate::mock_platform::{
    Lamp, MockPlatform, mqtt_only_settings, network, online_network, region, webthing_settings,
};

type Net = thingnode::Network<MockPlatform>;

fn get(net: &mut Net, path: &str) -> HttpResponse {
    net.handle_request(&HttpRequest::new(HttpMethod::Get, path))
}

fn put(net: &mut Net, path: &str, body: Option<&str>) -> HttpResponse {
    let mut request = HttpRequest::new(HttpMethod::Put, path);
    if let Some(body) = body {
        request = request.with_body(body.as_bytes());
    }
    net.handle_request(&request)
}

fn body_json(response: &HttpResponse) -> Value {
    serde_json::from_str(&response.body).unwrap()
}

/// WebThing node with the lamp registered and the station up.
fn thing_node(apply: impl FnOnce(&mut SettingsStore)) -> Net {
    let mut net = online_network(apply, NetworkConfig::default());
    net.add_device(Box::new(Lamp::new(0)));
    net.tick(0);
    net.tick(10);
    net
}

// ── Configuration pages ───────────────────────────────────────

#[test]
fn access_point_serves_configuration_pages() {
    let region = region();
    let mut net = network(&region, NetworkConfig::new(true, "Plug Switch", "2.1.0", true, None));
    net.tick(0);
    assert!(net.is_soft_ap());

    let landing = get(&mut net, "/");
    assert_eq!(landing.status, 200);
    assert_eq!(landing.content_type, "text/html");
    assert!(landing.body.contains("Revision 2.1.0 (debug)"));
    assert!(landing.body.contains("/wifi"));

    let wifi = get(&mut net, "/wifi");
    assert!(wifi.body.contains("saveConfiguration"));
    assert!(wifi.body.contains("plugswitch_15715070"));

    assert_eq!(get(&mut net, "/firmware").status, 200);
    assert_eq!(get(&mut net, "/nowhere").status, 404);
    // WebThing routes are only bound on a station link.
    assert_eq!(get(&mut net, "/things/lamp").status, 404);
}

#[test]
fn info_page_lists_chip_and_addresses() {
    let region = region();
    let mut net = network(&region, NetworkConfig::default());
    net.tick(0);

    let info = get(&mut net, "/info");
    assert_eq!(info.status, 200);
    assert!(info.body.contains("Chip ID"));
    assert!(info.body.contains("15715070"));
    assert!(info.body.contains("DE:AD:BE:EF:CA:FE"));
    assert!(info.body.contains("192.168.4.1"));
    assert!(info.body.contains("512"));
}

#[test]
fn saving_without_any_protocol_enables_webthing() {
    let region = region();
    let mut net = network(&region, NetworkConfig::default());
    net.tick(0);

    let request = HttpRequest::new(HttpMethod::Get, "/saveConfiguration")
        .with_arg("i", "kitchen")
        .with_arg("s", "MyWifi")
        .with_arg("p", "secret12")
        .with_arg("mq", "true");
    let response = net.handle_request(&request);
    assert_eq!(response.status, 302);

    // MQTT was requested without a broker: unusable.
    let s = net.settings();
    let f = net.network_settings();
    assert!(f.supports_webthing(s));
    assert!(f.supports_mqtt(s));
    assert_eq!(f.mqtt_server(s), "");
    assert_eq!(f.idx(s), "kitchen");
}

#[test]
fn reset_route_restarts_at_end_of_tick() {
    let region = region();
    let mut net = network(&region, NetworkConfig::default());
    net.tick(0);

    net.platform_mut()
        .http
        .push(HttpRequest::new(HttpMethod::Post, "/reset"));
    net.tick(10);

    let p = net.platform();
    assert_eq!(p.http.last().status, 302);
    assert_eq!(p.http.last().header("Location"), Some("/config"));
    assert_eq!(p.system.restarts, 1);
    assert!(p.system.delays.contains(&1_000));
    // Server, captive DNS and access point go down before the reset.
    assert!(!p.http.running);
    assert_eq!(p.dns.stops, 1);
    assert!(p.wifi.soft_ap.is_none());
}

#[test]
fn pending_restart_replaces_landing_page() {
    let region = region();
    let mut net = network(&region, NetworkConfig::default());
    net.tick(0);

    get(&mut net, "/reset");
    let landing = get(&mut net, "/");
    assert!(landing.body.contains("Resetting was caused manually by web interface."));
    assert!(landing.body.contains("Module will reset"));
}

struct Dimmer {
    properties: Vec<Property>,
}

impl Device for Dimmer {
    fn id(&self) -> &str {
        "dimmer"
    }

    fn title(&self) -> &str {
        "Dimmer"
    }

    fn properties(&self) -> &[Property] {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut [Property] {
        &mut self.properties
    }

    fn provides_config_page(&self) -> bool {
        true
    }

    fn config_page(&self, settings: &SettingsStore) -> String {
        format!(
            "<form action='saveDeviceConfiguration_dimmer'><input name='fade' value='{}'></form>",
            settings.integer("fade")
        )
    }

    fn save_config_page(
        &mut self,
        query: &[(String, String)],
        settings: &mut SettingsStore,
    ) -> Result<(), SettingsError> {
        let fade = query
            .iter()
            .find(|(k, _)| k == "fade")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);
        settings.set_integer("fade", fade)
    }
}

#[test]
fn device_configuration_page_round_trip() {
    let region = region();
    let mut net = network(&region, NetworkConfig::default());
    net.settings_mut().register_integer("fade", 250).unwrap();
    net.add_device(Box::new(Dimmer {
        properties: vec![
            Property::new("brightness", "Brightness", PropertyKind::Integer)
                .with_value(PropertyValue::Integer(0)),
        ],
    }));
    net.tick(0);

    assert!(get(&mut net, "/").body.contains("/device_dimmer"));
    let page = get(&mut net, "/device_dimmer");
    assert_eq!(page.status, 200);
    assert!(page.body.contains("value='250'"));
    assert_eq!(get(&mut net, "/device_lamp").status, 404);

    let save = HttpRequest::new(HttpMethod::Get, "/saveDeviceConfiguration_dimmer")
        .with_arg("fade", "900");
    let response = net.handle_request(&save);
    assert_eq!(response.status, 302);
    assert_eq!(response.body, "Device settings saved.");
    assert_eq!(net.settings().integer("fade"), 900);
    assert!(net.restart_reason().is_some());
}

// ── WebThing API ──────────────────────────────────────────────

#[test]
fn root_lists_things_when_bound() {
    let mut net = thing_node(webthing_settings);

    let response = get(&mut net, "/");
    assert_eq!(response.content_type, "application/json");
    let things = body_json(&response);
    assert_eq!(things.as_array().map(Vec::len), Some(1));
    assert_eq!(things[0]["id"], "lamp");
    assert_eq!(things[0]["properties"]["level"]["readOnly"], true);
    assert_eq!(things[0]["properties"]["level"]["unit"], "percent");
}

#[test]
fn thing_and_property_reads() {
    let mut net = thing_node(webthing_settings);

    let thing = body_json(&get(&mut net, "/things/lamp"));
    assert_eq!(thing["title"], "Desk Lamp");
    assert_eq!(
        thing["properties"]["on"]["links"][0]["href"],
        "/things/lamp/properties/on"
    );

    let values = body_json(&get(&mut net, "/things/lamp/properties"));
    assert_eq!(values, json!({ "on": false, "level": 40, "label": "desk" }));

    let on = body_json(&get(&mut net, "/things/lamp/properties/on"));
    assert_eq!(on, json!({ "on": false }));

    assert_eq!(get(&mut net, "/things/lamp/properties/nope").status, 404);
    assert_eq!(get(&mut net, "/things/fan").status, 404);
}

#[test]
fn put_without_body_is_unprocessable() {
    let mut net = thing_node(webthing_settings);
    assert_eq!(put(&mut net, "/things/lamp/properties/on", None).status, 422);
}

#[test]
fn put_with_garbage_body_is_a_server_error() {
    let mut net = thing_node(webthing_settings);

    let response = put(&mut net, "/things/lamp/properties/on", Some("on=true"));
    assert_eq!(response.status, 500);
    assert_eq!(
        body_json(&response),
        json!({ "error": "Unable to parse request body", "status": 500 })
    );

    // Well-formed JSON, but not naming the property.
    let response = put(&mut net, "/things/lamp/properties/on", Some("{\"off\":true}"));
    assert_eq!(response.status, 500);
}

#[test]
fn put_on_read_only_property_is_refused() {
    let mut net = thing_node(webthing_settings);
    let response = put(&mut net, "/things/lamp/properties/level", Some("{\"level\":5}"));
    assert_eq!(response.status, 500);
    assert_eq!(body_json(&get(&mut net, "/things/lamp/properties/level")), json!({ "level": 40 }));
}

#[test]
fn put_unknown_targets_are_not_found() {
    let mut net = thing_node(webthing_settings);
    assert_eq!(put(&mut net, "/things/fan/properties/on", Some("{\"on\":true}")).status, 404);
    assert_eq!(put(&mut net, "/things/lamp/properties/x", Some("{\"x\":1}")).status, 404);
}

#[test]
fn put_change_is_confirmed_over_mqtt() {
    let mut net = thing_node(|s| {
        mqtt_only_settings(s);
        s.set_bool("supportingWebThing", true).unwrap();
    });
    assert!(net.is_mqtt_connected());
    let state_topic = "home/node/things/lamp/properties";
    let before = net.platform().mqtt.published_to(state_topic).len();

    let response = put(&mut net, "/things/lamp/properties/on", Some("{\"on\":true}"));
    assert_eq!(response.status, 200);
    assert_eq!(body_json(&response), json!({ "on": true }));

    let pushes = net.platform().mqtt.published_to(state_topic);
    assert_eq!(pushes.len(), before + 1);
    let last: Value = serde_json::from_str(pushes[pushes.len() - 1]).unwrap();
    assert_eq!(last, json!({ "on": true, "level": 40 }));

    // Same value again: nothing new to confirm.
    put(&mut net, "/things/lamp/properties/on", Some("{\"on\":true}"));
    assert_eq!(net.platform().mqtt.published_to(state_topic).len(), before + 1);
}

#[test]
fn http_dispatch_is_bounded_per_tick() {
    let mut net = thing_node(webthing_settings);
    for _ in 0..6 {
        net.platform_mut().http.push(HttpRequest::new(HttpMethod::Get, "/things/lamp"));
    }
    net.tick(20);
    assert_eq!(net.platform().http.responses.len(), 4);
    net.tick(30);
    assert_eq!(net.platform().http.responses.len(), 6);
}
