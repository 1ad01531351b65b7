//! JSON payload shapes for HTTP and MQTT.

use serde_json::{Map, Value, json};

use crate::thing::{Channel, Device, Property, ValueError};

pub const WEBTHING_CONTEXT: &str = "https://iot.mozilla.org/schemas";

/// Flat object of channel-visible properties that carry a value.
pub fn values(device: &dyn Device, channel: Channel) -> Value {
    let mut map = Map::new();
    for p in device.properties() {
        if let (true, Some(v)) = (p.is_visible(channel), &p.value) {
            map.insert(p.id.clone(), v.to_json());
        }
    }
    Value::Object(map)
}

/// `{"<id>": value}`.
pub fn single_value(property: &Property) -> Value {
    let mut map = Map::new();
    map.insert(property.id.clone(), property.value_json());
    Value::Object(map)
}

fn describe(property: &Property, href: String) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("title".into(), Value::String(property.title.clone()));
    map.insert("type".into(), property.kind.json_type().into());
    map.insert("readOnly".into(), Value::Bool(property.read_only));
    if let Some(unit) = &property.unit {
        map.insert("unit".into(), Value::String(unit.clone()));
    }
    map.insert("href".into(), Value::String(href));
    map
}

/// Structure message published per MQTT-visible property after connect.
pub fn mqtt_structure(property: &Property, device_href: &str) -> Value {
    let href = format!("{device_href}/properties/{}", property.id);
    Value::Object(describe(property, href))
}

/// WebThing description served at `/things/{id}`.
pub fn thing_description(device: &dyn Device) -> Value {
    let base = format!("/things/{}", device.id());
    let mut properties = Map::new();
    for p in device.properties().iter().filter(|p| p.is_visible(Channel::Web)) {
        let href = format!("{base}/properties/{}", p.id);
        let mut desc = describe(p, href.clone());
        desc.remove("href");
        desc.insert("links".into(), json!([{ "href": href }]));
        properties.insert(p.id.clone(), Value::Object(desc));
    }
    json!({
        "id": device.id(),
        "title": device.title(),
        "@context": WEBTHING_CONTEXT,
        "properties": properties,
        "links": [
            { "rel": "properties", "href": format!("{base}/properties") }
        ],
    })
}

/// Descriptions of every web-visible device.
pub fn thing_collection<'a>(devices: impl Iterator<Item = &'a dyn Device>) -> Value {
    Value::Array(
        devices
            .filter(|d| d.is_visible(Channel::Web))
            .map(thing_description)
            .collect(),
    )
}

pub fn error_body(message: &str, status: u16) -> Value {
    json!({ "error": message, "status": status })
}

/// Outcome of applying a JSON object to a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Keys naming a property visible on the channel.
    pub matched: usize,
    /// Properties whose value actually changed.
    pub changed: usize,
}

/// Apply the members of a JSON object to same-named properties.
///
/// Read-only properties are matched but left untouched, so a device's own
/// state message coming back from the broker is absorbed without effect.
pub fn apply_object(
    device: &mut dyn Device,
    payload: &[u8],
    channel: Channel,
) -> Result<ApplyReport, ValueError> {
    let Ok(Value::Object(members)) = serde_json::from_slice::<Value>(payload) else {
        return Err(ValueError::Unparseable);
    };
    let mut report = ApplyReport::default();
    for (key, value) in &members {
        let Some(property) = device.property_mut(key) else {
            continue;
        };
        if !property.is_visible(channel) {
            continue;
        }
        report.matched += 1;
        if property.read_only {
            continue;
        }
        let before = property.value.clone();
        if property.set_from_json(value).is_ok() && property.value != before {
            report.changed += 1;
        }
    }
    Ok(report)
}
