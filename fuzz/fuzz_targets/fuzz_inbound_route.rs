//! Fuzz target: `bridge::route_inbound`
//!
//! Routes arbitrary topics and payloads against a small device set.
//! Must never panic, and any device index it returns must exist.
//!
//! cargo fuzz run fuzz_inbound_route

#![no_main]

use libfuzzer_sys::fuzz_target;
use thingnode::app::ports::MqttMessage;
use thingnode::bridge::{self, InboundAction};
use thingnode::thing::{Device, DeviceSlot, Property, PropertyKind, PropertyValue};

struct Switch {
    properties: Vec<Property>,
}

impl Device for Switch {
    fn id(&self) -> &str {
        "switch"
    }

    fn title(&self) -> &str {
        "Switch"
    }

    fn properties(&self) -> &[Property] {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut [Property] {
        &mut self.properties
    }
}

fuzz_target!(|data: &[u8]| {
    // First byte splits topic from payload.
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).min(rest.len());
    let (topic, payload) = rest.split_at(split);
    let message = MqttMessage {
        topic: format!("home/node/{}", String::from_utf8_lossy(topic)),
        payload: payload.to_vec(),
    };

    let mut slots = vec![DeviceSlot::new(Box::new(Switch {
        properties: vec![
            Property::new("on", "On", PropertyKind::Boolean).with_value(PropertyValue::Boolean(false)),
            Property::new("level", "Level", PropertyKind::Integer).with_value(PropertyValue::Integer(0)),
            Property::new("name", "Name", PropertyKind::String)
                .with_value(PropertyValue::String(String::new())),
        ],
    }))];

    if let InboundAction::PushState { device } = bridge::route_inbound("home/node", &message, &mut slots) {
        assert!(device < slots.len());
    }
});
