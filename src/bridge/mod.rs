//! Protocol bridge between device properties and the outside world.
//!
//! Inbound MQTT messages are classified by [`topic::Topic`] and applied to
//! the device registry here; the resulting [`InboundAction`] tells the
//! orchestrator what to do next (push state, toggle the web server).
//! Outbound payloads are built in [`json`].

pub mod json;
pub mod topic;

use log::debug;

use crate::app::ports::MqttMessage;
use crate::thing::{Channel, DeviceSlot, find_device};
use topic::Topic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundAction {
    /// Publish the device's current state (read request or write
    /// confirmation).
    PushState { device: usize },
    EnableWebServer(bool),
    Ignored,
}

/// Apply one inbound message to `slots`.
pub fn route_inbound(base: &str, message: &MqttMessage, slots: &mut [DeviceSlot]) -> InboundAction {
    match Topic::parse(base, &message.topic) {
        Topic::WebServer => InboundAction::EnableWebServer(message.payload == b"true"),
        Topic::DeviceProperties { device } => {
            let Some(index) = find_device(slots, device) else {
                return InboundAction::Ignored;
            };
            if message.payload.is_empty() {
                return InboundAction::PushState { device: index };
            }
            let target = slots[index].device.as_mut();
            match json::apply_object(target, &message.payload, Channel::Mqtt) {
                Ok(r) if r.matched == 0 => InboundAction::PushState { device: index },
                Ok(r) if r.changed > 0 => {
                    debug!("MQTT: {} properties of '{}' changed", r.changed, device);
                    InboundAction::PushState { device: index }
                }
                Ok(_) => InboundAction::Ignored,
                Err(_) => InboundAction::PushState { device: index },
            }
        }
        Topic::Property { device, property } => {
            let Some(index) = find_device(slots, device) else {
                return InboundAction::Ignored;
            };
            let Some(p) = slots[index].device.property_mut(property) else {
                return InboundAction::Ignored;
            };
            if !p.is_visible(Channel::Mqtt) {
                return InboundAction::Ignored;
            }
            let before = p.value.clone();
            let text = String::from_utf8_lossy(&message.payload);
            match p.parse_text(&text) {
                Ok(()) if p.value != before => InboundAction::PushState { device: index },
                Ok(()) => InboundAction::Ignored,
                Err(e) => {
                    debug!("MQTT: '{}' rejected for {}/{}: {}", text, device, property, e);
                    InboundAction::Ignored
                }
            }
        }
        Topic::Other => InboundAction::Ignored,
    }
}
