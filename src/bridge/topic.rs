//! MQTT topic layout.
//!
//! ```text
//! {base}/things/{device}/properties            device state (JSON object)
//! {base}/things/{device}/properties/{property} single property
//! {base}/webServer                             "true" starts, else stops
//! ```

/// Filter subscribed for the duration of the structure announcement.
pub const ANNOUNCE_FILTER: &str = "devices/#";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic<'a> {
    DeviceProperties { device: &'a str },
    Property { device: &'a str, property: &'a str },
    WebServer,
    Other,
}

impl<'a> Topic<'a> {
    /// Classify `topic` relative to the configured `base`.
    pub fn parse(base: &str, topic: &'a str) -> Self {
        let Some(rest) = topic
            .strip_prefix(base)
            .and_then(|r| r.strip_prefix('/'))
        else {
            return Self::Other;
        };

        if rest == "webServer" {
            return Self::WebServer;
        }

        let Some(rest) = rest.strip_prefix("things/") else {
            return Self::Other;
        };
        let Some((device, rest)) = rest.split_once('/') else {
            return Self::Other;
        };
        if device.is_empty() {
            return Self::Other;
        }
        let Some(rest) = rest.strip_prefix("properties") else {
            return Self::Other;
        };
        match rest.strip_prefix('/') {
            None if rest.is_empty() => Self::DeviceProperties { device },
            Some("") => Self::DeviceProperties { device },
            Some(property) => Self::Property { device, property },
            None => Self::Other,
        }
    }
}

pub fn device_href(base: &str, device: &str) -> String {
    format!("{base}/things/{device}")
}

pub fn device_properties(base: &str, device: &str) -> String {
    format!("{base}/things/{device}/properties")
}

pub fn property(base: &str, device: &str, property: &str) -> String {
    format!("{base}/things/{device}/properties/{property}")
}

/// Everything under the configured topic.
pub fn command_filter(base: &str) -> String {
    format!("{base}/#")
}

/// `{base}/{suffix}`, or `base` alone for an empty suffix.
pub fn under(base: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        base.into()
    } else {
        format!("{base}/{suffix}")
    }
}
