//! Typed device property with per-channel visibility.

use serde_json::Value;

use super::{Channel, ValueError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Boolean,
    Integer,
    Double,
    String,
}

impl PropertyKind {
    /// WebThing / JSON-schema type name.
    pub const fn json_type(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Double => "number",
            Self::String => "string",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
}

impl PropertyValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Boolean(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Double(d) => Value::from(*d),
            Self::String(s) => Value::String(s.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub web: bool,
    pub mqtt: bool,
}

impl Visibility {
    pub const ALL: Self = Self {
        web: true,
        mqtt: true,
    };
    pub const NONE: Self = Self {
        web: false,
        mqtt: false,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub id: String,
    pub title: String,
    pub kind: PropertyKind,
    pub unit: Option<String>,
    pub read_only: bool,
    pub visibility: Visibility,
    pub value: Option<PropertyValue>,
    /// Read over HTTP at least once since boot.
    pub requested: bool,
}

impl Property {
    pub fn new(id: &str, title: &str, kind: PropertyKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind,
            unit: None,
            read_only: false,
            visibility: Visibility::ALL,
            value: None,
            requested: false,
        }
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    #[must_use]
    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: PropertyValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn is_visible(&self, channel: Channel) -> bool {
        match channel {
            Channel::Web => self.visibility.web,
            Channel::Mqtt => self.visibility.mqtt,
        }
    }

    /// Set the value from device code.  Read-only applies to remote
    /// writers only.
    pub fn set(&mut self, value: PropertyValue) -> Result<(), ValueError> {
        if !self.accepts(&value) {
            return Err(ValueError::WrongKind);
        }
        self.value = Some(value);
        Ok(())
    }

    fn accepts(&self, value: &PropertyValue) -> bool {
        matches!(
            (self.kind, value),
            (PropertyKind::Boolean, PropertyValue::Boolean(_))
                | (PropertyKind::Integer, PropertyValue::Integer(_))
                | (PropertyKind::Double, PropertyValue::Double(_))
                | (PropertyKind::String, PropertyValue::String(_))
        )
    }

    /// Apply a raw text payload (MQTT single-property topic).
    pub fn parse_text(&mut self, raw: &str) -> Result<(), ValueError> {
        if self.read_only {
            return Err(ValueError::ReadOnly);
        }
        let raw_trimmed = raw.trim();
        let value = match self.kind {
            PropertyKind::Boolean => match raw_trimmed {
                "true" | "1" | "on" => PropertyValue::Boolean(true),
                "false" | "0" | "off" => PropertyValue::Boolean(false),
                _ => return Err(ValueError::Unparseable),
            },
            PropertyKind::Integer => PropertyValue::Integer(
                raw_trimmed.parse().map_err(|_| ValueError::Unparseable)?,
            ),
            PropertyKind::Double => PropertyValue::Double(
                raw_trimmed.parse().map_err(|_| ValueError::Unparseable)?,
            ),
            PropertyKind::String => PropertyValue::String(raw.into()),
        };
        self.value = Some(value);
        Ok(())
    }

    /// Apply a JSON value (HTTP PUT body or MQTT device object member).
    pub fn set_from_json(&mut self, json: &Value) -> Result<(), ValueError> {
        if self.read_only {
            return Err(ValueError::ReadOnly);
        }
        let value = match self.kind {
            PropertyKind::Boolean => json.as_bool().map(PropertyValue::Boolean),
            PropertyKind::Integer => json.as_i64().map(PropertyValue::Integer),
            PropertyKind::Double => json.as_f64().map(PropertyValue::Double),
            PropertyKind::String => json.as_str().map(|s| PropertyValue::String(s.into())),
        }
        .ok_or(ValueError::WrongKind)?;
        self.value = Some(value);
        Ok(())
    }

    pub fn value_json(&self) -> Value {
        self.value.as_ref().map_or(Value::Null, PropertyValue::to_json)
    }
}
