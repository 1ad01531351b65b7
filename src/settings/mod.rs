//! Typed settings store over a fixed-size persistent byte region.
//!
//! Every field is registered with an id, a kind and a default.  Addresses
//! are handed out by a bump allocator in registration order, starting at
//! byte 1; byte 0 holds the [`SENTINEL`] once [`SettingsStore::save`] has
//! run.  The layout carries no schema, so the registration order must stay
//! identical across firmware builds.
//!
//! ```text
//!  0      1            1+w0          1+w0+w1
//!  ┌──────┬────────────┬─────────────┬──────── ─ ─
//!  │ 0x15 │  field 0   │   field 1   │  ...
//!  └──────┴────────────┴─────────────┴──────── ─ ─
//! ```
//!
//! Values live in memory; nothing reaches the region until `save()`, which
//! rewrites every window plus the sentinel and commits once.

pub mod network;

use core::fmt;

use log::{debug, info, warn};

use crate::app::ports::{EepromPort, StorageError};

/// Marker byte at address 0 meaning "a save has happened".
pub const SENTINEL: u8 = 0x15;

/// First address available to fields.
pub const FIRST_ADDRESS: usize = 1;

// ── Types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Boolean,
    Byte,
    Integer,
    Double,
    /// `max_len` bytes of text plus one NUL terminator.
    String { max_len: usize },
}

impl SettingKind {
    /// Bytes occupied in the persistent region.
    pub const fn width(self) -> usize {
        match self {
            Self::Boolean | Self::Byte => 1,
            Self::Integer => 2,
            Self::Double => 8,
            Self::String { max_len } => max_len + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Boolean(bool),
    Byte(u8),
    Integer(i32),
    Double(f64),
    String(String),
}

impl SettingValue {
    fn fits(&self, kind: SettingKind) -> bool {
        matches!(
            (self, kind),
            (Self::Boolean(_), SettingKind::Boolean)
                | (Self::Byte(_), SettingKind::Byte)
                | (Self::Integer(_), SettingKind::Integer)
                | (Self::Double(_), SettingKind::Double)
                | (Self::String(_), SettingKind::String { .. })
        )
    }

    /// Strings are cut to what the field can persist.
    fn clamped(self, kind: SettingKind) -> Self {
        match (self, kind) {
            (Self::String(s), SettingKind::String { max_len }) if s.len() > max_len => {
                Self::String(truncate_utf8(&s, max_len).to_owned())
            }
            (value, _) => value,
        }
    }
}

/// Handle returned by registration; stable for the life of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SettingId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    /// Registered fields do not fit into the region.
    OutOfSpace { needed: usize, available: usize },
    UnknownSetting,
    /// Id already registered with another kind, or value of the wrong kind.
    TypeMismatch,
    Storage(StorageError),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfSpace { needed, available } => {
                write!(f, "out of space: {needed} bytes needed, {available} available")
            }
            Self::UnknownSetting => write!(f, "unknown setting"),
            Self::TypeMismatch => write!(f, "type mismatch"),
            Self::Storage(e) => write!(f, "storage: {e}"),
        }
    }
}

impl From<StorageError> for SettingsError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

struct Setting {
    id: String,
    kind: SettingKind,
    address: usize,
    value: SettingValue,
}

// ── Store ─────────────────────────────────────────────────────

pub struct SettingsStore {
    region: Box<dyn EepromPort>,
    shadow: Vec<u8>,
    settings: Vec<Setting>,
    next_address: usize,
    exists: bool,
}

impl SettingsStore {
    /// Read the region once and decide whether a prior save exists.
    pub fn open(region: Box<dyn EepromPort>) -> Self {
        let size = region.size();
        let mut shadow = vec![0u8; size];
        let exists = match region.read(&mut shadow) {
            Ok(n) => n > 0 && shadow.first() == Some(&SENTINEL),
            Err(StorageError::NotFound) => {
                info!("Settings: region empty (first boot)");
                false
            }
            Err(e) => {
                warn!("Settings: region read failed ({}), using defaults", e);
                false
            }
        };
        if !exists {
            shadow.iter_mut().for_each(|b| *b = 0);
        }
        debug!("Settings: region {} bytes, prior save: {}", size, exists);
        Self {
            region,
            shadow,
            settings: Vec::new(),
            next_address: FIRST_ADDRESS,
            exists,
        }
    }

    /// Register `id`, or return the existing handle if already registered.
    pub fn register(
        &mut self,
        id: &str,
        kind: SettingKind,
        default: SettingValue,
    ) -> Result<SettingId, SettingsError> {
        if let Some(index) = self.index_of(id) {
            if self.settings[index].kind != kind {
                return Err(SettingsError::TypeMismatch);
            }
            return Ok(SettingId(index));
        }
        if !default.fits(kind) {
            return Err(SettingsError::TypeMismatch);
        }

        let address = self.next_address;
        let end = address + kind.width();
        if end > self.shadow.len() {
            return Err(SettingsError::OutOfSpace {
                needed: end,
                available: self.shadow.len(),
            });
        }

        let value = if self.exists {
            decode(kind, &self.shadow[address..end])
        } else {
            default.clamped(kind)
        };
        debug!("Settings: '{}' @{} = {:?}", id, address, value);

        self.next_address = end;
        self.settings.push(Setting {
            id: id.into(),
            kind,
            address,
            value,
        });
        Ok(SettingId(self.settings.len() - 1))
    }

    pub fn register_bool(&mut self, id: &str, default: bool) -> Result<SettingId, SettingsError> {
        self.register(id, SettingKind::Boolean, SettingValue::Boolean(default))
    }

    pub fn register_byte(&mut self, id: &str, default: u8) -> Result<SettingId, SettingsError> {
        self.register(id, SettingKind::Byte, SettingValue::Byte(default))
    }

    pub fn register_integer(&mut self, id: &str, default: i32) -> Result<SettingId, SettingsError> {
        self.register(id, SettingKind::Integer, SettingValue::Integer(default))
    }

    pub fn register_double(&mut self, id: &str, default: f64) -> Result<SettingId, SettingsError> {
        self.register(id, SettingKind::Double, SettingValue::Double(default))
    }

    pub fn register_string(
        &mut self,
        id: &str,
        max_len: usize,
        default: &str,
    ) -> Result<SettingId, SettingsError> {
        self.register(
            id,
            SettingKind::String { max_len },
            SettingValue::String(default.into()),
        )
    }

    // ── Lookup ──

    fn index_of(&self, id: &str) -> Option<usize> {
        self.settings.iter().position(|s| s.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&SettingValue> {
        self.index_of(id).map(|i| &self.settings[i].value)
    }

    /// Value behind a handle from this store.
    pub fn value(&self, handle: SettingId) -> Option<&SettingValue> {
        self.settings.get(handle.0).map(|s| &s.value)
    }

    pub fn bool(&self, id: &str) -> bool {
        matches!(self.get(id), Some(SettingValue::Boolean(true)))
    }

    pub fn byte(&self, id: &str) -> u8 {
        match self.get(id) {
            Some(SettingValue::Byte(b)) => *b,
            _ => 0,
        }
    }

    pub fn integer(&self, id: &str) -> i32 {
        match self.get(id) {
            Some(SettingValue::Integer(v)) => *v,
            _ => 0,
        }
    }

    pub fn double(&self, id: &str) -> f64 {
        match self.get(id) {
            Some(SettingValue::Double(v)) => *v,
            _ => 0.0,
        }
    }

    pub fn string(&self, id: &str) -> &str {
        match self.get(id) {
            Some(SettingValue::String(s)) => s,
            _ => "",
        }
    }

    // ── Mutation (memory only) ──

    pub fn set(&mut self, id: &str, value: SettingValue) -> Result<(), SettingsError> {
        let index = self.index_of(id).ok_or(SettingsError::UnknownSetting)?;
        let setting = &mut self.settings[index];
        if !value.fits(setting.kind) {
            return Err(SettingsError::TypeMismatch);
        }
        setting.value = value.clamped(setting.kind);
        Ok(())
    }

    pub fn set_bool(&mut self, id: &str, value: bool) -> Result<(), SettingsError> {
        self.set(id, SettingValue::Boolean(value))
    }

    pub fn set_byte(&mut self, id: &str, value: u8) -> Result<(), SettingsError> {
        self.set(id, SettingValue::Byte(value))
    }

    pub fn set_integer(&mut self, id: &str, value: i32) -> Result<(), SettingsError> {
        self.set(id, SettingValue::Integer(value))
    }

    pub fn set_double(&mut self, id: &str, value: f64) -> Result<(), SettingsError> {
        self.set(id, SettingValue::Double(value))
    }

    pub fn set_string(&mut self, id: &str, value: &str) -> Result<(), SettingsError> {
        self.set(id, SettingValue::String(value.into()))
    }

    // ── Introspection ──

    pub fn address(&self, id: &str) -> Option<usize> {
        self.index_of(id).map(|i| self.settings[i].address)
    }

    pub fn exists_setting(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }

    /// Whether a save had happened when the store was opened.  Cached.
    pub fn exists_settings(&self) -> bool {
        self.exists
    }

    /// Bytes in use, sentinel included.
    pub fn footprint(&self) -> usize {
        self.next_address
    }

    pub fn region_size(&self) -> usize {
        self.shadow.len()
    }

    // ── Persistence ──

    /// Encode every field, set the sentinel and commit the region once.
    pub fn save(&mut self) -> Result<(), SettingsError> {
        for s in &self.settings {
            let window = &mut self.shadow[s.address..s.address + s.kind.width()];
            encode(&s.value, s.kind, window);
        }
        if let Some(first) = self.shadow.first_mut() {
            *first = SENTINEL;
        }
        self.region.commit(&self.shadow)?;
        info!(
            "Settings: saved {} fields ({} bytes)",
            self.settings.len(),
            self.footprint()
        );
        Ok(())
    }
}

// ── Codec ─────────────────────────────────────────────────────

fn encode(value: &SettingValue, kind: SettingKind, out: &mut [u8]) {
    match value {
        SettingValue::Boolean(b) => out[0] = if *b { 0xFF } else { 0x00 },
        SettingValue::Byte(b) => out[0] = *b,
        // Low 16 bits only; larger values wrap.
        SettingValue::Integer(v) => out.copy_from_slice(&(*v as u16).to_le_bytes()),
        SettingValue::Double(v) => out.copy_from_slice(&v.to_le_bytes()),
        SettingValue::String(s) => {
            let max_len = match kind {
                SettingKind::String { max_len } => max_len,
                _ => 0,
            };
            let text = truncate_utf8(s, max_len).as_bytes();
            out.fill(0);
            out[..text.len()].copy_from_slice(text);
        }
    }
}

fn decode(kind: SettingKind, window: &[u8]) -> SettingValue {
    match kind {
        SettingKind::Boolean => SettingValue::Boolean(window[0] == 0xFF),
        SettingKind::Byte => SettingValue::Byte(window[0]),
        SettingKind::Integer => {
            SettingValue::Integer(i32::from(u16::from_le_bytes([window[0], window[1]])))
        }
        SettingKind::Double => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&window[..8]);
            SettingValue::Double(f64::from_le_bytes(raw))
        }
        SettingKind::String { .. } => {
            let end = window.iter().position(|&b| b == 0).unwrap_or(window.len());
            SettingValue::String(String::from_utf8_lossy(&window[..end]).into_owned())
        }
    }
}

/// Longest prefix of `s` that is at most `max` bytes and ends on a char
/// boundary.
pub fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
