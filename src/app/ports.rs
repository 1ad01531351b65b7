//! Port traits: the hexagonal boundary between the connectivity core and
//! the platform.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Network (orchestrator)
//! ```
//!
//! Every external collaborator (radio, sockets, broker client, flash, LED,
//! persistent region) is reached through one of these traits.  The
//! [`Network`](crate::network::Network) owns a [`Platform`] that hands out
//! the ports, so the whole state machine runs against mocks on the host.
//!
//! ## Contract notes
//!
//! - No port method may block beyond its own bounded I/O timeout.
//! - **EepromPort::commit** MUST replace the whole region atomically.
//! - Port errors are typed; the core decides whether they are retried.

use core::fmt;
use core::net::Ipv4Addr;

use super::events::NetworkEvent;

// ───────────────────────────────────────────────────────────────
// Persistent region port (settings ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Fixed-size byte region backing the settings store.
pub trait EepromPort {
    /// Region size in bytes.
    fn size(&self) -> usize;

    /// Copy the stored region into `buf`.  Returns the number of bytes
    /// read, or [`StorageError::NotFound`] if nothing was ever committed.
    fn read(&self, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Replace the whole region with `data` in one atomic write.
    fn commit(&mut self, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// WiFi port (station + configuration access point)
// ───────────────────────────────────────────────────────────────

pub trait WifiPort {
    /// Start association with `ssid`.  Returns as soon as the attempt is
    /// under way; the outcome shows up through [`is_station_connected`].
    ///
    /// [`is_station_connected`]: WifiPort::is_station_connected
    fn begin_station(&mut self, ssid: &str, password: &str, hostname: &str)
    -> Result<(), WifiError>;

    /// Drop any station association (also clears stale attempts).
    fn disconnect(&mut self);

    fn is_station_connected(&self) -> bool;

    fn station_ip(&self) -> Option<Ipv4Addr>;

    /// Open the configuration access point and return its address.
    fn start_soft_ap(&mut self, ssid: &str, password: &str) -> Result<Ipv4Addr, WifiError>;

    fn stop_soft_ap(&mut self);

    fn mac_address(&self) -> [u8; 6];
}

// ───────────────────────────────────────────────────────────────
// HTTP server port
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Other,
}

impl HttpMethod {
    pub fn parse(s: &str) -> Self {
        match s {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            _ => Self::Other,
        }
    }
}

/// A fully read request.  Query parameters are already percent-decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, path: &str) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Value of query parameter `name`, if present.
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Value of query parameter `name`, or `""`.
    pub fn arg_or_empty(&self, name: &str) -> &str {
        self.arg(name).unwrap_or("")
    }

    #[must_use]
    pub fn with_arg(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: &[u8]) -> Self {
        self.body = Some(body.to_vec());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

pub const TEXT_HTML: &str = "text/html";
pub const APPLICATION_JSON: &str = "application/json";

impl HttpResponse {
    pub fn html(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: TEXT_HTML,
            headers: Vec::new(),
            body,
        }
    }

    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: APPLICATION_JSON,
            headers: Vec::new(),
            body,
        }
    }

    /// Status-only response with an empty body.
    pub fn status(status: u16) -> Self {
        Self::html(status, String::new())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Chunked firmware upload, delivered in order before the final
/// `POST /firmware` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Start { filename: String },
    Data(Vec<u8>),
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HttpEvent {
    Request(HttpRequest),
    Upload(UploadEvent),
}

pub trait HttpServerPort {
    fn begin(&mut self, port: u16) -> Result<(), SocketError>;

    fn stop(&mut self);

    /// Next queued request or upload event, without blocking.
    fn poll(&mut self) -> Option<HttpEvent>;

    /// Answer the request most recently returned by [`poll`](Self::poll).
    fn respond(&mut self, response: HttpResponse);
}

// ───────────────────────────────────────────────────────────────
// Captive DNS port (soft-AP only)
// ───────────────────────────────────────────────────────────────

pub trait CaptiveDnsPort {
    /// Answer every A query with `answer`.
    fn start(&mut self, port: u16, answer: Ipv4Addr) -> Result<(), SocketError>;

    fn stop(&mut self);

    /// Handle at most one pending query.
    fn process_next_request(&mut self);
}

// ───────────────────────────────────────────────────────────────
// MQTT client port
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

pub trait MqttPort {
    /// Connect and wait for the broker's answer.
    fn connect(
        &mut self,
        server: &str,
        port: u16,
        client_id: &str,
        user: &str,
        password: &str,
    ) -> Result<(), MqttError>;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), MqttError>;

    fn subscribe(&mut self, filter: &str) -> Result<(), MqttError>;

    fn unsubscribe(&mut self, filter: &str) -> Result<(), MqttError>;

    /// Next inbound message, without blocking.
    fn poll(&mut self) -> Option<MqttMessage>;
}

// ───────────────────────────────────────────────────────────────
// Service discovery port (mDNS)
// ───────────────────────────────────────────────────────────────

pub trait DiscoveryPort {
    /// Advertise `_http._tcp` on `port` with the given TXT records.
    fn start(&mut self, hostname: &str, port: u16, txt: &[(&str, &str)]) -> bool;

    /// Per-tick maintenance of the responder.
    fn update(&mut self);

    fn stop(&mut self);

    fn is_active(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Firmware flasher port
// ───────────────────────────────────────────────────────────────

pub trait FlasherPort {
    /// Erase a region of `size` bytes for the incoming image.
    fn begin(&mut self, size: u32) -> Result<(), FlashError>;

    /// Append a chunk.  Returns the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, FlashError>;

    /// Verify and activate the written image.
    fn end(&mut self) -> Result<(), FlashError>;

    fn abort(&mut self);
}

// ───────────────────────────────────────────────────────────────
// System port (chip info, reset, sleep)
// ───────────────────────────────────────────────────────────────

pub trait SystemPort {
    fn chip_id(&self) -> u32;
    fn flash_chip_id(&self) -> u32;
    fn flash_chip_size(&self) -> u32;
    fn sketch_size(&self) -> u32;
    fn free_sketch_space(&self) -> u32;

    /// Busy-wait; only used on the reset and sleep paths.
    fn delay_ms(&mut self, ms: u32);

    /// Hard reset.  Does not return on hardware.
    fn restart(&mut self);

    /// Timed low-power sleep.  Does not return on hardware.
    fn deep_sleep(&mut self, secs: u32);
}

// ───────────────────────────────────────────────────────────────
// Status indicator port
// ───────────────────────────────────────────────────────────────

pub trait StatusIndicatorPort {
    /// `blink_ms == 0` means solid.
    fn set_on(&mut self, on: bool, blink_ms: u32);

    fn tick(&mut self, now_ms: u64);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (core → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`NetworkEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &NetworkEvent);
}

// ───────────────────────────────────────────────────────────────
// Platform bundle
// ───────────────────────────────────────────────────────────────

/// Hands out every port the orchestrator needs.  One owner, no sharing.
pub trait Platform {
    fn wifi(&mut self) -> &mut dyn WifiPort;
    fn http(&mut self) -> &mut dyn HttpServerPort;
    fn dns(&mut self) -> &mut dyn CaptiveDnsPort;
    fn mqtt(&mut self) -> &mut dyn MqttPort;
    fn discovery(&mut self) -> &mut dyn DiscoveryPort;
    fn flasher(&mut self) -> &mut dyn FlasherPort;
    fn system(&mut self) -> &mut dyn SystemPort;
    fn status_indicator(&mut self) -> Option<&mut dyn StatusIndicatorPort>;
    fn events(&mut self) -> &mut dyn EventSink;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`EepromPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Nothing committed yet (first boot).
    NotFound,
    /// Data larger than the region.
    Full,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "region not found"),
            Self::Full => write!(f, "region full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    AccessPointFailed,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(
                f,
                "password invalid (must be 8-64 bytes for WPA2, or empty for open)"
            ),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AccessPointFailed => write!(f, "access point could not be started"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketError {
    BindFailed,
    Io,
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BindFailed => write!(f, "bind failed"),
            Self::Io => write!(f, "socket I/O error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttError {
    /// Handshake refused or timed out; carries the client state code.
    ConnectFailed(i32),
    NotConnected,
    PublishFailed,
    SubscribeFailed,
}

impl fmt::Display for MqttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed(rc) => write!(f, "connect failed, rc={rc}"),
            Self::NotConnected => write!(f, "not connected"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    NotEnoughSpace,
    EraseFailed,
    WriteFailed,
    VerifyFailed,
    NotStarted,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotEnoughSpace => write!(f, "Not Enough Space"),
            Self::EraseFailed => write!(f, "Flash Erase Failed"),
            Self::WriteFailed => write!(f, "Flash Write Failed"),
            Self::VerifyFailed => write!(f, "Image Verification Failed"),
            Self::NotStarted => write!(f, "Update Not Started"),
        }
    }
}
