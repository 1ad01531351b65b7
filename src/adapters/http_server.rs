//! Polled HTTP/1.1 server on `std::net` sockets.
//!
//! Implements [`HttpServerPort`].  ESP-IDF exposes lwIP through the std
//! socket API, so the same code runs on the device and on the host.
//!
//! One connection is handled at a time and every response closes it.
//! The listener and the accepted connection are both non-blocking: a poll
//! reads whatever has arrived and returns, so a slow client never stalls
//! the caller. A client that stays silent for [`IO_TIMEOUT`] is dropped.
//!
//! A `multipart/form-data` body is streamed out as a sequence of
//! [`UploadEvent`]s, one per [`poll`](HttpServerPort::poll), followed by
//! the request itself once the closing boundary has been seen:
//!
//! ```text
//!   --<boundary>\r\n
//!   Content-Disposition: form-data; name="update"; filename="fw.bin"\r\n
//!   \r\n                                   ──▶ Upload(Start { "fw.bin" })
//!   <image bytes>                          ──▶ Upload(Data(..)) …
//!   \r\n--<boundary>--\r\n                 ──▶ Upload(End), Request(POST …)
//! ```

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::utils::{find_subsequence, parse_query};
use crate::app::ports::{
    HttpEvent, HttpMethod, HttpRequest, HttpResponse, HttpServerPort, SocketError, UploadEvent,
};

const MAX_HEADER_BYTES: usize = 4096;
const MAX_BODY_BYTES: usize = 8192;
const CHUNK_SIZE: usize = 2048;
const MAX_BOUNDARY_LEN: usize = 120;
const IO_TIMEOUT: Duration = Duration::from_secs(5);

// ── Request head ──────────────────────────────────────────────

#[derive(Debug)]
struct Head {
    request: HttpRequest,
    content_length: usize,
    content_type: String,
}

fn parse_head(raw: &[u8]) -> Option<Head> {
    let text = core::str::from_utf8(raw).ok()?;
    let mut lines = text.split("\r\n");

    let mut parts = lines.next()?.split(' ');
    let method = HttpMethod::parse(parts.next()?);
    let target = parts.next()?;
    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    let mut request = HttpRequest::new(method, path);
    request.query = parse_query(query);

    let mut content_length = 0;
    let mut content_type = String::new();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse().ok()?;
        } else if name.eq_ignore_ascii_case("content-type") {
            content_type = value.to_string();
        }
    }
    Some(Head {
        request,
        content_length,
        content_type,
    })
}

/// `boundary=<value>` from a Content-Type header, quoted or bare.
fn find_boundary(content_type: &str) -> Option<&str> {
    let lower = content_type.to_ascii_lowercase();
    let start = lower.find("boundary=")? + "boundary=".len();
    let rest = &content_type[start..];
    let value = match rest.strip_prefix('"') {
        Some(inner) => &inner[..inner.find('"')?],
        None => rest.split([';', ' ']).next().unwrap_or(""),
    };
    (!value.is_empty() && value.len() <= MAX_BOUNDARY_LEN).then_some(value)
}

fn extract_filename(part_headers: &[u8]) -> Option<String> {
    let marker = b"filename=\"";
    let pos = part_headers
        .windows(marker.len())
        .position(|w| w.eq_ignore_ascii_case(marker))?;
    let rest = &part_headers[pos + marker.len()..];
    let end = rest.iter().position(|&b| b == b'"')?;
    Some(String::from_utf8_lossy(&rest[..end]).into_owned())
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        302 => "Found",
        400 => "Bad Request",
        404 => "Not Found",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        _ => "",
    }
}

fn write_response(stream: &mut TcpStream, response: &HttpResponse) -> std::io::Result<()> {
    // Responses are small; let the socket block for them.
    stream.set_nonblocking(false)?;
    stream.set_write_timeout(Some(IO_TIMEOUT))?;
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        reason(response.status),
        response.content_type,
        response.body.len()
    );
    for (name, value) in &response.headers {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes())?;
    stream.write_all(response.body.as_bytes())?;
    stream.flush()
}

fn reject(mut stream: TcpStream, status: u16) {
    let _ = write_response(&mut stream, &HttpResponse::status(status));
}

// ── Non-blocking reads ────────────────────────────────────────

enum Fill {
    Data,
    /// Nothing buffered by the peer right now.
    Idle,
    Closed,
}

fn fill(stream: &mut TcpStream, work: &mut Vec<u8>) -> Fill {
    let mut buf = [0u8; CHUNK_SIZE];
    match stream.read(&mut buf) {
        Ok(0) => Fill::Closed,
        Ok(n) => {
            work.extend_from_slice(&buf[..n]);
            Fill::Data
        }
        Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => Fill::Idle,
        Err(e) => {
            debug!("HTTP: read failed: {}", e);
            Fill::Closed
        }
    }
}

// ── Request arrival ───────────────────────────────────────────

/// A connection whose head (and small body) is still arriving.
struct Incoming {
    stream: TcpStream,
    raw: Vec<u8>,
    head: Option<Head>,
    last_read: Instant,
}

enum Arrival {
    Waiting,
    Request(HttpRequest),
    Upload { request: HttpRequest, boundary: String },
    Reject(u16),
    Dropped,
}

impl Incoming {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            raw: Vec::with_capacity(512),
            head: None,
            last_read: Instant::now(),
        }
    }

    fn advance(&mut self) -> Arrival {
        loop {
            match self.head.as_ref().map(|h| h.content_length) {
                None => {
                    if let Some(pos) = find_subsequence(&self.raw, b"\r\n\r\n") {
                        let Some(head) = parse_head(&self.raw[..pos]) else {
                            return Arrival::Reject(400);
                        };
                        self.raw.drain(..pos + 4);
                        if head.content_type.to_ascii_lowercase().starts_with("multipart/form-data") {
                            let Some(boundary) = find_boundary(&head.content_type) else {
                                return Arrival::Reject(400);
                            };
                            let boundary = boundary.to_string();
                            return Arrival::Upload {
                                request: head.request,
                                boundary,
                            };
                        }
                        if head.content_length > MAX_BODY_BYTES {
                            return Arrival::Reject(413);
                        }
                        self.head = Some(head);
                        continue;
                    }
                    if self.raw.len() >= MAX_HEADER_BYTES {
                        return Arrival::Reject(400);
                    }
                }
                Some(len) if self.raw.len() >= len => return self.finish(),
                Some(_) => {}
            }

            match fill(&mut self.stream, &mut self.raw) {
                Fill::Data => self.last_read = Instant::now(),
                Fill::Idle if self.last_read.elapsed() < IO_TIMEOUT => return Arrival::Waiting,
                Fill::Idle => {
                    debug!("HTTP: client went quiet, dropping");
                    return Arrival::Dropped;
                }
                // Half-closed peers still get whatever body they sent.
                Fill::Closed if self.head.is_some() => return self.finish(),
                Fill::Closed => return Arrival::Dropped,
            }
        }
    }

    fn finish(&mut self) -> Arrival {
        let Some(head) = self.head.take() else {
            return Arrival::Dropped;
        };
        let mut request = head.request;
        let mut body = core::mem::take(&mut self.raw);
        body.truncate(head.content_length);
        if head.content_type.starts_with("application/x-www-form-urlencoded") {
            request.query.extend(parse_query(&String::from_utf8_lossy(&body)));
        } else if !body.is_empty() {
            request.body = Some(body);
        }
        Arrival::Request(request)
    }
}

// ── Multipart streaming ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Preamble,
    Streaming,
    /// Closing boundary seen; `End` is next.
    Ending,
    /// `End` sent; the request is next.
    Complete,
    /// Peer went away mid-transfer; `End` is next, then the connection is
    /// dropped without a response.
    Broken,
}

#[derive(Debug)]
struct Upload {
    request: HttpRequest,
    end_marker: Vec<u8>,
    work: Vec<u8>,
    phase: Phase,
    last_read: Instant,
}

enum Step {
    Event(HttpEvent),
    /// Waiting on the peer.
    Pending,
    /// Transfer over; answer the request.
    Done(HttpRequest),
    /// Transfer over; nobody left to answer.
    Closed,
    Reject(u16),
}

impl Upload {
    fn new(request: HttpRequest, boundary: &str, initial: Vec<u8>) -> Self {
        let mut end_marker = b"\r\n--".to_vec();
        end_marker.extend_from_slice(boundary.as_bytes());
        Self {
            request,
            end_marker,
            work: initial,
            phase: Phase::Preamble,
            last_read: Instant::now(),
        }
    }

    /// `Some(true)` when bytes arrived, `Some(false)` when the peer is gone
    /// or stalled, `None` while it may still send more.
    fn fill(&mut self, stream: &mut TcpStream) -> Option<bool> {
        match fill(stream, &mut self.work) {
            Fill::Data => {
                self.last_read = Instant::now();
                Some(true)
            }
            Fill::Idle if self.last_read.elapsed() < IO_TIMEOUT => None,
            Fill::Idle => {
                warn!("HTTP: upload stalled");
                Some(false)
            }
            Fill::Closed => Some(false),
        }
    }

    fn advance(&mut self, stream: &mut TcpStream) -> Step {
        loop {
            match self.phase {
                Phase::Preamble => {
                    if let Some(pos) = find_subsequence(&self.work, b"\r\n\r\n") {
                        let filename = extract_filename(&self.work[..pos])
                            .unwrap_or_else(|| String::from("firmware.bin"));
                        self.work.drain(..pos + 4);
                        self.phase = Phase::Streaming;
                        return Step::Event(HttpEvent::Upload(UploadEvent::Start { filename }));
                    }
                    if self.work.len() >= MAX_HEADER_BYTES {
                        return Step::Reject(400);
                    }
                    match self.fill(stream) {
                        Some(true) => {}
                        Some(false) => return Step::Reject(400),
                        None => return Step::Pending,
                    }
                }
                Phase::Streaming => {
                    if let Some(pos) = find_subsequence(&self.work, &self.end_marker) {
                        let data: Vec<u8> = self.work.drain(..pos).collect();
                        self.work.clear();
                        self.phase = Phase::Ending;
                        if !data.is_empty() {
                            return Step::Event(HttpEvent::Upload(UploadEvent::Data(data)));
                        }
                        continue;
                    }
                    // Hold back enough bytes to catch a marker split across reads.
                    let hold = self.end_marker.len();
                    if self.work.len() >= hold + CHUNK_SIZE {
                        let safe = self.work.len() - hold;
                        let data = self.work.drain(..safe).collect();
                        return Step::Event(HttpEvent::Upload(UploadEvent::Data(data)));
                    }
                    let more = match self.fill(stream) {
                        Some(more) => more,
                        None => return Step::Pending,
                    };
                    if !more {
                        warn!("HTTP: upload truncated");
                        self.phase = Phase::Broken;
                        let data: Vec<u8> = core::mem::take(&mut self.work);
                        if !data.is_empty() {
                            return Step::Event(HttpEvent::Upload(UploadEvent::Data(data)));
                        }
                    }
                }
                Phase::Ending => {
                    self.phase = Phase::Complete;
                    return Step::Event(HttpEvent::Upload(UploadEvent::End));
                }
                Phase::Broken => {
                    self.phase = Phase::Complete;
                    self.request.path.clear();
                    return Step::Event(HttpEvent::Upload(UploadEvent::End));
                }
                Phase::Complete if self.request.path.is_empty() => return Step::Closed,
                Phase::Complete => {
                    let request = core::mem::replace(&mut self.request, HttpRequest::new(HttpMethod::Other, ""));
                    return Step::Done(request);
                }
            }
        }
    }
}

// ── Server ────────────────────────────────────────────────────

enum Connection {
    Incoming(Incoming),
    Upload { stream: TcpStream, upload: Upload },
    AwaitingResponse(TcpStream),
}

#[derive(Default)]
pub struct TcpHttpServer {
    listener: Option<TcpListener>,
    connection: Option<Connection>,
}

impl TcpHttpServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Port actually bound (useful after `begin(0)`).
    pub fn local_port(&self) -> Option<u16> {
        self.listener
            .as_ref()
            .and_then(|l| l.local_addr().ok())
            .map(|a| a.port())
    }

    fn accept(&mut self) -> Option<HttpEvent> {
        let listener = self.listener.as_ref()?;
        let stream = match listener.accept() {
            Ok((stream, peer)) => {
                debug!("HTTP: connection from {}", peer);
                stream
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => return None,
            Err(e) => {
                warn!("HTTP: accept failed: {}", e);
                return None;
            }
        };
        if let Err(e) = stream.set_nonblocking(true) {
            warn!("HTTP: {}", e);
            return None;
        }
        self.connection = Some(Connection::Incoming(Incoming::new(stream)));
        self.poll_incoming()
    }

    fn poll_incoming(&mut self) -> Option<HttpEvent> {
        let Some(Connection::Incoming(mut incoming)) = self.connection.take() else {
            return None;
        };
        match incoming.advance() {
            Arrival::Waiting => {
                self.connection = Some(Connection::Incoming(incoming));
                None
            }
            Arrival::Request(request) => {
                self.connection = Some(Connection::AwaitingResponse(incoming.stream));
                Some(HttpEvent::Request(request))
            }
            Arrival::Upload { request, boundary } => {
                info!("HTTP: upload to {}", request.path);
                let upload = Upload::new(request, &boundary, incoming.raw);
                self.connection = Some(Connection::Upload {
                    stream: incoming.stream,
                    upload,
                });
                self.poll_upload()
            }
            Arrival::Reject(status) => {
                reject(incoming.stream, status);
                None
            }
            Arrival::Dropped => None,
        }
    }

    fn poll_upload(&mut self) -> Option<HttpEvent> {
        let Some(Connection::Upload { mut stream, mut upload }) = self.connection.take() else {
            return None;
        };
        match upload.advance(&mut stream) {
            Step::Event(event) => {
                self.connection = Some(Connection::Upload { stream, upload });
                Some(event)
            }
            Step::Pending => {
                self.connection = Some(Connection::Upload { stream, upload });
                None
            }
            Step::Done(request) => {
                self.connection = Some(Connection::AwaitingResponse(stream));
                Some(HttpEvent::Request(request))
            }
            Step::Closed => None,
            Step::Reject(status) => {
                reject(stream, status);
                None
            }
        }
    }
}

impl HttpServerPort for TcpHttpServer {
    fn begin(&mut self, port: u16) -> Result<(), SocketError> {
        let listener = TcpListener::bind(("0.0.0.0", port)).map_err(|e| {
            warn!("HTTP: bind :{} failed: {}", port, e);
            SocketError::BindFailed
        })?;
        listener.set_nonblocking(true).map_err(|_| SocketError::Io)?;
        self.listener = Some(listener);
        info!("HTTP: listening on :{}", port);
        Ok(())
    }

    fn stop(&mut self) {
        self.connection = None;
        if self.listener.take().is_some() {
            info!("HTTP: stopped");
        }
    }

    fn poll(&mut self) -> Option<HttpEvent> {
        match self.connection {
            Some(Connection::Incoming(_)) => self.poll_incoming(),
            Some(Connection::Upload { .. }) => self.poll_upload(),
            Some(Connection::AwaitingResponse(_)) => None,
            None => self.accept(),
        }
    }

    fn respond(&mut self, response: HttpResponse) {
        match self.connection.take() {
            Some(Connection::AwaitingResponse(mut stream)) => {
                if let Err(e) = write_response(&mut stream, &response) {
                    debug!("HTTP: response write failed: {}", e);
                }
            }
            other => self.connection = other,
        }
    }
}
