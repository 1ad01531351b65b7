//! Captive-portal DNS responder.
//!
//! Implements [`CaptiveDnsPort`] on a non-blocking `std::net::UdpSocket`.
//! Every A (or ANY) query is answered with the soft-AP address so that
//! phones pop up the configuration page after joining the access point.
//! Other query types get an empty NOERROR answer.

use core::net::Ipv4Addr;
use std::io::ErrorKind;
use std::net::UdpSocket;

use log::{debug, info, warn};

use crate::app::ports::{CaptiveDnsPort, SocketError};

const HEADER_LEN: usize = 12;
const TYPE_A: u16 = 1;
const TYPE_ANY: u16 = 255;
const CLASS_IN: u16 = 1;
const TTL_SECS: u32 = 60;

/// Build the reply for one query packet, or `None` if it is not a
/// standard query with a single well-formed question.
pub fn build_reply(query: &[u8], answer: Ipv4Addr) -> Option<Vec<u8>> {
    if query.len() < HEADER_LEN {
        return None;
    }
    let flags = u16::from_be_bytes([query[2], query[3]]);
    let is_response = flags & 0x8000 != 0;
    let opcode = (flags >> 11) & 0x0F;
    let qdcount = u16::from_be_bytes([query[4], query[5]]);
    if is_response || opcode != 0 || qdcount == 0 {
        return None;
    }

    // Walk the first question name (no compression in queries).
    let mut pos = HEADER_LEN;
    loop {
        let len = *query.get(pos)? as usize;
        if len & 0xC0 != 0 {
            return None;
        }
        pos += 1;
        if len == 0 {
            break;
        }
        pos += len;
    }
    let qtype = u16::from_be_bytes([*query.get(pos)?, *query.get(pos + 1)?]);
    let qclass = u16::from_be_bytes([*query.get(pos + 2)?, *query.get(pos + 3)?]);
    let question_end = pos + 4;

    let answers = u16::from(matches!(qtype, TYPE_A | TYPE_ANY) && qclass == CLASS_IN);

    let mut reply = Vec::with_capacity(question_end + 16);
    reply.extend_from_slice(&query[..2]);
    // QR=1, keep RD, RA=1, RCODE=0.
    let rd = flags & 0x0100;
    reply.extend_from_slice(&(0x8080 | rd).to_be_bytes());
    reply.extend_from_slice(&1u16.to_be_bytes());
    reply.extend_from_slice(&answers.to_be_bytes());
    reply.extend_from_slice(&0u16.to_be_bytes());
    reply.extend_from_slice(&0u16.to_be_bytes());
    reply.extend_from_slice(&query[HEADER_LEN..question_end]);

    if answers == 1 {
        reply.extend_from_slice(&0xC00Cu16.to_be_bytes());
        reply.extend_from_slice(&TYPE_A.to_be_bytes());
        reply.extend_from_slice(&CLASS_IN.to_be_bytes());
        reply.extend_from_slice(&TTL_SECS.to_be_bytes());
        reply.extend_from_slice(&4u16.to_be_bytes());
        reply.extend_from_slice(&answer.octets());
    }
    Some(reply)
}

#[derive(Default)]
pub struct CaptiveDns {
    socket: Option<UdpSocket>,
    answer: Option<Ipv4Addr>,
}

impl CaptiveDns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local_port(&self) -> Option<u16> {
        self.socket
            .as_ref()
            .and_then(|s| s.local_addr().ok())
            .map(|a| a.port())
    }
}

impl CaptiveDnsPort for CaptiveDns {
    fn start(&mut self, port: u16, answer: Ipv4Addr) -> Result<(), SocketError> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).map_err(|e| {
            warn!("DNS: bind :{} failed: {}", port, e);
            SocketError::BindFailed
        })?;
        socket.set_nonblocking(true).map_err(|_| SocketError::Io)?;
        self.socket = Some(socket);
        self.answer = Some(answer);
        info!("DNS: captive responder on :{} -> {}", port, answer);
        Ok(())
    }

    fn stop(&mut self) {
        if self.socket.take().is_some() {
            info!("DNS: stopped");
        }
        self.answer = None;
    }

    fn process_next_request(&mut self) {
        let (Some(socket), Some(answer)) = (self.socket.as_ref(), self.answer) else {
            return;
        };
        let mut buf = [0u8; 512];
        let (n, peer) = match socket.recv_from(&mut buf) {
            Ok(r) => r,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return,
            Err(e) => {
                debug!("DNS: recv failed: {}", e);
                return;
            }
        };
        if let Some(reply) = build_reply(&buf[..n], answer) {
            if let Err(e) = socket.send_to(&reply, peer) {
                debug!("DNS: reply to {} failed: {}", peer, e);
            }
        }
    }
}
