//! MQTT client adapter.
//!
//! Implements [`MqttPort`].
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`.
//!   The client runs its own task; its callback pushes inbound messages
//!   into a bounded shared inbox and tracks the session flag.  `connect`
//!   waits for CONNACK for at most [`CONNECT_TIMEOUT_MS`].  Once a session
//!   drops it stays down until the next `connect`, even if the client task
//!   reconnects underneath.
//! - **all other targets**: an in-memory broker.  Publications that match
//!   one of the client's own subscriptions are looped back, as a real
//!   broker would.

use std::collections::VecDeque;

use log::{debug, info, warn};

use crate::app::ports::{MqttError, MqttMessage, MqttPort};

/// Inbound messages kept between polls; the oldest is dropped when full.
const INBOX_CAPACITY: usize = 16;
#[cfg(target_os = "espidf")]
const CONNECT_TIMEOUT_MS: u32 = 5_000;
#[cfg(target_os = "espidf")]
const CONNECT_POLL_MS: u32 = 50;
/// Client state code for a handshake that never completed.
const RC_CONNECTION_TIMEOUT: i32 = -4;

#[cfg(target_os = "espidf")]
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
};

fn push_bounded(inbox: &mut VecDeque<MqttMessage>, message: MqttMessage) {
    if inbox.len() >= INBOX_CAPACITY {
        if let Some(dropped) = inbox.pop_front() {
            warn!("MQTT: inbox full, dropped message on {}", dropped.topic);
        }
    }
    inbox.push_back(message);
}

/// MQTT topic filter match with `+` and `#` wildcards.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut f = filter.split('/');
    let mut t = topic.split('/');
    loop {
        match (f.next(), t.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(a), Some(b)) if a == b => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF client
// ───────────────────────────────────────────────────────────────

/// Session flags shared with the client callback.
#[cfg(target_os = "espidf")]
#[derive(Default)]
struct Session {
    connected: AtomicBool,
    /// Latched on the first disconnect.
    lost: AtomicBool,
}

#[cfg(target_os = "espidf")]
impl Session {
    fn is_up(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.lost.load(Ordering::Acquire)
    }
}

#[cfg(target_os = "espidf")]
pub struct MqttAdapter {
    client: Option<EspMqttClient<'static>>,
    session: Arc<Session>,
    inbox: Arc<Mutex<VecDeque<MqttMessage>>>,
}

#[cfg(target_os = "espidf")]
impl MqttAdapter {
    pub fn new() -> Self {
        Self {
            client: None,
            session: Arc::new(Session::default()),
            inbox: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    fn client(&mut self) -> Result<&mut EspMqttClient<'static>, MqttError> {
        match self.client.as_mut() {
            Some(c) if self.session.is_up() => Ok(c),
            _ => Err(MqttError::NotConnected),
        }
    }
}

#[cfg(target_os = "espidf")]
impl MqttPort for MqttAdapter {
    fn connect(
        &mut self,
        server: &str,
        port: u16,
        client_id: &str,
        user: &str,
        password: &str,
    ) -> Result<(), MqttError> {
        self.disconnect();
        let url = format!("mqtt://{}:{}", server, port);
        debug!("MQTT: connecting to {} as {}", url, client_id);
        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            username: (!user.is_empty()).then_some(user),
            password: (!password.is_empty()).then_some(password),
            ..Default::default()
        };

        self.session = Arc::new(Session::default());
        let session = Arc::clone(&self.session);
        let inbox = Arc::clone(&self.inbox);
        let client = EspMqttClient::new_cb(&url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => session.connected.store(true, Ordering::Release),
            EventPayload::Disconnected => {
                session.connected.store(false, Ordering::Release);
                session.lost.store(true, Ordering::Release);
            }
            EventPayload::Received {
                topic: Some(topic),
                data,
                details: Details::Complete,
                ..
            } => {
                if let Ok(mut q) = inbox.lock() {
                    push_bounded(
                        &mut q,
                        MqttMessage {
                            topic: topic.to_string(),
                            payload: data.to_vec(),
                        },
                    );
                }
            }
            EventPayload::Error(e) => warn!("MQTT: client error {:?}", e),
            _ => {}
        })
        .map_err(|e| {
            warn!("MQTT: client init failed: {}", e);
            MqttError::ConnectFailed(e.code())
        })?;
        self.client = Some(client);

        let mut waited = 0;
        while !self.session.is_up() {
            if waited >= CONNECT_TIMEOUT_MS {
                self.client = None;
                return Err(MqttError::ConnectFailed(RC_CONNECTION_TIMEOUT));
            }
            esp_idf_svc::hal::delay::FreeRtos::delay_ms(CONNECT_POLL_MS);
            waited += CONNECT_POLL_MS;
        }
        info!("MQTT: connected to {}", url);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.client.take().is_some() {
            info!("MQTT: disconnected");
        }
        self.session.lost.store(true, Ordering::Release);
        if let Ok(mut q) = self.inbox.lock() {
            q.clear();
        }
    }

    fn is_connected(&self) -> bool {
        self.client.is_some() && self.session.is_up()
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), MqttError> {
        self.client()?
            .publish(topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(|_| MqttError::PublishFailed)
    }

    fn subscribe(&mut self, filter: &str) -> Result<(), MqttError> {
        self.client()?
            .subscribe(filter, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|_| MqttError::SubscribeFailed)
    }

    fn unsubscribe(&mut self, filter: &str) -> Result<(), MqttError> {
        self.client()?
            .unsubscribe(filter)
            .map(|_| ())
            .map_err(|_| MqttError::SubscribeFailed)
    }

    fn poll(&mut self) -> Option<MqttMessage> {
        self.inbox.lock().ok()?.pop_front()
    }
}

// ───────────────────────────────────────────────────────────────
// Simulated broker
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
pub struct MqttAdapter {
    reachable: Vec<String>,
    connected: bool,
    subscriptions: Vec<String>,
    inbox: VecDeque<MqttMessage>,
    published: Vec<MqttMessage>,
}

#[cfg(not(target_os = "espidf"))]
impl MqttAdapter {
    /// A client that cannot reach any broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept connections to `server`.
    pub fn with_broker(mut self, server: &str) -> Self {
        self.reachable.push(server.to_string());
        self
    }

    /// Deliver a message from another client.
    pub fn inject(&mut self, topic: &str, payload: &[u8]) {
        if self.connected && self.subscriptions.iter().any(|f| topic_matches(f, topic)) {
            push_bounded(
                &mut self.inbox,
                MqttMessage {
                    topic: topic.to_string(),
                    payload: payload.to_vec(),
                },
            );
        }
    }

    /// Everything this client published, oldest first.
    pub fn published(&self) -> &[MqttMessage] {
        &self.published
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    /// Simulate the broker closing the session.  Subscriptions die with
    /// it; nothing comes back until the next `connect`.
    pub fn drop_session(&mut self) {
        self.connected = false;
        self.subscriptions.clear();
        self.inbox.clear();
    }
}

#[cfg(not(target_os = "espidf"))]
impl MqttPort for MqttAdapter {
    fn connect(
        &mut self,
        server: &str,
        port: u16,
        client_id: &str,
        _user: &str,
        _password: &str,
    ) -> Result<(), MqttError> {
        self.disconnect();
        if !self.reachable.iter().any(|s| s == server) {
            debug!("MQTT(sim): {}:{} unreachable", server, port);
            return Err(MqttError::ConnectFailed(RC_CONNECTION_TIMEOUT));
        }
        self.connected = true;
        info!("MQTT(sim): {} connected to {}:{}", client_id, server, port);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.subscriptions.clear();
        self.inbox.clear();
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), MqttError> {
        if !self.connected {
            return Err(MqttError::NotConnected);
        }
        self.published.push(MqttMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        self.inject(topic, payload);
        Ok(())
    }

    fn subscribe(&mut self, filter: &str) -> Result<(), MqttError> {
        if !self.connected {
            return Err(MqttError::NotConnected);
        }
        if !self.subscriptions.iter().any(|f| f == filter) {
            self.subscriptions.push(filter.to_string());
        }
        Ok(())
    }

    fn unsubscribe(&mut self, filter: &str) -> Result<(), MqttError> {
        if !self.connected {
            return Err(MqttError::NotConnected);
        }
        self.subscriptions.retain(|f| f != filter);
        Ok(())
    }

    fn poll(&mut self) -> Option<MqttMessage> {
        self.inbox.pop_front()
    }
}
