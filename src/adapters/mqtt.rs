//! MQTT message bus adapter.
//!
//! Implements [`BusPort`] against the public broker.
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` with an event callback
//!   running on the MQTT task.  Received messages cross into the control
//!   loop through a bounded `embassy-sync` channel; the session flag is an
//!   atomic.  The ESP-IDF client reconnects on its own once created.
//! - **all other targets**: an in-memory broker with per-topic
//!   subscriptions, used by the host simulation and tests.
//!
//! ```text
//! ┌──────────────┐ BusMessage ┌──────────────┐
//! │  MQTT task   │───────────▶│ Control loop │
//! │  (callback)  │   INBOX    │   (poll)     │
//! └──────────────┘            └──────────────┘
//! ```

use log::info;

use crate::app::ports::{BusError, BusMessage, BusPort};

#[cfg(target_os = "espidf")]
use log::warn;
#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicBool, Ordering};
#[cfg(target_os = "espidf")]
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
#[cfg(target_os = "espidf")]
use embassy_sync::channel::Channel;
#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};

#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

/// Messages buffered between the MQTT task and the control loop.
#[cfg(target_os = "espidf")]
const INBOX_DEPTH: usize = 8;

/// Inbound messages: MQTT task → control loop.
#[cfg(target_os = "espidf")]
static INBOX: Channel<CriticalSectionRawMutex, BusMessage, INBOX_DEPTH> = Channel::new();

/// Session state as last reported by the MQTT task.
#[cfg(target_os = "espidf")]
static CONNECTED: AtomicBool = AtomicBool::new(false);

// ───────────────────────────────────────────────────────────────
// Device backend
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct MqttAdapter {
    url: String,
    client: Option<EspMqttClient<'static>>,
}

#[cfg(target_os = "espidf")]
impl MqttAdapter {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            url: format!("mqtt://{host}:{port}"),
            client: None,
        }
    }
}

#[cfg(target_os = "espidf")]
impl BusPort for MqttAdapter {
    fn connect(&mut self, client_id: &str) -> Result<(), BusError> {
        if self.client.is_some() {
            return if CONNECTED.load(Ordering::Acquire) {
                Ok(())
            } else {
                Err(BusError::ConnectFailed)
            };
        }

        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            ..Default::default()
        };
        let client = EspMqttClient::new_cb(&self.url, &conf, |event| match event.payload() {
            EventPayload::Connected(_) => CONNECTED.store(true, Ordering::Release),
            EventPayload::Disconnected => CONNECTED.store(false, Ordering::Release),
            EventPayload::Received {
                topic: Some(topic),
                data,
                ..
            } => {
                let msg = BusMessage {
                    topic: topic.to_string(),
                    payload: data.to_vec(),
                };
                if INBOX.try_send(msg).is_err() {
                    warn!("Bus: inbox full, dropping message on '{}'", topic);
                }
            }
            _ => {}
        })
        .map_err(|e| {
            warn!("Bus: client start failed: {}", e);
            BusError::ConnectFailed
        })?;

        info!("Bus: session to {} started", self.url);
        self.client = Some(client);
        if CONNECTED.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(BusError::NotConnected)
        }
    }

    fn is_connected(&self) -> bool {
        self.client.is_some() && CONNECTED.load(Ordering::Acquire)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        let client = self.client.as_mut().ok_or(BusError::NotConnected)?;
        client.subscribe(topic, QoS::AtMostOnce).map_err(|e| {
            warn!("Bus: subscribe failed: {}", e);
            BusError::SubscribeFailed
        })?;
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        if !CONNECTED.load(Ordering::Acquire) {
            return Err(BusError::NotConnected);
        }
        let client = self.client.as_mut().ok_or(BusError::NotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| {
                warn!("Bus: publish failed: {}", e);
                BusError::PublishFailed
            })?;
        Ok(())
    }

    fn poll(&mut self) -> Option<BusMessage> {
        INBOX.try_receive().ok()
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation backend
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub struct MqttAdapter {
    broker: String,
    broker_up: bool,
    session: Option<String>,
    subscriptions: Vec<String>,
    inbox: VecDeque<BusMessage>,
    published: Vec<BusMessage>,
}

#[cfg(not(target_os = "espidf"))]
impl MqttAdapter {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            broker: format!("{host}:{port}"),
            broker_up: true,
            session: None,
            subscriptions: Vec::new(),
            inbox: VecDeque::new(),
            published: Vec::new(),
        }
    }

    /// Take the broker up or down.  Going down ends the session and
    /// forgets its subscriptions, as a real broker would for a clean session.
    pub fn set_broker_up(&mut self, up: bool) {
        self.broker_up = up;
        if !up && self.session.take().is_some() {
            self.subscriptions.clear();
            info!("Bus(sim): session dropped");
        }
    }

    /// Deliver a message from another client.  Returns `false` when the
    /// session is down or not subscribed to `topic`.
    pub fn deliver(&mut self, topic: &str, payload: &[u8]) -> bool {
        if self.session.is_none() || !self.subscriptions.iter().any(|t| t == topic) {
            return false;
        }
        self.inbox.push_back(BusMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        true
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    pub fn take_published(&mut self) -> Vec<BusMessage> {
        core::mem::take(&mut self.published)
    }
}

#[cfg(not(target_os = "espidf"))]
impl BusPort for MqttAdapter {
    fn connect(&mut self, client_id: &str) -> Result<(), BusError> {
        if !self.broker_up {
            return Err(BusError::ConnectFailed);
        }
        info!("Bus(sim): '{}' connected to {}", client_id, self.broker);
        self.session = Some(client_id.to_string());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        if self.session.is_none() {
            return Err(BusError::NotConnected);
        }
        if !self.subscriptions.iter().any(|t| t == topic) {
            self.subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        if self.session.is_none() {
            return Err(BusError::NotConnected);
        }
        self.published.push(BusMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn poll(&mut self) -> Option<BusMessage> {
        self.inbox.pop_front()
    }
}
