//! Mock device adapters for integration tests.
//!
//! Records every outward call so tests can assert on the full command
//! history without touching a real radio, broker or flash.

use std::cell::Cell;
use std::collections::VecDeque;
use std::net::Ipv4Addr;

use relaylink::app::commands::{PortalRequest, PortalResponse};
use relaylink::app::events::AppEvent;
use relaylink::app::ports::{
    BusError, BusMessage, BusPort, EepromPort, EventSink, NetworkInfo, PortalPort, StorageError,
    SystemPort, WifiError, WifiPort,
};
use relaylink::app::service::RelayController;
use relaylink::config::RelayConfig;
use relaylink::relay::transport::Transport;
use relaylink::store::{CredentialStore, Credentials, REGION_LEN};

pub const HOME_SSID: &str = "HomeNet";
pub const HOME_PASS: &str = "password1";
pub const SECRET: &str = "1234";

// ── Board call record ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardCall {
    BeginJoin(String),
    Disconnect,
    StartAccessPoint(String),
    StopAccessPoint,
    Connect(String),
    Subscribe(String),
    Publish(String),
    PortalStart,
    PortalStop,
    Restart,
}

// ── MockBoard ─────────────────────────────────────────────────

pub struct MockBoard {
    pub calls: Vec<BoardCall>,
    /// Networks that accept a join: (ssid, passphrase).
    pub reachable: Vec<(String, String)>,
    pub joined: bool,
    pub link_down: bool,
    pub broker_up: bool,
    pub bus_connected: bool,
    pub subscriptions: Vec<String>,
    pub inbox: VecDeque<BusMessage>,
    pub published: Vec<BusMessage>,
    pub portal_active: bool,
    pub requests: VecDeque<PortalRequest>,
    pub responses: Vec<PortalResponse>,
    pub reset_held: bool,
    pub restarts: u32,
    /// Signal strength lookups made by the controller.
    pub rssi_reads: Cell<u32>,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            reachable: vec![(HOME_SSID.into(), HOME_PASS.into())],
            joined: false,
            link_down: false,
            broker_up: true,
            bus_connected: false,
            subscriptions: Vec::new(),
            inbox: VecDeque::new(),
            published: Vec::new(),
            portal_active: false,
            requests: VecDeque::new(),
            responses: Vec::new(),
            reset_held: false,
            restarts: 0,
            rssi_reads: Cell::new(0),
        }
    }

    /// Deliver a bus message; dropped unless the topic is subscribed.
    pub fn deliver(&mut self, topic: &str, payload: &[u8]) -> bool {
        if !self.bus_connected || !self.subscriptions.iter().any(|t| t == topic) {
            return false;
        }
        self.inbox.push_back(BusMessage {
            topic: topic.into(),
            payload: payload.to_vec(),
        });
        true
    }

    /// End the bus session the way a broker restart would.
    pub fn drop_bus(&mut self) {
        self.bus_connected = false;
        self.subscriptions.clear();
    }

    pub fn count(&self, call: &BoardCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl WifiPort for MockBoard {
    fn begin_join(&mut self, ssid: &str, passphrase: &str) -> Result<(), WifiError> {
        self.calls.push(BoardCall::BeginJoin(ssid.into()));
        self.joined = self
            .reachable
            .iter()
            .any(|(s, p)| s == ssid && p == passphrase);
        Ok(())
    }

    fn is_joined(&self) -> bool {
        self.joined && !self.link_down
    }

    fn disconnect(&mut self) {
        self.calls.push(BoardCall::Disconnect);
        self.joined = false;
    }

    fn start_access_point(&mut self, ssid: &str, _passphrase: &str) -> Result<(), WifiError> {
        self.calls.push(BoardCall::StartAccessPoint(ssid.into()));
        Ok(())
    }

    fn stop_access_point(&mut self) {
        self.calls.push(BoardCall::StopAccessPoint);
    }

    fn scan(&mut self) -> Result<Vec<NetworkInfo>, WifiError> {
        Ok(self
            .reachable
            .iter()
            .map(|(ssid, _)| NetworkInfo {
                ssid: relaylink::config::label(ssid),
                rssi: -60,
            })
            .collect())
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        self.is_joined().then_some(Ipv4Addr::new(10, 0, 0, 7))
    }

    fn rssi(&self) -> Option<i8> {
        self.rssi_reads.set(self.rssi_reads.get() + 1);
        self.is_joined().then_some(-60)
    }
}

impl BusPort for MockBoard {
    fn connect(&mut self, client_id: &str) -> Result<(), BusError> {
        self.calls.push(BoardCall::Connect(client_id.into()));
        if !self.broker_up {
            return Err(BusError::ConnectFailed);
        }
        self.bus_connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.bus_connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        self.calls.push(BoardCall::Subscribe(topic.into()));
        if !self.bus_connected {
            return Err(BusError::NotConnected);
        }
        if !self.subscriptions.iter().any(|t| t == topic) {
            self.subscriptions.push(topic.into());
        }
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        self.calls.push(BoardCall::Publish(topic.into()));
        if !self.bus_connected {
            return Err(BusError::NotConnected);
        }
        self.published.push(BusMessage {
            topic: topic.into(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn poll(&mut self) -> Option<BusMessage> {
        self.inbox.pop_front()
    }
}

impl PortalPort for MockBoard {
    fn start(&mut self) {
        self.calls.push(BoardCall::PortalStart);
        self.portal_active = true;
    }

    fn stop(&mut self) {
        self.calls.push(BoardCall::PortalStop);
        self.portal_active = false;
    }

    fn is_active(&self) -> bool {
        self.portal_active
    }

    fn take_request(&mut self) -> Option<PortalRequest> {
        if !self.portal_active {
            return None;
        }
        self.requests.pop_front()
    }

    fn respond(&mut self, response: PortalResponse) {
        self.responses.push(response);
    }
}

impl SystemPort for MockBoard {
    fn reset_requested(&mut self) -> bool {
        self.reset_held
    }

    fn restart(&mut self) {
        self.calls.push(BoardCall::Restart);
        self.restarts += 1;
    }
}

// ── MemEeprom ─────────────────────────────────────────────────

/// RAM-backed store with an optional write budget for fault injection.
#[derive(Debug, Clone)]
pub struct MemEeprom {
    pub image: Vec<u8>,
    /// Writes allowed before every further write fails; `None` = unlimited.
    pub write_budget: Option<usize>,
}

#[allow(dead_code)]
impl MemEeprom {
    pub fn blank() -> Self {
        Self {
            image: vec![0; REGION_LEN],
            write_budget: None,
        }
    }

    /// A store already holding `ssid` / `pass` and the given secret.
    pub fn provisioned(ssid: &str, pass: &str, secret: &str) -> Self {
        let mut store = CredentialStore::new(Self::blank(), SECRET);
        let secret = relaylink::config::label(secret);
        let creds = Credentials::new(ssid, pass, &secret).unwrap();
        store.save(&creds).unwrap();
        store.eeprom().clone()
    }
}

impl EepromPort for MemEeprom {
    fn capacity(&self) -> usize {
        self.image.len()
    }

    fn read(&self, addr: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let src = self
            .image
            .get(addr..addr + buf.len())
            .ok_or(StorageError::OutOfBounds)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, addr: usize, data: &[u8]) -> Result<(), StorageError> {
        if let Some(budget) = self.write_budget.as_mut() {
            if *budget == 0 {
                return Err(StorageError::WriteFailed);
            }
            *budget -= 1;
        }
        let dst = self
            .image
            .get_mut(addr..addr + data.len())
            .ok_or(StorageError::OutOfBounds)?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

// ── ScriptedLink ──────────────────────────────────────────────

/// Serial link double: tests play the downstream unit.
#[derive(Debug, Default)]
pub struct ScriptedLink {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    pub fail_writes: bool,
}

#[allow(dead_code)]
impl ScriptedLink {
    pub fn reply(&mut self, line: &str) {
        self.rx.extend(line.as_bytes());
        self.rx.push_back(b'\n');
    }

    /// Frames written so far, one per line.
    pub fn frames(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.tx)
            .lines()
            .map(String::from)
            .collect()
    }
}

impl Transport for ScriptedLink {
    type Error = &'static str;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, &'static str> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, &'static str> {
        if self.fail_writes {
            return Err("uart fault");
        }
        self.tx.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), &'static str> {
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Harness ───────────────────────────────────────────────────

pub type Controller = RelayController<MemEeprom, ScriptedLink>;

/// Controller, board and sink on a virtual clock.
pub struct Rig {
    pub app: Controller,
    pub board: MockBoard,
    pub sink: RecordingSink,
    pub now: u64,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(eeprom: MemEeprom) -> Self {
        Self::with_config(RelayConfig::default(), eeprom)
    }

    pub fn with_config(config: RelayConfig, eeprom: MemEeprom) -> Self {
        let app = RelayController::new(config, eeprom, ScriptedLink::default(), "relay-TEST01")
            .unwrap();
        Self {
            app,
            board: MockBoard::new(),
            sink: RecordingSink::new(),
            now: 0,
        }
    }

    pub fn boot(&mut self) {
        self.app.boot(self.now, &mut self.board, &mut self.sink);
    }

    /// Advance the clock by `ms` and run one pass.
    pub fn tick_after(&mut self, ms: u64) {
        self.now += ms;
        self.app.tick(self.now, &mut self.board, &mut self.sink);
    }

    /// Run 10 ms passes for `ms` of virtual time.
    pub fn run_for(&mut self, ms: u64) {
        for _ in 0..ms / 10 {
            self.tick_after(10);
        }
    }

    /// Boot with stored credentials and run until managed.
    pub fn managed() -> Self {
        let mut rig = Self::new(MemEeprom::provisioned(HOME_SSID, HOME_PASS, SECRET));
        rig.boot();
        rig.run_for(1_000);
        assert_eq!(rig.app.state(), relaylink::fsm::StateId::Managed);
        rig
    }

    pub fn link(&mut self) -> &mut ScriptedLink {
        self.app.relay_mut().transport_mut()
    }

    pub fn send_command(&mut self, script: &str, repeat: bool, password: &str) {
        let payload = serde_json::json!({
            "script": script,
            "repeat": repeat,
            "password": password,
        });
        let topic = self.app.config().command_topic.to_string();
        assert!(self.board.deliver(&topic, payload.to_string().as_bytes()));
    }
}
