//! Application service: the hexagonal core.
//!
//! [`RelayController`] owns the provisioning FSM, the credential store,
//! the command gateway, the relay engine and the connectivity monitor.
//! It exposes a clean, hardware-agnostic API: one [`boot`] call, then a
//! non-blocking [`tick`] on a fixed cadence.  All I/O flows through port
//! traits injected at call sites, making the entire service testable with
//! mock adapters.
//!
//! ```text
//!   EepromPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                  │        RelayController        │
//!  DevicePorts ◀──▶│ FSM · Gateway · Relay · Monitor│◀──▶ Transport
//!                  └──────────────────────────────┘
//! ```
//!
//! Each pass of [`tick`] runs, in order: the configuration portal (when
//! provisioning), bus connectivity and message delivery, up to
//! `ack_batch_limit` downstream lines, the link monitor, and the relay
//! timeout check.
//!
//! [`boot`]: RelayController::boot
//! [`tick`]: RelayController::tick

use log::{debug, error, info, warn};

use crate::app::commands::{PortalRequest, PortalResponse};
use crate::app::events::AppEvent;
use crate::app::ports::{BusMessage, DevicePorts, EepromPort, EventSink, StorageError, WifiError};
use crate::config::{MAX_SECRET_LEN, RelayConfig};
use crate::fsm::context::{Effect, FsmContext, ProvisioningEvent};
use crate::fsm::states::build_state_table;
use crate::fsm::{DeviceMode, Fsm, StateId};
use crate::gateway::{CommandGateway, GatewayOutcome, PendingCommand, RejectReason};
use crate::monitor::{ConnectivityMonitor, MonitorVerdict};
use crate::relay::transport::Transport;
use crate::relay::{RelayEngine, RelayOutcome, TelemetryReport};
use crate::scheduler::Interval;
use crate::store::{CredentialStore, Credentials};

// ───────────────────────────────────────────────────────────────
// Counters
// ───────────────────────────────────────────────────────────────

/// Running totals since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub accepted: u32,
    pub rejected_auth: u32,
    pub rejected_duplicate: u32,
    pub rejected_malformed: u32,
    pub pending_replaced: u32,
    pub relayed: u32,
    pub completed: u32,
    pub failed: u32,
    pub timed_out: u32,
}

/// A candidate network being tested on behalf of the portal.
struct CandidateJoin {
    credentials: Credentials,
    polls: u8,
}

// ───────────────────────────────────────────────────────────────
// RelayController
// ───────────────────────────────────────────────────────────────

/// The relay controller orchestrates all domain logic.
pub struct RelayController<S: EepromPort, T: Transport> {
    config: RelayConfig,
    fsm: Fsm,
    ctx: FsmContext,
    store: CredentialStore<S>,
    gateway: CommandGateway,
    relay: RelayEngine<T>,
    /// Single waiting slot behind the in-flight request.
    pending: Option<PendingCommand>,
    monitor: ConnectivityMonitor,
    join_timer: Interval,
    bus_retry: Interval,
    candidate: Option<CandidateJoin>,
    client_id: heapless::String<32>,
    /// Bus session state seen on the previous pass.
    bus_up: bool,
    stats: RelayStats,
}

impl<S: EepromPort, T: Transport> RelayController<S, T> {
    /// Construct the controller.
    ///
    /// Does **not** touch any port. Call [`boot`](Self::boot) next.
    pub fn new(config: RelayConfig, eeprom: S, serial: T, client_id: &str) -> crate::Result<Self> {
        config.validate()?;

        let ctx = FsmContext::new(&config);
        let fsm = Fsm::new(build_state_table(), StateId::Boot);
        let store = CredentialStore::new(eeprom, &config.factory_secret);
        let relay = RelayEngine::new(serial, config.relay_timeout_ms);
        let monitor =
            ConnectivityMonitor::new(config.link_check_interval_ms, config.link_failure_threshold);

        Ok(Self {
            fsm,
            ctx,
            store,
            gateway: CommandGateway::new(),
            relay,
            pending: None,
            monitor,
            join_timer: Interval::new(config.join_poll_interval_ms),
            bus_retry: Interval::new(config.bus_retry_interval_ms),
            candidate: None,
            client_id: crate::config::label(client_id),
            bus_up: false,
            stats: RelayStats::default(),
            config,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Restore credentials, sample the reset trigger and pick the first mode.
    pub fn boot(&mut self, now_ms: u64, io: &mut impl DevicePorts, sink: &mut impl EventSink) {
        self.fsm.start(&mut self.ctx);

        let reset_asserted = io.reset_requested();
        let has_credentials = self.store.load().is_some();
        self.fire(
            ProvisioningEvent::Boot {
                reset_asserted,
                has_credentials,
            },
            now_ms,
            io,
            sink,
        );

        sink.emit(&AppEvent::Started(self.mode()));
        info!("RelayController started in {:?}", self.fsm.current_state());
    }

    // ── Per-pass orchestration ────────────────────────────────

    /// Run one non-blocking pass of the control loop.
    pub fn tick(&mut self, now_ms: u64, io: &mut impl DevicePorts, sink: &mut impl EventSink) {
        match self.fsm.current_state() {
            StateId::Boot => warn!("RelayController: tick before boot"),
            StateId::Provisioning => self.service_portal(now_ms, io, sink),
            StateId::TestingStored => self.poll_stored_join(now_ms, io, sink),
            StateId::Connecting | StateId::Managed => {
                self.service_bus(now_ms, io, sink);
                if self.is_managed() {
                    self.service_acks(now_ms, io, sink);
                }
                self.service_monitor(now_ms, io, sink);
                if self.is_managed() {
                    self.service_relay_timeout(now_ms, sink);
                    self.dispatch_pending(now_ms, sink);
                }
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current provisioning state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Current coarse operating mode.
    pub fn mode(&self) -> DeviceMode {
        self.fsm.current_state().mode()
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn store(&self) -> &CredentialStore<S> {
        &self.store
    }

    pub fn relay(&self) -> &RelayEngine<T> {
        &self.relay
    }

    pub fn relay_mut(&mut self) -> &mut RelayEngine<T> {
        &mut self.relay
    }

    /// The command waiting behind the in-flight request, if any.
    pub fn pending(&self) -> Option<&PendingCommand> {
        self.pending.as_ref()
    }

    /// Consecutive failed link checks so far.
    pub fn link_failures(&self) -> u8 {
        self.monitor.failures()
    }

    fn is_managed(&self) -> bool {
        self.fsm.current_state() == StateId::Managed
    }

    // ── State machine plumbing ────────────────────────────────

    /// Dispatch one event, perform every effect it produced, and report
    /// the transition.
    fn fire(
        &mut self,
        event: ProvisioningEvent,
        now_ms: u64,
        io: &mut impl DevicePorts,
        sink: &mut impl EventSink,
    ) {
        let from = self.fsm.dispatch(&event, &mut self.ctx);
        for effect in self.ctx.take_effects() {
            self.apply_effect(effect, now_ms, io, sink);
        }
        if let Some(from) = from {
            sink.emit(&AppEvent::StateChanged {
                from,
                to: self.fsm.current_state(),
            });
        }
    }

    /// Translate FSM effects into port calls.
    fn apply_effect(
        &mut self,
        effect: Effect,
        now_ms: u64,
        io: &mut impl DevicePorts,
        sink: &mut impl EventSink,
    ) {
        match effect {
            Effect::EraseCredentials => {
                if let Err(e) = self.store.erase() {
                    self.storage_fault(e, io, sink);
                }
            }
            Effect::BeginJoin => {
                self.join_timer.reset(now_ms);
                match self.store.network() {
                    Some(creds) => {
                        if let Err(e) = io.begin_join(&creds.ssid, &creds.passphrase) {
                            warn!("WiFi: join of '{}' refused: {}", creds.ssid, e);
                        }
                    }
                    None => warn!("WiFi: no stored network to join"),
                }
            }
            Effect::Disconnect => io.disconnect(),
            Effect::StartAccessPoint => {
                if let Err(e) = io.start_access_point(&self.config.ap_ssid, &self.config.ap_passphrase)
                {
                    error!("WiFi: {}", e);
                }
                io.start();
            }
            Effect::StopAccessPoint => {
                io.stop();
                io.stop_access_point();
                self.candidate = None;
            }
            Effect::ArmBus => self.bus_retry.trigger(),
            Effect::SubscribeBus => self.subscribe(io),
            Effect::ClearLinkFailures => self.monitor.reset(now_ms),
            Effect::DiscardRelay => {
                self.relay.discard();
                if self.pending.take().is_some() {
                    info!("Relay: pending command discarded");
                }
            }
        }
    }

    /// Storage writes are not retried: report and restart.
    fn storage_fault(&mut self, e: StorageError, io: &mut impl DevicePorts, sink: &mut impl EventSink) {
        error!("Storage write failed ({}), restarting", e);
        sink.emit(&AppEvent::StorageFault(e));
        io.restart();
    }

    // ── Joining ───────────────────────────────────────────────

    fn poll_stored_join(&mut self, now_ms: u64, io: &mut impl DevicePorts, sink: &mut impl EventSink) {
        if self.join_timer.due(now_ms) {
            let joined = io.is_joined();
            if joined {
                if let Some(rssi) = io.rssi() {
                    info!("WiFi: station up at {} dBm", rssi);
                }
            }
            self.fire(ProvisioningEvent::JoinPoll { joined }, now_ms, io, sink);
        }
    }

    // ── Message bus ───────────────────────────────────────────

    fn service_bus(&mut self, now_ms: u64, io: &mut impl DevicePorts, sink: &mut impl EventSink) {
        let link_up = io.is_joined();

        if !io.is_connected() && link_up && self.bus_retry.due(now_ms) {
            if let Err(e) = io.connect(&self.client_id) {
                warn!(
                    "Bus: {} (retrying in {} ms)",
                    e,
                    self.bus_retry.period_ms()
                );
            }
        }

        let connected = io.is_connected();
        if connected && !self.bus_up {
            info!("Bus: connected as '{}'", self.client_id);
            sink.emit(&AppEvent::BusConnected);
            if self.is_managed() {
                self.subscribe(io);
            }
        } else if !connected && self.bus_up {
            warn!("Bus: session lost");
        }
        self.bus_up = connected;

        if !link_up || !connected {
            return;
        }

        if self.fsm.current_state() == StateId::Connecting {
            self.fire(ProvisioningEvent::BusConnected, now_ms, io, sink);
        }

        if self.is_managed() {
            while let Some(msg) = io.poll() {
                self.handle_bus_message(&msg, now_ms, sink);
            }
        }
    }

    fn subscribe(&mut self, io: &mut impl DevicePorts) {
        match io.subscribe(&self.config.command_topic) {
            Ok(()) => info!("Bus: subscribed to '{}'", self.config.command_topic),
            Err(e) => warn!("Bus: subscribe to '{}' failed: {}", self.config.command_topic, e),
        }
    }

    fn handle_bus_message(&mut self, msg: &BusMessage, now_ms: u64, sink: &mut impl EventSink) {
        if msg.topic != self.config.command_topic.as_str() {
            debug!("Bus: ignoring message on '{}'", msg.topic);
            return;
        }

        let outcome = self
            .gateway
            .handle_inbound(&msg.payload, self.store.secret(), now_ms);

        let reason = match outcome {
            GatewayOutcome::Accepted(cmd) => {
                self.stats.accepted += 1;
                let queued = self.relay.awaiting_ack();
                sink.emit(&AppEvent::CommandAccepted { queued });
                if !queued {
                    self.dispatch(&cmd, now_ms, sink);
                } else if self.pending.replace(cmd).is_some() {
                    warn!("Relay: waiting command overwritten by a newer one");
                    self.stats.pending_replaced += 1;
                    sink.emit(&AppEvent::PendingReplaced);
                }
                return;
            }
            GatewayOutcome::RejectedAuth => {
                self.stats.rejected_auth += 1;
                RejectReason::Auth
            }
            GatewayOutcome::RejectedDuplicate => {
                self.stats.rejected_duplicate += 1;
                RejectReason::Duplicate
            }
            GatewayOutcome::RejectedMalformed => {
                self.stats.rejected_malformed += 1;
                RejectReason::Malformed
            }
        };
        sink.emit(&AppEvent::CommandRejected(reason));
    }

    // ── Downstream relay ──────────────────────────────────────

    fn dispatch(&mut self, cmd: &PendingCommand, now_ms: u64, sink: &mut impl EventSink) {
        match self.relay.send(&cmd.script, now_ms) {
            Ok(bytes) => {
                self.stats.relayed += 1;
                sink.emit(&AppEvent::RelayDispatched { bytes });
            }
            Err(e) => {
                error!("Relay: dispatch failed ({}), command dropped", e);
                self.stats.failed += 1;
                sink.emit(&AppEvent::RelayFailed {
                    detail: e.to_string(),
                });
            }
        }
    }

    fn dispatch_pending(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        if self.relay.awaiting_ack() {
            return;
        }
        if let Some(cmd) = self.pending.take() {
            self.dispatch(&cmd, now_ms, sink);
        }
    }

    fn service_acks(&mut self, now_ms: u64, io: &mut impl DevicePorts, sink: &mut impl EventSink) {
        for _ in 0..self.config.ack_batch_limit {
            match self.relay.poll_response() {
                Ok(Some(outcome)) => self.handle_relay_outcome(outcome, now_ms, io, sink),
                Ok(None) => break,
                Err(e) => {
                    warn!("Relay: {}", e);
                    break;
                }
            }
        }
    }

    fn handle_relay_outcome(
        &mut self,
        outcome: RelayOutcome,
        now_ms: u64,
        io: &mut impl DevicePorts,
        sink: &mut impl EventSink,
    ) {
        match outcome {
            RelayOutcome::Done {
                command,
                status,
                elapsed_ms,
            } => {
                self.stats.completed += 1;
                self.publish_telemetry(&command, &status, elapsed_ms, now_ms, io);
                sink.emit(&AppEvent::RelayCompleted {
                    command,
                    status,
                    elapsed_ms,
                });
            }
            RelayOutcome::Error { detail } => {
                error!("Downstream error: {}", detail);
                self.stats.failed += 1;
                sink.emit(&AppEvent::RelayFailed { detail });
            }
            RelayOutcome::Progress { detail } => {
                info!("Downstream progress: {}", detail);
                sink.emit(&AppEvent::RelayProgress { detail });
            }
            RelayOutcome::Other { line } => debug!("Downstream: {}", line),
        }
    }

    fn publish_telemetry(
        &mut self,
        command: &str,
        status: &str,
        elapsed_ms: u64,
        now_ms: u64,
        io: &mut impl DevicePorts,
    ) {
        let report = TelemetryReport {
            esp_id: self.config.device_id.as_str().into(),
            command: command.into(),
            status: status.into(),
            execution_time: elapsed_ms,
            timestamp: now_ms,
        };
        let payload = match serde_json::to_vec(&report) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Telemetry: encode failed: {}", e);
                return;
            }
        };
        match io.publish(&self.config.telemetry_topic, &payload) {
            Ok(()) => info!("Telemetry: published completion of '{}'", command),
            Err(e) => warn!("Telemetry: publish failed: {}", e),
        }
    }

    fn service_relay_timeout(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        if let Some(waited_ms) = self.relay.check_timeout(now_ms) {
            self.stats.timed_out += 1;
            sink.emit(&AppEvent::RelayTimedOut { waited_ms });
        }
    }

    // ── Link monitor ──────────────────────────────────────────

    fn service_monitor(&mut self, now_ms: u64, io: &mut impl DevicePorts, sink: &mut impl EventSink) {
        let Some(verdict) = self.monitor.poll(now_ms, io.is_joined()) else {
            return;
        };
        match verdict {
            MonitorVerdict::Healthy => {}
            MonitorVerdict::Reconnect { failures } => {
                sink.emit(&AppEvent::LinkCheckFailed { failures });
                self.fire(ProvisioningEvent::ReconnectRequested, now_ms, io, sink);
            }
            MonitorVerdict::Escalate { failures } => {
                sink.emit(&AppEvent::LinkCheckFailed { failures });
                self.fire(ProvisioningEvent::ConnectivityLost, now_ms, io, sink);
            }
        }
    }

    // ── Configuration portal ──────────────────────────────────

    fn service_portal(&mut self, now_ms: u64, io: &mut impl DevicePorts, sink: &mut impl EventSink) {
        self.poll_candidate(now_ms, io, sink);
        if self.fsm.current_state() != StateId::Provisioning {
            return;
        }

        let Some(request) = io.take_request() else {
            return;
        };
        match request {
            PortalRequest::Scan => {
                let response = match io.scan() {
                    Ok(networks) => PortalResponse::Networks(networks),
                    Err(e) => {
                        warn!("Portal: {}", e);
                        PortalResponse::Failure("Scan failed")
                    }
                };
                io.respond(response);
            }
            PortalRequest::Connect { ssid, passphrase } => {
                self.begin_candidate(&ssid, &passphrase, now_ms, io);
            }
            PortalRequest::EraseCredentials => match self.store.erase() {
                Ok(()) => {
                    io.respond(PortalResponse::Success(
                        "Credentials cleared! Restarting...".into(),
                    ));
                    info!("Portal: credentials erased, restarting");
                    io.restart();
                }
                Err(e) => {
                    io.respond(PortalResponse::Failure("Could not erase credentials"));
                    self.storage_fault(e, io, sink);
                }
            },
            PortalRequest::SetSecret { secret } => self.update_secret(&secret, io, sink),
        }
    }

    fn begin_candidate(&mut self, ssid: &str, passphrase: &str, now_ms: u64, io: &mut impl DevicePorts) {
        if self.candidate.is_some() {
            io.respond(PortalResponse::Failure("Connection test already running"));
            return;
        }

        let credentials = match Credentials::new(ssid, passphrase, self.store.secret()) {
            Ok(c) => c,
            Err(e) => {
                warn!("Portal: rejected network: {}", e);
                io.respond(PortalResponse::Failure(match e {
                    WifiError::InvalidSsid => "Invalid SSID",
                    _ => "Invalid password",
                }));
                return;
            }
        };

        if let Err(e) = io.begin_join(&credentials.ssid, &credentials.passphrase) {
            warn!("Portal: {}", e);
            io.respond(PortalResponse::Failure("Failed to connect"));
            return;
        }
        info!("Portal: testing network '{}'", credentials.ssid);
        self.join_timer.reset(now_ms);
        self.candidate = Some(CandidateJoin {
            credentials,
            polls: 0,
        });
    }

    fn poll_candidate(&mut self, now_ms: u64, io: &mut impl DevicePorts, sink: &mut impl EventSink) {
        if self.candidate.is_none() || !self.join_timer.due(now_ms) {
            return;
        }

        if io.is_joined() {
            let Some(candidate) = self.candidate.take() else {
                return;
            };
            match self.store.save(&candidate.credentials) {
                Ok(()) => {
                    let ip = io
                        .local_ip()
                        .map_or_else(|| "unknown".to_string(), |ip| ip.to_string());
                    match io.rssi() {
                        Some(rssi) => info!(
                            "Portal: joined '{}' at {} dBm, ip {}",
                            candidate.credentials.ssid, rssi, ip
                        ),
                        None => info!("Portal: joined '{}', ip {}", candidate.credentials.ssid, ip),
                    }
                    io.respond(PortalResponse::Success(format!("Connected! IP: {ip}")));
                    self.fire(ProvisioningEvent::CredentialsCommitted, now_ms, io, sink);
                }
                Err(e) => {
                    io.respond(PortalResponse::Failure("Could not save credentials"));
                    self.storage_fault(e, io, sink);
                }
            }
            return;
        }

        let budget = self.config.join_poll_budget;
        let exhausted = self.candidate.as_mut().is_some_and(|c| {
            c.polls = c.polls.saturating_add(1);
            c.polls >= budget
        });
        if exhausted {
            self.candidate = None;
            io.disconnect();
            warn!("Portal: candidate network unreachable");
            io.respond(PortalResponse::Failure(
                "Failed to connect. Check SSID and password.",
            ));
        }
    }

    fn update_secret(&mut self, secret: &str, io: &mut impl DevicePorts, sink: &mut impl EventSink) {
        if secret.len() < usize::from(self.config.min_secret_len) {
            io.respond(PortalResponse::Failure("Password too short"));
            return;
        }
        if secret.len() > MAX_SECRET_LEN {
            io.respond(PortalResponse::Failure("Password too long"));
            return;
        }
        match self.store.save_secret_only(secret) {
            Ok(()) => io.respond(PortalResponse::Success("Password updated!".into())),
            Err(e) => {
                io.respond(PortalResponse::Failure("Could not save password"));
                self.storage_fault(e, io, sink);
            }
        }
    }
}
