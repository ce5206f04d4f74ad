//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to.  Handlers never touch the radio, the bus or the store
//! themselves: they append [`Effect`]s, and the controller drains and
//! applies them after each dispatch.  Think of it as the "blackboard" in a
//! blackboard architecture.

use log::warn;

use crate::config::RelayConfig;

// ---------------------------------------------------------------------------
// Events (inputs to the state machine)
// ---------------------------------------------------------------------------

/// Everything that can drive a provisioning transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningEvent {
    /// Boot-time decision inputs.
    Boot {
        reset_asserted: bool,
        has_credentials: bool,
    },
    /// One poll of a pending station join.
    JoinPoll { joined: bool },
    /// The bus session is up while the station link is up.
    BusConnected,
    /// The monitor saw the link down with budget remaining.
    ReconnectRequested,
    /// The monitor exhausted its failure budget.
    ConnectivityLost,
    /// The portal validated and persisted a new network.
    CredentialsCommitted,
}

// ---------------------------------------------------------------------------
// Effects (written by state handlers; applied by the controller)
// ---------------------------------------------------------------------------

/// Side effects that state handlers request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Wipe the credential region.
    EraseCredentials,
    /// Start joining the stored network and restart join polling.
    BeginJoin,
    /// Drop the station association.
    Disconnect,
    /// Bring up the configuration access point and portal.
    StartAccessPoint,
    /// Tear down the configuration access point and portal.
    StopAccessPoint,
    /// Attempt a bus connection on the next pass.
    ArmBus,
    /// Subscribe to the command topic.
    SubscribeBus,
    /// Zero the link failure counter.
    ClearLinkFailures,
    /// Forget the in-flight relay request and any pending command.
    DiscardRelay,
}

/// Upper bound on effects produced by one dispatch (handler + exit + enter).
pub const MAX_EFFECTS: usize = 8;

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext {
    /// Join polls spent on the current stored-network test.
    pub join_polls: u8,
    /// Join polls allowed before giving up on the stored network.
    pub join_poll_budget: u8,
    /// Effects queued by the last dispatch.
    effects: heapless::Vec<Effect, MAX_EFFECTS>,
}

impl FsmContext {
    /// Create a new context with the given configuration.
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            join_polls: 0,
            join_poll_budget: config.join_poll_budget,
            effects: heapless::Vec::new(),
        }
    }

    /// Queue an effect for the controller.
    pub fn push(&mut self, effect: Effect) {
        if self.effects.push(effect).is_err() {
            warn!("FSM: effect queue full, dropping {:?}", effect);
        }
    }

    /// Drain queued effects in the order they were produced.
    pub fn take_effects(&mut self) -> heapless::Vec<Effect, MAX_EFFECTS> {
        core::mem::take(&mut self.effects)
    }

    /// Peek at queued effects without draining them.
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }
}
