//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern ported to Rust:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                        │
//! │  ┌───────────────┬──────────┬──────────┬────────────────────────┐  │
//! │  │ StateId       │ on_enter │ on_exit  │ on_event               │  │
//! │  ├───────────────┼──────────┼──────────┼────────────────────────┤  │
//! │  │ Boot          │ -        │ -        │ fn(ctx, ev)->Option<>  │  │
//! │  │ TestingStored │ fn(ctx)  │ -        │ fn(ctx, ev)->Option<>  │  │
//! │  │ Connecting    │ fn(ctx)  │ -        │ fn(ctx, ev)->Option<>  │  │
//! │  │ Managed       │ fn(ctx)  │ -        │ fn(ctx, ev)->Option<>  │  │
//! │  │ Provisioning  │ fn(ctx)  │ fn(ctx)  │ fn(ctx, ev)->Option<>  │  │
//! │  └───────────────┴──────────┴──────────┴────────────────────────┘  │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each event is handed to `on_event` for the **current** state.  If it
//! returns `Some(next_id)`, the engine runs `on_exit` for the current
//! state, then `on_enter` for the next, and updates the current pointer.
//! Handlers only record [`context::Effect`]s; the controller performs
//! them once the dispatch is complete.

pub mod context;
pub mod states;

use context::{FsmContext, ProvisioningEvent};
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all provisioning states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Boot = 0,
    TestingStored = 1,
    Connecting = 2,
    Managed = 3,
    Provisioning = 4,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 5;

    /// Every state, in table order.
    pub const ALL: [StateId; Self::COUNT] = [
        Self::Boot,
        Self::TestingStored,
        Self::Connecting,
        Self::Managed,
        Self::Provisioning,
    ];

    /// Convert an index back to `StateId`.  Panics on out-of-range in
    /// debug builds; returns `Provisioning` in release (safe fallback).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Boot,
            1 => Self::TestingStored,
            2 => Self::Connecting,
            3 => Self::Managed,
            4 => Self::Provisioning,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Provisioning
            }
        }
    }

    /// The externally visible operating mode for this state.
    pub fn mode(self) -> DeviceMode {
        match self {
            Self::Boot | Self::TestingStored | Self::Connecting => DeviceMode::Connecting,
            Self::Managed => DeviceMode::Managed,
            Self::Provisioning => DeviceMode::Provisioning,
        }
    }
}

/// Coarse operating mode reported outside the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceMode {
    /// Own access point up, configuration portal serving.
    Provisioning,
    /// Joining the stored network or opening the bus session.
    Connecting,
    /// Joined and bridging commands.
    Managed,
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut FsmContext);

/// Signature for the event handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateEventFn = fn(&mut FsmContext, &ProvisioningEvent) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_event: StateEventFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table (array of [`StateDescriptor`]); the mutable
/// [`FsmContext`] is threaded through every handler call.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Transitions taken since construction.
    transitions: u32,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            transitions: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `dispatch()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Feed one event to the current state.
    ///
    /// Returns `Some(previous)` when the event caused a transition.
    pub fn dispatch(&mut self, event: &ProvisioningEvent, ctx: &mut FsmContext) -> Option<StateId> {
        let next = (self.table[self.current].on_event)(ctx, event)?;
        let previous = self.current_state();
        self.transition(next, ctx);
        Some(previous)
    }

    /// Force an immediate transition, bypassing the event handlers.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut FsmContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    /// Human-readable name of the current state.
    pub fn current_name(&self) -> &'static str {
        self.table[self.current].name
    }

    /// Transitions taken since construction.
    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut FsmContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        // Exit current state
        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.transitions = self.transitions.wrapping_add(1);

        // Enter new state
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
