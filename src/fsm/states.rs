//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.  This is the classic embedded C FSM pattern
//! expressed in safe Rust.
//!
//! ```text
//!  BOOT ──[reset / no credentials]────────────────▶ PROVISIONING
//!    │                                              │         ▲
//!  [credentials]                          [committed]│         │[join budget spent]
//!    ▼                                              ▼         │
//!  TESTING_STORED ◀─────────────────────────────────┘         │
//!    │    └───────────────────────────────────────────────────┘
//!  [joined]
//!    ▼
//!  CONNECTING ──[bus up]──▶ MANAGED
//!       ▲                     │
//!       └────[reconnect]──────┘
//!
//!  CONNECTING / MANAGED ──[link lost]──▶ PROVISIONING
//! ```

use log::{info, warn};

use super::context::{Effect, FsmContext, ProvisioningEvent};
use super::{StateDescriptor, StateId};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Boot
        StateDescriptor {
            id: StateId::Boot,
            name: "Boot",
            on_enter: None,
            on_exit: None,
            on_event: boot_event,
        },
        // Index 1: TestingStored
        StateDescriptor {
            id: StateId::TestingStored,
            name: "TestingStored",
            on_enter: Some(testing_enter),
            on_exit: None,
            on_event: testing_event,
        },
        // Index 2: Connecting
        StateDescriptor {
            id: StateId::Connecting,
            name: "Connecting",
            on_enter: Some(connecting_enter),
            on_exit: None,
            on_event: connecting_event,
        },
        // Index 3: Managed
        StateDescriptor {
            id: StateId::Managed,
            name: "Managed",
            on_enter: Some(managed_enter),
            on_exit: None,
            on_event: managed_event,
        },
        // Index 4: Provisioning
        StateDescriptor {
            id: StateId::Provisioning,
            name: "Provisioning",
            on_enter: Some(provisioning_enter),
            on_exit: Some(provisioning_exit),
            on_event: provisioning_event,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  BOOT state: decide the first mode
// ═══════════════════════════════════════════════════════════════════════════

fn boot_event(ctx: &mut FsmContext, event: &ProvisioningEvent) -> Option<StateId> {
    let ProvisioningEvent::Boot {
        reset_asserted,
        has_credentials,
    } = *event
    else {
        return None;
    };

    if reset_asserted {
        warn!("BOOT: reset trigger held, erasing credentials");
        ctx.push(Effect::EraseCredentials);
        return Some(StateId::Provisioning);
    }
    if has_credentials {
        return Some(StateId::TestingStored);
    }
    info!("BOOT: no stored network");
    Some(StateId::Provisioning)
}

// ═══════════════════════════════════════════════════════════════════════════
//  TESTING_STORED state: bounded join of the stored network
// ═══════════════════════════════════════════════════════════════════════════

fn testing_enter(ctx: &mut FsmContext) {
    ctx.join_polls = 0;
    ctx.push(Effect::BeginJoin);
    info!(
        "TESTING: joining stored network ({} polls allowed)",
        ctx.join_poll_budget
    );
}

fn testing_event(ctx: &mut FsmContext, event: &ProvisioningEvent) -> Option<StateId> {
    match *event {
        ProvisioningEvent::JoinPoll { joined: true } => {
            info!("TESTING: joined after {} polls", ctx.join_polls);
            Some(StateId::Connecting)
        }
        ProvisioningEvent::JoinPoll { joined: false } => {
            ctx.join_polls = ctx.join_polls.saturating_add(1);
            if ctx.join_polls >= ctx.join_poll_budget {
                warn!("TESTING: stored network unreachable");
                return Some(StateId::Provisioning);
            }
            None
        }
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTING state: link up, waiting for the bus session
// ═══════════════════════════════════════════════════════════════════════════

fn connecting_enter(ctx: &mut FsmContext) {
    ctx.push(Effect::ArmBus);
}

fn connecting_event(ctx: &mut FsmContext, event: &ProvisioningEvent) -> Option<StateId> {
    match event {
        ProvisioningEvent::BusConnected => Some(StateId::Managed),
        ProvisioningEvent::ReconnectRequested => {
            ctx.push(Effect::Disconnect);
            ctx.push(Effect::BeginJoin);
            None
        }
        ProvisioningEvent::ConnectivityLost => Some(StateId::Provisioning),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  MANAGED state: bridging commands
// ═══════════════════════════════════════════════════════════════════════════

fn managed_enter(ctx: &mut FsmContext) {
    ctx.push(Effect::SubscribeBus);
    ctx.push(Effect::ClearLinkFailures);
    info!("MANAGED: relaying commands");
}

fn managed_event(ctx: &mut FsmContext, event: &ProvisioningEvent) -> Option<StateId> {
    match event {
        ProvisioningEvent::ReconnectRequested => {
            ctx.push(Effect::Disconnect);
            ctx.push(Effect::BeginJoin);
            Some(StateId::Connecting)
        }
        ProvisioningEvent::ConnectivityLost => Some(StateId::Provisioning),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  PROVISIONING state: own access point + configuration portal
// ═══════════════════════════════════════════════════════════════════════════

fn provisioning_enter(ctx: &mut FsmContext) {
    ctx.push(Effect::DiscardRelay);
    ctx.push(Effect::Disconnect);
    ctx.push(Effect::StartAccessPoint);
    info!("PROVISIONING: configuration portal up");
}

fn provisioning_exit(ctx: &mut FsmContext) {
    ctx.push(Effect::StopAccessPoint);
}

fn provisioning_event(_ctx: &mut FsmContext, event: &ProvisioningEvent) -> Option<StateId> {
    match event {
        ProvisioningEvent::CredentialsCommitted => Some(StateId::TestingStored),
        _ => None,
    }
}
