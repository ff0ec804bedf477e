// Completion of issued motor commands
//
// Every bounded move gets a Resolver/Completion pair over one atomic
// state cell. The hub side fulfils the Resolver (at most once), the
// control side polls the Completion. The PortRegistry maps an event
// source to the Resolver of the command currently in flight there, so a
// hub callback that only knows its port can be routed.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::hub::{MotorEvent, PairId, PortId};
use crate::config::POLL_INTERVAL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    Idle,
    Pending,
    Completed,
    Interrupted,
    Stalled,
}

impl CompletionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CompletionState::Completed | CompletionState::Interrupted | CompletionState::Stalled
        )
    }

    fn to_raw(self) -> u8 {
        match self {
            CompletionState::Idle => 0,
            CompletionState::Pending => 1,
            CompletionState::Completed => 2,
            CompletionState::Interrupted => 3,
            CompletionState::Stalled => 4,
        }
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => CompletionState::Pending,
            2 => CompletionState::Completed,
            3 => CompletionState::Interrupted,
            4 => CompletionState::Stalled,
            _ => CompletionState::Idle,
        }
    }
}

impl From<MotorEvent> for CompletionState {
    fn from(event: MotorEvent) -> Self {
        match event {
            MotorEvent::Completed => CompletionState::Completed,
            MotorEvent::Interrupted => CompletionState::Interrupted,
            MotorEvent::Stalled => CompletionState::Stalled,
        }
    }
}

/// Where a hub event comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventSource {
    Port(PortId),
    Pair(PairId),
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSource::Port(port) => write!(f, "port {}", port),
            EventSource::Pair(pair) => write!(f, "{}", pair),
        }
    }
}

/// Observing side of one issued command
#[derive(Debug, Clone)]
pub struct Completion {
    cell: Arc<AtomicU8>,
}

impl Completion {
    /// A completion for "nothing was issued"
    pub fn idle() -> Self {
        Self::with_state(CompletionState::Idle)
    }

    fn with_state(state: CompletionState) -> Self {
        Self {
            cell: Arc::new(AtomicU8::new(state.to_raw())),
        }
    }

    pub fn state(&self) -> CompletionState {
        CompletionState::from_raw(self.cell.load(Ordering::Acquire))
    }

    pub fn is_pending(&self) -> bool {
        self.state() == CompletionState::Pending
    }

    /// Poll until the command leaves Pending, yielding between polls
    ///
    /// Returns immediately for a completion that was never pending.
    pub async fn wait(&self) -> CompletionState {
        loop {
            let state = self.state();
            if state != CompletionState::Pending {
                return state;
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

/// Fulfilling side of one issued command
#[derive(Debug)]
pub struct Resolver {
    cell: Arc<AtomicU8>,
}

impl Resolver {
    /// Record the outcome. Only the first outcome sticks; returns false
    /// if the command was already resolved.
    pub fn resolve(&self, event: MotorEvent) -> bool {
        self.cell
            .compare_exchange(
                CompletionState::Pending.to_raw(),
                CompletionState::from(event).to_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// A fresh pending command: the Resolver goes to the hub side, the
/// Completion to the caller
pub fn pending() -> (Resolver, Completion) {
    let completion = Completion::with_state(CompletionState::Pending);
    let resolver = Resolver {
        cell: Arc::clone(&completion.cell),
    };
    (resolver, completion)
}

/// Routes hub events to the command in flight on each source
///
/// Owned by whoever runs the robot program and shared with the hub's
/// event source. Only the control side arms routes; the event side only
/// resolves them.
#[derive(Debug, Default)]
pub struct PortRegistry {
    routes: RwLock<HashMap<EventSource, Resolver>>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending command on `source`, replacing whatever was
    /// routed there before
    pub fn arm(&self, source: EventSource) -> Completion {
        let (resolver, completion) = pending();
        let mut routes = self.routes.write().unwrap_or_else(|p| p.into_inner());
        routes.insert(source, resolver);
        completion
    }

    /// Forget the route for `source`. Its completion, if still pending, is
    /// marked Interrupted.
    pub fn disarm(&self, source: EventSource) {
        let mut routes = self.routes.write().unwrap_or_else(|p| p.into_inner());
        if let Some(resolver) = routes.remove(&source) {
            resolver.resolve(MotorEvent::Interrupted);
        }
    }

    /// Deliver a hub event. Returns false when nothing was pending on
    /// `source`.
    pub fn dispatch(&self, source: EventSource, event: MotorEvent) -> bool {
        let routes = self.routes.read().unwrap_or_else(|p| p.into_inner());
        match routes.get(&source) {
            Some(resolver) if resolver.resolve(event) => {
                debug!("{}: {:?}", source, event);
                true
            }
            Some(_) => {
                debug!("{}: ignoring {:?}, command already resolved", source, event);
                false
            }
            None => {
                warn!("{}: {:?} with no command registered", source, event);
                false
            }
        }
    }

    pub fn is_pending(&self, source: EventSource) -> bool {
        let routes = self.routes.read().unwrap_or_else(|p| p.into_inner());
        routes
            .get(&source)
            .map(|r| CompletionState::from_raw(r.cell.load(Ordering::Acquire)) == CompletionState::Pending)
            .unwrap_or(false)
    }
}

/// Wait for every completion to leave Pending and report each state, in
/// order. A stall on one does not cut the wait for the others short.
pub async fn wait_all(completions: &[Completion]) -> Vec<CompletionState> {
    loop {
        let states: Vec<CompletionState> = completions.iter().map(Completion::state).collect();
        if states.iter().all(|s| *s != CompletionState::Pending) {
            return states;
        }
        sleep(POLL_INTERVAL).await;
    }
}
