use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::device_code::{DeviceFlow, FlowState};
use super::token::Credential;

/// Read-only projection of the store for status callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowView {
    pub authenticated: bool,
    pub pending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<serde_json::Value>,
    /// Terminal state of the most recent flow, if it has finished.
    #[serde(skip)]
    pub last_outcome: Option<FlowState>,
    #[serde(skip)]
    pub generation: u64,
}

/// Terminal result written by the scheduler.
#[derive(Debug, Clone)]
pub(crate) enum FlowOutcome {
    Approved {
        credential: Credential,
        user: Option<serde_json::Value>,
    },
    Denied,
    Expired,
}

impl FlowOutcome {
    fn state(&self) -> FlowState {
        match self {
            Self::Approved { .. } => FlowState::Approved,
            Self::Denied => FlowState::Denied,
            Self::Expired => FlowState::Expired,
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    flow: Option<DeviceFlow>,
    credential: Option<Credential>,
    user: Option<serde_json::Value>,
    last_outcome: Option<FlowState>,
}

impl Slot {
    fn view(&self) -> FlowView {
        let pending = self.flow.as_ref().filter(|f| f.is_pending());
        FlowView {
            authenticated: self.credential.is_some(),
            pending: pending.is_some(),
            user_code: pending.map(|f| f.user_code.clone()),
            verification_uri: pending.map(|f| f.verification_uri.clone()),
            user: self.credential.as_ref().and(self.user.clone()),
            last_outcome: self.last_outcome,
            generation: self.generation,
        }
    }
}

/// Single-slot, in-process store for the active device flow and its credential.
///
/// Every write replaces the slot under one lock, so readers never observe a
/// half-applied transition. Writers are the initiator, the scheduler and the
/// revoker; everything else only reads.
///
/// Each [`set`](Self::set) or [`clear`](Self::clear) starts a new generation.
/// Scheduler writes carry the generation they were spawned for and are
/// dropped once it is stale.
#[derive(Debug)]
pub struct FlowStateStore {
    slot: Mutex<Slot>,
    view_tx: watch::Sender<FlowView>,
}

impl Default for FlowStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowStateStore {
    pub fn new() -> Self {
        let (view_tx, _) = watch::channel(FlowView::default());
        Self {
            slot: Mutex::new(Slot::default()),
            view_tx,
        }
    }

    pub fn get(&self) -> FlowView {
        self.lock().view()
    }

    /// Clone of the tracked flow, if one is in progress.
    pub fn active_flow(&self) -> Option<DeviceFlow> {
        self.lock().flow.clone()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.lock().credential.clone()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Watch every view published after a write.
    pub fn subscribe(&self) -> watch::Receiver<FlowView> {
        self.view_tx.subscribe()
    }

    /// Track `flow` as the only pending flow and return its generation.
    pub(crate) fn set(&self, flow: DeviceFlow) -> u64 {
        let mut slot = self.lock();
        slot.generation += 1;
        slot.flow = Some(flow);
        slot.last_outcome = None;
        self.publish(&slot);
        slot.generation
    }

    /// Raise the poll interval of the current flow. Never lowers it.
    pub(crate) fn raise_interval(&self, generation: u64, interval_ms: u64) -> bool {
        let mut slot = self.lock();
        if slot.generation != generation {
            return false;
        }
        let Some(flow) = slot.flow.as_mut().filter(|f| f.is_pending()) else {
            return false;
        };
        if interval_ms <= flow.poll_interval_ms {
            return false;
        }
        flow.poll_interval_ms = interval_ms;
        self.publish(&slot);
        true
    }

    /// Apply the terminal transition of the flow spawned as `generation`.
    ///
    /// Returns `false` when the flow was superseded, cleared or already finished.
    pub(crate) fn complete(&self, generation: u64, outcome: FlowOutcome) -> bool {
        let mut slot = self.lock();
        if slot.generation != generation || !slot.flow.as_ref().is_some_and(|f| f.is_pending()) {
            return false;
        }
        slot.last_outcome = Some(outcome.state());
        slot.flow = None;
        if let FlowOutcome::Approved { credential, user } = outcome {
            slot.credential = Some(credential);
            slot.user = user;
        }
        self.publish(&slot);
        true
    }

    /// Drop flow, credential and identity. Returns the credential that was held.
    pub(crate) fn clear(&self) -> Option<Credential> {
        let mut slot = self.lock();
        slot.generation += 1;
        slot.flow = None;
        slot.user = None;
        slot.last_outcome = None;
        let credential = slot.credential.take();
        self.publish(&slot);
        credential
    }

    fn publish(&self, slot: &Slot) {
        self.view_tx.send_replace(slot.view());
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
