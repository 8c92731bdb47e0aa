//! Completion cells linking a waiting request to work done elsewhere.
//!
//! The waiting request owns each [`CompletionCell`] through an `Arc`. Whoever
//! executes the work holds a [`CompletionHandle`] with only a weak reference,
//! so releasing the waiting request drops the cell and later resolutions are
//! discarded.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::debug;

use crate::response::ResponseMessage;
use crate::session::RequestId;

const FORWARD_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::forward");

/// Progress of forwarded work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionState {
    /// Still running elsewhere.
    Pending,
    /// Served, with the messages it produced.
    Served(Vec<ResponseMessage>),
    /// Failed, with a description.
    Failed(String),
}

impl CompletionState {
    /// Returns true for served and failed states.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Shared slot holding the state of one piece of forwarded work.
#[derive(Debug)]
pub struct CompletionCell {
    state: Mutex<CompletionState>,
}

impl CompletionCell {
    /// Creates a pending cell.
    #[must_use]
    pub fn pending() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(CompletionState::Pending),
        })
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> CompletionState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true once the work has been served or failed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_terminal()
    }

    pub(crate) fn settle(&self, state: CompletionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

/// Sending half of a process's wake-up channel.
#[derive(Debug, Clone)]
pub struct WakeSender {
    sender: Sender<RequestId>,
}

impl WakeSender {
    /// Creates a wake-up channel.
    #[must_use]
    pub fn channel() -> (Self, Receiver<RequestId>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }

    /// Asks the owning process to run `request` again.
    pub fn wake(&self, request: RequestId) {
        if self.sender.send(request).is_err() {
            debug!(
                target: FORWARD_TARGET,
                request = %request,
                "wake-up dropped; process has shut down"
            );
        }
    }
}

/// Capability to report the outcome of forwarded work.
#[derive(Debug)]
pub struct CompletionHandle {
    cell: Weak<CompletionCell>,
    parent: RequestId,
    wake: WakeSender,
}

impl CompletionHandle {
    /// Links a handle to `cell`, waking `parent` through `wake` on resolution.
    #[must_use]
    pub fn new(cell: &Arc<CompletionCell>, parent: RequestId, wake: WakeSender) -> Self {
        Self {
            cell: Arc::downgrade(cell),
            parent,
            wake,
        }
    }

    /// Request waiting on this handle.
    #[must_use]
    pub const fn parent(&self) -> RequestId {
        self.parent
    }

    /// Settles the cell and wakes the waiting request.
    ///
    /// Returns false when the waiting request has already released the cell.
    pub fn resolve(self, state: CompletionState) -> bool {
        let Some(cell) = self.cell.upgrade() else {
            debug!(
                target: FORWARD_TARGET,
                parent = %self.parent,
                "completion discarded; waiting request already released"
            );
            return false;
        };
        cell.settle(state);
        self.wake.wake(self.parent);
        true
    }

    /// Wakes the waiting request without settling the cell.
    pub fn notify(&self) {
        self.wake.wake(self.parent);
    }
}
