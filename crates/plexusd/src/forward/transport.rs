//! Links between the processes of an SMP group.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::completion::CompletionHandle;
use crate::request::Operation;

/// Position of a process within its SMP group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(u16);

impl PeerId {
    /// Wraps a group position.
    #[must_use]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Group position as an index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "p{}", self.0)
    }
}

/// Work submitted from one process to another.
#[derive(Debug)]
pub struct Envelope {
    /// Process that submitted the work.
    pub origin: PeerId,
    /// Operation to execute.
    pub operation: Operation,
    /// Where to report the outcome.
    pub completion: CompletionHandle,
}

/// Reasons a submission is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The target cannot accept work right now; it will notify the submitter.
    #[error("peer {peer} is busy")]
    Busy {
        /// Target process.
        peer: PeerId,
    },
    /// The target does not exist or has gone away.
    #[error("peer {peer} is unreachable")]
    Unreachable {
        /// Target process.
        peer: PeerId,
    },
}

/// Request submission toward sibling processes.
pub trait GroupTransport {
    /// Position of the local process.
    fn local(&self) -> PeerId;

    /// Current followers; empty unless the local process leads.
    fn followers(&self) -> Vec<PeerId>;

    /// The leader, when the local process follows one.
    fn leader(&self) -> Option<PeerId>;

    /// Submits `operation` for execution on `target`.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Busy`] when the target's backlog is full. The
    /// transport keeps `completion` and calls [`CompletionHandle::notify`]
    /// once the backlog drains.
    fn submit(
        &self,
        target: PeerId,
        operation: Operation,
        completion: CompletionHandle,
    ) -> Result<(), SubmitError>;
}
