//! Leader fan-out and follower pass-through.
//!
//! A leader sends every replicated request to each follower before applying
//! it locally and waits until every copy has finished, successfully or not.
//! A follower never executes a client write itself; it relays the request to
//! the leader and reports the leader's answer.

mod completion;
mod transport;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::request::{Operation, Request, RunError};
use crate::session::RequestId;

pub use completion::{CompletionCell, CompletionHandle, CompletionState, WakeSender};
pub use transport::{Envelope, GroupTransport, PeerId, SubmitError};

const FORWARD_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::forward");

/// Result of one pass-through step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The leader answered; its messages are on the request.
    Done,
    /// Waiting for the leader's answer.
    More,
    /// The leader link is busy; park the request until it drains.
    Suspend,
}

#[derive(Debug)]
struct ChildLink {
    peer: PeerId,
    cell: Arc<CompletionCell>,
    awaiting_room: bool,
}

/// Forwarding bookkeeping carried by each request.
#[derive(Debug, Default)]
pub struct ForwardState {
    started: bool,
    children: Vec<ChildLink>,
    passthrough: Option<Arc<CompletionCell>>,
}

impl ForwardState {
    /// Whether fan-out has begun.
    #[must_use]
    pub const fn started(&self) -> bool {
        self.started
    }

    /// Number of linked follower copies.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Followers whose copy has not finished yet.
    #[must_use]
    pub fn pending_peers(&self) -> Vec<PeerId> {
        self.children
            .iter()
            .filter(|child| !child.cell.is_terminal())
            .map(|child| child.peer)
            .collect()
    }

    /// Followers whose inbox was full when their copy was offered.
    #[must_use]
    pub fn awaiting_room(&self) -> Vec<PeerId> {
        self.children
            .iter()
            .filter(|child| child.awaiting_room)
            .map(|child| child.peer)
            .collect()
    }

    /// Whether a relayed copy is waiting on the leader.
    #[must_use]
    pub const fn passthrough_in_flight(&self) -> bool {
        self.passthrough.is_some()
    }
}

/// Sends a copy of `request` to every follower and links the copies.
///
/// A follower that is unreachable counts as failed; follower failures never
/// fail the request itself. A follower whose inbox is full keeps its copy
/// pending until [`resubmit_waiting`] gets it accepted.
pub fn start_forward_outgoing(request: &mut Request, transport: &dyn GroupTransport, wake: &WakeSender) {
    let parent = request.id();
    let operation = request.operation().clone();
    let followers = transport.followers();
    let forward = request.forward_mut();
    forward.started = true;

    for peer in followers {
        let mut child = ChildLink {
            peer,
            cell: CompletionCell::pending(),
            awaiting_room: false,
        };
        offer_copy(&mut child, parent, &operation, transport, wake);
        forward.children.push(child);
    }

    debug!(
        target: FORWARD_TARGET,
        request = %parent,
        children = forward.children.len(),
        "fan-out started"
    );
}

/// Offers the copy again to every follower that was busy.
///
/// Returns the number of copies accepted by this call.
#[must_use = "the count tells whether any held-back copy went out"]
pub fn resubmit_waiting(
    request: &mut Request,
    transport: &dyn GroupTransport,
    wake: &WakeSender,
) -> usize {
    let parent = request.id();
    let operation = request.operation().clone();
    let mut accepted = 0;
    for child in request
        .forward_mut()
        .children
        .iter_mut()
        .filter(|child| child.awaiting_room)
    {
        offer_copy(child, parent, &operation, transport, wake);
        if !child.awaiting_room && !child.cell.is_terminal() {
            accepted += 1;
        }
    }
    accepted
}

fn offer_copy(
    child: &mut ChildLink,
    parent: RequestId,
    operation: &Operation,
    transport: &dyn GroupTransport,
    wake: &WakeSender,
) {
    let handle = CompletionHandle::new(&child.cell, parent, wake.clone());
    match transport.submit(child.peer, operation.clone(), handle) {
        Ok(()) => child.awaiting_room = false,
        Err(SubmitError::Busy { .. }) => {
            debug!(
                target: FORWARD_TARGET,
                request = %parent,
                peer = %child.peer,
                "replica inbox full; copy held back"
            );
            child.awaiting_room = true;
        }
        Err(error) => {
            warn!(
                target: FORWARD_TARGET,
                request = %parent,
                peer = %child.peer,
                error = %error,
                "replica submission failed; continuing without it"
            );
            child.awaiting_room = false;
            child.cell.settle(CompletionState::Failed(error.to_string()));
        }
    }
}

/// Returns true once every follower copy has been served or failed.
#[must_use]
pub fn forward_finished(request: &Request) -> bool {
    request
        .forward()
        .children
        .iter()
        .all(|child| child.cell.is_terminal())
}

/// Detaches every linked copy. Safe to call repeatedly.
pub fn unlink_all(request: &mut Request) {
    let parent = request.id();
    let forward = request.forward_mut();
    if forward.children.is_empty() && forward.passthrough.is_none() {
        return;
    }
    let failed = forward
        .children
        .iter()
        .filter(|child| matches!(child.cell.state(), CompletionState::Failed(_)))
        .count();
    debug!(
        target: FORWARD_TARGET,
        request = %parent,
        children = forward.children.len(),
        failed,
        "forwarding links released"
    );
    forward.children.clear();
    forward.passthrough = None;
}

/// Relays `request` to the leader, or checks on a relay already in flight.
///
/// # Errors
///
/// Returns [`RunError::Upstream`] when the leader failed the request,
/// [`RunError::Submit`] when the leader is unreachable and
/// [`RunError::NoLeader`] when no leader is known.
pub fn passthrough(
    request: &mut Request,
    transport: &dyn GroupTransport,
    wake: &WakeSender,
) -> Result<Progress, RunError> {
    let in_flight = request.forward().passthrough.as_ref().map(|cell| cell.state());
    match in_flight {
        Some(CompletionState::Pending) => return Ok(Progress::More),
        Some(CompletionState::Served(messages)) => {
            request.forward_mut().passthrough = None;
            request.responses_mut().extend(messages);
            return Ok(Progress::Done);
        }
        Some(CompletionState::Failed(reason)) => {
            request.forward_mut().passthrough = None;
            return Err(RunError::Upstream { reason });
        }
        None => {}
    }

    let leader = transport.leader().ok_or(RunError::NoLeader)?;
    let cell = CompletionCell::pending();
    let handle = CompletionHandle::new(&cell, request.id(), wake.clone());
    match transport.submit(leader, request.operation().clone(), handle) {
        Ok(()) => {
            debug!(
                target: FORWARD_TARGET,
                request = %request.id(),
                leader = %leader,
                "request relayed to leader"
            );
            request.forward_mut().passthrough = Some(cell);
            Ok(Progress::More)
        }
        Err(SubmitError::Busy { .. }) => {
            debug!(
                target: FORWARD_TARGET,
                request = %request.id(),
                leader = %leader,
                "leader busy; suspending request"
            );
            Ok(Progress::Suspend)
        }
        Err(error) => Err(RunError::Submit(error)),
    }
}
