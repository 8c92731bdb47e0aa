//! Session-layer bookkeeping consumed by the request run-loop.
//!
//! The run-loop never blocks. Instead it asks the session layer to park a
//! request ([`SessionLayer::suspend`]), to schedule it again
//! ([`SessionLayer::mark_ready`]) or to record that it has been served. The
//! [`SessionBook`] is the in-process implementation used by each node.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a client or peer session within one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Wraps a raw session number.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw session number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "s{}", self.0)
    }
}

/// Identifier of a request within one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// Wraps a raw request number.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw request number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "r{}", self.0)
    }
}

/// Scheduling hooks the run-loop calls into.
pub trait SessionLayer {
    /// Queues the request to be run again.
    fn mark_ready(&mut self, request: RequestId);

    /// Removes the request from the ready queue until a wake-up re-marks it.
    fn suspend(&mut self, request: RequestId);

    /// Records that the request produced its final response.
    fn mark_served(&mut self, request: RequestId);

    /// Returns true when `session` is the link from this follower to the leader.
    fn is_leader_session(&self, session: SessionId) -> bool;
}

/// Ready queue and per-request scheduling state for one process.
#[derive(Debug, Default)]
pub struct SessionBook {
    ready: VecDeque<RequestId>,
    queued: HashSet<RequestId>,
    suspended: HashSet<RequestId>,
    served: HashSet<RequestId>,
    leader_session: Option<SessionId>,
}

impl SessionBook {
    /// Creates an empty book with no leader session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the session that carries requests from the leader.
    pub fn set_leader_session(&mut self, session: SessionId) {
        self.leader_session = Some(session);
    }

    /// Returns the session that carries requests from the leader, if any.
    #[must_use]
    pub const fn leader_session(&self) -> Option<SessionId> {
        self.leader_session
    }

    /// Drains the ready queue in the order requests were marked.
    pub fn take_ready(&mut self) -> Vec<RequestId> {
        self.queued.clear();
        self.ready.drain(..).collect()
    }

    /// Number of requests waiting to run.
    #[must_use]
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Returns true while the request is parked by [`SessionLayer::suspend`].
    #[must_use]
    pub fn is_suspended(&self, request: RequestId) -> bool {
        self.suspended.contains(&request)
    }

    /// Returns true once the request has been marked served.
    #[must_use]
    pub fn is_served(&self, request: RequestId) -> bool {
        self.served.contains(&request)
    }

    /// Drops all bookkeeping for a released request.
    pub fn forget(&mut self, request: RequestId) {
        if self.queued.remove(&request) {
            self.ready.retain(|queued| *queued != request);
        }
        self.suspended.remove(&request);
        self.served.remove(&request);
    }
}

impl SessionLayer for SessionBook {
    fn mark_ready(&mut self, request: RequestId) {
        self.suspended.remove(&request);
        if self.queued.insert(request) {
            self.ready.push_back(request);
        }
    }

    fn suspend(&mut self, request: RequestId) {
        if self.queued.remove(&request) {
            self.ready.retain(|queued| *queued != request);
        }
        self.suspended.insert(request);
    }

    fn mark_served(&mut self, request: RequestId) {
        self.served.insert(request);
    }

    fn is_leader_session(&self, session: SessionId) -> bool {
        self.leader_session == Some(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_ready_deduplicates() {
        let mut book = SessionBook::new();
        let request = RequestId::new(7);
        book.mark_ready(request);
        book.mark_ready(request);
        assert_eq!(book.take_ready(), vec![request]);
        assert!(book.take_ready().is_empty());
    }

    #[test]
    fn suspend_removes_from_ready_queue_until_woken() {
        let mut book = SessionBook::new();
        let first = RequestId::new(1);
        let second = RequestId::new(2);
        book.mark_ready(first);
        book.mark_ready(second);
        book.suspend(first);

        assert!(book.is_suspended(first));
        assert_eq!(book.take_ready(), vec![second]);

        book.mark_ready(first);
        assert!(!book.is_suspended(first));
        assert_eq!(book.take_ready(), vec![first]);
    }

    #[test]
    fn leader_session_is_matched_exactly() {
        let mut book = SessionBook::new();
        assert!(!book.is_leader_session(SessionId::new(0)));
        book.set_leader_session(SessionId::new(3));
        assert!(book.is_leader_session(SessionId::new(3)));
        assert!(!book.is_leader_session(SessionId::new(4)));
    }

    #[test]
    fn forget_clears_every_trace() {
        let mut book = SessionBook::new();
        let request = RequestId::new(9);
        book.mark_ready(request);
        book.mark_served(request);
        book.forget(request);
        assert!(!book.is_served(request));
        assert_eq!(book.ready_len(), 0);
    }
}
