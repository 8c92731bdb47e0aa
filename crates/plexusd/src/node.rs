//! One process of an SMP group.
//!
//! A [`Node`] owns the requests submitted to it, the ready queue that decides
//! which of them run next and the wake-up channel that forwarded work uses to
//! re-schedule a waiting request. [`Node::poll`] runs every ready request
//! once; a request that cannot finish stays parked until it is woken.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::forward::{
    self, CompletionState, Envelope, GroupTransport, PeerId, WakeSender,
};
use crate::property::{PropertyRegistry, PropertyStore, builtin};
use crate::request::{
    Operation, ParseError, ReplyRoute, Request, RunEnv, RunOutcome, parse, run_loop,
};
use crate::response::{ErrorCode, Response, ResponseMessage, ResponseStatus};
use crate::role::ProcessRole;
use crate::session::{RequestId, SessionBook, SessionId, SessionLayer};

const NODE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::node");

/// Identity and sizing of one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSettings {
    /// Position in the group.
    pub peer: PeerId,
    /// Role of the process.
    pub role: ProcessRole,
    /// Identity shared by the group.
    pub instance_id: String,
    /// Maximum number of property values the process stores.
    pub store_capacity: usize,
}

/// Counters describing one [`Node::poll`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    /// Wake-ups received for live requests.
    pub woken: usize,
    /// Requests run.
    pub ran: usize,
    /// Requests that produced their final response.
    pub finished: usize,
}

impl PollReport {
    /// Returns true when the pass did any work.
    #[must_use]
    pub const fn made_progress(&self) -> bool {
        self.woken > 0 || self.ran > 0
    }
}

/// One server process.
pub struct Node {
    peer: PeerId,
    role: ProcessRole,
    registry: Arc<PropertyRegistry>,
    store: PropertyStore,
    transport: Box<dyn GroupTransport>,
    sessions: SessionBook,
    requests: BTreeMap<RequestId, Request>,
    peer_sessions: BTreeMap<PeerId, SessionId>,
    outbox: BTreeMap<SessionId, Vec<Response>>,
    wake: WakeSender,
    wakeups: Receiver<RequestId>,
    next_request: u64,
    next_session: u64,
}

impl Node {
    /// Creates a process with a seeded property store.
    #[must_use]
    pub fn new(
        settings: NodeSettings,
        registry: Arc<PropertyRegistry>,
        transport: Box<dyn GroupTransport>,
    ) -> Self {
        let mut store = PropertyStore::with_capacity(settings.store_capacity);
        builtin::seed_store(&mut store, &settings.instance_id, settings.role);
        let (wake, wakeups) = WakeSender::channel();
        let mut node = Self {
            peer: settings.peer,
            role: settings.role,
            registry,
            store,
            transport,
            sessions: SessionBook::new(),
            requests: BTreeMap::new(),
            peer_sessions: BTreeMap::new(),
            outbox: BTreeMap::new(),
            wake,
            wakeups,
            next_request: 0,
            next_session: 0,
        };
        if settings.role == ProcessRole::Follower
            && let Some(leader) = node.transport.leader()
        {
            let session = node.peer_session(leader);
            node.sessions.set_leader_session(session);
        }
        node
    }

    /// Position in the group.
    #[must_use]
    pub const fn peer(&self) -> PeerId {
        self.peer
    }

    /// Role of the process.
    #[must_use]
    pub const fn role(&self) -> ProcessRole {
        self.role
    }

    /// Property values of the process.
    #[must_use]
    pub const fn store(&self) -> &PropertyStore {
        &self.store
    }

    /// Property registry.
    #[must_use]
    pub fn registry(&self) -> &PropertyRegistry {
        &self.registry
    }

    /// Scheduling state.
    #[must_use]
    pub const fn sessions(&self) -> &SessionBook {
        &self.sessions
    }

    /// Request still in flight, if any.
    #[must_use]
    pub fn request(&self, id: RequestId) -> Option<&Request> {
        self.requests.get(&id)
    }

    /// Number of requests still in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.requests.len()
    }

    /// Opens a client session.
    pub fn open_session(&mut self) -> SessionId {
        self.next_session += 1;
        SessionId::new(self.next_session)
    }

    /// Submits client request text on `session`.
    ///
    /// Malformed text is answered immediately with a failed response.
    pub fn submit(&mut self, session: SessionId, text: &str) -> RequestId {
        let id = self.allocate_request();
        let operation = Operation::new(text);
        match parse::parse(operation.text()) {
            Ok(parsed) => {
                let deadline = self.deadline();
                let request =
                    Request::new(id, session, operation, parsed, ReplyRoute::Client, deadline);
                self.admit(request);
            }
            Err(error) => {
                debug!(
                    target: NODE_TARGET,
                    request = %id,
                    session = %session,
                    error = %error,
                    "malformed request rejected"
                );
                self.outbox.entry(session).or_default().push(Response {
                    request: id,
                    status: ResponseStatus::Failed,
                    messages: vec![malformed(&error)],
                });
            }
        }
        id
    }

    /// Accepts work submitted by another process of the group.
    pub fn accept(&mut self, envelope: Envelope) {
        let Envelope {
            origin,
            operation,
            completion,
        } = envelope;
        let parsed = match parse::parse(operation.text()) {
            Ok(parsed) => parsed,
            Err(error) => {
                completion.resolve(CompletionState::Failed(error.to_string()));
                return;
            }
        };
        let id = self.allocate_request();
        let session = self.peer_session(origin);
        let deadline = self.deadline();
        let request = Request::new(
            id,
            session,
            operation,
            parsed,
            ReplyRoute::Upstream(completion),
            deadline,
        );
        debug!(
            target: NODE_TARGET,
            request = %id,
            origin = %origin,
            "accepted peer request"
        );
        self.admit(request);
    }

    /// Runs every ready request once.
    pub fn poll(&mut self) -> PollReport {
        let mut report = PollReport::default();
        while let Ok(id) = self.wakeups.try_recv() {
            if self.requests.contains_key(&id) {
                self.sessions.mark_ready(id);
                report.woken += 1;
            }
        }

        for id in self.sessions.take_ready() {
            let Some(mut request) = self.requests.remove(&id) else {
                continue;
            };
            report.ran += 1;
            let deadline = request.deadline();
            let result = {
                let mut env = RunEnv {
                    role: self.role,
                    sessions: &mut self.sessions,
                    transport: self.transport.as_ref(),
                    registry: &self.registry,
                    store: &mut self.store,
                    wake: &self.wake,
                };
                run_loop::run(&mut request, &mut env, deadline)
            };
            match result {
                Ok(RunOutcome::More) => {
                    self.requests.insert(id, request);
                }
                Ok(RunOutcome::Done) => {
                    self.deliver(request, ResponseStatus::Served);
                    report.finished += 1;
                }
                Err(error) => {
                    warn!(
                        target: NODE_TARGET,
                        request = %id,
                        error = %error,
                        "request failed"
                    );
                    request.report_failure(&error);
                    forward::unlink_all(&mut request);
                    self.deliver(request, ResponseStatus::Failed);
                    report.finished += 1;
                }
            }
        }
        report
    }

    /// Takes the responses delivered to `session` so far.
    pub fn take_responses(&mut self, session: SessionId) -> Vec<Response> {
        self.outbox.remove(&session).unwrap_or_default()
    }

    fn admit(&mut self, mut request: Request) {
        let id = request.id();
        request.input_arrived();
        self.requests.insert(id, request);
        self.sessions.mark_ready(id);
    }

    fn deliver(&mut self, mut request: Request, status: ResponseStatus) {
        let id = request.id();
        let messages = request.take_responses();
        match request.take_reply() {
            ReplyRoute::Client => {
                self.outbox
                    .entry(request.session())
                    .or_default()
                    .push(Response {
                        request: id,
                        status,
                        messages,
                    });
            }
            ReplyRoute::Upstream(completion) => {
                let state = match status {
                    ResponseStatus::Served => CompletionState::Served(messages),
                    ResponseStatus::Failed => CompletionState::Failed(failure_reason(&messages)),
                };
                completion.resolve(state);
            }
        }
        request.output_sent();
        self.sessions.forget(id);
        request.free();
    }

    fn allocate_request(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId::new(self.next_request)
    }

    fn peer_session(&mut self, peer: PeerId) -> SessionId {
        if let Some(session) = self.peer_sessions.get(&peer) {
            return *session;
        }
        let session = self.open_session();
        self.peer_sessions.insert(peer, session);
        session
    }

    fn deadline(&self) -> Instant {
        let timeout = Duration::from_millis(builtin::query_timeout_ms(&self.store));
        let now = Instant::now();
        now.checked_add(timeout).unwrap_or(now)
    }
}

fn malformed(error: &ParseError) -> ResponseMessage {
    ResponseMessage::error(ErrorCode::MalformedRequest, error.to_string())
}

fn failure_reason(messages: &[ResponseMessage]) -> String {
    messages
        .iter()
        .rev()
        .find_map(|message| match message {
            ResponseMessage::Error { message, .. } => Some(message.clone()),
            _ => None,
        })
        .unwrap_or_else(|| "request failed".to_owned())
}
