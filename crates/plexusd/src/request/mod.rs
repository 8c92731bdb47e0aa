//! Resumable requests and the per-kind behaviour behind them.
//!
//! A [`Request`] lives from submission until its final response is delivered.
//! Each call to [`run_loop::run`] moves it forward without blocking; the
//! request keeps its own progress, so a later call resumes where the previous
//! one stopped. Kind-specific behaviour sits behind [`RequestType`], selected
//! through [`RequestKind`].

mod errors;
pub mod parse;
pub mod run_loop;
mod show;

use std::mem;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use strum::Display;

use crate::forward::{CompletionHandle, ForwardState};
use crate::property::{PropertyRegistry, PropertyStore};
use crate::response::{ErrorCode, ResponseMessage};
use crate::session::{RequestId, SessionId};
use crate::set::SetRequest;

pub use errors::{ParseError, RunError};
pub use parse::ParsedRequest;
pub use run_loop::RunEnv;
pub use show::ShowRequest;

/// Result of one pass through a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The request produced its final result.
    Done,
    /// The request waits for a wake-up before it can continue.
    More,
}

/// Behaviour of one request kind.
///
/// Only [`RequestType::run`] is required; the remaining hooks default to
/// doing nothing.
pub trait RequestType {
    /// Called once when the request has been received in full.
    fn on_input_arrived(&mut self, _request: RequestId) {}

    /// Executes the kind-specific body.
    ///
    /// # Errors
    ///
    /// Returns a [`RunError`] for faults that must fail the request.
    fn run(&mut self, ctx: &mut ExecContext<'_>, deadline: Instant)
    -> Result<RunOutcome, RunError>;

    /// Called after the final response has been handed off.
    fn on_output_sent(&mut self, _request: RequestId) {}

    /// Called exactly once when the request is released.
    fn on_free(&mut self, _request: RequestId) {}

    /// Whether a leader replicates this kind to its followers.
    fn replicates(&self) -> bool {
        false
    }
}

/// Request kinds understood by the server.
#[derive(Debug)]
pub enum RequestKind {
    /// Property assignment.
    Set(SetRequest),
    /// Property read-back.
    Show(ShowRequest),
}

impl RequestKind {
    /// Builds the kind state for a parsed request.
    #[must_use]
    pub fn from_parsed(parsed: ParsedRequest) -> Self {
        match parsed {
            ParsedRequest::Set(queue) => Self::Set(SetRequest::new(queue)),
            ParsedRequest::Show(name) => Self::Show(ShowRequest::new(name)),
        }
    }

    /// Whether a leader replicates this kind to its followers.
    #[must_use]
    pub fn replicates(&self) -> bool {
        self.as_type().replicates()
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn label(&self) -> OperationKind {
        match self {
            Self::Set(_) => OperationKind::Set,
            Self::Show(_) => OperationKind::Show,
        }
    }

    fn as_type(&self) -> &dyn RequestType {
        match self {
            Self::Set(set) => set,
            Self::Show(show) => show,
        }
    }

    fn as_type_mut(&mut self) -> &mut dyn RequestType {
        match self {
            Self::Set(set) => set,
            Self::Show(show) => show,
        }
    }
}

/// Keyword of a request, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    /// `SET`.
    Set,
    /// `SHOW`.
    Show,
}

/// Original request text, shared with any sub-requests created for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    text: Arc<str>,
}

impl Operation {
    /// Wraps request text.
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self { text: text.into() }
    }

    /// The request text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Where the final response of a request goes.
#[derive(Debug)]
pub enum ReplyRoute {
    /// Back to the client session that submitted it.
    Client,
    /// To the peer request waiting on this one.
    Upstream(CompletionHandle),
}

/// A client or peer request in flight.
#[derive(Debug)]
pub struct Request {
    id: RequestId,
    session: SessionId,
    operation: Operation,
    kind: RequestKind,
    forward: ForwardState,
    responses: Vec<ResponseMessage>,
    reply: ReplyRoute,
    deadline: Instant,
}

impl Request {
    /// Creates a request owned by `session` from its parsed body.
    #[must_use]
    pub fn new(
        id: RequestId,
        session: SessionId,
        operation: Operation,
        parsed: ParsedRequest,
        reply: ReplyRoute,
        deadline: Instant,
    ) -> Self {
        Self {
            id,
            session,
            operation,
            kind: RequestKind::from_parsed(parsed),
            forward: ForwardState::default(),
            responses: Vec::new(),
            reply,
            deadline,
        }
    }

    /// Request identifier.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Session that owns the request.
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Original operation.
    #[must_use]
    pub const fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Kind-specific state.
    #[must_use]
    pub const fn kind(&self) -> &RequestKind {
        &self.kind
    }

    /// Deadline passed to the kind body.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Whether fan-out to followers has begun. Never reset once set.
    #[must_use]
    pub const fn forward_started(&self) -> bool {
        self.forward.started()
    }

    /// Forwarding bookkeeping.
    #[must_use]
    pub const fn forward(&self) -> &ForwardState {
        &self.forward
    }

    pub(crate) const fn forward_mut(&mut self) -> &mut ForwardState {
        &mut self.forward
    }

    /// Messages accumulated so far.
    #[must_use]
    pub fn responses(&self) -> &[ResponseMessage] {
        &self.responses
    }

    pub(crate) fn responses_mut(&mut self) -> &mut Vec<ResponseMessage> {
        &mut self.responses
    }

    /// Records a fault as the last response message.
    pub fn report_failure(&mut self, error: &RunError) {
        self.responses
            .push(ResponseMessage::error(error.code(), error.to_string()));
    }

    /// Takes the accumulated messages.
    pub fn take_responses(&mut self) -> Vec<ResponseMessage> {
        mem::take(&mut self.responses)
    }

    /// Takes the reply route, leaving [`ReplyRoute::Client`] behind.
    pub fn take_reply(&mut self) -> ReplyRoute {
        mem::replace(&mut self.reply, ReplyRoute::Client)
    }

    /// Fires the input-arrived hook.
    pub fn input_arrived(&mut self) {
        let id = self.id;
        self.kind.as_type_mut().on_input_arrived(id);
    }

    /// Fires the output-sent hook.
    pub fn output_sent(&mut self) {
        let id = self.id;
        self.kind.as_type_mut().on_output_sent(id);
    }

    /// Releases the request, firing the free hook exactly once.
    pub fn free(mut self) {
        let id = self.id;
        self.kind.as_type_mut().on_free(id);
    }
}

/// Everything a kind body may touch while it runs.
pub struct ExecContext<'a> {
    request: RequestId,
    session: SessionId,
    text: &'a str,
    registry: &'a PropertyRegistry,
    store: &'a mut PropertyStore,
    responses: &'a mut Vec<ResponseMessage>,
}

impl<'a> ExecContext<'a> {
    /// Builds a context over the request text and process state.
    pub const fn new(
        request: RequestId,
        session: SessionId,
        text: &'a str,
        registry: &'a PropertyRegistry,
        store: &'a mut PropertyStore,
        responses: &'a mut Vec<ResponseMessage>,
    ) -> Self {
        Self {
            request,
            session,
            text,
            registry,
            store,
            responses,
        }
    }

    /// Request being executed.
    #[must_use]
    pub const fn request(&self) -> RequestId {
        self.request
    }

    /// Session that owns the request.
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Resolves a byte span of the request text. Out-of-range spans are empty.
    #[must_use]
    pub fn span(&self, span: &Range<usize>) -> &'a str {
        self.text.get(span.clone()).unwrap_or_default()
    }

    /// Property registry.
    #[must_use]
    pub const fn registry(&self) -> &'a PropertyRegistry {
        self.registry
    }

    /// Property values of this process.
    pub fn store(&mut self) -> &mut PropertyStore {
        &mut *self.store
    }

    /// Read-only view of the property values.
    #[must_use]
    pub fn store_ref(&self) -> &PropertyStore {
        &*self.store
    }

    /// Appends a result message.
    pub fn push(&mut self, message: ResponseMessage) {
        self.responses.push(message);
    }

    /// Reports a semantic error to the client.
    pub fn report_error(&mut self, code: ErrorCode, message: impl Into<String>) {
        self.responses.push(ResponseMessage::error(code, message));
    }
}
