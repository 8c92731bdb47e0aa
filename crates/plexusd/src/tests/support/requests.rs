//! Builders for requests and the process state a run-loop pass needs.

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::forward::{CompletionHandle, CompletionState, GroupTransport, WakeSender};
use crate::property::builtin::{self, SMP_ROLE};
use crate::property::{
    PropertyDescriptor, PropertyRegistry, PropertyStore, SetterError, SetterOutcome,
};
use crate::request::{
    ExecContext, Operation, ReplyRoute, Request, RunEnv, RunError, RunOutcome, parse, run_loop,
};
use crate::role::ProcessRole;
use crate::session::{RequestId, SessionBook, SessionId};
use crate::set::Assignment;

/// Builds a client request from `text`.
pub fn request(id: u64, session: SessionId, text: &str) -> Request {
    let parsed = parse::parse(text).expect("request text should parse");
    Request::new(
        RequestId::new(id),
        session,
        Operation::new(text),
        parsed,
        ReplyRoute::Client,
        Instant::now() + Duration::from_secs(30),
    )
}

/// Completion handles captured by a transport double.
#[derive(Debug, Clone, Default)]
pub struct Captured {
    handles: Arc<Mutex<Vec<CompletionHandle>>>,
}

impl Captured {
    pub fn push(&self, handle: CompletionHandle) {
        self.handles.lock().expect("captured handles").push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.lock().expect("captured handles").len()
    }

    /// Resolves the oldest captured handle.
    pub fn resolve_next(&self, state: CompletionState) -> bool {
        let handle = {
            let mut handles = self.handles.lock().expect("captured handles");
            assert!(!handles.is_empty(), "no captured handle to resolve");
            handles.remove(0)
        };
        handle.resolve(state)
    }

    pub fn take_all(&self) -> Vec<CompletionHandle> {
        std::mem::take(&mut *self.handles.lock().expect("captured handles"))
    }
}

/// Process state for driving the run-loop directly.
pub struct RunBench {
    pub sessions: SessionBook,
    pub registry: PropertyRegistry,
    pub store: PropertyStore,
    pub wake: WakeSender,
    pub wakeups: Receiver<RequestId>,
}

impl RunBench {
    pub fn new(role: ProcessRole) -> Self {
        let mut store = PropertyStore::default();
        builtin::seed_store(&mut store, "bench", role);
        let (wake, wakeups) = WakeSender::channel();
        Self {
            sessions: SessionBook::new(),
            registry: builtin::registry().expect("built-in registry"),
            store,
            wake,
            wakeups,
        }
    }

    pub fn run(
        &mut self,
        role: ProcessRole,
        transport: &dyn GroupTransport,
        request: &mut Request,
    ) -> Result<RunOutcome, RunError> {
        let deadline = request.deadline();
        let mut env = RunEnv {
            role,
            sessions: &mut self.sessions,
            transport,
            registry: &self.registry,
            store: &mut self.store,
            wake: &self.wake,
        };
        run_loop::run(request, &mut env, deadline)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.store.get(name)
    }

    pub fn wakeups(&self) -> Vec<RequestId> {
        self.wakeups.try_iter().collect()
    }
}

/// Property that always faults.
pub const BROKEN: &str = "broken";
/// Property whose setter faults on followers only.
pub const REPLICA_FAULT: &str = "replica-fault";

fn broken_setter(
    descriptor: &PropertyDescriptor,
    _ctx: &mut ExecContext<'_>,
    _assignment: &Assignment,
) -> SetterOutcome {
    SetterOutcome::Fail(SetterError::Internal {
        property: descriptor.name().to_owned(),
        message: "backing storage unavailable".to_owned(),
    })
}

fn replica_fault_setter(
    descriptor: &PropertyDescriptor,
    ctx: &mut ExecContext<'_>,
    assignment: &Assignment,
) -> SetterOutcome {
    if ctx.store_ref().get(SMP_ROLE) == Some("follower") {
        return broken_setter(descriptor, ctx, assignment);
    }
    let value = ctx.span(assignment.value_span()).to_owned();
    match ctx.store().set(descriptor.name(), value) {
        Ok(_) => SetterOutcome::Continue,
        Err(error) => SetterOutcome::Fail(error),
    }
}

/// Built-in registry plus properties whose setters fault.
pub fn fault_registry() -> PropertyRegistry {
    let mut registry = builtin::registry().expect("built-in registry");
    registry
        .register(PropertyDescriptor::writable(BROKEN, broken_setter))
        .expect("register broken");
    registry
        .register(PropertyDescriptor::writable(
            REPLICA_FAULT,
            replica_fault_setter,
        ))
        .expect("register replica-fault");
    registry
}
