//! The generic request run-loop.
//!
//! [`run`] is re-entrant and never blocks. The role branch is evaluated first
//! on every call:
//!
//! 1. A follower relays requests that did not come from the leader and never
//!    executes them locally.
//! 2. A leader sends replicated kinds to every follower exactly once and
//!    waits until every copy has finished before executing locally. A copy
//!    refused by a full inbox is offered again when the inbox drains.
//! 3. Otherwise the kind body runs. On success the request is marked served
//!    and its forwarding links are released.

use std::time::Instant;

use tracing::{debug, trace};

use super::{ExecContext, Request, RunError, RunOutcome};
use crate::forward::{self, GroupTransport, Progress, WakeSender};
use crate::property::{PropertyRegistry, PropertyStore};
use crate::role::ProcessRole;
use crate::session::SessionLayer;

const RUN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::run_loop");

/// Process state a run-loop pass works against.
pub struct RunEnv<'a> {
    /// Role of the local process.
    pub role: ProcessRole,
    /// Scheduling hooks.
    pub sessions: &'a mut dyn SessionLayer,
    /// Links to the other processes.
    pub transport: &'a dyn GroupTransport,
    /// Property registry.
    pub registry: &'a PropertyRegistry,
    /// Property values.
    pub store: &'a mut PropertyStore,
    /// Wake-up channel of the local process.
    pub wake: &'a WakeSender,
}

/// Advances `request` as far as it can go without waiting.
///
/// Returns [`RunOutcome::More`] while the request waits on followers, on the
/// leader, or on a busy leader link. In that last case the request is also
/// suspended through the session layer.
///
/// # Errors
///
/// Returns a [`RunError`] for faults; the request is not retried.
pub fn run(
    request: &mut Request,
    env: &mut RunEnv<'_>,
    deadline: Instant,
) -> Result<RunOutcome, RunError> {
    match env.role {
        ProcessRole::Follower if !env.sessions.is_leader_session(request.session()) => {
            return match forward::passthrough(request, env.transport, env.wake)? {
                Progress::More => Ok(RunOutcome::More),
                Progress::Suspend => {
                    env.sessions.suspend(request.id());
                    Ok(RunOutcome::More)
                }
                Progress::Done => {
                    finish(request, env.sessions);
                    Ok(RunOutcome::Done)
                }
            };
        }
        ProcessRole::Leader if request.kind().replicates() => {
            if request.forward_started() {
                let resent = forward::resubmit_waiting(request, env.transport, env.wake);
                if resent > 0 {
                    debug!(
                        target: RUN_TARGET,
                        request = %request.id(),
                        resent,
                        "held-back replica copies sent"
                    );
                }
            } else {
                forward::start_forward_outgoing(request, env.transport, env.wake);
            }
            if !forward::forward_finished(request) {
                trace!(
                    target: RUN_TARGET,
                    request = %request.id(),
                    pending = request.forward().pending_peers().len(),
                    held_back = request.forward().awaiting_room().len(),
                    "waiting on replicas"
                );
                return Ok(RunOutcome::More);
            }
        }
        _ => {}
    }

    let outcome = {
        let Request {
            id,
            session,
            operation,
            kind,
            responses,
            ..
        } = request;
        let mut ctx = ExecContext::new(
            *id,
            *session,
            operation.text(),
            env.registry,
            env.store,
            responses,
        );
        kind.as_type_mut().run(&mut ctx, deadline)?
    };

    if outcome == RunOutcome::Done {
        finish(request, env.sessions);
    }
    Ok(outcome)
}

fn finish(request: &mut Request, sessions: &mut dyn SessionLayer) {
    sessions.mark_served(request.id());
    forward::unlink_all(request);
    debug!(
        target: RUN_TARGET,
        request = %request.id(),
        kind = %request.kind().label(),
        "request served"
    );
}

#[cfg(test)]
mod tests;
