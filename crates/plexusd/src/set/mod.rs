//! SET request: ordered property assignments.
//!
//! Assignments are applied strictly in arrival order. The first semantic
//! error is reported to the client and stops the request without rolling
//! back earlier assignments. Setter faults stop the request and fail it.

use std::ops::Range;
use std::time::Instant;

use tracing::debug;

use crate::property::{SetterError, SetterOutcome};
use crate::request::{ExecContext, RequestType, RunError, RunOutcome};
use crate::response::{ErrorCode, ResponseMessage};
use crate::session::RequestId;

const SET_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::set");

/// One `name=value` pair, stored as byte spans into the request text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    name: Range<usize>,
    value: Range<usize>,
}

impl Assignment {
    /// Creates an assignment from its name and value spans.
    #[must_use]
    pub const fn new(name: Range<usize>, value: Range<usize>) -> Self {
        Self { name, value }
    }

    /// Span of the property name.
    #[must_use]
    pub const fn name_span(&self) -> &Range<usize> {
        &self.name
    }

    /// Span of the assigned value.
    #[must_use]
    pub const fn value_span(&self) -> &Range<usize> {
        &self.value
    }
}

/// Assignments in the order they appeared in the request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AssignmentQueue {
    items: Vec<Assignment>,
}

impl AssignmentQueue {
    /// Creates an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Appends an assignment.
    pub fn push(&mut self, assignment: Assignment) {
        self.items.push(assignment);
    }

    /// Iterates in arrival order.
    pub fn iter(&self) -> std::slice::Iter<'_, Assignment> {
        self.items.iter()
    }

    /// Number of queued assignments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a AssignmentQueue {
    type Item = &'a Assignment;
    type IntoIter = std::slice::Iter<'a, Assignment>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// How a dispatch pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Every assignment was applied.
    Completed {
        /// Number of assignments applied.
        applied: usize,
    },
    /// A semantic error was reported and the remaining assignments skipped.
    Handled {
        /// Number of assignments applied before the error.
        applied: usize,
    },
}

/// Applies `queue` in order, stopping at the first failure.
///
/// Unknown and read-only names are reported to the client and end the pass
/// as [`Dispatch::Handled`] without invoking any setter.
///
/// # Errors
///
/// Returns the setter's error when a setter signals a fault.
pub fn apply(queue: &AssignmentQueue, ctx: &mut ExecContext<'_>) -> Result<Dispatch, SetterError> {
    let registry = ctx.registry();
    let mut applied = 0;
    for assignment in queue {
        let name = ctx.span(assignment.name_span());
        let Some(descriptor) = registry.lookup_by_name(name) else {
            ctx.report_error(
                ErrorCode::UnknownProperty,
                format!("unknown property '{name}'"),
            );
            return Ok(Dispatch::Handled { applied });
        };
        let Some(setter) = descriptor.setter() else {
            ctx.report_error(
                ErrorCode::ReadOnlyProperty,
                format!("read-only property '{}'", descriptor.name()),
            );
            return Ok(Dispatch::Handled { applied });
        };
        match setter(descriptor, ctx, assignment) {
            SetterOutcome::Continue => applied += 1,
            SetterOutcome::HandledStop => return Ok(Dispatch::Handled { applied }),
            SetterOutcome::Fail(error) => return Err(error),
        }
    }
    Ok(Dispatch::Completed { applied })
}

/// State of one SET request.
#[derive(Debug)]
pub struct SetRequest {
    queue: AssignmentQueue,
    outcome: Option<Dispatch>,
}

impl SetRequest {
    /// Wraps a parsed assignment queue.
    #[must_use]
    pub const fn new(queue: AssignmentQueue) -> Self {
        Self {
            queue,
            outcome: None,
        }
    }

    /// Queued assignments.
    #[must_use]
    pub const fn queue(&self) -> &AssignmentQueue {
        &self.queue
    }

    /// Result of the dispatch pass, once it has run.
    #[must_use]
    pub const fn outcome(&self) -> Option<Dispatch> {
        self.outcome
    }
}

impl RequestType for SetRequest {
    fn on_input_arrived(&mut self, request: RequestId) {
        debug!(
            target: SET_TARGET,
            request = %request,
            assignments = self.queue.len(),
            "set request queued"
        );
    }

    fn replicates(&self) -> bool {
        true
    }

    fn run(
        &mut self,
        ctx: &mut ExecContext<'_>,
        _deadline: Instant,
    ) -> Result<RunOutcome, RunError> {
        // A second pass must never re-apply assignments.
        if self.outcome.is_some() {
            return Ok(RunOutcome::Done);
        }
        let dispatch = apply(&self.queue, ctx)?;
        self.outcome = Some(dispatch);
        match dispatch {
            Dispatch::Completed { applied } => {
                ctx.push(ResponseMessage::Ok { applied });
            }
            Dispatch::Handled { applied } => {
                debug!(
                    target: SET_TARGET,
                    request = %ctx.request(),
                    applied,
                    skipped = self.queue.len() - applied,
                    "set request stopped on reported error"
                );
            }
        }
        Ok(RunOutcome::Done)
    }

    fn on_free(&mut self, request: RequestId) {
        debug!(target: SET_TARGET, request = %request, "set request released");
    }
}
