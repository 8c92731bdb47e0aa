//! SHOW request: reads one property value back.

use std::ops::Range;
use std::time::Instant;

use super::{ExecContext, RequestType, RunError, RunOutcome};
use crate::response::{ErrorCode, ResponseMessage};

/// State of one SHOW request.
#[derive(Debug)]
pub struct ShowRequest {
    name: Range<usize>,
}

impl ShowRequest {
    /// Wraps the span of the property name.
    #[must_use]
    pub const fn new(name: Range<usize>) -> Self {
        Self { name }
    }
}

impl RequestType for ShowRequest {
    fn run(&mut self, ctx: &mut ExecContext<'_>, deadline: Instant) -> Result<RunOutcome, RunError> {
        if Instant::now() >= deadline {
            ctx.report_error(
                ErrorCode::DeadlineExceeded,
                "request deadline passed before the property was read",
            );
            return Ok(RunOutcome::Done);
        }
        let name = ctx.span(&self.name);
        let Some(descriptor) = ctx.registry().lookup_by_name(name) else {
            ctx.report_error(
                ErrorCode::UnknownProperty,
                format!("unknown property '{name}'"),
            );
            return Ok(RunOutcome::Done);
        };
        let value = ctx.store_ref().get(descriptor.name()).map(str::to_owned);
        ctx.push(ResponseMessage::Property {
            name: descriptor.name().to_owned(),
            value,
        });
        Ok(RunOutcome::Done)
    }
}
