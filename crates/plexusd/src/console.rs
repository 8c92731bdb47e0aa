//! Line-oriented console session.
//!
//! Each non-blank input line is one request submitted to the console
//! process. After every line the group runs until idle and the responses are
//! written as JSON lines. Lines starting with `#` are ignored.

use std::io::{self, BufRead, Write};

use thiserror::Error;
use tracing::info;

use crate::group::LocalGroup;
use crate::response::{OutputError, ResponseStatus, ResponseWriter};

const CONSOLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::console");

/// Errors that end a console session.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Reading a request line failed.
    #[error("failed to read request: {0}")]
    Read(#[source] io::Error),
    /// Writing a response failed.
    #[error(transparent)]
    Output(#[from] OutputError),
    /// The group has no process to attach the console to.
    #[error("the group has no console process")]
    NoConsoleProcess,
}

/// Totals for a finished console session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleSummary {
    /// Requests submitted.
    pub submitted: usize,
    /// Responses with status `served`.
    pub served: usize,
    /// Responses with status `failed`.
    pub failed: usize,
}

/// Serves requests read from `input` and writes responses to `output`.
///
/// # Errors
///
/// Returns a [`ConsoleError`] when input or output fails.
pub fn serve<R, W>(group: &mut LocalGroup, input: R, output: W) -> Result<ConsoleSummary, ConsoleError>
where
    R: BufRead,
    W: Write,
{
    let peer = group.console_peer();
    let session = group
        .node_mut(peer)
        .ok_or(ConsoleError::NoConsoleProcess)?
        .open_session();
    let mut writer = ResponseWriter::new(output);
    let mut summary = ConsoleSummary::default();

    for line in input.lines() {
        let line = line.map_err(ConsoleError::Read)?;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        group
            .node_mut(peer)
            .ok_or(ConsoleError::NoConsoleProcess)?
            .submit(session, text);
        summary.submitted += 1;
        group.run_until_idle();

        let responses = group
            .node_mut(peer)
            .ok_or(ConsoleError::NoConsoleProcess)?
            .take_responses(session);
        for response in &responses {
            match response.status {
                ResponseStatus::Served => summary.served += 1,
                ResponseStatus::Failed => summary.failed += 1,
            }
            writer.write_response(response)?;
        }
        writer.flush()?;
    }

    info!(
        target: CONSOLE_TARGET,
        peer = %peer,
        submitted = summary.submitted,
        served = summary.served,
        failed = summary.failed,
        "console session closed"
    );
    Ok(summary)
}
