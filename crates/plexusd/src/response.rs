//! Response messages and JSONL serialization.
//!
//! Every finished request yields one [`Response`]. Its messages are the
//! structured results accumulated while the request ran. Semantic errors
//! appear as [`ResponseMessage::Error`] entries inside a `served` response.
//! Faults turn the whole response `failed`.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

use crate::session::RequestId;

/// Machine-readable error categories reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    /// The request named a property that is not registered.
    UnknownProperty,
    /// The request assigned to a property without a setter.
    ReadOnlyProperty,
    /// A setter rejected the assigned value.
    InvalidValue,
    /// The request ran past its deadline.
    DeadlineExceeded,
    /// The request text could not be parsed.
    MalformedRequest,
    /// The leader could not be reached or failed the request.
    UpstreamFailure,
    /// An internal fault interrupted the request.
    Internal,
}

/// One structured result line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseMessage {
    /// Every assignment in a SET request was applied.
    Ok {
        /// Number of assignments applied.
        applied: usize,
    },
    /// Current value of a property.
    Property {
        /// Property name.
        name: String,
        /// Current value, if one has been stored.
        value: Option<String>,
    },
    /// An error reported to the client.
    Error {
        /// Error category.
        code: ErrorCode,
        /// Human-readable description.
        message: String,
    },
}

impl ResponseMessage {
    /// Builds an error message.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    /// Returns the error code when this message reports an error.
    #[must_use]
    pub const fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Error { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Final status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResponseStatus {
    /// The request ran to completion; semantic errors may still be reported.
    Served,
    /// A fault stopped the request.
    Failed,
}

/// Complete answer to one client request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Request the answer belongs to.
    pub request: RequestId,
    /// Final status.
    pub status: ResponseStatus,
    /// Results in the order they were produced.
    pub messages: Vec<ResponseMessage>,
}

impl Response {
    /// Returns the first reported error code, if any.
    #[must_use]
    pub fn first_error(&self) -> Option<ErrorCode> {
        self.messages.iter().find_map(ResponseMessage::error_code)
    }
}

/// Errors raised while writing responses.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Serializing the response failed.
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Writing to the output stream failed.
    #[error("failed to write response: {0}")]
    Io(#[from] io::Error),
}

/// Writer that emits responses as JSON lines.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Wraps an output stream.
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one response as a JSONL line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_response(&mut self, response: &Response) -> Result<(), OutputError> {
        serde_json::to_writer(&mut self.writer, response)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Flushes the underlying stream.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
