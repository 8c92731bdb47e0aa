//! Errors raised while resolving the server configuration.
//!
//! Every variant is fatal: the server refuses to start with an invalid
//! identity or group layout. [`ConfigError::exit_status`] maps each failure to
//! the process exit status the binary should use.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::defaults::EX_USAGE;
use crate::instance::InstanceIdError;

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Command-line parsing failed, or help/version output was requested.
    #[error(transparent)]
    Cli(#[from] clap::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration file '{path}': {source}")]
    ReadFile {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    /// A line in the configuration file is malformed.
    #[error("{path}:{line}: {message}")]
    Syntax {
        path: Utf8PathBuf,
        line: usize,
        message: String,
    },

    /// The configuration file names a key the server does not know.
    #[error("{path}:{line}: unknown configuration key '{key}'")]
    UnknownKey {
        path: Utf8PathBuf,
        line: usize,
        key: String,
    },

    /// The configuration file sets the same key twice.
    #[error("{path}:{line}: duplicate configuration key '{key}'")]
    DuplicateKey {
        path: Utf8PathBuf,
        line: usize,
        key: String,
    },

    /// A value could not be interpreted for its key.
    #[error("invalid value '{value}' for {key}: {message}")]
    InvalidValue {
        key: &'static str,
        value: String,
        message: String,
    },

    /// The resolved instance identifier is invalid.
    #[error("invalid instance id: {0}")]
    InstanceId(#[from] InstanceIdError),

    /// No layer named an instance.
    #[error("no instance id configured; pass --instance-id, set PLEXUS_INSTANCE_ID or set `instance-id` in the configuration file")]
    MissingInstanceId,
}

impl ConfigError {
    /// Returns the process exit status for this error.
    ///
    /// Help and version requests exit successfully. Every other failure is a
    /// usage error.
    #[must_use]
    pub fn exit_status(&self) -> u8 {
        match self {
            Self::Cli(error) if !error.use_stderr() => 0,
            _ => EX_USAGE,
        }
    }

    /// Returns true when the error is a help or version request rather than a
    /// failure.
    #[must_use]
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::Cli(error) if !error.use_stderr())
    }

    pub(crate) fn invalid_value(
        key: &'static str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            key,
            value: value.into(),
            message: message.into(),
        }
    }
}
