//! Configuration for the plexus request server.
//!
//! Settings are resolved from four layers, highest precedence first:
//!
//! 1. command-line flags (`--instance-id`, `--smp-processes`, ...),
//! 2. `PLEXUS_*` environment variables (`PLEXUS_INSTANCE_ID`, ...),
//! 3. the directive-style file named by `--config-path`,
//! 4. built-in defaults.
//!
//! The instance identifier has no default. A missing or oversized identifier
//! is a fatal usage error; callers are expected to exit with
//! [`ConfigError::exit_status`].

mod cli;
mod defaults;
mod env;
mod error;
mod file;
mod instance;
mod logging;

use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::cli::ServerArgs;
use crate::file::FileSettings;

pub use defaults::{
    DEFAULT_INBOX_CAPACITY, DEFAULT_LOG_FILTER, DEFAULT_SMP_PROCESSES, EX_USAGE,
    default_log_filter, default_log_format,
};
pub use env::ENV_PREFIX;
pub use error::ConfigError;
pub use instance::{InstanceId, InstanceIdError, MAX_INSTANCE_ID_LEN};
pub use logging::{LogFormat, LogFormatParseError, LogSettings};

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Identity shared by every process in the group.
    pub instance_id: InstanceId,
    /// Size of the SMP group; `1` runs a single standalone process.
    pub smp_processes: u16,
    /// Per-process inbound backlog before the link reports busy.
    pub inbox_capacity: usize,
    /// Logging configuration.
    pub logging: LogSettings,
    /// File the settings were read from, if any.
    pub config_path: Option<Utf8PathBuf>,
}

impl Config {
    /// Builds a configuration for `instance_id` with every other setting at
    /// its default.
    #[must_use]
    pub fn new(instance_id: InstanceId) -> Self {
        Self {
            instance_id,
            smp_processes: DEFAULT_SMP_PROCESSES,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            logging: LogSettings::default(),
            config_path: None,
        }
    }

    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// See [`Config::load_from_sources`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_sources(std::env::args_os(), |name| std::env::var(name).ok())
    }

    /// Loads configuration from an explicit argument list, ignoring the
    /// environment. The first item is the program name.
    ///
    /// # Errors
    ///
    /// See [`Config::load_from_sources`].
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::load_from_sources(args, |_| None)
    }

    /// Loads configuration from an argument list and an environment lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the arguments do not parse, an environment
    /// variable holds a malformed value, the configuration file cannot be read
    /// or parsed, the instance identifier is missing or too long, or a numeric
    /// setting is out of range.
    pub fn load_from_sources<I, T, F>(args: I, lookup: F) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
        F: Fn(&str) -> Option<String>,
    {
        let cli = ServerArgs::try_parse_from(args)?;
        let env = env::read(lookup)?;
        let file = match cli.config_path.as_deref() {
            Some(path) => FileSettings::read(path)?,
            None => FileSettings::default(),
        };
        Self::merge(cli, env, file)
    }

    fn merge(cli: ServerArgs, env: FileSettings, file: FileSettings) -> Result<Self, ConfigError> {
        let raw_id = cli
            .instance_id
            .or(env.instance_id)
            .or(file.instance_id)
            .ok_or(ConfigError::MissingInstanceId)?;
        let instance_id = InstanceId::new(raw_id)?;

        let smp_processes = cli
            .smp_processes
            .or(env.smp_processes)
            .or(file.smp_processes)
            .unwrap_or(DEFAULT_SMP_PROCESSES);
        if smp_processes == 0 {
            return Err(ConfigError::invalid_value(
                "smp-processes",
                "0",
                "the group needs at least one process",
            ));
        }

        let inbox_capacity = cli
            .inbox_capacity
            .or(env.inbox_capacity)
            .or(file.inbox_capacity)
            .unwrap_or(DEFAULT_INBOX_CAPACITY);
        if inbox_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "inbox-capacity",
                "0",
                "each process must accept at least one forwarded request",
            ));
        }

        let logging = LogSettings {
            filter: cli
                .log_filter
                .or(env.log_filter)
                .or(file.log_filter)
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_owned()),
            format: cli
                .log_format
                .or(env.log_format)
                .or(file.log_format)
                .unwrap_or_else(default_log_format),
        };

        Ok(Self {
            instance_id,
            smp_processes,
            inbox_capacity,
            logging,
            config_path: cli.config_path,
        })
    }

    /// Returns the instance identifier.
    #[must_use]
    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    /// Returns the configured log filter.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.logging.filter
    }

    /// Returns the configured log format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.logging.format
    }

    /// Returns the configuration file path, if one was given.
    #[must_use]
    pub fn config_path(&self) -> Option<&Utf8Path> {
        self.config_path.as_deref()
    }
}
