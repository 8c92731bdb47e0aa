//! Command-line flags understood by the server.
//!
//! Flags take precedence over the configuration file. Every flag is optional
//! so that the file and the built-in defaults can fill the gaps.

use camino::Utf8PathBuf;
use clap::Parser;

use crate::logging::LogFormat;

/// Command-line interface for `plexusd`.
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "plexusd", version, about = "Graph database request server")]
pub(crate) struct ServerArgs {
    /// Path to a directive-style configuration file.
    #[arg(long, value_name = "PATH")]
    pub(crate) config_path: Option<Utf8PathBuf>,
    /// Instance identifier; overrides `instance-id` from the configuration file.
    #[arg(long, value_name = "ID")]
    pub(crate) instance_id: Option<String>,
    /// Number of cooperating processes in the SMP group.
    #[arg(long, value_name = "COUNT")]
    pub(crate) smp_processes: Option<u16>,
    /// Inbound backlog per process before peers are told to back off.
    #[arg(long, value_name = "REQUESTS")]
    pub(crate) inbox_capacity: Option<usize>,
    /// `tracing` filter directive.
    #[arg(long, value_name = "FILTER")]
    pub(crate) log_filter: Option<String>,
    /// Log output format (`json` or `compact`).
    #[arg(long, value_name = "FORMAT")]
    pub(crate) log_format: Option<LogFormat>,
}
