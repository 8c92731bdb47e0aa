use crate::logging::LogFormat;

/// Default log filter expression used by the server.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Number of processes in the SMP group when nothing is configured.
pub const DEFAULT_SMP_PROCESSES: u16 = 1;

/// Requests a process may hold in its inbound backlog before peers see it as busy.
pub const DEFAULT_INBOX_CAPACITY: usize = 64;

/// Exit status for command-line and configuration errors (`EX_USAGE`).
pub const EX_USAGE: u8 = 64;

/// Default log filter expression used by the server.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the server.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}
