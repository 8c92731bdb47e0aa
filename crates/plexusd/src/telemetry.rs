//! Structured telemetry initialisation for the server.
//!
//! The run-loop and the group driver log every parked pass at `trace`. A bare
//! `trace` filter would drown everything else, so those targets are held at
//! `debug` unless the filter names them explicitly.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use plexus_config::{Config, LogFormat};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

const PER_PASS_TARGETS: [&str; 2] = [
    concat!(env!("CARGO_PKG_NAME"), "::run_loop"),
    concat!(env!("CARGO_PKG_NAME"), "::group"),
];
const PER_PASS_CEILING: &str = "debug";

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter could not be parsed.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// The global subscriber could not be installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber on first use.
///
/// Later calls return a fresh [`TelemetryHandle`] without touching the
/// global state again.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or another
/// subscriber is already installed.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(filter_directives(config.log_filter()))
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let builder = |filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            // Standard output carries responses; logs go to stderr.
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

/// Expands the configured filter with ceilings for the per-pass targets.
fn filter_directives(filter: &str) -> String {
    let directives: Vec<&str> = filter
        .split(',')
        .map(str::trim)
        .filter(|directive| !directive.is_empty())
        .collect();
    let global_trace = directives
        .iter()
        .any(|directive| directive.eq_ignore_ascii_case("trace"));
    let mut expanded = directives.join(",");
    if !global_trace {
        return expanded;
    }
    for target in PER_PASS_TARGETS {
        if directives.iter().any(|directive| directive.starts_with(target)) {
            continue;
        }
        expanded.push(',');
        expanded.push_str(target);
        expanded.push('=');
        expanded.push_str(PER_PASS_CEILING);
    }
    expanded
}
