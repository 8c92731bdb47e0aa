use std::fmt;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use plexus_config::ConfigError;
use plexusd::{BootstrapError, StructuredHealthReporter, SystemConfigLoader, bootstrap_with};

fn main() -> ExitCode {
    let reporter = Arc::new(StructuredHealthReporter::new());
    let mut daemon = match bootstrap_with(&SystemConfigLoader, reporter) {
        Ok(daemon) => daemon,
        Err(BootstrapError::Configuration { source }) => return report_config_error(&source),
        Err(error) => {
            report(format_args!("plexusd: {error}"));
            return ExitCode::from(error.exit_status());
        }
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    match daemon.serve_console(stdin.lock(), stdout.lock()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            report(format_args!("plexusd: {error}"));
            ExitCode::FAILURE
        }
    }
}

fn report_config_error(error: &ConfigError) -> ExitCode {
    match error {
        ConfigError::Cli(clap_error) => {
            clap_error.print().ok();
        }
        other => report(format_args!("plexusd: {other}")),
    }
    ExitCode::from(error.exit_status())
}

/// Writes one line to stderr. A closed stderr leaves nowhere to report to.
fn report(message: fmt::Arguments<'_>) {
    let mut stderr = io::stderr().lock();
    stderr
        .write_fmt(message)
        .and_then(|()| stderr.write_all(b"\n"))
        .ok();
}
