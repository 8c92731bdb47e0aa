//! Server bootstrap orchestration.

use std::io::{BufRead, Write};
use std::sync::Arc;

use thiserror::Error;

use plexus_config::{Config, ConfigError};

use crate::console::{self, ConsoleError, ConsoleSummary};
use crate::group::LocalGroup;
use crate::health::HealthReporter;
use crate::property::RegistryError;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Exit status used when the server fails after its configuration loaded.
pub const EX_SOFTWARE: u8 = 70;

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the server configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the configuration is invalid.
    fn load(&self) -> Result<Config, ConfigError>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::load()
    }
}

/// Loader returning a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The property registry could not be assembled.
    #[error("failed to build the property registry: {source}")]
    Registry {
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },
}

impl BootstrapError {
    /// Returns the process exit status for this error.
    #[must_use]
    pub fn exit_status(&self) -> u8 {
        match self {
            Self::Configuration { source } => source.exit_status(),
            Self::Telemetry { .. } | Self::Registry { .. } => EX_SOFTWARE,
        }
    }
}

/// Result of a successful bootstrap invocation.
pub struct Daemon {
    config: Config,
    group: LocalGroup,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// The SMP group serving requests.
    #[must_use]
    pub const fn group(&self) -> &LocalGroup {
        &self.group
    }

    /// Mutable access to the SMP group.
    pub const fn group_mut(&mut self) -> &mut LocalGroup {
        &mut self.group
    }

    /// Serves one console session until `input` ends.
    ///
    /// # Errors
    ///
    /// Returns a [`ConsoleError`] when reading input or writing responses
    /// fails.
    pub fn serve_console<R, W>(&mut self, input: R, output: W) -> Result<ConsoleSummary, ConsoleError>
    where
        R: BufRead,
        W: Write,
    {
        self.reporter
            .group_ready(self.group.size(), self.group.console_peer());
        console::serve(&mut self.group, input, output)
    }
}

/// Bootstraps the server using the supplied collaborators.
///
/// # Errors
///
/// Returns [`BootstrapError`] when configuration or telemetry fails.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let group = match LocalGroup::from_config(&config) {
        Ok(group) => group,
        Err(source) => {
            let error = BootstrapError::Registry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };
    reporter.bootstrap_succeeded(&config);

    Ok(Daemon {
        config,
        group,
        telemetry,
        reporter,
    })
}
