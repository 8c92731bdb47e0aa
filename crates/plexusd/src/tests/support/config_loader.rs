//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;

use plexus_config::{Config, ConfigError, InstanceId};

use crate::bootstrap::ConfigLoader;

/// Loader that produces a valid configuration for a group of `size`.
pub struct TestConfigLoader {
    size: u16,
}

impl TestConfigLoader {
    #[must_use]
    pub const fn new(size: u16) -> Self {
        Self { size }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        let mut config = Config::new(InstanceId::new("nodeA")?);
        config.smp_processes = self.size;
        Ok(config)
    }
}

/// Loader that fails by passing an oversized instance id on the command line.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        let args = vec![
            OsString::from("plexusd"),
            OsString::from("--instance-id"),
            OsString::from("x".repeat(32)),
        ];
        Config::load_from_iter(args)
    }
}
