//! Test harness utilities shared by unit and behavioural suites.

mod config_loader;
mod reporter;
mod requests;
mod transport;
mod world;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use requests::{Captured, RunBench, fault_registry, request};
pub use transport::MockTransport;
pub use world::{GroupWorld, TestWorld};
