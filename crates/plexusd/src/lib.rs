//! Request-execution core of the plexus graph server.
//!
//! A server runs standalone or as an SMP group of processes sharing one
//! endpoint: one leader and any number of followers. Every client operation
//! is a resumable [`Request`] advanced by [`run_loop::run`]. The run-loop
//! never blocks; a request that has to wait returns
//! [`RunOutcome::More`] and is woken later through its process's wake-up
//! channel.
//!
//! Writes execute once at the leader. The leader first sends a copy to every
//! follower and waits until each copy has finished ([`forward`]). A follower
//! that receives a write from a client relays it to the leader and reports
//! the leader's answer without executing it locally.
//!
//! The only write today is `SET`, which applies property assignments in
//! order through the [`PropertyRegistry`] ([`set`]).
//!
//! [`run_loop::run`]: crate::request::run_loop::run

mod bootstrap;
mod console;
pub mod forward;
mod group;
mod health;
mod node;
pub mod property;
pub mod request;
mod response;
mod role;
mod session;
pub mod set;
mod telemetry;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, EX_SOFTWARE, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use console::{ConsoleError, ConsoleSummary};
pub use group::{GroupSettings, LocalFabric, LocalGroup, LocalTransport};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use node::{Node, NodeSettings, PollReport};
pub use property::{PropertyDescriptor, PropertyRegistry, PropertyStore, RegistryError};
pub use request::{Request, RequestType, RunOutcome};
pub use response::{
    ErrorCode, OutputError, Response, ResponseMessage, ResponseStatus, ResponseWriter,
};
pub use role::ProcessRole;
pub use session::{RequestId, SessionBook, SessionId, SessionLayer};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
