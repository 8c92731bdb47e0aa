//! BDD test worlds shared by step functions.

use std::sync::Arc;

use crate::bootstrap::{BootstrapError, ConfigLoader, Daemon, bootstrap_with};
use crate::forward::PeerId;
use crate::group::{GroupSettings, LocalGroup};
use crate::property::{DEFAULT_STORE_CAPACITY, PropertyRegistry, builtin};
use crate::response::Response;

use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::reporter::RecordingHealthReporter;

/// Bootstrap scenario world.
pub struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    daemon: Option<Daemon>,
    bootstrap_error: Option<BootstrapError>,
    console_output: Option<String>,
}

impl TestWorld {
    /// Builds a world with a successful configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: Box::new(TestConfigLoader::new(1)),
            reporter: Arc::new(RecordingHealthReporter::default()),
            daemon: None,
            bootstrap_error: None,
            console_output: None,
        }
    }

    /// Installs a loader that succeeds for a group of `size`.
    pub fn use_successful_loader(&mut self, size: u16) {
        self.loader = Box::new(TestConfigLoader::new(size));
        self.reset_results();
    }

    /// Installs a loader that always fails.
    pub fn use_failing_loader(&mut self) {
        self.loader = Box::new(FailingConfigLoader);
        self.reset_results();
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.daemon.is_some() || self.bootstrap_error.is_some() {
            return;
        }
        match bootstrap_with(&*self.loader, self.reporter.clone()) {
            Ok(daemon) => self.daemon = Some(daemon),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    /// Feeds `input` to the console of the bootstrapped daemon.
    pub fn serve_console(&mut self, input: &str) {
        let daemon = self.daemon.as_mut().expect("daemon should be bootstrapped");
        let mut output = Vec::new();
        daemon
            .serve_console(input.as_bytes(), &mut output)
            .expect("console session should succeed");
        self.console_output = Some(String::from_utf8(output).expect("utf8 console output"));
    }

    /// Returns the bootstrap error, if any.
    #[must_use]
    pub const fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    /// Returns true when the daemon handle is available.
    #[must_use]
    pub const fn daemon_started(&self) -> bool {
        self.daemon.is_some()
    }

    /// Console output captured by [`Self::serve_console`].
    #[must_use]
    pub fn console_output(&self) -> &str {
        self.console_output.as_deref().unwrap_or_default()
    }

    fn reset_results(&mut self) {
        self.daemon = None;
        self.bootstrap_error = None;
        self.console_output = None;
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Request-execution scenario world over a local group.
#[derive(Default)]
pub struct GroupWorld {
    group: Option<LocalGroup>,
    pub responses: Vec<Response>,
}

impl GroupWorld {
    /// Assembles a group of `size` with the built-in properties.
    pub fn assemble(&mut self, size: u16) {
        self.assemble_with(size, builtin::registry().expect("built-in registry"));
    }

    /// Assembles a group of `size` sharing `registry`.
    pub fn assemble_with(&mut self, size: u16, registry: PropertyRegistry) {
        let settings = GroupSettings {
            instance_id: "nodeA".to_owned(),
            size,
            inbox_capacity: 8,
            store_capacity: DEFAULT_STORE_CAPACITY,
        };
        self.group = Some(LocalGroup::new(&settings, Arc::new(registry)));
        self.responses.clear();
    }

    /// Mutable group, assembling a standalone one on first use.
    pub fn group_mut(&mut self) -> &mut LocalGroup {
        if self.group.is_none() {
            self.assemble(1);
        }
        self.group.as_mut().expect("group assembled")
    }

    /// Group, if assembled.
    #[must_use]
    pub const fn group(&self) -> Option<&LocalGroup> {
        self.group.as_ref()
    }

    /// Sends `text` from a client of process `peer` and runs until idle.
    pub fn send(&mut self, peer: PeerId, text: &str) {
        let group = self.group_mut();
        let node = group.node_mut(peer).expect("process exists");
        let session = node.open_session();
        node.submit(session, text);
        group.run_until_idle();
        let responses = group
            .node_mut(peer)
            .expect("process exists")
            .take_responses(session);
        self.responses.extend(responses);
    }

    /// Last response received.
    #[must_use]
    pub fn last_response(&self) -> &Response {
        self.responses.last().expect("a response was received")
    }

    /// Value of `name` on every process, in group order.
    #[must_use]
    pub fn values(&self, name: &str) -> Vec<Option<String>> {
        self.group
            .as_ref()
            .map(|group| {
                group
                    .nodes()
                    .iter()
                    .map(|node| node.store().get(name).map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }
}
