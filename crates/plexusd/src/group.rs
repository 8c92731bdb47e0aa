//! In-process SMP group.
//!
//! Every process of a [`LocalGroup`] is a [`Node`] sharing one
//! [`LocalFabric`]. The fabric gives each process a bounded inbox; a full
//! inbox refuses work with [`SubmitError::Busy`] and notifies the refused
//! submitters once it has been drained.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};

use plexus_config::Config;

use crate::forward::{CompletionHandle, Envelope, GroupTransport, PeerId, SubmitError};
use crate::node::{Node, NodeSettings};
use crate::property::{DEFAULT_STORE_CAPACITY, PropertyRegistry, RegistryError, builtin};
use crate::request::Operation;
use crate::role::ProcessRole;

const GROUP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::group");

#[derive(Debug, Default)]
struct Inbox {
    queue: VecDeque<Envelope>,
    blocked: Vec<CompletionHandle>,
}

/// Bounded inboxes shared by the processes of a group.
#[derive(Debug)]
pub struct LocalFabric {
    inboxes: Vec<Mutex<Inbox>>,
    capacity: usize,
}

impl LocalFabric {
    /// Creates inboxes for `size` processes, each holding `capacity` envelopes.
    #[must_use]
    pub fn new(size: usize, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            inboxes: (0..size).map(|_| Mutex::new(Inbox::default())).collect(),
            capacity,
        })
    }

    /// Queues `envelope` for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Busy`] when the inbox is full and
    /// [`SubmitError::Unreachable`] when `target` is not part of the group.
    pub fn deliver(&self, target: PeerId, envelope: Envelope) -> Result<(), SubmitError> {
        let Some(inbox) = self.inboxes.get(target.index()) else {
            return Err(SubmitError::Unreachable { peer: target });
        };
        let mut inbox = inbox.lock().unwrap_or_else(PoisonError::into_inner);
        if inbox.queue.len() >= self.capacity {
            trace!(
                target: GROUP_TARGET,
                peer = %target,
                origin = %envelope.origin,
                "inbox full"
            );
            inbox.blocked.push(envelope.completion);
            return Err(SubmitError::Busy { peer: target });
        }
        inbox.queue.push_back(envelope);
        Ok(())
    }

    /// Takes every queued envelope for `peer` and notifies blocked submitters.
    pub fn drain(&self, peer: PeerId) -> Vec<Envelope> {
        let Some(inbox) = self.inboxes.get(peer.index()) else {
            return Vec::new();
        };
        let (envelopes, blocked) = {
            let mut inbox = inbox.lock().unwrap_or_else(PoisonError::into_inner);
            let envelopes: Vec<Envelope> = inbox.queue.drain(..).collect();
            (envelopes, std::mem::take(&mut inbox.blocked))
        };
        for handle in &blocked {
            handle.notify();
        }
        envelopes
    }

    /// Number of envelopes waiting for `peer`.
    #[must_use]
    pub fn pending(&self, peer: PeerId) -> usize {
        self.inboxes.get(peer.index()).map_or(0, |inbox| {
            inbox
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .queue
                .len()
        })
    }
}

/// [`GroupTransport`] over a [`LocalFabric`].
#[derive(Debug, Clone)]
pub struct LocalTransport {
    local: PeerId,
    role: ProcessRole,
    size: u16,
    fabric: Arc<LocalFabric>,
}

impl LocalTransport {
    /// Creates the transport of process `local` in a group of `size`.
    #[must_use]
    pub fn new(local: PeerId, role: ProcessRole, size: u16, fabric: Arc<LocalFabric>) -> Self {
        Self {
            local,
            role,
            size,
            fabric,
        }
    }
}

impl GroupTransport for LocalTransport {
    fn local(&self) -> PeerId {
        self.local
    }

    fn followers(&self) -> Vec<PeerId> {
        if self.role != ProcessRole::Leader {
            return Vec::new();
        }
        (0..self.size)
            .map(PeerId::new)
            .filter(|peer| *peer != self.local)
            .collect()
    }

    fn leader(&self) -> Option<PeerId> {
        (self.role == ProcessRole::Follower).then_some(PeerId::new(0))
    }

    fn submit(
        &self,
        target: PeerId,
        operation: Operation,
        completion: CompletionHandle,
    ) -> Result<(), SubmitError> {
        self.fabric.deliver(
            target,
            Envelope {
                origin: self.local,
                operation,
                completion,
            },
        )
    }
}

/// Layout of a local group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSettings {
    /// Identity shared by every process.
    pub instance_id: String,
    /// Number of processes.
    pub size: u16,
    /// Inbox capacity of each process.
    pub inbox_capacity: usize,
    /// Property store capacity of each process.
    pub store_capacity: usize,
}

impl GroupSettings {
    /// Derives the group layout from the server configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            instance_id: config.instance_id().as_str().to_owned(),
            size: config.smp_processes.max(1),
            inbox_capacity: config.inbox_capacity,
            store_capacity: DEFAULT_STORE_CAPACITY,
        }
    }
}

/// Every process of an SMP group, driven from one thread.
pub struct LocalGroup {
    nodes: Vec<Node>,
    fabric: Arc<LocalFabric>,
}

impl LocalGroup {
    /// Builds a group whose processes share `registry`.
    #[must_use]
    pub fn new(settings: &GroupSettings, registry: Arc<PropertyRegistry>) -> Self {
        let size = settings.size.max(1);
        let fabric = LocalFabric::new(usize::from(size), settings.inbox_capacity);
        let nodes = (0..size)
            .map(|index| {
                let peer = PeerId::new(index);
                let role = ProcessRole::for_member(usize::from(index), usize::from(size));
                let transport = LocalTransport::new(peer, role, size, Arc::clone(&fabric));
                Node::new(
                    NodeSettings {
                        peer,
                        role,
                        instance_id: settings.instance_id.clone(),
                        store_capacity: settings.store_capacity,
                    },
                    Arc::clone(&registry),
                    Box::new(transport),
                )
            })
            .collect();
        debug!(
            target: GROUP_TARGET,
            size,
            inbox_capacity = settings.inbox_capacity,
            "group assembled"
        );
        Self { nodes, fabric }
    }

    /// Builds a group with the built-in properties.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] when the built-in registry is inconsistent.
    pub fn from_config(config: &Config) -> Result<Self, RegistryError> {
        let registry = builtin::registry()?;
        Ok(Self::new(
            &GroupSettings::from_config(config),
            Arc::new(registry),
        ))
    }

    /// Number of processes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Process at `peer`.
    #[must_use]
    pub fn node(&self, peer: PeerId) -> Option<&Node> {
        self.nodes.get(peer.index())
    }

    /// Mutable process at `peer`.
    pub fn node_mut(&mut self, peer: PeerId) -> Option<&mut Node> {
        self.nodes.get_mut(peer.index())
    }

    /// All processes in group order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Shared inboxes.
    #[must_use]
    pub fn fabric(&self) -> &LocalFabric {
        &self.fabric
    }

    /// Process that serves the console: the last one in the group.
    #[must_use]
    pub fn console_peer(&self) -> PeerId {
        let last = self.nodes.len().saturating_sub(1);
        PeerId::new(u16::try_from(last).unwrap_or(u16::MAX))
    }

    /// Delivers inboxes and polls every process once.
    ///
    /// Returns true when anything moved.
    pub fn step(&mut self) -> bool {
        let mut progress = false;
        for node in &mut self.nodes {
            let envelopes = self.fabric.drain(node.peer());
            progress |= !envelopes.is_empty();
            for envelope in envelopes {
                node.accept(envelope);
            }
            progress |= node.poll().made_progress();
        }
        progress
    }

    /// Steps until nothing moves. Returns the number of productive steps.
    pub fn run_until_idle(&mut self) -> usize {
        let mut steps = 0;
        while self.step() {
            steps += 1;
        }
        trace!(target: GROUP_TARGET, steps, "group idle");
        steps
    }
}
