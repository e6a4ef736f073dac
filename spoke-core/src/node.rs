//! Node: cooperative scheduler for a set of components.
//!
//! A node owns publishers, subscribers, and timers, registers itself
//! with the hub on construction, and steps every owned component once
//! per `spin_once` in insertion order. No component preempts another
//! within the same node.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use spoke_wire::{Endpoint, NodeInfo, Opcode, PubInfo, SubInfo, TopicInfo, WireMessage};
use tracing::{debug, warn};

use crate::config::SPIN_INTERVAL;
use crate::publisher::Publisher;
use crate::registry;
use crate::subscriber::{RawCallback, Subscriber};
use crate::timer::{Timer, TimerEvent};
use crate::transport::{ClientFactory, ServerFactory};

/// Anything a node can spin: a publisher, subscriber, or timer.
///
/// A component whose `ok()` has gone false is removed from the node on
/// its next spin instead of being stepped.
pub trait Component: Send + Sync {
    fn ok(&self) -> bool;
    fn spin_once(&self);
    fn shutdown(&self);
}

/// A process-local collection of components bound to one hub.
pub struct Node {
    info: NodeInfo,
    hub_endpoint: Endpoint,
    server_factory: ServerFactory,
    client_factory: ClientFactory,
    components: Mutex<Vec<Arc<dyn Component>>>,
    shutdown_flag: AtomicBool,
}

impl Node {
    /// Create a node and register it with the hub.
    ///
    /// Registration is best effort: an unreachable hub is logged and
    /// the node stays usable for local-only work such as timers.
    pub fn new(
        name: &str,
        hub_endpoint: Endpoint,
        server_factory: ServerFactory,
        client_factory: ClientFactory,
    ) -> Self {
        let info = NodeInfo {
            id: generate_id(),
            name: name.to_string(),
        };
        match registry::register(&client_factory, &hub_endpoint, Opcode::NodeRegister, &info) {
            Ok(()) => debug!(id = info.id, name = %info.name, "node registered"),
            Err(e) => warn!(name = %info.name, error = %e, "failed to register node with hub"),
        }
        Self {
            info,
            hub_endpoint,
            server_factory,
            client_factory,
            components: Mutex::new(Vec::new()),
            shutdown_flag: AtomicBool::new(false),
        }
    }

    pub fn ok(&self) -> bool {
        !self.shutdown_flag.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Create a publisher for message type `M` on `topic`, listening
    /// for subscribers on `endpoint`.
    ///
    /// The handle is also kept on the node's component list. Check
    /// `ok()` on the result: a hub rejection yields a dead component.
    pub fn create_publisher<M: WireMessage>(
        &self,
        topic: &str,
        endpoint: Endpoint,
    ) -> Arc<Publisher> {
        let info = PubInfo {
            id: generate_id(),
            topic: topic_info::<M>(topic),
            endpoint: endpoint.clone(),
        };
        let server = (self.server_factory)(&endpoint);
        let publisher = Arc::new(Publisher::new(
            info,
            server,
            self.client_factory.clone(),
            self.hub_endpoint.clone(),
        ));
        self.components
            .lock()
            .push(Arc::clone(&publisher) as Arc<dyn Component>);
        publisher
    }

    /// Create a subscriber for message type `M` on `topic`, receiving
    /// hub notifications on `endpoint`. `callback` runs during the
    /// node's spin for every decoded message.
    pub fn create_subscriber<M, F>(
        &self,
        topic: &str,
        endpoint: Endpoint,
        callback: F,
    ) -> Arc<Subscriber>
    where
        M: WireMessage + 'static,
        F: Fn(M) + Send + Sync + 'static,
    {
        let info = SubInfo {
            id: generate_id(),
            topic: topic_info::<M>(topic),
            endpoint: endpoint.clone(),
        };
        let topic_name = info.topic.name.clone();
        let raw: RawCallback = Arc::new(move |payload: &[u8]| match M::from_bytes(payload) {
            Ok(msg) => callback(msg),
            Err(e) => warn!(topic = %topic_name, error = %e, "dropped undecodable message"),
        });
        let server = (self.server_factory)(&endpoint);
        let subscriber = Arc::new(Subscriber::new(
            info,
            server,
            self.client_factory.clone(),
            self.hub_endpoint.clone(),
            raw,
        ));
        self.components
            .lock()
            .push(Arc::clone(&subscriber) as Arc<dyn Component>);
        subscriber
    }

    /// Create a timer firing `callback` every `period` while the node
    /// spins.
    pub fn create_timer(
        &self,
        period: Duration,
        callback: impl Fn(&TimerEvent) + Send + Sync + 'static,
    ) -> Arc<Timer> {
        let timer = Arc::new(Timer::new(period, callback));
        self.components
            .lock()
            .push(Arc::clone(&timer) as Arc<dyn Component>);
        timer
    }

    /// Step every component once in insertion order, removing any that
    /// are no longer `ok()`.
    pub fn spin_once(&self) {
        let snapshot: Vec<Arc<dyn Component>> = self.components.lock().clone();
        for component in &snapshot {
            if !component.ok() {
                self.components
                    .lock()
                    .retain(|other| !Arc::ptr_eq(other, component));
                continue;
            }
            component.spin_once();
        }
    }

    /// Spin until `interrupted` returns true or the node is shut down.
    pub fn spin<F: Fn() -> bool>(&self, interrupted: F) {
        while self.ok() && !interrupted() {
            self.spin_once();
            std::thread::sleep(SPIN_INTERVAL);
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        registry::deregister(
            &self.client_factory,
            &self.hub_endpoint,
            Opcode::NodeDeregister,
            &self.info,
        );
        self.shutdown();
    }
}

fn topic_info<M: WireMessage>(name: &str) -> TopicInfo {
    TopicInfo {
        id: generate_id(),
        name: name.to_string(),
        message_hash: M::SCHEMA_HASH,
    }
}

/// Uniform random 64-bit id. Collisions are treated as impossible.
fn generate_id() -> u64 {
    rand::random()
}
