//! Publishing endpoint.
//!
//! A publisher owns a listening socket whose address it advertises
//! through the hub. Subscribers dial in; the publisher never opens an
//! outbound data connection. `publish` fans a length-prefixed frame out
//! to every live subscriber connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use parking_lot::Mutex;
use smallvec::SmallVec;
use spoke_wire::{Endpoint, Opcode, PubInfo, WireMessage};
use tracing::{debug, trace, warn};

use crate::node::Component;
use crate::registry;
use crate::transport::{write_full, ClientFactory, Connection, Server};

/// Data-producing endpoint for one topic.
pub struct Publisher {
    info: PubInfo,
    server: Box<dyn Server>,
    client_factory: ClientFactory,
    hub_endpoint: Endpoint,
    /// Live subscriber connections. Entries are dropped the first time
    /// a write to them fails.
    connections: Mutex<Vec<Arc<dyn Connection>>>,
    shutdown_flag: AtomicBool,
}

impl Publisher {
    /// Register with the hub and start accepting subscribers.
    ///
    /// Rejection or an incomplete exchange leaves the publisher in the
    /// shutdown state: `ok()` is false and the owning node will drop it
    /// on its next spin.
    pub fn new(
        info: PubInfo,
        server: Box<dyn Server>,
        client_factory: ClientFactory,
        hub_endpoint: Endpoint,
    ) -> Self {
        let publisher = Self {
            info,
            server,
            client_factory,
            hub_endpoint,
            connections: Mutex::new(Vec::new()),
            shutdown_flag: AtomicBool::new(false),
        };
        if !publisher.server.ok() {
            warn!(endpoint = %publisher.server.endpoint(), "publisher server invalid");
            publisher.shutdown();
            return publisher;
        }
        match registry::register(
            &publisher.client_factory,
            &publisher.hub_endpoint,
            Opcode::PubRegister,
            &publisher.info,
        ) {
            Ok(()) => {
                debug!(id = publisher.info.id, topic = %publisher.info.topic.name, "publisher registered")
            }
            Err(e) => {
                warn!(topic = %publisher.info.topic.name, error = %e, "failed to register publisher with hub");
                publisher.shutdown();
            }
        }
        publisher
    }

    pub fn ok(&self) -> bool {
        !self.shutdown_flag.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
    }

    /// Topic this publisher produces on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.info.topic.name
    }

    /// Number of currently connected subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Send one message to every connected subscriber.
    ///
    /// The frame is a `u32` payload size followed by the serialized
    /// message. A connection that fails the write is dropped from the
    /// set; the message is not retried.
    pub fn publish<M: WireMessage>(&self, msg: &M) {
        if !self.ok() {
            return;
        }
        let len = msg.encoded_len();
        let mut frame = BytesMut::with_capacity(4 + len as usize);
        frame.put_u32_le(len);
        msg.encode(&mut frame);

        // Snapshot under the lock, write outside it.
        let snapshot: Vec<Arc<dyn Connection>> = self.connections.lock().clone();
        let mut dead: SmallVec<[Arc<dyn Connection>; 2]> = SmallVec::new();
        for conn in &snapshot {
            if let Err(e) = write_full(conn.as_ref(), &frame) {
                trace!(topic = %self.info.topic.name, error = %e, "dropping subscriber connection");
                dead.push(Arc::clone(conn));
            }
        }
        if !dead.is_empty() {
            self.connections
                .lock()
                .retain(|conn| !dead.iter().any(|d| Arc::ptr_eq(conn, d)));
        }
    }

    /// One non-blocking accept of a subscriber connection.
    pub fn spin_once(&self) {
        if !self.ok() {
            return;
        }
        if !self.server.wait_for_accept(Duration::ZERO) {
            return;
        }
        let Some(conn) = self.server.accept() else {
            return;
        };
        debug!(topic = %self.info.topic.name, "subscriber connected");
        self.connections.lock().push(Arc::from(conn));
    }
}

impl Component for Publisher {
    fn ok(&self) -> bool {
        Publisher::ok(self)
    }

    fn spin_once(&self) {
        Publisher::spin_once(self);
    }

    fn shutdown(&self) {
        Publisher::shutdown(self);
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        registry::deregister(
            &self.client_factory,
            &self.hub_endpoint,
            Opcode::PubDeregister,
            &self.info,
        );
        self.shutdown();
    }
}
