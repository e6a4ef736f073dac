//! Subscribing endpoint.
//!
//! A subscriber runs a listening socket dedicated to hub notifications
//! and a map of outbound connections to the publishers it has been told
//! about. Each spin drains pending notifications first (Phase A), then
//! pumps one frame off every readable publisher connection (Phase B).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use spoke_wire::{Endpoint, Opcode, Operation, SubInfo, SubNotify, WireMessage};
use tracing::{debug, trace, warn};

use crate::config::IO_TIMEOUT;
use crate::error::{Result, SpokeError};
use crate::node::Component;
use crate::registry;
use crate::transport::{read_full, Client, ClientFactory, Connection, Server};

/// Type-erased delivery callback: raw payload bytes of one message.
pub type RawCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Data-consuming endpoint for one topic.
pub struct Subscriber {
    info: SubInfo,
    server: Box<dyn Server>,
    client_factory: ClientFactory,
    hub_endpoint: Endpoint,
    /// Outbound connection per publisher id. A renewed notification for
    /// the same id replaces the old entry.
    clients: Mutex<HashMap<u64, Arc<dyn Client>>>,
    callback: Mutex<RawCallback>,
    shutdown_flag: AtomicBool,
}

impl Subscriber {
    /// Register with the hub and start listening for notifications.
    ///
    /// Rejection shuts the subscriber down: `ok()` is false and the
    /// owning node will drop it on its next spin.
    pub fn new(
        info: SubInfo,
        server: Box<dyn Server>,
        client_factory: ClientFactory,
        hub_endpoint: Endpoint,
        callback: RawCallback,
    ) -> Self {
        let subscriber = Self {
            info,
            server,
            client_factory,
            hub_endpoint,
            clients: Mutex::new(HashMap::new()),
            callback: Mutex::new(callback),
            shutdown_flag: AtomicBool::new(false),
        };
        if !subscriber.server.ok() {
            warn!(endpoint = %subscriber.server.endpoint(), "subscriber server invalid");
            subscriber.shutdown();
            return subscriber;
        }
        match registry::register(
            &subscriber.client_factory,
            &subscriber.hub_endpoint,
            Opcode::SubRegister,
            &subscriber.info,
        ) {
            Ok(()) => {
                debug!(id = subscriber.info.id, topic = %subscriber.info.topic.name, "subscriber registered")
            }
            Err(e) => {
                warn!(topic = %subscriber.info.topic.name, error = %e, "failed to register subscriber with hub");
                subscriber.shutdown();
            }
        }
        subscriber
    }

    pub fn ok(&self) -> bool {
        !self.shutdown_flag.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
    }

    /// Topic this subscriber consumes.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.info.topic.name
    }

    /// Number of publishers currently connected to.
    #[must_use]
    pub fn publisher_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Drain pending notifications, then pump readable publishers.
    pub fn spin_once(&self) {
        if !self.ok() || !self.server.ok() {
            return;
        }
        self.accept_notifications();
        self.drain_publishers();
    }

    /// Phase A: accept every pending hub connection and act on the
    /// publishers it announces. A malformed exchange discards that
    /// connection and moves on.
    fn accept_notifications(&self) {
        while self.server.wait_for_accept(Duration::ZERO) {
            let Some(conn) = self.server.accept() else {
                break;
            };
            if let Err(e) = self.handle_notification(conn.as_ref()) {
                debug!(topic = %self.info.topic.name, error = %e, "discarded notification");
            }
        }
    }

    fn handle_notification(&self, conn: &dyn Connection) -> Result<()> {
        let mut header = [0u8; Operation::WIRE_SIZE];
        read_full(conn, &mut header, IO_TIMEOUT)?;
        let op = Operation::from_bytes(&header)?;
        if op.opcode != Opcode::SubNotify as u16 || op.len == 0 {
            return Ok(());
        }

        let mut payload = vec![0u8; op.len as usize];
        read_full(conn, &mut payload, IO_TIMEOUT)?;
        let notify = SubNotify::from_bytes(&payload)?;

        for publisher in &notify.publishers {
            let client = (self.client_factory)();
            if let Err(e) = client.set_nonblocking(true) {
                warn!(publisher = publisher.id, error = %e, "client setup failed");
                continue;
            }
            if let Err(e) = client.connect(&publisher.endpoint) {
                warn!(
                    publisher = publisher.id,
                    endpoint = %publisher.endpoint,
                    error = %e,
                    "could not reach publisher"
                );
                continue;
            }
            debug!(
                topic = %self.info.topic.name,
                publisher = publisher.id,
                endpoint = %publisher.endpoint,
                "connected to publisher"
            );
            self.clients
                .lock()
                .insert(publisher.id, Arc::from(client));
        }
        Ok(())
    }

    /// Phase B: for every connected, readable publisher read one
    /// size-prefixed frame and deliver it. A short read skips the
    /// client for this tick; a dead client is evicted.
    fn drain_publishers(&self) {
        let callback = self.callback.lock().clone();
        let snapshot: Vec<(u64, Arc<dyn Client>)> = self
            .clients
            .lock()
            .iter()
            .map(|(&id, client)| (id, Arc::clone(client)))
            .collect();

        let mut dead: SmallVec<[u64; 4]> = SmallVec::new();
        for (id, client) in &snapshot {
            if !client.is_connected() {
                trace!(publisher = *id, "publisher connection closed");
                dead.push(*id);
                continue;
            }
            if !client.is_readable() {
                continue;
            }

            let mut prefix = [0u8; 4];
            match read_full(client.as_ref(), &mut prefix, IO_TIMEOUT) {
                Ok(()) => {}
                Err(SpokeError::ConnectionClosed) => {
                    dead.push(*id);
                    continue;
                }
                Err(_) => continue,
            }
            let size = u32::from_le_bytes(prefix);
            if size == 0 {
                continue;
            }

            let mut payload = vec![0u8; size as usize];
            match read_full(client.as_ref(), &mut payload, IO_TIMEOUT) {
                Ok(()) => {}
                Err(SpokeError::ConnectionClosed) => {
                    dead.push(*id);
                    continue;
                }
                Err(_) => continue,
            }

            callback(&payload);
        }

        if !dead.is_empty() {
            let mut clients = self.clients.lock();
            for id in dead {
                clients.remove(&id);
            }
        }
    }
}

impl Component for Subscriber {
    fn ok(&self) -> bool {
        Subscriber::ok(self)
    }

    fn spin_once(&self) {
        Subscriber::spin_once(self);
    }

    fn shutdown(&self) {
        Subscriber::shutdown(self);
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        registry::deregister(
            &self.client_factory,
            &self.hub_endpoint,
            Opcode::SubDeregister,
            &self.info,
        );
        self.shutdown();
    }
}
