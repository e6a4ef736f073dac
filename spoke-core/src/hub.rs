//! The rendezvous hub.
//!
//! The hub keeps the directory of live nodes, publishers, and
//! subscribers, checks topic compatibility, and introduces subscribers
//! to publishers. It never carries application data: after an
//! introduction, traffic flows directly between the peers.
//!
//! Concurrency model:
//! - One mutex guards the directory; critical sections contain only
//!   map mutation.
//! - Notification I/O happens outside the lock. The benign race this
//!   admits (notifying a just-deregistered subscriber) is absorbed by
//!   best-effort delivery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hashbrown::HashMap;
use parking_lot::Mutex;
use spoke_wire::{
    encode_frame, Endpoint, NodeInfo, Opcode, Operation, PubInfo, Status, SubInfo, SubNotify,
    TopicInfo, WireMessage,
};
use tracing::{debug, trace, warn};

use crate::config::{IO_TIMEOUT, SPIN_INTERVAL};
use crate::error::Result;
use crate::transport::{
    read_full, write_full, Client, ClientFactory, Connection, Server, ServerFactory,
};

/// Directory of everything currently registered.
#[derive(Default)]
struct Directory {
    nodes: HashMap<u64, NodeInfo>,
    publishers: HashMap<u64, PubInfo>,
    subscribers: HashMap<u64, SubInfo>,
    /// Topic name to the schema hash its first registrant established.
    topic_hashes: HashMap<String, u64>,
}

impl Directory {
    /// Bind-or-check a topic against the known hashes.
    ///
    /// The first registrant on a name establishes the hash; later
    /// registrants must match it or be rejected.
    fn validate_topic_info(&mut self, topic: &TopicInfo) -> bool {
        match self.topic_hashes.get(&topic.name) {
            Some(&known) => known == topic.message_hash,
            None => {
                self.topic_hashes
                    .insert(topic.name.clone(), topic.message_hash);
                true
            }
        }
    }
}

/// Central rendezvous service.
///
/// Typically spun on a dedicated thread:
///
/// ```ignore
/// let hub = Arc::new(Hub::new(endpoint, server_factory, client_factory));
/// let handle = thread::spawn({ let hub = Arc::clone(&hub); move || hub.spin() });
/// ```
pub struct Hub {
    server: Box<dyn Server>,
    client_factory: ClientFactory,
    directory: Mutex<Directory>,
    shutdown_flag: AtomicBool,
}

impl Hub {
    /// Bind the hub's listening endpoint. A failed bind leaves the hub
    /// in the shutdown state.
    pub fn new(
        endpoint: Endpoint,
        server_factory: ServerFactory,
        client_factory: ClientFactory,
    ) -> Self {
        let server = server_factory(&endpoint);
        let hub = Self {
            server,
            client_factory,
            directory: Mutex::new(Directory::default()),
            shutdown_flag: AtomicBool::new(false),
        };
        if !hub.server.ok() {
            warn!(%endpoint, "hub server failed to bind");
            hub.shutdown();
        }
        hub
    }

    pub fn ok(&self) -> bool {
        !self.shutdown_flag.load(Ordering::SeqCst)
    }

    /// Idempotent; subsequent `spin_once` calls become no-ops.
    pub fn shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
    }

    /// Loop `spin_once` until shutdown.
    pub fn spin(&self) {
        while self.ok() {
            self.spin_once();
            std::thread::sleep(SPIN_INTERVAL);
        }
    }

    /// Accept and handle at most one request.
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
        self.handle_request(conn.as_ref());
    }

    fn handle_request(&self, conn: &dyn Connection) {
        let mut header = [0u8; Operation::WIRE_SIZE];
        if read_full(conn, &mut header, IO_TIMEOUT).is_err() {
            self.send_status(conn, Status::REJECT);
            return;
        }
        let op = match Operation::from_bytes(&header) {
            Ok(op) => op,
            Err(e) => {
                warn!(error = %e, "malformed operation header");
                self.send_status(conn, Status::REJECT);
                return;
            }
        };

        let mut payload = vec![0u8; op.len as usize];
        if read_full(conn, &mut payload, IO_TIMEOUT).is_err() {
            warn!(opcode = op.opcode, len = op.len, "short payload read");
            self.send_status(conn, Status::REJECT);
            return;
        }

        self.dispatch(conn, op.opcode, &payload);
    }

    fn dispatch(&self, conn: &dyn Connection, opcode: u16, payload: &[u8]) {
        match Opcode::try_from(opcode) {
            Ok(Opcode::NodeRegister) => match NodeInfo::from_bytes(payload) {
                Ok(info) => {
                    debug!(id = info.id, name = %info.name, "node registered");
                    self.directory.lock().nodes.insert(info.id, info);
                    self.send_status(conn, Status::OK);
                }
                Err(e) => {
                    warn!(error = %e, "undecodable node record");
                    self.send_status(conn, Status::REJECT);
                }
            },
            Ok(Opcode::NodeDeregister) => {
                if let Ok(info) = NodeInfo::from_bytes(payload) {
                    debug!(id = info.id, name = %info.name, "node deregistered");
                    self.directory.lock().nodes.remove(&info.id);
                }
            }
            Ok(Opcode::PubRegister) => self.register_publisher(conn, payload),
            Ok(Opcode::PubDeregister) => {
                if let Ok(info) = PubInfo::from_bytes(payload) {
                    debug!(id = info.id, topic = %info.topic.name, "publisher deregistered");
                    self.directory.lock().publishers.remove(&info.id);
                }
            }
            Ok(Opcode::SubRegister) => self.register_subscriber(conn, payload),
            Ok(Opcode::SubDeregister) => {
                if let Ok(info) = SubInfo::from_bytes(payload) {
                    debug!(id = info.id, topic = %info.topic.name, "subscriber deregistered");
                    self.directory.lock().subscribers.remove(&info.id);
                }
            }
            Ok(Opcode::SubNotify) => {
                // Only ever hub -> subscriber; a request carrying it is
                // a confused peer.
                warn!("received SUB_NOTIFY as a request");
                self.send_status(conn, Status::REJECT);
            }
            Err(e) => {
                warn!(error = %e, "unknown opcode");
                self.send_status(conn, Status::REJECT);
            }
        }
    }

    fn register_publisher(&self, conn: &dyn Connection, payload: &[u8]) {
        let info = match PubInfo::from_bytes(payload) {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "undecodable publisher record");
                self.send_status(conn, Status::REJECT);
                return;
            }
        };

        // Lock covers only the directory mutation; the notification
        // fan-out below runs without it.
        let interested: Option<Vec<SubInfo>> = {
            let mut dir = self.directory.lock();
            if dir.validate_topic_info(&info.topic) {
                dir.publishers.insert(info.id, info.clone());
                Some(
                    dir.subscribers
                        .values()
                        .filter(|sub| sub.topic.name == info.topic.name)
                        .cloned()
                        .collect(),
                )
            } else {
                None
            }
        };

        match interested {
            Some(subscribers) => {
                debug!(
                    id = info.id,
                    topic = %info.topic.name,
                    subscribers = subscribers.len(),
                    "publisher registered"
                );
                self.send_status(conn, Status::OK);
                for sub in &subscribers {
                    self.notify_subscriber(sub, std::slice::from_ref(&info));
                }
            }
            None => {
                warn!(id = info.id, topic = %info.topic.name, "publisher rejected: schema hash mismatch");
                self.send_status(conn, Status::REJECT);
            }
        }
    }

    fn register_subscriber(&self, conn: &dyn Connection, payload: &[u8]) {
        let info = match SubInfo::from_bytes(payload) {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "undecodable subscriber record");
                self.send_status(conn, Status::REJECT);
                return;
            }
        };

        let matching: Option<Vec<PubInfo>> = {
            let mut dir = self.directory.lock();
            if dir.validate_topic_info(&info.topic) {
                dir.subscribers.insert(info.id, info.clone());
                Some(
                    dir.publishers
                        .values()
                        .filter(|publisher| publisher.topic.name == info.topic.name)
                        .cloned()
                        .collect(),
                )
            } else {
                None
            }
        };

        match matching {
            Some(publishers) => {
                debug!(
                    id = info.id,
                    topic = %info.topic.name,
                    publishers = publishers.len(),
                    "subscriber registered"
                );
                self.send_status(conn, Status::OK);
                if !publishers.is_empty() {
                    self.notify_subscriber(&info, &publishers);
                }
            }
            None => {
                warn!(id = info.id, topic = %info.topic.name, "subscriber rejected: schema hash mismatch");
                self.send_status(conn, Status::REJECT);
            }
        }
    }

    /// Deliver a `SubNotify` over a fresh one-shot connection to the
    /// subscriber's advertised endpoint. Failures are dropped: the
    /// subscriber may already be gone, and that is fine.
    fn notify_subscriber(&self, sub: &SubInfo, publishers: &[PubInfo]) {
        let notify = SubNotify {
            publishers: publishers.to_vec(),
        };
        if let Err(e) = self.try_notify(sub, &notify) {
            warn!(
                subscriber = sub.id,
                endpoint = %sub.endpoint,
                error = %e,
                "notification dropped"
            );
        }
    }

    fn try_notify(&self, sub: &SubInfo, notify: &SubNotify) -> Result<()> {
        let client = (self.client_factory)();
        client
            .connect(&sub.endpoint)
            .map_err(crate::error::SpokeError::Io)?;
        write_full(&*client, &encode_frame(Opcode::SubNotify, notify))?;
        trace!(subscriber = sub.id, publishers = notify.publishers.len(), "notified");
        Ok(())
    }

    fn send_status(&self, conn: &dyn Connection, status: Status) {
        if write_full(conn, &status.to_bytes()).is_err() {
            trace!("status reply not delivered");
        }
    }
}
