//! In-memory loopback transport for tests and demos.
//!
//! A [`MockNetwork`] is a process-local registry of listening servers
//! keyed by [`Endpoint`]. Connecting pairs two [`Connection`] halves
//! over byte pipes and drops the server half into the listener's
//! backlog, so a connect succeeds before the acceptor has spun, the
//! same tolerance the TCP listen queue provides. Reads block on a
//! condvar with a timeout; a dropped peer reads as EOF.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use spoke_wire::Endpoint;
use tracing::warn;

use crate::config::IO_TIMEOUT;
use crate::transport::{Client, ClientFactory, Connection, Server, ServerFactory};

/// Registry of in-process listeners.
pub struct MockNetwork {
    servers: Mutex<HashMap<Endpoint, Arc<Backlog>>>,
}

impl MockNetwork {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            servers: Mutex::new(HashMap::new()),
        })
    }

    /// Factory producing servers registered on this network.
    #[must_use]
    pub fn server_factory(self: &Arc<Self>) -> ServerFactory {
        let net = Arc::clone(self);
        Arc::new(move |endpoint: &Endpoint| -> Box<dyn Server> {
            Box::new(MockServer::bind(&net, endpoint))
        })
    }

    /// Factory producing clients that dial into this network.
    #[must_use]
    pub fn client_factory(self: &Arc<Self>) -> ClientFactory {
        let net = Arc::clone(self);
        Arc::new(move || -> Box<dyn Client> { Box::new(MockClient::new(&net)) })
    }

    fn register(&self, endpoint: &Endpoint) -> Option<Arc<Backlog>> {
        let mut servers = self.servers.lock();
        if servers.contains_key(endpoint) {
            return None;
        }
        let backlog = Arc::new(Backlog::default());
        servers.insert(endpoint.clone(), Arc::clone(&backlog));
        Some(backlog)
    }

    fn deregister(&self, endpoint: &Endpoint) {
        self.servers.lock().remove(endpoint);
    }

    fn lookup(&self, endpoint: &Endpoint) -> Option<Arc<Backlog>> {
        self.servers.lock().get(endpoint).cloned()
    }
}

/// Pending accepted-side connections for one listener.
#[derive(Default)]
struct Backlog {
    queue: Mutex<VecDeque<MockConnection>>,
    ready: Condvar,
}

impl Backlog {
    fn push(&self, conn: MockConnection) {
        self.queue.lock().push_back(conn);
        self.ready.notify_one();
    }
}

/// One direction of a mock stream.
struct Pipe {
    state: Mutex<PipeState>,
    ready: Condvar,
}

#[derive(Default)]
struct PipeState {
    buf: VecDeque<u8>,
    closed: bool,
}

impl Pipe {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PipeState::default()),
            ready: Condvar::new(),
        })
    }

    fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }
}

/// One half of a paired mock stream.
struct MockConnection {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
}

impl MockConnection {
    fn pair() -> (Self, Self) {
        let a = Pipe::new();
        let b = Pipe::new();
        (
            Self {
                rx: Arc::clone(&a),
                tx: Arc::clone(&b),
            },
            Self { rx: b, tx: a },
        )
    }

    fn readable(&self) -> bool {
        !self.rx.state.lock().buf.is_empty()
    }

    fn peer_gone(&self) -> bool {
        let rx = self.rx.state.lock();
        rx.closed && rx.buf.is_empty()
    }
}

impl Connection for MockConnection {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.rx.state.lock();
        while state.buf.is_empty() {
            if state.closed {
                return Ok(0);
            }
            if self
                .rx
                .ready
                .wait_for(&mut state, IO_TIMEOUT)
                .timed_out()
            {
                return Err(io::ErrorKind::TimedOut.into());
            }
        }
        let n = buf.len().min(state.buf.len());
        for slot in buf.iter_mut().take(n) {
            *slot = state.buf.pop_front().unwrap_or_default();
        }
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.tx.state.lock();
        if state.closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        state.buf.extend(buf.iter().copied());
        self.tx.ready.notify_one();
        Ok(buf.len())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        // The peer observes EOF on its receive side and failure on
        // writes toward us.
        self.tx.close();
        self.rx.close();
    }
}

/// A mock listener registered on a [`MockNetwork`].
pub struct MockServer {
    net: Arc<MockNetwork>,
    endpoint: Endpoint,
    backlog: Option<Arc<Backlog>>,
}

impl MockServer {
    #[must_use]
    pub fn bind(net: &Arc<MockNetwork>, endpoint: &Endpoint) -> Self {
        let backlog = net.register(endpoint);
        if backlog.is_none() {
            warn!(%endpoint, "mock bind failed: endpoint in use");
        }
        Self {
            net: Arc::clone(net),
            endpoint: endpoint.clone(),
            backlog,
        }
    }
}

impl Server for MockServer {
    fn ok(&self) -> bool {
        self.backlog.is_some()
    }

    fn wait_for_accept(&self, timeout: Duration) -> bool {
        let Some(backlog) = &self.backlog else {
            return false;
        };
        let mut queue = backlog.queue.lock();
        if !queue.is_empty() {
            return true;
        }
        if timeout.is_zero() {
            return false;
        }
        backlog.ready.wait_for(&mut queue, timeout);
        !queue.is_empty()
    }

    fn accept(&self) -> Option<Box<dyn Connection>> {
        let backlog = self.backlog.as_ref()?;
        let conn = backlog.queue.lock().pop_front()?;
        Some(Box::new(conn))
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if self.backlog.is_some() {
            self.net.deregister(&self.endpoint);
        }
    }
}

/// A mock outbound connection.
pub struct MockClient {
    net: Arc<MockNetwork>,
    inner: Mutex<Option<MockConnection>>,
    nonblocking: AtomicBool,
}

impl MockClient {
    #[must_use]
    pub fn new(net: &Arc<MockNetwork>) -> Self {
        Self {
            net: Arc::clone(net),
            inner: Mutex::new(None),
            nonblocking: AtomicBool::new(false),
        }
    }
}

impl Connection for MockClient {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        match &*self.inner.lock() {
            Some(conn) => {
                if self.nonblocking.load(Ordering::Relaxed) && !conn.readable() {
                    if conn.peer_gone() {
                        return Ok(0);
                    }
                    return Err(io::ErrorKind::WouldBlock.into());
                }
                conn.read(buf)
            }
            None => Err(io::ErrorKind::NotConnected.into()),
        }
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        match &*self.inner.lock() {
            Some(conn) => conn.write(buf),
            None => Err(io::ErrorKind::NotConnected.into()),
        }
    }
}

impl Client for MockClient {
    fn connect(&self, endpoint: &Endpoint) -> io::Result<()> {
        let Some(backlog) = self.net.lookup(endpoint) else {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("nothing listening on {endpoint}"),
            ));
        };
        let (local, remote) = MockConnection::pair();
        backlog.push(remote);
        *self.inner.lock() = Some(local);
        Ok(())
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.nonblocking.store(nonblocking, Ordering::Relaxed);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        match &*self.inner.lock() {
            Some(conn) => !conn.peer_gone(),
            None => false,
        }
    }

    fn is_readable(&self) -> bool {
        match &*self.inner.lock() {
            Some(conn) => conn.readable(),
            None => false,
        }
    }
}
