//! TCP transport over `std::net`.
//!
//! Listeners run non-blocking so accept polls return promptly; accepted
//! and outbound streams get TCP_NODELAY plus a small read timeout so
//! every read stays bounded by the spin interval.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use socket2::{Domain, Socket, Type};
use spoke_wire::Endpoint;
use tracing::warn;

use crate::config::{CONNECT_TIMEOUT, IO_TIMEOUT, LISTEN_BACKLOG, POLL_INTERVAL};
use crate::transport::{Client, ClientFactory, Connection, Server, ServerFactory};

/// Factory bundle for the TCP transport.
pub struct TcpTransport;

impl TcpTransport {
    #[must_use]
    pub fn server_factory() -> ServerFactory {
        Arc::new(|endpoint: &Endpoint| -> Box<dyn Server> { Box::new(TcpServer::bind(endpoint)) })
    }

    #[must_use]
    pub fn client_factory() -> ClientFactory {
        Arc::new(|| -> Box<dyn Client> { Box::new(TcpClient::new()) })
    }
}

fn resolve(endpoint: &Endpoint) -> io::Result<SocketAddr> {
    (endpoint.address.as_str(), endpoint.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no address for {endpoint}"),
            )
        })
}

fn configure_stream(stream: &TcpStream) -> io::Result<()> {
    // Some platforms hand accepted sockets the listener's non-blocking
    // mode; reads here are bounded by timeout instead.
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    stream.set_read_timeout(Some(IO_TIMEOUT))?;
    stream.set_write_timeout(Some(IO_TIMEOUT))
}

/// Non-blocking TCP listener.
pub struct TcpServer {
    endpoint: Endpoint,
    listener: Option<TcpListener>,
    pending: Mutex<Option<TcpStream>>,
}

impl TcpServer {
    /// Bind the endpoint. A failed bind yields a server whose `ok()` is
    /// false; the owning component shuts itself down.
    #[must_use]
    pub fn bind(endpoint: &Endpoint) -> Self {
        let listener = match Self::try_bind(endpoint) {
            Ok(listener) => Some(listener),
            Err(e) => {
                warn!(%endpoint, error = %e, "tcp bind failed");
                None
            }
        };
        Self {
            endpoint: endpoint.clone(),
            listener,
            pending: Mutex::new(None),
        }
    }

    fn try_bind(endpoint: &Endpoint) -> io::Result<TcpListener> {
        let addr = resolve(endpoint)?;
        // SO_REUSEADDR so a restarted hub can rebind without waiting
        // out TIME_WAIT.
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(LISTEN_BACKLOG)?;
        let listener: TcpListener = socket.into();
        listener.set_nonblocking(true)?;
        Ok(listener)
    }

    fn poll_accept(&self) -> bool {
        let mut pending = self.pending.lock();
        if pending.is_some() {
            return true;
        }
        let Some(listener) = &self.listener else {
            return false;
        };
        match listener.accept() {
            Ok((stream, _)) => {
                *pending = Some(stream);
                true
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => false,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "tcp accept failed");
                false
            }
        }
    }
}

impl Server for TcpServer {
    fn ok(&self) -> bool {
        self.listener.is_some()
    }

    fn wait_for_accept(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.poll_accept() {
                return true;
            }
            if timeout.is_zero() || Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn accept(&self) -> Option<Box<dyn Connection>> {
        if !self.poll_accept() {
            return None;
        }
        let stream = self.pending.lock().take()?;
        if let Err(e) = configure_stream(&stream) {
            warn!(endpoint = %self.endpoint, error = %e, "tcp stream setup failed");
            return None;
        }
        Some(Box::new(TcpConnection { stream }))
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

/// An accepted TCP stream with bounded reads.
pub struct TcpConnection {
    stream: TcpStream,
}

impl Connection for TcpConnection {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.stream).read(buf)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        (&self.stream).write(buf)
    }
}

/// An outbound TCP connection.
pub struct TcpClient {
    stream: Mutex<Option<TcpStream>>,
    nonblocking: AtomicBool,
}

impl TcpClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stream: Mutex::new(None),
            nonblocking: AtomicBool::new(false),
        }
    }
}

impl Default for TcpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for TcpClient {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        match &*self.stream.lock() {
            Some(stream) => (&*stream).read(buf),
            None => Err(io::ErrorKind::NotConnected.into()),
        }
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        match &*self.stream.lock() {
            Some(stream) => (&*stream).write(buf),
            None => Err(io::ErrorKind::NotConnected.into()),
        }
    }
}

impl Client for TcpClient {
    fn connect(&self, endpoint: &Endpoint) -> io::Result<()> {
        let addr = resolve(endpoint)?;
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
        stream.set_nodelay(true)?;
        if self.nonblocking.load(Ordering::Relaxed) {
            stream.set_nonblocking(true)?;
        } else {
            stream.set_read_timeout(Some(IO_TIMEOUT))?;
            stream.set_write_timeout(Some(IO_TIMEOUT))?;
        }
        *self.stream.lock() = Some(stream);
        Ok(())
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.nonblocking.store(nonblocking, Ordering::Relaxed);
        if let Some(stream) = &*self.stream.lock() {
            stream.set_nonblocking(nonblocking)?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        match &*self.stream.lock() {
            Some(stream) => match stream.peek(&mut [0u8; 1]) {
                Ok(0) => false,
                Ok(_) => true,
                Err(e) => e.kind() == io::ErrorKind::WouldBlock,
            },
            None => false,
        }
    }

    fn is_readable(&self) -> bool {
        match &*self.stream.lock() {
            Some(stream) => matches!(stream.peek(&mut [0u8; 1]), Ok(n) if n > 0),
            None => false,
        }
    }
}
