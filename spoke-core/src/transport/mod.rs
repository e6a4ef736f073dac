//! Byte-stream transport abstraction.
//!
//! The core never opens sockets directly; it consumes [`Server`],
//! [`Client`], and [`Connection`] through factories injected at node
//! and hub construction. Two implementations ship here: [`tcp`] for
//! deployment and [`mock`] for in-process testing.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use spoke_wire::Endpoint;

use crate::config::POLL_INTERVAL;
use crate::error::{Result, SpokeError};

pub mod mock;
pub mod tcp;

/// One direction-agnostic byte stream.
///
/// `read` and `write` transfer up to `buf.len()` bytes; zero from
/// `read` means the peer closed.
pub trait Connection: Send + Sync {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;
    fn write(&self, buf: &[u8]) -> io::Result<usize>;
}

/// A listening socket bound to one endpoint.
pub trait Server: Send + Sync {
    /// False when the bind failed; components constructed over a dead
    /// server shut themselves down.
    fn ok(&self) -> bool;

    /// Wait until a connection is pending or the timeout elapses.
    /// A zero timeout is a non-blocking poll and returns promptly.
    fn wait_for_accept(&self, timeout: Duration) -> bool;

    /// Accept one pending connection, if any.
    fn accept(&self) -> Option<Box<dyn Connection>>;

    /// The endpoint this server was asked to bind.
    fn endpoint(&self) -> &Endpoint;
}

/// An outbound connection with readiness queries.
pub trait Client: Connection {
    fn connect(&self, endpoint: &Endpoint) -> io::Result<()>;

    /// Request non-blocking reads. Must be called before `connect`.
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;

    fn is_connected(&self) -> bool;

    /// True when at least one byte can be read without blocking.
    fn is_readable(&self) -> bool;
}

/// Builds a server bound to the given endpoint.
pub type ServerFactory = Arc<dyn Fn(&Endpoint) -> Box<dyn Server> + Send + Sync>;

/// Builds an unconnected client.
pub type ClientFactory = Arc<dyn Fn() -> Box<dyn Client> + Send + Sync>;

/// Read exactly `buf.len()` bytes, looping over partial reads.
///
/// Bounded by `timeout`: a stream that stays silent mid-field fails
/// with [`SpokeError::ShortRead`] instead of stalling the spin loop.
/// A peer close mid-field fails with [`SpokeError::ConnectionClosed`].
pub fn read_full<C: Connection + ?Sized>(
    conn: &C,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<()> {
    let want = buf.len();
    let deadline = Instant::now() + timeout;
    let mut got = 0;
    while got < want {
        match conn.read(&mut buf[got..]) {
            Ok(0) => return Err(SpokeError::ConnectionClosed),
            Ok(n) => got += n,
            Err(e) if retriable(&e) => {
                if Instant::now() >= deadline {
                    return Err(SpokeError::ShortRead { got, want });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(SpokeError::Io(e)),
        }
    }
    Ok(())
}

/// Write all of `buf`, looping over partial writes.
pub fn write_full<C: Connection + ?Sized>(conn: &C, buf: &[u8]) -> Result<()> {
    let want = buf.len();
    let deadline = Instant::now() + crate::config::IO_TIMEOUT;
    let mut got = 0;
    while got < want {
        match conn.write(&buf[got..]) {
            Ok(0) => return Err(SpokeError::ConnectionClosed),
            Ok(n) => got += n,
            Err(e) if retriable(&e) => {
                if Instant::now() >= deadline {
                    return Err(SpokeError::ShortWrite { got, want });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(SpokeError::Io(e)),
        }
    }
    Ok(())
}

fn retriable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
