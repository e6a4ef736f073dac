//! Timing and sizing constants shared across the core.

use std::time::Duration;

/// Port the example programs expect a hub on.
pub const DEFAULT_HUB_PORT: u16 = 7878;

/// Pause between cooperative spin steps in the `spin` loops.
pub const SPIN_INTERVAL: Duration = Duration::from_millis(1);

/// Upper bound on a single length-delimited read or write.
///
/// Kept small so an in-flight exchange cannot stall a spin loop for
/// longer than a few ticks.
pub const IO_TIMEOUT: Duration = Duration::from_millis(250);

/// Upper bound on establishing an outbound TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(250);

/// Polling granularity inside bounded blocking operations.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Listen backlog for transport servers.
pub const LISTEN_BACKLOG: i32 = 128;
