use std::io;

use spoke_wire::DecodeError;
use thiserror::Error;

/// Error type for hub, endpoint-component, and transport operations.
///
/// Nothing here crosses a `spin_once` boundary: recoverable failures
/// are absorbed into a component's `ok()` state or shrink its peer set.
#[derive(Error, Debug)]
pub enum SpokeError {
    /// IO error during socket operations.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Wire bytes did not match the expected structure.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The hub answered a register operation with a nonzero status.
    #[error("hub rejected registration with status {0}")]
    Rejected(u8),

    /// The peer closed the connection mid-exchange.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// A bounded read returned fewer bytes than required.
    #[error("short read: {got} of {want} bytes")]
    ShortRead { got: usize, want: usize },

    /// A bounded write transferred fewer bytes than required.
    #[error("short write: {got} of {want} bytes")]
    ShortWrite { got: usize, want: usize },

    /// Could not open a connection to the given endpoint.
    #[error("failed to connect to {0}")]
    ConnectFailed(String),
}

/// Result type alias for Spoke operations.
pub type Result<T> = std::result::Result<T, SpokeError>;
