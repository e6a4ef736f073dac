//! # Spoke
//!
//! A minimal hub-and-spoke publish/subscribe middleware. A central
//! rendezvous service (the [`Hub`]) keeps the directory of live
//! publishers and subscribers and introduces matching peers; message
//! traffic then flows directly publisher-to-subscriber over
//! point-to-point byte streams. The hub never carries data.
//!
//! ## Architecture
//!
//! - **`spoke-wire`**: byte-packed wire format, control messages,
//!   schema hashing
//! - **`spoke-core`**: hub, endpoints, node scheduler, transports
//! - **`spoke`**: public API surface (this crate)
//!
//! Scheduling is cooperative: each [`Node`] steps its components once
//! per `spin_once`, in insertion order, and nothing blocks unbounded.
//! The hub usually runs on a dedicated thread.
//!
//! ## Quick start
//!
//! Publishing:
//!
//! ```rust,no_run
//! use spoke::msg::{Header, Time};
//! use spoke::{Endpoint, Node, TcpTransport, DEFAULT_HUB_PORT};
//!
//! let hub = Endpoint::new("127.0.0.1", DEFAULT_HUB_PORT);
//! let node = Node::new(
//!     "talker",
//!     hub,
//!     TcpTransport::server_factory(),
//!     TcpTransport::client_factory(),
//! );
//!
//! let publisher = node.create_publisher::<Header>("/chatter", Endpoint::new("127.0.0.1", 7500));
//! publisher.publish(&Header {
//!     seq: 1,
//!     stamp: Time::now(),
//!     frame_id: "hello".to_string(),
//! });
//! node.spin_once();
//! ```
//!
//! Subscribing:
//!
//! ```rust,no_run
//! use spoke::msg::Header;
//! use spoke::{Endpoint, Node, TcpTransport, DEFAULT_HUB_PORT};
//!
//! let hub = Endpoint::new("127.0.0.1", DEFAULT_HUB_PORT);
//! let node = Node::new(
//!     "listener",
//!     hub,
//!     TcpTransport::server_factory(),
//!     TcpTransport::client_factory(),
//! );
//!
//! let subscriber = node.create_subscriber::<Header, _>(
//!     "/chatter",
//!     Endpoint::new("127.0.0.1", 7501),
//!     |msg: Header| println!("{}: {}", msg.seq, msg.frame_id),
//! );
//! assert!(subscriber.ok());
//! node.spin(|| false);
//! ```
//!
//! Topic compatibility is structural: the first registrant on a topic
//! name binds the payload type's schema hash, and the hub rejects
//! later registrants whose hash differs.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub use spoke_core::config::{DEFAULT_HUB_PORT, SPIN_INTERVAL};
pub use spoke_core::transport::mock::MockNetwork;
pub use spoke_core::transport::tcp::TcpTransport;
pub use spoke_core::transport::{Client, ClientFactory, Connection, Server, ServerFactory};
pub use spoke_core::{
    Component, Endpoint, Hub, Node, Publisher, Result, SpokeError, Subscriber, Timer, TimerEvent,
};
pub use spoke_wire::{DecodeError, WireMessage};

/// Ready-made application message types.
pub mod msg {
    pub use spoke_wire::standard::{Header, Time, UInt32};
}

/// Control-plane records and framing, for tooling that speaks the hub
/// protocol directly.
pub mod protocol {
    pub use spoke_wire::control::{
        encode_frame, NodeInfo, Opcode, Operation, PubInfo, Status, SubInfo, SubNotify, TopicInfo,
    };
}

/// Development helpers (examples/tests).
pub mod dev_tracing;
