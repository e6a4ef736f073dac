//! Spoke Core
//!
//! The coordination and transport machinery of the middleware:
//! - Rendezvous hub: directory, topic compatibility, notifications (`hub`)
//! - Publishing and subscribing endpoints (`publisher`, `subscriber`)
//! - Cooperative per-process scheduler (`node`) and timers (`timer`)
//! - Byte-stream transport abstraction with TCP and in-memory mock
//!   implementations (`transport`)
//! - Error types (`error`)
//!
//! Control traffic goes node-to-hub over one-shot connections; data
//! traffic goes publisher-to-subscriber directly. Everything in this
//! crate is driven by cooperative `spin_once` steps and never blocks
//! unbounded.

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]

pub mod config;
pub mod error;
pub mod hub;
pub mod node;
pub mod publisher;
mod registry;
pub mod subscriber;
pub mod timer;
pub mod transport;

pub use error::{Result, SpokeError};
pub use hub::Hub;
pub use node::{Component, Node};
pub use publisher::Publisher;
pub use spoke_wire::Endpoint;
pub use subscriber::{RawCallback, Subscriber};
pub use timer::{Timer, TimerEvent};

pub mod prelude {
    //! Convenience imports for downstream crates.
    pub use crate::config::DEFAULT_HUB_PORT;
    pub use crate::error::{Result, SpokeError};
    pub use crate::hub::Hub;
    pub use crate::node::{Component, Node};
    pub use crate::publisher::Publisher;
    pub use crate::subscriber::Subscriber;
    pub use crate::timer::{Timer, TimerEvent};
    pub use crate::transport::mock::MockNetwork;
    pub use crate::transport::tcp::TcpTransport;
    pub use spoke_wire::{Endpoint, WireMessage};
}
