//! Spoke Wire Format
//!
//! This crate contains everything that appears on the wire, shared by
//! control and data traffic:
//! - Byte-packed little-endian serialization primitives (`ser`)
//! - The message trait and structural schema hashing (`message`)
//! - Control-plane messages exchanged with the hub (`control`)
//! - Endpoint addressing (`endpoint`)
//! - The standard application message set (`standard`)
//!
//! No I/O happens here; higher layers frame these encodings onto byte
//! streams.

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

pub mod control;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod ser;
pub mod standard;

pub use control::{
    encode_frame, NodeInfo, Opcode, Operation, PubInfo, Status, SubInfo, SubNotify, TopicInfo,
};
pub use endpoint::Endpoint;
pub use error::DecodeError;
pub use message::{schema_hash, WireMessage};
pub use ser::Reader;
