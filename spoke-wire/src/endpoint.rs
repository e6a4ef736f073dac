//! Endpoint addressing.
//!
//! An [`Endpoint`] is an `address:port` pair. It is both the key under
//! which transports register listeners and a wire message embedded in
//! publisher and subscriber records, so it lives here rather than in
//! the transport layer.

use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, BytesMut};

use crate::error::DecodeError;
use crate::message::{schema_hash, WireMessage};
use crate::ser::{self, Reader, Scalar};

/// A transport address. Totally ordered for use as a map key.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, port) = s
            .rsplit_once(':')
            .ok_or_else(|| EndpointParseError::MissingPort(s.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| EndpointParseError::InvalidPort(port.to_string()))?;
        Ok(Self::new(address, port))
    }
}

impl WireMessage for Endpoint {
    const SCHEMA_HASH: u64 = schema_hash(b"spoke/Endpoint{address:string,port:u16}");

    fn encoded_len(&self) -> u32 {
        ser::string_len(&self.address) + 2
    }

    fn encode(&self, dst: &mut BytesMut) {
        ser::put_string(dst, &self.address);
        dst.put_u16_le(self.port);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let address = ser::get_string(r)?;
        let port = u16::get(r)?;
        Ok(Self { address, port })
    }
}

/// Errors that can occur when parsing an endpoint from a string.
#[derive(Debug, thiserror::Error)]
pub enum EndpointParseError {
    #[error("missing port in endpoint: {0} (expected address:port)")]
    MissingPort(String),

    #[error("invalid port: {0}")]
    InvalidPort(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let endpoint: Endpoint = "127.0.0.1:5555".parse().unwrap();
        assert_eq!(endpoint, Endpoint::new("127.0.0.1", 5555));
        assert_eq!(endpoint.to_string(), "127.0.0.1:5555");
    }

    #[test]
    fn test_parse_missing_port() {
        let result = "localhost".parse::<Endpoint>();
        assert!(matches!(result, Err(EndpointParseError::MissingPort(_))));
    }

    #[test]
    fn test_parse_invalid_port() {
        let result = "localhost:notaport".parse::<Endpoint>();
        assert!(matches!(result, Err(EndpointParseError::InvalidPort(_))));
    }

    #[test]
    fn test_ordering() {
        let a = Endpoint::new("10.0.0.1", 9);
        let b = Endpoint::new("10.0.0.1", 10);
        let c = Endpoint::new("10.0.0.2", 1);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_wire_round_trip() {
        let endpoint = Endpoint::new("example.net", 8080);
        let bytes = endpoint.to_bytes();
        assert_eq!(bytes.len() as u32, endpoint.encoded_len());
        assert_eq!(Endpoint::from_bytes(&bytes).unwrap(), endpoint);
    }
}
