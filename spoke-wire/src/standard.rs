//! Standard application message set.
//!
//! A small vocabulary of ready-made payload types for demos and tests.
//! Application crates are expected to define their own [`WireMessage`]
//! types alongside these.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, BytesMut};

use crate::error::DecodeError;
use crate::message::{schema_hash, WireMessage};
use crate::ser::{self, Reader, Scalar};

/// A point in time as seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Time {
    pub sec: u32,
    pub nsec: u32,
}

impl Time {
    /// The current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            sec: since_epoch.as_secs() as u32,
            nsec: since_epoch.subsec_nanos(),
        }
    }
}

impl WireMessage for Time {
    const SCHEMA_HASH: u64 = schema_hash(b"standard/Time{sec:u32,nsec:u32}");

    fn encoded_len(&self) -> u32 {
        8
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.sec);
        dst.put_u32_le(self.nsec);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let sec = u32::get(r)?;
        let nsec = u32::get(r)?;
        Ok(Self { sec, nsec })
    }
}

/// Sequence number, timestamp, and frame id for a stream of samples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub seq: u32,
    pub stamp: Time,
    pub frame_id: String,
}

impl WireMessage for Header {
    const SCHEMA_HASH: u64 =
        schema_hash(b"standard/Header{seq:u32,stamp:standard/Time,frame_id:string}");

    fn encoded_len(&self) -> u32 {
        4 + self.stamp.encoded_len() + ser::string_len(&self.frame_id)
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.seq);
        self.stamp.encode(dst);
        ser::put_string(dst, &self.frame_id);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let seq = u32::get(r)?;
        let stamp = Time::decode(r)?;
        let frame_id = ser::get_string(r)?;
        Ok(Self {
            seq,
            stamp,
            frame_id,
        })
    }
}

/// A bare unsigned 32-bit value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UInt32 {
    pub data: u32,
}

impl WireMessage for UInt32 {
    const SCHEMA_HASH: u64 = schema_hash(b"standard/UInt32{data:u32}");

    fn encoded_len(&self) -> u32 {
        4
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.data);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self { data: u32::get(r)? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let header = Header {
            seq: 1234,
            stamp: Time { sec: 456, nsec: 789 },
            frame_id: "hello, world!".to_string(),
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes.len() as u32, header.encoded_len());

        let mut r = Reader::new(&bytes);
        let decoded = Header::decode(&mut r).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(r.position(), bytes.len());
    }

    #[test]
    fn test_header_truncated_decode_fails() {
        let header = Header {
            seq: 1,
            stamp: Time { sec: 2, nsec: 3 },
            frame_id: "base".to_string(),
        };
        let bytes = header.to_bytes();
        for k in 0..bytes.len() {
            assert!(Header::from_bytes(&bytes[..k]).is_err());
        }
    }

    #[test]
    fn test_time_round_trip() {
        let time = Time { sec: 456, nsec: 789 };
        assert_eq!(Time::from_bytes(&time.to_bytes()).unwrap(), time);
    }

    #[test]
    fn test_uint32_layout() {
        let value = UInt32 { data: 0xAABBCCDD };
        assert_eq!(hex::encode(value.to_bytes()), "ddccbbaa");
    }

    #[test]
    fn test_schema_hashes_distinguish_types() {
        assert_ne!(Header::SCHEMA_HASH, Time::SCHEMA_HASH);
        assert_ne!(Header::SCHEMA_HASH, UInt32::SCHEMA_HASH);
        assert_ne!(Time::SCHEMA_HASH, UInt32::SCHEMA_HASH);
    }
}
