//! The wire message trait and structural schema hashing.

use bytes::{Bytes, BytesMut};

use crate::error::DecodeError;
use crate::ser::Reader;

/// FNV-1a over a canonical signature string.
///
/// Evaluated at compile time, so every message type carries a stable
/// 64-bit identifier of its structural schema. Two peers agree on a
/// topic's payload type exactly when their hashes are equal.
#[must_use]
pub const fn schema_hash(signature: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    let mut i = 0;
    while i < signature.len() {
        hash ^= signature[i] as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        i += 1;
    }
    hash
}

/// A value with a fixed byte-packed wire encoding.
///
/// Contract: `encode` appends exactly `encoded_len()` bytes, and
/// `decode` consumes exactly that many from the reader or fails with a
/// [`DecodeError`] without out-of-bounds access.
pub trait WireMessage: Sized {
    /// Structural schema hash; equality is treated as type compatibility.
    const SCHEMA_HASH: u64;

    /// Exact byte count produced by [`WireMessage::encode`].
    fn encoded_len(&self) -> u32;

    fn encode(&self, dst: &mut BytesMut);

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError>;

    /// Encode into a freshly allocated buffer.
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len() as usize);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode from the start of `buf`. Trailing bytes are left unread.
    fn from_bytes(buf: &[u8]) -> Result<Self, DecodeError> {
        Self::decode(&mut Reader::new(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_hash_is_deterministic() {
        assert_eq!(schema_hash(b"abc"), schema_hash(b"abc"));
    }

    #[test]
    fn test_schema_hash_distinguishes_signatures() {
        assert_ne!(schema_hash(b"standard/Time"), schema_hash(b"standard/Header"));
        assert_ne!(schema_hash(b""), schema_hash(b"x"));
    }

    #[test]
    fn test_schema_hash_of_empty_input_is_fnv_offset_basis() {
        assert_eq!(schema_hash(b""), 0xcbf2_9ce4_8422_2325);
    }
}
