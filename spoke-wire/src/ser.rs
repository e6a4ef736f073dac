//! Byte-packed serialization primitives.
//!
//! Every wire value is little-endian with no padding. Scalars are raw
//! bytes, strings carry a `u32` length prefix, fixed arrays are bare
//! concatenations, and vectors carry a `u32` element-count prefix.
//!
//! Encoding appends to a [`BytesMut`]; decoding goes through [`Reader`],
//! which either fully consumes a field and advances its cursor or fails
//! without touching memory past the buffer.

use bytes::{BufMut, BytesMut};

use crate::error::DecodeError;
use crate::message::WireMessage;

/// Bounds-checked cursor over a received byte buffer.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left in the buffer.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Underflow {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }
}

/// A fixed-width arithmetic wire value.
pub trait Scalar: Copy + Default + Sized {
    /// Encoded width in bytes.
    const WIDTH: usize;

    fn put(self, dst: &mut BytesMut);
    fn get(r: &mut Reader<'_>) -> Result<Self, DecodeError>;
}

macro_rules! impl_scalar {
    ($($ty:ty),* $(,)?) => {$(
        impl Scalar for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            fn put(self, dst: &mut BytesMut) {
                dst.put_slice(&self.to_le_bytes());
            }

            fn get(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
                let raw = r.take(std::mem::size_of::<$ty>())?;
                let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                bytes.copy_from_slice(raw);
                Ok(<$ty>::from_le_bytes(bytes))
            }
        }
    )*};
}

impl_scalar!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

// --- strings ---------------------------------------------------------------

/// Encoded size of a length-prefixed string.
#[must_use]
pub fn string_len(s: &str) -> u32 {
    4 + s.len() as u32
}

pub fn put_string(dst: &mut BytesMut, s: &str) {
    dst.put_u32_le(s.len() as u32);
    dst.put_slice(s.as_bytes());
}

pub fn get_string(r: &mut Reader<'_>) -> Result<String, DecodeError> {
    let declared = u32::get(r)? as usize;
    if declared > r.remaining() {
        return Err(DecodeError::LengthOverrun {
            declared,
            remaining: r.remaining(),
        });
    }
    let raw = r.take(declared)?;
    String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
}

// --- fixed arrays ----------------------------------------------------------

pub fn put_scalar_array<T: Scalar, const N: usize>(dst: &mut BytesMut, src: &[T; N]) {
    for &item in src {
        item.put(dst);
    }
}

pub fn get_scalar_array<T: Scalar, const N: usize>(
    r: &mut Reader<'_>,
) -> Result<[T; N], DecodeError> {
    let mut out = [T::default(); N];
    for slot in &mut out {
        *slot = T::get(r)?;
    }
    Ok(out)
}

pub fn put_string_array<const N: usize>(dst: &mut BytesMut, src: &[String; N]) {
    for s in src {
        put_string(dst, s);
    }
}

pub fn get_string_array<const N: usize>(r: &mut Reader<'_>) -> Result<[String; N], DecodeError> {
    let mut out: [String; N] = std::array::from_fn(|_| String::new());
    for slot in &mut out {
        *slot = get_string(r)?;
    }
    Ok(out)
}

pub fn put_message_array<M: WireMessage, const N: usize>(dst: &mut BytesMut, src: &[M; N]) {
    for m in src {
        m.encode(dst);
    }
}

pub fn get_message_array<M: WireMessage + Default, const N: usize>(
    r: &mut Reader<'_>,
) -> Result<[M; N], DecodeError> {
    let mut out: [M; N] = std::array::from_fn(|_| M::default());
    for slot in &mut out {
        *slot = M::decode(r)?;
    }
    Ok(out)
}

// --- vectors ---------------------------------------------------------------

#[must_use]
pub fn scalar_vec_len<T: Scalar>(src: &[T]) -> u32 {
    4 + (src.len() * T::WIDTH) as u32
}

pub fn put_scalar_vec<T: Scalar>(dst: &mut BytesMut, src: &[T]) {
    dst.put_u32_le(src.len() as u32);
    for &item in src {
        item.put(dst);
    }
}

pub fn get_scalar_vec<T: Scalar>(r: &mut Reader<'_>) -> Result<Vec<T>, DecodeError> {
    let count = u32::get(r)? as usize;
    let declared = count
        .checked_mul(T::WIDTH)
        .ok_or(DecodeError::LengthOverrun {
            declared: usize::MAX,
            remaining: r.remaining(),
        })?;
    if declared > r.remaining() {
        return Err(DecodeError::LengthOverrun {
            declared,
            remaining: r.remaining(),
        });
    }
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(T::get(r)?);
    }
    Ok(out)
}

#[must_use]
pub fn string_vec_len(src: &[String]) -> u32 {
    4 + src.iter().map(|s| string_len(s)).sum::<u32>()
}

pub fn put_string_vec(dst: &mut BytesMut, src: &[String]) {
    dst.put_u32_le(src.len() as u32);
    for s in src {
        put_string(dst, s);
    }
}

pub fn get_string_vec(r: &mut Reader<'_>) -> Result<Vec<String>, DecodeError> {
    let count = u32::get(r)? as usize;
    // Every string costs at least its 4-byte length prefix.
    if count.saturating_mul(4) > r.remaining() {
        return Err(DecodeError::LengthOverrun {
            declared: count,
            remaining: r.remaining(),
        });
    }
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(get_string(r)?);
    }
    Ok(out)
}

#[must_use]
pub fn message_vec_len<M: WireMessage>(src: &[M]) -> u32 {
    4 + src.iter().map(WireMessage::encoded_len).sum::<u32>()
}

pub fn put_message_vec<M: WireMessage>(dst: &mut BytesMut, src: &[M]) {
    dst.put_u32_le(src.len() as u32);
    for m in src {
        m.encode(dst);
    }
}

pub fn get_message_vec<M: WireMessage>(r: &mut Reader<'_>) -> Result<Vec<M>, DecodeError> {
    let count = u32::get(r)? as usize;
    if count > r.remaining() {
        return Err(DecodeError::LengthOverrun {
            declared: count,
            remaining: r.remaining(),
        });
    }
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(M::decode(r)?);
    }
    Ok(out)
}
