use thiserror::Error;

/// Errors raised while decoding wire bytes.
///
/// Decoding is bounds-checked: a failed decode leaves the cursor
/// position unspecified but never reads past the buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The remaining buffer is shorter than the next field.
    #[error("buffer underflow: needed {needed} bytes, {remaining} remaining")]
    Underflow { needed: usize, remaining: usize },

    /// A length prefix declares more content than the buffer holds.
    #[error("declared length {declared} exceeds {remaining} remaining bytes")]
    LengthOverrun { declared: usize, remaining: usize },

    /// A string field does not contain valid UTF-8.
    #[error("string field is not valid utf-8")]
    InvalidUtf8,

    /// An operation header carries an opcode this peer does not know.
    #[error("unknown opcode {0}")]
    UnknownOpcode(u16),
}
