use std::collections::TryReserveError;
use std::io;

use crate::tag::TagType;

/// Errors raised while decoding, encoding or editing NBT records.
#[derive(Debug, thiserror::Error)]
pub enum NbtError {
    /// The stream ended in the middle of a field.
    #[error("stream ended while reading {0}")]
    Truncated(&'static str),

    #[error("invalid tag type: {0}")]
    InvalidTagType(u8),

    #[error("negative length {0} for {1}")]
    NegativeLength(i32, &'static str),

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    /// A list declared one element kind but its content cannot be of that kind.
    #[error("list declares {declared} elements but holds {found}")]
    ListKindMismatch { declared: TagType, found: TagType },

    /// The root record is not of the kind the caller asked for.
    #[error("expected root {expected}, got {found}")]
    UnexpectedRoot { expected: TagType, found: TagType },

    #[error("records nested deeper than {0} levels")]
    TooDeep(usize),

    /// The allocator refused a buffer for an array payload.
    #[error("could not allocate {0} elements")]
    Allocation(usize),

    #[error("string of {0} bytes exceeds the 65535 byte limit")]
    StringTooLong(usize),

    /// A setter was handed a payload of a different kind than the record.
    #[error("cannot store {found} in a {expected} record")]
    KindMismatch { expected: TagType, found: TagType },

    #[error("index {index} out of range for {len} elements")]
    IndexOutOfRange { index: usize, len: usize },

    /// Text could not be interpreted as the payload of a record.
    #[error("cannot parse {text:?} as {kind}: {reason}")]
    Parse {
        kind: TagType,
        text: String,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl NbtError {
    /// Maps an I/O error from a read of `field`, turning an early EOF into
    /// [`NbtError::Truncated`].
    pub(crate) fn on_read(field: &'static str) -> impl FnOnce(io::Error) -> NbtError {
        move |err| {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                NbtError::Truncated(field)
            } else {
                NbtError::Io(err)
            }
        }
    }

    pub(crate) fn allocation(len: usize) -> impl FnOnce(TryReserveError) -> NbtError {
        move |_| NbtError::Allocation(len)
    }

    /// Whether this error reports an allocation refusal rather than bad data.
    pub fn is_allocation_failure(&self) -> bool {
        matches!(self, NbtError::Allocation(_))
    }
}

impl From<io::Error> for NbtError {
    fn from(err: io::Error) -> Self {
        NbtError::Io(err)
    }
}
