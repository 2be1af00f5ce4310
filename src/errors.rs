//! A module to handle all errors via thiserror crate

use std::io;

use crate::types::{FieldType, WireType};

/// An error enum which derives `std::error::Error`
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Io error
    #[error("{0}")]
    Io(#[source] io::Error),
    /// Utf8 Error
    #[error("{0}")]
    Utf8(#[source] ::std::str::Utf8Error),

    /// Deprecated feature (in protocol buffer specification)
    #[error("Feature '{0}' has been deprecated")]
    Deprecated(&'static str),
    /// Unknown wire type
    #[error("Unknown wire type '{0}', must be 0, 1, 2 or 5")]
    UnknownWireType(u8),
    /// Typed read requested against a non-matching wire type
    #[error("Unexpected wire type {actual:?}, expecting {expected:?}")]
    WireTypeMismatch {
        /// Wire type the requested read decodes
        expected: WireType,
        /// Wire type of the current field
        actual: WireType,
    },
    /// Varint decoding error
    #[error("Cannot decode varint")]
    Varint,
    /// Cursor would advance past the end of the readable input
    #[error("Unexpected end of buffer")]
    UnexpectedEndOfBuffer,
    /// Field number outside of `1..=536_870_911`
    #[error("Invalid field number '{0}'")]
    FieldNumber(u32),
    /// Value outside the domain of the target field type
    #[error("Value out of range for '{0}'")]
    OutOfRange(&'static str),
    /// Declared length of a string or bytes segment exceeds 2^52
    #[error("Declared length '{0}' exceeds the length limit")]
    LengthLimit(u64),
    /// Unexpected map tag
    #[error("Unexpected map tag: '{0}', expecting 1 or 2")]
    Map(u8),
    /// Field type not supported as a map key
    #[error("Field type {0:?} cannot be a map key")]
    MapKeyType(FieldType),
    /// Field type not supported as a map value
    #[error("Field type {0:?} cannot be a map value")]
    MapValueType(FieldType),
    /// Value kind does not match the declared field type
    #[error("Value does not match declared field type {0:?}")]
    ValueKind(FieldType),
    /// Error while parsing protocol buffer message
    #[error("Error while parsing message: {0}")]
    Message(String),
}

/// A wrapper for `Result<T, Error>`
pub type Result<T> = ::std::result::Result<T, Error>;

impl Into<io::Error> for Error {
    fn into(self) -> ::std::io::Error {
        match self {
            Error::Io(x) => x,
            Error::Utf8(x) => io::Error::new(io::ErrorKind::InvalidData, x),
            x => io::Error::new(io::ErrorKind::Other, x),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<::std::str::Utf8Error> for Error {
    fn from(e: ::std::str::Utf8Error) -> Error {
        Error::Utf8(e)
    }
}
