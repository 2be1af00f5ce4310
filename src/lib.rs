//! A library to encode and decode the protocol buffers wire format
//!
//! The reader is developed similarly to a pull reader; the writer mirrors it
//! with field-aware operations over a raw byte encoder. A 5-byte big-endian
//! envelope frames messages streamed back-to-back.

#![deny(missing_docs)]
#![allow(dead_code)]

extern crate byteorder;

pub mod encoder;
pub mod errors;
pub mod message;
pub mod reader;
pub mod sizeofs;
pub mod types;
pub mod writer;

pub use crate::encoder::Encoder;
pub use crate::errors::{Error, Result};
pub use crate::message::{MessageRead, MessageWrite};
pub use crate::reader::{deserialize_from_slice, BytesReader, Reader};
pub use crate::types::{FieldType, Value, WireType};
pub use crate::writer::{serialize_into_vec, Writer};
