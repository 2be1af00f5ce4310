//! A module with the traits a message type implements to plug into the codec
//!
//! Generated (or hand-written) message types implement `MessageWrite` and
//! `MessageRead` and drive the writer and reader from them

use std::path::Path;

use crate::errors::Result;
use crate::reader::BytesReader;
use crate::writer::{serialize_into_vec, Writer};

/// A trait to handle serialization into the wire format
pub trait MessageWrite: Sized {
    /// Writes `Self` into the writer, one field operation per present field
    fn write_message(&self, _: &mut Writer) -> Result<()> {
        Ok(())
    }

    /// Computes necessary binary size of self once serialized in protobuf
    fn get_size(&self) -> usize {
        0
    }

    /// Writes self into a file
    fn write_file<P: AsRef<Path>>(&self, p: P) -> Result<()> {
        let v = serialize_into_vec(self)?;
        std::fs::write(p, v)?;
        Ok(())
    }
}

/// A trait to handle deserialization from the wire format
pub trait MessageRead<'a>: Sized {
    /// Constructs an instance of `Self` by reading from the given bytes
    /// via the given reader.
    ///
    /// It does NOT read a message length first. If you want to read a
    /// length prefixed message, use `BytesReader::read_message` directly
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> Result<Self>;
}
