//! A module to read a protobuf encoded byte stream
//!
//! The reader works like a pull parser: the caller drives `next_field` and
//! dispatches on the current field number, reading each payload with the
//! typed operation matching its declared type

use std::path::Path;

use byteorder::{BigEndian as BE, ByteOrder, LittleEndian as LE};

use crate::errors::{Error, Result};
use crate::message::MessageRead;
use crate::types::{FieldType, Value, WireType};

/// Maximum declared length of a string or bytes segment
pub(crate) const MAX_LEN: u64 = 1 << 52;

/// Byte width of the streaming envelope
const HEADER_LEN: usize = 5;

/// A cursored view over an immutable input buffer
///
/// The reader does not own the buffer; every operation takes the same
/// `bytes` slice the reader was created over. `end` is lowered transiently
/// when descending into a length delimited payload and restored on exit.
#[derive(Debug, Clone)]
pub struct BytesReader {
    start: usize,
    end: usize,
    stream_end: usize,
    field: u32,
    wire: WireType,
}

impl BytesReader {
    /// Creates a new reader over the whole slice
    pub fn from_bytes(bytes: &[u8]) -> BytesReader {
        BytesReader {
            start: 0,
            end: bytes.len(),
            stream_end: bytes.len(),
            field: 0,
            wire: WireType::Varint,
        }
    }

    /// Returns whether the cursor reached the end of the current message
    pub fn is_eof(&self) -> bool {
        self.start >= self.end
    }

    /// Number of bytes left in the current message
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Field number of the last tag read by `next_field`
    pub fn field_number(&self) -> u32 {
        self.field
    }

    /// Wire type of the last tag read by `next_field`
    pub fn wire_type(&self) -> WireType {
        self.wire
    }

    /// Advances past the next tag, storing field number and wire type
    ///
    /// Returns `false` at the end of the stream or of the current message.
    /// Fails on the deprecated group wire types and on wire types 6 and 7.
    pub fn next_field(&mut self, bytes: &[u8]) -> Result<bool> {
        if self.is_eof() {
            return Ok(false);
        }
        let tag = self.read_varint32(bytes)?;
        self.field = tag >> 3;
        self.wire = WireType::try_from((tag & 0x07) as u8)?;
        Ok(true)
    }

    fn read_u8(&mut self, bytes: &[u8]) -> Result<u8> {
        if self.start >= self.end {
            return Err(Error::UnexpectedEndOfBuffer);
        }
        let b = bytes[self.start];
        self.start += 1;
        Ok(b)
    }

    fn read_exact<'a>(&mut self, bytes: &'a [u8], n: usize) -> Result<&'a [u8]> {
        let end = self
            .start
            .checked_add(n)
            .ok_or(Error::UnexpectedEndOfBuffer)?;
        if end > self.end {
            return Err(Error::UnexpectedEndOfBuffer);
        }
        let s = &bytes[self.start..end];
        self.start = end;
        Ok(s)
    }

    /// Reads a varint as a 32-bit unsigned integer
    ///
    /// Bytes 1 to 5 contribute bits 0..34, everything past bit 31 being
    /// discarded. A 64-bit varint written where the schema expects 32 bits
    /// is tolerated: up to 5 further continuation bytes are consumed and
    /// dropped. More than 10 bytes total is an overflow.
    pub fn read_varint32(&mut self, bytes: &[u8]) -> Result<u32> {
        let mut b = self.read_u8(bytes)?;
        if b & 0x80 == 0 {
            return Ok(u32::from(b));
        }
        let mut r = u32::from(b & 0x7F);

        b = self.read_u8(bytes)?;
        r |= u32::from(b & 0x7F) << 7;
        if b & 0x80 == 0 {
            return Ok(r);
        }

        b = self.read_u8(bytes)?;
        r |= u32::from(b & 0x7F) << 14;
        if b & 0x80 == 0 {
            return Ok(r);
        }

        b = self.read_u8(bytes)?;
        r |= u32::from(b & 0x7F) << 21;
        if b & 0x80 == 0 {
            return Ok(r);
        }

        b = self.read_u8(bytes)?;
        r |= u32::from(b & 0x0F) << 28;
        if b & 0x80 == 0 {
            return Ok(r);
        }

        for _ in 0..5 {
            b = self.read_u8(bytes)?;
            if b & 0x80 == 0 {
                return Ok(r);
            }
        }
        Err(Error::Varint)
    }

    /// Reads a varint as a 64-bit unsigned integer, 1 to 10 bytes
    ///
    /// The 10th byte carries bit 63 only; any higher bit set is an overflow.
    pub fn read_varint64(&mut self, bytes: &[u8]) -> Result<u64> {
        let mut r: u64 = 0;
        for shift in (0..63).step_by(7) {
            let b = self.read_u8(bytes)?;
            r |= u64::from(b & 0x7F) << shift;
            if b & 0x80 == 0 {
                return Ok(r);
            }
        }
        match self.read_u8(bytes)? {
            0 => Ok(r),
            1 => Ok(r | 1 << 63),
            _ => Err(Error::Varint),
        }
    }

    fn check_wire(&self, expected: WireType) -> Result<()> {
        if self.wire == expected {
            Ok(())
        } else {
            Err(Error::WireTypeMismatch {
                expected,
                actual: self.wire,
            })
        }
    }

    fn read_len(&mut self, bytes: &[u8]) -> Result<usize> {
        let len = self.read_varint64(bytes)?;
        if len > MAX_LEN {
            return Err(Error::LengthLimit(len));
        }
        let len = len as usize;
        let end = self
            .start
            .checked_add(len)
            .ok_or(Error::UnexpectedEndOfBuffer)?;
        if end > self.end {
            return Err(Error::UnexpectedEndOfBuffer);
        }
        Ok(len)
    }

    /// Reads an `int32` value
    pub fn read_int32(&mut self, bytes: &[u8]) -> Result<i32> {
        self.check_wire(WireType::Varint)?;
        self.read_varint32(bytes).map(|v| v as i32)
    }

    /// Reads an `int64` value
    pub fn read_int64(&mut self, bytes: &[u8]) -> Result<i64> {
        self.check_wire(WireType::Varint)?;
        self.read_varint64(bytes).map(|v| v as i64)
    }

    /// Reads a `uint32` value
    pub fn read_uint32(&mut self, bytes: &[u8]) -> Result<u32> {
        self.check_wire(WireType::Varint)?;
        self.read_varint32(bytes)
    }

    /// Reads a `uint64` value
    pub fn read_uint64(&mut self, bytes: &[u8]) -> Result<u64> {
        self.check_wire(WireType::Varint)?;
        self.read_varint64(bytes)
    }

    /// Reads a `sint32` value, unfolding the zigzag encoding
    pub fn read_sint32(&mut self, bytes: &[u8]) -> Result<i32> {
        self.check_wire(WireType::Varint)?;
        self.read_varint32(bytes)
            .map(|v| ((v >> 1) as i32) ^ (-((v & 1) as i32)))
    }

    /// Reads a `sint64` value, unfolding the zigzag encoding
    pub fn read_sint64(&mut self, bytes: &[u8]) -> Result<i64> {
        self.check_wire(WireType::Varint)?;
        self.read_varint64(bytes)
            .map(|v| ((v >> 1) as i64) ^ (-((v & 1) as i64)))
    }

    /// Reads a `bool` value
    pub fn read_bool(&mut self, bytes: &[u8]) -> Result<bool> {
        self.check_wire(WireType::Varint)?;
        self.read_varint64(bytes).map(|v| v != 0)
    }

    /// Reads an `enum` value as its variant number
    pub fn read_enum(&mut self, bytes: &[u8]) -> Result<i32> {
        self.read_int32(bytes)
    }

    /// Reads a `fixed32` value, 4 bytes little-endian
    pub fn read_fixed32(&mut self, bytes: &[u8]) -> Result<u32> {
        self.check_wire(WireType::Fixed32)?;
        self.read_exact(bytes, 4).map(LE::read_u32)
    }

    /// Reads a `fixed64` value, 8 bytes little-endian
    pub fn read_fixed64(&mut self, bytes: &[u8]) -> Result<u64> {
        self.check_wire(WireType::Fixed64)?;
        self.read_exact(bytes, 8).map(LE::read_u64)
    }

    /// Reads an `sfixed32` value
    pub fn read_sfixed32(&mut self, bytes: &[u8]) -> Result<i32> {
        self.check_wire(WireType::Fixed32)?;
        self.read_exact(bytes, 4).map(LE::read_i32)
    }

    /// Reads an `sfixed64` value
    pub fn read_sfixed64(&mut self, bytes: &[u8]) -> Result<i64> {
        self.check_wire(WireType::Fixed64)?;
        self.read_exact(bytes, 8).map(LE::read_i64)
    }

    /// Reads a `float`, reconstructed bit-exactly from its binary32 form
    pub fn read_float(&mut self, bytes: &[u8]) -> Result<f32> {
        self.check_wire(WireType::Fixed32)?;
        self.read_exact(bytes, 4).map(LE::read_f32)
    }

    /// Reads a `double`, reconstructed bit-exactly from its binary64 form
    pub fn read_double(&mut self, bytes: &[u8]) -> Result<f64> {
        self.check_wire(WireType::Fixed64)?;
        self.read_exact(bytes, 8).map(LE::read_f64)
    }

    /// Reads a length delimited chunk of bytes
    pub fn read_bytes<'a>(&mut self, bytes: &'a [u8]) -> Result<&'a [u8]> {
        self.check_wire(WireType::LengthDelimited)?;
        let len = self.read_len(bytes)?;
        self.read_exact(bytes, len)
    }

    /// Reads a `string`, validating it is utf-8
    pub fn read_string<'a>(&mut self, bytes: &'a [u8]) -> Result<&'a str> {
        let raw = self.read_bytes(bytes)?;
        ::std::str::from_utf8(raw).map_err(Error::Utf8)
    }

    /// Reads an embedded message
    ///
    /// The current end is saved and lowered to the declared payload end for
    /// the duration of the nested deserializer, then the cursor is placed at
    /// the declared end even if the nested decoder consumed fewer bytes.
    pub fn read_message<'a, M>(&mut self, bytes: &'a [u8]) -> Result<M>
    where
        M: MessageRead<'a>,
    {
        self.check_wire(WireType::LengthDelimited)?;
        let len = self.read_len(bytes)?;
        let end = self.start + len;
        let saved = self.end;
        self.end = end;
        let msg = M::from_reader(self, bytes)?;
        self.start = end;
        self.end = saved;
        Ok(msg)
    }

    /// Reads one scalar of the declared field type
    ///
    /// The current wire type is pre-set from the declared type, so the
    /// payload shape follows the schema rather than the surrounding tag.
    pub fn read_scalar<'a>(&mut self, bytes: &'a [u8], field_type: FieldType) -> Result<Value<'a>> {
        self.wire = field_type.wire_type()?;
        let v = match field_type {
            FieldType::Double => Value::Double(self.read_double(bytes)?),
            FieldType::Float => Value::Float(self.read_float(bytes)?),
            FieldType::Int64 => Value::Int64(self.read_int64(bytes)?),
            FieldType::Uint64 => Value::Uint64(self.read_uint64(bytes)?),
            FieldType::Int32 => Value::Int32(self.read_int32(bytes)?),
            FieldType::Fixed64 => Value::Uint64(self.read_fixed64(bytes)?),
            FieldType::Fixed32 => Value::Uint32(self.read_fixed32(bytes)?),
            FieldType::Bool => Value::Bool(self.read_bool(bytes)?),
            FieldType::String => Value::String(self.read_string(bytes)?),
            FieldType::Group => return Err(Error::Deprecated("group")),
            FieldType::Message => Value::Message(self.read_bytes(bytes)?),
            FieldType::Bytes => Value::Bytes(self.read_bytes(bytes)?),
            FieldType::Uint32 => Value::Uint32(self.read_uint32(bytes)?),
            FieldType::Enum => Value::Int32(self.read_enum(bytes)?),
            FieldType::Sfixed32 => Value::Int32(self.read_sfixed32(bytes)?),
            FieldType::Sfixed64 => Value::Int64(self.read_sfixed64(bytes)?),
            FieldType::Sint32 => Value::Int32(self.read_sint32(bytes)?),
            FieldType::Sint64 => Value::Int64(self.read_sint64(bytes)?),
        };
        Ok(v)
    }

    /// Reads one map entry, a delimited sub-message with key as field 1 and
    /// value as field 2
    ///
    /// An absent key or value decodes to the declared type's default. Any
    /// other tag inside the entry is an error, as is a key or value type
    /// unsupported for maps.
    pub fn read_map_entry<'a>(
        &mut self,
        bytes: &'a [u8],
        key_type: FieldType,
        value_type: FieldType,
    ) -> Result<(Value<'a>, Value<'a>)> {
        if !key_type.is_map_key() {
            return Err(Error::MapKeyType(key_type));
        }
        if !value_type.is_map_value() {
            return Err(Error::MapValueType(value_type));
        }
        self.check_wire(WireType::LengthDelimited)?;
        let len = self.read_len(bytes)?;
        let end = self.start + len;
        let saved = self.end;
        self.end = end;
        let mut key = key_type.default_value()?;
        let mut value = value_type.default_value()?;
        while self.next_field(bytes)? {
            match self.field {
                1 => key = self.read_scalar(bytes, key_type)?,
                2 => value = self.read_scalar(bytes, value_type)?,
                t => return Err(Error::Map(t as u8)),
            }
        }
        self.start = end;
        self.end = saved;
        Ok((key, value))
    }

    /// Reads a packed repeated field
    ///
    /// `wire_type` is the per-element wire type; it is pre-set so the
    /// element reads decode untagged payloads until the declared end.
    pub fn read_packed<'a, M, F>(
        &mut self,
        bytes: &'a [u8],
        wire_type: WireType,
        mut read: F,
    ) -> Result<Vec<M>>
    where
        F: FnMut(&mut BytesReader, &'a [u8]) -> Result<M>,
    {
        self.check_wire(WireType::LengthDelimited)?;
        let len = self.read_len(bytes)?;
        let end = self.start + len;
        let saved = self.end;
        self.end = end;
        self.wire = wire_type;
        let mut v = Vec::new();
        while !self.is_eof() {
            v.push(read(self, bytes)?);
        }
        self.end = saved;
        Ok(v)
    }

    /// Skips the payload of the current field
    ///
    /// On success the cursor sits exactly at the start of the next tag.
    pub fn read_unknown(&mut self, bytes: &[u8]) -> Result<()> {
        match self.wire {
            WireType::Varint => {
                self.read_varint64(bytes)?;
            }
            WireType::Fixed64 => {
                self.read_exact(bytes, 8)?;
            }
            WireType::Fixed32 => {
                self.read_exact(bytes, 4)?;
            }
            WireType::LengthDelimited => {
                let len = self.read_len(bytes)?;
                self.start += len;
            }
        }
        Ok(())
    }

    /// Reads the 5-byte big-endian envelope preceding a streamed message
    ///
    /// Returns the payload length and bounds the following `next_field`
    /// loop to it. `None` means the stream is over, either through a zero
    /// length or the end of the input.
    pub fn read_header(&mut self, bytes: &[u8]) -> Result<Option<usize>> {
        self.end = self.stream_end;
        if self.is_eof() {
            return Ok(None);
        }
        if self.start + HEADER_LEN > self.stream_end {
            return Err(Error::UnexpectedEndOfBuffer);
        }
        let len = BE::read_uint(&bytes[self.start..self.start + HEADER_LEN], HEADER_LEN);
        self.start += HEADER_LEN;
        if len == 0 {
            self.end = self.start;
            return Ok(None);
        }
        let end = self
            .start
            .checked_add(len as usize)
            .ok_or(Error::UnexpectedEndOfBuffer)?;
        if end > self.stream_end {
            return Err(Error::UnexpectedEndOfBuffer);
        }
        self.end = end;
        Ok(Some(len as usize))
    }
}

/// A reader that owns its byte buffer
///
/// Convenience over [`BytesReader`] for callers that start from a file or
/// any `std::io::Read`.
pub struct Reader {
    buf: Vec<u8>,
    reader: BytesReader,
}

impl Reader {
    /// Creates a new reader consuming the `std::io::Read` to its end
    pub fn from_reader<R: ::std::io::Read>(mut r: R, capacity: usize) -> Result<Reader> {
        let mut buf = Vec::with_capacity(capacity);
        r.read_to_end(&mut buf)?;
        Ok(Reader::from_bytes(buf))
    }

    /// Creates a new reader from a file
    pub fn from_file<P: AsRef<Path>>(src: P) -> Result<Reader> {
        Ok(Reader::from_bytes(::std::fs::read(src)?))
    }

    /// Creates a new reader from an owned buffer
    pub fn from_bytes(bytes: Vec<u8>) -> Reader {
        let reader = BytesReader::from_bytes(&bytes);
        Reader { buf: bytes, reader }
    }

    /// Runs the given deserializer against the owned buffer
    pub fn read<'a, M, F>(&'a mut self, mut read: F) -> Result<M>
    where
        F: FnMut(&mut BytesReader, &'a [u8]) -> Result<M>,
    {
        read(&mut self.reader, &self.buf)
    }
}

/// Deserializes a message from the whole slice
pub fn deserialize_from_slice<'a, M: MessageRead<'a>>(bytes: &'a [u8]) -> Result<M> {
    let mut reader = BytesReader::from_bytes(bytes);
    M::from_reader(&mut reader, bytes)
}
