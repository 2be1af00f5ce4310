//! A module to write messages into the wire format
//!
//! The writer owns the field-aware operations: each one validates the value
//! against the domain of its field type, emits the tag, then hands the
//! payload to the encoder

use std::mem;

use byteorder::{BigEndian as BE, ByteOrder};

use crate::encoder::Encoder;
use crate::errors::{Error, Result};
use crate::message::MessageWrite;
use crate::reader::MAX_LEN;
use crate::types::{FieldType, Value, WireType};

/// Highest valid field number, `2^29 - 1`
const MAX_FIELD_NUMBER: u32 = 536_870_911;

/// Maximum payload length of a stream frame, `2^40 - 1`
const MAX_FRAME_LEN: u64 = (1 << 40) - 1;

/// A writer of tagged fields over an [`Encoder`]
#[derive(Debug, Default)]
pub struct Writer {
    enc: Encoder,
}

impl Writer {
    /// Creates a new writer over an empty encoder
    pub fn new() -> Writer {
        Writer {
            enc: Encoder::new(),
        }
    }

    /// Creates a new writer with a preallocated buffer
    pub fn with_capacity(capacity: usize) -> Writer {
        Writer {
            enc: Encoder::with_capacity(capacity),
        }
    }

    /// Borrows the bytes written so far
    pub fn as_slice(&self) -> &[u8] {
        self.enc.as_slice()
    }

    /// Consumes the writer, returning the encoded bytes
    pub fn into_vec(self) -> Vec<u8> {
        self.enc.into_vec()
    }

    fn write_tag(&mut self, field: u32, wire: WireType) -> Result<()> {
        if field < 1 || field > MAX_FIELD_NUMBER {
            return Err(Error::FieldNumber(field));
        }
        self.enc.write_varint32(field << 3 | wire as u32);
        Ok(())
    }

    /// Writes an `int32` field
    pub fn write_int32(&mut self, field: u32, v: i32) -> Result<()> {
        self.write_tag(field, WireType::Varint)?;
        self.enc.write_int32(v);
        Ok(())
    }

    /// Writes an `int64` field
    pub fn write_int64(&mut self, field: u32, v: i64) -> Result<()> {
        self.write_tag(field, WireType::Varint)?;
        self.enc.write_int64(v);
        Ok(())
    }

    /// Writes a `uint32` field
    pub fn write_uint32(&mut self, field: u32, v: u32) -> Result<()> {
        self.write_tag(field, WireType::Varint)?;
        self.enc.write_varint32(v);
        Ok(())
    }

    /// Writes a `uint64` field
    ///
    /// Values of `2^63` and above are out of range; the upper bound matches
    /// the wire partner this envelope format originated with.
    pub fn write_uint64(&mut self, field: u32, v: u64) -> Result<()> {
        if v >> 63 != 0 {
            return Err(Error::OutOfRange("uint64"));
        }
        self.write_tag(field, WireType::Varint)?;
        self.enc.write_varint(v);
        Ok(())
    }

    /// Writes a `sint32` field, zigzag folded
    pub fn write_sint32(&mut self, field: u32, v: i32) -> Result<()> {
        self.write_tag(field, WireType::Varint)?;
        self.enc.write_sint32(v);
        Ok(())
    }

    /// Writes a `sint64` field, zigzag folded
    pub fn write_sint64(&mut self, field: u32, v: i64) -> Result<()> {
        self.write_tag(field, WireType::Varint)?;
        self.enc.write_sint64(v);
        Ok(())
    }

    /// Writes a `bool` field
    pub fn write_bool(&mut self, field: u32, v: bool) -> Result<()> {
        self.write_tag(field, WireType::Varint)?;
        self.enc.write_bool(v);
        Ok(())
    }

    /// Writes an `enum` field from its variant number
    pub fn write_enum(&mut self, field: u32, v: i32) -> Result<()> {
        self.write_int32(field, v)
    }

    /// Writes a `fixed32` field
    pub fn write_fixed32(&mut self, field: u32, v: u32) -> Result<()> {
        self.write_tag(field, WireType::Fixed32)?;
        self.enc.write_fixed32(v);
        Ok(())
    }

    /// Writes a `fixed64` field
    pub fn write_fixed64(&mut self, field: u32, v: u64) -> Result<()> {
        self.write_tag(field, WireType::Fixed64)?;
        self.enc.write_fixed64(v);
        Ok(())
    }

    /// Writes an `sfixed32` field
    pub fn write_sfixed32(&mut self, field: u32, v: i32) -> Result<()> {
        self.write_tag(field, WireType::Fixed32)?;
        self.enc.write_fixed32(v as u32);
        Ok(())
    }

    /// Writes an `sfixed64` field
    pub fn write_sfixed64(&mut self, field: u32, v: i64) -> Result<()> {
        self.write_tag(field, WireType::Fixed64)?;
        self.enc.write_fixed64(v as u64);
        Ok(())
    }

    /// Writes a `float` field
    ///
    /// The magnitude must be strictly below `f32::MAX`; infinities and NaN
    /// are out of range.
    pub fn write_float(&mut self, field: u32, v: f32) -> Result<()> {
        if !(v.abs() < f32::MAX) {
            return Err(Error::OutOfRange("float"));
        }
        self.write_tag(field, WireType::Fixed32)?;
        self.enc.write_float(v);
        Ok(())
    }

    /// Writes a `double` field
    ///
    /// The magnitude must be strictly below `f64::MAX`; infinities and NaN
    /// are out of range.
    pub fn write_double(&mut self, field: u32, v: f64) -> Result<()> {
        if !(v.abs() < f64::MAX) {
            return Err(Error::OutOfRange("double"));
        }
        self.write_tag(field, WireType::Fixed64)?;
        self.enc.write_double(v);
        Ok(())
    }

    /// Writes a `string` field
    pub fn write_string(&mut self, field: u32, v: &str) -> Result<()> {
        if v.len() as u64 > MAX_LEN {
            return Err(Error::LengthLimit(v.len() as u64));
        }
        self.write_tag(field, WireType::LengthDelimited)?;
        self.enc.write_varint(v.len() as u64);
        self.enc.write_string(v);
        Ok(())
    }

    /// Writes a `bytes` field
    pub fn write_bytes(&mut self, field: u32, v: &[u8]) -> Result<()> {
        if v.len() as u64 > MAX_LEN {
            return Err(Error::LengthLimit(v.len() as u64));
        }
        self.write_tag(field, WireType::LengthDelimited)?;
        self.enc.write_varint(v.len() as u64);
        self.enc.write_bytes(v);
        Ok(())
    }

    /// Opens a delimited scope, runs `f`, then patches the payload length
    /// in front of whatever `f` wrote
    ///
    /// Scopes nest; each one splices its own length at its own bookmark.
    pub fn write_delimited<F>(&mut self, field: u32, f: F) -> Result<()>
    where
        F: FnOnce(&mut Writer) -> Result<()>,
    {
        self.write_tag(field, WireType::LengthDelimited)?;
        let mark = self.enc.len();
        f(self)?;
        let len = (self.enc.len() - mark) as u64;
        if len > MAX_LEN {
            return Err(Error::LengthLimit(len));
        }
        self.enc.insert_varint(mark, len);
        Ok(())
    }

    /// Writes an embedded message field
    pub fn write_message<M: MessageWrite>(&mut self, field: u32, m: &M) -> Result<()> {
        self.write_delimited(field, |w| m.write_message(w))
    }

    /// Writes one map entry, key as field 1 and value as field 2 of a
    /// delimited sub-message
    pub fn write_map(
        &mut self,
        field: u32,
        key_type: FieldType,
        key: &Value,
        value_type: FieldType,
        value: &Value,
    ) -> Result<()> {
        if !key_type.is_map_key() {
            return Err(Error::MapKeyType(key_type));
        }
        if !value_type.is_map_value() {
            return Err(Error::MapValueType(value_type));
        }
        self.write_delimited(field, |w| {
            w.write_scalar(1, key_type, key)?;
            w.write_scalar(2, value_type, value)
        })
    }

    /// Writes one scalar under the encoding discipline of the declared type
    pub fn write_scalar(&mut self, field: u32, field_type: FieldType, v: &Value) -> Result<()> {
        match (field_type, *v) {
            (FieldType::Double, Value::Double(x)) => self.write_double(field, x),
            (FieldType::Float, Value::Float(x)) => self.write_float(field, x),
            (FieldType::Int64, Value::Int64(x)) => self.write_int64(field, x),
            (FieldType::Uint64, Value::Uint64(x)) => self.write_uint64(field, x),
            (FieldType::Int32, Value::Int32(x)) => self.write_int32(field, x),
            (FieldType::Fixed64, Value::Uint64(x)) => self.write_fixed64(field, x),
            (FieldType::Fixed32, Value::Uint32(x)) => self.write_fixed32(field, x),
            (FieldType::Bool, Value::Bool(x)) => self.write_bool(field, x),
            (FieldType::String, Value::String(x)) => self.write_string(field, x),
            (FieldType::Message, Value::Message(x)) => self.write_bytes(field, x),
            (FieldType::Bytes, Value::Bytes(x)) => self.write_bytes(field, x),
            (FieldType::Uint32, Value::Uint32(x)) => self.write_uint32(field, x),
            (FieldType::Enum, Value::Int32(x)) => self.write_enum(field, x),
            (FieldType::Sfixed32, Value::Int32(x)) => self.write_sfixed32(field, x),
            (FieldType::Sfixed64, Value::Int64(x)) => self.write_sfixed64(field, x),
            (FieldType::Sint32, Value::Int32(x)) => self.write_sint32(field, x),
            (FieldType::Sint64, Value::Int64(x)) => self.write_sint64(field, x),
            (FieldType::Group, _) => Err(Error::Deprecated("group")),
            (t, _) => Err(Error::ValueKind(t)),
        }
    }

    /// Writes a packed repeated field of varint encoded elements
    ///
    /// The total payload length is computed up front from `size`, so no
    /// bookmark is needed. Nothing is written for an empty slice.
    pub fn write_packed<M, F, S>(&mut self, field: u32, v: &[M], mut write: F, size: S) -> Result<()>
    where
        F: FnMut(&mut Encoder, &M),
        S: Fn(&M) -> usize,
    {
        if v.is_empty() {
            return Ok(());
        }
        self.write_tag(field, WireType::LengthDelimited)?;
        let len: usize = v.iter().map(|m| size(m)).sum();
        self.enc.write_varint(len as u64);
        for m in v {
            write(&mut self.enc, m);
        }
        Ok(())
    }

    /// Writes a packed repeated field of fixed width elements
    ///
    /// The payload length is `count * width`, emitted directly.
    pub fn write_packed_fixed<M, F>(&mut self, field: u32, v: &[M], mut write: F) -> Result<()>
    where
        F: FnMut(&mut Encoder, &M),
    {
        if v.is_empty() {
            return Ok(());
        }
        self.write_tag(field, WireType::LengthDelimited)?;
        self.enc.write_varint((v.len() * mem::size_of::<M>()) as u64);
        for m in v {
            write(&mut self.enc, m);
        }
        Ok(())
    }

    /// Writes one streamed message behind its 5-byte big-endian envelope
    ///
    /// The envelope is reserved up front and backfilled once the payload
    /// length is known.
    pub fn write_frame<M: MessageWrite>(&mut self, m: &M) -> Result<()> {
        let mark = self.enc.len();
        self.enc.write_bytes(&[0u8; 5]);
        m.write_message(self)?;
        let len = (self.enc.len() - mark - 5) as u64;
        if len > MAX_FRAME_LEN {
            return Err(Error::LengthLimit(len));
        }
        let mut header = [0u8; 5];
        BE::write_uint(&mut header, len, 5);
        self.enc.patch(mark, &header);
        Ok(())
    }

    /// Writes the zero length envelope terminating a stream
    pub fn write_stream_end(&mut self) {
        self.enc.write_bytes(&[0u8; 5]);
    }
}

/// Serializes a message into a new buffer sized from `get_size`
pub fn serialize_into_vec<M: MessageWrite>(message: &M) -> Result<Vec<u8>> {
    let mut writer = Writer::with_capacity(message.get_size());
    message.write_message(&mut writer)?;
    Ok(writer.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sizeofs::sizeof_int32;

    #[test]
    fn tagged_uint32() {
        let mut w = Writer::new();
        w.write_uint32(1, 150).unwrap();
        assert_eq!(w.as_slice(), [0x08, 0x96, 0x01]);
    }

    #[test]
    fn tagged_string() {
        let mut w = Writer::new();
        w.write_string(2, "testing").unwrap();
        assert_eq!(
            w.as_slice(),
            [0x12, 0x07, 0x74, 0x65, 0x73, 0x74, 0x69, 0x6E, 0x67]
        );
    }

    #[test]
    fn tagged_sint32() {
        let mut w = Writer::new();
        w.write_sint32(3, -1).unwrap();
        assert_eq!(w.as_slice(), [0x18, 0x01]);
    }

    #[test]
    fn tagged_fixed32() {
        let mut w = Writer::new();
        w.write_fixed32(4, 0xDEAD_BEEF).unwrap();
        assert_eq!(w.as_slice(), [0x25, 0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn packed_int32() {
        let mut w = Writer::new();
        w.write_packed(
            5,
            &[3, 270, 86942],
            |e, m| e.write_int32(*m),
            |m| sizeof_int32(*m),
        )
        .unwrap();
        assert_eq!(
            w.as_slice(),
            [0x2A, 0x06, 0x03, 0x8E, 0x02, 0x9E, 0xA7, 0x05]
        );
    }

    #[test]
    fn empty_packed_emits_nothing() {
        let mut w = Writer::new();
        w.write_packed::<i32, _, _>(5, &[], |e, m| e.write_int32(*m), |m| sizeof_int32(*m))
            .unwrap();
        w.write_packed_fixed::<u32, _>(6, &[], |e, m| e.write_fixed32(*m))
            .unwrap();
        assert!(w.as_slice().is_empty());
    }

    #[test]
    fn packed_fixed_length_is_count_times_width() {
        let mut w = Writer::new();
        w.write_packed_fixed(1, &[1.0f32, 2.0], |e, m| e.write_float(*m))
            .unwrap();
        assert_eq!(
            w.as_slice(),
            [0x0A, 0x08, 0x00, 0x00, 0x80, 0x3F, 0x00, 0x00, 0x00, 0x40]
        );
    }

    #[test]
    fn field_number_must_be_positive() {
        let mut w = Writer::new();
        assert!(matches!(
            w.write_uint32(0, 1),
            Err(Error::FieldNumber(0))
        ));
        assert!(matches!(
            w.write_uint32(536_870_912, 1),
            Err(Error::FieldNumber(_))
        ));
        w.write_uint32(536_870_911, 1).unwrap();
    }

    #[test]
    fn uint64_capped_below_two_to_the_63() {
        let mut w = Writer::new();
        w.write_uint64(1, (1 << 63) - 1).unwrap();
        assert!(matches!(
            w.write_uint64(1, 1 << 63),
            Err(Error::OutOfRange("uint64"))
        ));
    }

    #[test]
    fn float_bound_is_strict() {
        let mut w = Writer::new();
        assert!(matches!(
            w.write_float(1, f32::MAX),
            Err(Error::OutOfRange("float"))
        ));
        assert!(matches!(
            w.write_float(1, f32::INFINITY),
            Err(Error::OutOfRange("float"))
        ));
        assert!(matches!(
            w.write_float(1, f32::NAN),
            Err(Error::OutOfRange("float"))
        ));
        w.write_float(1, f32::MAX / 2.0).unwrap();
        assert!(matches!(
            w.write_double(1, f64::MAX),
            Err(Error::OutOfRange("double"))
        ));
        w.write_double(1, f64::MAX / 2.0).unwrap();
    }

    #[test]
    fn delimited_scopes_nest() {
        let mut w = Writer::new();
        w.write_delimited(1, |w| {
            w.write_uint32(1, 150)?;
            w.write_delimited(2, |w| w.write_uint32(1, 1))
        })
        .unwrap();
        assert_eq!(
            w.as_slice(),
            [0x0A, 0x07, 0x08, 0x96, 0x01, 0x12, 0x02, 0x08, 0x01]
        );
    }

    #[test]
    fn map_entry_framing() {
        let mut w = Writer::new();
        w.write_map(
            1,
            FieldType::Int32,
            &Value::Int32(2),
            FieldType::String,
            &Value::String("abc"),
        )
        .unwrap();
        assert_eq!(
            w.as_slice(),
            [0x0A, 0x07, 0x08, 0x02, 0x12, 0x03, 0x61, 0x62, 0x63]
        );
    }

    #[test]
    fn map_rejects_unsupported_types() {
        let mut w = Writer::new();
        assert!(matches!(
            w.write_map(
                1,
                FieldType::Double,
                &Value::Double(0.0),
                FieldType::Int32,
                &Value::Int32(0),
            ),
            Err(Error::MapKeyType(FieldType::Double))
        ));
    }

    #[test]
    fn scalar_value_must_match_declared_type() {
        let mut w = Writer::new();
        assert!(matches!(
            w.write_scalar(1, FieldType::Int32, &Value::String("no")),
            Err(Error::ValueKind(FieldType::Int32))
        ));
        assert!(matches!(
            w.write_scalar(1, FieldType::Group, &Value::Int32(0)),
            Err(Error::Deprecated("group"))
        ));
    }

    #[test]
    fn stream_frame_reserves_and_backfills() {
        struct Sample;
        impl MessageWrite for Sample {
            fn write_message(&self, w: &mut Writer) -> Result<()> {
                w.write_uint32(1, 150)
            }
        }
        let mut w = Writer::new();
        w.write_frame(&Sample).unwrap();
        w.write_frame(&Sample).unwrap();
        assert_eq!(
            w.as_slice(),
            [
                0x00, 0x00, 0x00, 0x00, 0x03, 0x08, 0x96, 0x01, //
                0x00, 0x00, 0x00, 0x00, 0x03, 0x08, 0x96, 0x01,
            ]
        );
        w.write_stream_end();
        assert_eq!(w.as_slice().len(), 21);
    }
}
