//! A module with the wire type and field type enums shared by reader and writer

use crate::errors::{Error, Result};

/// The 3-bit shape tag carried by every field tag
///
/// `StartGroup` (3) and `EndGroup` (4) are deprecated and rejected whenever
/// they are seen on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    /// Base-128 variable length integer
    Varint = 0,
    /// 8 bytes, little-endian
    Fixed64 = 1,
    /// Length prefixed payload
    LengthDelimited = 2,
    /// 4 bytes, little-endian
    Fixed32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(v: u8) -> Result<WireType> {
        match v {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            3 | 4 => Err(Error::Deprecated("group")),
            v => Err(Error::UnknownWireType(v)),
        }
    }
}

/// The logical type of a field as declared in a .proto file
///
/// The discriminants are the type codes used by the protobuf descriptor
/// format. `Group` is deprecated and every use of it is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `double`, 64-bit IEEE-754
    Double = 1,
    /// `float`, 32-bit IEEE-754
    Float = 2,
    /// `int64`, varint with sign extension
    Int64 = 3,
    /// `uint64`, plain varint
    Uint64 = 4,
    /// `int32`, varint with sign extension
    Int32 = 5,
    /// `fixed64`, 8 bytes little-endian
    Fixed64 = 6,
    /// `fixed32`, 4 bytes little-endian
    Fixed32 = 7,
    /// `bool`, single byte varint
    Bool = 8,
    /// `string`, length delimited utf-8
    String = 9,
    /// `group`, deprecated
    Group = 10,
    /// embedded message, length delimited
    Message = 11,
    /// `bytes`, length delimited
    Bytes = 12,
    /// `uint32`, plain varint
    Uint32 = 13,
    /// `enum`, varint of the variant number
    Enum = 14,
    /// `sfixed32`, 4 bytes little-endian
    Sfixed32 = 15,
    /// `sfixed64`, 8 bytes little-endian
    Sfixed64 = 16,
    /// `sint32`, zigzag varint
    Sint32 = 17,
    /// `sint64`, zigzag varint
    Sint64 = 18,
}

impl FieldType {
    /// Gives the wire type a field of this type is encoded with
    pub fn wire_type(self) -> Result<WireType> {
        match self {
            FieldType::Int64
            | FieldType::Uint64
            | FieldType::Int32
            | FieldType::Bool
            | FieldType::Uint32
            | FieldType::Enum
            | FieldType::Sint32
            | FieldType::Sint64 => Ok(WireType::Varint),
            FieldType::Double | FieldType::Fixed64 | FieldType::Sfixed64 => Ok(WireType::Fixed64),
            FieldType::Float | FieldType::Fixed32 | FieldType::Sfixed32 => Ok(WireType::Fixed32),
            FieldType::String | FieldType::Message | FieldType::Bytes => {
                Ok(WireType::LengthDelimited)
            }
            FieldType::Group => Err(Error::Deprecated("group")),
        }
    }

    /// Returns whether this type can be the key of a map field
    ///
    /// Any scalar but `Double`, `Float` and `Bytes` qualifies.
    pub fn is_map_key(self) -> bool {
        !matches!(
            self,
            FieldType::Double
                | FieldType::Float
                | FieldType::Bytes
                | FieldType::Group
                | FieldType::Message
        )
    }

    /// Returns whether this type can be the value of a map field
    pub fn is_map_value(self) -> bool {
        self != FieldType::Group
    }

    /// Gives the default value decoded for an absent map key or value
    pub fn default_value(self) -> Result<Value<'static>> {
        let v = match self {
            FieldType::Double => Value::Double(0.0),
            FieldType::Float => Value::Float(0.0),
            FieldType::Int32 | FieldType::Sfixed32 | FieldType::Sint32 | FieldType::Enum => {
                Value::Int32(0)
            }
            FieldType::Int64 | FieldType::Sfixed64 | FieldType::Sint64 => Value::Int64(0),
            FieldType::Uint32 | FieldType::Fixed32 => Value::Uint32(0),
            FieldType::Uint64 | FieldType::Fixed64 => Value::Uint64(0),
            FieldType::Bool => Value::Bool(false),
            FieldType::String => Value::String(""),
            FieldType::Bytes => Value::Bytes(b""),
            FieldType::Message => Value::Message(b""),
            FieldType::Group => return Err(Error::Deprecated("group")),
        };
        Ok(v)
    }
}

/// A decoded scalar, borrowed from the input buffer where possible
///
/// The variant is the numeric kind of the value; the declared [`FieldType`]
/// decides the encoding discipline. `Message` carries the raw bytes of an
/// embedded message still to be deserialized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    /// 64-bit IEEE-754
    Double(f64),
    /// 32-bit IEEE-754
    Float(f32),
    /// signed 32-bit integer
    Int32(i32),
    /// signed 64-bit integer
    Int64(i64),
    /// unsigned 32-bit integer
    Uint32(u32),
    /// unsigned 64-bit integer
    Uint64(u64),
    /// boolean
    Bool(bool),
    /// utf-8 text
    String(&'a str),
    /// opaque byte sequence
    Bytes(&'a [u8]),
    /// raw bytes of an embedded message
    Message(&'a [u8]),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_type_from_tag_bits() {
        assert_eq!(WireType::try_from(0).unwrap(), WireType::Varint);
        assert_eq!(WireType::try_from(1).unwrap(), WireType::Fixed64);
        assert_eq!(WireType::try_from(2).unwrap(), WireType::LengthDelimited);
        assert_eq!(WireType::try_from(5).unwrap(), WireType::Fixed32);
    }

    #[test]
    fn group_wire_types_are_deprecated() {
        assert!(matches!(WireType::try_from(3), Err(Error::Deprecated(_))));
        assert!(matches!(WireType::try_from(4), Err(Error::Deprecated(_))));
        assert!(matches!(
            WireType::try_from(6),
            Err(Error::UnknownWireType(6))
        ));
        assert!(matches!(
            WireType::try_from(7),
            Err(Error::UnknownWireType(7))
        ));
    }

    #[test]
    fn map_key_validity() {
        assert!(FieldType::Int32.is_map_key());
        assert!(FieldType::String.is_map_key());
        assert!(FieldType::Bool.is_map_key());
        assert!(FieldType::Sint64.is_map_key());
        assert!(!FieldType::Double.is_map_key());
        assert!(!FieldType::Float.is_map_key());
        assert!(!FieldType::Bytes.is_map_key());
        assert!(!FieldType::Message.is_map_key());
    }

    #[test]
    fn map_value_validity() {
        assert!(FieldType::Message.is_map_value());
        assert!(FieldType::Bytes.is_map_value());
        assert!(!FieldType::Group.is_map_value());
    }
}
