//! Primitive field types and their wire properties.

use crate::value::{MapKey, Value};
use crate::wire::WireType;

/// A protobuf primitive (non-message, non-enum) field type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(missing_docs)] // Variants mirror the protobuf type names one-to-one.
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Uint32,
    Sint32,
    Fixed32,
    Sfixed32,
    Int64,
    Uint64,
    Sint64,
    Fixed64,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarType {
    /// Parse a declared type name, `None` for symbolic (message/enum) names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "double" => Some(ScalarType::Double),
            "float" => Some(ScalarType::Float),
            "int32" => Some(ScalarType::Int32),
            "uint32" => Some(ScalarType::Uint32),
            "sint32" => Some(ScalarType::Sint32),
            "fixed32" => Some(ScalarType::Fixed32),
            "sfixed32" => Some(ScalarType::Sfixed32),
            "int64" => Some(ScalarType::Int64),
            "uint64" => Some(ScalarType::Uint64),
            "sint64" => Some(ScalarType::Sint64),
            "fixed64" => Some(ScalarType::Fixed64),
            "sfixed64" => Some(ScalarType::Sfixed64),
            "bool" => Some(ScalarType::Bool),
            "string" => Some(ScalarType::String),
            "bytes" => Some(ScalarType::Bytes),
            _ => None,
        }
    }

    /// The declared name of this type.
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Double => "double",
            ScalarType::Float => "float",
            ScalarType::Int32 => "int32",
            ScalarType::Uint32 => "uint32",
            ScalarType::Sint32 => "sint32",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Sfixed32 => "sfixed32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint64 => "uint64",
            ScalarType::Sint64 => "sint64",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Sfixed64 => "sfixed64",
            ScalarType::Bool => "bool",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
        }
    }

    /// The wire type this primitive is encoded with.
    pub fn basic_wire_type(self) -> WireType {
        match self {
            ScalarType::Int32
            | ScalarType::Uint32
            | ScalarType::Sint32
            | ScalarType::Int64
            | ScalarType::Uint64
            | ScalarType::Sint64
            | ScalarType::Bool => WireType::Varint,
            ScalarType::Fixed64 | ScalarType::Sfixed64 | ScalarType::Double => WireType::I64,
            ScalarType::String | ScalarType::Bytes => WireType::Len,
            ScalarType::Fixed32 | ScalarType::Sfixed32 | ScalarType::Float => WireType::I32,
        }
    }

    /// Whether a repeated field of this type may use the packed encoding.
    ///
    /// All primitives except `string` and `bytes` are packable.
    pub fn packable(self) -> bool {
        !matches!(self, ScalarType::String | ScalarType::Bytes)
    }

    /// Whether this type is legal as a map key.
    ///
    /// Per the protobuf spec: integral types, bool, and string. NOT valid:
    /// float, double, bytes.
    pub fn valid_map_key(self) -> bool {
        !matches!(
            self,
            ScalarType::Double | ScalarType::Float | ScalarType::Bytes
        )
    }

    /// The zero value used when a map entry omits its value sub-field.
    pub fn zero_value(self) -> Value {
        match self {
            ScalarType::Double => Value::Double(0.0),
            ScalarType::Float => Value::Float(0.0),
            ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => Value::Int32(0),
            ScalarType::Uint32 | ScalarType::Fixed32 => Value::Uint32(0),
            ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => Value::Int64(0),
            ScalarType::Uint64 | ScalarType::Fixed64 => Value::Uint64(0),
            ScalarType::Bool => Value::Bool(false),
            ScalarType::String => Value::String(String::new()),
            ScalarType::Bytes => Value::Bytes(bytes::Bytes::new()),
        }
    }

    /// The zero key used when a map entry omits its key sub-field.
    ///
    /// Only meaningful for types where [`ScalarType::valid_map_key`] holds.
    pub fn zero_key(self) -> MapKey {
        match self {
            ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => MapKey::Int32(0),
            ScalarType::Uint32 | ScalarType::Fixed32 => MapKey::Uint32(0),
            ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => MapKey::Int64(0),
            ScalarType::Uint64 | ScalarType::Fixed64 => MapKey::Uint64(0),
            ScalarType::Bool => MapKey::Bool(false),
            _ => MapKey::String(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_roundtrip() {
        for name in [
            "double", "float", "int32", "uint32", "sint32", "fixed32", "sfixed32", "int64",
            "uint64", "sint64", "fixed64", "sfixed64", "bool", "string", "bytes",
        ] {
            let ty = ScalarType::from_name(name).unwrap();
            assert_eq!(ty.name(), name);
        }
        assert_eq!(ScalarType::from_name("Message"), None);
        assert_eq!(ScalarType::from_name("int"), None);
    }

    #[test]
    fn test_wire_types() {
        assert_eq!(ScalarType::Int32.basic_wire_type(), WireType::Varint);
        assert_eq!(ScalarType::Fixed64.basic_wire_type(), WireType::I64);
        assert_eq!(ScalarType::String.basic_wire_type(), WireType::Len);
        assert_eq!(ScalarType::Float.basic_wire_type(), WireType::I32);
    }

    #[test]
    fn test_packable_and_keys() {
        assert!(ScalarType::Int32.packable());
        assert!(ScalarType::Double.packable());
        assert!(!ScalarType::String.packable());
        assert!(!ScalarType::Bytes.packable());

        assert!(ScalarType::Uint64.valid_map_key());
        assert!(ScalarType::Bool.valid_map_key());
        assert!(ScalarType::String.valid_map_key());
        assert!(!ScalarType::Double.valid_map_key());
        assert!(!ScalarType::Bytes.valid_map_key());
    }
}
