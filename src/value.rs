//! Dynamic values produced by schema-driven decoding.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::schema::{Root, TypeIndex};

/// Key of a decoded map entry.
///
/// Protobuf map keys are restricted to integral types, bool, and string.
/// 64-bit keys are held natively rather than stringified.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum MapKey {
    /// `int32`, `sint32`, `sfixed32` keys.
    Int32(i32),
    /// `int64`, `sint64`, `sfixed64` keys.
    Int64(i64),
    /// `uint32`, `fixed32` keys.
    Uint32(u32),
    /// `uint64`, `fixed64` keys.
    Uint64(u64),
    /// `bool` keys.
    Bool(bool),
    /// `string` keys.
    String(String),
}

/// A single decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `int32`, `sint32`, `sfixed32`, and enum values (unknown enum numbers
    /// are preserved).
    Int32(i32),
    /// `int64`, `sint64`, `sfixed64`.
    Int64(i64),
    /// `uint32`, `fixed32`.
    Uint32(u32),
    /// `uint64`, `fixed64`.
    Uint64(u64),
    /// `bool`.
    Bool(bool),
    /// `float`.
    Float(f32),
    /// `double`.
    Double(f64),
    /// `string`.
    String(String),
    /// `bytes`, copied out of the input buffer.
    Bytes(Bytes),
    /// A nested message or group.
    Message(Box<MessageValue>),
    /// A repeated field.
    List(Vec<Value>),
    /// A map field.
    Map(BTreeMap<MapKey, Value>),
    /// An absent message value inside a map entry.
    Null,
}

impl Value {
    /// The contained `i32`, if this is an `Int32`.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// The contained string slice, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// The contained list, if this is a `List`.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    /// The contained map, if this is a `Map`.
    pub fn as_map(&self) -> Option<&BTreeMap<MapKey, Value>> {
        match self {
            Value::Map(v) => Some(v),
            _ => None,
        }
    }

    /// The contained message, if this is a `Message`.
    pub fn as_message(&self) -> Option<&MessageValue> {
        match self {
            Value::Message(v) => Some(v),
            _ => None,
        }
    }
}

/// A decoded message instance.
///
/// Fields are keyed by field id; [`MessageValue::get`] resolves a field name
/// through the schema. Values are owned by the instance, never borrowed from
/// the input buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageValue {
    /// Registry index of this message's type.
    pub type_index: TypeIndex,
    /// Decoded fields by field id. Absent ids were not present on the wire.
    pub fields: BTreeMap<u32, Value>,
}

impl MessageValue {
    /// An empty instance of the given type.
    pub fn new(type_index: TypeIndex) -> Self {
        MessageValue {
            type_index,
            fields: BTreeMap::new(),
        }
    }

    /// Value of the field with the given id, if present.
    pub fn get_by_id(&self, id: u32) -> Option<&Value> {
        self.fields.get(&id)
    }

    /// Value of the named field, resolved through the schema.
    pub fn get<'v>(&'v self, root: &Root, name: &str) -> Option<&'v Value> {
        let ty = root.registry_type(self.type_index)?;
        let field = ty.field_by_name(name)?;
        self.fields.get(&field.id)
    }
}
