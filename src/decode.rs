//! Schema-driven message decoding.
//!
//! [`Decoder::new`] compiles every resolved message type into a
//! [`DecodePlan`]: a dispatch table mapping each accepted wire key to a field
//! action. One generic loop interprets the plans; nested types are referenced
//! through their registry index, so mutually-recursive and self-referential
//! schemas need no special casing.

use std::collections::{BTreeMap, HashMap};

use smallvec::SmallVec;
use tracing::trace;

use crate::error::{Error, MalformedKind, Result};
use crate::reader::Reader;
use crate::schema::{ResolvedType, Root, ScalarType, Type, TypeIndex};
use crate::value::{MapKey, MessageValue, Value};
use crate::wire::{make_key, split_key, WireType};

/// Maximum message/group nesting the decoder will follow.
///
/// Hostile input can nest length prefixes or group markers arbitrarily deep;
/// without a cap the recursive decode would exhaust the stack.
const MAX_DECODE_DEPTH: usize = 100;

/// How to decode the value half of a map entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MapValue {
    Scalar(ScalarType),
    Message(TypeIndex),
}

/// One accepted wire key of a message type.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Scalar { id: u32, scalar: ScalarType },
    RepeatedScalar { id: u32, scalar: ScalarType },
    PackedScalar { id: u32, scalar: ScalarType },
    Message { id: u32, ty: TypeIndex },
    RepeatedMessage { id: u32, ty: TypeIndex },
    Group { id: u32, ty: TypeIndex },
    RepeatedGroup { id: u32, ty: TypeIndex },
    Map { id: u32, key: ScalarType, value: MapValue },
}

/// Compiled dispatch table for one message type.
#[derive(Debug)]
struct DecodePlan {
    /// Fully-qualified type name, for diagnostics.
    name: String,
    /// True for group-typed messages: instances end at an end-group tag.
    group: bool,
    /// Wire key → action.
    tags: HashMap<u32, Action>,
    /// Required fields checked after the decode loop: (id, name).
    required: Vec<(u32, String)>,
    /// Field id → ids of the other members of its oneof.
    oneof_siblings: HashMap<u32, SmallVec<[u32; 4]>>,
}

/// A decoder over a resolved schema graph.
///
/// Building is a pure function of the schema; decoding is a pure function of
/// the plan and the reader, so one decoder may be shared across threads once
/// the root is in its post-resolve phase.
#[derive(Debug)]
pub struct Decoder<'r> {
    root: &'r Root,
    plans: Vec<DecodePlan>,
}

impl<'r> Decoder<'r> {
    /// Compile decode plans for every registered message type.
    ///
    /// Fails with `UnresolvedReference` when the root has not been resolved.
    pub fn new(root: &'r Root) -> Result<Self> {
        let mut plans = Vec::with_capacity(root.registry_len());
        for slot in 0..root.registry_len() {
            let index = TypeIndex(slot);
            let node = root
                .registry_node(index)
                .expect("registry slots are contiguous");
            let plan = build_plan(root, node)?;
            trace!(ty = %plan.name, tags = plan.tags.len(), "compiled decode plan");
            plans.push(plan);
        }
        Ok(Decoder { root, plans })
    }

    /// The schema this decoder was built from.
    pub fn root(&self) -> &Root {
        self.root
    }

    /// Decode one message of the named type from `buf`, consuming it fully.
    pub fn decode(&self, type_path: &str, buf: &[u8]) -> Result<MessageValue> {
        let index = self
            .root
            .type_index(type_path)
            .ok_or_else(|| Error::UnresolvedReference {
                name: type_path.to_string(),
                scope: String::new(),
            })?;
        let mut reader = Reader::new(buf);
        self.decode_from(index, &mut reader, None)
    }

    /// Decode one message instance at the reader's cursor.
    ///
    /// With no `limit` the decoder reads to the end of the buffer; otherwise
    /// it reads exactly `limit` bytes past the cursor. Group-typed messages
    /// instead read until their end-group tag.
    pub fn decode_from(
        &self,
        index: TypeIndex,
        reader: &mut Reader<'_>,
        limit: Option<usize>,
    ) -> Result<MessageValue> {
        let end = match limit {
            None => reader.len(),
            Some(limit) => reader
                .pos()
                .checked_add(limit)
                .filter(|&end| end <= reader.len())
                .ok_or_else(|| Error::truncated(reader.len()))?,
        };
        self.decode_message(index, reader, end, 0)
    }

    fn decode_message(
        &self,
        index: TypeIndex,
        reader: &mut Reader<'_>,
        end: usize,
        depth: usize,
    ) -> Result<MessageValue> {
        if depth > MAX_DECODE_DEPTH {
            return Err(Error::malformed(reader.pos(), MalformedKind::NestingTooDeep));
        }
        let plan = &self.plans[index.0];
        let mut msg = MessageValue::new(index);

        loop {
            if reader.pos() >= end {
                if plan.group {
                    // A group must see its end tag before the limit.
                    return Err(Error::truncated(reader.pos()));
                }
                break;
            }

            let key_offset = reader.pos();
            let key = reader.uint32()?;
            let (id, wire_type) = split_key(key);
            if plan.group && wire_type == WireType::EGroup.into_val() {
                // End-group consumed; the id is not checked, matching the
                // wire contract that only the low three bits terminate.
                break;
            }
            if id == 0 {
                return Err(Error::malformed(key_offset, MalformedKind::TagOutOfRange(0)));
            }

            match plan.tags.get(&key) {
                Some(action) => self.apply(action, plan, reader, end, depth, &mut msg)?,
                None => reader.skip_type(id, wire_type)?,
            }
            if reader.pos() > end {
                return Err(Error::truncated(reader.pos()));
            }
        }

        for (id, name) in &plan.required {
            if !msg.fields.contains_key(id) {
                return Err(Error::missing_required(name, msg));
            }
        }
        Ok(msg)
    }

    fn apply(
        &self,
        action: &Action,
        plan: &DecodePlan,
        reader: &mut Reader<'_>,
        end: usize,
        depth: usize,
        msg: &mut MessageValue,
    ) -> Result<()> {
        match action {
            Action::Scalar { id, scalar } => {
                let value = read_scalar(*scalar, reader)?;
                set_field(plan, msg, *id, value);
            }
            Action::RepeatedScalar { id, scalar } => {
                let value = read_scalar(*scalar, reader)?;
                push_item(msg, *id, value);
            }
            Action::PackedScalar { id, scalar } => {
                let sub_end = self.delimited_end(reader, end)?;
                // The tag alone materializes the (possibly empty) list.
                ensure_list(msg, *id);
                while reader.pos() < sub_end {
                    let value = read_scalar(*scalar, reader)?;
                    if reader.pos() > sub_end {
                        return Err(Error::truncated(reader.pos()));
                    }
                    push_item(msg, *id, value);
                }
            }
            Action::Message { id, ty } => {
                let sub_end = self.delimited_end(reader, end)?;
                let nested = self.decode_message(*ty, reader, sub_end, depth + 1)?;
                set_field(plan, msg, *id, Value::Message(Box::new(nested)));
            }
            Action::RepeatedMessage { id, ty } => {
                let sub_end = self.delimited_end(reader, end)?;
                let nested = self.decode_message(*ty, reader, sub_end, depth + 1)?;
                push_item(msg, *id, Value::Message(Box::new(nested)));
            }
            Action::Group { id, ty } => {
                let nested = self.decode_message(*ty, reader, end, depth + 1)?;
                set_field(plan, msg, *id, Value::Message(Box::new(nested)));
            }
            Action::RepeatedGroup { id, ty } => {
                let nested = self.decode_message(*ty, reader, end, depth + 1)?;
                push_item(msg, *id, Value::Message(Box::new(nested)));
            }
            Action::Map { id, key, value } => {
                let sub_end = self.delimited_end(reader, end)?;
                let entry = self.decode_map_entry(*key, *value, reader, sub_end, depth)?;
                let slot = msg
                    .fields
                    .entry(*id)
                    .or_insert_with(|| Value::Map(BTreeMap::new()));
                if let Value::Map(map) = slot {
                    // Duplicate keys follow last-one-wins merge semantics.
                    map.insert(entry.0, entry.1);
                }
            }
        }
        Ok(())
    }

    /// Read a length prefix and bound it by the parent limit.
    fn delimited_end(&self, reader: &mut Reader<'_>, end: usize) -> Result<usize> {
        let len = reader.read_len()?;
        let sub_end = reader.pos() + len;
        if sub_end > end {
            return Err(Error::truncated(reader.pos()));
        }
        Ok(sub_end)
    }

    /// Decode one map entry: a sub-message with virtual fields 1 (key) and
    /// 2 (value). Missing halves fall back to the type defaults.
    fn decode_map_entry(
        &self,
        key_type: ScalarType,
        value_type: MapValue,
        reader: &mut Reader<'_>,
        sub_end: usize,
        depth: usize,
    ) -> Result<(MapKey, Value)> {
        let mut key = None;
        let mut value = None;

        while reader.pos() < sub_end {
            let tag_offset = reader.pos();
            let entry_key = reader.uint32()?;
            let (field, wire_type) = split_key(entry_key);
            match field {
                1 => {
                    expect_wire(tag_offset, wire_type, key_type.basic_wire_type())?;
                    key = Some(read_map_key(key_type, reader)?);
                }
                2 => match value_type {
                    MapValue::Scalar(scalar) => {
                        expect_wire(tag_offset, wire_type, scalar.basic_wire_type())?;
                        value = Some(read_scalar(scalar, reader)?);
                    }
                    MapValue::Message(ty) => {
                        expect_wire(tag_offset, wire_type, WireType::Len)?;
                        let inner_end = self.delimited_end(reader, sub_end)?;
                        let nested = self.decode_message(ty, reader, inner_end, depth + 1)?;
                        value = Some(Value::Message(Box::new(nested)));
                    }
                },
                _ => reader.skip_type(field, wire_type)?,
            }
            if reader.pos() > sub_end {
                return Err(Error::truncated(reader.pos()));
            }
        }

        let key = key.unwrap_or_else(|| key_type.zero_key());
        let value = value.unwrap_or_else(|| match value_type {
            MapValue::Scalar(scalar) => scalar.zero_value(),
            MapValue::Message(_) => Value::Null,
        });
        Ok((key, value))
    }
}

fn expect_wire(offset: usize, actual: u8, expected: WireType) -> Result<()> {
    if actual != expected.into_val() {
        return Err(Error::malformed(
            offset,
            MalformedKind::InvalidWireType(actual),
        ));
    }
    Ok(())
}

/// Assign a singular field, clearing any previously-set oneof siblings.
fn set_field(plan: &DecodePlan, msg: &mut MessageValue, id: u32, value: Value) {
    if let Some(siblings) = plan.oneof_siblings.get(&id) {
        for sibling in siblings {
            msg.fields.remove(sibling);
        }
    }
    msg.fields.insert(id, value);
}

fn ensure_list(msg: &mut MessageValue, id: u32) {
    msg.fields
        .entry(id)
        .or_insert_with(|| Value::List(Vec::new()));
}

fn push_item(msg: &mut MessageValue, id: u32, item: Value) {
    let slot = msg
        .fields
        .entry(id)
        .or_insert_with(|| Value::List(Vec::new()));
    if let Value::List(list) = slot {
        list.push(item);
    }
}

fn read_scalar(scalar: ScalarType, reader: &mut Reader<'_>) -> Result<Value> {
    Ok(match scalar {
        ScalarType::Double => Value::Double(reader.double()?),
        ScalarType::Float => Value::Float(reader.float()?),
        ScalarType::Int32 => Value::Int32(reader.int32()?),
        ScalarType::Uint32 => Value::Uint32(reader.uint32()?),
        ScalarType::Sint32 => Value::Int32(reader.sint32()?),
        ScalarType::Fixed32 => Value::Uint32(reader.fixed32()?),
        ScalarType::Sfixed32 => Value::Int32(reader.sfixed32()?),
        ScalarType::Int64 => Value::Int64(reader.int64()?),
        ScalarType::Uint64 => Value::Uint64(reader.uint64()?),
        ScalarType::Sint64 => Value::Int64(reader.sint64()?),
        ScalarType::Fixed64 => Value::Uint64(reader.fixed64()?),
        ScalarType::Sfixed64 => Value::Int64(reader.sfixed64()?),
        ScalarType::Bool => Value::Bool(reader.read_bool()?),
        ScalarType::String => Value::String(reader.string()?),
        ScalarType::Bytes => Value::Bytes(reader.bytes()?),
    })
}

fn read_map_key(scalar: ScalarType, reader: &mut Reader<'_>) -> Result<MapKey> {
    Ok(match scalar {
        ScalarType::Int32 => MapKey::Int32(reader.int32()?),
        ScalarType::Sint32 => MapKey::Int32(reader.sint32()?),
        ScalarType::Sfixed32 => MapKey::Int32(reader.sfixed32()?),
        ScalarType::Uint32 => MapKey::Uint32(reader.uint32()?),
        ScalarType::Fixed32 => MapKey::Uint32(reader.fixed32()?),
        ScalarType::Int64 => MapKey::Int64(reader.int64()?),
        ScalarType::Sint64 => MapKey::Int64(reader.sint64()?),
        ScalarType::Sfixed64 => MapKey::Int64(reader.sfixed64()?),
        ScalarType::Uint64 => MapKey::Uint64(reader.uint64()?),
        ScalarType::Fixed64 => MapKey::Uint64(reader.fixed64()?),
        ScalarType::Bool => MapKey::Bool(reader.read_bool()?),
        ScalarType::String => MapKey::String(reader.string()?),
        // Resolution rejects float/double/bytes keys.
        ScalarType::Double | ScalarType::Float | ScalarType::Bytes => {
            unreachable!("map key type validated at resolve")
        }
    })
}

/// Compile the dispatch table for one message type.
fn build_plan(root: &Root, node: crate::schema::NodeId) -> Result<DecodePlan> {
    let name = root.full_name(node);
    let ty = root.message(node).expect("registry holds message nodes");

    let mut tags = HashMap::new();
    let mut required = Vec::new();
    for field in &ty.fields {
        if field.is_required() {
            required.push((field.id, field.name.clone()));
        }

        if field.is_map() {
            let key = field
                .key_scalar
                .ok_or_else(|| unresolved(field, &name))?;
            let value = match field.resolved {
                ResolvedType::Scalar(scalar) => MapValue::Scalar(scalar),
                ResolvedType::Enum(_) => MapValue::Scalar(ScalarType::Int32),
                ResolvedType::Message(target) => {
                    MapValue::Message(index_of(root.message(target), field, &name)?)
                }
                ResolvedType::Unresolved => return Err(unresolved(field, &name)),
            };
            tags.insert(
                make_key(field.id, WireType::Len),
                Action::Map {
                    id: field.id,
                    key,
                    value,
                },
            );
            continue;
        }

        match field.resolved {
            ResolvedType::Unresolved => return Err(unresolved(field, &name)),
            ResolvedType::Scalar(_) | ResolvedType::Enum(_) => {
                // Enums travel as int32; unknown members are preserved.
                let scalar = match field.resolved {
                    ResolvedType::Scalar(scalar) => scalar,
                    _ => ScalarType::Int32,
                };
                let basic = make_key(field.id, scalar.basic_wire_type());
                if field.is_repeated() {
                    tags.insert(
                        basic,
                        Action::RepeatedScalar {
                            id: field.id,
                            scalar,
                        },
                    );
                    // Packable primitives accept the packed form regardless
                    // of what the schema advertised.
                    if scalar.packable() {
                        tags.insert(
                            make_key(field.id, WireType::Len),
                            Action::PackedScalar {
                                id: field.id,
                                scalar,
                            },
                        );
                    }
                } else {
                    tags.insert(
                        basic,
                        Action::Scalar {
                            id: field.id,
                            scalar,
                        },
                    );
                }
            }
            ResolvedType::Message(target) => {
                let target_type = root.message(target);
                let ty_index = index_of(target_type, field, &name)?;
                let group = target_type.is_some_and(|t| t.group);
                let (wire, action) = if group {
                    let action = if field.is_repeated() {
                        Action::RepeatedGroup {
                            id: field.id,
                            ty: ty_index,
                        }
                    } else {
                        Action::Group {
                            id: field.id,
                            ty: ty_index,
                        }
                    };
                    (WireType::SGroup, action)
                } else {
                    let action = if field.is_repeated() {
                        Action::RepeatedMessage {
                            id: field.id,
                            ty: ty_index,
                        }
                    } else {
                        Action::Message {
                            id: field.id,
                            ty: ty_index,
                        }
                    };
                    (WireType::Len, action)
                };
                tags.insert(make_key(field.id, wire), action);
            }
        }
    }

    let mut oneof_siblings: HashMap<u32, SmallVec<[u32; 4]>> = HashMap::new();
    for oneof in &ty.oneofs {
        let ids: Vec<u32> = oneof
            .fields
            .iter()
            .filter_map(|member| ty.field_by_name(member))
            .map(|f| f.id)
            .collect();
        for &id in &ids {
            oneof_siblings.insert(id, ids.iter().copied().filter(|&o| o != id).collect());
        }
    }

    Ok(DecodePlan {
        name,
        group: ty.group,
        tags,
        required,
        oneof_siblings,
    })
}

fn unresolved(field: &crate::schema::Field, scope: &str) -> Error {
    Error::UnresolvedReference {
        name: field.type_name.clone(),
        scope: scope.to_string(),
    }
}

fn index_of(ty: Option<&Type>, field: &crate::schema::Field, scope: &str) -> Result<TypeIndex> {
    ty.and_then(|t| t.index)
        .ok_or_else(|| unresolved(field, scope))
}
