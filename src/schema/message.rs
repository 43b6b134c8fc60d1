//! Message type descriptors.

use std::collections::BTreeMap;

use super::field::Field;
use super::TypeIndex;

/// A oneof group: a named subset of a type's fields of which at most one may
/// be set on a decoded instance.
#[derive(Debug, Clone)]
pub struct OneOf {
    /// Oneof name.
    pub name: String,
    /// Member field names, in declaration order.
    pub fields: Vec<String>,
}

/// A message type: a named aggregate of fields, oneof groups, and nested
/// declarations (nested children live in the node arena).
#[derive(Debug, Clone, Default)]
pub struct Type {
    /// Fields in declaration order. Sister fields materialized from
    /// extensions are appended by the extension protocol.
    pub fields: Vec<Field>,
    /// Oneof groups.
    pub oneofs: Vec<OneOf>,
    /// True for group-typed messages (wire types 3/4 delimit instances).
    pub group: bool,
    /// Registry index, assigned by the resolve pass.
    pub index: Option<TypeIndex>,
    /// id → field-list position, built by the resolve pass.
    by_id: BTreeMap<u32, usize>,
}

impl Type {
    /// A fresh message type with no fields.
    pub fn new() -> Self {
        Type::default()
    }

    /// The field with the given id.
    pub fn field_by_id(&self, id: u32) -> Option<&Field> {
        if let Some(&idx) = self.by_id.get(&id) {
            return self.fields.get(idx);
        }
        // Fall back to a scan so lookups work before the resolve pass.
        self.fields.iter().find(|f| f.id == id)
    }

    /// The field with the given name.
    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The oneof group `field` belongs to, if any.
    pub fn oneof_of(&self, field: &str) -> Option<&OneOf> {
        self.oneofs
            .iter()
            .find(|o| o.fields.iter().any(|f| f == field))
    }

    /// Rebuild the id lookup table. Called after fields change.
    ///
    /// Declaration order is preserved; extension cross-links hold positional
    /// references into the field list.
    pub(crate) fn index_fields(&mut self) {
        self.by_id = self
            .fields
            .iter()
            .enumerate()
            .map(|(idx, f)| (f.id, idx))
            .collect();
    }
}
