//! Field descriptors.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use super::scalar::ScalarType;
use super::NodeId;

/// Field cardinality.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Rule {
    /// Plain proto3 field.
    #[default]
    Singular,
    /// Explicitly optional.
    Optional,
    /// proto2 required; presence is enforced during decode.
    Required,
    /// Repeated.
    Repeated,
}

impl Rule {
    /// Parse the `rule` string of a JSON descriptor. Absent means singular.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "optional" => Some(Rule::Optional),
            "required" => Some(Rule::Required),
            "repeated" => Some(Rule::Repeated),
            "proto3_optional" => Some(Rule::Optional),
            _ => None,
        }
    }
}

/// What a field's declared type name resolved to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ResolvedType {
    /// Not yet resolved.
    #[default]
    Unresolved,
    /// A primitive.
    Scalar(ScalarType),
    /// A message (or group) type node.
    Message(NodeId),
    /// An enum node; decoded like `int32`.
    Enum(NodeId),
}

/// Position of a field inside the type that owns it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldRef {
    /// Node of the owning message type.
    pub owner: NodeId,
    /// Index into the owner's field list.
    pub index: usize,
}

/// A message field (or an extension field declaration).
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name, unique within the owning type.
    pub name: String,
    /// Field id, unique within the owning type.
    pub id: u32,
    /// Declared type: a primitive name or a symbolic reference.
    pub type_name: String,
    /// Cardinality.
    pub rule: Rule,
    /// Declared map key type, present only for map fields.
    pub key_type: Option<String>,
    /// Target type name for extension fields.
    pub extend: Option<String>,
    /// Field options as declared.
    pub options: BTreeMap<String, JsonValue>,

    /// Set by the resolve pass.
    pub resolved: ResolvedType,
    /// Resolved map key type, set by the resolve pass for map fields.
    pub key_scalar: Option<ScalarType>,
    /// For an extension declaration: the sister field materialized in the
    /// extended type.
    pub extension_field: Option<FieldRef>,
    /// For a sister field: the extension declaration node it mirrors.
    pub declaring_field: Option<NodeId>,
}

impl Field {
    /// A plain field with the given name, id, and declared type.
    pub fn new(name: impl Into<String>, id: u32, type_name: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            id,
            type_name: type_name.into(),
            rule: Rule::Singular,
            key_type: None,
            extend: None,
            options: BTreeMap::new(),
            resolved: ResolvedType::Unresolved,
            key_scalar: None,
            extension_field: None,
            declaring_field: None,
        }
    }

    /// Builder-style cardinality.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rule = rule;
        self
    }

    /// Builder-style map key type.
    pub fn with_key_type(mut self, key_type: impl Into<String>) -> Self {
        self.key_type = Some(key_type.into());
        self
    }

    /// Builder-style extension target.
    pub fn with_extend(mut self, extend: impl Into<String>) -> Self {
        self.extend = Some(extend.into());
        self
    }

    /// True for map fields.
    pub fn is_map(&self) -> bool {
        self.key_type.is_some()
    }

    /// True once `rule` is `Repeated`.
    pub fn is_repeated(&self) -> bool {
        self.rule == Rule::Repeated
    }

    /// True for proto2 required fields.
    pub fn is_required(&self) -> bool {
        self.rule == Rule::Required
    }

    /// The value of a boolean option, if declared.
    pub fn bool_option(&self, name: &str) -> Option<bool> {
        self.options.get(name).and_then(JsonValue::as_bool)
    }
}
