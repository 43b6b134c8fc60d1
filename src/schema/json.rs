//! JSON descriptor ingestion.
//!
//! The JSON shape mirrors the reflection runtime this crate interoperates
//! with: namespaces carry `nested`, message types carry `fields` (and
//! optionally `oneofs`, `group`, `nested`), enums carry `values`, and an
//! extension field declaration is an object with `id` and `extend`.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use super::enums::Enum;
use super::field::{Field, Rule};
use super::message::{OneOf, Type};
use super::root::{NodeId, NodeKind, Root};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct JsonField {
    #[serde(rename = "type")]
    type_name: String,
    id: u32,
    rule: Option<String>,
    #[serde(rename = "keyType")]
    key_type: Option<String>,
    extend: Option<String>,
    #[serde(default)]
    options: BTreeMap<String, JsonValue>,
}

#[derive(Debug, Deserialize)]
struct JsonOneOf {
    oneof: Vec<String>,
}

impl Root {
    /// Ingest a JSON descriptor into this root.
    ///
    /// `filename` is only used in error messages; it does not enter the
    /// processed-files set (the loader owns dedup).
    pub fn add_json_str(&mut self, filename: Option<&str>, source: &str) -> Result<()> {
        let file = filename.unwrap_or("<json>");
        let json: JsonValue = serde_json::from_str(source)
            .map_err(|e| Error::parse(file, e.to_string()))?;
        let Some(object) = json.as_object() else {
            return Err(Error::parse(file, "descriptor root must be an object"));
        };
        if let Some(nested) = object.get("nested") {
            let members = as_object(file, "nested", nested)?;
            ingest_members(self, self.root_id(), members, file)?;
        }
        Ok(())
    }
}

fn as_object<'j>(file: &str, what: &str, value: &'j JsonValue) -> Result<&'j Map<String, JsonValue>> {
    value
        .as_object()
        .ok_or_else(|| Error::parse(file, format!("'{what}' must be an object")))
}

fn ingest_members(
    root: &mut Root,
    parent: NodeId,
    members: &Map<String, JsonValue>,
    file: &str,
) -> Result<()> {
    for (name, value) in members {
        let object = as_object(file, name, value)?;
        if object.contains_key("values") {
            ingest_enum(root, parent, name, object, file)?;
        } else if object.contains_key("fields")
            || object.contains_key("oneofs")
            || object.contains_key("group")
        {
            ingest_type(root, parent, name, object, file)?;
        } else if object.contains_key("id") {
            ingest_extension(root, parent, name, value, file)?;
        } else {
            // Namespaces merge across files; only type kinds collide.
            let node = match root.child(parent, name) {
                Some(existing) if matches!(root.node(existing).kind, NodeKind::Namespace) => {
                    existing
                }
                _ => root.add_node(parent, name.clone(), NodeKind::Namespace)?,
            };
            if let Some(nested) = object.get("nested") {
                ingest_members(root, node, as_object(file, "nested", nested)?, file)?;
            }
        }
    }
    Ok(())
}

fn field_from_json(name: &str, value: &JsonValue, file: &str) -> Result<Field> {
    let parsed: JsonField = serde_json::from_value(value.clone())
        .map_err(|e| Error::parse(file, format!("field '{name}': {e}")))?;
    if parsed.id < crate::wire::MINIMUM_TAG_VAL || parsed.id > crate::wire::MAXIMUM_TAG_VAL {
        return Err(Error::parse(
            file,
            format!("field '{name}': id {} out of range", parsed.id),
        ));
    }
    let rule = match parsed.rule.as_deref() {
        None => Rule::Singular,
        Some(declared) => Rule::from_name(declared)
            .ok_or_else(|| Error::parse(file, format!("field '{name}': bad rule '{declared}'")))?,
    };
    let mut field = Field::new(name, parsed.id, parsed.type_name).with_rule(rule);
    field.key_type = parsed.key_type;
    field.extend = parsed.extend;
    field.options = parsed.options;
    Ok(field)
}

fn ingest_type(
    root: &mut Root,
    parent: NodeId,
    name: &str,
    object: &Map<String, JsonValue>,
    file: &str,
) -> Result<()> {
    let mut ty = Type::new();
    ty.group = object.get("group").and_then(JsonValue::as_bool).unwrap_or(false);

    if let Some(fields) = object.get("fields") {
        let mut seen = BTreeSet::new();
        for (field_name, field_value) in as_object(file, "fields", fields)? {
            let field = field_from_json(field_name, field_value, file)?;
            if !seen.insert(field.id) {
                return Err(Error::parse(
                    file,
                    format!("duplicate field id {} in '{name}'", field.id),
                ));
            }
            ty.fields.push(field);
        }
        // JSON object order is not authoritative; pin declaration order to
        // ascending id before any sister fields are appended.
        ty.fields.sort_by_key(|f| f.id);
    }

    if let Some(oneofs) = object.get("oneofs") {
        for (oneof_name, oneof_value) in as_object(file, "oneofs", oneofs)? {
            let parsed: JsonOneOf = serde_json::from_value(oneof_value.clone())
                .map_err(|e| Error::parse(file, format!("oneof '{oneof_name}': {e}")))?;
            ty.oneofs.push(OneOf {
                name: oneof_name.clone(),
                fields: parsed.oneof,
            });
        }
    }

    let node = root.add_node(parent, name, NodeKind::Message(ty))?;
    if let Some(nested) = object.get("nested") {
        ingest_members(root, node, as_object(file, "nested", nested)?, file)?;
    }
    Ok(())
}

fn ingest_enum(
    root: &mut Root,
    parent: NodeId,
    name: &str,
    object: &Map<String, JsonValue>,
    file: &str,
) -> Result<()> {
    let mut e = Enum::default();
    e.allow_alias = object
        .get("options")
        .and_then(|o| o.get("allow_alias"))
        .and_then(JsonValue::as_bool)
        .unwrap_or(false);

    for (value_name, number) in as_object(file, "values", &object["values"])? {
        let number = number
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| {
                Error::parse(file, format!("enum '{name}': bad value '{value_name}'"))
            })?;
        e.values.insert(value_name.clone(), number);
    }
    if !e.allow_alias && e.has_aliases() {
        return Err(Error::parse(
            file,
            format!("enum '{name}' has aliased values without allow_alias"),
        ));
    }

    root.add_node(parent, name, NodeKind::Enum(e))?;
    Ok(())
}

fn ingest_extension(
    root: &mut Root,
    parent: NodeId,
    name: &str,
    value: &JsonValue,
    file: &str,
) -> Result<()> {
    let field = field_from_json(name, value, file)?;
    if field.extend.is_none() {
        return Err(Error::parse(
            file,
            format!("field '{name}' outside a message must carry 'extend'"),
        ));
    }
    root.add_node(parent, name, NodeKind::Field(field))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::ResolvedType;

    #[test]
    fn test_ingest_simple_message() {
        let mut root = Root::new();
        root.add_json_str(
            Some("m.json"),
            r#"{
                "nested": {
                    "pkg": {
                        "nested": {
                            "M": {
                                "fields": {
                                    "a": { "type": "int32", "id": 1 },
                                    "b": { "type": "string", "id": 2 },
                                    "tags": { "rule": "repeated", "type": "int32", "id": 3 }
                                }
                            }
                        }
                    }
                }
            }"#,
        )
        .unwrap();
        root.resolve_all().unwrap();

        let idx = root.type_index("pkg.M").unwrap();
        let ty = root.registry_type(idx).unwrap();
        assert_eq!(ty.fields.len(), 3);
        assert!(matches!(
            ty.field_by_name("a").unwrap().resolved,
            ResolvedType::Scalar(_)
        ));
        assert_eq!(ty.field_by_name("tags").unwrap().rule, Rule::Repeated);
    }

    #[test]
    fn test_ingest_map_oneof_enum() {
        let mut root = Root::new();
        root.add_json_str(
            None,
            r#"{
                "nested": {
                    "M": {
                        "oneofs": { "kind": { "oneof": ["x", "y"] } },
                        "fields": {
                            "m": { "keyType": "string", "type": "int32", "id": 1 },
                            "x": { "type": "int32", "id": 2 },
                            "y": { "type": "string", "id": 3 },
                            "color": { "type": "Color", "id": 4 }
                        }
                    },
                    "Color": { "values": { "RED": 0, "BLUE": 1 } }
                }
            }"#,
        )
        .unwrap();
        root.resolve_all().unwrap();

        let idx = root.type_index("M").unwrap();
        let ty = root.registry_type(idx).unwrap();
        assert!(ty.field_by_name("m").unwrap().is_map());
        assert_eq!(ty.oneof_of("x").unwrap().name, "kind");
        assert!(matches!(
            ty.field_by_name("color").unwrap().resolved,
            ResolvedType::Enum(_)
        ));

        let color = root.lookup(root.root_id(), "Color").unwrap();
        assert_eq!(root.enumeration(color).unwrap().value("BLUE"), Some(1));
    }

    #[test]
    fn test_duplicate_field_id_rejected() {
        let mut root = Root::new();
        let err = root
            .add_json_str(
                None,
                r#"{ "nested": { "M": { "fields": {
                    "a": { "type": "int32", "id": 1 },
                    "b": { "type": "int32", "id": 1 }
                } } } }"#,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_enum_alias_requires_option() {
        let mut root = Root::new();
        let err = root
            .add_json_str(
                None,
                r#"{ "nested": { "E": { "values": { "A": 0, "B": 0 } } } }"#,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));

        let mut root = Root::new();
        root.add_json_str(
            None,
            r#"{ "nested": { "E": {
                "options": { "allow_alias": true },
                "values": { "A": 0, "B": 0 }
            } } }"#,
        )
        .unwrap();
    }

    #[test]
    fn test_extension_field_in_json() {
        let mut root = Root::new();
        root.add_json_str(
            None,
            r#"{ "nested": {
                "ext": { "type": "int32", "id": 100, "extend": "M" },
                "M": { "fields": {} }
            } }"#,
        )
        .unwrap();
        root.resolve_all().unwrap();

        let idx = root.type_index("M").unwrap();
        let ty = root.registry_type(idx).unwrap();
        assert!(ty.field_by_id(100).is_some());
    }

    #[test]
    fn test_group_flag() {
        let mut root = Root::new();
        root.add_json_str(
            None,
            r#"{ "nested": { "Result": { "group": true, "fields": {
                "url": { "type": "string", "id": 2 }
            } } } }"#,
        )
        .unwrap();
        root.resolve_all().unwrap();
        let idx = root.type_index("Result").unwrap();
        assert!(root.registry_type(idx).unwrap().group);
    }
}
