//! Bundled well-known type schemas.
//!
//! The runtime ships JSON descriptors for the `google/protobuf/*` files so
//! imports of well-known types never touch the fetch collaborator. Lookup
//! keys are canonical suffixes: the portion of a requested path starting at
//! the last `google/protobuf/` occurrence.
//!
//! Each descriptor is self-contained and declares no imports; files that
//! reference types from a sibling well-known file (e.g. `api.proto` uses
//! `SourceContext`) resolve once that sibling is loaded too. The
//! `descriptor.proto` schema covers the core descriptor subset this runtime
//! consumes.

const PREFIX: &str = "google/protobuf/";

const ANY: &str = r#"{"nested":{"google":{"nested":{"protobuf":{"nested":{
"Any":{"fields":{"type_url":{"type":"string","id":1},"value":{"type":"bytes","id":2}}}
}}}}}}"#;

const DURATION: &str = r#"{"nested":{"google":{"nested":{"protobuf":{"nested":{
"Duration":{"fields":{"seconds":{"type":"int64","id":1},"nanos":{"type":"int32","id":2}}}
}}}}}}"#;

const TIMESTAMP: &str = r#"{"nested":{"google":{"nested":{"protobuf":{"nested":{
"Timestamp":{"fields":{"seconds":{"type":"int64","id":1},"nanos":{"type":"int32","id":2}}}
}}}}}}"#;

const EMPTY: &str = r#"{"nested":{"google":{"nested":{"protobuf":{"nested":{
"Empty":{"fields":{}}
}}}}}}"#;

const STRUCT: &str = r#"{"nested":{"google":{"nested":{"protobuf":{"nested":{
"Struct":{"fields":{"fields":{"keyType":"string","type":"Value","id":1}}},
"Value":{"oneofs":{"kind":{"oneof":["null_value","number_value","string_value","bool_value","struct_value","list_value"]}},"fields":{"null_value":{"type":"NullValue","id":1},"number_value":{"type":"double","id":2},"string_value":{"type":"string","id":3},"bool_value":{"type":"bool","id":4},"struct_value":{"type":"Struct","id":5},"list_value":{"type":"ListValue","id":6}}},
"NullValue":{"values":{"NULL_VALUE":0}},
"ListValue":{"fields":{"values":{"rule":"repeated","type":"Value","id":1}}}
}}}}}}"#;

const WRAPPERS: &str = r#"{"nested":{"google":{"nested":{"protobuf":{"nested":{
"DoubleValue":{"fields":{"value":{"type":"double","id":1}}},
"FloatValue":{"fields":{"value":{"type":"float","id":1}}},
"Int64Value":{"fields":{"value":{"type":"int64","id":1}}},
"UInt64Value":{"fields":{"value":{"type":"uint64","id":1}}},
"Int32Value":{"fields":{"value":{"type":"int32","id":1}}},
"UInt32Value":{"fields":{"value":{"type":"uint32","id":1}}},
"BoolValue":{"fields":{"value":{"type":"bool","id":1}}},
"StringValue":{"fields":{"value":{"type":"string","id":1}}},
"BytesValue":{"fields":{"value":{"type":"bytes","id":1}}}
}}}}}}"#;

const FIELD_MASK: &str = r#"{"nested":{"google":{"nested":{"protobuf":{"nested":{
"FieldMask":{"fields":{"paths":{"rule":"repeated","type":"string","id":1}}}
}}}}}}"#;

const SOURCE_CONTEXT: &str = r#"{"nested":{"google":{"nested":{"protobuf":{"nested":{
"SourceContext":{"fields":{"file_name":{"type":"string","id":1}}}
}}}}}}"#;

const TYPE: &str = r#"{"nested":{"google":{"nested":{"protobuf":{"nested":{
"Type":{"fields":{"name":{"type":"string","id":1},"fields":{"rule":"repeated","type":"Field","id":2},"oneofs":{"rule":"repeated","type":"string","id":3},"options":{"rule":"repeated","type":"Option","id":4},"source_context":{"type":"SourceContext","id":5},"syntax":{"type":"Syntax","id":6}}},
"Field":{"fields":{"kind":{"type":"Kind","id":1},"cardinality":{"type":"Cardinality","id":2},"number":{"type":"int32","id":3},"name":{"type":"string","id":4},"type_url":{"type":"string","id":6},"oneof_index":{"type":"int32","id":7},"packed":{"type":"bool","id":8},"options":{"rule":"repeated","type":"Option","id":9},"json_name":{"type":"string","id":10},"default_value":{"type":"string","id":11}},"nested":{
"Kind":{"values":{"TYPE_UNKNOWN":0,"TYPE_DOUBLE":1,"TYPE_FLOAT":2,"TYPE_INT64":3,"TYPE_UINT64":4,"TYPE_INT32":5,"TYPE_FIXED64":6,"TYPE_FIXED32":7,"TYPE_BOOL":8,"TYPE_STRING":9,"TYPE_GROUP":10,"TYPE_MESSAGE":11,"TYPE_BYTES":12,"TYPE_UINT32":13,"TYPE_ENUM":14,"TYPE_SFIXED32":15,"TYPE_SFIXED64":16,"TYPE_SINT32":17,"TYPE_SINT64":18}},
"Cardinality":{"values":{"CARDINALITY_UNKNOWN":0,"CARDINALITY_OPTIONAL":1,"CARDINALITY_REQUIRED":2,"CARDINALITY_REPEATED":3}}}},
"Enum":{"fields":{"name":{"type":"string","id":1},"enumvalue":{"rule":"repeated","type":"EnumValue","id":2},"options":{"rule":"repeated","type":"Option","id":3},"source_context":{"type":"SourceContext","id":4},"syntax":{"type":"Syntax","id":5}}},
"EnumValue":{"fields":{"name":{"type":"string","id":1},"number":{"type":"int32","id":2},"options":{"rule":"repeated","type":"Option","id":3}}},
"Option":{"fields":{"name":{"type":"string","id":1},"value":{"type":"Any","id":2}}},
"Syntax":{"values":{"SYNTAX_PROTO2":0,"SYNTAX_PROTO3":1}}
}}}}}}"#;

const API: &str = r#"{"nested":{"google":{"nested":{"protobuf":{"nested":{
"Api":{"fields":{"name":{"type":"string","id":1},"methods":{"rule":"repeated","type":"Method","id":2},"options":{"rule":"repeated","type":"Option","id":3},"version":{"type":"string","id":4},"source_context":{"type":"SourceContext","id":5},"mixins":{"rule":"repeated","type":"Mixin","id":6},"syntax":{"type":"Syntax","id":7}}},
"Method":{"fields":{"name":{"type":"string","id":1},"request_type_url":{"type":"string","id":2},"request_streaming":{"type":"bool","id":3},"response_type_url":{"type":"string","id":4},"response_streaming":{"type":"bool","id":5},"options":{"rule":"repeated","type":"Option","id":6},"syntax":{"type":"Syntax","id":7}}},
"Mixin":{"fields":{"name":{"type":"string","id":1},"root":{"type":"string","id":2}}}
}}}}}}"#;

const DESCRIPTOR: &str = r#"{"nested":{"google":{"nested":{"protobuf":{"nested":{
"FileDescriptorSet":{"fields":{"file":{"rule":"repeated","type":"FileDescriptorProto","id":1}}},
"FileDescriptorProto":{"fields":{"name":{"type":"string","id":1},"package":{"type":"string","id":2},"dependency":{"rule":"repeated","type":"string","id":3},"message_type":{"rule":"repeated","type":"DescriptorProto","id":4},"enum_type":{"rule":"repeated","type":"EnumDescriptorProto","id":5},"syntax":{"type":"string","id":12}}},
"DescriptorProto":{"fields":{"name":{"type":"string","id":1},"field":{"rule":"repeated","type":"FieldDescriptorProto","id":2},"nested_type":{"rule":"repeated","type":"DescriptorProto","id":3},"enum_type":{"rule":"repeated","type":"EnumDescriptorProto","id":4},"options":{"type":"MessageOptions","id":7},"oneof_decl":{"rule":"repeated","type":"OneofDescriptorProto","id":8}}},
"FieldDescriptorProto":{"fields":{"name":{"type":"string","id":1},"number":{"type":"int32","id":3},"label":{"type":"Label","id":4},"type":{"type":"Type","id":5},"type_name":{"type":"string","id":6},"default_value":{"type":"string","id":7},"options":{"type":"FieldOptions","id":8},"oneof_index":{"type":"int32","id":9},"json_name":{"type":"string","id":10},"proto3_optional":{"type":"bool","id":17}},"nested":{
"Type":{"values":{"TYPE_DOUBLE":1,"TYPE_FLOAT":2,"TYPE_INT64":3,"TYPE_UINT64":4,"TYPE_INT32":5,"TYPE_FIXED64":6,"TYPE_FIXED32":7,"TYPE_BOOL":8,"TYPE_STRING":9,"TYPE_GROUP":10,"TYPE_MESSAGE":11,"TYPE_BYTES":12,"TYPE_UINT32":13,"TYPE_ENUM":14,"TYPE_SFIXED32":15,"TYPE_SFIXED64":16,"TYPE_SINT32":17,"TYPE_SINT64":18}},
"Label":{"values":{"LABEL_OPTIONAL":1,"LABEL_REQUIRED":2,"LABEL_REPEATED":3}}}},
"OneofDescriptorProto":{"fields":{"name":{"type":"string","id":1}}},
"EnumDescriptorProto":{"fields":{"name":{"type":"string","id":1},"value":{"rule":"repeated","type":"EnumValueDescriptorProto","id":2}}},
"EnumValueDescriptorProto":{"fields":{"name":{"type":"string","id":1},"number":{"type":"int32","id":2}}},
"MessageOptions":{"fields":{"map_entry":{"type":"bool","id":7}}},
"FieldOptions":{"fields":{"packed":{"type":"bool","id":2}}}
}}}}}}"#;

const PLUGIN: &str = r#"{"nested":{"google":{"nested":{"protobuf":{"nested":{"compiler":{"nested":{
"Version":{"fields":{"major":{"type":"int32","id":1},"minor":{"type":"int32","id":2},"patch":{"type":"int32","id":3},"suffix":{"type":"string","id":4}}},
"CodeGeneratorRequest":{"fields":{"file_to_generate":{"rule":"repeated","type":"string","id":1},"parameter":{"type":"string","id":2},"compiler_version":{"type":"Version","id":3},"proto_file":{"rule":"repeated","type":"FileDescriptorProto","id":15}}},
"CodeGeneratorResponse":{"fields":{"error":{"type":"string","id":1},"supported_features":{"type":"uint64","id":2},"file":{"rule":"repeated","type":"File","id":15}},"nested":{
"File":{"fields":{"name":{"type":"string","id":1},"insertion_point":{"type":"string","id":2},"content":{"type":"string","id":15}}}}}
}}}}}}}}"#;

static BUNDLED: &[(&str, &str)] = &[
    ("google/protobuf/any.proto", ANY),
    ("google/protobuf/api.proto", API),
    ("google/protobuf/compiler/plugin.proto", PLUGIN),
    ("google/protobuf/descriptor.proto", DESCRIPTOR),
    ("google/protobuf/duration.proto", DURATION),
    ("google/protobuf/empty.proto", EMPTY),
    ("google/protobuf/field_mask.proto", FIELD_MASK),
    ("google/protobuf/source_context.proto", SOURCE_CONTEXT),
    ("google/protobuf/struct.proto", STRUCT),
    ("google/protobuf/timestamp.proto", TIMESTAMP),
    ("google/protobuf/type.proto", TYPE),
    ("google/protobuf/wrappers.proto", WRAPPERS),
];

/// Canonical bundled name for a requested path, if it names a bundled file.
///
/// The match is by suffix starting at the last `google/protobuf/` occurrence,
/// so `deps/google/protobuf/any.proto` hits the bundled `any.proto`.
pub fn bundled_file_name(path: &str) -> Option<&'static str> {
    let start = path.rfind(PREFIX)?;
    let suffix = &path[start..];
    BUNDLED
        .iter()
        .find(|(name, _)| *name == suffix)
        .map(|(name, _)| *name)
}

/// The JSON descriptor for a canonical bundled name.
pub fn source(name: &str) -> Option<&'static str> {
    BUNDLED
        .iter()
        .find(|(bundled_name, _)| *bundled_name == name)
        .map(|(_, src)| *src)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Root;

    #[test]
    fn test_suffix_lookup() {
        assert_eq!(
            bundled_file_name("google/protobuf/timestamp.proto"),
            Some("google/protobuf/timestamp.proto")
        );
        assert_eq!(
            bundled_file_name("vendor/deps/google/protobuf/any.proto"),
            Some("google/protobuf/any.proto")
        );
        // Last occurrence wins.
        assert_eq!(
            bundled_file_name("google/protobuf/x/google/protobuf/empty.proto"),
            Some("google/protobuf/empty.proto")
        );
        assert_eq!(bundled_file_name("google/protobuf/unknown.proto"), None);
        assert_eq!(bundled_file_name("my/own/file.proto"), None);
    }

    #[test]
    fn test_all_bundled_descriptors_ingest() {
        // Every bundled file parses; loaded together the cross-file
        // references (api → source_context, plugin → descriptor) resolve.
        let mut root = Root::new();
        for (name, src) in BUNDLED {
            root.add_json_str(Some(name), src).unwrap();
        }
        root.resolve_all().unwrap();

        assert!(root.type_index("google.protobuf.Any").is_some());
        assert!(root.type_index("google.protobuf.Struct").is_some());
        assert!(root
            .type_index("google.protobuf.compiler.CodeGeneratorRequest")
            .is_some());
    }

    #[test]
    fn test_struct_is_self_recursive() {
        let mut root = Root::new();
        root.add_json_str(Some("struct"), STRUCT).unwrap();
        root.resolve_all().unwrap();
        let value = root.type_index("google.protobuf.Value").unwrap();
        let ty = root.registry_type(value).unwrap();
        assert_eq!(ty.oneofs.len(), 1);
        assert_eq!(ty.oneofs[0].fields.len(), 6);
    }
}
