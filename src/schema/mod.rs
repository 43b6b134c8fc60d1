//! Declarative schema model: namespaces, message types, fields, and enums,
//! plus the resolve pass that turns symbolic references into node indices.

mod enums;
mod field;
mod json;
mod message;
mod root;
mod scalar;

pub use enums::Enum;
pub use field::{Field, FieldRef, ResolvedType, Rule};
pub use message::{OneOf, Type};
pub use root::{Exposed, Node, NodeId, NodeKind, Root, TypeIndex};
pub use scalar::ScalarType;
