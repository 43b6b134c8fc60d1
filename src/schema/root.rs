//! The schema graph: a node arena rooted in [`Root`].
//!
//! Nodes reference each other by [`NodeId`] index rather than by name or
//! pointer, so cyclic type references (a message containing itself) need no
//! forward declarations; resolved message types additionally get a stable
//! [`TypeIndex`] into a flat registry that the decoder captures.

use std::collections::{BTreeMap, HashSet};

use tracing::trace;

use super::enums::Enum;
use super::field::{Field, FieldRef, ResolvedType};
use super::message::Type;
use super::scalar::ScalarType;
use crate::error::{Error, Result};

/// Index of a node in the [`Root`] arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// Stable index of a resolved message type in the registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TypeIndex(pub(crate) usize);

impl TypeIndex {
    /// The raw registry slot.
    pub fn as_usize(self) -> usize {
        self.0
    }
}

/// What a schema node is.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A plain namespace (package segment).
    Namespace,
    /// A message type.
    Message(Type),
    /// An enum type.
    Enum(Enum),
    /// An extension field declaration (`extend T { ... }` member).
    Field(Field),
}

/// A node in the schema tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// Simple (unqualified) name; empty for the root namespace.
    pub name: String,
    /// Parent node; `None` only for the root namespace.
    pub parent: Option<NodeId>,
    /// Child nodes in insertion order.
    pub children: Vec<NodeId>,
    /// Node payload.
    pub kind: NodeKind,
}

/// Lookup filter following the protobuf scoping rules: a name search skips
/// nodes of the wrong kind and keeps walking outward.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Filter {
    Any,
    Message,
    TypeOrEnum,
}

impl Filter {
    fn matches(self, kind: &NodeKind) -> bool {
        match self {
            Filter::Any => true,
            Filter::Message => matches!(kind, NodeKind::Message(_)),
            Filter::TypeOrEnum => matches!(kind, NodeKind::Message(_) | NodeKind::Enum(_)),
        }
    }
}

/// A child a namespace exposes under its own name.
///
/// Mirrors the generated-code convention of hoisting uppercase-initial
/// declarations onto their parent; for enums the exposed value is the value
/// mapping, not the enum object.
#[derive(Debug)]
pub enum Exposed<'a> {
    /// A nested message type.
    Message(NodeId),
    /// A nested enum's value mapping.
    Values(&'a BTreeMap<String, i32>),
    /// A nested namespace.
    Namespace(NodeId),
}

/// The root of a schema graph.
///
/// Owns the node arena, the set of processed filenames, the deferred
/// extension list, and the resolved type registry. Mutated only during the
/// load/resolve phase; decoding treats it as immutable.
#[derive(Debug)]
pub struct Root {
    nodes: Vec<Node>,
    /// Extension field declarations whose target is not yet loaded.
    deferred: Vec<NodeId>,
    /// Resolved filenames already processed (import dedup).
    files: HashSet<String>,
    /// TypeIndex → message node, assigned by [`Root::resolve_all`].
    registry: Vec<NodeId>,
}

impl Default for Root {
    fn default() -> Self {
        Root::new()
    }
}

impl Root {
    const ROOT: NodeId = NodeId(0);

    /// An empty schema graph.
    pub fn new() -> Self {
        Root {
            nodes: vec![Node {
                name: String::new(),
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Namespace,
            }],
            deferred: Vec::new(),
            files: HashSet::new(),
            registry: Vec::new(),
        }
    }

    /// The root namespace node.
    pub fn root_id(&self) -> NodeId {
        Self::ROOT
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// The message type payload of a node, if it is one.
    pub fn message(&self, id: NodeId) -> Option<&Type> {
        match &self.node(id).kind {
            NodeKind::Message(ty) => Some(ty),
            _ => None,
        }
    }

    /// The enum payload of a node, if it is one.
    pub fn enumeration(&self, id: NodeId) -> Option<&Enum> {
        match &self.node(id).kind {
            NodeKind::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// Fully-qualified dotted name of a node; empty for the root.
    pub fn full_name(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut cur = Some(id);
        while let Some(node_id) = cur {
            let node = self.node(node_id);
            if !node.name.is_empty() {
                parts.push(node.name.as_str());
            }
            cur = node.parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// The named direct child of `parent`.
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|&c| self.node(c).name == name)
    }

    /// Attach a new node under `parent`.
    ///
    /// Sibling names must be unique. Attaching runs the add hooks: a new
    /// extension declaration attempts sister construction (deferring on
    /// miss), and a new message type retries every deferred extension.
    pub fn add_node(&mut self, parent: NodeId, name: impl Into<String>, kind: NodeKind) -> Result<NodeId> {
        let name = name.into();
        if self.child(parent, &name).is_some() {
            return Err(Error::DuplicateName {
                name,
                scope: self.full_name(parent),
            });
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name,
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.node_mut(parent).children.push(id);

        if matches!(self.node(id).kind, NodeKind::Field(_)) {
            if !self.try_handle_extension(id) {
                trace!(node = %self.full_name(id), "deferring extension");
                self.deferred.push(id);
            }
        } else if matches!(self.node(id).kind, NodeKind::Message(_)) {
            self.retry_deferred();
        }

        Ok(id)
    }

    /// Get-or-create the namespace chain for a dotted path (e.g. a package
    /// declaration), returning the innermost node.
    pub fn define(&mut self, path: &str) -> Result<NodeId> {
        let mut cur = Self::ROOT;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            cur = match self.child(cur, segment) {
                Some(existing) => existing,
                None => self.add_node(cur, segment, NodeKind::Namespace)?,
            };
        }
        Ok(cur)
    }

    /// Resolve a dotted path relative to `from`, following protobuf scoping:
    /// a leading dot is absolute; otherwise each enclosing scope is tried
    /// from innermost to outermost, ending at the root (the fully-qualified
    /// interpretation).
    pub fn lookup(&self, from: NodeId, path: &str) -> Option<NodeId> {
        self.lookup_filtered(from, path, Filter::Any)
    }

    fn lookup_filtered(&self, from: NodeId, path: &str, filter: Filter) -> Option<NodeId> {
        if let Some(absolute) = path.strip_prefix('.') {
            return self
                .descend(Self::ROOT, absolute)
                .filter(|&id| filter.matches(&self.node(id).kind));
        }
        let mut scope = Some(from);
        while let Some(s) = scope {
            if let Some(found) = self.descend(s, path) {
                if filter.matches(&self.node(found).kind) {
                    return Some(found);
                }
            }
            scope = self.node(s).parent;
        }
        None
    }

    fn descend(&self, base: NodeId, path: &str) -> Option<NodeId> {
        let mut cur = base;
        for segment in path.split('.') {
            cur = self.child(cur, segment)?;
        }
        Some(cur)
    }

    /// Find a message type by dotted path from the root and return its
    /// registry index. Only meaningful after [`Root::resolve_all`].
    pub fn type_index(&self, path: &str) -> Option<TypeIndex> {
        let id = self.lookup_filtered(Self::ROOT, path, Filter::Message)?;
        self.message(id).and_then(|ty| ty.index)
    }

    /// The message node in registry slot `index`.
    pub fn registry_node(&self, index: TypeIndex) -> Option<NodeId> {
        self.registry.get(index.0).copied()
    }

    /// The message type in registry slot `index`.
    pub fn registry_type(&self, index: TypeIndex) -> Option<&Type> {
        self.registry_node(index).and_then(|id| self.message(id))
    }

    /// Number of registered message types.
    pub fn registry_len(&self) -> usize {
        self.registry.len()
    }

    /// True once `filename` has begun processing.
    pub fn has_file(&self, filename: &str) -> bool {
        self.files.contains(filename)
    }

    /// Record that `filename` has begun processing. Returns false if it was
    /// already present.
    pub fn mark_file(&mut self, filename: impl Into<String>) -> bool {
        self.files.insert(filename.into())
    }

    /// Uppercase-initial children of a namespace-like node, exposed the way
    /// generated code hoists statics onto their parent.
    pub fn exposed_children(&self, ns: NodeId) -> Vec<(&str, Exposed<'_>)> {
        self.node(ns)
            .children
            .iter()
            .filter_map(|&child| {
                let node = self.node(child);
                if !node.name.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
                    return None;
                }
                let exposed = match &node.kind {
                    NodeKind::Message(_) => Exposed::Message(child),
                    NodeKind::Enum(e) => Exposed::Values(&e.values),
                    NodeKind::Namespace => Exposed::Namespace(child),
                    NodeKind::Field(_) => return None,
                };
                Some((node.name.as_str(), exposed))
            })
            .collect()
    }

    /// Attempt to materialize the sister field for an extension declaration.
    ///
    /// Returns false when the target type is not loaded yet. Re-running for
    /// an already-handled declaration is a no-op.
    fn try_handle_extension(&mut self, decl: NodeId) -> bool {
        let (scope, declared) = {
            let node = self.node(decl);
            let NodeKind::Field(field) = &node.kind else {
                return true;
            };
            (node.parent.unwrap_or(Self::ROOT), field.clone())
        };
        let Some(extend) = declared.extend.as_deref() else {
            return true;
        };
        let Some(target) = self.lookup_filtered(scope, extend, Filter::Message) else {
            return false;
        };

        let sister_name = self.full_name(decl);
        let index = {
            let NodeKind::Message(ty) = &mut self.node_mut(target).kind else {
                return false;
            };
            if ty.field_by_name(&sister_name).is_some() {
                return true;
            }
            let mut sister = Field::new(sister_name, declared.id, declared.type_name.clone());
            sister.rule = declared.rule;
            sister.key_type = declared.key_type.clone();
            sister.options = declared.options.clone();
            sister.declaring_field = Some(decl);
            ty.fields.push(sister);
            ty.fields.len() - 1
        };

        if let NodeKind::Field(field) = &mut self.node_mut(decl).kind {
            field.extension_field = Some(FieldRef {
                owner: target,
                index,
            });
        }
        true
    }

    /// Retry every deferred extension; keep the ones still unresolvable.
    fn retry_deferred(&mut self) {
        let pending = std::mem::take(&mut self.deferred);
        for decl in pending {
            if !self.try_handle_extension(decl) {
                self.deferred.push(decl);
            }
        }
    }

    /// Pre-order walk of the whole tree.
    fn walk(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![Self::ROOT];
        while let Some(id) = stack.pop() {
            order.push(id);
            // Reverse keeps sibling visit order equal to insertion order.
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        order
    }

    /// Compute a field's resolution without mutating the graph.
    fn resolution_of(&self, scope: NodeId, field: &Field, owner_full: &str) -> Result<(ResolvedType, Option<ScalarType>)> {
        let resolved = if let Some(scalar) = ScalarType::from_name(&field.type_name) {
            ResolvedType::Scalar(scalar)
        } else {
            match self.lookup_filtered(scope, &field.type_name, Filter::TypeOrEnum) {
                Some(found) => match &self.node(found).kind {
                    NodeKind::Message(_) => ResolvedType::Message(found),
                    NodeKind::Enum(_) => ResolvedType::Enum(found),
                    _ => unreachable!("filter admits only types and enums"),
                },
                None => {
                    return Err(Error::UnresolvedReference {
                        name: field.type_name.clone(),
                        scope: owner_full.to_string(),
                    })
                }
            }
        };

        let key_scalar = match &field.key_type {
            None => None,
            Some(declared) => {
                let scalar = ScalarType::from_name(declared)
                    .filter(|s| s.valid_map_key())
                    .ok_or_else(|| Error::InvalidMapKey {
                        key_type: declared.clone(),
                        field: format!("{owner_full}.{}", field.name),
                    })?;
                Some(scalar)
            }
        };

        Ok((resolved, key_scalar))
    }

    /// Resolve every field of every type, assign registry indices, and run
    /// final deferred-extension accounting.
    ///
    /// After a successful return the graph is immutable by convention and
    /// decoders may be built against it.
    pub fn resolve_all(&mut self) -> Result<()> {
        for id in self.walk() {
            if matches!(self.node(id).kind, NodeKind::Message(_)) {
                let needs_index =
                    matches!(&self.node(id).kind, NodeKind::Message(ty) if ty.index.is_none());
                if needs_index {
                    let index = TypeIndex(self.registry.len());
                    self.registry.push(id);
                    if let NodeKind::Message(ty) = &mut self.node_mut(id).kind {
                        ty.index = Some(index);
                    }
                }
                self.resolve_message_fields(id)?;
            } else if matches!(self.node(id).kind, NodeKind::Field(_)) {
                self.resolve_extension_decl(id)?;
            }
        }

        if !self.deferred.is_empty() {
            let listing = self
                .deferred
                .iter()
                .map(|&decl| {
                    let node = self.node(decl);
                    let target = match &node.kind {
                        NodeKind::Field(f) => f.extend.as_deref().unwrap_or("<none>"),
                        _ => "<none>",
                    };
                    let parent = node.parent.map(|p| self.full_name(p)).unwrap_or_default();
                    format!("'{target}' declared in '{parent}'")
                })
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::UnresolvableExtensions(listing));
        }

        Ok(())
    }

    fn resolve_message_fields(&mut self, owner: NodeId) -> Result<()> {
        let owner_full = self.full_name(owner);
        let count = match &self.node(owner).kind {
            NodeKind::Message(ty) => ty.fields.len(),
            _ => return Ok(()),
        };

        for idx in 0..count {
            let field = {
                let NodeKind::Message(ty) = &self.node(owner).kind else {
                    unreachable!()
                };
                ty.fields[idx].clone()
            };
            // Sister fields resolve in their declaring scope, not the
            // extended type's scope.
            let scope = match field.declaring_field {
                Some(decl) => self.node(decl).parent.unwrap_or(Self::ROOT),
                None => owner,
            };
            let (resolved, key_scalar) = self.resolution_of(scope, &field, &owner_full)?;
            trace!(field = %format!("{owner_full}.{}", field.name), ?resolved, "resolved field");
            if let NodeKind::Message(ty) = &mut self.node_mut(owner).kind {
                ty.fields[idx].resolved = resolved;
                ty.fields[idx].key_scalar = key_scalar;
            }
        }

        if let NodeKind::Message(ty) = &mut self.node_mut(owner).kind {
            ty.index_fields();
        }
        Ok(())
    }

    fn resolve_extension_decl(&mut self, decl: NodeId) -> Result<()> {
        let (scope, field) = {
            let node = self.node(decl);
            let NodeKind::Field(field) = &node.kind else {
                return Ok(());
            };
            (node.parent.unwrap_or(Self::ROOT), field.clone())
        };
        let scope_full = self.full_name(scope);
        let (resolved, key_scalar) = self.resolution_of(scope, &field, &scope_full)?;
        if let NodeKind::Field(field) = &mut self.node_mut(decl).kind {
            field.resolved = resolved;
            field.key_scalar = key_scalar;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::Rule;

    fn message_with(fields: Vec<Field>) -> NodeKind {
        let mut ty = Type::new();
        ty.fields = fields;
        NodeKind::Message(ty)
    }

    #[test]
    fn test_full_names_and_lookup() {
        let mut root = Root::new();
        let pkg = root.define("a.b").unwrap();
        let msg = root.add_node(pkg, "M", message_with(vec![])).unwrap();
        let inner = root.add_node(msg, "Inner", message_with(vec![])).unwrap();

        assert_eq!(root.full_name(msg), "a.b.M");
        assert_eq!(root.full_name(inner), "a.b.M.Inner");

        // Inner-to-outer resolution.
        assert_eq!(root.lookup(inner, "Inner"), Some(inner));
        assert_eq!(root.lookup(inner, "M"), Some(msg));
        assert_eq!(root.lookup(msg, "Inner"), Some(inner));
        // Fully-qualified and absolute forms.
        assert_eq!(root.lookup(inner, "a.b.M"), Some(msg));
        assert_eq!(root.lookup(inner, ".a.b.M.Inner"), Some(inner));
        assert_eq!(root.lookup(inner, "Missing"), None);
    }

    #[test]
    fn test_duplicate_sibling_rejected() {
        let mut root = Root::new();
        let base = root.root_id();
        root.add_node(base, "M", message_with(vec![])).unwrap();
        let err = root.add_node(base, "M", NodeKind::Namespace).unwrap_err();
        assert!(matches!(err, Error::DuplicateName { .. }));
    }

    #[test]
    fn test_resolve_scalar_and_symbolic() {
        let mut root = Root::new();
        let base = root.root_id();
        root.add_node(base, "Other", message_with(vec![])).unwrap();
        root.add_node(
            base,
            "M",
            message_with(vec![
                Field::new("a", 1, "int32"),
                Field::new("other", 2, "Other"),
            ]),
        )
        .unwrap();

        root.resolve_all().unwrap();
        let m = root.type_index("M").unwrap();
        let ty = root.registry_type(m).unwrap();
        assert!(matches!(
            ty.field_by_name("a").unwrap().resolved,
            ResolvedType::Scalar(ScalarType::Int32)
        ));
        assert!(matches!(
            ty.field_by_name("other").unwrap().resolved,
            ResolvedType::Message(_)
        ));
    }

    #[test]
    fn test_unresolved_reference() {
        let mut root = Root::new();
        let base = root.root_id();
        root.add_node(base, "M", message_with(vec![Field::new("x", 1, "Nope")]))
            .unwrap();
        let err = root.resolve_all().unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { .. }));
    }

    #[test]
    fn test_extension_before_target_defers_then_attaches() {
        let mut root = Root::new();
        let base = root.root_id();

        // Extension first: target missing, so it defers.
        let decl = Field::new("x", 100, "int32")
            .with_rule(Rule::Singular)
            .with_extend("M");
        root.add_node(base, "x", NodeKind::Field(decl)).unwrap();
        assert_eq!(root.deferred.len(), 1);

        // Adding the target retries the deferred list.
        root.add_node(base, "M", message_with(vec![])).unwrap();
        assert!(root.deferred.is_empty());

        root.resolve_all().unwrap();
        let m = root.type_index("M").unwrap();
        let ty = root.registry_type(m).unwrap();
        let sister = ty.field_by_id(100).unwrap();
        assert_eq!(sister.name, "x");
        assert!(sister.declaring_field.is_some());
    }

    #[test]
    fn test_unresolvable_extension_fails_resolve_all() {
        let mut root = Root::new();
        let base = root.root_id();
        let decl = Field::new("x", 9, "int32").with_extend("Gone");
        root.add_node(base, "x", NodeKind::Field(decl)).unwrap();
        let err = root.resolve_all().unwrap_err();
        match err {
            Error::UnresolvableExtensions(listing) => assert!(listing.contains("Gone")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_exposed_children() {
        let mut root = Root::new();
        let base = root.root_id();
        root.add_node(base, "Visible", message_with(vec![])).unwrap();
        root.add_node(base, "hidden", NodeKind::Namespace).unwrap();
        let mut e = Enum::default();
        e.values.insert("A".into(), 0);
        root.add_node(base, "Color", NodeKind::Enum(e)).unwrap();

        let exposed = root.exposed_children(base);
        assert_eq!(exposed.len(), 2);
        assert!(exposed
            .iter()
            .any(|(name, e)| *name == "Visible" && matches!(e, Exposed::Message(_))));
        assert!(exposed
            .iter()
            .any(|(name, e)| *name == "Color" && matches!(e, Exposed::Values(_))));
    }

    #[test]
    fn test_cyclic_reference_resolves() {
        let mut root = Root::new();
        let base = root.root_id();
        root.add_node(base, "Tree", message_with(vec![Field::new("child", 1, "Tree")]))
            .unwrap();
        root.resolve_all().unwrap();
        let idx = root.type_index("Tree").unwrap();
        let ty = root.registry_type(idx).unwrap();
        let ResolvedType::Message(target) = ty.field_by_name("child").unwrap().resolved else {
            panic!("expected message resolution");
        };
        assert_eq!(root.message(target).unwrap().index, Some(idx));
    }
}
