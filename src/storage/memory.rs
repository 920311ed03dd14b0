//! In-memory content store.
//!
//! This is the reference implementation of `ContentStore`.
//! It keeps the whole tree in hashbrown maps behind a `parking_lot::RwLock`.
//!
//! ## Limitations
//!
//! - **No persistence**: `save()` only clears the "new" flags of nodes and
//!   properties, marking the end of a session.
//! - **Flat schema**: protected, mandatory and referenceable declarations are
//!   keyed by property name / node type only, not per node type definition.
//! - **No same-name siblings**: adding an existing child name fails.
//!
//! Use this store for:
//! - Testing the builder, coercer and ledger
//! - Embedding the import engine where the target tree lives in memory

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;
use smallvec::SmallVec;
use uuid::Uuid;

use crate::model::*;
use crate::model::path as paths;
use crate::{Error, Result};
use super::ContentStore;

const DEFAULT_PRIMARY_TYPE: &str = "nt:unstructured";
const ROOT_PRIMARY_TYPE: &str = "rep:root";

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory hierarchical property store. Cloning yields another handle to the same tree.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    schema: RwLock<Schema>,
    tree: RwLock<Tree>,
    actor: String,
    next_node_id: AtomicU64,
}

struct Schema {
    default_primary_type: String,
    /// Primary types whose nodes are referenceable without a mixin.
    referenceable_types: HashSet<String>,
    /// Property names the store refuses to write.
    protected: HashSet<String>,
    /// Property names reported as mandatory.
    mandatory: HashSet<String>,
}

struct Tree {
    root: NodeId,
    nodes: HashMap<NodeId, NodeEntry>,
    identifiers: HashMap<String, NodeId>,
}

struct NodeEntry {
    name: String,
    parent: Option<NodeId>,
    primary_type: String,
    mixins: SmallVec<[String; 2]>,
    children: Vec<NodeId>,
    properties: HashMap<String, PropertyEntry>,
    identifier: Option<String>,
    is_new: bool,
    checked_out: bool,
}

struct PropertyEntry {
    property_type: PropertyType,
    value: PropertyValue,
    is_new: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_actor("admin")
    }

    /// Store whose writes are attributed to `actor`.
    pub fn with_actor(actor: impl Into<String>) -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, NodeEntry {
            name: String::new(),
            parent: None,
            primary_type: ROOT_PRIMARY_TYPE.to_string(),
            mixins: SmallVec::new(),
            children: Vec::new(),
            properties: HashMap::new(),
            identifier: None,
            is_new: false,
            checked_out: true,
        });

        let mut referenceable_types = HashSet::new();
        referenceable_types.insert("nt:resource".to_string());

        Self {
            inner: Arc::new(MemoryInner {
                schema: RwLock::new(Schema {
                    default_primary_type: DEFAULT_PRIMARY_TYPE.to_string(),
                    referenceable_types,
                    protected: HashSet::new(),
                    mandatory: HashSet::new(),
                }),
                tree: RwLock::new(Tree {
                    root,
                    nodes,
                    identifiers: HashMap::new(),
                }),
                actor: actor.into(),
                next_node_id: AtomicU64::new(1),
            }),
        }
    }

    /// Refuse writes to properties with this name (`ConstraintViolation`).
    pub fn protect_property(&self, name: &str) {
        self.inner.schema.write().protected.insert(name.to_string());
    }

    /// Report properties with this name as mandatory.
    pub fn declare_mandatory(&self, name: &str) {
        self.inner.schema.write().mandatory.insert(name.to_string());
    }

    /// Make every node of this primary type referenceable.
    pub fn declare_referenceable_type(&self, primary_type: &str) {
        self.inner.schema.write().referenceable_types.insert(primary_type.to_string());
    }

    /// End the session: everything written so far is no longer "new".
    pub fn save(&self) {
        let mut tree = self.inner.tree.write();
        for entry in tree.nodes.values_mut() {
            entry.is_new = false;
            for prop in entry.properties.values_mut() {
                prop.is_new = false;
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.inner.tree.read().nodes.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tree helpers
// ============================================================================

impl Schema {
    fn is_referenceable(&self, entry: &NodeEntry) -> bool {
        self.referenceable_types.contains(&entry.primary_type)
            || entry.mixins.iter().any(|m| m == MIX_REFERENCEABLE || m == MIX_VERSIONABLE)
    }
}

impl Tree {
    fn entry(&self, id: NodeId) -> Result<&NodeEntry> {
        self.nodes.get(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))
    }

    fn entry_mut(&mut self, id: NodeId) -> Result<&mut NodeEntry> {
        self.nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))
    }

    fn path_of(&self, id: NodeId) -> Result<String> {
        let mut names = Vec::new();
        let mut current = self.entry(id)?;
        while let Some(parent) = current.parent {
            names.push(current.name.as_str());
            current = self.entry(parent)?;
        }
        names.reverse();
        Ok(format!("/{}", names.join("/")))
    }

    fn child_named(&self, id: NodeId, name: &str) -> Result<Option<NodeId>> {
        let entry = self.entry(id)?;
        Ok(entry
            .children
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).is_some_and(|e| e.name == name)))
    }

    /// `id` and all of its descendants.
    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![id];
        let mut i = 0;
        while i < out.len() {
            if let Some(entry) = self.nodes.get(&out[i]) {
                out.extend(entry.children.iter().copied());
            }
            i += 1;
        }
        out
    }

    /// Hand out an identifier if the node has become referenceable.
    fn ensure_identifier(&mut self, id: NodeId, schema: &Schema) -> Result<()> {
        let entry = self.entry_mut(id)?;
        if entry.identifier.is_none() && schema.is_referenceable(entry) {
            let identifier = Uuid::new_v4().to_string();
            entry.identifier = Some(identifier.clone());
            self.identifiers.insert(identifier, id);
        }
        Ok(())
    }
}

fn convert(value: PropertyValue, property_type: PropertyType) -> Result<PropertyValue> {
    Ok(match value {
        PropertyValue::Single(v) => PropertyValue::Single(v.convert(property_type)?),
        PropertyValue::Multi(vs) => PropertyValue::Multi(
            vs.into_iter()
                .map(|v| v.convert(property_type))
                .collect::<Result<Vec<_>>>()?,
        ),
    })
}

fn valid_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(Error::InvalidPath(format!("'{name}' is not a valid item name")));
    }
    Ok(())
}

// ============================================================================
// ContentStore impl
// ============================================================================

impl ContentStore for MemoryStore {
    fn root(&self) -> NodeId {
        self.inner.tree.read().root
    }

    fn current_actor(&self) -> String {
        self.inner.actor.clone()
    }

    fn node(&self, id: NodeId) -> Result<Node> {
        let tree = self.inner.tree.read();
        let entry = tree.entry(id)?;
        Ok(Node {
            id,
            name: entry.name.clone(),
            path: tree.path_of(id)?,
            primary_type: entry.primary_type.clone(),
            mixins: entry.mixins.clone(),
            identifier: entry.identifier.clone(),
            is_new: entry.is_new,
            checked_out: entry.checked_out,
        })
    }

    fn node_at(&self, path: &str) -> Result<Option<NodeId>> {
        if !path.starts_with('/') {
            return Err(Error::InvalidPath(format!("'{path}' is not absolute")));
        }
        let tree = self.inner.tree.read();
        let mut current = tree.root;
        for segment in paths::segments(path) {
            match tree.child_named(current, segment)? {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    fn node_by_identifier(&self, identifier: &str) -> Result<Option<NodeId>> {
        Ok(self.inner.tree.read().identifiers.get(identifier).copied())
    }

    fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.inner.tree.read().entry(id)?.parent)
    }

    fn path(&self, id: NodeId) -> Result<String> {
        self.inner.tree.read().path_of(id)
    }

    fn child(&self, id: NodeId, name: &str) -> Result<Option<NodeId>> {
        self.inner.tree.read().child_named(id, name)
    }

    fn children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.inner.tree.read().entry(id)?.children.clone())
    }

    fn is_node_type(&self, id: NodeId, type_name: &str) -> Result<bool> {
        let schema = self.inner.schema.read();
        let tree = self.inner.tree.read();
        let entry = tree.entry(id)?;
        if entry.primary_type == type_name || entry.mixins.iter().any(|m| m == type_name) {
            return Ok(true);
        }
        // mix:versionable extends mix:referenceable
        Ok(type_name == MIX_REFERENCEABLE && schema.is_referenceable(entry))
    }

    fn add_child(&self, id: NodeId, name: &str, primary_type: Option<&str>) -> Result<NodeId> {
        valid_name(name)?;
        let schema = self.inner.schema.read();
        let mut tree = self.inner.tree.write();
        if tree.child_named(id, name)?.is_some() {
            return Err(Error::ItemExists(paths::join(&tree.path_of(id)?, name)));
        }

        let child = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        tree.entry_mut(id)?.children.push(child);
        tree.nodes.insert(child, NodeEntry {
            name: name.to_string(),
            parent: Some(id),
            primary_type: primary_type.unwrap_or(&schema.default_primary_type).to_string(),
            mixins: SmallVec::new(),
            children: Vec::new(),
            properties: HashMap::new(),
            identifier: None,
            is_new: true,
            checked_out: true,
        });
        tree.ensure_identifier(child, &schema)?;
        Ok(child)
    }

    fn remove_node(&self, id: NodeId) -> Result<()> {
        let mut tree = self.inner.tree.write();
        let parent = tree
            .entry(id)?
            .parent
            .ok_or_else(|| Error::ConstraintViolation("cannot remove the root node".into()))?;

        for gone in tree.subtree(id) {
            if let Some(entry) = tree.nodes.remove(&gone) {
                if let Some(identifier) = entry.identifier {
                    tree.identifiers.remove(&identifier);
                }
            }
        }
        tree.entry_mut(parent)?.children.retain(|c| *c != id);
        Ok(())
    }

    fn add_mixin(&self, id: NodeId, mixin: &str) -> Result<()> {
        let schema = self.inner.schema.read();
        let mut tree = self.inner.tree.write();
        let entry = tree.entry_mut(id)?;
        if !entry.mixins.iter().any(|m| m == mixin) {
            entry.mixins.push(mixin.to_string());
        }
        tree.ensure_identifier(id, &schema)
    }

    fn checkin(&self, id: NodeId) -> Result<()> {
        let mut tree = self.inner.tree.write();
        let path = tree.path_of(id)?;
        let entry = tree.entry_mut(id)?;
        if !entry.mixins.iter().any(|m| m == MIX_VERSIONABLE) {
            return Err(Error::ConstraintViolation(format!("{path} is not versionable")));
        }
        entry.checked_out = false;
        Ok(())
    }

    fn property(&self, id: NodeId, name: &str) -> Result<Option<Property>> {
        let schema = self.inner.schema.read();
        let tree = self.inner.tree.read();
        let Some(prop) = tree.entry(id)?.properties.get(name) else {
            return Ok(None);
        };
        Ok(Some(Property {
            name: name.to_string(),
            path: paths::join(&tree.path_of(id)?, name),
            property_type: prop.property_type,
            value: prop.value.clone(),
            mandatory: schema.mandatory.contains(name),
            is_new: prop.is_new,
        }))
    }

    fn set_property(
        &self,
        id: NodeId,
        name: &str,
        value: PropertyValue,
        property_type: PropertyType,
    ) -> Result<String> {
        valid_name(name)?;
        let schema = self.inner.schema.read();
        let mut tree = self.inner.tree.write();
        let path = paths::join(&tree.path_of(id)?, name);
        if schema.protected.contains(name) {
            return Err(Error::ConstraintViolation(format!("{path} is protected")));
        }

        let value = convert(value, property_type)?;
        let entry = tree.entry_mut(id)?;
        let existing = entry.properties.get(name);
        if let Some(existing) = existing {
            if existing.value.cardinality() != value.cardinality() {
                let expected = match existing.value.cardinality() {
                    Cardinality::Single => "single-valued property",
                    Cardinality::Multi => "multi-valued property",
                };
                return Err(Error::ValueFormat { expected: expected.into(), value: path });
            }
        }

        let resolved_type = match property_type {
            PropertyType::Undefined => value
                .values()
                .first()
                .map(Value::property_type)
                .or(existing.map(|e| e.property_type))
                .unwrap_or(PropertyType::String),
            explicit => explicit,
        };
        let is_new = existing.is_none_or(|e| e.is_new);
        entry.properties.insert(name.to_string(), PropertyEntry {
            property_type: resolved_type,
            value,
            is_new,
        });
        Ok(path)
    }

    fn remove_property(&self, id: NodeId, name: &str) -> Result<Option<String>> {
        let mut tree = self.inner.tree.write();
        let path = paths::join(&tree.path_of(id)?, name);
        Ok(tree.entry_mut(id)?.properties.remove(name).map(|_| path))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_lookup_node() {
        let store = MemoryStore::new();
        let a = store.add_child(store.root(), "a", None).unwrap();
        let b = store.add_child(a, "b", Some("nt:folder")).unwrap();

        assert_eq!(store.path(b).unwrap(), "/a/b");
        assert_eq!(store.node_at("/a/b").unwrap(), Some(b));
        assert_eq!(store.node(a).unwrap().primary_type, "nt:unstructured");
        assert!(store.node(b).unwrap().is_new);
        assert!(store.node_at("/a/c").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_child_fails() {
        let store = MemoryStore::new();
        store.add_child(store.root(), "a", None).unwrap();
        assert!(matches!(
            store.add_child(store.root(), "a", None),
            Err(Error::ItemExists(_))
        ));
    }

    #[test]
    fn test_referenceable_mixin_assigns_identifier() {
        let store = MemoryStore::new();
        let a = store.add_child(store.root(), "a", None).unwrap();
        assert!(store.node(a).unwrap().identifier.is_none());

        store.add_mixin(a, MIX_REFERENCEABLE).unwrap();
        let id = store.node(a).unwrap().identifier.unwrap();
        assert_eq!(store.node_by_identifier(&id).unwrap(), Some(a));
    }

    #[test]
    fn test_versionable_implies_referenceable() {
        let store = MemoryStore::new();
        let a = store.add_child(store.root(), "a", None).unwrap();
        store.add_mixin(a, MIX_VERSIONABLE).unwrap();
        assert!(store.is_node_type(a, MIX_REFERENCEABLE).unwrap());
        assert!(store.node(a).unwrap().is_referenceable());
    }

    #[test]
    fn test_set_property_converts_and_reports_path() {
        let store = MemoryStore::new();
        let a = store.add_child(store.root(), "a", None).unwrap();
        let path = store
            .set_property(a, "n", PropertyValue::Single(Value::from("7")), PropertyType::Long)
            .unwrap();

        assert_eq!(path, "/a/n");
        let prop = store.property(a, "n").unwrap().unwrap();
        assert_eq!(prop.property_type, PropertyType::Long);
        assert_eq!(prop.value, PropertyValue::Single(Value::Long(7)));
    }

    #[test]
    fn test_cardinality_switch_is_rejected() {
        let store = MemoryStore::new();
        let a = store.add_child(store.root(), "a", None).unwrap();
        store
            .set_property(a, "p", PropertyValue::Single(Value::from("x")), PropertyType::Undefined)
            .unwrap();
        let err = store.set_property(
            a,
            "p",
            PropertyValue::Multi(vec![Value::from("x"), Value::from("y")]),
            PropertyType::Undefined,
        );
        assert!(matches!(err, Err(Error::ValueFormat { .. })));
    }

    #[test]
    fn test_protected_property_is_refused() {
        let store = MemoryStore::new();
        store.protect_property("jcr:created");
        let a = store.add_child(store.root(), "a", None).unwrap();
        let err = store.set_property(
            a,
            "jcr:created",
            PropertyValue::Single(Value::from("x")),
            PropertyType::Undefined,
        );
        assert!(matches!(err, Err(Error::ConstraintViolation(_))));
    }

    #[test]
    fn test_save_clears_new_flags() {
        let store = MemoryStore::new();
        let a = store.add_child(store.root(), "a", None).unwrap();
        store
            .set_property(a, "p", PropertyValue::Single(Value::from("x")), PropertyType::Undefined)
            .unwrap();
        store.save();

        assert!(!store.node(a).unwrap().is_new);
        assert!(!store.property(a, "p").unwrap().unwrap().is_new);
    }

    #[test]
    fn test_remove_node_drops_subtree_and_identifiers() {
        let store = MemoryStore::new();
        let a = store.add_child(store.root(), "a", None).unwrap();
        let b = store.add_child(a, "b", Some("nt:resource")).unwrap();
        let id = store.node(b).unwrap().identifier.unwrap();

        store.remove_node(a).unwrap();
        assert!(store.node(b).is_err());
        assert!(store.node_by_identifier(&id).unwrap().is_none());
        assert!(store.children(store.root()).unwrap().is_empty());
    }

    #[test]
    fn test_checkin_requires_versionable() {
        let store = MemoryStore::new();
        let a = store.add_child(store.root(), "a", None).unwrap();
        assert!(store.checkin(a).is_err());

        store.add_mixin(a, MIX_VERSIONABLE).unwrap();
        store.checkin(a).unwrap();
        assert!(!store.node(a).unwrap().checked_out);
    }
}
