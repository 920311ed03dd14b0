//! # Content Store Trait
//!
//! This is THE contract between the import engine and any hierarchical
//! property store. The engine never touches storage except through it.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory tree for testing/embedding |
//!
//! All calls are synchronous and are the blocking unit of work. Each call is
//! atomic on its own; there is no multi-call transaction.

pub mod memory;

use crate::model::*;
use crate::{Error, Result};

pub use memory::MemoryStore;

/// The hierarchical property store contract.
///
/// Methods take `&self`; implementations use interior mutability so that one
/// store handle can be shared by the builder, the ledger and the parsers of a
/// session. Constraint violations surface as `Error::ConstraintViolation`.
pub trait ContentStore {
    // ========================================================================
    // Session context
    // ========================================================================

    /// Handle of the root node (`/`).
    fn root(&self) -> NodeId;

    /// Identity of the actor performing writes.
    fn current_actor(&self) -> String;

    // ========================================================================
    // Node lookup
    // ========================================================================

    /// Snapshot of a node. Fails with `NotFound` for stale handles.
    fn node(&self, id: NodeId) -> Result<Node>;

    /// Node at an absolute path, if any.
    fn node_at(&self, path: &str) -> Result<Option<NodeId>>;

    /// Node carrying the given stable identifier, if any.
    fn node_by_identifier(&self, identifier: &str) -> Result<Option<NodeId>>;

    fn parent(&self, id: NodeId) -> Result<Option<NodeId>>;

    /// Canonical absolute path of a node.
    fn path(&self, id: NodeId) -> Result<String> {
        Ok(self.node(id)?.path)
    }

    fn child(&self, id: NodeId, name: &str) -> Result<Option<NodeId>>;

    fn has_child(&self, id: NodeId, name: &str) -> Result<bool> {
        Ok(self.child(id, name)?.is_some())
    }

    /// Children in insertion order.
    fn children(&self, id: NodeId) -> Result<Vec<NodeId>>;

    fn is_new(&self, id: NodeId) -> Result<bool> {
        Ok(self.node(id)?.is_new)
    }

    /// True if the node's primary type or one of its mixins is (or implies) `type_name`.
    fn is_node_type(&self, id: NodeId, type_name: &str) -> Result<bool>;

    // ========================================================================
    // Node mutation
    // ========================================================================

    /// Create a child. `None` uses the store's default primary type.
    fn add_child(&self, id: NodeId, name: &str, primary_type: Option<&str>) -> Result<NodeId>;

    /// Remove a node and its whole subtree.
    fn remove_node(&self, id: NodeId) -> Result<()>;

    fn add_mixin(&self, id: NodeId, mixin: &str) -> Result<()>;

    /// Check in a versionable node.
    ///
    /// Default returns an error; override for stores with versioning.
    fn checkin(&self, _id: NodeId) -> Result<()> {
        Err(Error::Unsupported("versioning".into()))
    }

    // ========================================================================
    // Properties
    // ========================================================================

    fn property(&self, id: NodeId, name: &str) -> Result<Option<Property>>;

    fn has_property(&self, id: NodeId, name: &str) -> Result<bool> {
        Ok(self.property(id, name)?.is_some())
    }

    /// Set (upsert) a property and return its canonical path.
    ///
    /// Values are converted to `property_type` unless it is `Undefined`, in
    /// which case the store infers the type from the values. Writing a
    /// cardinality different from an existing property's is rejected.
    fn set_property(
        &self,
        id: NodeId,
        name: &str,
        value: PropertyValue,
        property_type: PropertyType,
    ) -> Result<String>;

    /// Remove a property. Returns the removed property's path, or `None` if absent.
    fn remove_property(&self, id: NodeId, name: &str) -> Result<Option<String>>;
}
