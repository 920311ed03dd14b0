//! Node in the content tree.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Opaque node handle, valid for the lifetime of the node in its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mixin type that makes a node a valid reference target.
pub const MIX_REFERENCEABLE: &str = "mix:referenceable";
/// Mixin type that marks a node for version checkin.
pub const MIX_VERSIONABLE: &str = "mix:versionable";

/// Snapshot of a node as reported by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// Absolute path; `/` for the root.
    pub path: String,
    pub primary_type: String,
    pub mixins: SmallVec<[String; 2]>,
    /// Stable identifier; present iff the node is referenceable.
    pub identifier: Option<String>,
    /// Created in the current session (not yet saved).
    pub is_new: bool,
    pub checked_out: bool,
}

impl Node {
    pub fn has_mixin(&self, mixin: &str) -> bool {
        self.mixins.iter().any(|m| m == mixin)
    }

    pub fn is_referenceable(&self) -> bool {
        self.identifier.is_some()
    }
}
