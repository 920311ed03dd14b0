//! Reference parsing for REFERENCE / WEAKREFERENCE input.

use crate::model::{Value, MIX_REFERENCEABLE};
use crate::storage::ContentStore;

/// Resolves raw reference input to a reference value.
pub trait ReferenceParser {
    /// `None` when the input does not denote a referenceable node.
    fn parse(&self, store: &dyn ContentStore, raw: &str, weak: bool) -> Option<Value>;

    /// All-or-nothing: `None` as soon as one value fails.
    fn parse_all(&self, store: &dyn ContentStore, raws: &[String], weak: bool) -> Option<Vec<Value>> {
        raws.iter().map(|raw| self.parse(store, raw, weak)).collect()
    }
}

/// Reference parser backed by the store.
///
/// Input starting with `/` is looked up as an absolute path; anything else is
/// taken as a node identifier. Lookup errors count as "not resolvable".
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreReferenceParser;

impl StoreReferenceParser {
    fn identifier_of(store: &dyn ContentStore, raw: &str) -> Option<String> {
        let id = if raw.starts_with('/') {
            store.node_at(raw).ok()??
        } else {
            store.node_by_identifier(raw).ok()??
        };
        if !store.is_node_type(id, MIX_REFERENCEABLE).ok()? {
            return None;
        }
        store.node(id).ok()?.identifier
    }
}

impl ReferenceParser for StoreReferenceParser {
    fn parse(&self, store: &dyn ContentStore, raw: &str, weak: bool) -> Option<Value> {
        let identifier = Self::identifier_of(store, raw.trim())?;
        Some(if weak {
            Value::WeakReference(identifier)
        } else {
            Value::Reference(identifier)
        })
    }
}
