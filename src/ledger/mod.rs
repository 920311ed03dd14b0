//! # Reference Resolution Ledger
//!
//! Tracks REFERENCE properties whose target node does not exist yet.
//!
//! | Map | Key | Value |
//! |-----|-----|-------|
//! | `pending` | absolute target path | property paths waiting on it, in order |
//! | `partial` | property path of a multi-valued reference | one `Slot` per value |
//!
//! When the builder finishes a node, `on_node_finished` drains the entry for
//! that node's path and writes the now-known identifier into every waiting
//! property. Entries left over at the end of a session are dangling
//! references; they are reported, never fatal.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::path as paths;
use crate::model::*;
use crate::storage::ContentStore;
use crate::Result;

/// One value of a multi-valued reference property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    /// Identifier of an existing referenceable node.
    Resolved(String),
    /// Absolute path of a target that has not been created yet.
    Pending(String),
}

impl Slot {
    pub fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending(_))
    }

    /// Stored form: a reference for resolved slots, the target path as a
    /// PATH placeholder for pending ones.
    pub fn to_value(&self) -> Value {
        match self {
            Slot::Resolved(id) => Value::Reference(id.clone()),
            Slot::Pending(target) => Value::Path(target.clone()),
        }
    }
}

/// Deferred-reference bookkeeping of one import session.
#[derive(Debug, Default)]
pub struct ReferenceLedger {
    pending: HashMap<String, Vec<String>>,
    partial: HashMap<String, Vec<Slot>>,
}

impl ReferenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Resolve `raw_target` relative to `owner`, or remember the property as
    /// waiting on it.
    ///
    /// Returns the target's identifier when it exists and is referenceable.
    /// A missing target is recorded and yields `None`; an existing target that
    /// is not referenceable also yields `None` but is not recorded.
    pub fn record_or_resolve<S: ContentStore + ?Sized>(
        &mut self,
        store: &S,
        owner: NodeId,
        name: &str,
        raw_target: &str,
    ) -> Result<Option<String>> {
        let owner_path = store.path(owner)?;
        let property_path = paths::join(&owner_path, name);
        match self.resolve_slot(store, &owner_path, &property_path, raw_target)? {
            Some(Slot::Resolved(id)) => Ok(Some(id)),
            Some(Slot::Pending(_)) | None => Ok(None),
        }
    }

    /// Multi-valued variant of [`record_or_resolve`](Self::record_or_resolve).
    ///
    /// Targets that exist but are not referenceable are dropped from the
    /// result. When at least one slot is pending, the slots are kept as the
    /// partial array of the property until every target has been finished.
    pub fn record_or_resolve_all<S: ContentStore + ?Sized>(
        &mut self,
        store: &S,
        owner: NodeId,
        name: &str,
        raw_targets: &[String],
    ) -> Result<Vec<Slot>> {
        let owner_path = store.path(owner)?;
        let property_path = paths::join(&owner_path, name);

        let mut slots = Vec::with_capacity(raw_targets.len());
        for raw in raw_targets {
            if let Some(slot) = self.resolve_slot(store, &owner_path, &property_path, raw)? {
                slots.push(slot);
            }
        }
        if slots.iter().any(Slot::is_pending) {
            self.partial.insert(property_path, slots.clone());
        }
        Ok(slots)
    }

    fn resolve_slot<S: ContentStore + ?Sized>(
        &mut self,
        store: &S,
        owner_path: &str,
        property_path: &str,
        raw_target: &str,
    ) -> Result<Option<Slot>> {
        let target = paths::absolutize(owner_path, raw_target.trim());
        match store.node_at(&target)? {
            Some(id) => {
                let node = store.node(id)?;
                match node.identifier {
                    Some(identifier) if store.is_node_type(id, MIX_REFERENCEABLE)? => {
                        Ok(Some(Slot::Resolved(identifier)))
                    }
                    _ => {
                        debug!(property = property_path, %target, "reference target is not referenceable");
                        Ok(None)
                    }
                }
            }
            None => {
                debug!(property = property_path, %target, "reference target not yet created");
                let waiting = self.pending.entry(target.clone()).or_default();
                if !waiting.iter().any(|p| p == property_path) {
                    waiting.push(property_path.to_string());
                }
                Ok(Some(Slot::Pending(target)))
            }
        }
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolve every property waiting on `node`.
    ///
    /// The ledger entry for the node's path is removed in all cases; for a
    /// node that is not referenceable the waiting properties are dropped.
    /// Multi-valued properties are only ever rewritten from their slots.
    pub fn on_node_finished<S: ContentStore + ?Sized>(
        &mut self,
        store: &S,
        node: NodeId,
        changes: &mut dyn ChangeSink,
    ) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let snapshot = store.node(node)?;
        let Some(waiting) = self.pending.remove(&snapshot.path) else {
            return Ok(());
        };
        let identifier = match snapshot.identifier {
            Some(id) if store.is_node_type(node, MIX_REFERENCEABLE)? => id,
            _ => {
                debug!(target_path = %snapshot.path, dropped = waiting.len(), "finished node is not referenceable");
                return Ok(());
            }
        };

        let mut handled = HashSet::with_capacity(waiting.len());
        for property_path in waiting {
            if !handled.insert(property_path.clone()) {
                continue;
            }
            let Some((owner_path, name)) = paths::split_parent(&property_path) else {
                continue;
            };
            let Some(owner) = store.node_at(owner_path)? else {
                debug!(property = %property_path, "owner of waiting reference is gone");
                continue;
            };

            let is_multi = store
                .property(owner, name)?
                .is_some_and(|p| p.is_multiple());
            let written = match (self.partial.get_mut(&property_path), is_multi) {
                (Some(slots), true) => {
                    for slot in slots.iter_mut() {
                        if *slot == Slot::Pending(snapshot.path.clone()) {
                            *slot = Slot::Resolved(identifier.clone());
                        }
                    }
                    let values = slots.iter().map(Slot::to_value).collect();
                    let complete = !slots.iter().any(Slot::is_pending);
                    if complete {
                        self.partial.remove(&property_path);
                    }
                    let property_type = if complete {
                        PropertyType::Reference
                    } else {
                        PropertyType::Undefined
                    };
                    store.set_property(owner, name, PropertyValue::Multi(values), property_type)?
                }
                (None, true) => {
                    debug!(property = %property_path, "multi-valued reference has no pending slots");
                    continue;
                }
                (_, false) => store.set_property(
                    owner,
                    name,
                    PropertyValue::Single(Value::Reference(identifier.clone())),
                    PropertyType::Reference,
                )?,
            };
            changes.record(Modification::on_modified(written));
        }
        Ok(())
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// No property is waiting on any target.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Target paths that still have waiting properties, sorted.
    pub fn pending_targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = self.pending.keys().map(String::as_str).collect();
        targets.sort_unstable();
        targets
    }

    /// Property paths waiting on `target`, in recording order.
    pub fn waiting_on(&self, target: &str) -> &[String] {
        self.pending.get(target).map_or(&[], Vec::as_slice)
    }

    /// Slots of a partially resolved multi-valued property.
    pub fn partial(&self, property_path: &str) -> Option<&[Slot]> {
        self.partial.get(property_path).map(Vec::as_slice)
    }

    /// Every dangling `(target, property)` pair, sorted by target.
    pub fn unresolved(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .pending
            .iter()
            .flat_map(|(target, props)| props.iter().map(move |p| (target.clone(), p.clone())))
            .collect();
        pairs.sort();
        pairs
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn referenceable(store: &MemoryStore, parent: NodeId, name: &str) -> NodeId {
        let id = store.add_child(parent, name, None).unwrap();
        store.add_mixin(id, MIX_REFERENCEABLE).unwrap();
        id
    }

    #[test]
    fn test_existing_target_resolves_immediately() {
        let store = MemoryStore::new();
        let t = referenceable(&store, store.root(), "t");
        let owner = store.add_child(store.root(), "o", None).unwrap();
        let mut ledger = ReferenceLedger::new();

        let id = ledger.record_or_resolve(&store, owner, "ref", "/t").unwrap();
        assert_eq!(id, store.node(t).unwrap().identifier);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_relative_target_is_normalized_against_owner() {
        let store = MemoryStore::new();
        let owner = store.add_child(store.root(), "o", None).unwrap();
        let mut ledger = ReferenceLedger::new();

        assert_eq!(ledger.record_or_resolve(&store, owner, "ref", "../x/./y").unwrap(), None);
        assert_eq!(ledger.pending_targets(), vec!["/x/y"]);
        assert_eq!(ledger.waiting_on("/x/y"), ["/o/ref".to_string()]);
    }

    #[test]
    fn test_non_referenceable_target_is_not_recorded() {
        let store = MemoryStore::new();
        store.add_child(store.root(), "plain", None).unwrap();
        let owner = store.add_child(store.root(), "o", None).unwrap();
        let mut ledger = ReferenceLedger::new();

        assert_eq!(ledger.record_or_resolve(&store, owner, "ref", "/plain").unwrap(), None);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_finish_resolves_single_reference() {
        let store = MemoryStore::new();
        let owner = store.add_child(store.root(), "o", None).unwrap();
        let mut ledger = ReferenceLedger::new();
        ledger.record_or_resolve(&store, owner, "ref", "/later").unwrap();

        let later = referenceable(&store, store.root(), "later");
        let mut changes: Vec<Modification> = Vec::new();
        ledger.on_node_finished(&store, later, &mut changes).unwrap();

        let id = store.node(later).unwrap().identifier.unwrap();
        let prop = store.property(owner, "ref").unwrap().unwrap();
        assert_eq!(prop.value, PropertyValue::Single(Value::Reference(id)));
        assert_eq!(changes, vec![Modification::on_modified("/o/ref")]);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_finishing_non_referenceable_target_drops_entry() {
        let store = MemoryStore::new();
        let owner = store.add_child(store.root(), "o", None).unwrap();
        let mut ledger = ReferenceLedger::new();
        ledger.record_or_resolve(&store, owner, "ref", "/later").unwrap();

        let later = store.add_child(store.root(), "later", None).unwrap();
        let mut changes: Vec<Modification> = Vec::new();
        ledger.on_node_finished(&store, later, &mut changes).unwrap();

        assert!(ledger.is_empty());
        assert!(changes.is_empty());
        assert!(!store.has_property(owner, "ref").unwrap());
    }

    #[test]
    fn test_partial_multi_value_is_patched_slot_by_slot() {
        let store = MemoryStore::new();
        let a = referenceable(&store, store.root(), "a");
        let owner = store.add_child(store.root(), "o", None).unwrap();
        let mut ledger = ReferenceLedger::new();

        let raws = vec!["/a".to_string(), "/b".to_string()];
        let slots = ledger.record_or_resolve_all(&store, owner, "refs", &raws).unwrap();
        let a_id = store.node(a).unwrap().identifier.unwrap();
        assert_eq!(slots, vec![Slot::Resolved(a_id.clone()), Slot::Pending("/b".into())]);
        assert_eq!(ledger.partial("/o/refs").map(<[Slot]>::len), Some(2));

        let values = slots.iter().map(Slot::to_value).collect();
        store
            .set_property(owner, "refs", PropertyValue::Multi(values), PropertyType::Undefined)
            .unwrap();

        let b = referenceable(&store, store.root(), "b");
        let mut changes: Vec<Modification> = Vec::new();
        ledger.on_node_finished(&store, b, &mut changes).unwrap();

        let b_id = store.node(b).unwrap().identifier.unwrap();
        let prop = store.property(owner, "refs").unwrap().unwrap();
        assert_eq!(
            prop.value,
            PropertyValue::Multi(vec![Value::Reference(a_id), Value::Reference(b_id)])
        );
        assert_eq!(prop.property_type, PropertyType::Reference);
        assert!(ledger.partial("/o/refs").is_none());
        assert!(ledger.unresolved().is_empty());
    }

    #[test]
    fn test_repeated_target_resolves_every_slot_once() {
        let store = MemoryStore::new();
        let owner = store.add_child(store.root(), "o", None).unwrap();
        let mut ledger = ReferenceLedger::new();

        let raws = vec!["/t".to_string(), "/t".to_string()];
        let slots = ledger.record_or_resolve_all(&store, owner, "refs", &raws).unwrap();
        assert_eq!(ledger.waiting_on("/t"), ["/o/refs".to_string()]);
        let values = slots.iter().map(Slot::to_value).collect();
        store
            .set_property(owner, "refs", PropertyValue::Multi(values), PropertyType::Undefined)
            .unwrap();

        let t = referenceable(&store, store.root(), "t");
        let mut changes: Vec<Modification> = Vec::new();
        ledger.on_node_finished(&store, t, &mut changes).unwrap();

        let t_id = store.node(t).unwrap().identifier.unwrap();
        let prop = store.property(owner, "refs").unwrap().unwrap();
        assert_eq!(
            prop.value,
            PropertyValue::Multi(vec![Value::Reference(t_id.clone()), Value::Reference(t_id)])
        );
        assert_eq!(changes, vec![Modification::on_modified("/o/refs")]);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_multi_value_without_slots_is_left_alone() {
        let store = MemoryStore::new();
        let owner = store.add_child(store.root(), "o", None).unwrap();
        let mut ledger = ReferenceLedger::new();
        ledger.record_or_resolve(&store, owner, "refs", "/t").unwrap();
        let kept = PropertyValue::Multi(vec![Value::from("x")]);
        store.set_property(owner, "refs", kept.clone(), PropertyType::String).unwrap();

        let t = referenceable(&store, store.root(), "t");
        let mut changes: Vec<Modification> = Vec::new();
        ledger.on_node_finished(&store, t, &mut changes).unwrap();

        assert_eq!(store.property(owner, "refs").unwrap().unwrap().value, kept);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_unresolved_lists_dangling_pairs() {
        let store = MemoryStore::new();
        let owner = store.add_child(store.root(), "o", None).unwrap();
        let mut ledger = ReferenceLedger::new();
        ledger.record_or_resolve(&store, owner, "x", "/z").unwrap();
        ledger.record_or_resolve(&store, owner, "y", "/m").unwrap();

        assert_eq!(
            ledger.unresolved(),
            vec![
                ("/m".to_string(), "/o/y".to_string()),
                ("/z".to_string(), "/o/x".to_string()),
            ]
        );
    }
}
