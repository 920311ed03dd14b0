//! End-to-end tests for deferred reference resolution through the builder.

use content_loader::{
    ContentBuilder, ContentStore, ImportOptions, MemoryStore, PropertyType, PropertyValue, Slot, Value,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const REFERENCEABLE: &str = "mix:referenceable";

fn identifier(store: &MemoryStore, path: &str) -> String {
    let node = store.node_at(path).unwrap().unwrap();
    store.node(node).unwrap().identifier.unwrap()
}

fn value_at(store: &MemoryStore, path: &str, name: &str) -> Option<PropertyValue> {
    let node = store.node_at(path).unwrap()?;
    store.property(node, name).unwrap().map(|p| p.value)
}

// ============================================================================
// 1. The a/b scenario
// ============================================================================

#[test]
fn test_parent_reference_resolves_immediately() {
    let store = MemoryStore::new();
    let mut builder = ContentBuilder::new(&store, ImportOptions::default());

    builder.enter_node(Some("a"), None, &[REFERENCEABLE]).unwrap();
    builder.create_properties("lastModified", PropertyType::Undefined, &[]).unwrap();
    builder.enter_node(Some("b"), None, &[]).unwrap();
    builder.create_properties("ref", PropertyType::Reference, &["..".to_string()]).unwrap();
    builder.finish_node().unwrap();
    builder.finish_node().unwrap();

    assert_eq!(builder.depth(), 1);
    assert!(builder.ledger().is_empty());
    assert_eq!(
        value_at(&store, "/a/b", "ref"),
        Some(PropertyValue::Multi(vec![Value::Reference(identifier(&store, "/a"))]))
    );
    let stamped = store.property(store.node_at("/a").unwrap().unwrap(), "lastModified").unwrap().unwrap();
    assert_eq!(stamped.property_type, PropertyType::Date);
}

#[test]
fn test_parent_sibling_syntax_resolves_against_owner() {
    let store = MemoryStore::new();
    let mut builder = ContentBuilder::new(&store, ImportOptions::default());

    builder.enter_node(Some("a"), None, &[REFERENCEABLE]).unwrap();
    builder.enter_node(Some("b"), None, &[]).unwrap();
    builder.create_property("ref", PropertyType::Reference, "../a").unwrap();

    assert_eq!(builder.ledger().waiting_on("/a/a"), ["/a/b/ref".to_string()]);
}

// ============================================================================
// 2. Forward references
// ============================================================================

proptest! {
    #[test]
    fn prop_forward_reference_survives_unrelated_nodes(unrelated in 0usize..8) {
        let store = MemoryStore::new();
        let mut builder = ContentBuilder::new(&store, ImportOptions::default());

        builder.enter_node(Some("a"), None, &[]).unwrap();
        builder.create_property("next", PropertyType::Reference, "/b").unwrap();
        builder.finish_node().unwrap();
        prop_assert!(value_at(&store, "/a", "next").is_none());

        for i in 0..unrelated {
            builder.enter_node(Some(&format!("n{i}")), None, &[REFERENCEABLE]).unwrap();
            builder.finish_node().unwrap();
        }
        prop_assert_eq!(builder.ledger().waiting_on("/b"), ["/a/next".to_string()]);

        builder.enter_node(Some("b"), None, &[REFERENCEABLE]).unwrap();
        builder.finish_node().unwrap();

        prop_assert_eq!(
            value_at(&store, "/a", "next"),
            Some(PropertyValue::Single(Value::Reference(identifier(&store, "/b"))))
        );
        prop_assert!(builder.finish().unresolved.is_empty());
    }
}

#[test]
fn test_multi_reference_partial_resolution() {
    let store = MemoryStore::new();
    let mut builder = ContentBuilder::new(&store, ImportOptions::default());
    for name in ["t1", "t2"] {
        builder.enter_node(Some(name), None, &[REFERENCEABLE]).unwrap();
        builder.finish_node().unwrap();
    }

    let targets = ["/t1".to_string(), "/t2".to_string(), "/t3".to_string()];
    builder.enter_node(Some("a"), None, &[]).unwrap();
    builder.create_properties("refs", PropertyType::Reference, &targets).unwrap();
    builder.finish_node().unwrap();

    let t1 = identifier(&store, "/t1");
    let t2 = identifier(&store, "/t2");
    assert_eq!(
        value_at(&store, "/a", "refs"),
        Some(PropertyValue::Multi(vec![
            Value::Reference(t1.clone()),
            Value::Reference(t2.clone()),
            Value::Path("/t3".into()),
        ]))
    );
    assert_eq!(
        builder.ledger().partial("/a/refs"),
        Some(&[Slot::Resolved(t1.clone()), Slot::Resolved(t2.clone()), Slot::Pending("/t3".into())][..])
    );

    for name in ["x", "y"] {
        builder.enter_node(Some(name), None, &[]).unwrap();
        builder.finish_node().unwrap();
    }
    builder.enter_node(Some("t3"), None, &[REFERENCEABLE]).unwrap();
    assert!(!builder.ledger().is_empty());
    builder.finish_node().unwrap();

    let t3 = identifier(&store, "/t3");
    assert_eq!(
        value_at(&store, "/a", "refs"),
        Some(PropertyValue::Multi(vec![Value::Reference(t1), Value::Reference(t2), Value::Reference(t3)]))
    );
    let refs = store.property(store.node_at("/a").unwrap().unwrap(), "refs").unwrap().unwrap();
    assert_eq!(refs.property_type, PropertyType::Reference);
    assert!(builder.ledger().partial("/a/refs").is_none());
    assert!(builder.ledger().is_empty());
}

#[test]
fn test_repeated_forward_target_in_one_array() {
    let store = MemoryStore::new();
    let mut builder = ContentBuilder::new(&store, ImportOptions::default());

    builder.enter_node(Some("a"), None, &[]).unwrap();
    builder
        .create_properties("refs", PropertyType::Reference, &["/t".to_string(), "/t".to_string()])
        .unwrap();
    builder.finish_node().unwrap();
    builder.enter_node(Some("t"), None, &[REFERENCEABLE]).unwrap();
    builder.finish_node().unwrap();

    let t = identifier(&store, "/t");
    assert_eq!(
        value_at(&store, "/a", "refs"),
        Some(PropertyValue::Multi(vec![Value::Reference(t.clone()), Value::Reference(t)]))
    );
    assert!(builder.finish().unresolved.is_empty());
}

#[test]
fn test_forward_array_written_twice_before_target() {
    let store = MemoryStore::new();
    let mut builder = ContentBuilder::new(&store, ImportOptions::default());

    builder.enter_node(Some("a"), None, &[]).unwrap();
    builder.create_properties("refs", PropertyType::Reference, &["/t".to_string()]).unwrap();
    builder
        .create_properties("refs", PropertyType::Reference, &["/t".to_string(), "/u".to_string()])
        .unwrap();
    builder.finish_node().unwrap();
    assert_eq!(builder.ledger().waiting_on("/t"), ["/a/refs".to_string()]);

    for name in ["t", "u"] {
        builder.enter_node(Some(name), None, &[REFERENCEABLE]).unwrap();
        builder.finish_node().unwrap();
    }

    assert_eq!(
        value_at(&store, "/a", "refs"),
        Some(PropertyValue::Multi(vec![
            Value::Reference(identifier(&store, "/t")),
            Value::Reference(identifier(&store, "/u")),
        ]))
    );
    assert!(builder.ledger().is_empty());
}

// ============================================================================
// 3. Dangling and dropped references
// ============================================================================

#[test]
fn test_dangling_reference_is_reported() {
    let store = MemoryStore::new();
    let mut builder = ContentBuilder::new(&store, ImportOptions::default());
    builder.enter_node(Some("a"), None, &[]).unwrap();
    builder.create_property("missing", PropertyType::Reference, "nowhere").unwrap();
    builder.finish_node().unwrap();

    let summary = builder.finish();
    assert_eq!(summary.unresolved, vec![("/a/nowhere".to_string(), "/a/missing".to_string())]);
    assert!(value_at(&store, "/a", "missing").is_none());
}

#[test]
fn test_reference_to_non_referenceable_node_is_dropped() {
    let store = MemoryStore::new();
    let mut builder = ContentBuilder::new(&store, ImportOptions::default());
    builder.enter_node(Some("a"), None, &[]).unwrap();
    builder.create_property("ref", PropertyType::Reference, "/b").unwrap();
    builder.finish_node().unwrap();
    builder.enter_node(Some("b"), None, &[]).unwrap();
    builder.finish_node().unwrap();

    assert!(builder.ledger().is_empty());
    assert!(value_at(&store, "/a", "ref").is_none());
}
