//! End-to-end tests for users, groups and access control entries.

use content_loader::security::hash_path;
use content_loader::{
    AccessControlEntry, ContentBuilder, IdentityMaterializer, ImportOptions, MemoryDirectory, MemoryStore,
    PrincipalDirectory, PropertyMap, Value,
};
use pretty_assertions::assert_eq;
use regex::Regex;

#[test]
fn test_group_with_unknown_member() {
    let identities = IdentityMaterializer::new(MemoryDirectory::new());
    let group = identities.create_group("editors", &["alice"], None).unwrap();

    assert!(group.is_group());
    assert!(group.members.is_empty());
    let layout = Regex::new(r"^/home/groups/[0-9a-f]{2}/[0-9a-f]{2}/[0-9a-f]{2}/editors$").unwrap();
    assert!(layout.is_match(&group.path), "{}", group.path);
    assert_eq!(group.path, format!("/home/groups/{}editors", hash_path("editors")));
}

#[test]
fn test_membership_after_user_exists() {
    let identities = IdentityMaterializer::new(MemoryDirectory::new());
    identities.create_group("editors", &["alice"], None).unwrap();

    let mut extra = PropertyMap::new();
    extra.insert("displayName".into(), Value::from("Alice"));
    let alice = identities.create_user("alice", "s3cret", Some(&extra)).unwrap();
    assert!(alice.password_digest.as_deref().is_some_and(|d| d.starts_with("{blake3}")));
    assert_eq!(alice.properties.get("displayName"), Some(&Value::from("Alice")));

    let editors = identities.create_group("editors", &["alice", "alice"], None).unwrap();
    assert_eq!(editors.members, vec!["alice".to_string()]);
}

#[test]
fn test_builder_writes_ace_on_current_node() {
    let store = MemoryStore::new();
    let directory = MemoryDirectory::new();
    let identities = IdentityMaterializer::new(directory.clone());
    identities.create_user("alice", "pw", None).unwrap();

    let mut builder = ContentBuilder::new(&store, ImportOptions::default());
    builder.enter_node(Some("content"), None, &[]).unwrap();
    builder.enter_node(Some("site"), None, &[]).unwrap();
    builder
        .create_ace(&identities, "alice", &["jcr:read"], &["jcr:removeNode"])
        .unwrap();

    assert_eq!(
        directory.entries("/content/site").unwrap(),
        vec![
            AccessControlEntry::allow("alice", vec!["jcr:read".into()]),
            AccessControlEntry::deny("alice", vec!["jcr:removeNode".into()]),
        ]
    );
}
