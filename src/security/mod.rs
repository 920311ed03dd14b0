//! # Identity & Policy Materializer
//!
//! Creates users and groups, wires group membership and writes
//! per-principal access control entries.
//!
//! | Operation | Existing principal | Missing principal |
//! |-----------|--------------------|-------------------|
//! | `create_group` | must be a group, members/properties updated | created under `hash_path(name)` |
//! | `create_user` | must be a user, properties updated | created with a digested password |
//! | `create_ace` | entries merged per principal | `Error::NotFound` |
//!
//! The directory itself is a trait so an embedding can plug in its own user
//! management; `MemoryDirectory` is the reference implementation.

pub mod memory;

use std::sync::LazyLock;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{PropertyMap, Value};
use crate::{Error, Result};

pub use memory::MemoryDirectory;

/// Number of two-character folders above a principal's node.
const STORAGE_LEVELS: usize = 3;

// ============================================================================
// Principals and entries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorizableKind {
    User,
    Group,
}

/// A user or group as reported by the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authorizable {
    pub id: String,
    pub kind: AuthorizableKind,
    /// Storage path, including the hashed intermediate folders.
    pub path: String,
    /// Member ids; always empty for users.
    pub members: Vec<String>,
    pub properties: PropertyMap,
    pub password_digest: Option<String>,
}

impl Authorizable {
    pub fn is_group(&self) -> bool {
        self.kind == AuthorizableKind::Group
    }
}

/// One allow or deny entry of a resource's access control list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlEntry {
    pub principal: String,
    pub allow: bool,
    pub privileges: Vec<String>,
}

impl AccessControlEntry {
    pub fn allow(principal: impl Into<String>, privileges: Vec<String>) -> Self {
        Self { principal: principal.into(), allow: true, privileges }
    }

    pub fn deny(principal: impl Into<String>, privileges: Vec<String>) -> Self {
        Self { principal: principal.into(), allow: false, privileges }
    }
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// User management and access control storage.
pub trait PrincipalDirectory {
    fn authorizable(&self, id: &str) -> Result<Option<Authorizable>>;

    /// Create a user below `intermediate_path` (`"ab/cd/ef/"`).
    fn create_user(&self, id: &str, password_digest: &str, intermediate_path: &str) -> Result<Authorizable>;

    fn create_group(&self, id: &str, intermediate_path: &str) -> Result<Authorizable>;

    /// Returns `false` if `member` already belonged to `group`.
    fn add_member(&self, group: &str, member: &str) -> Result<bool>;

    fn set_property(&self, id: &str, name: &str, value: Value) -> Result<()>;

    /// Access control entries of a resource, in list order.
    fn entries(&self, resource_path: &str) -> Result<Vec<AccessControlEntry>>;

    fn replace_entries(&self, resource_path: &str, entries: Vec<AccessControlEntry>) -> Result<()>;

    fn is_known_privilege(&self, name: &str) -> bool;
}

/// One-way password digest stored with new users.
pub trait PasswordDigester {
    fn digest(&self, password: &str) -> String;
}

/// `{blake3}<hex>` password digests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Digester;

impl PasswordDigester for Blake3Digester {
    fn digest(&self, password: &str) -> String {
        format!("{{blake3}}{}", hex::encode(blake3::hash(password.as_bytes()).as_bytes()))
    }
}

// ============================================================================
// Hashed storage paths
// ============================================================================

static INSTANCE_SEED: LazyLock<u64> = LazyLock::new(rand::random);

/// Intermediate folder path for a principal: `"ab/cd/ef/"`.
///
/// The digest is salted with a per-process seed, so paths are stable within
/// one process and spread differently across processes.
pub fn hash_path(item: &str) -> String {
    let digest = hex::encode(blake3::hash(format!("{}{item}", *INSTANCE_SEED).as_bytes()).as_bytes());
    let mut path = String::with_capacity(STORAGE_LEVELS * 3);
    for level in 0..STORAGE_LEVELS {
        path.push_str(&digest[level * 2..level * 2 + 2]);
        path.push('/');
    }
    path
}

// ============================================================================
// IdentityMaterializer
// ============================================================================

pub struct IdentityMaterializer<D, P = Blake3Digester> {
    directory: D,
    digester: P,
}

impl<D: PrincipalDirectory> IdentityMaterializer<D> {
    pub fn new(directory: D) -> Self {
        Self::with_digester(directory, Blake3Digester)
    }
}

impl<D: PrincipalDirectory, P: PasswordDigester> IdentityMaterializer<D, P> {
    pub fn with_digester(directory: D, digester: P) -> Self {
        Self { directory, digester }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Create or update a group. Unknown members are skipped.
    pub fn create_group(
        &self,
        name: &str,
        members: &[&str],
        extra: Option<&PropertyMap>,
    ) -> Result<Authorizable> {
        match self.directory.authorizable(name)? {
            Some(existing) if !existing.is_group() => {
                return Err(Error::PrincipalKind(format!(
                    "a user already exists with the requested name: {name}"
                )));
            }
            Some(_) => {}
            None => {
                self.directory.create_group(name, &hash_path(name))?;
            }
        }

        for member in members {
            if self.directory.authorizable(member)?.is_none() {
                debug!(group = name, member, "unknown group member skipped");
                continue;
            }
            self.directory.add_member(name, member)?;
        }
        self.set_extra(name, extra)?;
        self.lookup(name)
    }

    /// Create or update a user. The password only applies to new users.
    pub fn create_user(
        &self,
        name: &str,
        password: &str,
        extra: Option<&PropertyMap>,
    ) -> Result<Authorizable> {
        match self.directory.authorizable(name)? {
            Some(existing) if existing.is_group() => {
                return Err(Error::PrincipalKind(format!(
                    "a group already exists with the requested name: {name}"
                )));
            }
            Some(_) => {}
            None => {
                let digest = self.digester.digest(password);
                self.directory.create_user(name, &digest, &hash_path(name))?;
            }
        }
        self.set_extra(name, extra)?;
        self.lookup(name)
    }

    /// Merge allow/deny entries for `principal` on `resource_path`.
    ///
    /// Existing privileges of the principal that this call does not mention
    /// are carried over. Groups never receive a deny entry.
    pub fn create_ace(
        &self,
        resource_path: &str,
        principal: &str,
        granted: &[&str],
        denied: &[&str],
    ) -> Result<()> {
        let authorizable = self
            .directory
            .authorizable(principal)?
            .ok_or_else(|| Error::NotFound(format!("no principal found for id: {principal}")))?;

        let granted: Vec<&str> = granted.iter().copied().filter(|p| !p.is_empty()).collect();
        let denied: Vec<&str> = denied.iter().copied().filter(|p| !p.is_empty()).collect();
        if let Some(unknown) = granted
            .iter()
            .chain(&denied)
            .find(|p| !self.directory.is_known_privilege(p))
        {
            return Err(Error::AccessControl(format!("unknown privilege: {unknown}")));
        }
        let posted: HashSet<&str> = granted.iter().chain(&denied).copied().collect();

        let mut preserved_allow = Vec::new();
        let mut preserved_deny = Vec::new();
        let mut entries = Vec::new();
        for entry in self.directory.entries(resource_path)? {
            if entry.principal != principal {
                entries.push(entry);
                continue;
            }
            let keep = entry
                .privileges
                .into_iter()
                .filter(|p| !posted.contains(p.as_str()));
            if entry.allow {
                preserved_allow.extend(keep);
            } else {
                preserved_deny.extend(keep);
            }
        }

        let allow: Vec<String> = granted.iter().map(|p| p.to_string()).chain(preserved_allow).collect();
        if !allow.is_empty() {
            entries.push(AccessControlEntry::allow(principal, allow));
        }
        if !authorizable.is_group() {
            let deny: Vec<String> = denied.iter().map(|p| p.to_string()).chain(preserved_deny).collect();
            if !deny.is_empty() {
                entries.push(AccessControlEntry::deny(principal, deny));
            }
        }
        self.directory.replace_entries(resource_path, entries)
    }

    fn set_extra(&self, id: &str, extra: Option<&PropertyMap>) -> Result<()> {
        for (key, value) in extra.into_iter().flatten() {
            self.directory.set_property(id, key, value.clone())?;
        }
        Ok(())
    }

    fn lookup(&self, id: &str) -> Result<Authorizable> {
        self.directory
            .authorizable(id)?
            .ok_or_else(|| Error::NotFound(format!("principal vanished: {id}")))
    }
}
