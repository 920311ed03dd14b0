//! In-memory principal directory.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;

use crate::model::{PropertyMap, Value};
use crate::{Error, Result};
use super::{AccessControlEntry, Authorizable, AuthorizableKind, PrincipalDirectory};

const USERS_ROOT: &str = "/home/users/";
const GROUPS_ROOT: &str = "/home/groups/";

/// Privileges every fresh directory understands.
pub const DEFAULT_PRIVILEGES: &[&str] = &[
    "jcr:read",
    "jcr:write",
    "jcr:all",
    "jcr:modifyProperties",
    "jcr:addChildNodes",
    "jcr:removeNode",
    "jcr:removeChildNodes",
    "jcr:readAccessControl",
    "jcr:modifyAccessControl",
    "jcr:lockManagement",
    "jcr:versionManagement",
    "jcr:nodeTypeManagement",
    "jcr:retentionManagement",
    "jcr:lifecycleManagement",
];

/// Directory of users, groups and access control lists. Cloning yields
/// another handle to the same state.
#[derive(Clone)]
pub struct MemoryDirectory {
    inner: Arc<RwLock<DirectoryState>>,
}

#[derive(Default)]
struct DirectoryState {
    authorizables: HashMap<String, Authorizable>,
    acls: HashMap<String, Vec<AccessControlEntry>>,
    privileges: HashSet<String>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        let state = DirectoryState {
            privileges: DEFAULT_PRIVILEGES.iter().map(|p| p.to_string()).collect(),
            ..DirectoryState::default()
        };
        Self { inner: Arc::new(RwLock::new(state)) }
    }

    /// Register an additional (custom) privilege name.
    pub fn add_privilege(&self, name: &str) {
        self.inner.write().privileges.insert(name.to_string());
    }

    pub fn len(&self) -> usize {
        self.inner.read().authorizables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, authorizable: Authorizable) -> Result<Authorizable> {
        let mut state = self.inner.write();
        if state.authorizables.contains_key(&authorizable.id) {
            return Err(Error::ItemExists(authorizable.id));
        }
        state.authorizables.insert(authorizable.id.clone(), authorizable.clone());
        Ok(authorizable)
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl PrincipalDirectory for MemoryDirectory {
    fn authorizable(&self, id: &str) -> Result<Option<Authorizable>> {
        Ok(self.inner.read().authorizables.get(id).cloned())
    }

    fn create_user(&self, id: &str, password_digest: &str, intermediate_path: &str) -> Result<Authorizable> {
        self.insert(Authorizable {
            id: id.to_string(),
            kind: AuthorizableKind::User,
            path: format!("{USERS_ROOT}{intermediate_path}{id}"),
            members: Vec::new(),
            properties: PropertyMap::new(),
            password_digest: Some(password_digest.to_string()),
        })
    }

    fn create_group(&self, id: &str, intermediate_path: &str) -> Result<Authorizable> {
        self.insert(Authorizable {
            id: id.to_string(),
            kind: AuthorizableKind::Group,
            path: format!("{GROUPS_ROOT}{intermediate_path}{id}"),
            members: Vec::new(),
            properties: PropertyMap::new(),
            password_digest: None,
        })
    }

    fn add_member(&self, group: &str, member: &str) -> Result<bool> {
        let mut state = self.inner.write();
        if !state.authorizables.contains_key(member) {
            return Err(Error::NotFound(format!("principal {member}")));
        }
        let group = state
            .authorizables
            .get_mut(group)
            .filter(|a| a.is_group())
            .ok_or_else(|| Error::NotFound(format!("group {group}")))?;
        if group.members.iter().any(|m| m == member) {
            return Ok(false);
        }
        group.members.push(member.to_string());
        Ok(true)
    }

    fn set_property(&self, id: &str, name: &str, value: Value) -> Result<()> {
        let mut state = self.inner.write();
        let authorizable = state
            .authorizables
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("principal {id}")))?;
        authorizable.properties.insert(name.to_string(), value);
        Ok(())
    }

    fn entries(&self, resource_path: &str) -> Result<Vec<AccessControlEntry>> {
        Ok(self.inner.read().acls.get(resource_path).cloned().unwrap_or_default())
    }

    fn replace_entries(&self, resource_path: &str, entries: Vec<AccessControlEntry>) -> Result<()> {
        let mut state = self.inner.write();
        if entries.is_empty() {
            state.acls.remove(resource_path);
        } else {
            state.acls.insert(resource_path.to_string(), entries);
        }
        Ok(())
    }

    fn is_known_privilege(&self, name: &str) -> bool {
        self.inner.read().privileges.contains(name)
    }
}
