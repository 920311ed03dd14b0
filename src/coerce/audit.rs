//! Audit properties: creation and modification stamps filled in automatically
//! when a well-known property name arrives without a value.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::storage::ContentStore;
use crate::Result;

/// Automatic value behavior of a well-known property name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AutoProperty {
    Created,
    CreatedBy,
    Modified,
    ModifiedBy,
}

impl AutoProperty {
    /// Recognize a canonical or namespaced audit name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "created" | "jcr:created" => AutoProperty::Created,
            "createdBy" | "jcr:createdBy" => AutoProperty::CreatedBy,
            "lastModified" | "jcr:lastModified" => AutoProperty::Modified,
            "lastModifiedBy" | "jcr:lastModifiedBy" => AutoProperty::ModifiedBy,
            _ => return None,
        })
    }

    /// Creation stamps are only written on nodes created in this session.
    pub fn applies_to(self, node_is_new: bool) -> bool {
        match self {
            AutoProperty::Created | AutoProperty::CreatedBy => node_is_new,
            AutoProperty::Modified | AutoProperty::ModifiedBy => true,
        }
    }

    /// Write the automatic value under `name`.
    ///
    /// A removable property of the same name is deleted first; both steps are
    /// recorded in `changes`, the deletion first.
    pub fn stamp<S: ContentStore + ?Sized>(
        self,
        store: &S,
        node: NodeId,
        name: &str,
        now: DateTime<FixedOffset>,
        changes: &mut dyn ChangeSink,
    ) -> Result<()> {
        if !self.applies_to(store.is_new(node)?) {
            return Ok(());
        }
        let (value, property_type) = match self {
            AutoProperty::Created | AutoProperty::Modified => (Value::Date(now), PropertyType::Date),
            AutoProperty::CreatedBy | AutoProperty::ModifiedBy => {
                (Value::String(store.current_actor()), PropertyType::String)
            }
        };

        if let Some(removed) = remove_if_removable(store, node, name)? {
            changes.record(Modification::on_deleted(removed));
        }
        let path = store.set_property(node, name, PropertyValue::Single(value), property_type)?;
        changes.record(Modification::on_modified(path));
        Ok(())
    }
}

/// Remove a property unless it is absent or mandatory; returns the removed path.
pub(crate) fn remove_if_removable<S: ContentStore + ?Sized>(
    store: &S,
    node: NodeId,
    name: &str,
) -> Result<Option<String>> {
    match store.property(node, name)? {
        Some(prop) if !prop.mandatory => store.remove_property(node, name),
        _ => Ok(None),
    }
}
