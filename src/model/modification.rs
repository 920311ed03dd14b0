//! Modification records and the change-log sink that receives them.

use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModificationKind {
    Modified,
    Deleted,
}

/// One applied change, in application order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub kind: ModificationKind,
    pub path: String,
}

impl Modification {
    pub fn on_modified(path: impl Into<String>) -> Self {
        Self { kind: ModificationKind::Modified, path: path.into() }
    }

    pub fn on_deleted(path: impl Into<String>) -> Self {
        Self { kind: ModificationKind::Deleted, path: path.into() }
    }
}

/// Append-only receiver of modification records.
pub trait ChangeSink {
    fn record(&mut self, change: Modification);
}

impl ChangeSink for Vec<Modification> {
    fn record(&mut self, change: Modification) {
        self.push(change);
    }
}

/// The change log of one import session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeLog {
    entries: Vec<Modification>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Modification] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Modification> {
        self.entries.iter()
    }

    /// Paths recorded with the given kind, in order.
    pub fn paths(&self, kind: ModificationKind) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|m| m.kind == kind)
            .map(|m| m.path.as_str())
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn into_inner(self) -> Vec<Modification> {
        self.entries
    }
}

impl ChangeSink for ChangeLog {
    fn record(&mut self, change: Modification) {
        tracing::trace!(kind = ?change.kind, path = %change.path, "change recorded");
        self.entries.push(change);
    }
}
