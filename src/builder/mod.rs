//! # Content Tree Builder
//!
//! A stack machine that turns a stream of enter / property / finish calls into
//! nodes and properties of a `ContentStore`.
//!
//! ```text
//! prepare(parent) ─► [parent]
//! enter_node("a")  ─► [parent, a]
//! enter_node("b")  ─► [parent, a, b]     create_property(..) writes on b
//! finish_node()    ─► [parent, a]        references waiting on /…/b resolve
//! finish_node()    ─► [parent]
//! ```
//!
//! The bottom frame is the caller-supplied parent and is never popped. The
//! first node pushed by `enter_node` becomes the import root.
//!
//! Property writes from the stream follow "first write wins": a property that
//! existed before the session is left alone unless `property_overwrite` is
//! set, so re-importing the same content is a no-op.

pub mod mime;
pub mod options;

use std::io::Read;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::coerce::{parse_strict_timestamp, AutoProperty, PropertyCoercer, RequestProperty, RequestValues};
use crate::ledger::{ReferenceLedger, Slot};
use crate::model::path as paths;
use crate::model::*;
use crate::security::{IdentityMaterializer, PasswordDigester, PrincipalDirectory};
use crate::storage::ContentStore;
use crate::{Error, Result};

pub use mime::{ExtensionMimeTable, MimeClassifier, DEFAULT_CONTENT_TYPE};
pub use options::ImportOptions;

pub const NT_FILE: &str = "nt:file";
pub const NT_RESOURCE: &str = "nt:resource";
pub const JCR_CONTENT: &str = "jcr:content";
pub const JCR_MIME_TYPE: &str = "jcr:mimeType";
pub const JCR_LAST_MODIFIED: &str = "jcr:lastModified";
pub const JCR_DATA: &str = "jcr:data";
/// Never written; `false` registers the node for checkin instead.
pub const JCR_IS_CHECKED_OUT: &str = "jcr:isCheckedOut";

// ============================================================================
// ImportSummary
// ============================================================================

/// Outcome of one import session.
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub root: Option<NodeId>,
    /// Nodes to hand to version checkin, in registration order.
    pub versionables: Vec<NodeId>,
    /// Paths of nodes created by this session, for uninstall.
    pub created_nodes: Vec<String>,
    pub changes: ChangeLog,
    /// Dangling `(target, property)` references.
    pub unresolved: Vec<(String, String)>,
}

// ============================================================================
// ContentBuilder
// ============================================================================

/// One import session over a store.
pub struct ContentBuilder<'s, S: ContentStore> {
    store: &'s S,
    options: ImportOptions,
    coercer: PropertyCoercer,
    mime: Box<dyn MimeClassifier>,
    stack: Vec<NodeId>,
    default_root_name: Option<String>,
    root_import: bool,
    root: Option<NodeId>,
    ignore_overwrite: bool,
    ledger: ReferenceLedger,
    versionables: Vec<NodeId>,
    created: Vec<String>,
    changes: ChangeLog,
}

impl<'s, S: ContentStore> ContentBuilder<'s, S> {
    /// Start a session below the store root.
    pub fn new(store: &'s S, options: ImportOptions) -> Self {
        let coercer = PropertyCoercer::with_parsers(options.date_parser(), Default::default());
        Self {
            store,
            coercer,
            mime: Box::new(ExtensionMimeTable::default()),
            stack: vec![store.root()],
            default_root_name: None,
            root_import: false,
            root: None,
            ignore_overwrite: false,
            ledger: ReferenceLedger::new(),
            versionables: Vec::new(),
            created: Vec::new(),
            changes: ChangeLog::new(),
            options,
        }
    }

    pub fn with_mime_classifier(mut self, classifier: impl MimeClassifier + 'static) -> Self {
        self.mime = Box::new(classifier);
        self
    }

    /// Pin the session's "now" (audit stamps, file timestamps).
    pub fn with_now(mut self, now: DateTime<FixedOffset>) -> Self {
        self.coercer = self.coercer.with_now(now);
        self
    }

    /// Reset the stack to `[parent]` for the next input.
    ///
    /// `None` as default root name selects root-node import: the top-level
    /// node of the input is `parent` itself rather than a new child.
    pub fn prepare(&mut self, parent: NodeId, default_root_name: Option<String>) {
        self.stack.clear();
        self.stack.push(parent);
        self.root_import = default_root_name.is_none();
        self.default_root_name = default_root_name;
        self.root = None;
    }

    /// Suppress overwrite mode for subsequent `enter_node` calls.
    pub fn set_ignore_overwrite(&mut self, ignore: bool) {
        self.ignore_overwrite = ignore;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn store(&self) -> &'s S {
        self.store
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Node on top of the stack.
    pub fn current(&self) -> NodeId {
        self.stack.last().copied().unwrap_or_else(|| self.store.root())
    }

    pub fn current_path(&self) -> Result<String> {
        self.store.path(self.current())
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn versionables(&self) -> &[NodeId] {
        &self.versionables
    }

    pub fn created_nodes(&self) -> &[String] {
        &self.created
    }

    pub fn changes(&self) -> &ChangeLog {
        &self.changes
    }

    pub fn ledger(&self) -> &ReferenceLedger {
        &self.ledger
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Enter (reuse or create) a child of the current node and push it.
    ///
    /// A missing name is only legal directly below the parent, where the
    /// default root name applies.
    pub fn enter_node(
        &mut self,
        name: Option<&str>,
        primary_type: Option<&str>,
        mixins: &[&str],
    ) -> Result<NodeId> {
        if self.root_import && self.stack.len() == 1 {
            let parent = self.current();
            self.apply_mixins(parent, mixins)?;
            return Ok(self.push(parent));
        }
        self.enter_child(name, primary_type, mixins)
    }

    fn enter_child(&mut self, name: Option<&str>, primary_type: Option<&str>, mixins: &[&str]) -> Result<NodeId> {
        let parent = self.current();
        let name = match name {
            Some(name) => name.to_string(),
            None if self.stack.len() == 1 => self
                .default_root_name
                .clone()
                .ok_or_else(|| Error::Structure("node needs to have a name".into()))?,
            None => return Err(Error::Structure("node needs to have a name".into())),
        };

        if self.options.overwrite && !self.ignore_overwrite {
            if let Some(existing) = self.store.child(parent, &name)? {
                debug!(node = %name, "overwrite: removing existing node");
                self.store.remove_node(existing)?;
            }
        }

        let node = match self.store.child(parent, &name)? {
            Some(existing) => existing,
            None => {
                let primary_type = primary_type.or(self.options.default_primary_type.as_deref());
                let created = self.store.add_child(parent, &name, primary_type)?;
                self.created.push(self.store.path(created)?);
                created
            }
        };
        self.apply_mixins(node, mixins)?;
        Ok(self.push(node))
    }

    /// Pop the current node and resolve references waiting on it.
    pub fn finish_node(&mut self) -> Result<NodeId> {
        if self.stack.len() <= 1 {
            return Err(Error::Structure("finish_node without a matching enter_node".into()));
        }
        let node = self.current();
        self.stack.pop();
        self.ledger.on_node_finished(self.store, node, &mut self.changes)?;
        Ok(node)
    }

    /// Walk `sub_path` below the current node and push the final node.
    ///
    /// Missing segments are created with `new_type`; without a type a missing
    /// segment yields `Ok(false)` and leaves the stack unchanged.
    pub fn switch_node(&mut self, sub_path: &str, new_type: Option<&str>) -> Result<bool> {
        let mut node = self.current();
        for segment in paths::segments(sub_path) {
            node = match self.store.child(node, segment)? {
                Some(child) => child,
                None => {
                    let Some(new_type) = new_type else {
                        return Ok(false);
                    };
                    let child = self.store.add_child(node, segment, Some(new_type))?;
                    self.created.push(self.store.path(child)?);
                    child
                }
            };
        }
        self.stack.push(node);
        Ok(true)
    }

    /// Create `name` as a file with a content child, or reuse it.
    ///
    /// Both the file and its content node are left on the stack; finish each
    /// with `finish_node`.
    pub fn create_file_node(
        &mut self,
        name: &str,
        content: &mut dyn Read,
        mime_type: Option<&str>,
        last_modified: i64,
    ) -> Result<()> {
        let name = paths::file_name(name);
        let parent = self.current();

        if let Some(existing) = self.store.child(parent, name)? {
            if self.options.overwrite {
                self.store.remove_node(existing)?;
            } else {
                let resource = self
                    .store
                    .child(existing, JCR_CONTENT)?
                    .ok_or_else(|| Error::NotFound(format!("{JCR_CONTENT} of {name}")))?;
                self.stack.push(existing);
                self.stack.push(resource);
                return Ok(());
            }
        }

        let mime_type = match mime_type.map(str::to_string).or_else(|| self.mime.guess(name)) {
            Some(mime_type) => mime_type,
            None => {
                info!(file = name, default = DEFAULT_CONTENT_TYPE, "cannot find content type, using default");
                DEFAULT_CONTENT_TYPE.to_string()
            }
        };
        let now = self.coercer.now();
        let last_modified = if last_modified <= 0 {
            now
        } else {
            DateTime::from_timestamp_millis(last_modified).map_or(now, |d| d.fixed_offset())
        };
        let mut data = Vec::new();
        content.read_to_end(&mut data)?;

        self.enter_child(Some(name), Some(NT_FILE), &[])?;
        self.enter_child(Some(JCR_CONTENT), Some(NT_RESOURCE), &[])?;
        self.create_object_property(JCR_MIME_TYPE, Some(Value::String(mime_type)))?;
        self.create_object_property(JCR_LAST_MODIFIED, Some(Value::Date(last_modified)))?;
        self.create_object_property(JCR_DATA, Some(Value::Binary(data)))
    }

    fn push(&mut self, node: NodeId) -> NodeId {
        self.stack.push(node);
        if self.root.is_none() {
            self.root = Some(node);
        }
        node
    }

    fn apply_mixins(&mut self, node: NodeId, mixins: &[&str]) -> Result<()> {
        for mixin in mixins {
            if !self.store.is_node_type(node, mixin)? {
                self.store.add_mixin(node, mixin)?;
            }
        }
        if self.options.checkin && self.store.is_node_type(node, MIX_VERSIONABLE)? {
            self.register_versionable(node);
        }
        Ok(())
    }

    fn register_versionable(&mut self, node: NodeId) {
        if !self.versionables.contains(&node) {
            self.versionables.push(node);
        }
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Write a single-valued property from the input stream on the current node.
    pub fn create_property(&mut self, name: &str, property_type: PropertyType, value: &str) -> Result<()> {
        let node = self.current();
        if self.keeps_existing(node, name)? {
            return Ok(());
        }

        if name == JCR_IS_CHECKED_OUT {
            if !value.trim().eq_ignore_ascii_case("true") {
                self.register_versionable(node);
            }
            return Ok(());
        }

        match property_type {
            PropertyType::Reference => {
                if let Some(identifier) = self.ledger.record_or_resolve(self.store, node, name, value)? {
                    self.write(node, name, PropertyValue::Single(Value::Reference(identifier)), property_type)?;
                }
                Ok(())
            }
            PropertyType::Date => match parse_strict_timestamp(value) {
                Some(date) => self.write(node, name, PropertyValue::Single(Value::Date(date)), property_type),
                None => {
                    debug!(property = name, value, "not a strict timestamp, stored as string");
                    self.write(node, name, PropertyValue::Single(Value::from(value)), PropertyType::String)
                }
            },
            _ => {
                let request = with_hint(RequestProperty::single(name, value), property_type);
                self.coercer.set_property(self.store, node, &request, &mut self.changes)
            }
        }
    }

    /// Write a multi-valued property from the input stream on the current node.
    pub fn create_properties(&mut self, name: &str, property_type: PropertyType, values: &[String]) -> Result<()> {
        let node = self.current();
        if self.keeps_existing(node, name)? {
            return Ok(());
        }

        match property_type {
            PropertyType::Reference => {
                let slots = self.ledger.record_or_resolve_all(self.store, node, name, values)?;
                let property_type = if slots.iter().any(Slot::is_pending) {
                    PropertyType::Undefined
                } else {
                    PropertyType::Reference
                };
                let values = slots.iter().map(Slot::to_value).collect();
                self.write(node, name, PropertyValue::Multi(values), property_type)
            }
            PropertyType::Date => {
                let dates: Option<Vec<Value>> = values
                    .iter()
                    .map(|v| parse_strict_timestamp(v).map(Value::Date))
                    .collect();
                match dates {
                    Some(dates) => self.write(node, name, PropertyValue::Multi(dates), property_type),
                    None => {
                        warn!(property = name, "could not create dates for property, storing strings");
                        let raw = values.iter().map(|v| Value::from(v.as_str())).collect();
                        self.write(node, name, PropertyValue::Multi(raw), PropertyType::String)
                    }
                }
            }
            _ => {
                let values = if values.is_empty() && AutoProperty::from_name(name).is_some() {
                    RequestValues::Absent
                } else {
                    RequestValues::from(values.to_vec())
                };
                let request = with_hint(RequestProperty::new(name, values), property_type).with_multi_value_hint();
                self.coercer.set_property(self.store, node, &request, &mut self.changes)
            }
        }
    }

    /// Write an already typed value; `None` removes the property.
    pub fn create_object_property(&mut self, name: &str, value: Option<Value>) -> Result<()> {
        let node = self.current();
        if self.keeps_existing(node, name)? {
            return Ok(());
        }
        match value {
            Some(value) => {
                let property_type = value.property_type();
                self.write(node, name, PropertyValue::Single(value), property_type)
            }
            None => self.remove(node, name),
        }
    }

    /// Multi-valued variant of `create_object_property`; an empty list removes.
    pub fn create_object_properties(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        let node = self.current();
        if self.keeps_existing(node, name)? {
            return Ok(());
        }
        if values.is_empty() {
            return self.remove(node, name);
        }
        self.write(node, name, PropertyValue::Multi(values), PropertyType::Undefined)
    }

    /// Run a request through the coercer on the current node, bypassing the
    /// first-write guard.
    pub fn apply(&mut self, request: &RequestProperty) -> Result<()> {
        let node = self.current();
        self.coercer.set_property(self.store, node, request, &mut self.changes)
    }

    fn keeps_existing(&self, node: NodeId, name: &str) -> Result<bool> {
        if self.options.property_overwrite {
            return Ok(false);
        }
        let keep = self.store.property(node, name)?.is_some_and(|p| !p.is_new);
        if keep {
            debug!(property = name, "property exists from an earlier session, keeping it");
        }
        Ok(keep)
    }

    /// Store `value`, deleting an existing property of the other cardinality
    /// first.
    fn write(&mut self, node: NodeId, name: &str, value: PropertyValue, property_type: PropertyType) -> Result<()> {
        let replaced = self
            .store
            .property(node, name)?
            .is_some_and(|p| p.cardinality() != value.cardinality());
        if replaced {
            self.remove(node, name)?;
        }
        let path = self.store.set_property(node, name, value, property_type)?;
        self.changes.record(Modification::on_modified(path));
        Ok(())
    }

    fn remove(&mut self, node: NodeId, name: &str) -> Result<()> {
        if let Some(path) = self.store.remove_property(node, name)? {
            self.changes.record(Modification::on_deleted(path));
        }
        Ok(())
    }

    // ========================================================================
    // Versioning, access control, completion
    // ========================================================================

    /// Check in every registered versionable node.
    pub fn checkin_versionables(&self) -> Result<()> {
        for node in &self.versionables {
            self.store.checkin(*node)?;
        }
        Ok(())
    }

    /// Write an access control entry for `principal` on the current node.
    pub fn create_ace<D: PrincipalDirectory, P: PasswordDigester>(
        &self,
        identities: &IdentityMaterializer<D, P>,
        principal: &str,
        granted: &[&str],
        denied: &[&str],
    ) -> Result<()> {
        identities.create_ace(&self.current_path()?, principal, granted, denied)
    }

    /// End the session.
    pub fn finish(self) -> ImportSummary {
        if self.stack.len() > 1 {
            debug!(open = self.stack.len() - 1, "session finished with open nodes");
        }
        ImportSummary {
            root: self.root,
            unresolved: self.ledger.unresolved(),
            versionables: self.versionables,
            created_nodes: self.created,
            changes: self.changes,
        }
    }
}

fn with_hint(request: RequestProperty, property_type: PropertyType) -> RequestProperty {
    match property_type {
        PropertyType::Undefined => request,
        hinted => request.with_type_hint(hinted.name()),
    }
}

// ============================================================================
// Tests
// ============================================================================
