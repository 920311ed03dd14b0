//! # Property Value Coercion
//!
//! Decides, for each incoming `RequestProperty`, which stored type and
//! cardinality to use and whether to set, clear or delete the property.
//!
//! ```text
//! RequestProperty ─┬─ no value + audit name ──► AutoProperty::stamp
//!                  └─ otherwise ──► TypeDecision × Cardinality × RequestValues
//!                                     ├─ Absent / "" ─► delete
//!                                     ├─ Empty       ─► clear (multi: delete)
//!                                     ├─ One         ─► Date? Reference? raw
//!                                     └─ Many        ─► Date[]? Reference[]? raw[]
//! ```
//!
//! Type hints are advisory: a failed DATE or REFERENCE coercion falls back to
//! storing the raw string and is never reported as an error.

pub mod audit;
pub mod date;
pub mod reference;
pub mod request;

use chrono::{DateTime, FixedOffset, Utc};
use tracing::debug;

use crate::model::*;
use crate::storage::ContentStore;
use crate::{Error, Result};

pub use audit::AutoProperty;
pub use date::{DateParser, FormatDateParser, parse_strict_timestamp};
pub use reference::{ReferenceParser, StoreReferenceParser};
pub use request::{RequestProperty, RequestValues};

use audit::remove_if_removable;

// ============================================================================
// Type decision
// ============================================================================

/// How the values of one assignment are to be typed, decided once per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeDecision {
    Date,
    Reference,
    WeakReference,
    /// Any other explicit type; the store converts the raw strings.
    Plain(PropertyType),
    /// No hint and nothing to inherit: the store infers from the raw string.
    Undetermined,
}

impl TypeDecision {
    pub fn from_type(property_type: PropertyType) -> Self {
        match property_type {
            PropertyType::Date => TypeDecision::Date,
            PropertyType::Reference => TypeDecision::Reference,
            PropertyType::WeakReference => TypeDecision::WeakReference,
            PropertyType::Undefined => TypeDecision::Undetermined,
            other => TypeDecision::Plain(other),
        }
    }

    /// Type used for storing raw strings once special coercion did not apply.
    fn fallback_type(self) -> PropertyType {
        match self {
            TypeDecision::Plain(t) => t,
            TypeDecision::Date
            | TypeDecision::Reference
            | TypeDecision::WeakReference
            | TypeDecision::Undetermined => PropertyType::Undefined,
        }
    }
}

// ============================================================================
// PropertyCoercer
// ============================================================================

/// Applies request properties to nodes, one session-wide "now" per instance.
pub struct PropertyCoercer<D = FormatDateParser, R = StoreReferenceParser> {
    date_parser: D,
    reference_parser: R,
    now: DateTime<FixedOffset>,
}

impl PropertyCoercer {
    pub fn new() -> Self {
        Self::with_parsers(FormatDateParser::default(), StoreReferenceParser)
    }
}

impl Default for PropertyCoercer {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DateParser, R: ReferenceParser> PropertyCoercer<D, R> {
    pub fn with_parsers(date_parser: D, reference_parser: R) -> Self {
        Self {
            date_parser,
            reference_parser,
            now: Utc::now().fixed_offset(),
        }
    }

    /// Pin the session instant used for audit timestamps.
    pub fn with_now(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = now;
        self
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.now
    }

    /// Set a property on `node`, with automatic values for audit names that
    /// arrive without a value.
    pub fn set_property<S: ContentStore>(
        &self,
        store: &S,
        node: NodeId,
        prop: &RequestProperty,
        changes: &mut dyn ChangeSink,
    ) -> Result<()> {
        if prop.provides_value() {
            return self.set_property_as_is(store, node, prop, changes);
        }
        let Some(auto) = AutoProperty::from_name(&prop.name) else {
            return self.set_property_as_is(store, node, prop, changes);
        };
        match auto.stamp(store, node, &prop.name, self.now, changes) {
            Err(Error::ConstraintViolation(reason)) => {
                debug!(property = %prop.name, %reason, "audit property not writable, skipped");
                Ok(())
            }
            other => other,
        }
    }

    /// Candidate storage type: parseable hint, else the existing type when
    /// values are present, else undetermined.
    pub fn decide_type<S: ContentStore>(
        &self,
        store: &S,
        node: NodeId,
        prop: &RequestProperty,
    ) -> Result<TypeDecision> {
        let hinted = prop
            .type_hint
            .as_deref()
            .and_then(PropertyType::from_name)
            .unwrap_or(PropertyType::Undefined);
        if hinted != PropertyType::Undefined {
            return Ok(TypeDecision::from_type(hinted));
        }
        if matches!(prop.values, RequestValues::One(_) | RequestValues::Many(_)) {
            if let Some(existing) = store.property(node, &prop.name)? {
                return Ok(TypeDecision::from_type(existing.property_type));
            }
        }
        Ok(TypeDecision::Undetermined)
    }

    /// Forced multi, else the existing cardinality, else single.
    pub fn decide_cardinality<S: ContentStore>(
        &self,
        store: &S,
        node: NodeId,
        prop: &RequestProperty,
    ) -> Result<Cardinality> {
        if prop.multi_value_hint {
            return Ok(Cardinality::Multi);
        }
        Ok(store
            .property(node, &prop.name)?
            .map_or(Cardinality::Single, |p| p.cardinality()))
    }

    fn set_property_as_is<S: ContentStore>(
        &self,
        store: &S,
        node: NodeId,
        prop: &RequestProperty,
        changes: &mut dyn ChangeSink,
    ) -> Result<()> {
        let name = prop.name.as_str();
        let decision = self.decide_type(store, node, prop)?;

        match &prop.values {
            RequestValues::Absent => delete(store, node, name, changes),
            RequestValues::Empty => match store.property(node, name)? {
                Some(existing) if existing.is_multiple() => delete(store, node, name, changes),
                Some(_) => write(
                    store,
                    node,
                    name,
                    PropertyValue::Single(Value::String(String::new())),
                    PropertyType::Undefined,
                    changes,
                ),
                None => Ok(()),
            },
            RequestValues::One(raw) if raw.is_empty() => delete(store, node, name, changes),
            RequestValues::One(raw) => {
                let cardinality = self.decide_cardinality(store, node, prop)?;
                if let Some((value, property_type)) = self.coerce_one(store, raw, decision) {
                    let value = PropertyValue::shaped(value, cardinality);
                    return write(store, node, name, value, property_type, changes);
                }
                let value = PropertyValue::shaped(Value::String(raw.clone()), cardinality);
                write(store, node, name, value, decision.fallback_type(), changes)
            }
            RequestValues::Many(raws) => {
                if let Some(existing) = store.property(node, name)? {
                    if !existing.is_multiple() {
                        delete(store, node, name, changes)?;
                    }
                }
                if let Some((values, property_type)) = self.coerce_many(store, raws, decision) {
                    return write(store, node, name, PropertyValue::Multi(values), property_type, changes);
                }
                let values = raws.iter().cloned().map(Value::String).collect();
                write(store, node, name, PropertyValue::Multi(values), decision.fallback_type(), changes)
            }
        }
    }

    fn coerce_one<S: ContentStore>(
        &self,
        store: &S,
        raw: &str,
        decision: TypeDecision,
    ) -> Option<(Value, PropertyType)> {
        match decision {
            TypeDecision::Date => self
                .date_parser
                .parse(raw)
                .map(|d| (Value::Date(d), PropertyType::Date)),
            TypeDecision::Reference | TypeDecision::WeakReference => {
                let weak = decision == TypeDecision::WeakReference;
                self.reference_parser
                    .parse(store, raw, weak)
                    .map(|v| (v, reference_type(weak)))
            }
            TypeDecision::Plain(_) | TypeDecision::Undetermined => None,
        }
    }

    fn coerce_many<S: ContentStore>(
        &self,
        store: &S,
        raws: &[String],
        decision: TypeDecision,
    ) -> Option<(Vec<Value>, PropertyType)> {
        match decision {
            TypeDecision::Date => self
                .date_parser
                .parse_all(raws)
                .map(|ds| (ds.into_iter().map(Value::Date).collect(), PropertyType::Date)),
            TypeDecision::Reference | TypeDecision::WeakReference => {
                let weak = decision == TypeDecision::WeakReference;
                self.reference_parser
                    .parse_all(store, raws, weak)
                    .map(|vs| (vs, reference_type(weak)))
            }
            TypeDecision::Plain(_) | TypeDecision::Undetermined => None,
        }
    }
}

fn reference_type(weak: bool) -> PropertyType {
    if weak {
        PropertyType::WeakReference
    } else {
        PropertyType::Reference
    }
}

fn write<S: ContentStore>(
    store: &S,
    node: NodeId,
    name: &str,
    value: PropertyValue,
    property_type: PropertyType,
    changes: &mut dyn ChangeSink,
) -> Result<()> {
    let path = store.set_property(node, name, value, property_type)?;
    changes.record(Modification::on_modified(path));
    Ok(())
}

fn delete<S: ContentStore>(
    store: &S,
    node: NodeId,
    name: &str,
    changes: &mut dyn ChangeSink,
) -> Result<()> {
    if let Some(path) = remove_if_removable(store, node, name)? {
        changes.record(Modification::on_deleted(path));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
