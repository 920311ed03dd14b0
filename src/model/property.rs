//! Property: a named, typed value (or array of values) on a node.

use serde::{Deserialize, Serialize};
use super::{PropertyType, Value};

/// Whether a property holds one value or an ordered array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    Single,
    Multi,
}

/// The value payload of a property write or read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Single(Value),
    Multi(Vec<Value>),
}

impl PropertyValue {
    pub fn cardinality(&self) -> Cardinality {
        match self {
            PropertyValue::Single(_) => Cardinality::Single,
            PropertyValue::Multi(_) => Cardinality::Multi,
        }
    }

    /// Wrap a single value according to the decided cardinality.
    pub fn shaped(value: Value, cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::Single => PropertyValue::Single(value),
            Cardinality::Multi => PropertyValue::Multi(vec![value]),
        }
    }

    pub fn single(&self) -> Option<&Value> {
        match self {
            PropertyValue::Single(v) => Some(v),
            PropertyValue::Multi(_) => None,
        }
    }

    pub fn values(&self) -> &[Value] {
        match self {
            PropertyValue::Single(v) => std::slice::from_ref(v),
            PropertyValue::Multi(vs) => vs,
        }
    }
}

/// Snapshot of a stored property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    /// Canonical path as reported by the store.
    pub path: String,
    pub property_type: PropertyType,
    pub value: PropertyValue,
    /// Required by the schema; never removed by the import engine.
    pub mandatory: bool,
    /// Written in the current session (not yet saved).
    pub is_new: bool,
}

impl Property {
    pub fn is_multiple(&self) -> bool {
        self.value.cardinality() == Cardinality::Multi
    }

    pub fn cardinality(&self) -> Cardinality {
        self.value.cardinality()
    }
}
