//! Incoming property assignments.

use serde::{Deserialize, Serialize};

/// Raw values of an incoming assignment.
///
/// The four states map to four mutation policies: delete, clear, set one,
/// set many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestValues {
    /// No value at all: delete the property.
    Absent,
    /// Explicit empty list: clear the property.
    Empty,
    One(String),
    Many(Vec<String>),
}

impl RequestValues {
    pub fn len(&self) -> usize {
        match self {
            RequestValues::Absent | RequestValues::Empty => 0,
            RequestValues::One(_) => 1,
            RequestValues::Many(vs) => vs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<String>> for RequestValues {
    fn from(mut values: Vec<String>) -> Self {
        match values.len() {
            0 => RequestValues::Empty,
            1 => RequestValues::One(values.remove(0)),
            _ => RequestValues::Many(values),
        }
    }
}

impl From<Option<Vec<String>>> for RequestValues {
    fn from(values: Option<Vec<String>>) -> Self {
        values.map_or(RequestValues::Absent, RequestValues::from)
    }
}

/// One incoming property assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestProperty {
    pub name: String,
    /// Type name such as `"Date"` or `"WeakReference"`; unparseable hints are ignored.
    pub type_hint: Option<String>,
    /// Store as multi-valued even for a single value.
    pub multi_value_hint: bool,
    pub values: RequestValues,
}

impl RequestProperty {
    pub fn new(name: impl Into<String>, values: RequestValues) -> Self {
        Self {
            name: name.into(),
            type_hint: None,
            multi_value_hint: false,
            values,
        }
    }

    /// Assignment without any value (delete, or audit stamp for audit names).
    pub fn absent(name: impl Into<String>) -> Self {
        Self::new(name, RequestValues::Absent)
    }

    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, RequestValues::One(value.into()))
    }

    pub fn many<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::new(name, RequestValues::from(values.into_iter().map(Into::into).collect::<Vec<_>>()))
    }

    pub fn with_type_hint(mut self, hint: impl Into<String>) -> Self {
        self.type_hint = Some(hint.into());
        self
    }

    pub fn with_multi_value_hint(mut self) -> Self {
        self.multi_value_hint = true;
        self
    }

    /// True when the caller supplied something to store.
    ///
    /// A missing value and a single blank string (an empty form field) do not
    /// count; an explicit empty list does.
    pub fn provides_value(&self) -> bool {
        match &self.values {
            RequestValues::Absent => false,
            RequestValues::One(v) => !v.is_empty(),
            RequestValues::Empty | RequestValues::Many(_) => true,
        }
    }
}
