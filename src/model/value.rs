//! Typed property values and the property type system.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Content repository value.
///
/// Every variant maps to exactly one [`PropertyType`]:
/// - Scalars: String, Long, Double, Boolean, Binary
/// - Temporal: Date
/// - Naming: Name, Path
/// - Linking: Reference, WeakReference (both carry the target identifier)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    String(String),
    Binary(Vec<u8>),
    Long(i64),
    Double(f64),
    Date(DateTime<FixedOffset>),
    Boolean(bool),
    Name(String),
    Path(String),
    Reference(String),
    WeakReference(String),
}

// ============================================================================
// Property types
// ============================================================================

/// Stored type of a property, with the integer codes of the repository type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    /// Let the store infer the type from the value.
    Undefined,
    String,
    Binary,
    Long,
    Double,
    Date,
    Boolean,
    Name,
    Path,
    Reference,
    WeakReference,
}

impl PropertyType {
    pub fn code(self) -> i32 {
        match self {
            PropertyType::Undefined => 0,
            PropertyType::String => 1,
            PropertyType::Binary => 2,
            PropertyType::Long => 3,
            PropertyType::Double => 4,
            PropertyType::Date => 5,
            PropertyType::Boolean => 6,
            PropertyType::Name => 7,
            PropertyType::Path => 8,
            PropertyType::Reference => 9,
            PropertyType::WeakReference => 10,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => PropertyType::Undefined,
            1 => PropertyType::String,
            2 => PropertyType::Binary,
            3 => PropertyType::Long,
            4 => PropertyType::Double,
            5 => PropertyType::Date,
            6 => PropertyType::Boolean,
            7 => PropertyType::Name,
            8 => PropertyType::Path,
            9 => PropertyType::Reference,
            10 => PropertyType::WeakReference,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            PropertyType::Undefined => "undefined",
            PropertyType::String => "String",
            PropertyType::Binary => "Binary",
            PropertyType::Long => "Long",
            PropertyType::Double => "Double",
            PropertyType::Date => "Date",
            PropertyType::Boolean => "Boolean",
            PropertyType::Name => "Name",
            PropertyType::Path => "Path",
            PropertyType::Reference => "Reference",
            PropertyType::WeakReference => "WeakReference",
        }
    }

    /// Parse a type name, case-insensitively. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        [
            PropertyType::Undefined,
            PropertyType::String,
            PropertyType::Binary,
            PropertyType::Long,
            PropertyType::Double,
            PropertyType::Date,
            PropertyType::Boolean,
            PropertyType::Name,
            PropertyType::Path,
            PropertyType::Reference,
            PropertyType::WeakReference,
        ]
        .into_iter()
        .find(|t| t.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Type checking
// ============================================================================

impl Value {
    pub fn property_type(&self) -> PropertyType {
        match self {
            Value::String(_) => PropertyType::String,
            Value::Binary(_) => PropertyType::Binary,
            Value::Long(_) => PropertyType::Long,
            Value::Double(_) => PropertyType::Double,
            Value::Date(_) => PropertyType::Date,
            Value::Boolean(_) => PropertyType::Boolean,
            Value::Name(_) => PropertyType::Name,
            Value::Path(_) => PropertyType::Path,
            Value::Reference(_) => PropertyType::Reference,
            Value::WeakReference(_) => PropertyType::WeakReference,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Name(s) | Value::Path(s) => Some(s),
            Value::Reference(s) | Value::WeakReference(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    /// Identifier carried by a (weak) reference.
    pub fn reference_id(&self) -> Option<&str> {
        match self {
            Value::Reference(id) | Value::WeakReference(id) => Some(id),
            _ => None,
        }
    }

    /// Convert to the given type the way the store does on a typed write.
    ///
    /// `Undefined` keeps the value as it is.
    pub fn convert(self, target: PropertyType) -> Result<Value> {
        if target == PropertyType::Undefined || self.property_type() == target {
            return Ok(self);
        }
        let raw = match self {
            Value::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            other => other.to_string(),
        };
        let failed = |raw: &str| Error::ValueFormat {
            expected: target.name().to_string(),
            value: raw.to_string(),
        };
        Ok(match target {
            PropertyType::Undefined | PropertyType::String => Value::String(raw),
            PropertyType::Binary => Value::Binary(raw.into_bytes()),
            PropertyType::Long => Value::Long(raw.trim().parse().map_err(|_| failed(&raw))?),
            PropertyType::Double => Value::Double(raw.trim().parse().map_err(|_| failed(&raw))?),
            PropertyType::Boolean => Value::Boolean(raw.trim().eq_ignore_ascii_case("true")),
            PropertyType::Date => Value::Date(
                DateTime::parse_from_rfc3339(raw.trim()).map_err(|_| failed(&raw))?,
            ),
            PropertyType::Name => Value::Name(raw),
            PropertyType::Path => Value::Path(raw),
            PropertyType::Reference => Value::Reference(raw),
            PropertyType::WeakReference => Value::WeakReference(raw),
        })
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================
//
// These double as the value-creation helper for untyped object input:
// integers become LONG, floats DOUBLE, booleans BOOLEAN, timestamps DATE,
// byte buffers BINARY and everything else STRING.

impl From<bool> for Value { fn from(v: bool) -> Self { Value::Boolean(v) } }
impl From<i32> for Value { fn from(v: i32) -> Self { Value::Long(v as i64) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Long(v) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Double(v) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::String(v) } }
impl From<&str> for Value { fn from(v: &str) -> Self { Value::String(v.to_owned()) } }
impl From<Vec<u8>> for Value { fn from(v: Vec<u8>) -> Self { Value::Binary(v) } }
impl From<DateTime<FixedOffset>> for Value { fn from(v: DateTime<FixedOffset>) -> Self { Value::Date(v) } }
impl From<DateTime<Utc>> for Value { fn from(v: DateTime<Utc>) -> Self { Value::Date(v.fixed_offset()) } }
impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self { Value::Date(v.and_utc().fixed_offset()) }
}
impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v.and_time(chrono::NaiveTime::MIN).and_utc().fixed_offset())
    }
}

// ============================================================================
// Display
// ============================================================================

/// String form as read back from the store (no quoting).
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) | Value::Name(s) | Value::Path(s) => f.write_str(s),
            Value::Reference(s) | Value::WeakReference(s) => f.write_str(s),
            Value::Binary(b) => write!(f, "<binary[{}]>", b.len()),
            Value::Long(i) => write!(f, "{i}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Date(d) => f.write_str(&d.to_rfc3339_opts(SecondsFormat::Millis, false)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from("hello"), Value::String("hello".into()));
        assert_eq!(Value::from(42), Value::Long(42));
        assert_eq!(Value::from(3.5), Value::Double(3.5));
        assert_eq!(Value::from(true), Value::Boolean(true));
        assert_eq!(Value::from(vec![1u8, 2]), Value::Binary(vec![1, 2]));
    }

    #[test]
    fn test_reference_codes() {
        assert_eq!(PropertyType::Reference.code(), 9);
        assert_eq!(PropertyType::WeakReference.code(), 10);
        assert_eq!(PropertyType::from_code(10), Some(PropertyType::WeakReference));
        assert_eq!(PropertyType::from_code(42), None);
    }

    #[test]
    fn test_type_from_name_is_case_insensitive() {
        assert_eq!(PropertyType::from_name("date"), Some(PropertyType::Date));
        assert_eq!(PropertyType::from_name("WEAKREFERENCE"), Some(PropertyType::WeakReference));
        assert_eq!(PropertyType::from_name("Colour"), None);
    }

    #[test]
    fn test_convert_string_to_long() {
        assert_eq!(Value::from("42").convert(PropertyType::Long).unwrap(), Value::Long(42));
        assert!(Value::from("forty-two").convert(PropertyType::Long).is_err());
    }

    #[test]
    fn test_convert_undefined_keeps_value() {
        let v = Value::from("abc");
        assert_eq!(v.clone().convert(PropertyType::Undefined).unwrap(), v);
    }

    #[test]
    fn test_date_display_round_trips_through_convert() {
        let d = DateTime::parse_from_rfc3339("2009-01-01T12:00:00.000+01:00").unwrap();
        let shown = Value::Date(d).to_string();
        assert_eq!(Value::String(shown).convert(PropertyType::Date).unwrap(), Value::Date(d));
    }
}
