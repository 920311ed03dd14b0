//! PropertyMap: free-form typed properties (e.g. extra principal properties).

use std::collections::HashMap;
use super::Value;

/// A map of property names to values.
pub type PropertyMap = HashMap<String, Value>;
