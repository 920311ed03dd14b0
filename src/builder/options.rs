//! Import options, loadable from JSON.

use serde::{Deserialize, Serialize};

use crate::coerce::date::{FormatDateParser, DEFAULT_DATE_FORMATS};
use crate::Result;

/// Per-import configuration.
///
/// Every field has a default, so `{}` is a valid options document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Replace same-named nodes and files instead of reusing them.
    pub overwrite: bool,
    /// Rewrite properties that existed before this session.
    pub property_overwrite: bool,
    /// Register versionable nodes for checkin.
    pub checkin: bool,
    /// Primary type for nodes entered without one; `None` leaves it to the store.
    pub default_primary_type: Option<String>,
    /// chrono formats tried by the coercer's date parser, in order.
    pub date_formats: Vec<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            property_overwrite: false,
            checkin: false,
            default_primary_type: None,
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl ImportOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn date_parser(&self) -> FormatDateParser {
        FormatDateParser::new(self.date_formats.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_empty_document_uses_defaults() {
        assert_eq!(ImportOptions::from_json("{}").unwrap(), ImportOptions::default());
    }

    #[test]
    fn test_partial_document() {
        let options = ImportOptions::from_json(
            r#"{"overwrite": true, "default_primary_type": "nt:folder", "date_formats": ["%d/%m/%Y"]}"#,
        )
        .unwrap();
        assert!(options.overwrite);
        assert!(!options.checkin);
        assert_eq!(options.default_primary_type.as_deref(), Some("nt:folder"));
        assert_eq!(options.date_parser().formats(), ["%d/%m/%Y".to_string()]);
    }

    #[test]
    fn test_malformed_document_is_config_error() {
        assert!(matches!(ImportOptions::from_json("{"), Err(Error::Config(_))));
    }
}
