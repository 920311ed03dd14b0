//! MIME type guessing for imported files.

use hashbrown::HashMap;

/// Fallback type when nothing better is known.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub trait MimeClassifier {
    /// MIME type for a file name, if known.
    fn guess(&self, name: &str) -> Option<String>;
}

/// Extension-based lookup table.
#[derive(Debug, Clone)]
pub struct ExtensionMimeTable {
    by_extension: HashMap<String, String>,
}

impl ExtensionMimeTable {
    /// A table with no entries.
    pub fn empty() -> Self {
        Self { by_extension: HashMap::new() }
    }

    /// Add or replace a mapping; the extension is matched case-insensitively.
    pub fn with(mut self, extension: &str, mime_type: &str) -> Self {
        self.by_extension
            .insert(extension.trim_start_matches('.').to_ascii_lowercase(), mime_type.to_string());
        self
    }
}

impl Default for ExtensionMimeTable {
    fn default() -> Self {
        [
            ("txt", "text/plain"),
            ("html", "text/html"),
            ("htm", "text/html"),
            ("css", "text/css"),
            ("js", "application/javascript"),
            ("json", "application/json"),
            ("xml", "application/xml"),
            ("pdf", "application/pdf"),
            ("zip", "application/zip"),
            ("png", "image/png"),
            ("jpg", "image/jpeg"),
            ("jpeg", "image/jpeg"),
            ("gif", "image/gif"),
            ("svg", "image/svg+xml"),
        ]
        .into_iter()
        .fold(Self::empty(), |table, (ext, mime)| table.with(ext, mime))
    }
}

impl MimeClassifier for ExtensionMimeTable {
    fn guess(&self, name: &str) -> Option<String> {
        let (_, extension) = name.rsplit_once('.')?;
        self.by_extension.get(&extension.to_ascii_lowercase()).cloned()
    }
}
