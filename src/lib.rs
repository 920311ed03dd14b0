//! # content-loader: Content Tree Materialization
//!
//! Turns a stream of create-node / create-property / create-file calls into a
//! hierarchical, typed property store, keeping cross-node references intact
//! even when the referenced node shows up later in the stream.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `ContentStore` is the contract between the builder and storage
//! 2. **Session-scoped state**: stack, ledger and "now" live in one `ContentBuilder`
//! 3. **Closed dispatch**: property types, audit names and mutations are enums, not lookups
//! 4. **Best effort**: type hints are advisory, dangling references are reported, never fatal
//!
//! ## Quick Start
//!
//! ```rust
//! use content_loader::{ContentBuilder, ImportOptions, MemoryStore, PropertyType, ContentStore};
//!
//! # fn example() -> content_loader::Result<()> {
//! let store = MemoryStore::new();
//! let mut builder = ContentBuilder::new(&store, ImportOptions::default());
//! builder.prepare(store.root(), Some("content".into()));
//!
//! builder.enter_node(Some("a"), None, &["mix:referenceable"])?;
//! builder.enter_node(Some("b"), None, &[])?;
//! builder.create_property("ref", PropertyType::Reference, "..")?;
//! builder.finish_node()?;
//! builder.finish_node()?;
//!
//! let summary = builder.finish();
//! assert!(summary.unresolved.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ## Components
//!
//! | Component | Module | Description |
//! |-----------|--------|-------------|
//! | Property Value Coercer | `coerce` | type, cardinality and mutation decisions |
//! | Audit Property Resolver | `coerce::audit` | created / modified stamps |
//! | Reference Ledger | `ledger` | forward-reference bookkeeping |
//! | Content Tree Builder | `builder` | stack-based import session |
//! | Identity & Policy | `security` | users, groups, access control entries |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod coerce;
pub mod ledger;
pub mod builder;
pub mod security;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    Node, NodeId, Property, PropertyValue, Cardinality, PropertyType, Value,
    PropertyMap, Modification, ModificationKind, ChangeSink, ChangeLog,
};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{ContentStore, MemoryStore};

// ============================================================================
// Re-exports: Coercion, ledger, builder
// ============================================================================

pub use coerce::{
    PropertyCoercer, RequestProperty, RequestValues, TypeDecision,
    DateParser, FormatDateParser, ReferenceParser, StoreReferenceParser,
    AutoProperty,
};
pub use ledger::{ReferenceLedger, Slot};
pub use builder::{
    ContentBuilder, ImportOptions, ImportSummary, MimeClassifier, ExtensionMimeTable,
};

// ============================================================================
// Re-exports: Identity & policy
// ============================================================================

pub use security::{
    IdentityMaterializer, PrincipalDirectory, MemoryDirectory, Authorizable,
    AuthorizableKind, AccessControlEntry, PasswordDigester, Blake3Digester,
};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Structural error: {0}")]
    Structure(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Value format error: cannot convert '{value}' to {expected}")]
    ValueFormat { expected: String, value: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Item exists: {0}")]
    ItemExists(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Principal kind mismatch: {0}")]
    PrincipalKind(String),

    #[error("Access control error: {0}")]
    AccessControl(String),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
