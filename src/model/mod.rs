//! # Content Model
//!
//! Plain DTOs shared by the store, the coercer, the ledger and the builder.
//!
//! Design rule: this module is pure data: no I/O, no locking, no store access.

pub mod node;
pub mod property;
pub mod path;
pub mod value;
pub mod property_map;
pub mod modification;

pub use node::{Node, NodeId, MIX_REFERENCEABLE, MIX_VERSIONABLE};
pub use property::{Property, PropertyValue, Cardinality};
pub use value::{Value, PropertyType};
pub use property_map::PropertyMap;
pub use modification::{Modification, ModificationKind, ChangeSink, ChangeLog};
