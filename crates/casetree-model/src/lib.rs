//! casetree Record Model
//!
//! Typed, immutable views of stored evidentiary records and the capability
//! through which the rest of the workspace reaches the case database.
//!
//! # Overview
//!
//! - **Record**: ID, [`Category`] tag and classification attributes
//! - **GroupKey**: classification value used to bucket records
//! - **CaseStore**: grouped-ID query and on-demand record fetch
//! - **MemoryStore**: thread-safe in-memory [`CaseStore`]
//!
//! # Example
//!
//! ```rust
//! use casetree_model::{AttributeName, CaseStore, Category, GroupKey, MemoryStore, Record, RecordId};
//!
//! let store = MemoryStore::new();
//! store.insert(
//!     Record::new(RecordId::new(1), Category::InterestingFileHit)
//!         .with_text(AttributeName::set_name(), "alerts"),
//! );
//!
//! let rows = store
//!     .query_grouped_ids(&Category::InterestingFileHit, &AttributeName::set_name())
//!     .unwrap();
//! assert_eq!(rows, vec![(GroupKey::new("alerts"), RecordId::new(1))]);
//! ```

#![warn(missing_docs)]

pub mod category;
pub mod record;
pub mod store;

// Re-exports
pub use category::Category;
pub use record::{AttributeName, AttributeValue, GroupKey, Record, RecordId};
pub use store::{CaseStore, MemoryStore, StoreError};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for record model operations
    pub use crate::{
        AttributeName, AttributeValue, CaseStore, Category, GroupKey, MemoryStore, Record,
        RecordId, StoreError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
