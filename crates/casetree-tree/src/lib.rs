//! casetree Tree Layer
//!
//! Turns records and grouped indices into display nodes and exposes a lazy
//! two-level tree over a grouped index.
//!
//! # Architecture
//!
//! ```text
//! GroupedIndex ──ChangeEvent──→ GroupProvider ──┐
//!              ──ChangeEvent──→ RecordProvider ─┴─StructureChange─→ renderer
//!                                     │
//!                                     └─fetch_record─→ TypeDispatcher → DisplayNode
//! ```
//!
//! # Example
//!
//! ```rust
//! use casetree_index::{GroupedIndex, IndexSpec};
//! use casetree_model::{AttributeName, Category, MemoryStore, Record, RecordId};
//! use casetree_tree::prelude::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::with_records([
//!     Record::new(RecordId::new(1), Category::InterestingFileHit)
//!         .with_text(AttributeName::set_name(), "alerts"),
//! ]));
//! let index = Arc::new(GroupedIndex::new(IndexSpec::interesting_items(), store));
//! let tree = TreeProjection::attached(
//!     index,
//!     Arc::new(TypeDispatcher::with_defaults()),
//!     AggregateCategory::InterestingHits,
//! );
//!
//! let groups = tree.list_children(&NodeIdentity::Root).unwrap();
//! assert_eq!(groups, vec![NodeIdentity::group("alerts")]);
//! assert_eq!(tree.display_label(&groups[0]).unwrap(), "alerts (1)");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod dispatcher;
pub mod error;
pub mod node;
pub mod projection;

// Re-exports
pub use dispatcher::{
    AggregateCategory, AggregateItem, Constructor, DispatchTable, Materializable, TypeDispatcher,
};
pub use error::{DispatchError, ProjectionError};
pub use node::{group_label, DisplayNode, NodeKind};
pub use projection::{
    ChangeKind, ChildProvider, GroupProvider, NodeIdentity, ProviderState, RecordProvider,
    StructureChange, TreeProjection,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for tree operations
    pub use crate::{
        AggregateCategory, ChangeKind, ChildProvider, DisplayNode, NodeIdentity, NodeKind,
        ProviderState, StructureChange, TreeProjection, TypeDispatcher,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
