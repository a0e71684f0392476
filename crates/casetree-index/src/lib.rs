//! casetree Grouped Index
//!
//! A derived cache that groups flat records by a classification key, serves
//! hierarchical queries over that grouping and stays consistent as the
//! processing pipeline adds records.
//!
//! # Architecture
//!
//! ```text
//! PipelineEvent → PipelineRouter → GroupedIndex::reload()
//!                                        │  query CaseStore per category
//!                                        │  build Snapshot, swap Arc
//!                                        ↓
//!                                 SubscriptionBus → listeners (tree projections)
//! ```
//!
//! # Example
//!
//! ```rust
//! use casetree_index::{GroupedIndex, IndexSpec};
//! use casetree_model::{AttributeName, Category, GroupKey, MemoryStore, Record, RecordId};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::with_records([
//!     Record::new(RecordId::new(1), Category::InterestingFileHit)
//!         .with_text(AttributeName::set_name(), "alerts"),
//! ]));
//! let index = GroupedIndex::new(IndexSpec::interesting_items(), store);
//!
//! let report = index.reload();
//! assert!(report.published);
//! assert_eq!(index.group_keys(), vec![GroupKey::new("alerts")]);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod bus;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod snapshot;

// Re-exports
pub use bus::{Subscription, SubscriptionBus, SubscriptionId};
pub use error::PumpError;
pub use index::{CategoryFailure, ChangeEvent, GroupedIndex, IndexSpec, ReloadReport};
pub use pipeline::{EventPump, PipelineEvent, PipelineRouter, PumpConfig, PumpStats};
pub use snapshot::{Snapshot, SnapshotBuilder};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for index operations
    pub use crate::{
        ChangeEvent, EventPump, GroupedIndex, IndexSpec, PipelineEvent, PipelineRouter,
        ReloadReport, Snapshot, Subscription,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
