//! Error types for the tree layer
//!
//! - [`DispatchError`]: single-node materialization failures
//! - [`ProjectionError`]: misuse of a tree projection

use crate::projection::NodeIdentity;
use casetree_model::{RecordId, StoreError};

/// Errors while turning an item into a display node
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// No constructor registered for the category
    ///
    /// A category was added without updating the dispatch tables.
    #[error("no {table} constructor registered for category '{category}'")]
    UnsupportedCategory {
        /// Category tag that missed
        category: String,
        /// Table that was consulted
        table: &'static str,
    },

    /// Aggregate root needs a collaborator that was not supplied
    #[error("aggregate '{0}' requires a grouped index")]
    MissingCollaborator(String),

    /// Leaf record no longer exists
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// Store failed while fetching a record body
    #[error("store error: {0}")]
    Store(StoreError),
}

impl DispatchError {
    /// Check if this is a dispatcher contract violation
    #[inline]
    #[must_use]
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::UnsupportedCategory { .. } | Self::MissingCollaborator(_))
    }
}

impl From<StoreError> for DispatchError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::RecordNotFound(id) => Self::RecordNotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Errors from tree projection queries
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    /// Projection is not attached
    #[error("projection is detached")]
    Detached,

    /// Node identity belongs to no current group
    #[error("unknown node: {0:?}")]
    UnknownNode(NodeIdentity),
}
