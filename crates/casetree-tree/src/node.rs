//! Uniform display representation
//!
//! Every record, aggregate root and group becomes a [`DisplayNode`]. The
//! rendering layer picks icons and columns from [`NodeKind`].

use crate::error::DispatchError;
use casetree_index::GroupedIndex;
use casetree_model::{GroupKey, Record, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kind of display node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Disk image
    Image,
    /// Volume
    Volume,
    /// Directory
    Directory,
    /// Regular file
    File,
    /// Layout file
    LayoutFile,
    /// Local or derived file
    LocalFile,
    /// Virtual directory
    VirtualDirectory,
    /// Blackboard result
    Artifact,
    /// Aggregate category root
    Aggregate,
    /// Group inside a grouped index
    Group,
    /// Placeholder for a node that failed to materialize
    Error,
}

impl NodeKind {
    /// Whether nodes of this kind never have children
    #[must_use]
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            Self::File | Self::LayoutFile | Self::LocalFile | Self::Artifact | Self::Error
        )
    }
}

/// Display representation of one tree node
#[derive(Clone)]
pub struct DisplayNode {
    /// Stable name
    pub name: String,

    /// Label shown to the examiner
    pub display_name: String,

    /// Node kind
    pub kind: NodeKind,

    /// Whether the node has no children
    pub leaf: bool,

    /// Backing record, for record nodes
    pub record_id: Option<RecordId>,

    /// Grouped index backing an aggregate root
    pub index: Option<Arc<GroupedIndex>>,

    /// Failure message, for placeholders
    pub error: Option<String>,
}

impl DisplayNode {
    /// Create node of `kind`
    #[must_use]
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            kind,
            leaf: kind.is_leaf(),
            record_id: None,
            index: None,
            error: None,
        }
    }

    /// Node for a stored record
    #[must_use]
    pub fn for_record(record: &Record, kind: NodeKind) -> Self {
        let mut node = Self::new(kind, record.display_name());
        node.record_id = Some(record.id);
        node
    }

    /// Group node labelled `"<key> (<count>)"`
    #[must_use]
    pub fn group(key: &GroupKey, count: usize) -> Self {
        Self::new(NodeKind::Group, key.as_str()).with_display_name(group_label(key, count))
    }

    /// Error placeholder standing in for a failed node
    #[must_use]
    pub fn placeholder(name: impl Into<String>, error: &DispatchError) -> Self {
        let mut node = Self::new(NodeKind::Error, name);
        node.error = Some(error.to_string());
        node
    }

    /// With display name
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// With backing index
    #[must_use]
    pub fn with_index(mut self, index: Arc<GroupedIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Check if this is an error placeholder
    #[inline]
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.kind == NodeKind::Error
    }
}

impl fmt::Debug for DisplayNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayNode")
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("kind", &self.kind)
            .field("leaf", &self.leaf)
            .field("record_id", &self.record_id)
            .field("index", &self.index.as_ref().map(|i| i.name().to_string()))
            .field("error", &self.error)
            .finish()
    }
}

/// Group label embedding the live member count
#[must_use]
pub fn group_label(key: &GroupKey, count: usize) -> String {
    format!("{key} ({count})")
}
