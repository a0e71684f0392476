//! Type-directed node construction
//!
//! Provides [`TypeDispatcher`], which routes an item to a constructor by its
//! category tag. Two tables back it:
//! - stored records, keyed by [`Category`]
//! - synthetic aggregate roots, keyed by [`AggregateCategory`]
//!
//! New categories are supported by registering a constructor; consumers keep
//! calling [`TypeDispatcher::materialize`].

use crate::error::DispatchError;
use crate::node::{DisplayNode, NodeKind};
use casetree_index::GroupedIndex;
use casetree_model::{Category, Record};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Constructor producing a display node from an item
pub type Constructor<T> = Arc<dyn Fn(&T) -> Result<DisplayNode, DispatchError> + Send + Sync>;

/// Synthetic aggregate categories
///
/// These do not map to a single stored record but to a collaborator such as
/// a grouped index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateCategory {
    /// Blackboard results by artifact type
    ExtractedContent,
    /// Files by extension
    FileTypes,
    /// Recently accessed files
    RecentFiles,
    /// Deleted files
    DeletedContent,
    /// Files by size band
    FileSize,
    /// Keyword hits by search term
    KeywordHits,
    /// Hash-set hits by set
    HashsetHits,
    /// Interesting items by rule set
    InterestingHits,
    /// E-mail messages by account
    EmailExtracted,
    /// Tagged items
    Tags,
    /// Case data sources
    DataSources,
    /// Views folder
    Views,
    /// Results folder
    Results,
    /// Aggregate registered at run time
    Other(String),
}

impl AggregateCategory {
    /// Built-in categories without a grouped-index collaborator
    pub const STATIC: [AggregateCategory; 10] = [
        AggregateCategory::ExtractedContent,
        AggregateCategory::FileTypes,
        AggregateCategory::RecentFiles,
        AggregateCategory::DeletedContent,
        AggregateCategory::FileSize,
        AggregateCategory::EmailExtracted,
        AggregateCategory::Tags,
        AggregateCategory::DataSources,
        AggregateCategory::Views,
        AggregateCategory::Results,
    ];

    /// Built-in categories backed by a grouped index
    pub const GROUPED: [AggregateCategory; 3] = [
        AggregateCategory::KeywordHits,
        AggregateCategory::HashsetHits,
        AggregateCategory::InterestingHits,
    ];

    /// Default root label
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::ExtractedContent => "Extracted Content",
            Self::FileTypes => "File Types",
            Self::RecentFiles => "Recent Files",
            Self::DeletedContent => "Deleted Files",
            Self::FileSize => "File Size",
            Self::KeywordHits => "Keyword Hits",
            Self::HashsetHits => "Hashset Hits",
            Self::InterestingHits => "Interesting Items",
            Self::EmailExtracted => "E-Mail Messages",
            Self::Tags => "Tags",
            Self::DataSources => "Data Sources",
            Self::Views => "Views",
            Self::Results => "Results",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for AggregateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Synthetic item materialized as an aggregate root
#[derive(Debug, Clone)]
pub struct AggregateItem {
    /// Aggregate category
    pub category: AggregateCategory,

    /// Grouped index backing this aggregate, if any
    pub index: Option<Arc<GroupedIndex>>,
}

impl AggregateItem {
    /// Aggregate without collaborator
    #[must_use]
    pub fn new(category: AggregateCategory) -> Self {
        Self {
            category,
            index: None,
        }
    }

    /// Aggregate backed by a grouped index
    #[must_use]
    pub fn grouped(category: AggregateCategory, index: Arc<GroupedIndex>) -> Self {
        Self {
            category,
            index: Some(index),
        }
    }
}

/// Uniform dispatcher input
#[derive(Debug, Clone)]
pub enum Materializable {
    /// Stored record
    Stored(Record),
    /// Synthetic aggregate
    Aggregate(AggregateItem),
}

impl Materializable {
    /// Category tag as text
    #[must_use]
    pub fn tag(&self) -> String {
        match self {
            Self::Stored(record) => record.category.to_string(),
            Self::Aggregate(item) => item.category.to_string(),
        }
    }
}

/// Category → constructor table
pub struct DispatchTable<K, T> {
    label: &'static str,
    entries: HashMap<K, Constructor<T>>,
}

impl<K, T> DispatchTable<K, T>
where
    K: Eq + Hash + fmt::Display,
{
    /// Create empty table; `label` names it in errors
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            entries: HashMap::new(),
        }
    }

    /// Add or replace constructor for `key`
    pub fn register<F>(&mut self, key: K, constructor: F)
    where
        F: Fn(&T) -> Result<DisplayNode, DispatchError> + Send + Sync + 'static,
    {
        self.entries.insert(key, Arc::new(constructor));
    }

    /// Look up constructor
    ///
    /// # Errors
    /// Returns [`DispatchError::UnsupportedCategory`] for unregistered keys
    pub fn get(&self, key: &K) -> Result<&Constructor<T>, DispatchError> {
        self.entries
            .get(key)
            .ok_or_else(|| DispatchError::UnsupportedCategory {
                category: key.to_string(),
                table: self.label,
            })
    }

    /// Check if key is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of registered constructors
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if table is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, T> fmt::Debug for DispatchTable<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("label", &self.label)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Routes records and aggregates to their constructors
#[derive(Debug)]
pub struct TypeDispatcher {
    stored: DispatchTable<Category, Record>,
    aggregate: DispatchTable<AggregateCategory, AggregateItem>,
}

impl TypeDispatcher {
    /// Create dispatcher with empty tables
    #[must_use]
    pub fn new() -> Self {
        Self {
            stored: DispatchTable::new("stored"),
            aggregate: DispatchTable::new("aggregate"),
        }
    }

    /// Create dispatcher with built-in constructors
    ///
    /// # Stored table
    /// - containers → Image, Volume, Directory, VirtualDirectory nodes
    /// - File → File, LayoutFile → LayoutFile
    /// - DerivedFile and LocalFile → LocalFile
    /// - blackboard results → Artifact
    ///
    /// # Aggregate table
    /// Static roots need no collaborator; grouped-hit roots need an index.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut dispatcher = Self::new();

        let content = [
            (Category::Image, NodeKind::Image),
            (Category::Volume, NodeKind::Volume),
            (Category::Directory, NodeKind::Directory),
            (Category::File, NodeKind::File),
            (Category::LayoutFile, NodeKind::LayoutFile),
            (Category::DerivedFile, NodeKind::LocalFile),
            (Category::LocalFile, NodeKind::LocalFile),
            (Category::VirtualDirectory, NodeKind::VirtualDirectory),
        ];
        for (category, kind) in content {
            dispatcher.register_stored(category, move |record| Ok(DisplayNode::for_record(record, kind)));
        }
        for category in Category::RESULTS {
            dispatcher.register_stored(category, |record| {
                Ok(DisplayNode::for_record(record, NodeKind::Artifact))
            });
        }

        for category in AggregateCategory::STATIC {
            dispatcher.register_aggregate(category, |item| Ok(static_root(item)));
        }
        for category in AggregateCategory::GROUPED {
            dispatcher.register_aggregate(category, grouped_root);
        }

        dispatcher
    }

    /// Add or replace a stored-record constructor
    pub fn register_stored<F>(&mut self, category: Category, constructor: F)
    where
        F: Fn(&Record) -> Result<DisplayNode, DispatchError> + Send + Sync + 'static,
    {
        self.stored.register(category, constructor);
    }

    /// Add or replace an aggregate constructor
    pub fn register_aggregate<F>(&mut self, category: AggregateCategory, constructor: F)
    where
        F: Fn(&AggregateItem) -> Result<DisplayNode, DispatchError> + Send + Sync + 'static,
    {
        self.aggregate.register(category, constructor);
    }

    /// Check if a constructor exists for the item's category
    #[must_use]
    pub fn supports(&self, item: &Materializable) -> bool {
        match item {
            Materializable::Stored(record) => self.stored.contains(&record.category),
            Materializable::Aggregate(aggregate) => self.aggregate.contains(&aggregate.category),
        }
    }

    /// Build the display node for `item`
    ///
    /// # Errors
    /// - [`DispatchError::UnsupportedCategory`] if no constructor is registered
    /// - any error the constructor reports
    pub fn materialize(&self, item: &Materializable) -> Result<DisplayNode, DispatchError> {
        match item {
            Materializable::Stored(record) => self.materialize_record(record),
            Materializable::Aggregate(aggregate) => self.materialize_aggregate(aggregate),
        }
    }

    /// Build the display node for a stored record
    ///
    /// # Errors
    /// See [`materialize`](Self::materialize)
    pub fn materialize_record(&self, record: &Record) -> Result<DisplayNode, DispatchError> {
        let constructor = self.stored.get(&record.category)?;
        (**constructor)(record)
    }

    /// Build the display node for an aggregate root
    ///
    /// # Errors
    /// See [`materialize`](Self::materialize)
    pub fn materialize_aggregate(&self, item: &AggregateItem) -> Result<DisplayNode, DispatchError> {
        let constructor = self.aggregate.get(&item.category)?;
        (**constructor)(item)
    }

    /// Build the display node, isolating failure to this node
    ///
    /// Errors are logged and replaced by an error placeholder so sibling
    /// nodes can still be built.
    pub fn materialize_or_placeholder(&self, item: &Materializable) -> DisplayNode {
        match self.materialize(item) {
            Ok(node) => node,
            Err(error) => {
                let name = match item {
                    Materializable::Stored(record) => record.id.to_string(),
                    Materializable::Aggregate(aggregate) => aggregate.category.to_string(),
                };
                log_failure(&name, &item.tag(), &error);
                DisplayNode::placeholder(name, &error)
            }
        }
    }

    /// Number of stored-record constructors
    #[must_use]
    pub fn stored_len(&self) -> usize {
        self.stored.len()
    }

    /// Number of aggregate constructors
    #[must_use]
    pub fn aggregate_len(&self) -> usize {
        self.aggregate.len()
    }
}

impl Default for TypeDispatcher {
    fn default() -> Self {
        Self::with_defaults()
    }
}

pub(crate) fn log_failure(name: &str, tag: &str, error: &DispatchError) {
    if error.is_defect() {
        tracing::error!(node = name, category = tag, %error, "dispatcher contract violation");
    } else {
        tracing::warn!(node = name, category = tag, %error, "node materialization failed");
    }
}

fn static_root(item: &AggregateItem) -> DisplayNode {
    DisplayNode::new(NodeKind::Aggregate, item.category.display_name())
}

fn grouped_root(item: &AggregateItem) -> Result<DisplayNode, DispatchError> {
    let index = item
        .index
        .as_ref()
        .ok_or_else(|| DispatchError::MissingCollaborator(item.category.to_string()))?;
    Ok(DisplayNode::new(NodeKind::Aggregate, index.name())
        .with_display_name(index.spec().display_name.clone())
        .with_index(Arc::clone(index)))
}
