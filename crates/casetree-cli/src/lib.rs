//! casetree command-line support
//!
//! Loads a case from JSON, builds one grouped index with its tree projection
//! and renders the tree as indented text. Pipeline replays feed new records
//! and events through an [`EventPump`] so the tree updates the same way it
//! would during live ingest.

#![warn(missing_docs)]

use anyhow::{bail, Context, Result};
use casetree_index::{
    EventPump, GroupedIndex, IndexSpec, PipelineEvent, PipelineRouter, PumpConfig, PumpStats,
};
use casetree_model::{MemoryStore, Record};
use casetree_tree::{
    AggregateCategory, NodeIdentity, ProjectionError, TreeProjection, TypeDispatcher,
};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Built-in grouped index to browse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPreset {
    /// Interesting file and artifact hits by rule set
    Interesting,
    /// Hash-set hits by set
    Hashset,
    /// Keyword hits by search term
    Keyword,
}

impl IndexPreset {
    /// Accepted command-line names
    pub const NAMES: [&'static str; 3] = ["interesting", "hashset", "keyword"];

    /// Index description
    #[must_use]
    pub fn spec(self) -> IndexSpec {
        match self {
            Self::Interesting => IndexSpec::interesting_items(),
            Self::Hashset => IndexSpec::hashset_hits(),
            Self::Keyword => IndexSpec::keyword_hits(),
        }
    }

    /// Aggregate root the tree hangs under
    #[must_use]
    pub fn aggregate(self) -> AggregateCategory {
        match self {
            Self::Interesting => AggregateCategory::InterestingHits,
            Self::Hashset => AggregateCategory::HashsetHits,
            Self::Keyword => AggregateCategory::KeywordHits,
        }
    }
}

impl FromStr for IndexPreset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "interesting" => Ok(Self::Interesting),
            "hashset" => Ok(Self::Hashset),
            "keyword" => Ok(Self::Keyword),
            other => bail!("unknown index '{other}', expected one of {:?}", Self::NAMES),
        }
    }
}

/// One replayed ingest step: records land in the store, then the signal fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayStep {
    /// Records added before the signal
    #[serde(default)]
    pub records: Vec<Record>,

    /// Pipeline signal announcing them
    pub signal: PipelineEvent,
}

/// Load case records from a JSON array file
///
/// # Errors
/// Fails if the file cannot be opened or decoded
pub fn load_case(path: &Path) -> Result<Arc<MemoryStore>> {
    let file = File::open(path).with_context(|| format!("opening case file {}", path.display()))?;
    let store = MemoryStore::from_json_reader(BufReader::new(file))
        .with_context(|| format!("reading case file {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Load replay steps from a JSON array file
///
/// # Errors
/// Fails if the file cannot be opened or decoded
pub fn load_replay(path: &Path) -> Result<Vec<ReplayStep>> {
    let file = File::open(path).with_context(|| format!("opening events file {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("reading events file {}", path.display()))
}

/// Build an attached tree projection for `preset` over `store`
#[must_use]
pub fn build_tree(store: Arc<MemoryStore>, preset: IndexPreset) -> TreeProjection {
    let index = Arc::new(GroupedIndex::new(preset.spec(), store));
    TreeProjection::attached(index, Arc::new(TypeDispatcher::with_defaults()), preset.aggregate())
}

/// Render the tree as indented text
///
/// Record rows are only materialized when `expand` is set.
///
/// # Errors
/// Returns [`ProjectionError`] if the projection is detached
pub fn render(tree: &TreeProjection, expand: bool) -> std::result::Result<String, ProjectionError> {
    let mut lines = vec![tree.materialize(&NodeIdentity::Root)?.display_name];

    for group in tree.list_children(&NodeIdentity::Root)? {
        lines.push(format!("  {}", tree.display_label(&group)?));
        if !expand {
            continue;
        }
        for record in tree.list_children(&group)? {
            let node = tree.materialize(&record)?;
            lines.push(match &node.error {
                Some(error) => format!("    {} <error: {error}>", node.name),
                None => {
                    let id = node.record_id.map(|id| id.to_string()).unwrap_or_default();
                    format!("    [{id}] {}", node.display_name)
                }
            });
        }
    }
    Ok(lines.into_iter().map(|line| line + "\n").collect())
}

/// Replay ingest steps through an event pump
///
/// Runs on the current tokio runtime and returns once every step has been
/// processed.
///
/// # Errors
/// Fails if the pump stops early
pub async fn replay(
    store: &MemoryStore,
    index: Arc<GroupedIndex>,
    steps: Vec<ReplayStep>,
    config: PumpConfig,
) -> Result<PumpStats> {
    let router = PipelineRouter::new();
    let _registration = router.register(index);
    let pump = EventPump::spawn(router, config);

    for step in steps {
        store.extend(step.records);
        pump.publish(step.signal).await.context("publishing pipeline event")?;
    }
    pump.shutdown().await.context("stopping event pump")
}
