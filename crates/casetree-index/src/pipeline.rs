//! Processing-pipeline event routing
//!
//! The pipeline announces new data with [`PipelineEvent`]s. A
//! [`PipelineRouter`] holds explicit registrations of the indices that should
//! react, and [`EventPump`] drives a router from an async channel, running
//! each reload on the blocking pool.

use crate::bus::{IdAllocator, Subscription, SubscriptionId};
use crate::error::PumpError;
use crate::index::{GroupedIndex, ReloadReport};
use casetree_model::Category;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Notification emitted by the processing pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "category", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// New records of this category may exist
    DataAdded(Category),

    /// A processing batch finished
    BatchCompleted,

    /// A processing batch was cancelled
    BatchCancelled,
}

impl PipelineEvent {
    /// Check if `index` must reload for this event
    #[must_use]
    pub fn concerns(&self, index: &GroupedIndex) -> bool {
        match self {
            Self::DataAdded(category) => index.tracks(category),
            Self::BatchCompleted | Self::BatchCancelled => true,
        }
    }
}

#[derive(Debug, Default)]
struct RouterInner {
    ids: IdAllocator,
    indices: DashMap<SubscriptionId, Arc<GroupedIndex>>,
}

/// Routes pipeline events to registered indices
#[derive(Debug, Clone, Default)]
pub struct PipelineRouter {
    inner: Arc<RouterInner>,
}

impl PipelineRouter {
    /// Create router with no registrations
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an index for event-driven reloads
    ///
    /// The index stays registered until the returned handle is dropped.
    pub fn register(&self, index: Arc<GroupedIndex>) -> Subscription {
        let id = self.inner.ids.next();
        tracing::debug!(index = index.name(), registration = %id, "index registered");
        self.inner.indices.insert(id, index);

        let router: Weak<RouterInner> = Arc::downgrade(&self.inner);
        Subscription::new(id, move || {
            if let Some(router) = router.upgrade() {
                router.indices.remove(&id);
            }
        })
    }

    /// Number of registered indices
    #[inline]
    #[must_use]
    pub fn registered(&self) -> usize {
        self.inner.indices.len()
    }

    /// Reload every registered index concerned by `event`
    ///
    /// Blocks for the duration of the store queries.
    pub fn route(&self, event: &PipelineEvent) -> Vec<ReloadReport> {
        let targets: Vec<Arc<GroupedIndex>> = self
            .inner
            .indices
            .iter()
            .filter(|entry| event.concerns(entry.value()))
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        tracing::debug!(?event, targets = targets.len(), "routing pipeline event");
        targets.iter().map(|index| index.reload()).collect()
    }
}

/// Event pump configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpConfig {
    /// Bounded channel capacity
    pub channel_capacity: usize,
}

impl PumpConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With channel capacity (minimum 1)
    #[inline]
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

/// Pump statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Events received
    pub events: usize,

    /// Index reloads performed
    pub reloads: usize,

    /// Reloads that left one or more categories unloaded
    pub degraded: usize,
}

/// Async driver feeding pipeline events to a router
#[derive(Debug)]
pub struct EventPump {
    sender: mpsc::Sender<PipelineEvent>,
    handle: JoinHandle<PumpStats>,
}

impl EventPump {
    /// Spawn pump on the current tokio runtime
    #[must_use]
    pub fn spawn(router: PipelineRouter, config: PumpConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.channel_capacity.max(1));
        let handle = tokio::spawn(pump_task(router, receiver));
        Self { sender, handle }
    }

    /// Additional sender for pipeline producers
    #[inline]
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<PipelineEvent> {
        self.sender.clone()
    }

    /// Queue an event
    ///
    /// # Errors
    /// Returns [`PumpError::Closed`] if the pump has stopped
    pub async fn publish(&self, event: PipelineEvent) -> Result<(), PumpError> {
        self.sender.send(event).await.map_err(|_| PumpError::Closed)
    }

    /// Stop accepting events and wait for queued ones to finish
    ///
    /// The pump exits once every sender, including clones handed out by
    /// [`sender`](Self::sender), has been dropped.
    ///
    /// # Errors
    /// Returns [`PumpError::TaskFailed`] if the pump task panicked
    pub async fn shutdown(self) -> Result<PumpStats, PumpError> {
        drop(self.sender);
        self.handle
            .await
            .map_err(|e| PumpError::TaskFailed(e.to_string()))
    }
}

async fn pump_task(router: PipelineRouter, mut receiver: mpsc::Receiver<PipelineEvent>) -> PumpStats {
    let mut stats = PumpStats::default();

    while let Some(event) = receiver.recv().await {
        stats.events += 1;
        let worker = router.clone();
        match tokio::task::spawn_blocking(move || worker.route(&event)).await {
            Ok(reports) => {
                stats.reloads += reports.len();
                stats.degraded += reports.iter().filter(|r| !r.is_complete()).count();
            }
            Err(error) => tracing::error!(%error, "reload task failed"),
        }
    }

    tracing::debug!(events = stats.events, reloads = stats.reloads, "event pump stopped");
    stats
}
