use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use super::ContentDomain;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SyncOutcome {
    Running,
    Succeeded,
    /// Completed, but some categories or series were skipped after transient failures
    Partial,
    Failed,
    Cancelled,
}

/// Per-domain state of the orchestrator.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SyncStage {
    #[default]
    Idle,
    Fetching,
    Reconciling,
    Generating,
    Failed,
}

/// One row of the append-only audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: i32,
    pub run_id: Uuid,
    pub domain: ContentDomain,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: SyncOutcome,
    pub stage: Option<SyncStage>,
    pub error: Option<String>,
    pub items_added: i32,
    pub items_updated: i32,
    pub items_removed: i32,
    pub categories_failed: i32,
    pub omitted_categories: Vec<String>,
}

/// Cache changes applied by one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileCounts {
    pub added: u64,
    pub updated: u64,
    pub removed: u64,
}

impl ReconcileCounts {
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0
    }
}

impl AddAssign for ReconcileCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.added += rhs.added;
        self.updated += rhs.updated;
        self.removed += rhs.removed;
    }
}

/// Result of one artifact generation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub written: u64,
    pub deleted: u64,
    pub unchanged: u64,
    pub failed: u64,
    pub errors: Vec<String>,
}

impl GenerationSummary {
    pub fn has_writes(&self) -> bool {
        self.written > 0 || self.deleted > 0
    }
}

/// Outcome of one domain inside a triggered run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainReport {
    pub domain: ContentDomain,
    pub outcome: SyncOutcome,
    pub stage: SyncStage,
    pub counts: ReconcileCounts,
    pub omitted: Vec<String>,
    pub generation: Option<GenerationSummary>,
    pub error: Option<String>,
}

/// Everything a triggered run did, returned from `RunHandle::wait`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub domains: Vec<DomainReport>,
}

impl SyncReport {
    pub fn domain(&self, domain: ContentDomain) -> Option<&DomainReport> {
        self.domains.iter().find(|d| d.domain == domain)
    }
}

/// Progress event broadcast while a run is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub run_id: Uuid,
    pub domain: ContentDomain,
    pub stage: SyncStage,
    pub message: String,
    pub categories_done: usize,
    pub categories_total: usize,
}
