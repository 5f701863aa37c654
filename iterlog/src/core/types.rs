//! Shared record types for iteration logs.
//!
//! These types define the stable on-disk header and the value objects passed
//! between the pure planning code in `core` and the filesystem code in `io`.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome recorded for a single iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationStatus {
    InProgress,
    Success,
    Failure,
    Interrupted,
    Skipped,
}

impl IterationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Interrupted => "interrupted",
            Self::Skipped => "skipped",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_progress" => Some(Self::InProgress),
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            "interrupted" => Some(Self::Interrupted),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

/// Header persisted as the first line of every log file.
///
/// Rebuilt on every save via [`crate::core::metadata::build_metadata`]; never
/// edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationLogMetadata {
    pub iteration_number: u32,
    pub task_id: Option<String>,
    /// Creation time at millisecond precision (the filename encodes it).
    pub created_at: DateTime<Utc>,
    pub status: IterationStatus,
    /// UTF-8 byte length of the body.
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// A full log record: header plus free-form body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationLog {
    pub metadata: IterationLogMetadata,
    pub body: String,
}

/// Metadata-only projection returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IterationLogSummary {
    pub file_name: String,
    #[serde(flatten)]
    pub metadata: IterationLogMetadata,
}

impl IterationLogSummary {
    pub fn iteration_number(&self) -> u32 {
        self.metadata.iteration_number
    }
}

/// Direction for listing results, keyed by iteration number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Listing filter. Every `None` leaves that dimension unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilterOptions {
    pub task_id: Option<String>,
    pub status: Option<IterationStatus>,
    /// Inclusive lower bound on the iteration number.
    pub since_iteration: Option<u32>,
    /// Exclusive upper bound on the iteration number.
    pub before_iteration: Option<u32>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub order: SortOrder,
}

impl LogFilterOptions {
    pub fn for_task(task_id: impl Into<String>) -> Self {
        Self {
            task_id: Some(task_id.into()),
            ..Self::default()
        }
    }
}

/// Retention policy applied by cleanup.
///
/// A record is deleted if it violates either limit. With neither set, cleanup
/// is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogCleanupOptions {
    /// Keep at most this many of the most recent logs.
    pub max_count: Option<usize>,
    /// Delete logs whose age exceeds this.
    pub max_age: Option<Duration>,
    /// Report the deletion set without touching the filesystem.
    pub dry_run: bool,
}

impl LogCleanupOptions {
    pub fn is_noop(&self) -> bool {
        self.max_count.is_none() && self.max_age.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogCleanupResult {
    pub deleted_count: usize,
    /// Ascending.
    pub deleted_iteration_numbers: Vec<u32>,
    pub failed_deletions: BTreeMap<u32, String>,
    pub freed_bytes: u64,
    pub dry_run: bool,
}

/// Why a directory entry was left out of a batch result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnomalyKind {
    MalformedFilename,
    CorruptLog { reason: String },
    /// An older file for an iteration number that also has a newer file.
    SupersededDuplicate { iteration_number: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogAnomaly {
    pub file_name: String,
    #[serde(flatten)]
    pub kind: AnomalyKind,
}

/// Result of a listing: valid summaries plus everything that was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogListing {
    pub summaries: Vec<IterationLogSummary>,
    pub anomalies: Vec<LogAnomaly>,
}

impl LogListing {
    pub fn iteration_numbers(&self) -> Vec<u32> {
        self.summaries
            .iter()
            .map(IterationLogSummary::iteration_number)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogFileUsage {
    pub file_name: String,
    pub iteration_number: u32,
    pub bytes: u64,
}

/// On-disk footprint, measured from live `stat` calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub files: Vec<LogFileUsage>,
}
