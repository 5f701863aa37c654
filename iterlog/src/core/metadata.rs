//! Assembles log headers from raw run-engine inputs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::core::filename::truncate_to_millis;
use crate::core::types::{IterationLogMetadata, IterationStatus};

/// Optional caller-supplied details merged into the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataExtra {
    pub task_title: Option<String>,
    pub agent: Option<String>,
    pub model: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
    pub tags: BTreeMap<String, String>,
}

/// Build a fresh header stamped with the current time.
pub fn build_metadata(
    iteration_number: u32,
    task_id: Option<&str>,
    status: IterationStatus,
    content: &str,
    extra: MetadataExtra,
) -> IterationLogMetadata {
    build_metadata_at(iteration_number, task_id, status, content, extra, Utc::now())
}

/// Same as [`build_metadata`] with an explicit clock.
pub fn build_metadata_at(
    iteration_number: u32,
    task_id: Option<&str>,
    status: IterationStatus,
    content: &str,
    extra: MetadataExtra,
    now: DateTime<Utc>,
) -> IterationLogMetadata {
    // Derive the duration when the caller gave both ends but no explicit value.
    let duration_ms = extra.duration_ms.or_else(|| match (extra.started_at, extra.ended_at) {
        (Some(start), Some(end)) if end >= start => {
            u64::try_from((end - start).num_milliseconds()).ok()
        }
        _ => None,
    });

    IterationLogMetadata {
        iteration_number,
        task_id: task_id.map(str::to_string),
        created_at: truncate_to_millis(now),
        status,
        size_bytes: content.len() as u64,
        task_title: extra.task_title,
        agent: extra.agent,
        model: extra.model,
        started_at: extra.started_at,
        ended_at: extra.ended_at,
        duration_ms,
        error: extra.error,
        tags: extra.tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_760_778_307_123)
            .single()
            .expect("timestamp")
            + chrono::Duration::microseconds(456)
    }

    #[test]
    fn size_counts_utf8_bytes() {
        let meta = build_metadata_at(
            1,
            Some("task-1"),
            IterationStatus::Success,
            "héllo",
            MetadataExtra::default(),
            now(),
        );
        assert_eq!(meta.size_bytes, 6);
        assert_eq!(meta.task_id.as_deref(), Some("task-1"));
        assert_eq!(meta.created_at, truncate_to_millis(now()));
    }

    #[test]
    fn merges_extra_fields_and_derives_duration() {
        let started = now() - chrono::Duration::seconds(3);
        let mut tags = BTreeMap::new();
        tags.insert("branch".to_string(), "main".to_string());
        let meta = build_metadata_at(
            4,
            None,
            IterationStatus::Failure,
            "",
            MetadataExtra {
                task_title: Some("Fix login".to_string()),
                started_at: Some(started),
                ended_at: Some(now()),
                error: Some("agent exited 1".to_string()),
                tags: tags.clone(),
                ..Default::default()
            },
            now(),
        );
        assert_eq!(meta.duration_ms, Some(3_000));
        assert_eq!(meta.task_title.as_deref(), Some("Fix login"));
        assert_eq!(meta.error.as_deref(), Some("agent exited 1"));
        assert_eq!(meta.tags, tags);
        assert_eq!(meta.task_id, None);
    }

    #[test]
    fn explicit_duration_wins() {
        let meta = build_metadata_at(
            1,
            None,
            IterationStatus::Success,
            "",
            MetadataExtra {
                started_at: Some(now() - chrono::Duration::seconds(10)),
                ended_at: Some(now()),
                duration_ms: Some(7),
                ..Default::default()
            },
            now(),
        );
        assert_eq!(meta.duration_ms, Some(7));
    }
}
