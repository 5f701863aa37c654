//! Test-only helpers for constructing iteration logs.

use chrono::{DateTime, TimeZone, Utc};

use crate::core::metadata::{MetadataExtra, build_metadata_at};
use crate::core::types::{IterationLog, IterationLogSummary, IterationStatus};

/// 2026-10-18T00:00:00Z, a fixed base for deterministic timestamps.
pub const BASE_MILLIS: i64 = 1_792_281_600_000;

pub fn at_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .expect("valid timestamp")
}

/// Build a log with an explicit creation time.
pub fn log_at(
    iteration_number: u32,
    created_millis: i64,
    task_id: Option<&str>,
    status: IterationStatus,
    body: &str,
) -> IterationLog {
    IterationLog {
        metadata: build_metadata_at(
            iteration_number,
            task_id,
            status,
            body,
            MetadataExtra::default(),
            at_millis(created_millis),
        ),
        body: body.to_string(),
    }
}

/// Successful log stamped `iteration_number` seconds after [`BASE_MILLIS`].
pub fn sample_log(iteration_number: u32, task_id: Option<&str>, body: &str) -> IterationLog {
    log_at(
        iteration_number,
        BASE_MILLIS + i64::from(iteration_number) * 1_000,
        task_id,
        IterationStatus::Success,
        body,
    )
}

/// Summary with an empty body, stamped like [`sample_log`].
pub fn summary(
    iteration_number: u32,
    task_id: Option<&str>,
    status: IterationStatus,
) -> IterationLogSummary {
    let log = log_at(
        iteration_number,
        BASE_MILLIS + i64::from(iteration_number) * 1_000,
        task_id,
        status,
        "",
    );
    IterationLogSummary {
        file_name: crate::core::filename::generate_log_filename(
            iteration_number,
            log.metadata.created_at,
        ),
        metadata: log.metadata,
    }
}
