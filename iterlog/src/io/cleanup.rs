//! Retention enforcement for the iterations directory.
//!
//! `max_count` is measured over logs whose header reads back; a corrupt file
//! never takes the place of a readable one, though it still expires by age.
//! Deletion is best effort: one file that cannot be removed is recorded and
//! the rest of the deletion set is still processed.

use std::collections::BTreeMap;
use std::fs;
use std::io;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::core::retention::{RetentionEntry, plan_cleanup};
use crate::core::types::{LogCleanupOptions, LogCleanupResult};
use crate::error::{LogError, LogResult};
use crate::io::store::{IterationLogStore, LogFileEntry, read_header};

impl IterationLogStore {
    /// Apply `options` to the logs in this store.
    pub fn cleanup_iteration_logs(
        &self,
        options: &LogCleanupOptions,
    ) -> LogResult<LogCleanupResult> {
        self.cleanup_iteration_logs_at(options, Utc::now())
    }

    /// Same as [`Self::cleanup_iteration_logs`] with an explicit clock for
    /// age checks.
    pub fn cleanup_iteration_logs_at(
        &self,
        options: &LogCleanupOptions,
        now: DateTime<Utc>,
    ) -> LogResult<LogCleanupResult> {
        if options.is_noop() {
            return Ok(LogCleanupResult {
                dry_run: options.dry_run,
                ..Default::default()
            });
        }

        let (latest, superseded) = self.scan()?.split_superseded();
        let mut valid = Vec::with_capacity(latest.len());
        let mut corrupt = Vec::new();
        for entry in &latest {
            let retention = RetentionEntry {
                iteration_number: entry.iteration_number,
                created_at: entry.created_at,
            };
            match read_header(entry) {
                Ok(Some(_)) => valid.push(retention),
                Ok(None) => {}
                Err(reason) => {
                    debug!(file = %entry.file_name, %reason, "corrupt log only subject to max_age");
                    corrupt.push(retention);
                }
            }
        }

        // Only readable logs count toward `max_count`; corrupt files still age out.
        let mut marked = plan_cleanup(&valid, options, now);
        marked.extend(plan_cleanup(
            &corrupt,
            &LogCleanupOptions {
                max_count: None,
                ..*options
            },
            now,
        ));
        marked.sort_unstable();
        marked.dedup();
        debug!(
            dir = %self.iterations_dir().display(),
            candidates = valid.len(),
            corrupt = corrupt.len(),
            marked = marked.len(),
            dry_run = options.dry_run,
            "planned iteration log cleanup"
        );

        // Group every file (including stale duplicates) under its number.
        let mut files: BTreeMap<u32, Vec<LogFileEntry>> = BTreeMap::new();
        for entry in latest.into_iter().chain(superseded) {
            files.entry(entry.iteration_number).or_default().push(entry);
        }

        let result = execute_plan(marked, files, options.dry_run, delete_file);
        info!(
            deleted = result.deleted_count,
            failed = result.failed_deletions.len(),
            freed_bytes = result.freed_bytes,
            dry_run = result.dry_run,
            "iteration log cleanup finished"
        );
        Ok(result)
    }
}

/// Delete (or, in a dry run, measure) every file of each marked iteration.
///
/// A failed removal is recorded against its iteration and the loop moves on.
fn execute_plan(
    marked: Vec<u32>,
    mut files: BTreeMap<u32, Vec<LogFileEntry>>,
    dry_run: bool,
    mut remove: impl FnMut(&LogFileEntry) -> LogResult<u64>,
) -> LogCleanupResult {
    let mut result = LogCleanupResult {
        dry_run,
        ..Default::default()
    };
    for iteration_number in marked {
        let targets = files.remove(&iteration_number).unwrap_or_default();
        if dry_run {
            result.freed_bytes += targets.iter().map(file_size).sum::<u64>();
            result.deleted_iteration_numbers.push(iteration_number);
            continue;
        }

        let mut failure = None;
        for target in &targets {
            match remove(target) {
                Ok(bytes) => result.freed_bytes += bytes,
                Err(err) => {
                    warn!(
                        iteration = iteration_number,
                        file = %target.file_name,
                        error = %err,
                        "cannot delete iteration log"
                    );
                    failure = Some(error_reason(&err));
                }
            }
        }
        match failure {
            Some(reason) => {
                result.failed_deletions.insert(iteration_number, reason);
            }
            None => result.deleted_iteration_numbers.push(iteration_number),
        }
    }
    result.deleted_count = result.deleted_iteration_numbers.len();
    result
}

fn file_size(entry: &LogFileEntry) -> u64 {
    fs::metadata(&entry.path).map(|meta| meta.len()).unwrap_or(0)
}

/// Remove one file and return the bytes it occupied. A file that is already
/// gone frees nothing but is not a failure.
fn delete_file(entry: &LogFileEntry) -> LogResult<u64> {
    let bytes = file_size(entry);
    match fs::remove_file(&entry.path) {
        Ok(()) => Ok(bytes),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(source) => Err(LogError::Delete {
            path: entry.path.clone(),
            source,
        }),
    }
}

fn error_reason(err: &LogError) -> String {
    match err {
        LogError::Delete { source, .. } => source.to_string(),
        other => other.to_string(),
    }
}
