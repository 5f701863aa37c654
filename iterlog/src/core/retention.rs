//! Retention planning: which iterations a cleanup should remove.

use chrono::{DateTime, TimeDelta, Utc};

use crate::core::types::LogCleanupOptions;

/// The fields retention needs from one valid log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionEntry {
    pub iteration_number: u32,
    pub created_at: DateTime<Utc>,
}

/// Return the iteration numbers to delete, ascending.
///
/// `max_count` keeps the newest N entries by `(iteration_number, created_at)`;
/// `max_age` marks anything strictly older than the threshold. The result is
/// the union of both rules.
pub fn plan_cleanup(
    entries: &[RetentionEntry],
    options: &LogCleanupOptions,
    now: DateTime<Utc>,
) -> Vec<u32> {
    if options.is_noop() {
        return Vec::new();
    }

    let mut ordered = entries.to_vec();
    ordered.sort_by(|a, b| {
        a.iteration_number
            .cmp(&b.iteration_number)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });

    let excess = options
        .max_count
        .map(|max| ordered.len().saturating_sub(max))
        .unwrap_or(0);
    // An age too large for chrono can never be exceeded.
    let max_age = options
        .max_age
        .and_then(|age| TimeDelta::from_std(age).ok());

    let mut marked: Vec<u32> = ordered
        .iter()
        .enumerate()
        .filter(|(idx, entry)| {
            *idx < excess || max_age.is_some_and(|age| now - entry.created_at > age)
        })
        .map(|(_, entry)| entry.iteration_number)
        .collect();
    marked.dedup();
    marked
}
