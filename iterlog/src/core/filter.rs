//! Pure filtering and ordering of log summaries.

use crate::core::types::{IterationLogSummary, LogFilterOptions, SortOrder};

/// Range check on the number alone; usable before any file is opened.
pub fn in_iteration_range(filter: &LogFilterOptions, iteration_number: u32) -> bool {
    if filter
        .since_iteration
        .is_some_and(|since| iteration_number < since)
    {
        return false;
    }
    if filter
        .before_iteration
        .is_some_and(|before| iteration_number >= before)
    {
        return false;
    }
    true
}

/// Full predicate over a summary's header fields.
pub fn matches(filter: &LogFilterOptions, summary: &IterationLogSummary) -> bool {
    let meta = &summary.metadata;
    if !in_iteration_range(filter, meta.iteration_number) {
        return false;
    }
    if let Some(ref task_id) = filter.task_id
        && meta.task_id.as_deref() != Some(task_id.as_str())
    {
        return false;
    }
    if filter.status.is_some_and(|status| meta.status != status) {
        return false;
    }
    if filter
        .created_after
        .is_some_and(|after| meta.created_at < after)
    {
        return false;
    }
    if filter
        .created_before
        .is_some_and(|before| meta.created_at >= before)
    {
        return false;
    }
    true
}

/// Filter, sort by `(iteration_number, created_at)` in the requested
/// direction, then truncate to `limit`.
pub fn apply(
    filter: &LogFilterOptions,
    summaries: Vec<IterationLogSummary>,
) -> Vec<IterationLogSummary> {
    let mut kept: Vec<IterationLogSummary> = summaries
        .into_iter()
        .filter(|summary| matches(filter, summary))
        .collect();
    kept.sort_by(|a, b| {
        a.metadata
            .iteration_number
            .cmp(&b.metadata.iteration_number)
            .then_with(|| a.metadata.created_at.cmp(&b.metadata.created_at))
    });
    if filter.order == SortOrder::Descending {
        kept.reverse();
    }
    if let Some(limit) = filter.limit {
        kept.truncate(limit);
    }
    kept
}
