//! Deterministic file names for iteration logs.
//!
//! Layout: `iteration-{n:010}-{YYYYMMDD}T{HHMMSS}{mmm}Z.json`. The iteration
//! number is padded to the full width of `u32`, so sorting names as strings
//! sorts them by iteration number, then by creation time.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use regex::Regex;

use crate::error::{LogError, LogResult};

pub const LOG_FILE_PREFIX: &str = "iteration-";
pub const LOG_FILE_EXTENSION: &str = "json";
const TEMP_SUFFIX: &str = ".tmp";
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3fZ";

static LOG_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^iteration-(\d{10})-(\d{4})(\d{2})(\d{2})T(\d{2})(\d{2})(\d{2})(\d{3})Z\.json$")
        .expect("log filename pattern compiles")
});

/// Truncate a timestamp to the millisecond precision the file name carries.
pub fn truncate_to_millis(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.trunc_subsecs(3)
}

/// Build the file name for an iteration log.
///
/// Sub-millisecond precision is dropped. Years outside `0000..=9999` do not
/// survive a round trip through [`parse_log_filename`].
pub fn generate_log_filename(iteration_number: u32, timestamp: DateTime<Utc>) -> String {
    format!(
        "{LOG_FILE_PREFIX}{iteration_number:010}-{}.{LOG_FILE_EXTENSION}",
        timestamp.format(TIMESTAMP_FORMAT)
    )
}

/// Recover `(iteration_number, created_at)` from a file name.
///
/// Only canonical names produced by [`generate_log_filename`] are accepted.
pub fn parse_log_filename(file_name: &str) -> LogResult<(u32, DateTime<Utc>)> {
    let malformed = || LogError::MalformedFilename {
        file_name: file_name.to_string(),
    };
    let caps = LOG_FILENAME.captures(file_name).ok_or_else(malformed)?;
    let field = |idx: usize| -> LogResult<u32> { caps[idx].parse().map_err(|_| malformed()) };

    let iteration_number = field(1)?;
    let year = i32::try_from(field(2)?).map_err(|_| malformed())?;
    let date = NaiveDate::from_ymd_opt(year, field(3)?, field(4)?).ok_or_else(malformed)?;
    let timestamp = date
        .and_hms_milli_opt(field(5)?, field(6)?, field(7)?, field(8)?)
        .ok_or_else(malformed)?
        .and_utc();

    if generate_log_filename(iteration_number, timestamp) != file_name {
        return Err(malformed());
    }
    Ok((iteration_number, timestamp))
}

/// Hidden sibling used while a save is in flight.
pub fn temp_file_name(file_name: &str) -> String {
    format!(".{file_name}{TEMP_SUFFIX}")
}

/// True for in-flight write files, which listings skip without reporting.
pub fn is_temp_file(file_name: &str) -> bool {
    file_name.starts_with('.') && file_name.ends_with(TEMP_SUFFIX)
}
