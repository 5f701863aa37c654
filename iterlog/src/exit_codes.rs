//! Stable exit codes for `iterlog` commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed (I/O error, invalid config, corrupt record).
pub const INVALID: i32 = 1;
/// The requested iteration log does not exist.
pub const NOT_FOUND: i32 = 2;
/// Cleanup finished but at least one file could not be deleted.
pub const PARTIAL: i32 = 3;
