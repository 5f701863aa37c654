//! Persistence and lifecycle management for iteration logs.
//!
//! A run engine records one log per iteration under
//! `<root>/.iterlog/iterations/`; inspection tooling lists, filters and prunes
//! them. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (file name codec, header
//!   building, filtering, retention planning). No I/O.
//! - **[`io`]**: Filesystem side effects (directory management, atomic saves,
//!   scans, cleanup, config).
//!
//! [`structured_logger`] is an independent leveled logger for headless output
//! and shares nothing with the store.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod structured_logger;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::core::filename::{generate_log_filename, parse_log_filename};
pub use crate::core::metadata::{MetadataExtra, build_metadata};
pub use crate::core::types::{
    AnomalyKind, DiskUsage, IterationLog, IterationLogMetadata, IterationLogSummary,
    IterationStatus, LogAnomaly, LogCleanupOptions, LogCleanupResult, LogFileUsage,
    LogFilterOptions, LogListing, SortOrder,
};
pub use crate::error::{LogError, LogResult};
pub use crate::io::dirs::{ITERATIONS_DIR, ensure_iterations_dir, get_iterations_dir};
pub use crate::io::store::{
    IterationLogStore, cleanup_iteration_logs, get_iteration_log_by_number,
    get_iteration_log_count, get_iteration_logs_by_task, get_iteration_logs_disk_usage,
    has_iteration_logs, list_iteration_logs, load_iteration_log, save_iteration_log,
};
pub use crate::structured_logger::{
    LogComponent, LogFormat, LogLevel, LogSink, StructuredLogger, StructuredLoggerConfig,
    create_structured_logger,
};
