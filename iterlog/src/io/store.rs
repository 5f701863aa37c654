//! Iteration log persistence (`.iterlog/iterations/`).
//!
//! One file per iteration. Line 1 holds the compact JSON header; the body
//! follows verbatim after the first newline, so listings can read the header
//! without loading the body.
//!
//! The directory is scanned on every call; there is no index file to drift
//! out of sync with what is on disk.

use std::fs::{self, DirEntry, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::core::filename::{
    generate_log_filename, is_temp_file, parse_log_filename, truncate_to_millis,
};
use crate::core::filter::{self, in_iteration_range};
use crate::core::types::{
    AnomalyKind, DiskUsage, IterationLog, IterationLogMetadata, IterationLogSummary, LogAnomaly,
    LogCleanupOptions, LogCleanupResult, LogFileUsage, LogFilterOptions, LogListing,
};
use crate::error::{LogError, LogResult};
use crate::io::config::LogsConfig;
use crate::io::dirs::{ensure_dir, get_iterations_dir, resolve_root, write_atomic};

/// Handle on one iterations directory.
///
/// Holds only the resolved path, so it is cheap to clone and share. Every
/// operation reads the filesystem fresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationLogStore {
    dir: PathBuf,
}

/// A directory entry whose name decoded as a log file.
#[derive(Debug, Clone)]
pub(crate) struct LogFileEntry {
    pub(crate) file_name: String,
    pub(crate) path: PathBuf,
    pub(crate) iteration_number: u32,
    pub(crate) created_at: DateTime<Utc>,
}

#[derive(Debug)]
enum Scanned {
    Log(LogFileEntry),
    Malformed(String),
}

/// Every directory entry, sorted by `(iteration_number, created_at)`.
#[derive(Debug, Default)]
pub(crate) struct DirScan {
    pub(crate) entries: Vec<LogFileEntry>,
    pub(crate) malformed: Vec<String>,
}

impl DirScan {
    /// Split into the newest file per iteration number and the older
    /// duplicates it supersedes.
    pub(crate) fn split_superseded(self) -> (Vec<LogFileEntry>, Vec<LogFileEntry>) {
        let mut latest: Vec<LogFileEntry> = Vec::with_capacity(self.entries.len());
        let mut superseded = Vec::new();
        for entry in self.entries {
            if let Some(prev) = latest.last_mut()
                && prev.iteration_number == entry.iteration_number
            {
                superseded.push(std::mem::replace(prev, entry));
                continue;
            }
            latest.push(entry);
        }
        (latest, superseded)
    }
}

impl IterationLogStore {
    /// Store rooted at `<base_dir>/.iterlog/iterations`.
    pub fn open(base_dir: Option<&Path>) -> Self {
        Self {
            dir: get_iterations_dir(base_dir),
        }
    }

    /// Store for an explicit iterations directory.
    pub fn at_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store for the directory named by a loaded config.
    pub fn from_config(config: &LogsConfig, root: &Path) -> Self {
        Self::at_dir(resolve_root(Some(root)).join(&config.iterations_dir))
    }

    pub fn iterations_dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a log atomically and return its final path.
    ///
    /// `size_bytes` is recomputed from the body and `created_at` truncated to
    /// the precision the file name carries. Any other file for the same
    /// iteration number is removed afterwards.
    pub fn save_iteration_log(&self, log: &IterationLog) -> LogResult<PathBuf> {
        let mut metadata = log.metadata.clone();
        metadata.created_at = truncate_to_millis(metadata.created_at);
        metadata.size_bytes = log.body.len() as u64;

        let file_name = generate_log_filename(metadata.iteration_number, metadata.created_at);
        let path = self.dir.join(&file_name);
        // Years outside 0000..=9999 format to names the scanner rejects.
        if parse_log_filename(&file_name).is_err() {
            return Err(LogError::Write {
                path,
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "created_at {} cannot be encoded in a log file name",
                        metadata.created_at.to_rfc3339()
                    ),
                ),
            });
        }
        let contents = encode_log(&metadata, &log.body).map_err(|err| LogError::Write {
            path: path.clone(),
            source: io::Error::from(err),
        })?;

        ensure_dir(&self.dir)?;
        debug!(
            path = %path.display(),
            iteration = metadata.iteration_number,
            bytes = contents.len(),
            "saving iteration log"
        );
        write_atomic(&path, &contents).map_err(|source| LogError::Write {
            path: path.clone(),
            source,
        })?;
        self.remove_superseded(metadata.iteration_number, &file_name);
        Ok(path)
    }

    /// Load the full record for an iteration number.
    pub fn load_iteration_log(&self, iteration_number: u32) -> LogResult<IterationLog> {
        let mut candidates: Vec<LogFileEntry> = self
            .scan()?
            .entries
            .into_iter()
            .filter(|entry| entry.iteration_number == iteration_number)
            .collect();
        let Some(latest) = candidates.pop() else {
            return Err(LogError::NotFound { iteration_number });
        };
        for stale in &candidates {
            warn!(
                iteration = iteration_number,
                file = %stale.file_name,
                using = %latest.file_name,
                "multiple log files for one iteration; using the newest"
            );
        }
        read_log(&latest)
    }

    pub fn get_iteration_log_by_number(&self, iteration_number: u32) -> LogResult<IterationLog> {
        self.load_iteration_log(iteration_number)
    }

    /// List header summaries matching `filter`, without reading bodies.
    pub fn list_iteration_logs(&self, filter: &LogFilterOptions) -> LogResult<LogListing> {
        let scan = self.scan()?;
        let mut anomalies: Vec<LogAnomaly> = scan
            .malformed
            .iter()
            .map(|file_name| LogAnomaly {
                file_name: file_name.clone(),
                kind: AnomalyKind::MalformedFilename,
            })
            .collect();

        let (latest, superseded) = scan.split_superseded();
        anomalies.extend(superseded.into_iter().map(|entry| LogAnomaly {
            file_name: entry.file_name,
            kind: AnomalyKind::SupersededDuplicate {
                iteration_number: entry.iteration_number,
            },
        }));

        let mut summaries = Vec::new();
        for entry in latest
            .into_iter()
            .filter(|entry| in_iteration_range(filter, entry.iteration_number))
        {
            match read_header(&entry) {
                Ok(Some(metadata)) => summaries.push(IterationLogSummary {
                    file_name: entry.file_name,
                    metadata,
                }),
                Ok(None) => {}
                Err(reason) => anomalies.push(LogAnomaly {
                    file_name: entry.file_name,
                    kind: AnomalyKind::CorruptLog { reason },
                }),
            }
        }

        let summaries = filter::apply(filter, summaries);
        debug!(
            dir = %self.dir.display(),
            count = summaries.len(),
            anomalies = anomalies.len(),
            "listed iteration logs"
        );
        Ok(LogListing {
            summaries,
            anomalies,
        })
    }

    pub fn get_iteration_logs_by_task(&self, task_id: &str) -> LogResult<LogListing> {
        self.list_iteration_logs(&LogFilterOptions::for_task(task_id))
    }

    /// Number of distinct iterations with a readable log.
    ///
    /// Skipped entries are reported through `tracing` at `warn`.
    pub fn get_iteration_log_count(&self) -> LogResult<usize> {
        let listing = self.list_iteration_logs(&LogFilterOptions::default())?;
        for anomaly in &listing.anomalies {
            warn!(file = %anomaly.file_name, kind = ?anomaly.kind, "skipping iteration log entry");
        }
        Ok(listing.len())
    }

    /// True once any valid log is found; stops at the first one.
    pub fn has_iteration_logs(&self) -> LogResult<bool> {
        let Some(read_dir) = self.read_dir()? else {
            return Ok(false);
        };
        for dir_entry in read_dir {
            if let Some(Scanned::Log(entry)) = self.classify(dir_entry)
                && matches!(read_header(&entry), Ok(Some(_)))
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Bytes on disk for every log file, from live `stat` calls.
    pub fn get_iteration_logs_disk_usage(&self) -> LogResult<DiskUsage> {
        let mut usage = DiskUsage::default();
        for entry in self.scan()?.entries {
            match fs::metadata(&entry.path) {
                Ok(meta) => {
                    usage.total_bytes += meta.len();
                    usage.files.push(LogFileUsage {
                        file_name: entry.file_name,
                        iteration_number: entry.iteration_number,
                        bytes: meta.len(),
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(file = %entry.file_name, error = %err, "cannot stat iteration log");
                }
            }
        }
        Ok(usage)
    }

    /// Read every directory entry and decode the log file names.
    pub(crate) fn scan(&self) -> LogResult<DirScan> {
        let mut scan = DirScan::default();
        let Some(read_dir) = self.read_dir()? else {
            return Ok(scan);
        };
        for dir_entry in read_dir {
            match self.classify(dir_entry) {
                Some(Scanned::Log(entry)) => scan.entries.push(entry),
                Some(Scanned::Malformed(file_name)) => scan.malformed.push(file_name),
                None => {}
            }
        }
        scan.entries.sort_by(|a, b| {
            a.iteration_number
                .cmp(&b.iteration_number)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        scan.malformed.sort();
        Ok(scan)
    }

    /// `None` when the directory does not exist yet.
    fn read_dir(&self) -> LogResult<Option<fs::ReadDir>> {
        match fs::read_dir(&self.dir) {
            Ok(read_dir) => Ok(Some(read_dir)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(LogError::Read {
                path: self.dir.clone(),
                source,
            }),
        }
    }

    /// Directories and in-flight temp files are ignored.
    fn classify(&self, dir_entry: io::Result<DirEntry>) -> Option<Scanned> {
        let dir_entry = match dir_entry {
            Ok(dir_entry) => dir_entry,
            Err(err) => {
                warn!(dir = %self.dir.display(), error = %err, "cannot read directory entry");
                return None;
            }
        };
        if dir_entry.file_type().is_ok_and(|kind| kind.is_dir()) {
            return None;
        }
        let file_name = dir_entry.file_name().to_string_lossy().into_owned();
        if is_temp_file(&file_name) {
            return None;
        }
        match parse_log_filename(&file_name) {
            Ok((iteration_number, created_at)) => Some(Scanned::Log(LogFileEntry {
                path: dir_entry.path(),
                file_name,
                iteration_number,
                created_at,
            })),
            Err(_) => Some(Scanned::Malformed(file_name)),
        }
    }

    fn remove_superseded(&self, iteration_number: u32, keep: &str) {
        let scan = match self.scan() {
            Ok(scan) => scan,
            Err(err) => {
                warn!(error = %err, "cannot scan for superseded iteration logs");
                return;
            }
        };
        for entry in scan
            .entries
            .iter()
            .filter(|entry| entry.iteration_number == iteration_number && entry.file_name != keep)
        {
            match fs::remove_file(&entry.path) {
                Ok(()) => debug!(file = %entry.file_name, "removed superseded iteration log"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!(
                    file = %entry.file_name,
                    error = %err,
                    "cannot remove superseded iteration log"
                ),
            }
        }
    }
}

fn encode_log(metadata: &IterationLogMetadata, body: &str) -> serde_json::Result<String> {
    let mut buf = serde_json::to_string(metadata)?;
    buf.push('\n');
    buf.push_str(body);
    Ok(buf)
}

/// Header must describe the same identity as the file name.
fn check_identity(entry: &LogFileEntry, metadata: &IterationLogMetadata) -> Result<(), String> {
    if metadata.iteration_number != entry.iteration_number {
        return Err(format!(
            "header iteration {} does not match file name iteration {}",
            metadata.iteration_number, entry.iteration_number
        ));
    }
    if metadata.created_at != entry.created_at {
        return Err(format!(
            "header created_at {} does not match file name timestamp {}",
            metadata.created_at.to_rfc3339(),
            entry.created_at.to_rfc3339()
        ));
    }
    Ok(())
}

fn parse_header(entry: &LogFileEntry, line: &str) -> Result<IterationLogMetadata, String> {
    let metadata: IterationLogMetadata =
        serde_json::from_str(line).map_err(|err| format!("invalid header: {err}"))?;
    check_identity(entry, &metadata)?;
    Ok(metadata)
}

/// Read only the first line. `Ok(None)` if the file vanished since the scan.
pub(crate) fn read_header(entry: &LogFileEntry) -> Result<Option<IterationLogMetadata>, String> {
    let file = match File::open(&entry.path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(format!("open failed: {err}")),
    };
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|err| format!("read failed: {err}"))?;
    let Some(header) = line.strip_suffix('\n') else {
        return Err("missing header line".to_string());
    };
    parse_header(entry, header).map(Some)
}

fn read_log(entry: &LogFileEntry) -> LogResult<IterationLog> {
    let corrupt = |reason: String| LogError::CorruptLog {
        path: entry.path.clone(),
        reason,
    };
    let contents = match fs::read_to_string(&entry.path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(LogError::NotFound {
                iteration_number: entry.iteration_number,
            });
        }
        Err(err) if err.kind() == io::ErrorKind::InvalidData => {
            return Err(corrupt("log is not valid UTF-8".to_string()));
        }
        Err(source) => {
            return Err(LogError::Read {
                path: entry.path.clone(),
                source,
            });
        }
    };
    let (header, body) = contents
        .split_once('\n')
        .ok_or_else(|| corrupt("missing header line".to_string()))?;
    let metadata = parse_header(entry, header).map_err(corrupt)?;
    if metadata.size_bytes != body.len() as u64 {
        return Err(corrupt(format!(
            "body is {} bytes but header records {}",
            body.len(),
            metadata.size_bytes
        )));
    }
    debug!(file = %entry.file_name, "loaded iteration log");
    Ok(IterationLog {
        metadata,
        body: body.to_string(),
    })
}

/// Free-function forms over [`IterationLogStore::open`].
pub fn save_iteration_log(base_dir: Option<&Path>, log: &IterationLog) -> LogResult<PathBuf> {
    IterationLogStore::open(base_dir).save_iteration_log(log)
}

pub fn load_iteration_log(
    base_dir: Option<&Path>,
    iteration_number: u32,
) -> LogResult<IterationLog> {
    IterationLogStore::open(base_dir).load_iteration_log(iteration_number)
}

pub fn list_iteration_logs(
    base_dir: Option<&Path>,
    filter: &LogFilterOptions,
) -> LogResult<LogListing> {
    IterationLogStore::open(base_dir).list_iteration_logs(filter)
}

pub fn get_iteration_log_by_number(
    base_dir: Option<&Path>,
    iteration_number: u32,
) -> LogResult<IterationLog> {
    IterationLogStore::open(base_dir).get_iteration_log_by_number(iteration_number)
}

pub fn get_iteration_logs_by_task(base_dir: Option<&Path>, task_id: &str) -> LogResult<LogListing> {
    IterationLogStore::open(base_dir).get_iteration_logs_by_task(task_id)
}

pub fn get_iteration_log_count(base_dir: Option<&Path>) -> LogResult<usize> {
    IterationLogStore::open(base_dir).get_iteration_log_count()
}

pub fn has_iteration_logs(base_dir: Option<&Path>) -> LogResult<bool> {
    IterationLogStore::open(base_dir).has_iteration_logs()
}

pub fn get_iteration_logs_disk_usage(base_dir: Option<&Path>) -> LogResult<DiskUsage> {
    IterationLogStore::open(base_dir).get_iteration_logs_disk_usage()
}

pub fn cleanup_iteration_logs(
    base_dir: Option<&Path>,
    options: &LogCleanupOptions,
) -> LogResult<LogCleanupResult> {
    IterationLogStore::open(base_dir).cleanup_iteration_logs(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::IterationStatus;
    use crate::test_support::{log_at, sample_log};
    use chrono::TimeZone;

    fn store() -> (tempfile::TempDir, IterationLogStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = IterationLogStore::open(Some(temp.path()));
        (temp, store)
    }

    #[test]
    fn save_writes_header_line_then_body() {
        let (_temp, store) = store();
        let log = sample_log(3, Some("task-a"), "line one\nline two\n");
        let path = store.save_iteration_log(&log).expect("save");

        let contents = fs::read_to_string(&path).expect("read");
        let (header, body) = contents.split_once('\n').expect("header");
        assert!(header.starts_with('{'));
        assert!(header.contains("\"iteration_number\":3"));
        assert_eq!(body, "line one\nline two\n");
        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some(generate_log_filename(3, log.metadata.created_at).as_str())
        );
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let (_temp, store) = store();
        store
            .save_iteration_log(&sample_log(1, None, "body"))
            .expect("save");
        let names: Vec<String> = fs::read_dir(store.iterations_dir())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(!is_temp_file(&names[0]));
    }

    #[test]
    fn save_recomputes_size_from_body() {
        let (_temp, store) = store();
        let mut log = sample_log(1, None, "four");
        log.metadata.size_bytes = 999;
        store.save_iteration_log(&log).expect("save");
        let loaded = store.load_iteration_log(1).expect("load");
        assert_eq!(loaded.metadata.size_bytes, 4);
    }

    #[test]
    fn save_rejects_timestamps_outside_four_digit_years() {
        let (_temp, store) = store();
        for year in [10_000, -1] {
            let mut log = sample_log(1, None, "body");
            log.metadata.created_at = Utc
                .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
                .single()
                .expect("timestamp");
            let err = store.save_iteration_log(&log).expect_err("unencodable");
            assert!(matches!(err, LogError::Write { .. }), "year {year}: {err:?}");
        }
        assert!(!store.iterations_dir().exists());
        assert!(store.load_iteration_log(1).expect_err("nothing saved").is_not_found());
    }

    #[test]
    fn resave_replaces_previous_file() {
        let (_temp, store) = store();
        store
            .save_iteration_log(&log_at(2, 1_000, Some("a"), IterationStatus::InProgress, "first"))
            .expect("first save");
        store
            .save_iteration_log(&log_at(2, 5_000, Some("a"), IterationStatus::Success, "second"))
            .expect("second save");

        assert_eq!(store.scan().expect("scan").entries.len(), 1);
        let loaded = store.load_iteration_log(2).expect("load");
        assert_eq!(loaded.body, "second");
        assert_eq!(loaded.metadata.status, IterationStatus::Success);
    }

    #[test]
    fn load_prefers_newest_duplicate() {
        let (_temp, store) = store();
        let dir = store.iterations_dir().to_path_buf();
        ensure_dir(&dir).expect("mkdir");
        for (millis, body) in [(9_000, "newer"), (1_000, "older")] {
            let log = log_at(4, millis, None, IterationStatus::Success, body);
            let name = generate_log_filename(4, log.metadata.created_at);
            let contents = encode_log(&log.metadata, &log.body).expect("encode");
            fs::write(dir.join(name), contents).expect("write");
        }

        assert_eq!(store.load_iteration_log(4).expect("load").body, "newer");

        let listing = store
            .list_iteration_logs(&LogFilterOptions::default())
            .expect("list");
        assert_eq!(listing.iteration_numbers(), vec![4]);
        assert_eq!(
            listing.anomalies[0].kind,
            AnomalyKind::SupersededDuplicate {
                iteration_number: 4
            }
        );
    }

    #[test]
    fn load_missing_is_not_found() {
        let (_temp, store) = store();
        let err = store.load_iteration_log(9999).expect_err("missing");
        assert!(matches!(
            err,
            LogError::NotFound {
                iteration_number: 9999
            }
        ));
    }

    #[test]
    fn load_reports_corrupt_header_and_truncated_body() {
        let (_temp, store) = store();
        let path = store
            .save_iteration_log(&sample_log(1, None, "full body"))
            .expect("save");
        let contents = fs::read_to_string(&path).expect("read");
        fs::write(&path, &contents[..contents.len() - 3]).expect("truncate");
        assert!(store.load_iteration_log(1).expect_err("truncated").is_corrupt());

        fs::write(&path, "not json\nbody").expect("overwrite");
        assert!(store.load_iteration_log(1).expect_err("garbage").is_corrupt());
    }

    #[test]
    fn header_must_match_file_name() {
        let (_temp, store) = store();
        let path = store
            .save_iteration_log(&sample_log(1, None, "body"))
            .expect("save");
        let renamed = path.with_file_name(generate_log_filename(
            2,
            sample_log(1, None, "").metadata.created_at,
        ));
        fs::rename(&path, &renamed).expect("rename");

        let err = store.load_iteration_log(2).expect_err("mismatch");
        assert!(err.is_corrupt());
    }

    #[test]
    fn listing_reads_headers_only_and_skips_temp_files() {
        let (_temp, store) = store();
        store
            .save_iteration_log(&sample_log(1, Some("a"), "x".repeat(10_000).as_str()))
            .expect("save");
        fs::write(store.iterations_dir().join(".partial.json.tmp"), "{").expect("temp");
        fs::create_dir(store.iterations_dir().join("nested")).expect("subdir");

        let listing = store
            .list_iteration_logs(&LogFilterOptions::default())
            .expect("list");
        assert_eq!(listing.iteration_numbers(), vec![1]);
        assert_eq!(listing.summaries[0].metadata.size_bytes, 10_000);
        assert!(listing.anomalies.is_empty());
    }

    #[test]
    fn missing_directory_is_empty() {
        let (_temp, store) = store();
        assert!(!store.iterations_dir().exists());
        assert!(
            store
                .list_iteration_logs(&LogFilterOptions::default())
                .expect("list")
                .is_empty()
        );
        assert_eq!(store.get_iteration_log_count().expect("count"), 0);
        assert!(!store.has_iteration_logs().expect("has"));
        assert_eq!(
            store.get_iteration_logs_disk_usage().expect("usage"),
            DiskUsage::default()
        );
    }

    #[test]
    fn has_logs_ignores_malformed_entries() {
        let (_temp, store) = store();
        ensure_dir(store.iterations_dir()).expect("mkdir");
        fs::write(store.iterations_dir().join("README.md"), "notes").expect("write");
        assert!(!store.has_iteration_logs().expect("has"));

        store
            .save_iteration_log(&sample_log(1, None, "body"))
            .expect("save");
        assert!(store.has_iteration_logs().expect("has"));
    }

    #[test]
    fn disk_usage_matches_file_sizes() {
        let (_temp, store) = store();
        let first = store
            .save_iteration_log(&sample_log(1, None, "abc"))
            .expect("save");
        let second = store
            .save_iteration_log(&sample_log(2, None, "defghi"))
            .expect("save");

        let usage = store.get_iteration_logs_disk_usage().expect("usage");
        let expected =
            fs::metadata(&first).expect("stat").len() + fs::metadata(&second).expect("stat").len();
        assert_eq!(usage.total_bytes, expected);
        assert_eq!(usage.files.len(), 2);
        assert_eq!(usage.files[0].iteration_number, 1);
    }
}
