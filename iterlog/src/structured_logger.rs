//! Leveled, component-tagged output for headless runs.
//!
//! This is product output (what a CI log shows), unlike [`crate::logging`],
//! which carries developer diagnostics through `tracing`. Nothing here is
//! persisted and no logging call can fail: sink errors are counted and
//! dropped.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::core::types::IterationStatus;

/// Severity, totally ordered: `Debug < Info < Warn < Error`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Subsystem that emitted an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogComponent {
    Progress,
    Agent,
    Engine,
    Tracker,
    Session,
    System,
}

impl LogComponent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Agent => "agent",
            Self::Engine => "engine",
            Self::Tracker => "tracker",
            Self::Session => "session",
            Self::System => "system",
        }
    }
}

/// Where entries go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogSink {
    /// `debug`/`info` to stdout, `warn`/`error` to stderr.
    Console,
    /// Appended to a file; parent directories are created.
    File { path: PathBuf },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `[ts] [LEVEL] [component] message key=value`
    #[default]
    Human,
    /// One JSON object per line.
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredLoggerConfig {
    pub min_level: LogLevel,
    pub format: LogFormat,
    pub show_timestamp: bool,
    pub sinks: Vec<LogSink>,
}

impl Default for StructuredLoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            format: LogFormat::Human,
            show_timestamp: true,
            sinks: vec![LogSink::Console],
        }
    }
}

enum SinkWriter {
    Console,
    Shared(Mutex<Box<dyn Write + Send>>),
}

pub struct StructuredLogger {
    config: StructuredLoggerConfig,
    writers: Vec<SinkWriter>,
    dropped: AtomicU64,
}

impl std::fmt::Debug for StructuredLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredLogger")
            .field("config", &self.config)
            .field("sinks", &self.writers.len())
            .field("dropped", &self.dropped_writes())
            .finish()
    }
}

/// Build a logger for `config`. A file sink that cannot be opened is
/// dropped with a warning; the remaining sinks still work.
pub fn create_structured_logger(config: StructuredLoggerConfig) -> StructuredLogger {
    let writers = config
        .sinks
        .iter()
        .filter_map(|sink| match sink {
            LogSink::Console => Some(SinkWriter::Console),
            LogSink::File { path } => match open_append(path) {
                Ok(file) => Some(SinkWriter::Shared(Mutex::new(Box::new(file)))),
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "cannot open log sink; disabling it"
                    );
                    None
                }
            },
        })
        .collect();
    StructuredLogger {
        config,
        writers,
        dropped: AtomicU64::new(0),
    }
}

fn open_append(path: &Path) -> io::Result<fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

impl StructuredLogger {
    /// Logger that writes only to `writer`, ignoring `config.sinks`.
    pub fn with_writer(
        config: StructuredLoggerConfig,
        writer: impl Write + Send + 'static,
    ) -> Self {
        Self {
            config,
            writers: vec![SinkWriter::Shared(Mutex::new(Box::new(writer)))],
            dropped: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &StructuredLoggerConfig {
        &self.config
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.config.min_level
    }

    /// Writes that failed and were discarded.
    pub fn dropped_writes(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn debug(&self, component: LogComponent, message: &str, fields: &[(&str, Value)]) {
        self.log(LogLevel::Debug, component, message, fields);
    }

    pub fn info(&self, component: LogComponent, message: &str, fields: &[(&str, Value)]) {
        self.log(LogLevel::Info, component, message, fields);
    }

    pub fn warn(&self, component: LogComponent, message: &str, fields: &[(&str, Value)]) {
        self.log(LogLevel::Warn, component, message, fields);
    }

    pub fn error(&self, component: LogComponent, message: &str, fields: &[(&str, Value)]) {
        self.log(LogLevel::Error, component, message, fields);
    }

    pub fn log(
        &self,
        level: LogLevel,
        component: LogComponent,
        message: &str,
        fields: &[(&str, Value)],
    ) {
        if !self.is_enabled(level) {
            return;
        }
        let line = self.render(level, component, message, fields, Utc::now());
        for writer in &self.writers {
            if write_line(writer, level, &line).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn iteration_started(&self, iteration_number: u32, task_id: Option<&str>) {
        let mut fields = vec![("iteration", Value::from(iteration_number))];
        if let Some(task_id) = task_id {
            fields.push(("task_id", Value::from(task_id)));
        }
        self.info(
            LogComponent::Engine,
            &format!("Iteration {iteration_number} started"),
            &fields,
        );
    }

    pub fn iteration_completed(
        &self,
        iteration_number: u32,
        task_id: Option<&str>,
        status: IterationStatus,
        duration_ms: Option<u64>,
    ) {
        let mut fields = vec![
            ("iteration", Value::from(iteration_number)),
            ("status", Value::from(status.as_str())),
        ];
        if let Some(task_id) = task_id {
            fields.push(("task_id", Value::from(task_id)));
        }
        if let Some(duration_ms) = duration_ms {
            fields.push(("duration_ms", Value::from(duration_ms)));
        }
        let level = match status {
            IterationStatus::Failure => LogLevel::Error,
            IterationStatus::Interrupted => LogLevel::Warn,
            _ => LogLevel::Info,
        };
        self.log(
            level,
            LogComponent::Engine,
            &format!("Iteration {iteration_number} finished: {}", status.as_str()),
            &fields,
        );
    }

    pub fn task_selected(&self, task_id: &str, title: Option<&str>) {
        let message = match title {
            Some(title) => format!("Selected task {task_id}: {title}"),
            None => format!("Selected task {task_id}"),
        };
        self.info(
            LogComponent::Tracker,
            &message,
            &[("task_id", Value::from(task_id))],
        );
    }

    pub fn agent_output(&self, line: &str) {
        self.debug(LogComponent::Agent, line, &[]);
    }

    fn render(
        &self,
        level: LogLevel,
        component: LogComponent,
        message: &str,
        fields: &[(&str, Value)],
        now: DateTime<Utc>,
    ) -> String {
        let timestamp = self
            .config
            .show_timestamp
            .then(|| now.to_rfc3339_opts(SecondsFormat::Millis, true));
        match self.config.format {
            LogFormat::Human => render_human(timestamp, level, component, message, fields),
            LogFormat::Json => render_json(timestamp, level, component, message, fields),
        }
    }
}

fn render_human(
    timestamp: Option<String>,
    level: LogLevel,
    component: LogComponent,
    message: &str,
    fields: &[(&str, Value)],
) -> String {
    let mut line = String::new();
    if let Some(timestamp) = timestamp {
        let _ = write!(line, "[{timestamp}] ");
    }
    let _ = write!(
        line,
        "[{}] [{}] {}",
        level.label(),
        component.as_str(),
        message
    );
    for (key, value) in fields {
        let _ = write!(line, " {key}={}", human_value(value));
    }
    line
}

/// Bare strings stay bare unless they would be ambiguous in `key=value`.
fn human_value(value: &Value) -> String {
    match value {
        Value::String(s) if !s.is_empty() && !s.contains([' ', '\t', '\n', '=', '"']) => s.clone(),
        other => other.to_string(),
    }
}

fn render_json(
    timestamp: Option<String>,
    level: LogLevel,
    component: LogComponent,
    message: &str,
    fields: &[(&str, Value)],
) -> String {
    let mut entry = Map::new();
    if let Some(timestamp) = timestamp {
        entry.insert("timestamp".to_string(), Value::from(timestamp));
    }
    entry.insert("level".to_string(), Value::from(level.as_str()));
    entry.insert("component".to_string(), Value::from(component.as_str()));
    entry.insert("message".to_string(), Value::from(message));
    if !fields.is_empty() {
        let fields: Map<String, Value> = fields
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect();
        entry.insert("fields".to_string(), Value::Object(fields));
    }
    Value::Object(entry).to_string()
}

fn write_line(writer: &SinkWriter, level: LogLevel, line: &str) -> io::Result<()> {
    match writer {
        SinkWriter::Console if level >= LogLevel::Warn => {
            let mut err = io::stderr().lock();
            writeln!(err, "{line}")?;
            err.flush()
        }
        SinkWriter::Console => {
            let mut out = io::stdout().lock();
            writeln!(out, "{line}")?;
            out.flush()
        }
        SinkWriter::Shared(writer) => {
            let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
            writeln!(writer, "{line}")?;
            writer.flush()
        }
    }
}
