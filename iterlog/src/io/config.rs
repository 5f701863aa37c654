//! Configuration stored under `.iterlog/config.toml`.

use std::fs;
use std::path::{Component, Path};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::LogCleanupOptions;
use crate::io::dirs::{ITERATIONS_DIR, write_atomic};
use crate::structured_logger::{LogSink, StructuredLoggerConfig};

/// Iteration log configuration (TOML).
///
/// Edited by humans; missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogsConfig {
    /// Iterations directory, relative to the project root.
    pub iterations_dir: String,

    pub retention: RetentionConfig,

    pub logger: StructuredLoggerConfig,
}

/// Retention defaults applied by `iterlog cleanup` when no flags are given.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetentionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age_secs: Option<u64>,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            iterations_dir: ITERATIONS_DIR.to_string(),
            retention: RetentionConfig::default(),
            logger: StructuredLoggerConfig::default(),
        }
    }
}

impl RetentionConfig {
    pub fn cleanup_options(&self, dry_run: bool) -> LogCleanupOptions {
        LogCleanupOptions {
            max_count: self.max_count,
            max_age: self.max_age_secs.map(Duration::from_secs),
            dry_run,
        }
    }
}

impl LogsConfig {
    pub fn validate(&self) -> Result<()> {
        let dir = Path::new(&self.iterations_dir);
        if self.iterations_dir.trim().is_empty() {
            return Err(anyhow!("iterations_dir must be non-empty"));
        }
        if !dir
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
        {
            return Err(anyhow!(
                "iterations_dir must be a relative path without `..`: {}",
                self.iterations_dir
            ));
        }
        for sink in &self.logger.sinks {
            if let LogSink::File { path } = sink
                && path.as_os_str().is_empty()
            {
                return Err(anyhow!("logger file sink path must be non-empty"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LogsConfig::default()`.
pub fn load_config(path: &Path) -> Result<LogsConfig> {
    if !path.exists() {
        let cfg = LogsConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LogsConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Validate and persist `cfg`, creating `.iterlog/` if needed.
pub fn write_config(path: &Path, cfg: &LogsConfig) -> Result<()> {
    cfg.validate()?;
    let mut contents = toml::to_string_pretty(cfg).context("serialize config toml")?;
    contents.push('\n');
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    write_atomic(path, &contents).with_context(|| format!("write config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured_logger::{LogFormat, LogLevel};

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, LogsConfig::default());
        assert_eq!(cfg.iterations_dir, ".iterlog/iterations");
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".iterlog").join("config.toml");
        let cfg = LogsConfig {
            retention: RetentionConfig {
                max_count: Some(50),
                max_age_secs: Some(7 * 24 * 60 * 60),
            },
            logger: StructuredLoggerConfig {
                min_level: LogLevel::Debug,
                sinks: vec![
                    LogSink::Console,
                    LogSink::File {
                        path: "logs/run.log".into(),
                    },
                ],
                format: LogFormat::Json,
                show_timestamp: false,
            },
            ..Default::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "[retention]\nmax_count = 5\n\n[logger]\nmin_level = \"warn\"\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.retention.max_count, Some(5));
        assert_eq!(cfg.retention.max_age_secs, None);
        assert_eq!(cfg.logger.min_level, LogLevel::Warn);
        assert_eq!(cfg.logger.sinks, vec![LogSink::Console]);
        assert_eq!(cfg.iterations_dir, ITERATIONS_DIR);
    }

    #[test]
    fn rejects_escaping_iterations_dir() {
        let cfg = LogsConfig {
            iterations_dir: "../elsewhere".to_string(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = LogsConfig {
            iterations_dir: "/abs/path".to_string(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn retention_maps_to_cleanup_options() {
        let retention = RetentionConfig {
            max_count: Some(3),
            max_age_secs: Some(60),
        };
        let options = retention.cleanup_options(true);
        assert_eq!(options.max_count, Some(3));
        assert_eq!(options.max_age, Some(Duration::from_secs(60)));
        assert!(options.dry_run);
    }
}
