//! Scaffolding for `.iterlog/` in a project root.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::io::config::{LogsConfig, load_config, write_config};
use crate::io::dirs::{CONFIG_FILE, ensure_dir, resolve_root};

/// Options for [`init_project`].
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Replace an existing config with the defaults.
    pub force: bool,
}

/// What [`init_project`] left on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitReport {
    pub config_path: PathBuf,
    pub iterations_dir: PathBuf,
    /// False when an existing config was kept.
    pub wrote_config: bool,
}

/// Write the default config (unless one exists and `force` is off) and create
/// the iterations directory that config names.
pub fn init_project(root: &Path, options: &InitOptions) -> Result<InitReport> {
    let root = resolve_root(Some(root));
    let config_path = root.join(CONFIG_FILE);

    let wrote_config = options.force || !config_path.exists();
    let config = if wrote_config {
        let config = LogsConfig::default();
        write_config(&config_path, &config)?;
        config
    } else {
        load_config(&config_path)?
    };

    let iterations_dir = root.join(&config.iterations_dir);
    ensure_dir(&iterations_dir)
        .with_context(|| format!("create {}", iterations_dir.display()))?;
    debug!(
        root = %root.display(),
        wrote_config,
        "initialized iterlog project"
    );
    Ok(InitReport {
        config_path,
        iterations_dir,
        wrote_config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn init_writes_default_config_and_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let report = init_project(temp.path(), &InitOptions::default()).expect("init");

        assert!(report.wrote_config);
        assert!(report.iterations_dir.is_dir());
        assert!(report.iterations_dir.ends_with(".iterlog/iterations"));
        assert_eq!(
            load_config(&report.config_path).expect("load"),
            LogsConfig::default()
        );
    }

    #[test]
    fn init_keeps_existing_config_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config_path = temp.path().join(CONFIG_FILE);
        fs::create_dir_all(config_path.parent().expect("parent")).expect("mkdir");
        fs::write(&config_path, "iterations_dir = \"logs/iters\"\n").expect("write");

        let report = init_project(temp.path(), &InitOptions::default()).expect("init");
        assert!(!report.wrote_config);
        assert_eq!(report.iterations_dir, temp.path().join("logs/iters"));
        assert!(report.iterations_dir.is_dir());
        assert_eq!(
            fs::read_to_string(&config_path).expect("read"),
            "iterations_dir = \"logs/iters\"\n"
        );

        let forced = init_project(temp.path(), &InitOptions { force: true }).expect("force");
        assert!(forced.wrote_config);
        assert_eq!(
            load_config(&config_path).expect("load"),
            LogsConfig::default()
        );
    }

    #[test]
    fn init_rejects_invalid_existing_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config_path = temp.path().join(CONFIG_FILE);
        fs::create_dir_all(config_path.parent().expect("parent")).expect("mkdir");
        fs::write(&config_path, "iterations_dir = \"../outside\"\n").expect("write");

        let err = init_project(temp.path(), &InitOptions::default()).expect_err("invalid");
        assert!(format!("{err:#}").contains("iterations_dir"));
    }
}
