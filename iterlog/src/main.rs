//! Inspect and prune iteration logs.
//!
//! Reads `.iterlog/config.toml` under the project root (or `ITERLOG_ROOT`)
//! and operates on the iterations directory it names.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use iterlog::core::types::{IterationLogSummary, LogAnomaly};
use iterlog::io::config::{LogsConfig, load_config};
use iterlog::io::dirs::{CONFIG_FILE, resolve_root};
use iterlog::io::init::{InitOptions, init_project};
use iterlog::{
    IterationLogStore, IterationStatus, LogComponent, LogError, LogFilterOptions, SortOrder,
    create_structured_logger, exit_codes,
};
use serde_json::json;

#[derive(Parser)]
#[command(name = "iterlog", version, about = "Inspect and prune iteration logs")]
struct Cli {
    /// Project root containing `.iterlog/`.
    #[arg(long, global = true, env = "ITERLOG_ROOT")]
    root: Option<PathBuf>,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write `.iterlog/config.toml` with defaults and create the iterations directory.
    Init {
        /// Overwrite an existing config.
        #[arg(long)]
        force: bool,
    },
    #[command(flatten)]
    Logs(LogCommand),
}

/// Commands that operate on an existing iterations directory.
#[derive(Subcommand)]
enum LogCommand {
    /// List log summaries (headers only).
    List {
        #[arg(long)]
        task: Option<String>,
        #[arg(long, value_parser = parse_status)]
        status: Option<IterationStatus>,
        /// Inclusive lower bound on the iteration number.
        #[arg(long)]
        since: Option<u32>,
        /// Exclusive upper bound on the iteration number.
        #[arg(long)]
        before: Option<u32>,
        #[arg(long)]
        limit: Option<usize>,
        /// Newest first.
        #[arg(long)]
        desc: bool,
    },
    /// Print one log, header and body.
    Show { iteration: u32 },
    /// Count valid logs.
    Count,
    /// Report bytes used on disk.
    Usage {
        /// Include a per-file breakdown.
        #[arg(long)]
        files: bool,
    },
    /// Delete logs beyond the retention policy (defaults from config).
    Cleanup {
        #[arg(long)]
        max_count: Option<usize>,
        #[arg(long)]
        max_age_secs: Option<u64>,
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() {
    iterlog::logging::init();
    let code = match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            if err
                .downcast_ref::<LogError>()
                .is_some_and(LogError::is_not_found)
            {
                exit_codes::NOT_FOUND
            } else {
                exit_codes::INVALID
            }
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let root = resolve_root(cli.root.as_deref());
    let command = match cli.command {
        Command::Init { force } => return cmd_init(&root, force, cli.json),
        Command::Logs(command) => command,
    };
    let config = load_config(&root.join(CONFIG_FILE))?;
    let store = IterationLogStore::from_config(&config, &root);

    match command {
        LogCommand::List {
            task,
            status,
            since,
            before,
            limit,
            desc,
        } => {
            let filter = LogFilterOptions {
                task_id: task,
                status,
                since_iteration: since,
                before_iteration: before,
                limit,
                order: if desc {
                    SortOrder::Descending
                } else {
                    SortOrder::Ascending
                },
                ..Default::default()
            };
            let listing = store.list_iteration_logs(&filter)?;
            if cli.json {
                print_json(&listing)?;
            } else {
                for summary in &listing.summaries {
                    println!("{}", format_summary(summary));
                }
                report_anomalies(&listing.anomalies);
            }
        }
        LogCommand::Show { iteration } => {
            let log = store.get_iteration_log_by_number(iteration)?;
            if cli.json {
                print_json(&json!({ "metadata": log.metadata, "body": log.body }))?;
            } else {
                let header = serde_json::to_string_pretty(&log.metadata)
                    .context("serialize log header")?;
                println!("{header}\n");
                print!("{}", log.body);
            }
        }
        LogCommand::Count => {
            let count = store.get_iteration_log_count()?;
            if cli.json {
                print_json(&json!({ "count": count }))?;
            } else {
                println!("{count}");
            }
        }
        LogCommand::Usage { files } => {
            let usage = store.get_iteration_logs_disk_usage()?;
            if cli.json {
                print_json(&usage)?;
            } else {
                if files {
                    for file in &usage.files {
                        println!("{:>12}  {}", file.bytes, file.file_name);
                    }
                }
                println!("{} bytes in {} files", usage.total_bytes, usage.files.len());
            }
        }
        LogCommand::Cleanup {
            max_count,
            max_age_secs,
            dry_run,
        } => return cmd_cleanup(&store, &config, max_count, max_age_secs, dry_run, cli.json),
    }
    Ok(exit_codes::OK)
}

fn cmd_init(root: &Path, force: bool, json: bool) -> Result<i32> {
    let report = init_project(root, &InitOptions { force })?;
    if json {
        print_json(&report)?;
    } else if report.wrote_config {
        println!("wrote {}", report.config_path.display());
        println!("iterations in {}", report.iterations_dir.display());
    } else {
        println!(
            "kept existing {} (use --force to overwrite)",
            report.config_path.display()
        );
        println!("iterations in {}", report.iterations_dir.display());
    }
    Ok(exit_codes::OK)
}

fn cmd_cleanup(
    store: &IterationLogStore,
    config: &LogsConfig,
    max_count: Option<usize>,
    max_age_secs: Option<u64>,
    dry_run: bool,
    json: bool,
) -> Result<i32> {
    let mut options = config.retention.cleanup_options(dry_run);
    if max_count.is_some() || max_age_secs.is_some() {
        options.max_count = max_count;
        options.max_age = max_age_secs.map(Duration::from_secs);
    }
    let result = store.cleanup_iteration_logs(&options)?;

    if json {
        print_json(&result)?;
    } else {
        let logger = create_structured_logger(config.logger.clone());
        let verb = if result.dry_run { "Would delete" } else { "Deleted" };
        logger.info(
            LogComponent::System,
            &format!("{verb} {} iteration logs", result.deleted_count),
            &[
                ("iterations", json!(result.deleted_iteration_numbers)),
                ("freed_bytes", json!(result.freed_bytes)),
            ],
        );
        for (iteration, reason) in &result.failed_deletions {
            logger.error(
                LogComponent::System,
                "Failed to delete iteration log",
                &[("iteration", json!(iteration)), ("reason", json!(reason))],
            );
        }
    }

    if result.failed_deletions.is_empty() {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::PARTIAL)
    }
}

fn parse_status(value: &str) -> Result<IterationStatus, String> {
    IterationStatus::parse(value).ok_or_else(|| {
        format!("unknown status {value:?} (in_progress, success, failure, interrupted, skipped)")
    })
}

fn format_summary(summary: &IterationLogSummary) -> String {
    let meta = &summary.metadata;
    format!(
        "{:>6}  {}  {:<11}  {:<20}  {}B",
        meta.iteration_number,
        meta.created_at.format("%Y-%m-%d %H:%M:%S"),
        meta.status.as_str(),
        meta.task_id.as_deref().unwrap_or("-"),
        meta.size_bytes
    )
}

fn report_anomalies(anomalies: &[LogAnomaly]) {
    for anomaly in anomalies {
        eprintln!("skipped {}: {:?}", anomaly.file_name, anomaly.kind);
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use iterlog::test_support::summary;

    #[test]
    fn parse_list_with_filters() {
        let cli = Cli::parse_from([
            "iterlog", "list", "--task", "T-1", "--status", "failure", "--limit", "5", "--desc",
        ]);
        match cli.command {
            Command::Logs(LogCommand::List {
                task,
                status,
                limit,
                desc,
                ..
            }) => {
                assert_eq!(task.as_deref(), Some("T-1"));
                assert_eq!(status, Some(IterationStatus::Failure));
                assert_eq!(limit, Some(5));
                assert!(desc);
            }
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn parse_init() {
        let cli = Cli::parse_from(["iterlog", "init"]);
        assert!(matches!(cli.command, Command::Init { force: false }));
        let cli = Cli::parse_from(["iterlog", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn init_then_count_on_fresh_root() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().to_string_lossy().into_owned();
        let code = run(Cli::parse_from(["iterlog", "--root", &root, "init"])).expect("init");
        assert_eq!(code, exit_codes::OK);
        assert!(temp.path().join(CONFIG_FILE).is_file());
        let code = run(Cli::parse_from(["iterlog", "--root", &root, "count"])).expect("count");
        assert_eq!(code, exit_codes::OK);
    }

    #[test]
    fn parse_rejects_unknown_status() {
        assert!(Cli::try_parse_from(["iterlog", "list", "--status", "done"]).is_err());
    }

    #[test]
    fn parse_cleanup_dry_run() {
        let cli = Cli::parse_from(["iterlog", "cleanup", "--max-count", "0", "--dry-run"]);
        assert!(matches!(
            cli.command,
            Command::Logs(LogCommand::Cleanup {
                max_count: Some(0),
                max_age_secs: None,
                dry_run: true,
            })
        ));
    }

    #[test]
    fn summary_line_shows_placeholder_for_missing_task() {
        let line = format_summary(&summary(12, None, IterationStatus::Skipped));
        assert!(line.starts_with("    12  "));
        assert!(line.contains("skipped"));
        assert!(line.contains("  -  "));
    }
}
