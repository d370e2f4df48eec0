mod config;
mod display;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Context;
use blockguard_core::{BlockRegistry, DocumentId};
use blockguard_recovery::{BulkRecovery, RenderRepairRuntime, ValidationGate};
use blockguard_scan::{RuleSource, ScanOptions, ScanReport, Scanner};
use blockguard_store::{ContentStore, DirectorySnapshot, JsonFileStore, ValidationStore};
use blockguard_sync::RestContentStore;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::Config;

const LAST_SCAN_FILE: &str = "last-scan.json";

#[derive(Parser)]
#[command(name = "blockguard", version, about = "Find and repair blocks stuck in recovery mode")]
struct Cli {
    /// JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for validation records, scan reports and snapshots.
    #[arg(long, global = true, env = "BLOCKGUARD_STATE_DIR", default_value = ".blockguard")]
    state_dir: PathBuf,

    /// Corpus export to scan instead of a live site.
    #[arg(long, global = true, env = "BLOCKGUARD_CORPUS", conflicts_with = "site")]
    corpus: Option<PathBuf>,

    /// Site root URL of a live CMS.
    #[arg(long, global = true, env = "BLOCKGUARD_SITE")]
    site: Option<String>,

    #[arg(long, global = true, env = "BLOCKGUARD_USER", requires = "password")]
    user: Option<String>,

    #[arg(long, global = true, env = "BLOCKGUARD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the corpus for block issues.
    Scan {
        /// Content type to scan (repeatable); defaults to every public type.
        #[arg(long = "type")]
        types: Vec<String>,
        /// Stop after this many documents; -1 scans everything.
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        limit: i64,
    },
    /// Check a single document.
    Check {
        id: DocumentId,
        /// Check this markup instead of the stored content.
        #[arg(long)]
        markup_file: Option<PathBuf>,
    },
    /// Confirm that a block was repaired correctly in a document.
    Confirm { id: DocumentId, block: String },
    /// Show validation gate status.
    Status { block: Option<String> },
    /// Delete every validation record.
    Reset,
    /// Drop validation records for deleted documents.
    Prune,
    /// Repair every unresolved recovery-mode occurrence of a block.
    Recover {
        block: String,
        #[arg(long)]
        concurrency: Option<usize>,
        /// Per-document timeout in seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Classify block names against the registry.
    Classify { names: Vec<String> },
}

struct App {
    config: Config,
    state_dir: PathBuf,
    store: Arc<dyn ContentStore>,
    registry: Arc<BlockRegistry>,
}

impl App {
    fn gate(&self) -> anyhow::Result<ValidationGate> {
        let path = self.state_dir.join("validations.json");
        let records = ValidationStore::open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        Ok(ValidationGate::new(Arc::new(records), self.store.clone()))
    }

    fn scanner(&self) -> Scanner {
        let rules = self
            .config
            .rules_path
            .clone()
            .unwrap_or_else(|| self.state_dir.join("rules.json"));
        Scanner::new(self.store.clone(), self.registry.clone())
            .with_settings(self.config.scan_settings())
            .with_rules(RuleSource::File(rules))
            .with_snapshots(Arc::new(DirectorySnapshot::new(self.state_dir.join("backups"))))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
    tracing::debug!("blockguard v{}", env!("CARGO_PKG_VERSION"));

    let app = build_app(&cli).await?;
    match &cli.command {
        Command::Scan { types, limit } => {
            let options = ScanOptions::default()
                .with_content_types(types.iter().cloned())
                .with_limit(*limit);
            let report = app.scanner().scan(&options).await.context("scan failed")?;
            save_report(&app.state_dir, &report)?;
            emit(cli.json, &report, display::print_report)?;
        }
        Command::Check { id, markup_file } => {
            let markup = match markup_file {
                Some(path) => Some(
                    std::fs::read_to_string(path)
                        .with_context(|| format!("reading {}", path.display()))?,
                ),
                None => None,
            };
            let check = app.scanner().check_document(*id, markup.as_deref()).await?;
            emit(cli.json, &check, display::print_check)?;
        }
        Command::Confirm { id, block } => {
            let status = app.gate()?.confirm(*id, block).await?;
            emit(cli.json, &status, display::print_gate)?;
        }
        Command::Status { block } => {
            let gate = app.gate()?;
            let statuses = match block {
                Some(block) => vec![gate.status(block).await?],
                None => gate.statuses().await?,
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else if statuses.is_empty() {
                println!("No validation records.");
            } else {
                statuses.iter().for_each(display::print_gate);
            }
        }
        Command::Reset => {
            let removed = app.gate()?.reset_all()?;
            println!("Removed {removed} validation records.");
        }
        Command::Prune => {
            let pruned = app.gate()?.cleanup_deleted_posts().await?;
            println!("Pruned {pruned} validation records for deleted documents.");
        }
        Command::Recover {
            block,
            concurrency,
            timeout,
        } => {
            let report = load_report(&app.state_dir)?;
            let mut settings = app.config.recovery_settings();
            if let Some(width) = concurrency {
                settings.concurrency = (*width).max(1);
            }
            if let Some(secs) = timeout {
                settings.document_timeout = std::time::Duration::from_secs(*secs);
            }
            let runtime = Arc::new(RenderRepairRuntime::new(
                app.store.clone(),
                app.registry.clone(),
            ));
            let recovery = BulkRecovery::new(
                Arc::new(app.gate()?),
                runtime,
                app.store.clone(),
                app.registry.clone(),
            )
            .with_settings(settings);

            let cancel = recovery.cancel_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("\n  Cancelling after in-flight documents...");
                    cancel.store(true, Ordering::SeqCst);
                }
            });

            let (tx, mut rx) = mpsc::unbounded_channel::<blockguard_recovery::RecoveryProgress>();
            let printer = tokio::spawn(async move {
                while let Some(update) = rx.recv().await {
                    eprint!(
                        "\r  Recovered {}/{} {:<50}",
                        update.completed, update.total, update.current_document_title
                    );
                }
                eprintln!();
            });

            let tally = recovery.recover_all(&report, block, Some(tx)).await?;
            printer.await.context("progress printer")?;
            emit(cli.json, &tally, display::print_tally)?;
        }
        Command::Classify { names } => {
            for name in names {
                println!("  {:<34} {}", name, app.registry.classify(name));
            }
        }
    }
    Ok(())
}

async fn build_app(cli: &Cli) -> anyhow::Result<App> {
    let config = Config::load(cli.config.as_deref())?;

    let mut registry = match &config.registry_path {
        Some(path) => BlockRegistry::load(path)
            .with_context(|| format!("loading block registry {}", path.display()))?,
        None => BlockRegistry::new(),
    };

    let store: Arc<dyn ContentStore> = match (&cli.corpus, &cli.site) {
        (Some(corpus), _) => Arc::new(
            JsonFileStore::open(corpus)
                .with_context(|| format!("opening corpus {}", corpus.display()))?,
        ),
        (None, Some(site)) => {
            let credentials = cli.user.clone().zip(cli.password.clone());
            let remote = RestContentStore::new(site.clone(), credentials);
            let entries = remote
                .fetch_block_types()
                .await
                .context("fetching block types")?;
            registry.merge_missing(BlockRegistry::from_entries(entries));
            Arc::new(remote)
        }
        (None, None) => anyhow::bail!("no content store: pass --corpus or --site"),
    };
    tracing::debug!(blocks = registry.len(), "block registry ready");

    Ok(App {
        config,
        state_dir: cli.state_dir.clone(),
        store,
        registry: Arc::new(registry),
    })
}

fn save_report(state_dir: &Path, report: &ScanReport) -> anyhow::Result<()> {
    let path = state_dir.join(LAST_SCAN_FILE);
    blockguard_store::write_json(&path, report)
        .with_context(|| format!("writing {}", path.display()))
}

fn load_report(state_dir: &Path) -> anyhow::Result<ScanReport> {
    let path = state_dir.join(LAST_SCAN_FILE);
    let body = std::fs::read_to_string(&path).with_context(|| {
        format!("reading {} (run `blockguard scan` first)", path.display())
    })?;
    serde_json::from_str(&body).with_context(|| format!("parsing {}", path.display()))
}

fn emit<T: Serialize>(json: bool, value: &T, print: fn(&T)) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print(value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_limit_parses() {
        let cli = Cli::try_parse_from(["blockguard", "--corpus", "c.json", "scan", "--limit", "-1"])
            .unwrap();
        assert!(matches!(cli.command, Command::Scan { limit: -1, .. }));
    }

    #[test]
    fn report_round_trips_through_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_report(dir.path()).is_err());

        let report: ScanReport = serde_json::from_value(serde_json::json!({
            "total_posts": 1,
            "posts_with_issues": 0,
            "total_issues": 0,
            "issues_by_type": {},
            "blocks_by_type": {},
            "posts": [],
            "summary": "Scanned 1 documents, no block issues found",
            "scanned_at": "2026-02-21T10:00:00Z",
            "content_types": ["post"]
        }))
        .unwrap();
        save_report(dir.path(), &report).unwrap();
        assert_eq!(load_report(dir.path()).unwrap(), report);
    }

    #[test]
    fn saving_replaces_the_previous_report_whole() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join("state");
        let mut report: ScanReport = serde_json::from_value(serde_json::json!({
            "total_posts": 0,
            "posts_with_issues": 0,
            "total_issues": 0,
            "issues_by_type": {},
            "blocks_by_type": {},
            "posts": [],
            "summary": "Scanned 0 documents, no block issues found",
            "scanned_at": "2026-02-21T10:00:00Z",
            "content_types": ["post", "page"]
        }))
        .unwrap();
        save_report(&state_dir, &report).unwrap();

        report.content_types = vec!["post".to_string()];
        save_report(&state_dir, &report).unwrap();

        assert_eq!(load_report(&state_dir).unwrap(), report);
        let entries: Vec<_> = std::fs::read_dir(&state_dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
