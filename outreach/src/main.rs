//! Cold-outreach cadence CLI.
//!
//! Imports leads, runs the initial and follow-up send passes, records open and
//! reply signals, and reports campaign totals. All state lives in the SQLite
//! database named by `outreach.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use outreach::core::types::{NewLead, Vertical};
use outreach::dispatch::{DispatchConfig, Dispatcher, Pass, PassSummary};
use outreach::exit_codes;
use outreach::io::composer::{ComposerSettings, MessageComposer};
use outreach::io::config::{DEFAULT_CONFIG_PATH, OutreachConfig, load_config, write_config};
use outreach::io::import::import_csv;
use outreach::io::mailer::{Mailer, OutgoingMessage, SmtpMailer};
use outreach::io::store::{LeadStore, SqliteLeadStore};
use outreach::logging;
use outreach::report::CampaignReport;

#[derive(Parser)]
#[command(
    name = "outreach",
    version,
    about = "Cold-outreach cadence engine: initial sends, follow-ups, tracking"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config and create the database schema.
    Init {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
    /// Bulk-import leads from a CSV file (email, domain_name, first_name, vertical).
    ImportCsv { path: PathBuf },
    /// Insert three demo leads, one per vertical.
    SeedExample,
    /// Send first-touch messages to new leads.
    SendInitial {
        /// Print planned actions without sending.
        #[arg(long)]
        dry_run: bool,
    },
    /// Resend to silent leads and follow up with openers.
    RunFollowups {
        /// Print planned actions without sending.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print campaign totals and export per-lead detail as CSV.
    Report {
        /// Directory for the exported CSV.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Record an open for a tracking id.
    MarkOpened { tracking_id: String },
    /// Record a reply from an email address; stops all further sends.
    MarkReplied { email: String },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config_path = cli.config.as_path();
    match cli.command {
        Command::Init { force } => cmd_init(config_path, force),
        Command::ImportCsv { path } => cmd_import(config_path, &path),
        Command::SeedExample => cmd_seed(config_path),
        Command::SendInitial { dry_run } => cmd_pass(config_path, Pass::Initial, dry_run),
        Command::RunFollowups { dry_run } => cmd_pass(config_path, Pass::Followup, dry_run),
        Command::Report { out_dir } => cmd_report(config_path, &out_dir),
        Command::MarkOpened { tracking_id } => cmd_mark_opened(config_path, &tracking_id),
        Command::MarkReplied { email } => cmd_mark_replied(config_path, &email),
    }
}

/// Config plus the store it points at.
struct Workspace {
    config: OutreachConfig,
    store: SqliteLeadStore,
}

impl Workspace {
    fn open(config_path: &Path) -> Result<Self> {
        let config = load_config(config_path)?;
        let db_path = config.store.resolve_db_path(config_path);
        let store = SqliteLeadStore::open(&db_path)
            .with_context(|| format!("open lead store {}", db_path.display()))?;
        Ok(Self { config, store })
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if force || !config_path.exists() {
        write_config(config_path, &OutreachConfig::default())?;
        println!("wrote {}", config_path.display());
    } else {
        println!("{} already exists (use --force to overwrite)", config_path.display());
    }
    let workspace = Workspace::open(config_path)?;
    println!(
        "database ready (schema v{})",
        workspace.store.schema_version().context("read schema version")?
    );
    Ok(exit_codes::OK)
}

fn cmd_import(config_path: &Path, csv_path: &Path) -> Result<i32> {
    let mut workspace = Workspace::open(config_path)?;
    let report = import_csv(&mut workspace.store, csv_path)?;
    for diagnostic in &report.skipped {
        println!("row {}: skipped ({})", diagnostic.row, diagnostic.reason);
    }
    println!(
        "imported {} of {} rows",
        report.imported.len(),
        report.total_rows()
    );
    Ok(exit_codes::OK)
}

fn seed_leads() -> Vec<NewLead> {
    let lead = |email: &str, domain: &str, first_name: Option<&str>, vertical| NewLead {
        email: email.to_string(),
        domain_name: domain.to_string(),
        first_name: first_name.map(str::to_string),
        vertical,
    };
    vec![
        lead(
            "buyer1@example.com",
            "BedOrder.com",
            Some("Rahul"),
            Vertical::Sleep,
        ),
        lead(
            "buyer2@example.com",
            "SmartBedAI.com",
            Some("Anita"),
            Vertical::Ai,
        ),
        lead(
            "buyer3@example.com",
            "CityFurnitureStore.com",
            None,
            Vertical::Local,
        ),
    ]
}

fn cmd_seed(config_path: &Path) -> Result<i32> {
    let mut workspace = Workspace::open(config_path)?;
    for lead in seed_leads() {
        let created = workspace
            .store
            .create(&lead)
            .with_context(|| format!("insert {}", lead.email))?;
        println!(
            "seeded {} ({}, tid={})",
            created.email, created.vertical, created.tracking_id
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_pass(config_path: &Path, pass: Pass, dry_run: bool) -> Result<i32> {
    let workspace = Workspace::open(config_path)?;
    let composer = MessageComposer::new(ComposerSettings::from_config(&workspace.config))?;
    let dispatch_config = DispatchConfig::from_config(&workspace.config);

    if dry_run {
        let planner = Dispatcher::new(workspace.store, NoMailer, composer, dispatch_config);
        let planned = planner.plan(pass)?;
        if planned.is_empty() {
            println!("{pass}: no candidate leads");
        }
        for item in planned {
            println!(
                "{pass}: lead {} <{}> -> {}",
                item.lead.id, item.lead.email, item.decision.action
            );
        }
        return Ok(exit_codes::OK);
    }

    let mailer = SmtpMailer::from_config(&workspace.config.smtp)?;
    let mut dispatcher = Dispatcher::new(workspace.store, mailer, composer, dispatch_config);
    let summary = dispatcher.run_pass(pass)?;
    print_summary(&summary);
    Ok(pass_exit_code(&summary))
}

/// `PARTIAL` when any lead failed to send or persist, `OK` otherwise.
fn pass_exit_code(summary: &PassSummary) -> i32 {
    if summary.failed() > 0 {
        warn!(failed = summary.failed(), "pass finished with failures");
        return exit_codes::PARTIAL;
    }
    exit_codes::OK
}

/// Mailer for dry runs; planning never sends.
struct NoMailer;

impl Mailer for NoMailer {
    fn send(&self, message: &OutgoingMessage) -> Result<()> {
        bail!("dry run: refusing to send to {}", message.to)
    }
}

fn print_summary(summary: &PassSummary) {
    println!(
        "{}: sent={} idle={} failed={}",
        summary.pass,
        summary.sent(),
        summary.idle(),
        summary.failed()
    );
}

fn cmd_report(config_path: &Path, out_dir: &Path) -> Result<i32> {
    let workspace = Workspace::open(config_path)?;
    let report = CampaignReport::collect(&workspace.store, Utc::now())?;
    print!("{}", report.render());
    if let Some(path) = report.export(out_dir)? {
        println!("\nexported {}", path.display());
    }
    Ok(exit_codes::OK)
}

fn cmd_mark_opened(config_path: &Path, tracking_id: &str) -> Result<i32> {
    let mut workspace = Workspace::open(config_path)?;
    let matched = workspace
        .store
        .set_opened(tracking_id)
        .context("record open")?;
    info!(tracking_id, matched, "open recorded");
    println!("marked {matched} lead(s) opened");
    Ok(exit_codes::OK)
}

fn cmd_mark_replied(config_path: &Path, email: &str) -> Result<i32> {
    let mut workspace = Workspace::open(config_path)?;
    let matched = workspace
        .store
        .set_replied(email)
        .context("record reply")?;
    info!(email, matched, "reply recorded");
    println!("marked {matched} lead(s) replied");
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach::core::types::{Action, NoOpReason};
    use outreach::dispatch::{LeadOutcome, LeadReport};

    fn summary(outcomes: Vec<LeadOutcome>) -> PassSummary {
        PassSummary {
            pass: Pass::Followup,
            leads: outcomes
                .into_iter()
                .enumerate()
                .map(|(idx, outcome)| LeadReport {
                    lead_id: idx as i64 + 1,
                    email: format!("lead{idx}@example.com"),
                    outcome,
                })
                .collect(),
        }
    }

    #[test]
    fn parse_init_force_with_global_config() {
        let cli = Cli::parse_from(["outreach", "init", "--force", "--config", "x/o.toml"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
        assert_eq!(cli.config, PathBuf::from("x/o.toml"));
    }

    #[test]
    fn config_defaults_to_outreach_toml() {
        let cli = Cli::parse_from(["outreach", "report"]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(matches!(cli.command, Command::Report { out_dir } if out_dir.as_path() == Path::new(".")));
    }

    #[test]
    fn parse_send_passes_with_dry_run() {
        let cli = Cli::parse_from(["outreach", "send-initial", "--dry-run"]);
        assert!(matches!(cli.command, Command::SendInitial { dry_run: true }));
        let cli = Cli::parse_from(["outreach", "run-followups"]);
        assert!(matches!(cli.command, Command::RunFollowups { dry_run: false }));
    }

    #[test]
    fn parse_signal_commands() {
        let cli = Cli::parse_from(["outreach", "mark-replied", "a@example.com"]);
        assert!(matches!(cli.command, Command::MarkReplied { email } if email == "a@example.com"));
        let cli = Cli::parse_from(["outreach", "mark-opened", "abc123"]);
        assert!(matches!(cli.command, Command::MarkOpened { tracking_id } if tracking_id == "abc123"));
    }

    #[test]
    fn seed_covers_every_vertical() {
        let verticals: Vec<Vertical> = seed_leads().iter().map(|lead| lead.vertical).collect();
        assert_eq!(verticals, Vertical::ALL.to_vec());
    }

    #[test]
    fn pass_with_failed_lead_exits_partial() {
        let send_failed = summary(vec![
            LeadOutcome::Sent(Action::ResendInitial),
            LeadOutcome::SendFailed {
                action: Action::SendFollowup { ordinal: 1 },
                reason: "connection refused".to_string(),
            },
        ]);
        assert_eq!(pass_exit_code(&send_failed), exit_codes::PARTIAL);

        let persist_failed = summary(vec![LeadOutcome::PersistFailed {
            action: Action::SendInitial { slot: 0 },
            reason: "database is locked".to_string(),
        }]);
        assert_eq!(pass_exit_code(&persist_failed), exit_codes::PARTIAL);
    }

    #[test]
    fn pass_with_only_sent_or_idle_leads_exits_ok() {
        let clean = summary(vec![
            LeadOutcome::Sent(Action::SendInitial { slot: 1 }),
            LeadOutcome::Idle(Action::NoOp(NoOpReason::NotDue)),
            LeadOutcome::Idle(Action::Terminal),
        ]);
        assert_eq!(pass_exit_code(&clean), exit_codes::OK);
        assert_eq!(pass_exit_code(&summary(Vec::new())), exit_codes::OK);
    }
}
