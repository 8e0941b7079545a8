//! oxide-cms CLI
//!
//! Applies, inspects and renders the CMS schema upgrade plan.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_cms::migrations;
use oxide_cms::DatabaseConfig;
use oxide_migrate::prelude::*;

/// Schema upgrades for oxide-cms.
#[derive(Parser)]
#[command(name = "oxide-cms")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:cms.sqlite3")]
    database: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migration steps.
    Migrate {
        /// Show SQL without executing (dry run).
        ///
        /// Every pending step is rendered against the current schema, so a
        /// code step that inspects the schema does not see changes made by
        /// earlier pending steps.
        #[arg(long)]
        dry_run: bool,

        /// Print the run report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show which steps have been applied.
    ShowMigrations {
        /// Print the status as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show SQL for migration steps without executing.
    SqlMigrate {
        /// Dialect to render for.
        #[arg(short, long, default_value_t = DialectKind::Sqlite)]
        dialect: DialectKind,

        /// Step id (`8.1.0/add_content_type_description`) or name; all steps
        /// if not specified.
        #[arg(short, long)]
        step: Option<String>,
    },

    /// Initialize the migrations system (create ledger table).
    Init,
}

#[derive(Serialize)]
struct StepStatus<'a> {
    step: String,
    version: String,
    applied: bool,
    applied_at: Option<&'a DateTime<Utc>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let db = DatabaseConfig::new(&cli.database)
        .run_migrations(false)
        .connect()
        .await?;
    let runner = db.runner();
    let plan = migrations::plan()?;

    match cli.command {
        Commands::Init => {
            info!("Initializing migrations system...");
            runner.init().await?;
            info!("Ledger table created successfully.");
        }

        Commands::Migrate { dry_run, json } => {
            if dry_run {
                runner.init().await?;
                info!("Dry run mode - SQL will be printed but not executed.");
                let pending = runner.pending(&plan).await?;
                if pending.is_empty() {
                    info!("No migrations to apply.");
                }
                for step in pending {
                    println!("-- {}", step.id());
                    println!("{}", join_statements(&runner.sql_for(step).await?));
                }
            } else {
                let report = runner.run(&plan).await?;
                if json {
                    println!("{}", report.to_json()?);
                } else if report.applied().is_empty() {
                    info!("No migrations to apply.");
                } else {
                    for step in report.applied() {
                        println!("  Applied {}", step);
                    }
                }
            }
        }

        Commands::ShowMigrations { json } => {
            runner.init().await?;
            let entries = runner.ledger().entries(Some(plan.product())).await?;

            let status: Vec<StepStatus<'_>> = plan
                .steps()
                .iter()
                .map(|step| {
                    let id = step.id();
                    let entry = entries.iter().find(|e| e.step == id);
                    StepStatus {
                        step: id,
                        version: step.version.to_string(),
                        applied: entry.is_some(),
                        applied_at: entry.map(|e| &e.applied_at),
                    }
                })
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("\n{}:", plan.product());
                println!("{:-<60}", "");
                for row in &status {
                    match row.applied_at {
                        Some(at) => println!(
                            " [X] {} ({})",
                            row.step,
                            at.format("%Y-%m-%d %H:%M:%S")
                        ),
                        None => println!(" [ ] {}", row.step),
                    }
                }
                println!();
            }
        }

        Commands::SqlMigrate { dialect, step } => {
            let steps: Vec<&MigrationStep> = match &step {
                Some(key) => vec![plan
                    .get(key)
                    .ok_or_else(|| anyhow::anyhow!("No migration step named '{}'", key))?],
                None => plan.steps().iter().collect(),
            };

            let dialect = dialect.dialect();
            for step in steps {
                println!("-- {}", step.id());
                let statements = runner.sql_for_dialect(step, dialect.as_ref()).await?;
                println!("{}", join_statements(&statements));
            }
        }
    }

    db.close().await;
    Ok(())
}
