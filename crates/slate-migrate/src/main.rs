//! slate-migrate CLI
//!
//! Command-line tool for diffing schema snapshots and applying migrations.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use slate_core::{analyze_migration, diff, SchemaSnapshot};
use slate_migrate::{ApplyOptions, Migrator, SyncOptions};
use slate_runtime::{Database, DatabaseConfig};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Schema diffing and atomic migrations for SQLite.
#[derive(Parser)]
#[command(name = "slate-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:slate.db")]
    database: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SQL that migrates one schema snapshot to another.
    Diff {
        /// Snapshot to migrate to.
        #[arg(short, long)]
        current: PathBuf,

        /// Snapshot to migrate from (empty database if not specified).
        #[arg(short, long)]
        previous: Option<PathBuf>,

        /// Print the planned operations as JSON instead of SQL.
        #[arg(long)]
        json: bool,
    },

    /// Classify a migration script as JSON.
    Analyze {
        /// SQL file.
        file: PathBuf,
    },

    /// Apply a SQL migration script atomically.
    Migrate {
        /// SQL file.
        file: PathBuf,

        /// Run the script, then roll it back.
        #[arg(long)]
        dry_run: bool,
    },

    /// Migrate the database to a schema snapshot and record it.
    Sync {
        /// Snapshot to migrate to.
        #[arg(short, long)]
        schema: PathBuf,

        /// Run the script, then roll it back.
        #[arg(long)]
        dry_run: bool,

        /// Allow dropping tables and columns.
        #[arg(long)]
        allow_destructive: bool,
    },

    /// Show recorded schema syncs.
    History,
}

fn read_snapshot(path: &Path) -> anyhow::Result<SchemaSnapshot> {
    Ok(SchemaSnapshot::from_json(&fs::read_to_string(path)?)?)
}

async fn connect(url: &str) -> anyhow::Result<Database> {
    Ok(Database::connect(&DatabaseConfig::new(url)).await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Diff {
            current,
            previous,
            json,
        } => {
            let current = read_snapshot(&current)?;
            let previous = previous.as_deref().map(read_snapshot).transpose()?;
            let script = diff(&current, previous.as_ref());
            for warning in &script.warnings {
                warn!("{warning}");
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&script)?);
            } else if script.is_empty() {
                info!("No changes detected.");
            } else {
                print!("{}", script.to_sql());
            }
        }

        Commands::Analyze { file } => {
            let analysis = analyze_migration(&fs::read_to_string(&file)?);
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }

        Commands::Migrate { file, dry_run } => {
            let sql = fs::read_to_string(&file)?;
            let analysis = analyze_migration(&sql);
            if analysis.is_destructive {
                warn!(
                    tables = ?analysis.drop_tables,
                    recreated = ?analysis.recreated_tables,
                    "Script is destructive"
                );
            }
            let migrator = Migrator::new(connect(&cli.database).await?);
            let report = migrator.apply_sql(&sql, ApplyOptions { dry_run }).await?;
            info!(
                statements = report.statements,
                elapsed = ?report.elapsed,
                dry_run = report.dry_run,
                "Done."
            );
        }

        Commands::Sync {
            schema,
            dry_run,
            allow_destructive,
        } => {
            let current = read_snapshot(&schema)?;
            let migrator = Migrator::new(connect(&cli.database).await?);
            let report = migrator
                .sync(
                    &current,
                    SyncOptions {
                        dry_run,
                        allow_destructive,
                    },
                )
                .await?;
            match report.applied {
                Some(applied) => info!(
                    operations = report.script.ops.len(),
                    statements = applied.statements,
                    dry_run = applied.dry_run,
                    "Schema synced."
                ),
                None => info!("Schema already up to date."),
            }
        }

        Commands::History => {
            let migrator = Migrator::new(connect(&cli.database).await?);
            let entries = migrator.history().entries().await?;

            if entries.is_empty() {
                info!("No schema syncs have been recorded yet.");
            } else {
                println!("\nSchema history:");
                println!("{:-<60}", "");

                for entry in &entries {
                    println!(
                        " [{}] {} ({} tables){}",
                        entry.id,
                        entry.applied_at.format("%Y-%m-%d %H:%M:%S"),
                        entry.snapshot.len(),
                        if entry.destructive { " destructive" } else { "" }
                    );
                }
                println!();
            }
        }
    }

    Ok(())
}
