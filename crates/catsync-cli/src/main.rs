mod harvest;
mod snapshot;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "catsync")]
#[command(about = "Catalog sync command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Harvest categories from the remote search endpoint
    Harvest {
        /// Harvest only this category (repeatable). Overrides `include` in the file.
        #[arg(long)]
        category: Vec<String>,
        /// Run the harvest without writing the snapshot or a sync run row
        #[arg(long)]
        dry_run: bool,
    },
    /// Inspect the stored catalog snapshot
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },
    /// Inspect sync run history
    Runs {
        #[command(subcommand)]
        command: RunsCommands,
    },
    /// Database operations
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum SnapshotCommands {
    /// Print a summary of the stored snapshot
    Show {
        /// Print every record as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum RunsCommands {
    /// List the most recent sync runs
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Ping,
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("catsync: no command given, see --help");
        return Ok(());
    };

    let config = catsync_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match command {
        Commands::Harvest { category, dry_run } => {
            harvest::run_harvest(&config, &category, dry_run).await?;
        }
        Commands::Snapshot {
            command: SnapshotCommands::Show { json },
        } => {
            let pool = catsync_db::connect_pool_from_config(&config).await?;
            snapshot::show_snapshot(&pool, json).await?;
        }
        Commands::Runs {
            command: RunsCommands::List { limit },
        } => {
            let pool = catsync_db::connect_pool_from_config(&config).await?;
            snapshot::list_runs(&pool, limit).await?;
        }
        Commands::Db { command } => {
            let pool = catsync_db::connect_pool_from_config(&config).await?;
            match command {
                DbCommands::Ping => {
                    catsync_db::health_check(&pool).await?;
                    println!("database: ok");
                }
                DbCommands::Migrate => {
                    let applied = catsync_db::run_migrations(&pool).await?;
                    println!("migrations applied: {applied}");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
