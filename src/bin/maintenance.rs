//! Manual maintenance of the users database. Each subcommand runs exactly one operation.

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use stockcast::config::CONFIG;

#[derive(Debug, Parser)]
#[command(
    name = "stockcast-maintenance",
    about = "Maintenance operations for the users database"
)]
struct Cli {
    /// Database to operate on; defaults to the configured `database_url`.
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Drop the users table and recreate it empty.
    Reset,
    /// Delete every user but keep the table.
    Wipe,
    /// Delete users with no login (or signup) within the last N days.
    PruneInactive {
        #[arg(long, default_value_t = 365)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(CONFIG.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    let database_url = cli
        .database_url
        .unwrap_or_else(|| CONFIG.database_url.clone());
    let users = stockcast::db::connect(&database_url).await?;

    match cli.command {
        Command::Reset => {
            users.reset().await?;
            info!(%database_url, "users table dropped and recreated");
        }
        Command::Wipe => {
            let removed = users.wipe().await?;
            info!(%database_url, removed, "all users deleted");
        }
        Command::PruneInactive { days } => {
            let cutoff = prune_cutoff(Utc::now(), days)?;
            let removed = users.prune_inactive(cutoff).await?;
            info!(%database_url, days, %cutoff, removed, "inactive users deleted");
        }
    }

    let remaining = users.count().await?;
    info!(%database_url, remaining, "maintenance complete");
    Ok(())
}

/// Oldest activity timestamp a user may have and still be kept.
fn prune_cutoff(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, String> {
    Duration::try_days(days.max(0))
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| format!("--days {days} is out of range"))
}
