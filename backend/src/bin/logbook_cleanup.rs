use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logbook_backend::{
    config::Config,
    db::connect_store,
    repositories::log_entry::DateRange,
    utils::time::{parse_datetime_value, RangeBound, MAX_RETENTION_DAYS},
};

/// Delete logbook entries.
#[derive(Debug, Parser)]
#[command(name = "logbook_cleanup", version)]
struct Args {
    /// Delete entries older than this many days (defaults to LOGBOOK_RETENTION_DAYS)
    #[arg(
        long,
        conflicts_with_all = ["from", "to", "all"],
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_RETENTION_DAYS)),
    )]
    days: Option<u32>,
    /// Start of the range to delete (RFC3339 or YYYY-MM-DD)
    #[arg(long, requires = "to", conflicts_with = "all")]
    from: Option<String>,
    /// End of the range to delete, inclusive
    #[arg(long, requires = "from", conflicts_with = "all")]
    to: Option<String>,
    /// Delete every entry
    #[arg(long)]
    all: bool,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    force: bool,
}

#[derive(Debug, PartialEq)]
enum CleanupMode {
    OlderThan(u32),
    Range(DateRange),
    All,
}

impl CleanupMode {
    fn describe(&self) -> String {
        match self {
            CleanupMode::OlderThan(days) => format!("entries older than {days} days"),
            CleanupMode::Range(range) => {
                format!("entries between {} and {}", range.from(), range.to())
            }
            CleanupMode::All => "ALL entries".to_string(),
        }
    }
}

fn resolve_mode(args: &Args, retention_days: u32) -> anyhow::Result<CleanupMode> {
    if args.all {
        return Ok(CleanupMode::All);
    }
    if let (Some(from), Some(to)) = (args.from.as_deref(), args.to.as_deref()) {
        let from = parse_datetime_value(from, RangeBound::Start)
            .with_context(|| format!("invalid --from value `{from}`"))?;
        let to = parse_datetime_value(to, RangeBound::End)
            .with_context(|| format!("invalid --to value `{to}`"))?;
        return Ok(CleanupMode::Range(DateRange::new(from, to)?));
    }
    let days = args.days.unwrap_or(retention_days);
    if days == 0 {
        bail!("--days must be at least 1");
    }
    Ok(CleanupMode::OlderThan(days))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logbook_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::load()?;
    let mode = resolve_mode(&args, config.logbook.retention_days)?;

    if !args.force {
        let confirm = dialoguer::Confirm::new()
            .with_prompt(format!("Delete {}?", mode.describe()))
            .default(false)
            .interact()
            .context("failed to read confirmation")?;

        if !confirm {
            println!("Cleanup cancelled.");
            return Ok(());
        }
    }

    let store = connect_store(&config).await?;
    let deleted = match mode {
        CleanupMode::OlderThan(days) => store.delete_older_than(days).await?,
        CleanupMode::Range(range) => store.delete_range(range).await?,
        CleanupMode::All => store.delete_all().await?,
    };

    tracing::info!(deleted, "Logbook cleanup finished");
    println!("Deleted {deleted} {}.", mode_noun(deleted));

    Ok(())
}

fn mode_noun(count: u64) -> &'static str {
    if count == 1 {
        "entry"
    } else {
        "entries"
    }
}
