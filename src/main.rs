use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use listenlog::cli::{self, import, imports, init, report, stats};
use listenlog::config::Config;
use listenlog::event::MediaKind;
use listenlog::store::HistoryStore;

#[derive(Parser)]
#[command(name = "listenlog")]
#[command(about = "Import and report on streaming-service listening history exports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "listenlog.yaml")]
    config: String,

    /// Database path (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database if it does not exist
    Init,

    /// Import every export file found under a folder
    Import {
        /// Folder containing StreamingHistory*.json / endsong*.json files
        export_root: PathBuf,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List imported files
    Imports,

    /// Show statistics
    Stats {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Write a Markdown report
    Report {
        /// Output directory
        #[arg(short, long, default_value = "report")]
        out: PathBuf,

        #[command(flatten)]
        range: RangeArgs,
    },
}

#[derive(clap::Args)]
struct RangeArgs {
    /// First local date to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last local date to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Only music or only podcast events
    #[arg(long)]
    kind: Option<MediaKind>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "listenlog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load config
    let config = Config::load(&cli.config)?;
    let options = config.import_options()?;
    let db_path = cli.db.unwrap_or_else(|| config.database_path());

    match cli.command {
        Commands::Init => {
            init::run(&db_path)?;
        }
        Commands::Import { export_root, json } => {
            let mut store = open_store(&db_path)?;
            import::run(&mut store, options, &export_root, json)?;
        }
        Commands::Imports => {
            imports::run(&open_store(&db_path)?)?;
        }
        Commands::Stats { range } => {
            let filter = cli::date_filter(range.from, range.to, range.kind, options.zone);
            let store = open_store(&db_path)?;
            stats::run(&store, &filter, options.zone, config.report.top_artists)?;
        }
        Commands::Report { out, range } => {
            let filter = cli::date_filter(range.from, range.to, range.kind, options.zone);
            let store = open_store(&db_path)?;
            report::run(&store, &filter, options.zone, config.report.top_artists, &out)?;
        }
    }

    Ok(())
}

fn open_store(db_path: &Path) -> Result<HistoryStore> {
    HistoryStore::open(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))
}
