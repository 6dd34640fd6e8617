use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod aggregate;
mod config;
mod error;
mod models;
mod report;
mod roster;
mod server;

use crate::config::DashboardConfig;
use crate::error::SCHEMA_ERROR_MESSAGE;
use crate::models::Summaries;
use crate::roster::{RosterCache, RosterSource, RosterTable};

#[derive(Parser)]
#[command(name = "attendance-report")]
#[command(about = "Attendance dashboard for Operation and Training roster sheets", long_about = None)]
struct Cli {
    /// TOML file overriding the preset
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Built-in report to use (30 or 45-yankee)
    #[arg(long, global = true, default_value = config::DEFAULT_PRESET)]
    preset: String,
    /// Roster CSV URL or local path, instead of the configured sheet
    #[arg(long, global = true)]
    source: Option<String>,
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a markdown attendance report
    Report {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print both summary tables as JSON
    Summary,
    /// Serve the attendance dashboard over HTTP
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Open the attendance form in the browser
    Form,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => DashboardConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => DashboardConfig::preset(&cli.preset)?,
    };
    let source = RosterSource::parse(cli.source.as_deref().unwrap_or(&config.sheet_url));
    log::debug!("using roster source {}", source.describe());

    match cli.command {
        Commands::Report { out } => {
            let table = load_roster(&source).await?;
            let summaries = summarize(&table, &config)?;
            let report = report::build_report(&config.title, summaries.as_ref());

            match out {
                Some(out) => {
                    std::fs::write(&out, report)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                    println!("Report written to {}.", out.display());
                }
                None => print!("{report}"),
            }
        }
        Commands::Summary => {
            let table = load_roster(&source).await?;
            match summarize(&table, &config)? {
                Some(summaries) => println!("{}", serde_json::to_string_pretty(&summaries)?),
                None => eprintln!("{SCHEMA_ERROR_MESSAGE}"),
            }
        }
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let ip: IpAddr = host
                .parse()
                .with_context(|| format!("invalid listen address {host}"))?;
            let addr = SocketAddr::new(ip, port.unwrap_or(config.server.port));

            let cache = RosterCache::new(config.cache_ttl());
            let state = server::AppState::new(config, source, cache)?;
            server::serve(state, addr).await?;
        }
        Commands::Form => {
            if open::that(&config.form_url).is_err() {
                println!("Open this URL to fill out the attendance form:");
            }
            println!("{}", config.form_url);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

async fn load_roster(source: &RosterSource) -> anyhow::Result<RosterTable> {
    let client = roster::http_client()?;
    source
        .load(&client)
        .await
        .with_context(|| format!("failed to load roster from {}", source.describe()))
}

/// `None` when the roster lacks the required columns.
fn summarize(table: &RosterTable, config: &DashboardConfig) -> anyhow::Result<Option<Summaries>> {
    if table.is_empty() {
        log::warn!("roster has no rows");
    }
    match aggregate::compute_summaries(table, &config.aggregation) {
        Ok(summaries) => {
            log::info!(
                "summarized attendance for {} people from {} rows",
                summaries.people.len(),
                table.len()
            );
            Ok(Some(summaries))
        }
        Err(err) if err.is_schema() => {
            log::warn!("{}", err);
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}
