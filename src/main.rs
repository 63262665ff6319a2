use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use abstractu_content::api::{self, AppState};
use abstractu_content::chain::verify_chain;
use abstractu_content::config::AppConfig;
use abstractu_content::logging::{init_logging, OperationTimer};
use abstractu_content::models::{Cid, MAX_PAGE_LIMIT};
use abstractu_content::render::SentenceFeed;
use abstractu_content::{ContentService, Database, MarkdownIngest, MarkdownParser};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to listen on (overrides server.bind_address)
        #[arg(short, long, env = "ABSTRACTU_BIND")]
        bind: Option<SocketAddr>,
    },
    /// Parse a markdown file and print its fragments as JSON
    Parse {
        /// Markdown file to parse
        file: PathBuf,

        /// Concept the fragments are parsed for
        #[arg(short, long, default_value = "a")]
        cid: String,
    },
    /// Walk a concept's chain and check its links
    Verify {
        /// Concept identifier
        cid: String,
    },
    /// Print the effective configuration as YAML
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging; the guard flushes the file writer on exit
    let _log_guard = init_logging(&config.logging)?;

    let outcome = match cli.command {
        Commands::Serve { bind } => serve(&config, bind).await,
        Commands::Parse { file, cid } => parse_file(&file, &cid),
        Commands::Verify { cid } => verify(&config, &cid).await,
        Commands::ShowConfig => write_stdout(&config.to_yaml()?),
    };

    if let Err(e) = &outcome {
        error!(error = %e, "Command failed");
    }
    outcome
}

fn open_service(config: &AppConfig) -> Result<Arc<ContentService>> {
    let database = Database::new(&config.database)
        .with_context(|| format!("Failed to open database at {}", config.database.url))?;
    Ok(Arc::new(ContentService::with_database(Arc::new(database), config.retry)))
}

/// Start the HTTP server
async fn serve(config: &AppConfig, bind: Option<SocketAddr>) -> Result<()> {
    let addr = match bind {
        Some(addr) => addr,
        None => config
            .server
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind address: {}", config.server.bind_address))?,
    };

    let service = open_service(config)?;
    let state = Arc::new(AppState::new(service, &config.admin.addresses));
    info!(admins = config.admin.addresses.len(), "Starting ABSTRACTU content server");
    api::serve(state, addr).await
}

/// Parse a markdown file without touching the store
fn parse_file(file: &Path, cid: &str) -> Result<()> {
    let cid = Cid::parse(cid)?;
    let markdown = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let timer = OperationTimer::new("parse");
    let fragments = MarkdownParser.parse(&markdown, cid);
    timer.finish();

    if fragments.is_empty() {
        anyhow::bail!("No block content found in {}", file.display());
    }
    write_stdout(&serde_json::to_string_pretty(&fragments)?)
}

/// Page through a concept's chain and verify linkage
async fn verify(config: &AppConfig, cid: &str) -> Result<()> {
    let cid = Cid::parse(cid)?;
    let service = open_service(config)?;

    let timer = OperationTimer::new("verify");
    let mut feed = SentenceFeed::new(service, cid, MAX_PAGE_LIMIT);
    let sentences = feed.load_all().await?;
    verify_chain(sentences)?;
    let count = sentences.len();
    timer.finish();

    info!(%cid, sentences = count, "Chain verified");
    write_stdout(&format!("concept {cid}: {count} sentences, chain intact"))
}

fn write_stdout(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}")?;
    Ok(())
}
