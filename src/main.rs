use std::path::PathBuf;

use chrono::Local;
use clap::{Parser, Subcommand};
use pdf_scrap::{info_time, logging, Config, Crawler, ResumeLedger, Result};

/// Crawls the search listing and downloads every linked PDF.
#[derive(Debug, Parser)]
#[command(name = "pdf-scrap", version, about, long_about = None)]
struct Cli {
    /// TOML config file; built-in defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Crawl every page and download as you go.
    Crawl {
        /// Skip URLs recorded in the ledger by earlier runs and record new ones.
        #[arg(long)]
        resume: bool,
    },
    /// Crawl every page and only record the document URLs in the ledger.
    Enqueue,
    /// Download every URL recorded in the ledger.
    Download,
}

#[tokio::main]
async fn main() {
    logging::init_logging();

    let start_time = Local::now();
    if let Err(err) = run(Cli::parse()).await {
        tracing::error!("pdf-scrap error: {err}");
        std::process::exit(1);
    }
    info_time!(start_time, "Full program time:");
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    tracing::debug!("loaded config: {:?}", config);

    let crawler = Crawler::from_config(config).await?;

    match cli.command {
        Command::Crawl { resume } => {
            crawler.prepare_output_dir().await?;
            let mut ledger = if resume {
                Some(ResumeLedger::load(&crawler.config().ledger_path).await?)
            } else {
                None
            };
            let report = crawler.crawl(ledger.as_mut()).await?;
            tracing::info!(
                downloaded = report.downloads.succeeded,
                skipped = report.downloads.skipped,
                failed = report.downloads.failed,
                "crawl complete"
            );
        }
        Command::Enqueue => {
            let mut ledger = ResumeLedger::load(&crawler.config().ledger_path).await?;
            crawler.enqueue(&mut ledger).await?;
        }
        Command::Download => {
            crawler.prepare_output_dir().await?;
            let ledger = ResumeLedger::load(&crawler.config().ledger_path).await?;
            let report = crawler.drain(&ledger).await?;
            tracing::info!(
                downloaded = report.succeeded,
                skipped = report.skipped,
                failed = report.failed,
                "download complete"
            );
        }
    }
    Ok(())
}
