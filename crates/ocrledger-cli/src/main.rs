//! CLI application for the ocrledger ingestion pipeline.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config, ingest, records, send};

/// ocrledger - OCR bank slips and VAT invoices into ledger records
#[derive(Parser)]
#[command(name = "ocrledger")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run OCR over a batch of uploaded files
    Ingest(ingest::IngestArgs),

    /// Send reviewed journal records to the configured sink
    Send(send::SendArgs),

    /// List records already stored in the sink
    Records(records::RecordsArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Ingest(args) => ingest::run(args, cli.config.as_deref()).await,
        Commands::Send(args) => send::run(args, cli.config.as_deref()).await,
        Commands::Records(args) => records::run(args, cli.config.as_deref()).await,
        Commands::Config(args) => config::run(args).await,
    }
}
