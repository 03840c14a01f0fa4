//! Send command - push reviewed journal records to the sink.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use ocrledger_core::{BankSlipRecord, RecordSink, SheetClient, SheetSink};

use super::load_config;

/// Arguments for the send command.
#[derive(Args)]
pub struct SendArgs {
    /// JSON file of reviewed bank slip records (as written by `ingest`)
    #[arg(required = true)]
    input: PathBuf,

    /// Print what would be sent without calling the provider
    #[arg(long)]
    dry_run: bool,
}

pub async fn run(args: SendArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let content = fs::read_to_string(&args.input)?;
    let records: Vec<BankSlipRecord> = serde_json::from_str(&content)?;

    if records.is_empty() {
        anyhow::bail!("No records to send in {}", args.input.display());
    }

    if args.dry_run {
        println!(
            "{} Dry run: {} records would be sent",
            style("ℹ").blue(),
            records.len()
        );
        for record in &records {
            println!(
                "  - {} {} -> {}  {}",
                record
                    .trade_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "<no date>".to_string()),
                record.payer,
                record.receiver,
                record.amount
            );
        }
        return Ok(());
    }

    let http = config.http_client()?;
    let sink = SheetSink::new(SheetClient::new(config.sheet.clone(), http));

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} records")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut failures: Vec<(usize, String)> = Vec::new();
    for (index, record) in records.iter().enumerate() {
        if let Err(e) = sink.create_record(record).await {
            failures.push((index, e.to_string()));
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let sent = records.len() - failures.len();
    println!(
        "{} Sent {} of {} records",
        style("✓").green(),
        style(sent).green(),
        records.len()
    );

    if !failures.is_empty() {
        println!();
        println!("{}", style("Failed records:").red());
        for (index, error) in &failures {
            println!("  - record #{}: {}", index + 1, error);
        }
        anyhow::bail!("{} of {} records failed to send", failures.len(), records.len());
    }

    Ok(())
}
