//! Records command - list what the sink already holds.

use clap::Args;
use console::style;

use ocrledger_core::{RecordSink, SheetClient, SheetSink};

use super::load_config;

/// Arguments for the records command.
#[derive(Args)]
pub struct RecordsArgs {
    /// Print records as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Show at most this many records (newest first)
    #[arg(short, long)]
    limit: Option<usize>,
}

pub async fn run(args: RecordsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let http = config.http_client()?;
    let sink = SheetSink::new(SheetClient::new(config.sheet.clone(), http));

    let mut records = sink.get_all_records().await?;
    if let Some(limit) = args.limit {
        records.truncate(limit);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{} No records in the sink yet", style("ℹ").blue());
        return Ok(());
    }

    for record in &records {
        println!(
            "{}  {:>12}  {} -> {}  {}",
            record
                .trade_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "<no date> ".to_string()),
            record.amount,
            record.payer,
            record.receiver,
            record.category
        );
    }
    println!();
    println!("{} {} records", style("✓").green(), records.len());

    Ok(())
}
