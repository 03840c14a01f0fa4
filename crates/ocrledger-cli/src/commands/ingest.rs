//! Ingest command - batch OCR over uploaded files.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, ValueEnum};
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use ocrledger_core::{
    FileFailure, FileNormalizer, Ingestor, OcrClient, UploadedFile, VatInvoiceRecord,
};

use super::load_config;

/// Arguments for the ingest command.
#[derive(Args)]
pub struct IngestArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Document kind to extract
    #[arg(short, long, value_enum)]
    kind: Kind,

    /// Write accepted records as JSON (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write a CSV export (VAT invoices only)
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    /// Bank transfer slips
    BankSlip,
    /// VAT invoices
    VatInvoice,
}

pub async fn run(args: IngestArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    // Expand glob pattern
    let paths: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(ext.to_lowercase().as_str(), "pdf" | "png" | "jpg" | "jpeg" | "bmp")
        })
        .collect();

    if paths.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        paths.len()
    );

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        files.push(UploadedFile::new(file_name, fs::read(path)?));
    }

    let http = config.http_client()?;
    let ocr = Arc::new(OcrClient::new(config.ocr.clone(), http));
    let normalizer = FileNormalizer::new(&config.upload.upload_dir).await?;
    let ingestor = Ingestor::new(
        normalizer,
        ocr,
        config.ingest.clone(),
        config.upload.public_base_url.clone(),
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    spinner.set_message(format!("Running OCR on {} files...", files.len()));
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));

    match args.kind {
        Kind::BankSlip => {
            let report = ingestor.ingest_bank_slips(&files).await?;
            spinner.finish_and_clear();

            write_records(&report.succeeded, args.output.as_deref())?;
            print_summary(report.succeeded.len(), &report.failed, start);
        }
        Kind::VatInvoice => {
            let report = ingestor.ingest_vat_invoices(&files).await?;
            spinner.finish_and_clear();

            write_records(&report.succeeded, args.output.as_deref())?;
            if let Some(csv_path) = &args.csv {
                write_invoice_csv(csv_path, &report.succeeded)?;
                println!(
                    "{} CSV export written to {}",
                    style("✓").green(),
                    csv_path.display()
                );
            }
            print_summary(report.succeeded.len(), &report.failed, start);
        }
    }

    Ok(())
}

fn write_records<R: serde::Serialize>(
    records: &[R],
    output: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    match output {
        Some(path) => {
            fs::write(path, json)?;
            debug!("wrote records to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn print_summary(succeeded: usize, failed: &[FileFailure], start: Instant) {
    println!();
    println!(
        "{} Processed batch in {:?}",
        style("✓").green(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(succeeded).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for failure in failed {
            println!("  - {}: {}", failure.file_name, failure.error);
        }
    }
}

/// CSV export with the ledger's column order.
fn write_invoice_csv(path: &std::path::Path, records: &[VatInvoiceRecord]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "文件名",
        "开票日期",
        "发票号码",
        "发票种类",
        "购买方名称",
        "购买方税号",
        "销售方名称",
        "销售方税号",
        "价税合计",
    ])?;

    for record in records {
        wtr.write_record([
            record.file_name.as_str(),
            &record
                .invoice_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
            record.invoice_number.as_str(),
            record.invoice_type.as_str(),
            record.purchaser_name.as_str(),
            record.purchaser_tax_id.as_str(),
            record.seller_name.as_str(),
            record.seller_tax_id.as_str(),
            record.total_amount.as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
