//! Record persistence seam.
//!
//! The pipeline hands finished records to a [`RecordSink`] and forgets
//! them; edits after that point go through the sink's own tooling. The
//! production sink is the spreadsheet provider; [`MemorySink`] backs tests
//! and dry runs.

use async_trait::async_trait;
use chrono::{Local, NaiveDate, TimeZone};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::SinkError;
use crate::models::record::BankSlipRecord;
use ocrledger_client::SheetClient;

// Ledger table column names, as the spreadsheet defines them.
const COL_TRADE_DATE: &str = "交易日期";
const COL_DESCRIPTION: &str = "描述";
const COL_ADDITIONAL_INFO: &str = "备注";
const COL_AMOUNT: &str = "金额";
const COL_CATEGORY: &str = "分类";
const COL_PAYER: &str = "付款方";
const COL_RECEIVER: &str = "收款方";
const COL_BANK_SLIP_URL: &str = "回单链接";
const COL_TAX_INVOICE_URL: &str = "发票链接";

/// Destination for accepted journal records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist one record.
    async fn create_record(&self, record: &BankSlipRecord) -> Result<(), SinkError>;

    /// All persisted records, newest first.
    async fn get_all_records(&self) -> Result<Vec<BankSlipRecord>, SinkError>;
}

/// Spreadsheet-backed sink.
pub struct SheetSink {
    client: SheetClient,
}

impl SheetSink {
    pub fn new(client: SheetClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecordSink for SheetSink {
    async fn create_record(&self, record: &BankSlipRecord) -> Result<(), SinkError> {
        let fields = record_to_fields(record)?;
        debug!(payer = %record.payer, amount = %record.amount, "sending record to sheet");
        self.client.append_record(fields).await?;
        Ok(())
    }

    async fn get_all_records(&self) -> Result<Vec<BankSlipRecord>, SinkError> {
        let rows = self.client.list_records().await?;
        Ok(rows.iter().map(fields_to_record).collect())
    }
}

/// Translate a record into the table's localized column map.
///
/// The provider wants the date as a millisecond Unix timestamp and the
/// amount as a number; this is the only place the decimal string is
/// converted, and only on the wire.
fn record_to_fields(
    record: &BankSlipRecord,
) -> Result<serde_json::Map<String, Value>, SinkError> {
    let amount: f64 = record
        .amount
        .parse()
        .map_err(|_| SinkError::Rejected(format!("amount {:?} is not a number", record.amount)))?;

    let mut fields = serde_json::Map::new();
    if let Some(date) = record.trade_date {
        fields.insert(COL_TRADE_DATE.to_string(), json!(date_to_millis(date)));
    }
    fields.insert(COL_DESCRIPTION.to_string(), json!(record.description));
    fields.insert(COL_ADDITIONAL_INFO.to_string(), json!(record.additional_info));
    fields.insert(COL_AMOUNT.to_string(), json!(amount));
    fields.insert(COL_CATEGORY.to_string(), json!(record.category));
    fields.insert(COL_PAYER.to_string(), json!(record.payer));
    fields.insert(COL_RECEIVER.to_string(), json!(record.receiver));
    fields.insert(COL_BANK_SLIP_URL.to_string(), json!(record.bank_slip_url));
    fields.insert(COL_TAX_INVOICE_URL.to_string(), json!(record.tax_invoice_url));
    Ok(fields)
}

/// Rebuild a record from a table row. The table does not store the
/// pipeline's creation time, so `created_at` is back-filled from the
/// trade date (midnight) when present.
fn fields_to_record(fields: &serde_json::Map<String, Value>) -> BankSlipRecord {
    let text = |key: &str| -> String {
        fields
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let trade_date = fields
        .get(COL_TRADE_DATE)
        .and_then(Value::as_i64)
        .and_then(millis_to_date);

    let amount = match fields.get(COL_AMOUNT) {
        Some(Value::Number(n)) => format!("{:.2}", n.as_f64().unwrap_or_default()),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };

    BankSlipRecord {
        trade_date,
        description: text(COL_DESCRIPTION),
        additional_info: text(COL_ADDITIONAL_INFO),
        amount,
        category: text(COL_CATEGORY),
        payer: text(COL_PAYER),
        receiver: text(COL_RECEIVER),
        bank_slip_url: text(COL_BANK_SLIP_URL),
        tax_invoice_url: text(COL_TAX_INVOICE_URL),
        created_at: trade_date
            .unwrap_or(NaiveDate::MIN)
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default(),
    }
}

fn date_to_millis(date: NaiveDate) -> i64 {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_default()
}

fn millis_to_date(millis: i64) -> Option<NaiveDate> {
    Local
        .timestamp_millis_opt(millis)
        .earliest()
        .map(|dt| dt.date_naive())
}

/// In-memory sink, for tests and offline tooling.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<BankSlipRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn create_record(&self, record: &BankSlipRecord) -> Result<(), SinkError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn get_all_records(&self) -> Result<Vec<BankSlipRecord>, SinkError> {
        let mut records = self.records.lock().await.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn record(payer: &str, amount: &str) -> BankSlipRecord {
        BankSlipRecord {
            trade_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            description: String::new(),
            additional_info: String::new(),
            amount: amount.to_string(),
            category: String::new(),
            payer: payer.to_string(),
            receiver: "乙方".to_string(),
            bank_slip_url: "http://localhost:8000/_upload/x.pdf".to_string(),
            tax_invoice_url: String::new(),
            created_at: Local::now().naive_local(),
        }
    }

    #[test]
    fn wire_fields_use_localized_columns_and_numeric_amount() {
        let fields = record_to_fields(&record("甲方", "1234.56")).unwrap();

        assert_eq!(fields.get(COL_AMOUNT), Some(&json!(1234.56)));
        assert_eq!(fields.get(COL_PAYER), Some(&json!("甲方")));
        assert!(fields.get(COL_TRADE_DATE).unwrap().is_i64());
    }

    #[test]
    fn non_numeric_amount_is_rejected_at_the_sink() {
        let mut bad = record("甲方", "1234.56");
        bad.amount = String::new();

        assert!(matches!(
            record_to_fields(&bad),
            Err(SinkError::Rejected(_))
        ));
    }

    #[test]
    fn blank_trade_date_is_omitted_from_the_wire() {
        let mut r = record("甲方", "10.00");
        r.trade_date = None;

        let fields = record_to_fields(&r).unwrap();
        assert!(!fields.contains_key(COL_TRADE_DATE));
    }

    #[test]
    fn date_millis_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(millis_to_date(date_to_millis(date)), Some(date));
    }

    #[test]
    fn row_round_trips_through_the_wire_shape() {
        let original = record("甲方", "1234.56");
        let row = record_to_fields(&original).unwrap();
        let restored = fields_to_record(&row);

        assert_eq!(restored.trade_date, original.trade_date);
        assert_eq!(restored.amount, original.amount);
        assert_eq!(restored.payer, original.payer);
        assert_eq!(restored.bank_slip_url, original.bank_slip_url);
    }

    #[tokio::test]
    async fn memory_sink_returns_newest_first() {
        let sink = MemorySink::new();

        let mut first = record("一", "1.00");
        first.created_at = Local::now().naive_local() - Duration::hours(2);
        let mut second = record("二", "2.00");
        second.created_at = Local::now().naive_local() - Duration::hours(1);
        let third = record("三", "3.00");

        for r in [&first, &second, &third] {
            sink.create_record(r).await.unwrap();
        }

        let all = sink.get_all_records().await.unwrap();
        let payers: Vec<_> = all.iter().map(|r| r.payer.as_str()).collect();
        assert_eq!(payers, vec!["三", "二", "一"]);
    }
}
