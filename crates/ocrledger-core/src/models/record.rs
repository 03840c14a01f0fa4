//! Ledger record models.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A journal entry extracted from a bank transfer slip.
///
/// `amount` stays a plain decimal string end-to-end; it is never parsed
/// into a float inside the pipeline, so currency values survive exactly as
/// extracted. The spreadsheet sink converts at the wire boundary only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankSlipRecord {
    /// Trade date. `None` means the extracted date string did not parse
    /// and the operator has to fill it in by hand.
    pub trade_date: Option<NaiveDate>,

    /// Free-form description, filled in by the operator.
    #[serde(default)]
    pub description: String,

    /// Free-form note, filled in by the operator.
    #[serde(default)]
    pub additional_info: String,

    /// Amount as an exact decimal string, e.g. "1234.56".
    pub amount: String,

    /// Expense category, filled in by the operator.
    #[serde(default)]
    pub category: String,

    /// Paying party name.
    pub payer: String,

    /// Receiving party name.
    pub receiver: String,

    /// Public URL of the retained slip file.
    pub bank_slip_url: String,

    /// Public URL of the matching invoice, if the operator linked one.
    #[serde(default)]
    pub tax_invoice_url: String,

    /// When this record was produced by the pipeline.
    pub created_at: NaiveDateTime,
}

/// Fields extracted from a VAT invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatInvoiceRecord {
    /// Original upload file name (per page for split PDFs).
    pub file_name: String,

    /// Issue date; `None` when the extracted string did not parse.
    pub invoice_date: Option<NaiveDate>,

    /// Invoice number.
    pub invoice_number: String,

    /// Invoice type, as printed on the document.
    pub invoice_type: String,

    /// Purchaser legal name.
    pub purchaser_name: String,

    /// Purchaser tax registration id.
    pub purchaser_tax_id: String,

    /// Seller legal name.
    pub seller_name: String,

    /// Seller tax registration id.
    pub seller_tax_id: String,

    /// Tax-inclusive total as an exact decimal string.
    pub total_amount: String,
}
