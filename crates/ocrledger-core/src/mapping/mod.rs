//! Mapping of raw OCR provider fields into typed ledger records.

pub mod amounts;
pub mod dates;

pub use amounts::normalize_amount;
pub use dates::normalize_date;

use std::str::FromStr;

use chrono::Local;
use rust_decimal::Decimal;

use crate::error::MappingError;
use crate::models::record::{BankSlipRecord, VatInvoiceRecord};
use ocrledger_client::WordsResult;

// Bank receipt extraction template field names.
const TRADE_DATE: &str = "交易日期";
const AMOUNT_IN_FIGURES: &str = "小写金额";
const PAYER_NAME: &str = "付款人户名";
const RECEIVER_NAME: &str = "收款人户名";

// VAT invoice extraction template field names.
const INVOICE_DATE: &str = "InvoiceDate";
const INVOICE_NUM: &str = "InvoiceNum";
const INVOICE_TYPE: &str = "InvoiceType";
const PURCHASER_NAME: &str = "PurchaserName";
const PURCHASER_TAX_ID: &str = "PurchaserRegisterNum";
const SELLER_NAME: &str = "SellerName";
const SELLER_TAX_ID: &str = "SellerRegisterNum";
const TOTAL_AMOUNT: &str = "AmountInFiguers";

fn required<'a>(words: &'a WordsResult, key: &str) -> Result<&'a str, MappingError> {
    words
        .first_word(key)
        .ok_or_else(|| MappingError::MissingField(key.to_string()))
}

/// Normalize an extracted amount and insist it is an actual decimal.
/// An empty or garbled amount is a per-field extraction failure, never a
/// silent zero.
fn required_amount(words: &WordsResult, key: &str) -> Result<String, MappingError> {
    let raw = required(words, key)?;
    let amount = normalize_amount(raw);
    if amount.is_empty() || Decimal::from_str(&amount).is_err() {
        return Err(MappingError::InvalidValue {
            field: key.to_string(),
            value: raw.to_string(),
        });
    }
    Ok(amount)
}

/// Map a bank receipt extraction into a journal record.
///
/// `bank_slip_url` is the public URL of the retained slip file; bank slip
/// sources are kept on disk because this URL is a persisted field.
pub fn map_bank_slip(
    words: &WordsResult,
    bank_slip_url: String,
) -> Result<BankSlipRecord, MappingError> {
    let trade_date = normalize_date(required(words, TRADE_DATE)?);
    let amount = required_amount(words, AMOUNT_IN_FIGURES)?;
    let payer = required(words, PAYER_NAME)?.to_string();
    let receiver = required(words, RECEIVER_NAME)?.to_string();

    Ok(BankSlipRecord {
        trade_date,
        description: String::new(),
        additional_info: String::new(),
        amount,
        category: String::new(),
        payer,
        receiver,
        bank_slip_url,
        tax_invoice_url: String::new(),
        created_at: Local::now().naive_local(),
    })
}

/// Map a VAT invoice extraction, tagged with the upload it came from.
pub fn map_vat_invoice(
    words: &WordsResult,
    file_name: String,
) -> Result<VatInvoiceRecord, MappingError> {
    Ok(VatInvoiceRecord {
        file_name,
        invoice_date: normalize_date(required(words, INVOICE_DATE)?),
        invoice_number: required(words, INVOICE_NUM)?.to_string(),
        invoice_type: required(words, INVOICE_TYPE)?.to_string(),
        purchaser_name: required(words, PURCHASER_NAME)?.to_string(),
        purchaser_tax_id: required(words, PURCHASER_TAX_ID)?.to_string(),
        seller_name: required(words, SELLER_NAME)?.to_string(),
        seller_tax_id: required(words, SELLER_TAX_ID)?.to_string(),
        total_amount: required_amount(words, TOTAL_AMOUNT)?,
    })
}
