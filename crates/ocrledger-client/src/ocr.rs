//! OCR provider client (bank receipt and VAT invoice endpoints).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::token::{FetchedToken, TokenCache, TokenSource};
use crate::{ClientError, Result};

const PROVIDER: &str = "ocr";

/// Document kinds the OCR provider has dedicated extraction templates for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Bank transfer receipt.
    BankSlip,
    /// VAT invoice.
    VatInvoice,
}

impl DocumentKind {
    fn endpoint(self) -> &'static str {
        match self {
            DocumentKind::BankSlip => "/rest/2.0/ocr/v1/bank_receipt_new",
            DocumentKind::VatInvoice => "/rest/2.0/ocr/v1/vat_invoice",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::BankSlip => write!(f, "bank slip"),
            DocumentKind::VatInvoice => write!(f, "VAT invoice"),
        }
    }
}

/// OCR provider connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrProviderConfig {
    /// Provider base URL.
    pub base_url: String,

    /// Client-credential grant key.
    pub api_key: String,

    /// Client-credential grant secret.
    pub secret_key: String,

    /// Fallback token lifetime when the token response omits one.
    /// The provider documents roughly 25 days.
    pub token_ttl_secs: u64,
}

impl Default for OcrProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://aip.baidubce.com".to_string(),
            api_key: String::new(),
            secret_key: String::new(),
            token_ttl_secs: 25 * 24 * 3600,
        }
    }
}

struct OcrTokenSource {
    config: OcrProviderConfig,
}

#[derive(Deserialize)]
struct OcrTokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

#[async_trait]
impl TokenSource for OcrTokenSource {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch(&self, http: &reqwest::Client) -> Result<FetchedToken> {
        let url = format!(
            "{}/oauth/2.0/token?grant_type=client_credentials&client_id={}&client_secret={}",
            self.config.base_url, self.config.api_key, self.config.secret_key
        );

        let response = http.post(&url).send().await?;
        let status = response.status();
        let body: OcrTokenResponse =
            response.json().await.map_err(|e| ClientError::Auth {
                provider: PROVIDER,
                detail: format!("unreadable token response: {e}"),
            })?;

        if let Some(error) = body.error {
            return Err(ClientError::Auth {
                provider: PROVIDER,
                detail: format!(
                    "{error}: {}",
                    body.error_description.unwrap_or_default()
                ),
            });
        }

        let value = body.access_token.ok_or_else(|| ClientError::Auth {
            provider: PROVIDER,
            detail: format!("token response (status {status}) carried no access_token"),
        })?;

        let ttl = Duration::from_secs(body.expires_in.unwrap_or(self.config.token_ttl_secs));
        Ok(FetchedToken { value, ttl })
    }
}

/// The provider's `words_result` map: field name to extracted value.
///
/// Depending on the endpoint the value is either a bare string or an array
/// of `{ "word": .. }` objects; [`WordsResult::first_word`] flattens both.
#[derive(Debug, Clone, Deserialize)]
pub struct WordsResult(pub serde_json::Map<String, Value>);

impl WordsResult {
    /// First extracted value for `key`, regardless of the wire shape.
    pub fn first_word(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.as_str()),
            Value::Array(items) => items
                .first()
                .and_then(|item| item.get("word"))
                .and_then(Value::as_str),
            Value::Object(obj) => obj.get("word").and_then(Value::as_str),
            _ => None,
        }
    }

    /// True when every extracted value is empty (or the map itself is).
    /// The provider answers like this when the image is not the document
    /// kind the endpoint expects.
    pub fn is_degenerate(&self) -> bool {
        self.0
            .keys()
            .all(|key| self.first_word(key).unwrap_or_default().is_empty())
    }
}

#[derive(Deserialize)]
struct OcrResponse {
    words_result: Option<WordsResult>,
    error_code: Option<i64>,
    error_msg: Option<String>,
}

/// Client for the OCR provider's recognition endpoints.
pub struct OcrClient {
    http: reqwest::Client,
    tokens: TokenCache<OcrTokenSource>,
    base_url: String,
}

impl OcrClient {
    pub fn new(config: OcrProviderConfig, http: reqwest::Client) -> Self {
        let base_url = config.base_url.clone();
        Self {
            tokens: TokenCache::new(OcrTokenSource { config }, http.clone()),
            http,
            base_url,
        }
    }

    /// Fetch (or validate) the access token without sending a document.
    /// Lets callers surface credential problems before committing a batch.
    pub async fn warm_up(&self) -> Result<()> {
        self.tokens.token().await.map(|_| ())
    }

    /// Run extraction for one normalized file.
    ///
    /// `file_name` selects the request encoding (`pdf_file` vs `image`) by
    /// extension; `data` is the raw file content. Does not retry: batch
    /// policy lives with the caller.
    pub async fn extract(
        &self,
        file_name: &str,
        data: &[u8],
        kind: DocumentKind,
    ) -> Result<WordsResult> {
        let token = self.tokens.token().await?;
        let field = if file_name.to_lowercase().ends_with(".pdf") {
            "pdf_file"
        } else {
            "image"
        };

        let url = format!(
            "{}{}?access_token={token}",
            self.base_url,
            kind.endpoint()
        );

        debug!(file_name, %kind, field, "sending OCR request");

        let response = self
            .http
            .post(&url)
            .form(&[(field, BASE64.encode(data))])
            .send()
            .await?;

        let status = response.status();
        let payload = response.text().await?;

        if !status.is_success() {
            warn!(file_name, %status, "OCR request rejected");
            return Err(ClientError::Request {
                provider: PROVIDER,
                status: status.as_u16(),
                payload,
            });
        }

        let body: OcrResponse =
            serde_json::from_str(&payload).map_err(|e| ClientError::Malformed {
                provider: PROVIDER,
                detail: format!("{e} in {payload}"),
            })?;

        if let Some(code) = body.error_code {
            warn!(file_name, code, "OCR provider returned an error payload");
            return Err(ClientError::Request {
                provider: PROVIDER,
                status: status.as_u16(),
                payload: format!(
                    "error_code {code}: {}",
                    body.error_msg.unwrap_or_default()
                ),
            });
        }

        let words = body.words_result.ok_or_else(|| ClientError::Malformed {
            provider: PROVIDER,
            detail: "response carried no words_result".to_string(),
        })?;

        if words.is_degenerate() {
            return Err(ClientError::Recognition { kind });
        }

        Ok(words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn words(value: Value) -> WordsResult {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn first_word_reads_array_shape() {
        let w = words(json!({
            "交易日期": [{"word": "2024年05月01日", "location": {}}],
            "小写金额": [{"word": "¥1,234.56"}],
        }));

        assert_eq!(w.first_word("交易日期"), Some("2024年05月01日"));
        assert_eq!(w.first_word("小写金额"), Some("¥1,234.56"));
        assert_eq!(w.first_word("收款人户名"), None);
    }

    #[test]
    fn first_word_reads_scalar_shape() {
        let w = words(json!({
            "InvoiceNum": "12345678",
            "AmountInFiguers": "339.00",
        }));

        assert_eq!(w.first_word("InvoiceNum"), Some("12345678"));
        assert_eq!(w.first_word("AmountInFiguers"), Some("339.00"));
    }

    #[test]
    fn all_empty_fields_are_degenerate() {
        let w = words(json!({
            "交易日期": [{"word": ""}],
            "付款人户名": [{"word": ""}],
            "收款人户名": "",
        }));

        assert!(w.is_degenerate());
    }

    #[test]
    fn one_populated_field_is_not_degenerate() {
        let w = words(json!({
            "交易日期": [{"word": ""}],
            "付款人户名": [{"word": "某某公司"}],
        }));

        assert!(!w.is_degenerate());
    }

    #[test]
    fn empty_map_is_degenerate() {
        assert!(words(json!({})).is_degenerate());
    }

    #[test]
    fn document_kind_names_read_naturally() {
        assert_eq!(DocumentKind::BankSlip.to_string(), "bank slip");
        assert_eq!(DocumentKind::VatInvoice.to_string(), "VAT invoice");
    }
}
