//! Spreadsheet provider client (bitable record storage).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::token::{FetchedToken, TokenCache, TokenSource};
use crate::{ClientError, Result};

const PROVIDER: &str = "spreadsheet";

/// Spreadsheet provider connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetProviderConfig {
    /// Provider base URL.
    pub base_url: String,

    /// Tenant application id.
    pub app_id: String,

    /// Tenant application secret.
    pub app_secret: String,

    /// Bitable app token the ledger table lives in.
    pub app_token: String,

    /// Ledger table id.
    pub table_id: String,

    /// Fallback token lifetime when the token response omits one.
    /// Tenant tokens live for about an hour.
    pub token_ttl_secs: u64,
}

impl Default for SheetProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://open.feishu.cn".to_string(),
            app_id: String::new(),
            app_secret: String::new(),
            app_token: String::new(),
            table_id: String::new(),
            token_ttl_secs: 3600,
        }
    }
}

struct TenantTokenSource {
    config: SheetProviderConfig,
}

#[derive(Deserialize)]
struct TenantTokenResponse {
    code: i64,
    msg: Option<String>,
    tenant_access_token: Option<String>,
    expire: Option<u64>,
}

#[async_trait]
impl TokenSource for TenantTokenSource {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch(&self, http: &reqwest::Client) -> Result<FetchedToken> {
        let url = format!(
            "{}/open-apis/auth/v3/tenant_access_token/internal",
            self.config.base_url
        );

        let response = http
            .post(&url)
            .json(&json!({
                "app_id": self.config.app_id,
                "app_secret": self.config.app_secret,
            }))
            .send()
            .await?;

        let body: TenantTokenResponse =
            response.json().await.map_err(|e| ClientError::Auth {
                provider: PROVIDER,
                detail: format!("unreadable token response: {e}"),
            })?;

        if body.code != 0 {
            return Err(ClientError::Auth {
                provider: PROVIDER,
                detail: format!("code {}: {}", body.code, body.msg.unwrap_or_default()),
            });
        }

        let value = body.tenant_access_token.ok_or_else(|| ClientError::Auth {
            provider: PROVIDER,
            detail: "token response carried no tenant_access_token".to_string(),
        })?;

        let ttl = Duration::from_secs(body.expire.unwrap_or(self.config.token_ttl_secs));
        Ok(FetchedToken { value, ttl })
    }
}

#[derive(Deserialize)]
struct BitableResponse {
    code: i64,
    data: Option<BitableData>,
}

#[derive(Deserialize, Default)]
struct BitableData {
    #[serde(default)]
    items: Vec<BitableRecord>,
    #[serde(default)]
    has_more: bool,
    page_token: Option<String>,
}

#[derive(Deserialize)]
struct BitableRecord {
    fields: serde_json::Map<String, Value>,
}

/// Cursor for the next page, `None` when the listing is complete.
///
/// A page claiming `has_more` without a `page_token` would make the next
/// request identical to the last one, so it is rejected instead of looped.
fn next_page_cursor(data: &mut BitableData) -> Result<Option<String>> {
    if !data.has_more {
        return Ok(None);
    }
    match data.page_token.take() {
        Some(cursor) => Ok(Some(cursor)),
        None => Err(ClientError::Malformed {
            provider: PROVIDER,
            detail: "listing reports has_more without a page_token".to_string(),
        }),
    }
}

/// Client for the spreadsheet provider's bitable record API.
pub struct SheetClient {
    http: reqwest::Client,
    tokens: TokenCache<TenantTokenSource>,
    config: SheetProviderConfig,
}

impl SheetClient {
    pub fn new(config: SheetProviderConfig, http: reqwest::Client) -> Self {
        Self {
            tokens: TokenCache::new(
                TenantTokenSource {
                    config: config.clone(),
                },
                http.clone(),
            ),
            http,
            config,
        }
    }

    fn records_url(&self) -> String {
        format!(
            "{}/open-apis/bitable/v1/apps/{}/tables/{}/records",
            self.config.base_url, self.config.app_token, self.config.table_id
        )
    }

    /// Append one record, `fields` keyed by the table's column names.
    pub async fn append_record(&self, fields: serde_json::Map<String, Value>) -> Result<()> {
        let token = self.tokens.token().await?;

        debug!(columns = fields.len(), "appending spreadsheet record");

        let response = self
            .http
            .post(self.records_url())
            .bearer_auth(&token)
            .json(&json!({ "fields": fields }))
            .send()
            .await?;

        let status = response.status();
        let payload = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Request {
                provider: PROVIDER,
                status: status.as_u16(),
                payload,
            });
        }

        let body: BitableResponse =
            serde_json::from_str(&payload).map_err(|e| ClientError::Malformed {
                provider: PROVIDER,
                detail: format!("{e} in {payload}"),
            })?;

        if body.code != 0 {
            warn!(code = body.code, "spreadsheet provider rejected the record");
            return Err(ClientError::Request {
                provider: PROVIDER,
                status: status.as_u16(),
                payload,
            });
        }

        Ok(())
    }

    /// Fetch every record in the table, newest first.
    pub async fn list_records(&self) -> Result<Vec<serde_json::Map<String, Value>>> {
        let token = self.tokens.token().await?;
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(self.records_url())
                .bearer_auth(&token)
                .query(&[("page_size", "100")]);
            if let Some(ref cursor) = page_token {
                request = request.query(&[("page_token", cursor)]);
            }

            let response = request.send().await?;
            let status = response.status();
            let payload = response.text().await?;

            if !status.is_success() {
                return Err(ClientError::Request {
                    provider: PROVIDER,
                    status: status.as_u16(),
                    payload,
                });
            }

            let body: BitableResponse =
                serde_json::from_str(&payload).map_err(|e| ClientError::Malformed {
                    provider: PROVIDER,
                    detail: format!("{e} in {payload}"),
                })?;

            if body.code != 0 {
                return Err(ClientError::Request {
                    provider: PROVIDER,
                    status: status.as_u16(),
                    payload,
                });
            }

            let mut data = body.data.unwrap_or_default();
            let next = next_page_cursor(&mut data)?;
            records.extend(data.items.into_iter().map(|r| r.fields));

            match next {
                Some(cursor) => page_token = Some(cursor),
                None => break,
            }
        }

        // The provider pages in insertion order; callers expect newest first.
        records.reverse();
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn page(value: Value) -> BitableData {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn mid_listing_page_yields_the_next_cursor() {
        let mut data = page(json!({
            "items": [{"fields": {"付款方": "甲"}}],
            "has_more": true,
            "page_token": "cursor-2",
        }));

        let next = next_page_cursor(&mut data).unwrap();
        assert_eq!(next, Some("cursor-2".to_string()));
    }

    #[test]
    fn final_page_ends_the_listing() {
        let mut data = page(json!({
            "items": [{"fields": {}}],
            "has_more": false,
        }));

        assert_eq!(next_page_cursor(&mut data).unwrap(), None);
    }

    #[test]
    fn has_more_without_a_cursor_is_malformed_not_a_loop() {
        let mut data = page(json!({
            "items": [],
            "has_more": true,
        }));

        let err = next_page_cursor(&mut data).unwrap_err();
        assert!(matches!(err, ClientError::Malformed { .. }));
        assert!(err.to_string().contains("has_more without a page_token"));
    }
}
