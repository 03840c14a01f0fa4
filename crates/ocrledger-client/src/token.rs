//! Bearer credential cache with coalesced refresh.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::{ClientError, Result};

/// Tokens are treated as expired slightly early so a credential never dies
/// mid-request.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// A freshly issued credential and its provider-reported lifetime.
#[derive(Debug, Clone)]
pub struct FetchedToken {
    pub value: String,
    pub ttl: Duration,
}

/// Something that can mint a new bearer credential over HTTP.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Provider name used in logs and error payloads.
    fn provider(&self) -> &'static str;

    /// Perform one credential fetch. Called only when the cache is empty
    /// or expired.
    async fn fetch(&self, http: &reqwest::Client) -> Result<FetchedToken>;
}

struct CachedToken {
    value: String,
    issued_at: Instant,
    ttl: Duration,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        self.issued_at.elapsed() < self.ttl.saturating_sub(EXPIRY_MARGIN)
    }
}

/// Caches one credential per provider and refreshes it lazily.
///
/// The fast path is a shared read of the slot. When the credential has
/// expired, callers serialize on the refresh mutex: the first one performs
/// the fetch, everyone queued behind it re-checks the slot and leaves
/// without issuing a redundant request.
pub struct TokenCache<S> {
    source: S,
    http: reqwest::Client,
    slot: RwLock<Option<CachedToken>>,
    refresh: Mutex<()>,
}

impl<S: TokenSource> TokenCache<S> {
    pub fn new(source: S, http: reqwest::Client) -> Self {
        Self {
            source,
            http,
            slot: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Current credential value, refreshing it first if needed.
    ///
    /// Fails only when the upstream token endpoint does, as
    /// [`ClientError::Auth`] or a transport error.
    pub async fn token(&self) -> Result<String> {
        if let Some(token) = self.read_valid().await {
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;

        // A caller that held the lock before us may already have refreshed.
        if let Some(token) = self.read_valid().await {
            return Ok(token);
        }

        let fetched = self.source.fetch(&self.http).await?;
        if fetched.value.is_empty() {
            return Err(ClientError::Auth {
                provider: self.source.provider(),
                detail: "token endpoint returned an empty credential".to_string(),
            });
        }

        debug!(
            provider = self.source.provider(),
            ttl_secs = fetched.ttl.as_secs(),
            "refreshed provider credential"
        );

        let value = fetched.value.clone();
        *self.slot.write().await = Some(CachedToken {
            value: fetched.value,
            issued_at: Instant::now(),
            ttl: fetched.ttl,
        });

        Ok(value)
    }

    async fn read_valid(&self) -> Option<String> {
        self.slot
            .read()
            .await
            .as_ref()
            .filter(|t| t.is_valid())
            .map(|t| t.value.clone())
    }
}
