//! Cache-aside roster loading.
//!
//! ```text
//! load() → Lookup ──hit──────────────────────────────────────→ Roster (cache)
//!             │ miss / corrupt entry          │ cache error / timeout
//!             ↓                               ↓
//!          gate → re-check → Build          Build (ungated)
//!                              │                  │
//!                              └── set in background (best effort) → Roster (source)
//! ```
//!
//! Only a cache that answered takes part in the build gate. A cache that is
//! down or slow never makes requests wait on each other.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use roster_core::{Normalizer, Roster, RowParser, SourceError};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::cache::{CacheError, CacheStore};
use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Failed to load {source_name} because: {cause}")]
    Source {
        source_name: String,
        #[source]
        cause: SourceError,
    },
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "roster load failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

/// Where a served roster came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterOrigin {
    Cache,
    Source,
}

impl RosterOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            RosterOrigin::Cache => "hit",
            RosterOrigin::Source => "miss",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RosterResponse {
    pub roster: Roster,
    pub origin: RosterOrigin,
}

pub struct RosterService {
    source_path: PathBuf,
    source_name: String,
    cache: Arc<dyn CacheStore>,
    cache_key: String,
    cache_timeout: Duration,
    parser: RowParser,
    normalizer: Normalizer,
    // Serializes source loads inside this process while the cache is healthy;
    // other instances may still race.
    build_gate: Arc<Mutex<()>>,
}

impl RosterService {
    /// Build the service from validated configuration.
    pub fn new(config: &AppConfig, cache: Arc<dyn CacheStore>) -> Self {
        let delimiter = config.source.delimiter_byte().unwrap_or(b',');
        Self {
            source_path: config.source.path.clone(),
            source_name: config.source.display_name(),
            cache,
            cache_key: config.cache.key.clone(),
            cache_timeout: config.cache.timeout(),
            parser: RowParser::new().with_delimiter(delimiter),
            normalizer: Normalizer::new(),
            build_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    /// Serve the roster from cache, loading and caching it on a miss.
    ///
    /// Only a source failure is an error; cache problems fall back to a
    /// source load.
    pub async fn load(&self) -> Result<RosterResponse, ServiceError> {
        match self.lookup().await {
            Lookup::Hit(roster) => return Ok(RosterResponse::cached(roster)),
            Lookup::Unavailable => return self.build_ungated().await,
            Lookup::Miss => {}
        }

        let gate = Arc::clone(&self.build_gate).lock_owned().await;

        // Another request may have filled the cache while we waited.
        match self.lookup().await {
            Lookup::Hit(roster) => return Ok(RosterResponse::cached(roster)),
            Lookup::Unavailable => {
                drop(gate);
                return self.build_ungated().await;
            }
            Lookup::Miss => {}
        }

        let roster = self.build_from_source().await?;
        // Waiters stay behind the gate until the write settles, then hit.
        self.spawn_store(&roster, Some(gate));
        Ok(RosterResponse::fresh(roster))
    }

    async fn build_ungated(&self) -> Result<RosterResponse, ServiceError> {
        let roster = self.build_from_source().await?;
        self.spawn_store(&roster, None);
        Ok(RosterResponse::fresh(roster))
    }

    /// Parse and normalize the whole source without touching the cache.
    pub async fn build_from_source(&self) -> Result<Roster, ServiceError> {
        let source_error = |cause: SourceError| ServiceError::Source {
            source_name: self.source_name.clone(),
            cause,
        };

        let mut rows = self
            .parser
            .open(&self.source_path)
            .await
            .map_err(source_error)?;

        let mut roster = Roster::new();
        while let Some(row) = rows.next().await {
            roster.push(self.normalizer.normalize(row.map_err(source_error)?));
        }

        tracing::info!(
            source = %self.source_name,
            records = roster.len(),
            "roster loaded from source"
        );
        Ok(roster)
    }

    async fn lookup(&self) -> Lookup {
        let bytes = match bounded(self.cache_timeout, self.cache.get(&self.cache_key)).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(key = %self.cache_key, "cache miss");
                return Lookup::Miss;
            }
            Err(e) => {
                tracing::warn!(key = %self.cache_key, error = %e, "cache lookup failed, loading from source");
                return Lookup::Unavailable;
            }
        };

        match serde_json::from_slice::<Roster>(&bytes) {
            Ok(roster) => {
                tracing::debug!(key = %self.cache_key, records = roster.len(), "cache hit");
                Lookup::Hit(roster)
            }
            Err(e) => {
                tracing::warn!(key = %self.cache_key, error = %e, "corrupt cache entry, loading from source");
                Lookup::Miss
            }
        }
    }

    /// Write the roster without holding up the response. The gate, if any, is
    /// released once the write finishes or times out.
    fn spawn_store(&self, roster: &Roster, gate: Option<OwnedMutexGuard<()>>) {
        let bytes = match serde_json::to_vec(roster) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize roster, skipping cache write");
                return;
            }
        };

        let cache = Arc::clone(&self.cache);
        let key = self.cache_key.clone();
        let timeout = self.cache_timeout;
        tokio::spawn(async move {
            let _gate = gate;
            match bounded(timeout, cache.set(&key, bytes)).await {
                Ok(()) => tracing::debug!(key = %key, "roster cached"),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "cache write failed, roster served uncached")
                }
            }
        });
    }
}

enum Lookup {
    Hit(Roster),
    /// The cache answered but has no usable entry.
    Miss,
    /// The cache errored or timed out.
    Unavailable,
}

impl RosterResponse {
    fn cached(roster: Roster) -> Self {
        Self {
            roster,
            origin: RosterOrigin::Cache,
        }
    }

    fn fresh(roster: Roster) -> Self {
        Self {
            roster,
            origin: RosterOrigin::Source,
        }
    }
}

async fn bounded<T>(
    timeout: Duration,
    op: impl Future<Output = Result<T, CacheError>>,
) -> Result<T, CacheError> {
    tokio::time::timeout(timeout, op)
        .await
        .map_err(|_| CacheError::Timeout(timeout))?
}
