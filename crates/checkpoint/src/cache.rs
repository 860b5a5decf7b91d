use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::CheckResponse;
use crate::Result;

/// Used when the service does not say how long a response stays fresh
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    /// Epoch seconds after which the record is ignored
    expiry: i64,
    response: CheckResponse,
}

/// On-disk copy of the last check response for one cache file
#[derive(Debug, Clone)]
pub struct ResultCache {
    path: PathBuf,
}

impl ResultCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached response, if present, readable and not yet expired
    pub async fn read(&self) -> Option<CheckResponse> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!("Cache miss for {}: {}", self.path.display(), e);
                return None;
            }
        };

        let record: CacheRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!("Ignoring unreadable cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        if Utc::now().timestamp() >= record.expiry {
            tracing::debug!("Cache expired for {}", self.path.display());
            return None;
        }

        tracing::debug!("Cache hit for {}", self.path.display());
        Some(record.response)
    }

    /// Store `response` until `now + ttl`.
    ///
    /// The record is written to a sibling file and renamed into place, so a
    /// reader sees either the previous record or the new one.
    pub async fn write(&self, response: &CheckResponse, ttl: Duration) -> Result<()> {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let record = CacheRecord {
            expiry: Utc::now().timestamp().saturating_add(ttl_secs),
            response: response.clone(),
        };
        let bytes = serde_json::to_vec(&record)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let staging = self.staging_path();
        if let Err(e) = tokio::fs::write(&staging, &bytes).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&staging, &self.path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| String::from("cache"), |n| n.to_string_lossy().into_owned());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
    }
}

/// Lifetime a `Cache-Control` header value grants a check result.
/// `no-store` and `no-cache` mean zero, otherwise `max-age` decides.
pub fn cache_ttl(cache_control: &str) -> Option<Duration> {
    let mut max_age = None;
    for directive in cache_control.split(',') {
        let directive = directive.trim();
        if directive.eq_ignore_ascii_case("no-store") || directive.eq_ignore_ascii_case("no-cache")
        {
            return Some(Duration::ZERO);
        }
        let Some((name, value)) = directive.split_once('=') else {
            continue;
        };
        if max_age.is_none() && name.trim().eq_ignore_ascii_case("max-age") {
            max_age = value
                .trim()
                .trim_matches('"')
                .parse::<u64>()
                .ok()
                .map(Duration::from_secs);
        }
    }
    max_age
}
