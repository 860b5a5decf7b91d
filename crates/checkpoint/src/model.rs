use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Input to a single version check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckParams {
    pub product: String,
    pub version: String,
    /// Anonymous installation signature; omitted from the request when empty
    pub signature: String,
    /// Where to cache the response; every check goes to the network when unset
    pub cache_file: Option<PathBuf>,
    /// Short tag identifying the caller path, sent as `type`
    pub kind: String,
}

impl CheckParams {
    pub fn new(product: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_file = Some(path.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }
}

/// Version information returned by the checkpoint service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckResponse {
    pub product: String,
    pub current_version: String,
    /// Release date of `current_version`, epoch seconds
    pub current_release: i64,
    pub current_download_url: String,
    pub current_changelog_url: String,
    pub project_website: String,
    pub outdated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alerts: Vec<CheckAlert>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckAlert {
    pub id: String,
    /// Epoch seconds
    pub date: i64,
    pub url: String,
    pub level: String,
    pub message: String,
}

/// A single telemetry event, sent once and never persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportParams {
    pub signature: String,
    pub product: String,
    pub version: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub arch: String,
    pub os: String,
    /// Local file to read the signature from when `signature` is empty
    #[serde(skip)]
    pub signature_file: Option<PathBuf>,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Platform tags sent with every request
pub fn local_arch() -> &'static str {
    std::env::consts::ARCH
}

pub fn local_os() -> &'static str {
    std::env::consts::OS
}
