#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod schedule;
pub mod signature;
mod start;
pub mod version;

pub use cache::{ResultCache, DEFAULT_CACHE_TTL};
pub use client::Checkpoint;
pub use config::CheckpointConfig;
pub use error::{Error, Result};
pub use model::{CheckAlert, CheckParams, CheckResponse, ReportParams};
pub use schedule::{random_stagger, IntervalHandle, STAGGER_DIVISOR};
pub use signature::{SignatureStore, SIGNATURE_ERROR};
pub use start::{start, update_available, CHECK_KIND, REPORT_KIND};
