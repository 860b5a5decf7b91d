//! Fire-and-forget startup entry point.
//!
//! This is the one place where check and report errors are discarded: they
//! are logged at debug level and never reach the embedding application.

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;

use crate::client::Checkpoint;
use crate::model::{CheckParams, CheckResponse, ReportParams};
use crate::schedule::{spawn_detached, IntervalHandle};
use crate::signature::SignatureStore;
use crate::Result;

pub const CHECK_KIND: &str = "c1";
pub const REPORT_KIND: &str = "r1";

/// Start version checks and usage reporting for `product`, configured from
/// the environment. Never blocks and never fails.
pub fn start(product: &str, version: &str) -> IntervalHandle {
    match Checkpoint::from_env() {
        Ok(checkpoint) => checkpoint.start(product, version),
        Err(e) => {
            tracing::debug!("Checkpoint client unavailable: {}", e);
            IntervalHandle::inert()
        }
    }
}

/// Whether `response` announces a release newer than `version`
pub fn update_available(version: &str, response: &CheckResponse) -> bool {
    response.outdated && !response.current_version.is_empty() && response.current_version != version
}

fn print_update_notice(product: &str, version: &str, response: &CheckResponse) {
    if update_available(version, response) {
        eprintln!(
            "A new version of {} is available. Please visit {}.",
            product, response.current_download_url
        );
    }
}

impl Checkpoint {
    /// Like [`start`], printing an update notice to stderr when a newer
    /// version is reported.
    pub fn start(&self, product: &str, version: &str) -> IntervalHandle {
        let notice_product = product.to_string();
        let notice_version = version.to_string();
        self.start_with(product, version, move |response| {
            print_update_notice(&notice_product, &notice_version, response);
        })
    }

    /// Send one usage report, run one immediate check, and keep checking on
    /// the configured interval. Successful check responses go to `notify`.
    pub fn start_with<F>(&self, product: &str, version: &str, notify: F) -> IntervalHandle
    where
        F: Fn(&CheckResponse) + Send + Sync + 'static,
    {
        if self.is_disabled() {
            tracing::debug!("Checkpoint disabled, not starting for {}", product);
            return IntervalHandle::inert();
        }

        let started_at = Utc::now();
        let handle = IntervalHandle::new();
        let schedule = handle.clone();
        let this = self.clone();
        let product = product.to_string();
        let version = version.to_string();
        let notify = Arc::new(notify);

        spawn_detached(async move {
            let store =
                SignatureStore::for_product(&product, this.config().config_dir.as_deref()).await;
            let signature = store.signature_or_sentinel().await;

            let params = CheckParams {
                product: product.clone(),
                version: version.clone(),
                signature: signature.clone(),
                cache_file: this.config().cache_file_for(&product),
                kind: CHECK_KIND.to_string(),
            };

            let periodic = {
                let notify = Arc::clone(&notify);
                this.clone().run_interval(
                    params.clone(),
                    this.config().check_interval,
                    move |result| deliver(notify.as_ref(), result),
                    schedule,
                )
            };

            let immediate = async {
                let report = ReportParams {
                    signature,
                    product: product.clone(),
                    version: version.clone(),
                    start_time: Some(started_at),
                    end_time: Some(Utc::now()),
                    signature_file: store.path().map(Path::to_path_buf),
                    kind: REPORT_KIND.to_string(),
                    ..Default::default()
                };
                if let Err(e) = this.report(&report).await {
                    tracing::debug!("Usage report for {} failed: {}", product, e);
                }
                deliver(notify.as_ref(), this.check(&params).await);
            };

            tokio::join!(periodic, immediate);
        });

        handle
    }
}

fn deliver<F>(notify: &F, result: Result<CheckResponse>)
where
    F: Fn(&CheckResponse) + ?Sized,
{
    match result {
        Ok(response) => notify(&response),
        Err(e) => tracing::debug!("Version check failed: {}", e),
    }
}
