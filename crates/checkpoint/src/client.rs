use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Request, Response};
use std::sync::Arc;
use url::Url;

use crate::cache::{cache_ttl, ResultCache, DEFAULT_CACHE_TTL};
use crate::config::CheckpointConfig;
use crate::model::{local_arch, local_os, CheckParams, CheckResponse, ReportParams};
use crate::signature::SignatureStore;
use crate::version;
use crate::{Error, Result};

/// Client for the checkpoint service.
///
/// Cheap to clone; clones share the HTTP connection pool and configuration.
/// A disabled client never touches the network or the file system.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    config: Arc<CheckpointConfig>,
    http: Client,
}

impl Checkpoint {
    pub fn new(config: CheckpointConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("checkpoint/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(CheckpointConfig::from_env())
    }

    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    pub fn is_disabled(&self) -> bool {
        self.config.disabled
    }

    /// Ask the service whether a newer version of `params.product` exists.
    ///
    /// A fresh cached response is returned as-is without a request. Otherwise
    /// one request is made under the configured timeout; `outdated` is
    /// recomputed locally and the result is written to the cache.
    pub async fn check(&self, params: &CheckParams) -> Result<CheckResponse> {
        if self.config.disabled {
            return Ok(CheckResponse::default());
        }

        let cache = params.cache_file.as_ref().map(ResultCache::new);
        if let Some(ref cache) = cache {
            if let Some(cached) = cache.read().await {
                return Ok(cached);
            }
        }

        let url = self.check_url(params)?;
        tracing::debug!("Checking {} {} at {}", params.product, params.version, url);

        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = ensure_success(response)?;

        let ttl = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(cache_ttl)
            .unwrap_or(DEFAULT_CACHE_TTL);

        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let mut result: CheckResponse = serde_json::from_slice(&body).map_err(Error::Decode)?;

        match version::is_outdated(&params.version, &result.current_version) {
            Some(outdated) => result.outdated = outdated,
            None => tracing::debug!(
                "Cannot compare {:?} with {:?}, keeping server verdict",
                params.version,
                result.current_version
            ),
        }

        if let Some(cache) = cache.filter(|_| !ttl.is_zero()) {
            if let Err(e) = cache.write(&result, ttl).await {
                tracing::warn!("Failed to write cache {}: {}", cache.path().display(), e);
            }
        }

        Ok(result)
    }

    /// Build the telemetry request without sending it
    pub fn report_request(&self, params: &ReportParams) -> Result<Request> {
        let url = self.endpoint_url(&["telemetry", &params.product])?;

        let mut body = params.clone();
        if body.arch.is_empty() {
            body.arch = local_arch().to_string();
        }
        if body.os.is_empty() {
            body.os = local_os().to_string();
        }

        Ok(self.http.post(url).json(&body).build()?)
    }

    /// Send one telemetry event. The response body is ignored.
    pub async fn report(&self, params: &ReportParams) -> Result<()> {
        if self.config.disabled {
            return Ok(());
        }

        let mut params = params.clone();
        if params.signature.is_empty() {
            if let Some(ref path) = params.signature_file {
                params.signature = SignatureStore::at(path).signature_or_sentinel().await;
            }
        }

        let request = self.report_request(&params)?;
        tracing::debug!("Reporting {} {} to {}", params.product, params.version, request.url());

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| self.transport_error(e))?;
        ensure_success(response)?;

        Ok(())
    }

    fn check_url(&self, params: &CheckParams) -> Result<Url> {
        let mut url = self.endpoint_url(&["check", &params.product])?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("version", &params.version)
                .append_pair("arch", local_arch())
                .append_pair("os", local_os());
            if !params.signature.is_empty() {
                query.append_pair("signature", &params.signature);
            }
            if !params.kind.is_empty() {
                query.append_pair("type", &params.kind);
            }
        }
        Ok(url)
    }

    fn endpoint_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.endpoint)?;
        url.path_segments_mut()
            .map_err(|()| Error::InvalidEndpoint(self.config.endpoint.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        Error::transport(err, self.config.timeout)
    }
}

fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        tracing::debug!("Checkpoint responded {} for {}", status, response.url());
        Err(Error::Status {
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_client(endpoint: &str) -> Checkpoint {
        Checkpoint::new(CheckpointConfig::default().with_endpoint(endpoint)).unwrap()
    }

    #[test]
    fn test_report_request_targets_product() {
        let client = make_client("https://checkpoint.example.com/v1");
        let params = ReportParams {
            signature: "sig".into(),
            product: "prod".into(),
            ..Default::default()
        };

        let request = client.report_request(&params).unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert!(request.url().path().ends_with("/telemetry/prod"));

        let body = request.body().and_then(reqwest::Body::as_bytes).unwrap();
        let decoded: ReportParams = serde_json::from_slice(body).unwrap();
        assert_eq!(decoded.signature, "sig");
        assert_eq!(decoded.product, "prod");
        assert_eq!(decoded.os, local_os());
        assert_eq!(decoded.arch, local_arch());
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let client = make_client("https://checkpoint.example.com/v1/");
        let params = ReportParams {
            product: "prod".into(),
            ..Default::default()
        };

        let request = client.report_request(&params).unwrap();

        assert_eq!(request.url().path(), "/v1/telemetry/prod");
    }

    #[test]
    fn test_check_url_carries_params() {
        let client = make_client("http://127.0.0.1:4000");
        let params = CheckParams::new("gloo", "1.0.0")
            .with_signature("abc")
            .with_kind("c1");

        let url = client.check_url(&params).unwrap();

        assert_eq!(url.path(), "/check/gloo");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("version".into(), "1.0.0".into())));
        assert!(pairs.contains(&("signature".into(), "abc".into())));
        assert!(pairs.contains(&("type".into(), "c1".into())));
        assert!(pairs.contains(&("os".into(), local_os().into())));
    }

    #[test]
    fn test_check_url_omits_empty_signature() {
        let client = make_client("http://127.0.0.1:4000");

        let url = client.check_url(&CheckParams::new("gloo", "1.0.0")).unwrap();

        assert!(!url.query_pairs().any(|(k, _)| k == "signature" || k == "type"));
    }

    #[test]
    fn test_rejects_invalid_endpoint() {
        let client = make_client("not a url");
        assert!(matches!(
            client.report_request(&ReportParams::default()),
            Err(Error::UrlParse(_))
        ));

        let client = make_client("mailto:ops@example.com");
        assert!(matches!(
            client.report_request(&ReportParams::default()),
            Err(Error::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_disabled_check_is_inert() {
        let tmp = TempDir::new().unwrap();
        let cache_file = tmp.path().join("nested").join("cache");
        let config = CheckpointConfig::disabled().with_endpoint("http://127.0.0.1:9");
        let client = Checkpoint::new(config).unwrap();

        let params = CheckParams::new("test", "1.0").with_cache_file(&cache_file);
        let resp = client.check(&params).await.unwrap();

        assert_eq!(resp, CheckResponse::default());
        assert!(!cache_file.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_disabled_report_is_inert() {
        let tmp = TempDir::new().unwrap();
        let sig_file = tmp.path().join("prod.sig");
        let config = CheckpointConfig::disabled().with_endpoint("http://127.0.0.1:9");
        let client = Checkpoint::new(config).unwrap();

        let params = ReportParams {
            product: "prod".into(),
            signature_file: Some(sig_file.clone()),
            ..Default::default()
        };

        assert!(client.report(&params).await.is_ok());
        assert!(!sig_file.exists());
    }
}
