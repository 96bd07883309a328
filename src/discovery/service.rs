//! HTTP client for the local test discovery service.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use super::{DiscoveryResponse, DiscoveryService};
use crate::config::SequencerConfig;
use crate::error::{SequencerError, SequencerResult};
use crate::sequence::TestType;

/// Talks to the discovery endpoints of the local backend:
/// `GET {base}/discover/pytest/` and `GET {base}/discover/robot/`.
#[derive(Debug, Clone)]
pub struct HttpDiscoveryService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDiscoveryService {
    pub fn new(config: &SequencerConfig) -> SequencerResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: config.discovery_url.trim_end_matches('/').to_string(),
        })
    }

    /// Endpoint serving a discovery kind. Plain Python needs no service.
    pub fn endpoint(&self, kind: TestType) -> SequencerResult<String> {
        let route = match kind {
            TestType::Pytest => "pytest",
            TestType::RobotFramework => "robot",
            TestType::Python => {
                return Err(SequencerError::Discovery(
                    "python scripts are not discovered remotely".to_string(),
                ))
            }
        };
        Ok(format!("{}/discover/{}/", self.base_url, route))
    }
}

#[async_trait]
impl DiscoveryService for HttpDiscoveryService {
    async fn discover(
        &self,
        kind: TestType,
        path: &Path,
        import_as_one_ref: bool,
    ) -> SequencerResult<DiscoveryResponse> {
        let url = self.endpoint(kind)?;
        let path_str = path.display().to_string();
        debug!(%url, path = %path_str, import_as_one_ref, "requesting test discovery");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("path", path_str.as_str()),
                ("oneFile", if import_as_one_ref { "true" } else { "false" }),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SequencerError::Discovery(format!(
                "discovery service returned {status}: {body}"
            )));
        }
        Ok(response.json::<DiscoveryResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_per_kind() {
        let config = SequencerConfig::new().with_discovery_url("http://localhost:5392/");
        let service = HttpDiscoveryService::new(&config).expect("client");
        assert_eq!(
            service.endpoint(TestType::Pytest).expect("pytest"),
            "http://localhost:5392/discover/pytest/"
        );
        assert_eq!(
            service.endpoint(TestType::RobotFramework).expect("robot"),
            "http://localhost:5392/discover/robot/"
        );
        assert!(service.endpoint(TestType::Python).is_err());
    }

    #[test]
    fn test_response_parses_service_shape() {
        let raw = r#"{
            "response": [{"testName": "test_add", "path": "tests/test_math.py"}],
            "missingLibraries": [],
            "error": null
        }"#;
        let parsed: DiscoveryResponse = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed.response.len(), 1);
        assert_eq!(parsed.response[0].test_name, "test_add");
        assert!(parsed.error.is_none());
    }
}
