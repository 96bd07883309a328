//! Test discovery: turn a path into new sequence elements.
//!
//! The strategy is picked by [`TestType`]: plain Python scripts are wrapped
//! as-is, pytest and Robot Framework files are handed to the external
//! [`DiscoveryService`]. The service response is validated before any element
//! is created, so a failed discovery never produces partial output.

pub mod service;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{SequencerError, SequencerResult};
use crate::sequence::{TestSequenceElement, TestType};

pub use service::HttpDiscoveryService;

/// One test found by the discovery service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredTest {
    pub test_name: String,
    pub path: PathBuf,
}

/// Raw answer of the discovery service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResponse {
    #[serde(default)]
    pub response: Vec<DiscoveredTest>,
    #[serde(default)]
    pub missing_libraries: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl DiscoveryResponse {
    /// The path itself as the only test.
    pub fn inline(path: &Path) -> Self {
        Self {
            response: vec![DiscoveredTest {
                test_name: path.display().to_string(),
                path: path.to_path_buf(),
            }],
            missing_libraries: Vec::new(),
            error: None,
        }
    }
}

/// How discovered tests are imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSettings {
    pub import_type: TestType,
    /// Collapse every test under the path into a single element.
    pub import_as_one_ref: bool,
}

impl ImportSettings {
    pub fn new(import_type: TestType) -> Self {
        Self {
            import_type,
            import_as_one_ref: false,
        }
    }

    pub fn as_one_ref(mut self, one_ref: bool) -> Self {
        self.import_as_one_ref = one_ref;
        self
    }
}

/// External service that parses pytest and Robot Framework files.
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    async fn discover(
        &self,
        kind: TestType,
        path: &Path,
        import_as_one_ref: bool,
    ) -> SequencerResult<DiscoveryResponse>;
}

/// Runs the discovery strategy for a path and maps the result to elements.
#[derive(Clone)]
pub struct TestDiscoverer {
    service: Arc<dyn DiscoveryService>,
}

impl TestDiscoverer {
    pub fn new(service: Arc<dyn DiscoveryService>) -> Self {
        Self { service }
    }

    /// Discover tests under `path` with the given settings.
    pub async fn discover(
        &self,
        path: &Path,
        settings: ImportSettings,
    ) -> SequencerResult<Vec<TestSequenceElement>> {
        let response = match settings.import_type {
            TestType::Python => DiscoveryResponse::inline(path),
            TestType::Pytest | TestType::RobotFramework => self
                .service
                .discover(settings.import_type, path, settings.import_as_one_ref)
                .await
                .map_err(|err| match err {
                    SequencerError::Transport(msg) => SequencerError::Discovery(msg),
                    other => other,
                })?,
        };
        into_elements(response, settings)
    }

    /// Discover with the strategy implied by the file extension, one element
    /// per test.
    pub async fn discover_by_extension(
        &self,
        path: &Path,
    ) -> SequencerResult<Vec<TestSequenceElement>> {
        let settings = ImportSettings::new(TestType::from_extension(path));
        self.discover(path, settings).await
    }
}

/// Validate a discovery response and build pending elements from it.
pub fn into_elements(
    response: DiscoveryResponse,
    settings: ImportSettings,
) -> SequencerResult<Vec<TestSequenceElement>> {
    if let Some(error) = response.error {
        warn!(%error, "discovery service reported an error");
        return Err(SequencerError::Discovery(error));
    }
    if !response.missing_libraries.is_empty() {
        warn!(missing = ?response.missing_libraries, "discovery needs missing libraries");
        return Err(SequencerError::MissingDependency(response.missing_libraries));
    }
    if response.response.is_empty() {
        return Err(SequencerError::NoTestsFound);
    }

    let per_test_args =
        settings.import_type == TestType::RobotFramework && !settings.import_as_one_ref;
    let elements: Vec<TestSequenceElement> = response
        .response
        .into_iter()
        .map(|test| {
            let args = per_test_args.then(|| vec![test.test_name.clone()]);
            let mut elem =
                TestSequenceElement::new(test.test_name, test.path, settings.import_type);
            elem.args = args;
            elem
        })
        .collect();
    debug!(count = elements.len(), kind = %settings.import_type, "discovered tests");
    Ok(elements)
}
