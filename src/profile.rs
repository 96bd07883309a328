//! Test profiles and dependency remediation.
//!
//! A test profile is a git repository holding the `.tjoy` sequences of a
//! station. Installing it yields the checked-out commit and the directory the
//! sequences live in.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SequencerConfig;
use crate::error::{SequencerError, SequencerResult};

/// Result of installing a test profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledProfile {
    /// Commit the profile was checked out at.
    pub hash: String,
    /// Directory containing the profile's sequence files.
    pub profile_root: PathBuf,
}

/// Checks out a test profile repository.
#[async_trait]
pub trait ProfileInstaller: Send + Sync {
    async fn install_profile(&self, git_url: &str) -> SequencerResult<InstalledProfile>;
}

/// Installs a Python library that discovery reported as missing.
#[async_trait]
pub trait DependencyInstaller: Send + Sync {
    async fn install_dependency(&self, name: &str) -> SequencerResult<()>;
}

/// Profile installer backed by the local service:
/// `GET {base}/test_profile/install/?url=<git url>`.
#[derive(Debug, Clone)]
pub struct HttpProfileInstaller {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProfileInstaller {
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

    pub fn endpoint(&self) -> String {
        format!("{}/test_profile/install/", self.base_url)
    }
}

#[async_trait]
impl ProfileInstaller for HttpProfileInstaller {
    async fn install_profile(&self, git_url: &str) -> SequencerResult<InstalledProfile> {
        let url = self.endpoint();
        debug!(%url, git_url, "installing test profile");
        let response = self
            .client
            .get(&url)
            .query(&[("url", git_url)])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SequencerError::Transport(format!(
                "profile install returned {status}: {body}"
            )));
        }
        Ok(response.json::<InstalledProfile>().await?)
    }
}
