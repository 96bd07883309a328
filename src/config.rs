//! Sequencer configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `TJOY_*` environment variables (for example `TJOY_DISCOVERY_URL`).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SequencerResult;
use crate::permission::Role;

/// Prefix of environment variables read by [`SequencerConfig::load`].
pub const ENV_PREFIX: &str = "TJOY";

/// Default address of the local discovery service.
pub const DEFAULT_DISCOVERY_URL: &str = "http://127.0.0.1:5392";

/// Default address of the execution backend.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5392/ts";

/// Default bound of the outbound backend queue.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

/// Extension of persisted sequence files.
pub const DEFAULT_SEQUENCE_EXTENSION: &str = "tjoy";

/// Runtime configuration of the sequencer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencerConfig {
    /// Base URL of the test discovery service.
    pub discovery_url: String,
    /// URL the backend channel posts messages to.
    pub backend_url: String,
    /// Maximum number of queued outbound backend messages.
    pub outbound_capacity: usize,
    /// Extension of sequence files, without the dot.
    pub sequence_extension: String,
    /// HTTP timeout in seconds (0 leaves timeouts to the remote service).
    pub request_timeout_secs: u64,
    /// Role assumed by the command line tool.
    pub role: Role,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            discovery_url: DEFAULT_DISCOVERY_URL.to_string(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            sequence_extension: DEFAULT_SEQUENCE_EXTENSION.to_string(),
            request_timeout_secs: 0,
            role: Role::Admin,
        }
    }
}

impl SequencerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load defaults, then `path` (if given), then environment overrides.
    pub fn load(path: Option<&Path>) -> SequencerResult<Self> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("discovery_url", defaults.discovery_url)?
            .set_default("backend_url", defaults.backend_url)?
            .set_default("outbound_capacity", defaults.outbound_capacity as i64)?
            .set_default("sequence_extension", defaults.sequence_extension)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs as i64)?
            .set_default("role", defaults.role.as_str())?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let settings = builder.build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn with_discovery_url(mut self, url: impl Into<String>) -> Self {
        self.discovery_url = url.into();
        self
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    /// Capacity is at least 1.
    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// `None` when no client-side timeout applies.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}
