use async_trait::async_trait;
use tracing::debug;

use super::BackendMessage;
use crate::config::SequencerConfig;
use crate::error::{SequencerError, SequencerResult};

/// Delivers one outbound message to the backend.
#[async_trait]
pub trait BackendTransport: Send + Sync {
    async fn deliver(&self, message: &BackendMessage) -> SequencerResult<()>;
}

/// Posts messages as JSON to the configured backend URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(config: &SequencerConfig) -> SequencerResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            url: config.backend_url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl BackendTransport for HttpTransport {
    async fn deliver(&self, message: &BackendMessage) -> SequencerResult<()> {
        debug!(url = %self.url, kind = message.kind(), "posting backend message");
        let response = self.client.post(&self.url).json(message).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SequencerError::Transport(format!(
                "backend rejected {}: {status}",
                message.kind()
            )));
        }
        Ok(())
    }
}
