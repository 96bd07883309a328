//! Error taxonomy for sequence orchestration.
//!
//! Every fallible operation returns [`SequencerResult`]. Errors are turned into
//! user-facing notifications at the outermost boundary (the CLI or an embedding
//! UI) through [`SequencerError::user_message`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::sequence::TreeError;

/// Messages longer than this are summarised for notifications.
pub const MAX_NOTIFICATION_LEN: usize = 100;

/// Errors surfaced by the sequencer.
#[derive(Error, Debug)]
pub enum SequencerError {
    /// The discovery service reported a transport or parse failure.
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Discovery needs Python libraries that are not installed.
    #[error("Missing Python libraries: {}. Please retry after installing the missing libraries.", .0.join(", "))]
    MissingDependency(Vec<String>),

    /// Discovery succeeded but found nothing to import.
    #[error("No tests were found in the specified file.")]
    NoTestsFound,

    /// A `.tjoy` document could not be parsed.
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error outside of `.tjoy` parsing.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Structural edit of a sequence tree failed.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// The operation requires the admin role.
    #[error("Not permitted: {0}")]
    PermissionDenied(String),

    /// HTTP or channel failure talking to an external service.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// An operation needed an active sequence and there is none.
    #[error("No active sequence")]
    NoProject,

    /// A named sequence, element or directory does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation was abandoned before touching any state.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl SequencerError {
    /// Text suitable for a short notification.
    ///
    /// Long messages are replaced by a generic summary; the full text is still
    /// available through `Display`.
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.chars().count() > MAX_NOTIFICATION_LEN {
            match self {
                SequencerError::Discovery(_) | SequencerError::Transport(_) => {
                    "Failed to discover tests due to an unexpected error.".to_string()
                }
                _ => "The operation failed. See details for more information.".to_string(),
            }
        } else {
            message
        }
    }

    /// Whether the user can fix the cause and simply retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SequencerError::MissingDependency(_)
                | SequencerError::NoTestsFound
                | SequencerError::Cancelled(_)
        )
    }
}

impl From<reqwest::Error> for SequencerError {
    fn from(err: reqwest::Error) -> Self {
        SequencerError::Transport(err.to_string())
    }
}

/// Result type for sequencer operations.
pub type SequencerResult<T> = Result<T, SequencerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dependency_lists_libraries() {
        let err = SequencerError::MissingDependency(vec!["numpy".into(), "scipy".into()]);
        let message = err.to_string();
        assert!(message.contains("numpy, scipy"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_user_message_summarises_long_discovery_errors() {
        let err = SequencerError::Discovery("x".repeat(200));
        assert_eq!(
            err.user_message(),
            "Failed to discover tests due to an unexpected error."
        );
    }

    #[test]
    fn test_user_message_keeps_short_messages() {
        let err = SequencerError::NoTestsFound;
        assert_eq!(
            err.user_message(),
            "No tests were found in the specified file."
        );
        assert!(!SequencerError::NoProject.is_recoverable());
    }
}
