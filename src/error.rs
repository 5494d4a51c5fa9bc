use std::path::PathBuf;
use thiserror::Error;

/// Failures the streaming loop knows how to recover from (or report at startup).
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Cannot list media directory {}", path.display())]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch encoder `{program}`")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for encoder exit")]
    Wait {
        #[source]
        source: std::io::Error,
    },

    #[error("Encoder `{program}` is not usable: {reason}")]
    EncoderUnavailable { program: String, reason: String },
}

impl StreamError {
    /// Short, stable name used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamError::DirectoryUnreadable { .. } => "directory-unreadable",
            StreamError::Launch { .. } => "launch",
            StreamError::Wait { .. } => "wait",
            StreamError::EncoderUnavailable { .. } => "encoder-unavailable",
        }
    }
}
