use thiserror::Error;

use crate::state_machine::JobStatus;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum AnimatorError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Corrupt job record {id}: {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("Job already exists: {0}")]
    DuplicateJob(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Download failed: {0}")]
    DownloadFailed(#[source] StorageError),

    #[error("Upload failed: {0}")]
    UploadFailed(#[source] StorageError),

    #[error("All {attempted} fallback tiers failed")]
    AllTiersFailed { attempted: usize },

    #[error("Processing cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AnimatorError {
    pub(crate) fn corrupt(id: &str, reason: impl Into<String>) -> Self {
        AnimatorError::CorruptRecord {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = AnimatorError::NotFound("abc".into());
        assert_eq!(err.to_string(), "Job not found: abc");
    }

    #[test]
    fn transition_display_uses_wire_names() {
        let err = AnimatorError::InvalidTransition {
            id: "j1".into(),
            from: JobStatus::Completed,
            to: JobStatus::Processing,
        };
        assert_eq!(err.to_string(), "Job j1 cannot move from completed to processing");
    }

    #[test]
    fn download_failure_keeps_source() {
        use std::error::Error as _;

        let err = AnimatorError::DownloadFailed(StorageError::ApiError {
            status: 502,
            message: "bad gateway".into(),
        });
        assert!(err.source().is_some());
        assert_eq!(
            err.to_string(),
            "Download failed: storage returned status 502: bad gateway"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AnimatorError>();
    }
}
