//! Errors raised while talking to the storage service.

use thiserror::Error;

/// Failures of a single storage request.
///
/// - [`ApiError`](StorageError::ApiError): the service answered with a non-2xx status
/// - [`NetworkError`](StorageError::NetworkError): connection, timeout or body decoding failure
#[derive(Debug, Error)]
pub enum StorageError {
    /// Any non-success HTTP status, with the response body as the message.
    #[error("storage returned status {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = StorageError::ApiError {
            status: 404,
            message: "image not reachable".into(),
        };
        assert_eq!(err.to_string(), "storage returned status 404: image not reachable");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StorageError>();
    }
}
