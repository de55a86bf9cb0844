//! Request and response bodies of the storage service's `/download` and
//! `/upload` endpoints.

use serde::{Deserialize, Serialize};

/// Body of `POST /download`: fetch `url` onto the shared filesystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
}

/// Local path the downloaded image was written to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub path: String,
}

/// Body of `POST /upload`: publish `file_path` under `file_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub file_path: String,
    pub file_name: String,
}

/// Public locator of the uploaded artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
}
