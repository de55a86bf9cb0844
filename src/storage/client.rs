use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::StorageError;
use super::types::{DownloadRequest, DownloadResponse, UploadRequest, UploadResponse};

pub const DEFAULT_STORAGE_URL: &str = "http://storage-service:3002";

/// Download/upload primitives of the storage service.
pub trait StorageClient: Send + Sync + 'static {
    /// Fetch `url` and return the local path it was written to.
    fn download(&self, url: &str) -> impl Future<Output = Result<PathBuf, StorageError>> + Send;

    /// Publish the local file at `file_path` as `file_name`, returning its public URL.
    fn upload(
        &self,
        file_path: &Path,
        file_name: &str,
    ) -> impl Future<Output = Result<String, StorageError>> + Send;
}

pub struct HttpStorageClient {
    client: Client,
    base_url: String,
}

impl HttpStorageClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, StorageError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T, StorageError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(%url, "storage request");
        let response = self.client.post(&url).json(body).send().await?;
        let response = check_status(response).await?;
        Ok(response.json::<T>().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(StorageError::ApiError {
        status: status.as_u16(),
        message,
    })
}

impl StorageClient for HttpStorageClient {
    async fn download(&self, url: &str) -> Result<PathBuf, StorageError> {
        let req = DownloadRequest {
            url: url.to_string(),
        };
        let resp: DownloadResponse = self.post("download", &req).await?;
        Ok(PathBuf::from(resp.path))
    }

    async fn upload(&self, file_path: &Path, file_name: &str) -> Result<String, StorageError> {
        let req = UploadRequest {
            file_path: file_path.to_string_lossy().into_owned(),
            file_name: file_name.to_string(),
        };
        let resp: UploadResponse = self.post("upload", &req).await?;
        Ok(resp.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn download_posts_url_and_returns_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/download"))
            .and(body_json(serde_json::json!({ "url": "http://x/cat.png" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "path": "/tmp/cat.png" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpStorageClient::new(server.uri()).unwrap();
        let local = client.download("http://x/cat.png").await.unwrap();
        assert_eq!(local, PathBuf::from("/tmp/cat.png"));
    }

    #[tokio::test]
    async fn upload_posts_camel_case_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(body_json(serde_json::json!({
                "filePath": "/tmp/cat.png.mp4",
                "fileName": "animated_j1.mp4"
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({ "url": "http://cdn/animated_j1.mp4" })),
            )
            .mount(&server)
            .await;

        let client = HttpStorageClient::new(format!("{}/", server.uri())).unwrap();
        let url = client
            .upload(Path::new("/tmp/cat.png.mp4"), "animated_j1.mp4")
            .await
            .unwrap();
        assert_eq!(url, "http://cdn/animated_j1.mp4");
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/download"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream unreachable"))
            .mount(&server)
            .await;

        let client = HttpStorageClient::new(server.uri()).unwrap();
        let err = client.download("http://x/cat.png").await.unwrap_err();
        match err {
            StorageError::ApiError { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream unreachable");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = HttpStorageClient::new(server.uri()).unwrap();
        let err = client
            .upload(Path::new("/tmp/a.mp4"), "a.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NetworkError(_)));
    }

    #[tokio::test]
    async fn unreachable_service_is_network_error() {
        let client = HttpStorageClient::new("http://127.0.0.1:1").unwrap();
        let err = client.download("http://x/cat.png").await.unwrap_err();
        assert!(matches!(err, StorageError::NetworkError(_)));
    }
}
