pub mod client;
pub mod error;
pub mod types;

pub use client::{DEFAULT_STORAGE_URL, HttpStorageClient, StorageClient};
pub use error::StorageError;
