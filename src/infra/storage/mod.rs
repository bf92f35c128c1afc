//! Object storage for published renders.

mod memory;
mod oss;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use memory::{InMemoryObjectStore, StoredObject};
pub use oss::{OssBucket, OssCredentials};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to sign request: {0}")]
    Signing(String),
    #[error("object store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("object store rejected `{key}` with status {status}: {body}")]
    Rejected {
        key: String,
        status: u16,
        body: String,
    },
    #[error("invalid object store endpoint {0}")]
    Endpoint(String),
    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

/// A bucket that accepts uploads and serves them under public URLs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str)
    -> Result<(), StorageError>;

    /// Public URL under which `key` is served once uploaded.
    fn public_url(&self, key: &str) -> String;
}
