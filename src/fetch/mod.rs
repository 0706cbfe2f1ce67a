//! Download CSV objects from the bucket into a request-scoped temp file.

use anyhow::{anyhow, Result};
use futures::StreamExt;
use object_store::{aws::AmazonS3Builder, path::Path as ObjectPath, ObjectStore};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use crate::config::S3Config;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{0}")]
    InvalidKey(String),

    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },

    #[error("access denied reading `{key}` from bucket `{bucket}`: {message}")]
    AccessDenied {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("failed to download `{key}`: {message}")]
    TransientIo { key: String, message: String },
}

/// A downloaded object living in a temp file. The file is removed when this is dropped.
#[derive(Debug)]
pub struct StagedObject {
    file: NamedTempFile,
    bytes: u64,
}

impl StagedObject {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn len(&self) -> u64 {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }
}

/// Fetches objects from one bucket and stages them on local disk.
#[derive(Clone)]
pub struct ObjectFetcher {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    staging_dir: PathBuf,
}

impl ObjectFetcher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            staging_dir: staging_dir.into(),
        }
    }

    /// Build a fetcher backed by S3 using static credentials.
    pub fn s3(config: &S3Config, staging_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_region(&config.region)
            .with_bucket_name(&config.bucket)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key);

        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| anyhow!("failed to build S3 object store: {}", e))?;

        Ok(Self::new(Arc::new(store), &config.bucket, staging_dir))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Download `key` into a fresh temp file under the staging directory.
    #[instrument(level = "info", skip(self), fields(bucket = %self.bucket))]
    pub async fn stage(&self, key: &str) -> Result<StagedObject, FetchError> {
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return Err(FetchError::InvalidKey("file_path must not be empty".into()));
        }
        let location = ObjectPath::parse(key)
            .map_err(|e| FetchError::InvalidKey(format!("invalid file_path `{}`: {}", key, e)))?;

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| self.classify(key, e))?;

        // Nothing touches the disk until the object is known to exist.
        let tmp = tempfile::Builder::new()
            .prefix("csvsync-")
            .suffix(".csv")
            .tempfile_in(&self.staging_dir)
            .map_err(|e| self.io_error(key, e))?;
        let handle = tmp.reopen().map_err(|e| self.io_error(key, e))?;
        let mut out = tokio::fs::File::from_std(handle);

        let mut bytes = 0u64;
        let mut stream = result.into_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.classify(key, e))?;
            out.write_all(&chunk)
                .await
                .map_err(|e| self.io_error(key, e))?;
            bytes += chunk.len() as u64;
        }
        out.flush().await.map_err(|e| self.io_error(key, e))?;

        debug!(path = %tmp.path().display(), "staged");
        info!(bytes, "downloaded {}", key);

        Ok(StagedObject { file: tmp, bytes })
    }

    fn classify(&self, key: &str, err: object_store::Error) -> FetchError {
        match err {
            object_store::Error::NotFound { .. } => FetchError::NotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            },
            e @ (object_store::Error::PermissionDenied { .. }
            | object_store::Error::Unauthenticated { .. }) => FetchError::AccessDenied {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                message: e.to_string(),
            },
            other => FetchError::TransientIo {
                key: key.to_string(),
                message: other.to_string(),
            },
        }
    }

    fn io_error(&self, key: &str, err: std::io::Error) -> FetchError {
        FetchError::TransientIo {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}
