//! External object storage access.
//!
//! The config resolver only needs one operation: fetch an object's full
//! content as text. It is kept behind a trait so invocations can be tested
//! without AWS credentials; the production implementation is a thin wrapper
//! over the S3 SDK, bound to one (bucket, key) pair at construction.

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use tracing::debug;

use crate::error::Error;

/// Read-only access to one stored object.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Fetches the full object content as UTF-8 text.
    async fn get_as_string(&self) -> Result<String, Error>;
}

/// S3-backed [`ObjectStorage`].
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket_name: String,
    object_key: String,
}

impl S3Storage {
    #[must_use]
    pub fn new(client: S3Client, bucket_name: String, object_key: String) -> Self {
        S3Storage {
            client,
            bucket_name,
            object_key,
        }
    }

    /// Builds a client from the ambient AWS environment.
    pub async fn from_env(bucket_name: String, object_key: String) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        S3Storage::new(S3Client::new(&sdk_config), bucket_name, object_key)
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn get_as_string(&self) -> Result<String, Error> {
        debug!(
            bucket_name = %self.bucket_name,
            object_key = %self.object_key,
            "get_as_string"
        );

        let object = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(&self.object_key)
            .send()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        let bytes = object
            .body
            .collect()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
            .into_bytes();

        String::from_utf8(bytes.to_vec()).map_err(|e| Error::Storage(e.to_string()))
    }
}
