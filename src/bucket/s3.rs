//! S3-compatible bucket.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ClientOptions, ObjectStore, PutOptions, PutPayload};
use tracing::{debug, info};

use super::{BucketObject, FileBucket, Operation};
use crate::config::StorageConfig;
use crate::{ArborError, Result};

/// Bucket backed by S3 (or MinIO and friends), signing with the provider's
/// presigned-URL scheme.
#[derive(Debug)]
pub struct S3Bucket {
    store: AmazonS3,
    expires: Duration,
}

impl S3Bucket {
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        if config.bucket.is_empty() {
            return Err(ArborError::Config("s3 backend requires a bucket".to_string()));
        }

        info!("Using S3 bucket {} in {}", config.bucket, config.region);

        let client_options = ClientOptions::new().with_timeout(Duration::from_secs(30));
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_client_options(client_options);

        if !config.access_key_id.is_empty() {
            builder = builder.with_access_key_id(&config.access_key_id);
        }
        if !config.secret_access_key.is_empty() {
            builder = builder.with_secret_access_key(&config.secret_access_key);
        }
        if let Some(endpoint) = config.endpoint.as_deref().filter(|e| !e.is_empty()) {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| ArborError::Config(format!("failed to build S3 store: {e}")))?;

        Ok(Self {
            store,
            expires: config.signed_url_expires(),
        })
    }
}

fn method(operation: Operation) -> Method {
    match operation {
        Operation::Get => Method::GET,
        Operation::Put => Method::PUT,
    }
}

#[async_trait]
impl FileBucket for S3Bucket {
    async fn get_signed_url(&self, operation: Operation, key: &str) -> Result<String> {
        let url = self
            .store
            .signed_url(method(operation), &Path::from(key), self.expires)
            .await?;
        Ok(url.to_string())
    }

    async fn save_file(&self, key: &str, object: BucketObject) -> Result<String> {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, object.content_type.into());
        let options = PutOptions {
            attributes,
            ..PutOptions::default()
        };

        self.store
            .put_opts(&Path::from(key), PutPayload::from(object.body), options)
            .await?;
        debug!("Uploaded object {}", key);

        self.get_signed_url(Operation::Get, key).await
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.store.delete(&Path::from(key)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;

    fn config() -> StorageConfig {
        StorageConfig {
            backend: StorageBackend::S3,
            bucket: "arbor-test".to_string(),
            region: "us-east-1".to_string(),
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            ..StorageConfig::default()
        }
    }

    #[test]
    fn test_requires_bucket() {
        let config = StorageConfig {
            bucket: String::new(),
            ..config()
        };
        assert!(matches!(
            S3Bucket::from_config(&config),
            Err(ArborError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_presigned_urls_are_local() {
        let bucket = S3Bucket::from_config(&config()).unwrap();

        let url = bucket.get_signed_url(Operation::Put, "Ab3xK9pQ2mZ").await.unwrap();
        assert!(url.contains("arbor-test"));
        assert!(url.contains("Ab3xK9pQ2mZ"));
        assert!(url.contains("X-Amz-Signature="));
        assert!(url.contains("X-Amz-Expires=900"));
    }
}
