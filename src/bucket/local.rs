//! Filesystem-backed bucket.
//!
//! Objects are stored in a sharded directory structure, each with a JSON
//! sidecar describing it:
//! ```text
//! {root}/
//! ├── Ab/
//! │   ├── Ab3xK9pQ2mZ
//! │   └── Ab3xK9pQ2mZ.info
//! └── ...
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;
use url::Url;

use super::{BucketObject, FileBucket, Operation, SignedPayload};
use crate::config::StorageConfig;
use crate::{ArborError, Result};

const INFO_SUFFIX: &str = ".info";

/// Sidecar metadata written next to each object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectInfo {
    pub content_type: String,
    pub content_length: u64,
    pub last_modified: DateTime<Utc>,
}

/// An object read back from disk.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub info: ObjectInfo,
    pub body: Vec<u8>,
}

/// Bucket storing objects on the local filesystem and signing URLs for
/// arbor's own `/file` endpoint.
#[derive(Debug, Clone)]
pub struct LocalBucket {
    root: PathBuf,
    public_url: Url,
    expires: Duration,
}

impl LocalBucket {
    /// Create a bucket rooted at `root`.
    ///
    /// The root directory will be created if it doesn't exist.
    pub fn new(root: impl Into<PathBuf>, public_url: &str, expires: Duration) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let public_url = Url::parse(public_url)
            .map_err(|e| ArborError::Config(format!("invalid public_url '{public_url}': {e}")))?;

        Ok(Self {
            root,
            public_url,
            expires,
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::new(
            &config.local_path,
            &config.public_url,
            config.signed_url_expires(),
        )
    }

    /// Path of the object stored under `key`.
    ///
    /// Keys arrive in forgeable tokens, so anything that could escape the
    /// root is rejected.
    pub fn object_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\', '\0']);
        if !valid {
            return Err(ArborError::Validation(format!("invalid object key '{key}'")));
        }
        Ok(self.root.join(Self::shard(key)).join(key))
    }

    fn info_path(&self, key: &str) -> Result<PathBuf> {
        let mut path = self.object_path(key)?.into_os_string();
        path.push(INFO_SUFFIX);
        Ok(PathBuf::from(path))
    }

    /// First 2 characters of the key.
    fn shard(key: &str) -> &str {
        match key.char_indices().nth(2) {
            Some((end, _)) => &key[..end],
            None => key,
        }
    }

    /// Write an object and its sidecar.
    pub async fn write_object(&self, key: &str, object: &BucketObject) -> Result<ObjectInfo> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &object.body).await?;

        let info = ObjectInfo {
            content_type: object.content_type.clone(),
            content_length: object.body.len() as u64,
            last_modified: Utc::now(),
        };
        let json = serde_json::to_vec(&info)
            .map_err(|e| ArborError::StoreUnavailable(format!("sidecar encode error: {e}")))?;
        fs::write(self.info_path(key)?, json).await?;

        debug!("Stored object {} ({} bytes)", key, info.content_length);
        Ok(info)
    }

    /// Read an object and its sidecar.
    pub async fn read_object(&self, key: &str) -> Result<StoredObject> {
        let body = match fs::read(self.object_path(key)?).await {
            Ok(body) => body,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ArborError::NotFound(format!("object {key}")))
            }
            Err(e) => return Err(e.into()),
        };

        let info = match fs::read(self.info_path(key)?).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .map_err(|e| ArborError::StoreUnavailable(format!("sidecar decode error: {e}")))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => ObjectInfo {
                content_type: "application/octet-stream".to_string(),
                content_length: body.len() as u64,
                last_modified: Utc::now(),
            },
            Err(e) => return Err(e.into()),
        };

        Ok(StoredObject { info, body })
    }

    /// Remove an object and its sidecar.
    ///
    /// Returns `true` if the object existed.
    pub async fn remove_object(&self, key: &str) -> Result<bool> {
        let existed = remove_if_present(&self.object_path(key)?).await?;
        remove_if_present(&self.info_path(key)?).await?;
        Ok(existed)
    }
}

async fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl FileBucket for LocalBucket {
    async fn get_signed_url(&self, operation: Operation, key: &str) -> Result<String> {
        SignedPayload::issue(operation, key, self.expires).to_url(&self.public_url)
    }

    async fn save_file(&self, key: &str, object: BucketObject) -> Result<String> {
        self.write_object(key, &object).await?;
        self.get_signed_url(Operation::Get, key).await
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        if !self.remove_object(key).await? {
            debug!("Object {} was already absent", key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalBucket) {
        let temp_dir = TempDir::new().unwrap();
        let bucket = LocalBucket::new(
            temp_dir.path(),
            "http://localhost:4000/file",
            Duration::from_secs(900),
        )
        .unwrap();
        (temp_dir, bucket)
    }

    #[test]
    fn test_object_path_sharding() {
        let (_temp, bucket) = setup();
        let path = bucket.object_path("Ab3xK9pQ2mZ").unwrap();
        assert!(path.ends_with("Ab/Ab3xK9pQ2mZ"));
    }

    #[test]
    fn test_object_path_rejects_traversal() {
        let (_temp, bucket) = setup();
        for key in ["", "..", "../etc", "a/b", "a\\b"] {
            assert!(bucket.object_path(key).is_err(), "{key:?} should be rejected");
        }
    }

    #[tokio::test]
    async fn test_save_and_read() {
        let (_temp, bucket) = setup();
        let url = bucket
            .save_file("Ab3xK9pQ2mZ", BucketObject::new(b"hello".to_vec(), "text/plain"))
            .await
            .unwrap();

        let payload = SignedPayload::from_url(&url).unwrap();
        assert_eq!(payload.validate(Operation::Get).unwrap(), "Ab3xK9pQ2mZ");

        let stored = bucket.read_object("Ab3xK9pQ2mZ").await.unwrap();
        assert_eq!(stored.body, b"hello");
        assert_eq!(stored.info.content_type, "text/plain");
        assert_eq!(stored.info.content_length, 5);
    }

    #[tokio::test]
    async fn test_sidecar_shape() {
        let (_temp, bucket) = setup();
        bucket
            .write_object("k1", &BucketObject::new(b"abc".to_vec(), "image/png"))
            .await
            .unwrap();

        let raw = std::fs::read(bucket.info_path("k1").unwrap()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["ContentType"], "image/png");
        assert_eq!(json["ContentLength"], 3);
        assert!(json["LastModified"].is_string());
    }

    #[tokio::test]
    async fn test_read_missing() {
        let (_temp, bucket) = setup();
        let result = bucket.read_object("missing").await;
        assert!(matches!(result, Err(ArborError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_object() {
        let (_temp, bucket) = setup();
        bucket
            .write_object("k2", &BucketObject::new(b"x".to_vec(), "text/plain"))
            .await
            .unwrap();

        bucket.delete_object("k2").await.unwrap();
        assert!(!bucket.object_path("k2").unwrap().exists());
        assert!(!bucket.info_path("k2").unwrap().exists());

        // Deleting again is not an error.
        bucket.delete_object("k2").await.unwrap();
    }

    #[tokio::test]
    async fn test_signed_put_url() {
        let (_temp, bucket) = setup();
        let url = bucket.get_signed_url(Operation::Put, "k3").await.unwrap();
        let payload = SignedPayload::from_url(&url).unwrap();
        assert_eq!(payload.operation, Operation::Put);
        assert_eq!(payload.key, "k3");
    }
}
