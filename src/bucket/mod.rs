//! Object storage for arbor.
//!
//! File content never passes through the metadata engine. Callers receive a
//! short-lived signed URL and move bytes out of band against one of two
//! backends:
//! - [`LocalBucket`]: files on disk, served by arbor's own `/file` endpoint
//! - [`S3Bucket`]: an S3-compatible bucket with native presigned URLs

mod local;
mod s3;
mod signed;

pub use local::{LocalBucket, ObjectInfo, StoredObject};
pub use s3::S3Bucket;
pub use signed::SignedPayload;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Default lifetime of a signed URL.
pub const SIGNED_URL_EXPIRES: Duration = Duration::from_secs(15 * 60);

/// Storage action a signed URL authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Get,
    Put,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Put => "put",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A blob plus the metadata stored alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

impl BucketObject {
    pub fn new(body: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.into(),
        }
    }
}

/// Capability set of an object store.
#[async_trait]
pub trait FileBucket: Send + Sync {
    /// Issue a URL authorizing `operation` on `key` until it expires.
    async fn get_signed_url(&self, operation: Operation, key: &str) -> Result<String>;

    /// Store `object` under `key` and return a `get` URL for it.
    async fn save_file(&self, key: &str, object: BucketObject) -> Result<String>;

    /// Remove the object stored under `key`.
    async fn delete_object(&self, key: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Get.to_string(), "get");
        assert_eq!(Operation::Put.to_string(), "put");
    }

    #[test]
    fn test_operation_serde() {
        assert_eq!(serde_json::to_string(&Operation::Put).unwrap(), "\"put\"");
        let op: Operation = serde_json::from_str("\"get\"").unwrap();
        assert_eq!(op, Operation::Get);
    }

    #[test]
    fn test_default_expiry_is_fifteen_minutes() {
        assert_eq!(SIGNED_URL_EXPIRES.as_secs(), 900);
    }
}
