//! Test helpers for integration tests.
//!
//! Provides an in-memory database with a root directory and a Local bucket
//! rooted in a temporary directory.

#![allow(dead_code)]

use std::time::Duration;

use arbor::{Database, Directory, DirectoryService, LocalBucket};
use tempfile::TempDir;

/// Base URL the test bucket signs against.
pub const PUBLIC_URL: &str = "http://localhost:4000/file";

/// Database, bucket and root directory for one test.
pub struct TestEnv {
    pub db: Database,
    pub bucket: LocalBucket,
    pub root: Directory,
    _storage: TempDir,
}

impl TestEnv {
    pub async fn new() -> Self {
        let storage = TempDir::new().expect("Failed to create temp dir");
        let bucket = create_bucket(&storage);
        let db = Database::open_in_memory()
            .await
            .expect("Failed to create test database");
        let root = DirectoryService::new(&db, &bucket)
            .ensure_root()
            .await
            .expect("Failed to create root");

        Self {
            db,
            bucket,
            root,
            _storage: storage,
        }
    }

    pub fn directories(&self) -> DirectoryService<'_> {
        DirectoryService::new(&self.db, &self.bucket)
    }
}

/// A Local bucket stored under `dir`.
pub fn create_bucket(dir: &TempDir) -> LocalBucket {
    LocalBucket::new(dir.path(), PUBLIC_URL, Duration::from_secs(900))
        .expect("Failed to create bucket")
}

/// Extract the decoded `signed` parameter from a signed URL.
pub fn signed_param(url: &str) -> String {
    let url = url::Url::parse(url).expect("signed URL should parse");
    url.query_pairs()
        .find(|(name, _)| name == "signed")
        .map(|(_, value)| value.into_owned())
        .expect("signed URL should carry a token")
}
