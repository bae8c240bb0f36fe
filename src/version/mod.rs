//! Version ledger for arbor.
//!
//! Every file owns an append-only set of immutable content versions. Each
//! version owns exactly one object-store key; bytes move through signed URLs
//! issued by the configured [`FileBucket`](crate::bucket::FileBucket).

mod repository;

pub use repository::{FileVersion, FileVersionRepository, NewFileVersion};

use serde::Serialize;
use tracing::{info, warn};

use crate::bucket::{FileBucket, Operation};
use crate::db::Database;
use crate::hierarchy::{FileRepository, Pagination};
use crate::history::{self, HistoryEvent};
use crate::{ArborError, Result};

/// Input for a new version of an existing file.
#[derive(Debug, Clone)]
pub struct CreateFileVersion {
    pub file_id: String,
    pub name: String,
    pub mime_type: String,
    pub size: i64,
}

impl CreateFileVersion {
    pub fn new(
        file_id: impl Into<String>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: i64,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            name: name.into(),
            mime_type: mime_type.into(),
            size,
        }
    }
}

/// A freshly created version and the URL its bytes should be uploaded to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionUpload {
    #[serde(flatten)]
    pub version: FileVersion,
    pub url: String,
}

pub(crate) fn validate_size(size: i64) -> Result<()> {
    if size < 0 {
        return Err(ArborError::Validation("size must not be negative".to_string()));
    }
    Ok(())
}

/// Service for version records and content URLs.
pub struct VersionLedger<'a> {
    db: &'a Database,
    bucket: &'a dyn FileBucket,
}

impl<'a> VersionLedger<'a> {
    /// Create a new VersionLedger.
    pub fn new(db: &'a Database, bucket: &'a dyn FileBucket) -> Self {
        Self { db, bucket }
    }

    /// Append a version to a live file and issue its upload URL.
    ///
    /// The version row and its `version-added` history event are written in
    /// one transaction that commits only once the bucket has signed the
    /// upload. If signing fails the transaction rolls back and the call fails
    /// with [`ArborError::StoreUnavailable`].
    pub async fn create_file_version_record(
        &self,
        request: CreateFileVersion,
    ) -> Result<VersionUpload> {
        validate_size(request.size)?;

        let mut tx = self.db.begin().await?;
        FileRepository::get_live(&mut tx, &request.file_id)
            .await?
            .ok_or_else(|| ArborError::NotFound("file".to_string()))?;

        let new_version = NewFileVersion::new(
            &request.file_id,
            request.name,
            request.mime_type,
            request.size,
        );
        let version = FileVersionRepository::create(&mut tx, &new_version).await?;
        history::append(
            &mut tx,
            &version.file_id,
            HistoryEvent::VersionAdded {
                version_id: version.id.clone(),
                key: version.key.clone(),
                size: version.size,
            },
        )
        .await?;

        let url = match self.bucket.get_signed_url(Operation::Put, &version.key).await {
            Ok(url) => url,
            Err(e) => {
                warn!(
                    "Could not sign upload for version {}, discarding it: {}",
                    version.id, e
                );
                tx.rollback().await?;
                return Err(ArborError::StoreUnavailable(e.to_string()));
            }
        };
        tx.commit().await?;

        info!("Added version {} to file {}", version.id, version.file_id);
        Ok(VersionUpload { version, url })
    }

    /// Issue a download URL for the live version stored under `key`.
    pub async fn request_file_download(&self, key: &str) -> Result<String> {
        {
            let mut conn = self.db.acquire().await?;
            FileVersionRepository::get_live_by_key(&mut conn, key)
                .await?
                .ok_or_else(|| ArborError::NotFound("file version".to_string()))?;
        }
        self.bucket.get_signed_url(Operation::Get, key).await
    }

    /// Get a live version by id.
    pub async fn get_file_version(&self, id: &str) -> Result<FileVersion> {
        let mut conn = self.db.acquire().await?;
        FileVersionRepository::get_live(&mut conn, id)
            .await?
            .ok_or_else(|| ArborError::NotFound("file version".to_string()))
    }

    /// Live versions of a file, oldest first.
    pub async fn get_file_versions(
        &self,
        file_id: &str,
        pagination: Option<Pagination>,
    ) -> Result<Vec<FileVersion>> {
        if let Some(page) = &pagination {
            page.validate()?;
        }
        let mut conn = self.db.acquire().await?;
        FileVersionRepository::list_by_file(&mut conn, file_id, pagination).await
    }
}
