//! File version repository.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::datetime;
use crate::db::LIVE;
use crate::hierarchy::Pagination;
use crate::ids;
use crate::Result;

/// An immutable content version of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FileVersion {
    pub id: String,
    pub file_id: String,
    /// Display name.
    pub name: String,
    pub mime_type: String,
    /// Size in bytes.
    pub size: i64,
    /// Object-store key; unique and never reassigned.
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Data for inserting a version row.
#[derive(Debug, Clone)]
pub struct NewFileVersion {
    pub file_id: String,
    pub name: String,
    pub mime_type: String,
    pub size: i64,
    pub key: String,
}

impl NewFileVersion {
    /// A version with a freshly generated key.
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
            key: ids::generate_key(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

const COLUMNS: &str =
    "id, file_id, name, mime_type, size, key, created_at, updated_at, deleted_at";

/// Repository for version rows.
pub struct FileVersionRepository;

impl FileVersionRepository {
    pub async fn create(conn: &mut SqliteConnection, version: &NewFileVersion) -> Result<FileVersion> {
        let now = datetime::now_db();

        let created = sqlx::query_as::<_, FileVersion>(&format!(
            "INSERT INTO file_versions (id, file_id, name, mime_type, size, key, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {COLUMNS}"
        ))
        .bind(ids::generate_id())
        .bind(&version.file_id)
        .bind(&version.name)
        .bind(&version.mime_type)
        .bind(version.size)
        .bind(&version.key)
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(created)
    }

    /// Get a live version by id.
    pub async fn get_live(conn: &mut SqliteConnection, id: &str) -> Result<Option<FileVersion>> {
        let version = sqlx::query_as::<_, FileVersion>(&format!(
            "SELECT {COLUMNS} FROM file_versions WHERE id = ? AND {LIVE}"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(version)
    }

    /// Get a live version by object key.
    pub async fn get_live_by_key(
        conn: &mut SqliteConnection,
        key: &str,
    ) -> Result<Option<FileVersion>> {
        let version = sqlx::query_as::<_, FileVersion>(&format!(
            "SELECT {COLUMNS} FROM file_versions WHERE key = ? AND {LIVE}"
        ))
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(version)
    }

    /// Live versions of a file, oldest first, optionally paginated.
    pub async fn list_by_file(
        conn: &mut SqliteConnection,
        file_id: &str,
        pagination: Option<Pagination>,
    ) -> Result<Vec<FileVersion>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM file_versions
             WHERE file_id = ? AND {LIVE}
             ORDER BY created_at, rowid"
        );

        let versions = match pagination {
            Some(page) => {
                sqlx::query_as::<_, FileVersion>(&format!("{sql} LIMIT ? OFFSET ?"))
                    .bind(file_id)
                    .bind(i64::from(page.page_length))
                    .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
                    .fetch_all(&mut *conn)
                    .await?
            }
            None => {
                sqlx::query_as::<_, FileVersion>(&sql)
                    .bind(file_id)
                    .fetch_all(&mut *conn)
                    .await?
            }
        };

        Ok(versions)
    }

    /// Object keys of a file's live versions.
    pub async fn list_keys_by_file(conn: &mut SqliteConnection, file_id: &str) -> Result<Vec<String>> {
        let keys: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT key FROM file_versions WHERE file_id = ? AND {LIVE} ORDER BY created_at, rowid"
        ))
        .bind(file_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(keys)
    }

    /// Total size of live versions of live files under `ancestor_id`.
    ///
    /// `None` when no such version exists.
    pub async fn total_size_under(
        conn: &mut SqliteConnection,
        ancestor_id: &str,
    ) -> Result<Option<i64>> {
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(v.size) FROM file_versions v
             JOIN files f ON f.id = v.file_id
             WHERE EXISTS (SELECT 1 FROM json_each(f.ancestors) WHERE json_each.value = ?)
               AND f.deleted_at IS NULL
               AND v.deleted_at IS NULL",
        )
        .bind(ancestor_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(total)
    }
}
