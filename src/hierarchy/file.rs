//! File types and repository.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::ancestors::Ancestors;
use crate::datetime;
use crate::db::LIVE;
use crate::history::{History, HistoryEvent};
use crate::ids;
use crate::version::FileVersion;
use crate::Result;

/// A file, owned by exactly one directory.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct File {
    /// Unique file id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Containing directory.
    pub directory_id: String,
    /// Path from the root down to, and including, `directory_id`.
    #[sqlx(try_from = "String")]
    pub ancestors: Ancestors,
    /// Append-only audit log.
    #[sqlx(try_from = "String")]
    pub history: History,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Tombstone.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl File {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A file together with its live versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDetail {
    pub file: File,
    /// Live versions, oldest first.
    pub versions: Vec<FileVersion>,
}

impl FileDetail {
    /// Current content: the most recently created live version.
    pub fn current_version(&self) -> Option<&FileVersion> {
        self.versions.last()
    }
}

/// Input for creating a file together with its first version.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub name: String,
    pub directory_id: String,
    pub mime_type: String,
    pub size: i64,
    /// Object-store key; generated when absent.
    pub key: Option<String>,
}

impl NewFile {
    /// Create a new NewFile.
    pub fn new(
        name: impl Into<String>,
        directory_id: impl Into<String>,
        mime_type: impl Into<String>,
        size: i64,
    ) -> Self {
        Self {
            name: name.into(),
            directory_id: directory_id.into(),
            mime_type: mime_type.into(),
            size,
            key: None,
        }
    }

    /// Use a caller-supplied object-store key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

const COLUMNS: &str =
    "id, name, directory_id, ancestors, history, created_at, updated_at, deleted_at";

/// Repository for file rows.
pub struct FileRepository;

impl FileRepository {
    /// Insert a file row with a history holding `created`.
    pub async fn create(
        conn: &mut SqliteConnection,
        name: &str,
        directory_id: &str,
        ancestors: &Ancestors,
    ) -> Result<File> {
        let id = ids::generate_id();
        let now = Utc::now();
        let now_db = datetime::to_db(&now);

        let mut history = History::new();
        history.append(
            HistoryEvent::Created {
                name: name.to_string(),
                directory_id: directory_id.to_string(),
            },
            now,
        );

        let created = sqlx::query_as::<_, File>(&format!(
            "INSERT INTO files (id, name, directory_id, ancestors, history, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {COLUMNS}"
        ))
        .bind(&id)
        .bind(name)
        .bind(directory_id)
        .bind(ancestors.to_json()?)
        .bind(history.to_json()?)
        .bind(&now_db)
        .bind(&now_db)
        .fetch_one(&mut *conn)
        .await?;

        Ok(created)
    }

    /// Get a file by id, tombstoned or not.
    pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Option<File>> {
        let file = sqlx::query_as::<_, File>(&format!("SELECT {COLUMNS} FROM files WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(file)
    }

    /// Get a live file by id.
    pub async fn get_live(conn: &mut SqliteConnection, id: &str) -> Result<Option<File>> {
        let file = sqlx::query_as::<_, File>(&format!(
            "SELECT {COLUMNS} FROM files WHERE id = ? AND {LIVE}"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(file)
    }

    /// List live files directly inside a directory.
    pub async fn list_by_directory(
        conn: &mut SqliteConnection,
        directory_id: &str,
    ) -> Result<Vec<File>> {
        let files = sqlx::query_as::<_, File>(&format!(
            "SELECT {COLUMNS} FROM files WHERE directory_id = ? AND {LIVE} ORDER BY name, id"
        ))
        .bind(directory_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(files)
    }

    /// List every file whose ancestor path contains `ancestor_id`, tombstones included.
    pub async fn list_descendants_all(
        conn: &mut SqliteConnection,
        ancestor_id: &str,
    ) -> Result<Vec<File>> {
        let files = sqlx::query_as::<_, File>(&format!(
            "SELECT {COLUMNS} FROM files
             WHERE EXISTS (SELECT 1 FROM json_each(files.ancestors) WHERE json_each.value = ?)"
        ))
        .bind(ancestor_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(files)
    }

    /// Ids of live files whose ancestor path contains `ancestor_id`.
    pub async fn list_descendant_ids(
        conn: &mut SqliteConnection,
        ancestor_id: &str,
    ) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT id FROM files
             WHERE EXISTS (SELECT 1 FROM json_each(files.ancestors) WHERE json_each.value = ?)
               AND {LIVE}
             ORDER BY id"
        ))
        .bind(ancestor_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(ids)
    }

    /// Count live files whose ancestor path contains `ancestor_id`.
    pub async fn count_descendants(conn: &mut SqliteConnection, ancestor_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM files
             WHERE EXISTS (SELECT 1 FROM json_each(files.ancestors) WHERE json_each.value = ?)
               AND {LIVE}"
        ))
        .bind(ancestor_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(count)
    }

    /// Case-insensitive substring search over live file names, name ascending.
    pub async fn search(conn: &mut SqliteConnection, query: &str) -> Result<Vec<File>> {
        let files = sqlx::query_as::<_, File>(&format!(
            "SELECT {COLUMNS} FROM files
             WHERE instr(lower(name), lower(?)) > 0 AND {LIVE}
             ORDER BY name, id"
        ))
        .bind(query)
        .fetch_all(&mut *conn)
        .await?;

        Ok(files)
    }

    /// Set a file's name.
    pub async fn rename(conn: &mut SqliteConnection, id: &str, name: &str) -> Result<()> {
        sqlx::query("UPDATE files SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(datetime::now_db())
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Set a file's directory and ancestor path.
    pub async fn set_directory(
        conn: &mut SqliteConnection,
        id: &str,
        directory_id: &str,
        ancestors: &Ancestors,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE files SET directory_id = ?, ancestors = ?, updated_at = ? WHERE id = ?",
        )
        .bind(directory_id)
        .bind(ancestors.to_json()?)
        .bind(datetime::now_db())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Replace a file's ancestor path.
    pub async fn set_ancestors(
        conn: &mut SqliteConnection,
        id: &str,
        ancestors: &Ancestors,
    ) -> Result<()> {
        sqlx::query("UPDATE files SET ancestors = ?, updated_at = ? WHERE id = ?")
            .bind(ancestors.to_json()?)
            .bind(datetime::now_db())
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}
