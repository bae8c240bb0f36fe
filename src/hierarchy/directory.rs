//! Directory types and repository.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::ancestors::Ancestors;
use crate::datetime;
use crate::db::LIVE;
use crate::ids;
use crate::Result;

/// Name of the singular root directory.
pub const ROOT_NAME: &str = "root";

/// A directory in the tree.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Directory {
    /// Unique directory id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Parent directory id (None only for root).
    pub parent_id: Option<String>,
    /// Path from the root down to the parent.
    #[sqlx(try_from = "String")]
    pub ancestors: Ancestors,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Tombstone.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Directory {
    /// Whether this is the root directory.
    ///
    /// Root is identified by name, not by id.
    pub fn is_root(&self) -> bool {
        self.name == ROOT_NAME
    }
}

/// Data for inserting a directory row.
#[derive(Debug, Clone)]
pub struct NewDirectory {
    pub name: String,
    pub parent_id: Option<String>,
    pub ancestors: Ancestors,
}

impl NewDirectory {
    /// A directory placed under `parent`.
    pub fn under(name: impl Into<String>, parent: &Directory) -> Self {
        Self {
            name: name.into(),
            parent_id: Some(parent.id.clone()),
            ancestors: parent.ancestors.child_of(&parent.id),
        }
    }

    /// The root directory.
    pub fn root() -> Self {
        Self {
            name: ROOT_NAME.to_string(),
            parent_id: None,
            ancestors: Ancestors::new(),
        }
    }
}

const COLUMNS: &str = "id, name, parent_id, ancestors, created_at, updated_at, deleted_at";

/// Repository for directory rows.
///
/// Functions take a connection so the same calls work on a pooled
/// connection or inside a transaction. Deletes go through
/// [`crate::db::soft_delete`].
pub struct DirectoryRepository;

impl DirectoryRepository {
    /// Insert a new directory.
    pub async fn create(conn: &mut SqliteConnection, directory: &NewDirectory) -> Result<Directory> {
        let id = ids::generate_id();
        let now = datetime::now_db();

        let created = sqlx::query_as::<_, Directory>(&format!(
            "INSERT INTO directories (id, name, parent_id, ancestors, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {COLUMNS}"
        ))
        .bind(&id)
        .bind(&directory.name)
        .bind(&directory.parent_id)
        .bind(directory.ancestors.to_json()?)
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(created)
    }

    /// Get a directory by id, tombstoned or not.
    pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Option<Directory>> {
        let directory = sqlx::query_as::<_, Directory>(&format!(
            "SELECT {COLUMNS} FROM directories WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(directory)
    }

    /// Get a live directory by id.
    pub async fn get_live(conn: &mut SqliteConnection, id: &str) -> Result<Option<Directory>> {
        let directory = sqlx::query_as::<_, Directory>(&format!(
            "SELECT {COLUMNS} FROM directories WHERE id = ? AND {LIVE}"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(directory)
    }

    /// Get the live root directory.
    pub async fn get_root(conn: &mut SqliteConnection) -> Result<Option<Directory>> {
        let directory = sqlx::query_as::<_, Directory>(&format!(
            "SELECT {COLUMNS} FROM directories
             WHERE name = ? AND parent_id IS NULL AND {LIVE}
             ORDER BY created_at LIMIT 1"
        ))
        .bind(ROOT_NAME)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(directory)
    }

    /// List live immediate children of a directory.
    pub async fn list_children(conn: &mut SqliteConnection, parent_id: &str) -> Result<Vec<Directory>> {
        let directories = sqlx::query_as::<_, Directory>(&format!(
            "SELECT {COLUMNS} FROM directories
             WHERE parent_id = ? AND {LIVE} ORDER BY name, id"
        ))
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(directories)
    }

    /// List every directory whose ancestor path contains `ancestor_id`.
    ///
    /// Includes tombstoned rows: moves rewrite the whole subtree.
    pub async fn list_descendants_all(
        conn: &mut SqliteConnection,
        ancestor_id: &str,
    ) -> Result<Vec<Directory>> {
        let directories = sqlx::query_as::<_, Directory>(&format!(
            "SELECT {COLUMNS} FROM directories
             WHERE EXISTS (SELECT 1 FROM json_each(directories.ancestors) WHERE json_each.value = ?)"
        ))
        .bind(ancestor_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(directories)
    }

    /// Count live directories whose ancestor path contains `ancestor_id`.
    pub async fn count_descendants(conn: &mut SqliteConnection, ancestor_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM directories
             WHERE EXISTS (SELECT 1 FROM json_each(directories.ancestors) WHERE json_each.value = ?)
               AND {LIVE}"
        ))
        .bind(ancestor_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(count)
    }

    /// Case-insensitive substring search over live directory names, name ascending.
    pub async fn search(conn: &mut SqliteConnection, query: &str) -> Result<Vec<Directory>> {
        let directories = sqlx::query_as::<_, Directory>(&format!(
            "SELECT {COLUMNS} FROM directories
             WHERE instr(lower(name), lower(?)) > 0 AND {LIVE}
             ORDER BY name, id"
        ))
        .bind(query)
        .fetch_all(&mut *conn)
        .await?;

        Ok(directories)
    }

    /// Set a directory's name.
    pub async fn rename(conn: &mut SqliteConnection, id: &str, name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE directories SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(datetime::now_db())
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set a directory's parent and ancestor path.
    pub async fn set_parent(
        conn: &mut SqliteConnection,
        id: &str,
        parent_id: &str,
        ancestors: &Ancestors,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE directories SET parent_id = ?, ancestors = ?, updated_at = ? WHERE id = ?",
        )
        .bind(parent_id)
        .bind(ancestors.to_json()?)
        .bind(datetime::now_db())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Replace one directory's ancestor path.
    pub async fn set_ancestors(
        conn: &mut SqliteConnection,
        id: &str,
        ancestors: &Ancestors,
    ) -> Result<()> {
        sqlx::query("UPDATE directories SET ancestors = ?, updated_at = ? WHERE id = ?")
            .bind(ancestors.to_json()?)
            .bind(datetime::now_db())
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Replace the ancestor path of every direct child of `parent_id`.
    pub async fn set_children_ancestors(
        conn: &mut SqliteConnection,
        parent_id: &str,
        ancestors: &Ancestors,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE directories SET ancestors = ?, updated_at = ? WHERE parent_id = ?",
        )
        .bind(ancestors.to_json()?)
        .bind(datetime::now_db())
        .bind(parent_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }
}
