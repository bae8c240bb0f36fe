//! Soft-delete interceptor.
//!
//! Directories, files and file versions are never physically removed. Every
//! delete the engine issues is expressed as a [`DeleteRequest`] and passed to
//! [`execute`], which rewrites it into an `UPDATE ... SET deleted_at = now`
//! before it reaches the database. Repositories expose no other delete path.
//!
//! Read paths that enumerate live rows filter on [`LIVE`].

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;

use crate::datetime;
use crate::Result;

/// Filter fragment selecting rows that have not been tombstoned.
pub const LIVE: &str = "deleted_at IS NULL";

/// Entities subject to tombstoning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tombstoned {
    /// `directories` table.
    Directory,
    /// `files` table.
    File,
    /// `file_versions` table.
    FileVersion,
}

impl Tombstoned {
    /// Backing table name.
    pub fn table(&self) -> &'static str {
        match self {
            Tombstoned::Directory => "directories",
            Tombstoned::File => "files",
            Tombstoned::FileVersion => "file_versions",
        }
    }
}

/// Row selection for [`DeleteRequest::DeleteMany`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteFilter {
    /// Rows whose ancestor path contains the given directory id.
    AncestorsContain(String),
    /// Versions belonging to the given file.
    FileId(String),
}

/// A delete as issued by the engine, before interception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteRequest {
    /// Delete one row by primary key.
    Delete {
        /// Target entity.
        entity: Tombstoned,
        /// Primary key.
        id: String,
    },
    /// Delete every live row matching a filter.
    DeleteMany {
        /// Target entity.
        entity: Tombstoned,
        /// Row selection.
        filter: DeleteFilter,
    },
}

impl DeleteRequest {
    /// Delete one row by primary key.
    pub fn one(entity: Tombstoned, id: impl Into<String>) -> Self {
        DeleteRequest::Delete {
            entity,
            id: id.into(),
        }
    }

    /// Delete every live row matching `filter`.
    pub fn many(entity: Tombstoned, filter: DeleteFilter) -> Self {
        DeleteRequest::DeleteMany { entity, filter }
    }

    /// Rewrite this delete into the tombstoning update that replaces it.
    ///
    /// Rows that are already tombstoned are left untouched, so repeated
    /// deletes keep the original `deleted_at`.
    pub fn into_update(self, now: String) -> QueryBuilder<'static, Sqlite> {
        let entity = match &self {
            DeleteRequest::Delete { entity, .. } | DeleteRequest::DeleteMany { entity, .. } => {
                *entity
            }
        };

        let mut query: QueryBuilder<'static, Sqlite> =
            QueryBuilder::new(format!("UPDATE {} SET deleted_at = ", entity.table()));
        query.push_bind(now.clone());
        query.push(", updated_at = ");
        query.push_bind(now);
        query.push(format!(" WHERE {LIVE} AND "));

        match self {
            DeleteRequest::Delete { id, .. } => {
                query.push("id = ");
                query.push_bind(id);
            }
            DeleteRequest::DeleteMany { filter, .. } => match filter {
                DeleteFilter::AncestorsContain(ancestor) => {
                    query.push("EXISTS (SELECT 1 FROM json_each(ancestors) WHERE json_each.value = ");
                    query.push_bind(ancestor);
                    query.push(")");
                }
                DeleteFilter::FileId(file_id) => {
                    query.push("file_id = ");
                    query.push_bind(file_id);
                }
            },
        }

        query
    }
}

/// Execute a delete through the interceptor.
///
/// Returns the number of rows tombstoned.
pub async fn execute(conn: &mut SqliteConnection, request: DeleteRequest) -> Result<u64> {
    debug!("Tombstoning {:?}", request);
    let mut query = request.into_update(datetime::now_db());
    let result = query.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}
