//! Directory listing: merged, sorted, paginated summaries of files and
//! directories.
//!
//! Two realisations produce the same page. [`load_entries`] followed by
//! [`order_entries`] and [`paginate`] sorts in memory; [`query_entries_raw`]
//! pushes the union, ordering and pagination into one SQL statement.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::db::LIVE;
use crate::{ArborError, Result};

/// Default number of entries per page.
pub const DEFAULT_PAGE_LENGTH: u32 = 20;

/// Discriminant of a listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryKind {
    // Declaration order matches the lexical order of the stored tags.
    Directory,
    File,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Directory => "Directory",
            EntryKind::File => "File",
        }
    }
}

impl TryFrom<String> for EntryKind {
    type Error = ArborError;

    fn try_from(value: String) -> Result<Self> {
        match value.as_str() {
            "Directory" => Ok(EntryKind::Directory),
            "File" => Ok(EntryKind::File),
            other => Err(ArborError::Database(format!("unknown entry kind: {other}"))),
        }
    }
}

/// One row of a directory listing.
///
/// Directories report an empty `mime_type`, a zero `size` and an empty `key`.
/// Files report their current version, or the same placeholders when they
/// have no live version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: i64,
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub kind: EntryKind,
}

/// Field a listing is sorted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    Name,
    Size,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    fn column(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Size => "size",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Sort order, `name ASC` by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

/// Offset pagination with 1-indexed pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_length: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_LENGTH)
    }
}

impl Pagination {
    /// Create new pagination parameters.
    pub fn new(page: u32, page_length: u32) -> Self {
        Self { page, page_length }
    }

    /// The first page with the given length.
    pub fn first(page_length: u32) -> Self {
        Self {
            page: 1,
            page_length,
        }
    }

    /// Reject zero pages and zero-length pages.
    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(ArborError::Validation("page starts at 1".to_string()));
        }
        if self.page_length == 0 {
            return Err(ArborError::Validation(
                "pageLength must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of entries skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_length)
    }
}

/// Which part of the subtree a listing covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentsScope {
    /// Immediate children only.
    #[default]
    Children,
    /// Every live node whose ancestor path contains the directory.
    Descendants,
}

/// Parameters of a listing.
///
/// Without explicit pagination the first page of the configured default
/// length is returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentsQuery {
    pub scope: ContentsScope,
    pub sort: Sort,
    pub pagination: Option<Pagination>,
}

impl ContentsQuery {
    pub fn with_scope(mut self, scope: ContentsScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// The page to return, given the default page length.
    pub fn page(&self, default_page_length: u32) -> Pagination {
        self.pagination
            .unwrap_or_else(|| Pagination::first(default_page_length))
    }
}

// Latest live version of `f`; ties on created_at resolve to the later insert.
const CURRENT_VERSION_JOIN: &str = "LEFT JOIN file_versions v ON v.id = (
        SELECT cv.id FROM file_versions cv
        WHERE cv.file_id = f.id AND cv.deleted_at IS NULL
        ORDER BY cv.created_at DESC, cv.rowid DESC LIMIT 1
    )";

fn push_directory_rows(query: &mut QueryBuilder<'static, Sqlite>, id: &str, scope: ContentsScope) {
    query.push(
        "SELECT d.id AS id, d.name AS name, '' AS mime_type, 0 AS size, '' AS key,
                d.created_at AS created_at, d.updated_at AS updated_at, 'Directory' AS kind
         FROM directories d WHERE ",
    );
    match scope {
        ContentsScope::Children => {
            query.push("d.parent_id = ");
        }
        ContentsScope::Descendants => {
            query.push("EXISTS (SELECT 1 FROM json_each(d.ancestors) WHERE json_each.value = ");
        }
    }
    query.push_bind(id.to_string());
    if scope == ContentsScope::Descendants {
        query.push(")");
    }
    query.push(format!(" AND d.{LIVE}"));
}

fn push_file_rows(query: &mut QueryBuilder<'static, Sqlite>, id: &str, scope: ContentsScope) {
    query.push(format!(
        "SELECT f.id AS id, f.name AS name, COALESCE(v.mime_type, '') AS mime_type,
                COALESCE(v.size, 0) AS size, COALESCE(v.key, '') AS key,
                f.created_at AS created_at, f.updated_at AS updated_at, 'File' AS kind
         FROM files f {CURRENT_VERSION_JOIN} WHERE "
    ));
    match scope {
        ContentsScope::Children => {
            query.push("f.directory_id = ");
        }
        ContentsScope::Descendants => {
            query.push("EXISTS (SELECT 1 FROM json_each(f.ancestors) WHERE json_each.value = ");
        }
    }
    query.push_bind(id.to_string());
    if scope == ContentsScope::Descendants {
        query.push(")");
    }
    query.push(format!(" AND f.{LIVE}"));
}

/// Load every entry of a listing, unsorted.
pub async fn load_entries(
    conn: &mut SqliteConnection,
    id: &str,
    scope: ContentsScope,
) -> Result<Vec<DirectoryEntry>> {
    let mut query = QueryBuilder::new("");
    push_directory_rows(&mut query, id, scope);
    let mut entries: Vec<DirectoryEntry> =
        query.build_query_as().fetch_all(&mut *conn).await?;

    let mut query = QueryBuilder::new("");
    push_file_rows(&mut query, id, scope);
    let files: Vec<DirectoryEntry> = query.build_query_as().fetch_all(&mut *conn).await?;

    entries.extend(files);
    Ok(entries)
}

/// Sort entries in place.
///
/// By name, files and directories are interleaved. By any other field,
/// directories come first in name order, followed by files ordered on the
/// field. Remaining ties fall back to id.
pub fn order_entries(entries: &mut [DirectoryEntry], sort: Sort) {
    entries.sort_by(|a, b| compare(a, b, sort));
}

fn compare(a: &DirectoryEntry, b: &DirectoryEntry, sort: Sort) -> Ordering {
    if sort.field == SortField::Name {
        return sort
            .direction
            .apply(a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id));
    }

    match (a.kind, b.kind) {
        (EntryKind::Directory, EntryKind::Directory) => {
            a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id))
        }
        (EntryKind::Directory, EntryKind::File) => Ordering::Less,
        (EntryKind::File, EntryKind::Directory) => Ordering::Greater,
        (EntryKind::File, EntryKind::File) => {
            let ordering = match sort.field {
                SortField::Size => a.size.cmp(&b.size),
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                SortField::Name => a.name.cmp(&b.name),
            };
            sort.direction.apply(ordering).then_with(|| a.id.cmp(&b.id))
        }
    }
}

/// Cut one page out of sorted entries.
pub fn paginate(entries: Vec<DirectoryEntry>, pagination: Pagination) -> Vec<DirectoryEntry> {
    let offset = usize::try_from(pagination.offset()).unwrap_or(usize::MAX);
    entries
        .into_iter()
        .skip(offset)
        .take(pagination.page_length as usize)
        .collect()
}

/// Build the single-statement listing query.
pub fn build_raw_query(
    id: &str,
    query: &ContentsQuery,
    page: Pagination,
) -> QueryBuilder<'static, Sqlite> {
    let mut builder = QueryBuilder::new("SELECT * FROM (");
    push_directory_rows(&mut builder, id, query.scope);
    builder.push(" UNION ALL ");
    push_file_rows(&mut builder, id, query.scope);
    builder.push(") ORDER BY ");

    let direction = query.sort.direction.sql();
    if query.sort.field == SortField::Name {
        builder.push(format!("name {direction}, id ASC"));
    } else {
        builder.push(format!(
            "kind ASC,
             CASE WHEN kind = 'Directory' THEN name END ASC,
             CASE WHEN kind = 'Directory' THEN id END ASC,
             {} {direction}, id ASC",
            query.sort.field.column()
        ));
    }

    builder.push(" LIMIT ");
    builder.push_bind(i64::from(page.page_length));
    builder.push(" OFFSET ");
    builder.push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
    builder
}

/// Run the listing entirely in SQL.
pub async fn query_entries_raw(
    conn: &mut SqliteConnection,
    id: &str,
    query: &ContentsQuery,
    page: Pagination,
) -> Result<Vec<DirectoryEntry>> {
    let mut builder = build_raw_query(id, query, page);
    let entries = builder.build_query_as().fetch_all(&mut *conn).await?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(id: &str, name: &str, kind: EntryKind, size: i64, secs: u32) -> DirectoryEntry {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, secs).unwrap();
        DirectoryEntry {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: String::new(),
            size,
            key: String::new(),
            created_at: at,
            updated_at: at,
            kind,
        }
    }

    fn names(entries: &[DirectoryEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn sample() -> Vec<DirectoryEntry> {
        vec![
            entry("1", "delta", EntryKind::File, 30, 1),
            entry("2", "bravo", EntryKind::Directory, 0, 5),
            entry("3", "alpha", EntryKind::File, 10, 3),
            entry("4", "echo", EntryKind::Directory, 0, 2),
            entry("5", "charlie", EntryKind::File, 20, 4),
        ]
    }

    #[test]
    fn test_sort_by_name_interleaves_kinds() {
        let mut entries = sample();
        order_entries(&mut entries, Sort::default());
        assert_eq!(
            names(&entries),
            vec!["alpha", "bravo", "charlie", "delta", "echo"]
        );

        order_entries(&mut entries, Sort::new(SortField::Name, SortDirection::Desc));
        assert_eq!(
            names(&entries),
            vec!["echo", "delta", "charlie", "bravo", "alpha"]
        );
    }

    #[test]
    fn test_sort_by_size_groups_directories_first() {
        let mut entries = sample();
        order_entries(&mut entries, Sort::new(SortField::Size, SortDirection::Desc));
        assert_eq!(
            names(&entries),
            vec!["bravo", "echo", "delta", "charlie", "alpha"]
        );
    }

    #[test]
    fn test_sort_by_created_at() {
        let mut entries = sample();
        order_entries(&mut entries, Sort::new(SortField::CreatedAt, SortDirection::Asc));
        assert_eq!(
            names(&entries),
            vec!["bravo", "echo", "delta", "alpha", "charlie"]
        );
    }

    #[test]
    fn test_paginate() {
        let mut entries = sample();
        order_entries(&mut entries, Sort::default());
        let page = paginate(entries, Pagination::new(2, 2));
        assert_eq!(names(&page), vec!["charlie", "delta"]);
    }

    #[test]
    fn test_paginate_past_end() {
        let page = paginate(sample(), Pagination::new(4, 2));
        assert!(page.is_empty());
    }

    #[test]
    fn test_pagination_validate() {
        assert!(Pagination::new(1, 20).validate().is_ok());
        assert!(matches!(
            Pagination::new(0, 20).validate(),
            Err(ArborError::Validation(_))
        ));
        assert!(matches!(
            Pagination::new(1, 0).validate(),
            Err(ArborError::Validation(_))
        ));
    }

    #[test]
    fn test_offset() {
        assert_eq!(Pagination::new(1, 20).offset(), 0);
        assert_eq!(Pagination::new(3, 20).offset(), 40);
    }

    #[test]
    fn test_query_default_page() {
        let query = ContentsQuery::default();
        assert_eq!(query.page(50), Pagination::new(1, 50));

        let query = query.with_pagination(Pagination::new(3, 10));
        assert_eq!(query.page(50), Pagination::new(3, 10));
    }

    #[test]
    fn test_entry_kind_decode() {
        assert_eq!(
            EntryKind::try_from("File".to_string()).unwrap(),
            EntryKind::File
        );
        assert!(EntryKind::try_from("Link".to_string()).is_err());
    }

    #[test]
    fn test_raw_query_shape() {
        let query = ContentsQuery::default()
            .with_sort(Sort::new(SortField::UpdatedAt, SortDirection::Desc));
        let sql = build_raw_query("d1", &query, Pagination::default()).into_sql();
        assert!(sql.contains("UNION ALL"));
        assert!(sql.contains("updated_at DESC"));
        assert!(sql.contains("LIMIT"));
        assert!(sql.contains("OFFSET"));
    }

    #[test]
    fn test_entry_serializes_type_tag() {
        let json = serde_json::to_value(entry("1", "a", EntryKind::Directory, 0, 0)).unwrap();
        assert_eq!(json["type"], "Directory");
        assert_eq!(json["mimeType"], "");
    }
}
