//! Database schema and migrations for arbor.
//!
//! Migrations are applied sequentially when the database is first opened
//! or upgraded.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Directories
    r#"
-- Directory tree with materialized ancestor paths
CREATE TABLE directories (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    parent_id   TEXT REFERENCES directories(id),  -- NULL only for root
    ancestors   TEXT NOT NULL DEFAULT '[]',       -- JSON array, root first
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    deleted_at  TEXT                              -- tombstone
);

CREATE INDEX idx_directories_parent_id ON directories(parent_id);
CREATE INDEX idx_directories_name ON directories(name);
CREATE INDEX idx_directories_deleted_at ON directories(deleted_at);
"#,
    // v2: Files
    r#"
-- Files, owned by a directory; ancestors end with directory_id
CREATE TABLE files (
    id            TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    directory_id  TEXT NOT NULL REFERENCES directories(id),
    ancestors     TEXT NOT NULL DEFAULT '[]',     -- JSON array
    history       TEXT NOT NULL DEFAULT '[]',     -- JSON array of events
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    deleted_at    TEXT
);

CREATE INDEX idx_files_directory_id ON files(directory_id);
CREATE INDEX idx_files_name ON files(name);
CREATE INDEX idx_files_deleted_at ON files(deleted_at);
"#,
    // v3: File versions
    r#"
-- Immutable content versions; each owns one object-store key
CREATE TABLE file_versions (
    id          TEXT PRIMARY KEY,
    file_id     TEXT NOT NULL REFERENCES files(id),
    name        TEXT NOT NULL,
    mime_type   TEXT NOT NULL,
    size        INTEGER NOT NULL CHECK (size >= 0),
    key         TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    deleted_at  TEXT
);

CREATE INDEX idx_file_versions_file_id ON file_versions(file_id);
CREATE INDEX idx_file_versions_created_at ON file_versions(created_at);
"#,
];
