//! arbor - hierarchical file storage backend
//!
//! A tree of directories and files with materialized ancestor paths, an
//! append-only version ledger per file, and pluggable object storage reached
//! through short-lived signed URLs.

pub mod bucket;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod hierarchy;
pub mod history;
pub mod ids;
pub mod logging;
pub mod version;
pub mod web;

pub use bucket::{BucketObject, FileBucket, LocalBucket, Operation, S3Bucket};
pub use config::Config;
pub use db::Database;
pub use error::{ArborError, Result};
pub use hierarchy::{
    ContentsQuery, Directory, DirectoryService, File, FileService, NewFile, Pagination,
};
pub use version::{CreateFileVersion, FileVersion, VersionLedger};
