//! Directory and file tree for arbor.
//!
//! Every node stores its ancestor path, so subtree queries are a single
//! containment filter and moves rewrite the whole subtree in one
//! transaction.

mod ancestors;
pub mod contents;
mod directory;
mod file;
mod service;

pub use ancestors::Ancestors;
pub use contents::{
    ContentsQuery, ContentsScope, DirectoryEntry, EntryKind, Pagination, Sort, SortDirection,
    SortField, DEFAULT_PAGE_LENGTH,
};
pub use directory::{Directory, DirectoryRepository, NewDirectory, ROOT_NAME};
pub use file::{File, FileDetail, FileRepository, NewFile};
pub use service::{DirectoryDetail, DirectoryService, FileService, FileUpload};
