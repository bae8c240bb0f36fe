//! Hierarchy services for arbor.
//!
//! This module provides the operations that keep materialized ancestor paths
//! consistent across create, rename, move and delete, plus subtree
//! aggregation and listing.

use tracing::{debug, info, warn};

use crate::bucket::{FileBucket, Operation};
use crate::db::{soft_delete, Database, DeleteFilter, DeleteRequest, Tombstoned};
use crate::history::{self, HistoryEvent};
use crate::version::{self, FileVersion, FileVersionRepository, NewFileVersion};
use crate::{ArborError, Result};

use super::ancestors::Ancestors;
use super::contents::{self, ContentsQuery, DirectoryEntry, DEFAULT_PAGE_LENGTH};
use super::directory::{Directory, DirectoryRepository, NewDirectory, ROOT_NAME};
use super::file::{File, FileDetail, FileRepository, NewFile};

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ArborError::Validation("name must not be empty".to_string()));
    }
    Ok(())
}

/// A directory with its live immediate children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryDetail {
    pub directory: Directory,
    pub directories: Vec<Directory>,
    pub files: Vec<File>,
}

/// A freshly created file, its first version, and the upload URL.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file: File,
    pub version: FileVersion,
    pub url: String,
}

/// Service for file operations.
pub struct FileService<'a> {
    db: &'a Database,
    bucket: &'a dyn FileBucket,
    purge_objects: bool,
}

impl<'a> FileService<'a> {
    /// Create a new FileService.
    pub fn new(db: &'a Database, bucket: &'a dyn FileBucket) -> Self {
        Self {
            db,
            bucket,
            purge_objects: false,
        }
    }

    /// Delete stored objects when their file is deleted.
    pub fn with_object_purge(mut self, purge: bool) -> Self {
        self.purge_objects = purge;
        self
    }

    /// Create a file with its first version and issue the upload URL.
    ///
    /// If the bucket cannot sign, both new rows are tombstoned again and the
    /// call fails with [`ArborError::StoreUnavailable`].
    pub async fn create_file_record(&self, request: NewFile) -> Result<FileUpload> {
        validate_name(&request.name)?;
        version::validate_size(request.size)?;

        let (file, version) = {
            let mut tx = self.db.begin().await?;
            let directory = DirectoryRepository::get_live(&mut tx, &request.directory_id)
                .await?
                .ok_or_else(|| ArborError::NotFound("directory".to_string()))?;

            let ancestors = directory.ancestors.child_of(&directory.id);
            let file =
                FileRepository::create(&mut tx, &request.name, &directory.id, &ancestors).await?;

            let mut new_version =
                NewFileVersion::new(&file.id, &request.name, request.mime_type, request.size);
            if let Some(key) = request.key {
                new_version = new_version.with_key(key);
            }
            let version = FileVersionRepository::create(&mut tx, &new_version).await?;

            tx.commit().await?;
            (file, version)
        };

        let url = match self.bucket.get_signed_url(Operation::Put, &version.key).await {
            Ok(url) => url,
            Err(e) => {
                warn!("Could not sign upload for file {}, removing it: {}", file.id, e);
                let mut tx = self.db.begin().await?;
                soft_delete::execute(
                    &mut tx,
                    DeleteRequest::one(Tombstoned::FileVersion, &version.id),
                )
                .await?;
                soft_delete::execute(&mut tx, DeleteRequest::one(Tombstoned::File, &file.id))
                    .await?;
                history::append(&mut tx, &file.id, HistoryEvent::Deleted {}).await?;
                tx.commit().await?;
                return Err(ArborError::StoreUnavailable(e.to_string()));
            }
        };

        info!("Created file {} in directory {}", file.id, file.directory_id);
        Ok(FileUpload { file, version, url })
    }

    /// Get a live file with its live versions.
    pub async fn get_file(&self, id: &str) -> Result<FileDetail> {
        let mut conn = self.db.acquire().await?;
        let file = FileRepository::get_live(&mut conn, id)
            .await?
            .ok_or_else(|| ArborError::NotFound("file".to_string()))?;
        let versions = FileVersionRepository::list_by_file(&mut conn, &file.id, None).await?;
        Ok(FileDetail { file, versions })
    }

    /// Move a file into another directory.
    pub async fn move_file(&self, id: &str, directory_id: &str) -> Result<File> {
        let mut tx = self.db.begin().await?;
        FileRepository::get_live(&mut tx, id)
            .await?
            .ok_or_else(|| ArborError::NotFound("file".to_string()))?;
        let directory = DirectoryRepository::get_live(&mut tx, directory_id)
            .await?
            .ok_or_else(|| {
                ArborError::InvalidTarget("destination directory does not exist".to_string())
            })?;

        let ancestors = directory.ancestors.child_of(&directory.id);
        FileRepository::set_directory(&mut tx, id, &directory.id, &ancestors).await?;
        history::append(
            &mut tx,
            id,
            HistoryEvent::Moved {
                directory_id: directory.id.clone(),
                ancestors: ancestors.as_slice().to_vec(),
            },
        )
        .await?;

        let file = FileRepository::get_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| ArborError::NotFound("file".to_string()))?;
        tx.commit().await?;

        info!("Moved file {} to directory {}", id, directory_id);
        Ok(file)
    }

    /// Rename a file.
    pub async fn rename_file(&self, id: &str, name: &str) -> Result<File> {
        validate_name(name)?;

        let mut tx = self.db.begin().await?;
        let file = FileRepository::get_live(&mut tx, id)
            .await?
            .ok_or_else(|| ArborError::NotFound("file".to_string()))?;

        FileRepository::rename(&mut tx, id, name).await?;
        history::append(
            &mut tx,
            id,
            HistoryEvent::Renamed {
                from: file.name,
                to: name.to_string(),
            },
        )
        .await?;

        let file = FileRepository::get_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| ArborError::NotFound("file".to_string()))?;
        tx.commit().await?;

        info!("Renamed file {}", id);
        Ok(file)
    }

    /// Tombstone a file and all its versions.
    ///
    /// With object purge enabled, stored objects are deleted after the
    /// metadata commits. A purge failure is reported as
    /// [`ArborError::StoreUnavailable`]; the metadata stays deleted.
    pub async fn delete_file(&self, id: &str) -> Result<bool> {
        let keys = {
            let mut tx = self.db.begin().await?;
            FileRepository::get_live(&mut tx, id)
                .await?
                .ok_or_else(|| ArborError::NotFound("file".to_string()))?;

            let keys = FileVersionRepository::list_keys_by_file(&mut tx, id).await?;
            soft_delete::execute(
                &mut tx,
                DeleteRequest::many(Tombstoned::FileVersion, DeleteFilter::FileId(id.to_string())),
            )
            .await?;
            soft_delete::execute(&mut tx, DeleteRequest::one(Tombstoned::File, id)).await?;
            history::append(&mut tx, id, HistoryEvent::Deleted {}).await?;
            tx.commit().await?;
            keys
        };
        info!("Deleted file {}", id);

        if self.purge_objects {
            self.purge(&keys).await?;
        }
        Ok(true)
    }

    async fn purge(&self, keys: &[String]) -> Result<()> {
        let mut failure = None;
        for key in keys {
            if let Err(e) = self.bucket.delete_object(key).await {
                warn!("Failed to delete object {}: {}", key, e);
                failure.get_or_insert(e);
            } else {
                debug!("Deleted object {}", key);
            }
        }
        match failure {
            Some(e) => Err(ArborError::StoreUnavailable(e.to_string())),
            None => Ok(()),
        }
    }

    /// Case-insensitive substring search over live files, name ascending.
    pub async fn find_files(&self, query: &str) -> Result<Vec<FileDetail>> {
        let mut conn = self.db.acquire().await?;
        let files = FileRepository::search(&mut conn, query).await?;

        let mut details = Vec::with_capacity(files.len());
        for file in files {
            let versions = FileVersionRepository::list_by_file(&mut conn, &file.id, None).await?;
            details.push(FileDetail { file, versions });
        }
        Ok(details)
    }
}

/// Service for directory operations.
pub struct DirectoryService<'a> {
    db: &'a Database,
    files: FileService<'a>,
    default_page_length: u32,
}

impl<'a> DirectoryService<'a> {
    /// Create a new DirectoryService.
    pub fn new(db: &'a Database, bucket: &'a dyn FileBucket) -> Self {
        Self {
            db,
            files: FileService::new(db, bucket),
            default_page_length: DEFAULT_PAGE_LENGTH,
        }
    }

    /// Delete stored objects of files removed with their directory.
    pub fn with_object_purge(mut self, purge: bool) -> Self {
        self.files = self.files.with_object_purge(purge);
        self
    }

    /// Page length used when a listing carries no pagination.
    pub fn with_default_page_length(mut self, page_length: u32) -> Self {
        self.default_page_length = page_length;
        self
    }

    /// Return the root directory, creating it on first use.
    pub async fn ensure_root(&self) -> Result<Directory> {
        let mut tx = self.db.begin().await?;
        if let Some(root) = DirectoryRepository::get_root(&mut tx).await? {
            return Ok(root);
        }

        let root = DirectoryRepository::create(&mut tx, &NewDirectory::root()).await?;
        tx.commit().await?;

        info!("Created root directory {}", root.id);
        Ok(root)
    }

    /// Create a directory under `parent_id`, or under root when absent.
    pub async fn create_directory(&self, name: &str, parent_id: Option<&str>) -> Result<Directory> {
        if name == ROOT_NAME {
            return Err(ArborError::ReservedName(name.to_string()));
        }
        validate_name(name)?;

        let mut conn = self.db.acquire().await?;
        let parent = match parent_id {
            Some(parent_id) => DirectoryRepository::get_live(&mut conn, parent_id)
                .await?
                .ok_or_else(|| ArborError::NotFound("parent directory".to_string()))?,
            None => DirectoryRepository::get_root(&mut conn)
                .await?
                .ok_or_else(|| ArborError::NotFound("root directory".to_string()))?,
        };

        let directory =
            DirectoryRepository::create(&mut conn, &NewDirectory::under(name, &parent)).await?;

        info!("Created directory {} under {}", directory.id, parent.id);
        Ok(directory)
    }

    /// Rename a directory. Root keeps its name.
    pub async fn rename_directory(&self, id: &str, name: &str) -> Result<Directory> {
        if name.to_lowercase() == ROOT_NAME {
            return Err(ArborError::ReservedName(name.to_string()));
        }
        validate_name(name)?;

        let mut conn = self.db.acquire().await?;
        let directory = DirectoryRepository::get_live(&mut conn, id)
            .await?
            .ok_or_else(|| ArborError::NotFound("directory".to_string()))?;
        if directory.is_root() {
            return Err(ArborError::ProtectedEntity("root directory".to_string()));
        }

        DirectoryRepository::rename(&mut conn, id, name).await?;
        let directory = DirectoryRepository::get_by_id(&mut conn, id)
            .await?
            .ok_or_else(|| ArborError::NotFound("directory".to_string()))?;

        info!("Renamed directory {}", id);
        Ok(directory)
    }

    /// Move a directory, with its whole subtree, under `parent_id`.
    ///
    /// Every descendant path is rewritten in one transaction: the part of
    /// the path above the moved node is replaced with the destination's, the
    /// part below is kept. Tombstoned descendants are rewritten too so they
    /// stay consistent if ever restored.
    pub async fn move_directory(&self, id: &str, parent_id: &str) -> Result<Directory> {
        let mut tx = self.db.begin().await?;

        let moved = DirectoryRepository::get_live(&mut tx, id)
            .await?
            .ok_or_else(|| ArborError::NotFound("directory".to_string()))?;
        if id == parent_id {
            return Err(ArborError::InvalidTarget(
                "a directory cannot be moved into itself".to_string(),
            ));
        }
        let destination = DirectoryRepository::get_live(&mut tx, parent_id)
            .await?
            .ok_or_else(|| {
                ArborError::InvalidTarget("destination directory does not exist".to_string())
            })?;
        if destination.ancestors.contains(id) {
            return Err(ArborError::InvalidTarget(
                "a directory cannot be moved into its own subtree".to_string(),
            ));
        }

        let previous = moved.ancestors.clone();
        let prefix: Ancestors = destination
            .ancestors
            .child_of(&destination.id)
            .child_of(&moved.id);

        let files = FileRepository::list_descendants_all(&mut tx, id).await?;
        for file in &files {
            let ancestors = if file.directory_id == id {
                prefix.clone()
            } else {
                file.ancestors.rebase(&previous, &prefix)
            };
            FileRepository::set_ancestors(&mut tx, &file.id, &ancestors).await?;
            if !file.is_deleted() {
                history::append(
                    &mut tx,
                    &file.id,
                    HistoryEvent::Moved {
                        directory_id: file.directory_id.clone(),
                        ancestors: ancestors.as_slice().to_vec(),
                    },
                )
                .await?;
            }
        }

        let directories = DirectoryRepository::list_descendants_all(&mut tx, id).await?;
        for directory in directories
            .iter()
            .filter(|d| d.parent_id.as_deref() != Some(id))
        {
            let ancestors = directory.ancestors.rebase(&previous, &prefix);
            DirectoryRepository::set_ancestors(&mut tx, &directory.id, &ancestors).await?;
        }
        DirectoryRepository::set_children_ancestors(&mut tx, id, &prefix).await?;

        DirectoryRepository::set_parent(
            &mut tx,
            id,
            &destination.id,
            &destination.ancestors.child_of(&destination.id),
        )
        .await?;

        let moved = DirectoryRepository::get_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| ArborError::NotFound("directory".to_string()))?;
        tx.commit().await?;

        info!(
            "Moved directory {} under {} ({} files, {} directories rewritten)",
            id,
            parent_id,
            files.len(),
            directories.len()
        );
        Ok(moved)
    }

    /// Delete a directory and everything below it.
    ///
    /// Files go through [`FileService::delete_file`] one by one, then the
    /// directories are tombstoned in a single transaction. An object purge
    /// failure does not stop the walk; it is reported once the tree is gone.
    pub async fn delete_directory(&self, id: &str) -> Result<bool> {
        let file_ids = {
            let mut conn = self.db.acquire().await?;
            DirectoryRepository::get_live(&mut conn, id)
                .await?
                .ok_or_else(|| ArborError::NotFound("directory".to_string()))?;
            FileRepository::list_descendant_ids(&mut conn, id).await?
        };

        let mut purge_failure = None;
        for file_id in &file_ids {
            match self.files.delete_file(file_id).await {
                Ok(_) => {}
                Err(e @ ArborError::StoreUnavailable(_)) => {
                    purge_failure.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }

        let mut tx = self.db.begin().await?;
        let descendants = soft_delete::execute(
            &mut tx,
            DeleteRequest::many(
                Tombstoned::Directory,
                DeleteFilter::AncestorsContain(id.to_string()),
            ),
        )
        .await?;
        soft_delete::execute(&mut tx, DeleteRequest::one(Tombstoned::Directory, id)).await?;
        tx.commit().await?;

        info!(
            "Deleted directory {} ({} files, {} subdirectories)",
            id,
            file_ids.len(),
            descendants
        );

        match purge_failure {
            Some(e) => Err(e),
            None => Ok(true),
        }
    }

    /// Get a live directory with its live immediate children.
    pub async fn get_directory(&self, id: &str) -> Result<DirectoryDetail> {
        let mut conn = self.db.acquire().await?;
        let directory = DirectoryRepository::get_live(&mut conn, id)
            .await?
            .ok_or_else(|| ArborError::NotFound("directory".to_string()))?;
        let directories = DirectoryRepository::list_children(&mut conn, id).await?;
        let files = FileRepository::list_by_directory(&mut conn, id).await?;

        Ok(DirectoryDetail {
            directory,
            directories,
            files,
        })
    }

    /// List a directory, sorting and paginating in memory.
    pub async fn get_directory_contents(
        &self,
        id: &str,
        query: ContentsQuery,
    ) -> Result<Vec<DirectoryEntry>> {
        let page = query.page(self.default_page_length);
        page.validate()?;

        let mut conn = self.db.acquire().await?;
        DirectoryRepository::get_live(&mut conn, id)
            .await?
            .ok_or_else(|| ArborError::NotFound("directory".to_string()))?;

        let mut entries = contents::load_entries(&mut conn, id, query.scope).await?;
        debug!("Listing {} entries of directory {}", entries.len(), id);
        contents::order_entries(&mut entries, query.sort);
        Ok(contents::paginate(entries, page))
    }

    /// List a directory with sorting and pagination done by the database.
    pub async fn get_directory_contents_raw(
        &self,
        id: &str,
        query: ContentsQuery,
    ) -> Result<Vec<DirectoryEntry>> {
        let page = query.page(self.default_page_length);
        page.validate()?;

        let mut conn = self.db.acquire().await?;
        DirectoryRepository::get_live(&mut conn, id)
            .await?
            .ok_or_else(|| ArborError::NotFound("directory".to_string()))?;

        contents::query_entries_raw(&mut conn, id, &query, page).await
    }

    /// Count live files and directories at any depth below `id`.
    pub async fn count_directory_children(&self, id: &str) -> Result<i64> {
        let mut tx = self.db.begin().await?;
        let directories = DirectoryRepository::count_descendants(&mut tx, id).await?;
        let files = FileRepository::count_descendants(&mut tx, id).await?;
        tx.commit().await?;
        Ok(directories + files)
    }

    /// Total bytes of all live versions below `id`; `None` when there are none.
    pub async fn get_directory_size(&self, id: &str) -> Result<Option<i64>> {
        let mut conn = self.db.acquire().await?;
        FileVersionRepository::total_size_under(&mut conn, id).await
    }

    /// Case-insensitive substring search over live directories, name ascending.
    pub async fn find_directories(&self, query: &str) -> Result<Vec<Directory>> {
        let mut conn = self.db.acquire().await?;
        DirectoryRepository::search(&mut conn, query).await
    }
}
