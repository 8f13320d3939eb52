//! Business logic services
//!
//! Each service owns its database access through a [`UnitOfWork`] per
//! action: it begins the unit, runs the editor pipeline and commits only on
//! success. Files that became unreferenced are deleted after the commit.

pub mod editor;
pub mod matching;

pub use editor::{
    ContentData, EditorService, LessonPageData, ObjectData, ObjectDataInput, ObjectRef,
    PostIdInput, PublishData, PublishInput, SaveContentInput,
};
pub use matching::MatchingService;

use crate::config::StorageConfig;
use crate::db::UnitOfWork;
use crate::editor::{EditorError, EditorResult, FieldError};
use crate::storage::{delete_quietly, FileStorage};

/// A file received from a multipart request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Check an upload against the storage limits
pub fn check_upload(config: &StorageConfig, file: &UploadedFile) -> EditorResult<()> {
    let mut errors = Vec::new();
    if file.data.is_empty() {
        errors.push(FieldError::new("file", "The submitted file is empty"));
    }
    if !config.is_type_allowed(&file.content_type) {
        errors.push(FieldError::new(
            "file",
            format!("Invalid file type: {}", file.content_type),
        ));
    }
    if file.data.len() as u64 > config.max_file_size {
        errors.push(FieldError::new(
            "file",
            format!(
                "File too large. Maximum size: {} bytes ({} MB)",
                config.max_file_size,
                config.max_file_size / 1024 / 1024
            ),
        ));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(EditorError::constraint("Invalid file", errors))
    }
}

/// Commit the unit of work, then remove the files it released
pub(crate) async fn commit_and_clean(uow: UnitOfWork, storage: &dyn FileStorage) -> EditorResult<()> {
    let files = uow.commit().await?;
    if !files.is_empty() {
        let deleted = delete_quietly(storage, &files).await;
        tracing::debug!(scheduled = files.len(), deleted, "Released stored files");
    }
    Ok(())
}
