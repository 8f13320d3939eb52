//! Attachment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content type tag of attachments owned by an editor post
pub const POST_CONTENT_TYPE: &str = "post";

/// Stored file metadata owned by another row through a generic reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Attachment {
    pub id: i64,
    pub name: String,
    pub extension: String,
    pub alt: String,
    pub url: String,
    pub size: i64,
    pub file_type: String,
    /// Storage key, `None` for link-only attachments
    pub file: Option<String>,
    pub storage_engine: String,
    pub attachment_type: String,
    pub content_type: Option<String>,
    pub object_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values for inserting an attachment
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub name: String,
    pub extension: String,
    pub url: String,
    pub size: i64,
    pub file_type: String,
    pub file: Option<String>,
    pub storage_engine: String,
    pub content_type: Option<String>,
    pub object_id: Option<i64>,
}
