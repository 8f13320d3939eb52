//! Shared API response types
//!
//! Successful editor responses are wrapped as `{"success": 1, "data": ...}`.

use axum::Json;
use serde::Serialize;

use crate::models::Attachment;

#[derive(Debug, Serialize)]
pub struct ActionResponse<T> {
    pub success: u8,
    pub data: T,
}

impl<T: Serialize> ActionResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self { success: 1, data })
    }
}

#[derive(Debug, Serialize)]
pub struct MessageData {
    pub message: String,
}

impl MessageData {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Items list, used by the object data and media actions
#[derive(Debug, Serialize)]
pub struct ItemsData<T> {
    pub items: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct LessonPageResponse<T> {
    pub lesson_page: T,
}

#[derive(Debug, Serialize)]
pub struct AttachmentData {
    pub message: String,
    pub attachment: Attachment,
}
