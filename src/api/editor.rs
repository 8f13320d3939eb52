//! Editor API endpoints
//!
//! - `POST /editor/post-edit?action=<name>`: editor actions on a post
//! - `POST /editor/file-control`: attachment upload/removal (multipart)
//! - `POST /editor/posts`: create an editor post

use axum::{
    body::Bytes,
    extract::{Multipart, Query, State},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::{de::DeserializeOwned, Deserialize};
use std::str::FromStr;

use super::middleware::{ApiError, AppState, CurrentUser};
use super::responses::{ActionResponse, AttachmentData, ItemsData, LessonPageResponse, MessageData};
use crate::models::CreateEditorPostInput;
use crate::services::{ObjectDataInput, PostIdInput, PublishInput, SaveContentInput, UploadedFile};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/editor/post-edit", post(post_edit))
        .route("/editor/file-control", post(file_control))
        .route("/editor/posts", post(create_post))
}

/// Actions accepted by `post-edit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorAction {
    LoadContent,
    SaveContent,
    LoadDemoLessonData,
    BuildAndPublishContent,
    LoadContentObjData,
    LoadAttachmentsMedia,
    DestroyPostEditor,
}

impl EditorAction {
    pub const ALL: [EditorAction; 7] = [
        EditorAction::LoadContent,
        EditorAction::SaveContent,
        EditorAction::LoadDemoLessonData,
        EditorAction::BuildAndPublishContent,
        EditorAction::LoadContentObjData,
        EditorAction::LoadAttachmentsMedia,
        EditorAction::DestroyPostEditor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::LoadContent => "load-content",
            Self::SaveContent => "save-content",
            Self::LoadDemoLessonData => "load-demo-lesson-data",
            Self::BuildAndPublishContent => "build-and-publish-content",
            Self::LoadContentObjData => "load-content-obj-data",
            Self::LoadAttachmentsMedia => "load-attachments-media",
            Self::DestroyPostEditor => "destroy-post-editor",
        }
    }
}

impl FromStr for EditorAction {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| ApiError::bad_request("`action` is invalid"))
    }
}

#[derive(Debug, Deserialize)]
pub struct ActionQuery {
    pub action: Option<String>,
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
}

/// POST /api/v1/editor/post-edit?action=<name>
async fn post_edit(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ActionQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let action: EditorAction = query
        .action
        .ok_or_else(|| ApiError::bad_request("`action` is required"))?
        .parse()?;
    let service = &state.editor_service;

    tracing::debug!(action = action.name(), user_id = user.id, "Editor action");

    let response = match action {
        EditorAction::LoadContent => {
            let input: PostIdInput = parse_body(&body)?;
            ActionResponse::ok(service.load_content(input.post_id).await?).into_response()
        }
        EditorAction::SaveContent => {
            let input: SaveContentInput = parse_body(&body)?;
            ActionResponse::ok(service.save_content(input).await?).into_response()
        }
        EditorAction::LoadDemoLessonData => {
            let input: PostIdInput = parse_body(&body)?;
            let lesson_page = service.load_demo_lesson_data(input.post_id).await?;
            ActionResponse::ok(LessonPageResponse { lesson_page }).into_response()
        }
        EditorAction::BuildAndPublishContent => {
            let input: PublishInput = parse_body(&body)?;
            ActionResponse::ok(service.build_and_publish(input).await?).into_response()
        }
        EditorAction::LoadContentObjData => {
            let input: ObjectDataInput = parse_body(&body)?;
            let items = service.load_content_obj_data(input).await?;
            ActionResponse::ok(ItemsData { items }).into_response()
        }
        EditorAction::LoadAttachmentsMedia => {
            let input: PostIdInput = parse_body(&body)?;
            let items = service.load_attachments_media(input.post_id).await?;
            ActionResponse::ok(ItemsData { items }).into_response()
        }
        EditorAction::DestroyPostEditor => {
            let input: PostIdInput = parse_body(&body)?;
            service.destroy_post_editor(input.post_id, user.id).await?;
            ActionResponse::ok(MessageData::new("Post destroyed")).into_response()
        }
    };
    Ok(response)
}

/// Read a multipart file field
pub(crate) async fn read_file(field: axum::extract::multipart::Field<'_>) -> Result<UploadedFile, ApiError> {
    let name = field
        .file_name()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let content_type = field
        .content_type()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?;
    Ok(UploadedFile {
        name,
        content_type,
        data: data.to_vec(),
    })
}

pub(crate) fn parse_id(value: &str, field: &str) -> Result<i64, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("`{}` is invalid", field)))
}

/// POST /api/v1/editor/file-control
///
/// Multipart fields: `post_id`, `file_action` (`upload` | `remove`), and
/// `file` or `attachment_id`.
async fn file_control(
    State(state): State<AppState>,
    _user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut post_id = None;
    let mut file_action = None;
    let mut attachment_id = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => file = Some(read_file(field).await?),
            "post_id" | "file_action" | "attachment_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read multipart: {}", e)))?;
                match name.as_str() {
                    "post_id" => post_id = Some(parse_id(&text, "post_id")?),
                    "attachment_id" => attachment_id = Some(parse_id(&text, "attachment_id")?),
                    _ => file_action = Some(text),
                }
            }
            _ => continue,
        }
    }

    let post_id = post_id.ok_or_else(|| ApiError::bad_request("`post_id` is required"))?;
    let service = &state.editor_service;
    match file_action.as_deref() {
        Some("upload") => {
            let file = file.ok_or_else(|| ApiError::bad_request("No file provided"))?;
            let attachment = service.upload_attachment(post_id, file).await?;
            Ok(ActionResponse::ok(AttachmentData {
                message: "File uploaded".to_string(),
                attachment,
            })
            .into_response())
        }
        Some("remove") => {
            let attachment_id =
                attachment_id.ok_or_else(|| ApiError::bad_request("`attachment_id` is required"))?;
            let attachment = service.remove_attachment(post_id, attachment_id).await?;
            Ok(ActionResponse::ok(AttachmentData {
                message: "File removed".to_string(),
                attachment,
            })
            .into_response())
        }
        Some(_) => Err(ApiError::bad_request("`file_action` is invalid")),
        None => Err(ApiError::bad_request("`file_action` is required")),
    }
}

/// POST /api/v1/editor/posts
async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    body: Bytes,
) -> Result<Response, ApiError> {
    let input: CreateEditorPostInput = parse_body(&body)?;
    let instance = state.editor_service.create_editor_post(user.id, input).await?;
    Ok(ActionResponse::ok(instance).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_round_trip() {
        for action in EditorAction::ALL {
            assert_eq!(action.name().parse::<EditorAction>().unwrap(), action);
        }
        let err = "publish".parse::<EditorAction>().unwrap_err();
        assert_eq!(err.message, "`action` is invalid");
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(" 12 ", "post_id").unwrap(), 12);
        assert_eq!(parse_id("x", "post_id").unwrap_err().message, "`post_id` is invalid");
    }
}
