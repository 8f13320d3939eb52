//! Matching component API endpoints

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::Value;

use super::editor::{parse_id, read_file};
use super::middleware::{ApiError, AppState, CurrentUser};
use super::responses::{ActionResponse, MessageData};
use crate::services::matching::ImageAction;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/matching", get(list).post(create))
        .route("/matching/{id}", get(detail).put(update).delete(remove))
        .route("/matching/{id}/file-control", post(file_control))
}

fn parse_payload(body: &[u8]) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
}

/// GET /api/v1/matching
async fn list(State(state): State<AppState>, _user: CurrentUser) -> Result<Response, ApiError> {
    let items = state.matching_service.list().await?;
    Ok(ActionResponse::ok(items).into_response())
}

/// GET /api/v1/matching/{id}
async fn detail(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(ActionResponse::ok(state.matching_service.get(id).await?).into_response())
}

/// POST /api/v1/matching
async fn create(
    State(state): State<AppState>,
    _user: CurrentUser,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload = parse_payload(&body)?;
    Ok(ActionResponse::ok(state.matching_service.create(&payload).await?).into_response())
}

/// PUT /api/v1/matching/{id}
async fn update(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload = parse_payload(&body)?;
    Ok(ActionResponse::ok(state.matching_service.update(id, &payload).await?).into_response())
}

/// DELETE /api/v1/matching/{id}
async fn remove(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.matching_service.delete(id).await?;
    Ok(ActionResponse::ok(MessageData::new("Matching component deleted")).into_response())
}

/// POST /api/v1/matching/{id}/file-control
///
/// Multipart fields: `element_id`, `file_action` (`upload` | `remove`), `file`.
async fn file_control(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut element_id = None;
    let mut file_action = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => file = Some(read_file(field).await?),
            "element_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read multipart: {}", e)))?;
                element_id = Some(parse_id(&text, "element_id")?);
            }
            "file_action" => {
                file_action = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart: {}", e)))?,
                );
            }
            _ => continue,
        }
    }

    let element_id = element_id.ok_or_else(|| ApiError::bad_request("`element_id` is required"))?;
    let action = match file_action.as_deref() {
        Some("upload") => ImageAction::Upload(file.ok_or_else(|| ApiError::bad_request("No file provided"))?),
        Some("remove") => ImageAction::Remove,
        Some(_) => return Err(ApiError::bad_request("`file_action` is invalid")),
        None => return Err(ApiError::bad_request("`file_action` is required")),
    };

    let updated = state.matching_service.file_control(id, element_id, action).await?;
    Ok(ActionResponse::ok(updated).into_response())
}
