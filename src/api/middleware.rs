//! API middleware
//!
//! Contains the shared pieces of the HTTP layer:
//! - Application state
//! - Identity extraction from the upstream auth layer
//! - Error responses in the editor's `{success: 0, ...}` envelope

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::config::{Config, StorageConfig};
use crate::db::DynDatabasePool;
use crate::editor::{ComponentRegistry, EditorError};
use crate::services::{EditorService, MatchingService};
use crate::storage::{DynFileStorage, LocalFileStorage};

/// Header carrying the authenticated principal id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub editor_service: Arc<EditorService>,
    pub matching_service: Arc<MatchingService>,
    pub storage_config: Arc<StorageConfig>,
}

impl AppState {
    /// Wire the services on top of an open pool
    pub fn new(pool: DynDatabasePool, config: &Config) -> Self {
        let registry = Arc::new(ComponentRegistry::new());
        let storage_config = Arc::new(config.storage.clone());
        let storage: DynFileStorage = Arc::new(LocalFileStorage::from_config(&config.storage));

        let editor_service = Arc::new(EditorService::new(
            pool.clone(),
            registry.clone(),
            storage.clone(),
            storage_config.clone(),
        ));
        let matching_service = Arc::new(MatchingService::new(
            pool.clone(),
            registry,
            storage,
            storage_config.clone(),
        ));

        Self {
            pool,
            editor_service,
            matching_service,
            storage_config,
        }
    }
}

/// Principal forwarded by the upstream auth layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(|id| CurrentUser { id })
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(skip)]
    pub code: String,
    pub success: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ApiErrorDetail>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    pub errors: Value,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            success: 0,
            message: message.into(),
            errors: None,
        }
    }

    pub fn with_details(code: impl Into<String>, message: impl Into<String>, details: Value) -> Self {
        let code = code.into();
        let message = message.into();
        Self {
            errors: Some(ApiErrorDetail {
                code: code.clone(),
                message: message.clone(),
                errors: details,
            }),
            code,
            success: 0,
            message,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "BAD_REQUEST" | "STRUCTURAL_ERROR" | "PRECONDITION_FAILED" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" | "UNKNOWN_COMPONENT_TYPE" | "REFERENCE_ERROR" | "CONSTRAINT_ERROR" => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EditorError> for ApiError {
    fn from(err: EditorError) -> Self {
        let code = match &err {
            EditorError::Structural(_) => "STRUCTURAL_ERROR",
            EditorError::Validation { .. } => "VALIDATION_ERROR",
            EditorError::UnknownComponentType(_) => "UNKNOWN_COMPONENT_TYPE",
            EditorError::Reference { .. } => "REFERENCE_ERROR",
            EditorError::Constraint { .. } => "CONSTRAINT_ERROR",
            EditorError::NotFound(_) => return Self::not_found(err.to_string()),
            EditorError::Precondition(_) => "PRECONDITION_FAILED",
            EditorError::Forbidden(_) => return Self::forbidden(err.to_string()),
            EditorError::Internal(e) => {
                tracing::error!(error = ?e, "Editor request failed");
                return Self::internal_error("Internal server error");
            }
        };
        Self::with_details(code, err.to_string(), err.details())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{BlockError, FieldError};
    use axum::http::Request;

    #[test]
    fn test_editor_errors_map_to_status() {
        let validation = EditorError::validation(vec![BlockError {
            block_index: 2,
            block_id: Some("b".to_string()),
            component_type: Some("question".to_string()),
            message: "Invalid question payload".to_string(),
            errors: vec![FieldError::new("answers", "At least one answer is required")],
        }]);
        let api: ApiError = validation.into();
        assert_eq!(api.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = serde_json::to_value(&api).unwrap();
        assert_eq!(body["success"], 0);
        assert_eq!(body["errors"]["errors"][0]["block_index"], 2);

        let cases = [
            (EditorError::Structural("x".into()), StatusCode::BAD_REQUEST),
            (EditorError::Precondition("x".into()), StatusCode::BAD_REQUEST),
            (EditorError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (EditorError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (EditorError::UnknownComponentType("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (EditorError::Internal(anyhow::anyhow!("db down")), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let api = ApiError::from(EditorError::Internal(anyhow::anyhow!("secret dsn")));
        assert!(!api.message.contains("secret"));
        assert!(api.errors.is_none());
    }

    #[tokio::test]
    async fn test_current_user_from_header() {
        let (mut parts, _) = Request::builder()
            .header(USER_ID_HEADER, "42")
            .body(())
            .unwrap()
            .into_parts();
        let user = CurrentUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.id, 42);

        for value in ["", "abc", "-1", "0"] {
            let (mut parts, _) = Request::builder()
                .header(USER_ID_HEADER, value)
                .body(())
                .unwrap()
                .into_parts();
            let err = CurrentUser::from_request_parts(&mut parts, &()).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
