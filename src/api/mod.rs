//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - Editor actions and attachment control
//! - Matching component CRUD
//! - Health check
//!
//! Stored media is served under the configured public URL.

pub mod editor;
pub mod matching;
pub mod middleware;
pub mod responses;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, CurrentUser, USER_ID_HEADER};
use responses::{ActionResponse, MessageData};

/// Build the main API router
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(editor::router())
        .merge(matching::router())
}

/// GET /api/v1/health
async fn health(State(state): State<AppState>) -> Result<Response, ApiError> {
    state.pool.ping().await.map_err(|e| {
        tracing::error!(error = %e, "Health check failed");
        ApiError::internal_error("Database unavailable")
    })?;
    Ok(ActionResponse::ok(MessageData::new("ok")).into_response())
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let origin = match cors_origin.parse::<HeaderValue>() {
        Ok(value) if cors_origin != "*" => AllowOrigin::exact(value),
        _ => AllowOrigin::any(),
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(USER_ID_HEADER),
        ])
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let router = Router::new().nest("/api/v1", build_api_router());

    // Stored media, when served from this process
    let public_url = state.storage_config.public_url.trim_end_matches('/');
    let router = if public_url.starts_with('/') && public_url.len() > 1 {
        router.nest_service(public_url, ServeDir::new(&state.storage_config.path))
    } else {
        router
    };

    router
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, StorageConfig};
    use crate::db::repositories::{page, user};
    use crate::db::{create_test_pool, migrations::run_migrations, UnitOfWork};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "lessonpress-test-boundary";

    struct TestApp {
        router: Router,
        user_id: i64,
        page_id: i64,
        _dir: TempDir,
    }

    async fn test_app() -> TestApp {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let author = user::create(&mut uow, "instructor", "i@example.com").await.unwrap();
        let lesson = page::create(&mut uow, "Lesson").await.unwrap();
        uow.commit().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            storage: StorageConfig {
                path: dir.path().to_path_buf(),
                ..StorageConfig::default()
            },
            ..Config::default()
        };
        let router = build_router(AppState::new(pool, &config), "http://localhost:3000");
        TestApp {
            router,
            user_id: author.id,
            page_id: lesson.id,
            _dir: dir,
        }
    }

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn json_request(app: &TestApp, method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(USER_ID_HEADER, app.user_id.to_string())
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_request(app: &TestApp, uri: &str, fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Request<Body> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((filename, content_type, data)) = file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    BOUNDARY, filename, content_type
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header(USER_ID_HEADER, app.user_id.to_string())
            .body(Body::from(body))
            .unwrap()
    }

    async fn create_post(app: &TestApp) -> i64 {
        let (status, body) = send(
            app,
            json_request(app, "POST", "/api/v1/editor/posts", json!({"title": "Draft", "page_id": app.page_id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_action_is_required_and_checked() {
        let app = test_app().await;

        let (status, body) = send(&app, json_request(&app, "POST", "/api/v1/editor/post-edit", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"success": 0, "message": "`action` is required"}));

        let (status, body) = send(
            &app,
            json_request(&app, "POST", "/api/v1/editor/post-edit?action=publish-everything", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"success": 0, "message": "`action` is invalid"}));
    }

    #[tokio::test]
    async fn test_identity_is_required() {
        let app = test_app().await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/editor/post-edit?action=load-content")
            .body(Body::from(r#"{"post_id": 1}"#))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], 0);
    }

    #[tokio::test]
    async fn test_publish_round_trip() {
        let app = test_app().await;
        let post_id = create_post(&app).await;

        let content = json!({"blocks": [
            {"id": "a", "type": "text-pro", "data": {"values": {"title": "A", "text": "hi"}}},
            {"id": "b", "type": "record-audio", "data": {"values": {"title": "Repeat after me"}}}
        ]});
        let (status, body) = send(
            &app,
            json_request(
                &app,
                "POST",
                "/api/v1/editor/post-edit?action=build-and-publish-content",
                json!({"post_id": post_id, "content": content}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], 1);
        assert_eq!(body["data"]["elements"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["instance"]["publication_status"], 1);
        assert!(body["data"]["content"]["blocks"][1]["data"]["element_id"].is_i64());

        let (status, body) = send(
            &app,
            json_request(&app, "POST", "/api/v1/editor/post-edit?action=load-content", json!({"post_id": post_id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let stored: Value = serde_json::from_str(body["data"]["content"].as_str().unwrap()).unwrap();
        assert_eq!(stored["blocks"][0]["data"]["values"]["text"], "hi");
    }

    #[tokio::test]
    async fn test_publish_validation_envelope() {
        let app = test_app().await;
        let post_id = create_post(&app).await;

        let (status, body) = send(
            &app,
            json_request(
                &app,
                "POST",
                "/api/v1/editor/post-edit?action=build-and-publish-content",
                json!({"post_id": post_id, "content": {"blocks": [
                    {"id": "q", "type": "question", "data": {"values": {"text": "?"}}},
                    {"id": "x", "type": "carousel", "data": {}}
                ]}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], 0);
        let errors = body["errors"]["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0]["block_index"], 0);
        assert_eq!(errors[1]["message"], "Unknown component type: carousel");

        let (status, _) = send(
            &app,
            json_request(&app, "POST", "/api/v1/editor/post-edit?action=load-content", json!({"post_id": 999})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            json_request(&app, "POST", "/api/v1/editor/post-edit?action=save-content", json!({"content": "{}"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_file_control_upload_is_served() {
        let app = test_app().await;
        let post_id = create_post(&app).await.to_string();

        let (status, body) = send(
            &app,
            multipart_request(
                &app,
                "/api/v1/editor/file-control",
                &[("post_id", post_id.as_str()), ("file_action", "upload")],
                Some(("diagram.png", "image/png", b"png bytes")),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let url = body["data"]["attachment"]["url"].as_str().unwrap().to_string();
        assert!(url.starts_with("/media/attachments/"));

        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri(&url).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"png bytes");

        let (status, body) = send(
            &app,
            multipart_request(
                &app,
                "/api/v1/editor/file-control",
                &[("post_id", post_id.as_str()), ("file_action", "shred")],
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "`file_action` is invalid");
    }

    #[tokio::test]
    async fn test_matching_endpoints() {
        let app = test_app().await;
        let payload = json!({
            "title": "Pairs",
            "elements": [{"uid": "e1", "text": "a"}, {"uid": "e2", "text": "b"}],
            "couples": [{"first_element": "e1", "second_element": "e2"}]
        });
        let (status, body) = send(&app, json_request(&app, "POST", "/api/v1/matching", payload)).await;
        assert_eq!(status, StatusCode::OK);
        let id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = send(&app, json_request(&app, "GET", &format!("/api/v1/matching/{}", id), Value::Null)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["couples"].as_array().unwrap().len(), 1);

        let (status, body) = send(
            &app,
            json_request(&app, "PUT", &format!("/api/v1/matching/{}", id), json!({"elements": [], "couples": []})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"]["code"], "CONSTRAINT_ERROR");

        let (status, _) = send(&app, json_request(&app, "DELETE", &format!("/api/v1/matching/{}", id), Value::Null)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, json_request(&app, "GET", &format!("/api/v1/matching/{}", id), Value::Null)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app().await;
        let (status, body) = send(&app, json_request(&app, "GET", "/api/v1/health", Value::Null)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message"], "ok");
    }
}
