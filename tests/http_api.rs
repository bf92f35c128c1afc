use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use psdtext::application::service::{PsdTextService, RENDER_CONTENT_TYPE};
use psdtext::infra::documents::DocumentDirectory;
use psdtext::infra::editor::{InMemoryEditor, MemoryLayer};
use psdtext::infra::http::{AppState, HEALTH_PATH, RequestContext, build_router, messages};
use psdtext::infra::storage::InMemoryObjectStore;
use psdtext_api_types::{
    TextUpdate, UPDATE_PSD_TEXT_PATH, UpdatePsdTextRequest, UpdatePsdTextResponse,
};

const BUCKET_URL: &str = "https://psd-bucket.oss-cn-hangzhou.aliyuncs.com";
const BODY_LIMIT: usize = 64 * 1024;

struct TestApp {
    dir: TempDir,
    editor: InMemoryEditor,
    store: InMemoryObjectStore,
}

impl TestApp {
    fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let source = dir.path().join("1.psd");
        std::fs::write(&source, b"8BPS").expect("write source");
        let editor = InMemoryEditor::new().with_document(
            source,
            [
                MemoryLayer::text("title", "Original title"),
                MemoryLayer::text("test_layer_2", "Original body"),
                MemoryLayer::pixel("background"),
            ],
        );
        Self {
            dir,
            editor,
            store: InMemoryObjectStore::new(BUCKET_URL),
        }
    }

    fn with_editor(mut self, editor: InMemoryEditor) -> Self {
        self.editor = editor;
        self
    }

    fn router(&self) -> Router {
        let service = PsdTextService::new(
            DocumentDirectory::new(self.dir.path().to_path_buf()),
            Arc::new(self.editor.clone()),
            Arc::new(self.store.clone()),
            "psd-outputs",
        );
        build_router(
            AppState {
                service: Arc::new(service),
            },
            BODY_LIMIT,
        )
    }

    fn render_path(&self) -> std::path::PathBuf {
        self.dir.path().join("1_output.jpg")
    }

    async fn post(&self, body: impl Into<Body>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(UPDATE_PSD_TEXT_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .expect("request should build");
        let response = self
            .router()
            .oneshot(request)
            .await
            .expect("router should respond");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();
        let value = serde_json::from_slice(&bytes).expect("response should be JSON");
        (status, value)
    }

    async fn post_json(&self, payload: Value) -> (StatusCode, Value) {
        self.post(payload.to_string()).await
    }
}

fn assert_absent(path: &Path) {
    assert!(!path.exists(), "{} should have been removed", path.display());
}

#[tokio::test]
async fn publishes_render_and_reports_layers() {
    let app = TestApp::new();
    let request = UpdatePsdTextRequest {
        psd_id: "1".to_string(),
        updates: [
            ("title", "Test text 1"),
            ("test_layer_2", "Test text 2"),
            ("nonexistent_layer", "Should fail"),
        ]
        .into_iter()
        .map(|(layer_id, text)| TextUpdate {
            layer_id: layer_id.to_string(),
            text: text.to_string(),
        })
        .collect(),
    };
    let (status, body) = app
        .post_json(serde_json::to_value(&request).expect("serialize request"))
        .await;

    assert_eq!(status, StatusCode::OK);
    let body: UpdatePsdTextResponse = serde_json::from_value(body).expect("response shape");
    assert!(body.success);
    assert_eq!(body.message, "Text updated and file uploaded successfully");
    assert_eq!(body.updated_layers, ["title", "test_layer_2"]);
    assert_eq!(body.failed_layers.len(), 1);
    assert_eq!(
        body.failed_layers[0].layer_id.as_deref(),
        Some("nonexistent_layer")
    );
    assert_eq!(body.oss_path, "psd-outputs/1_output.jpg");
    assert_eq!(
        body.oss_url,
        format!("{BUCKET_URL}/psd-outputs/1_output.jpg")
    );

    let stored = app
        .store
        .object("psd-outputs/1_output.jpg")
        .await
        .expect("render uploaded");
    assert_eq!(stored.content_type, RENDER_CONTENT_TYPE);
    assert!(!stored.body.is_empty());
    assert_absent(&app.render_path());
    assert_eq!(app.editor.close_count(), 1);
}

#[tokio::test]
async fn numeric_ids_address_the_same_document() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json(json!({
            "psd_id": 1,
            "updates": [{ "layer_id": "title", "text": "Numeric" }]
        }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["oss_path"], json!("psd-outputs/1_output.jpg"));
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let app = TestApp::new();
    for payload in [
        json!({ "psd_id": "1" }),
        json!({ "updates": [] }),
        json!([1, 2, 3]),
    ] {
        let (status, body) = app.post_json(payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": messages::MISSING_FIELDS }));
    }
    assert_eq!(app.editor.open_count(), 0);
}

#[tokio::test]
async fn invalid_json_is_rejected() {
    let app = TestApp::new();
    let (status, body) = app.post("{not json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": messages::MISSING_FIELDS }));
}

#[tokio::test]
async fn non_list_updates_are_rejected() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json(json!({ "psd_id": "1", "updates": "title" }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": messages::UPDATES_NOT_A_LIST }));
}

#[tokio::test]
async fn path_like_ids_are_rejected() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json(json!({ "psd_id": "../1", "updates": [] }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": messages::INVALID_PSD_ID }));
}

#[tokio::test]
async fn unknown_documents_are_not_found() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json(json!({
            "psd_id": "999",
            "updates": [{ "layer_id": "title", "text": "x" }]
        }))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "PSD file not found" }));
    assert_eq!(app.editor.open_count(), 0);
}

#[tokio::test]
async fn no_updated_layers_skips_upload() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json(json!({
            "psd_id": "1",
            "updates": [
                { "layer_id": "ghost", "text": "a" },
                { "layer_id": "background", "text": "b" },
                { "text": "orphan" }
            ]
        }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("No layers were updated"));
    let failed = body["failed_layers"].as_array().expect("failed layers");
    assert_eq!(failed.len(), 3);
    assert_eq!(failed[0]["layer_id"], json!("ghost"));
    assert_eq!(failed[1]["error"], json!("Not a text layer"));
    assert_eq!(failed[2], json!({ "error": "Invalid update format" }));

    assert_eq!(app.store.put_calls().await, 0);
    assert_absent(&app.render_path());
}

#[tokio::test]
async fn empty_update_list_updates_nothing() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json(json!({ "psd_id": "1", "updates": [] }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["failed_layers"], json!([]));
    assert_eq!(app.store.put_calls().await, 0);
}

#[tokio::test]
async fn upload_failures_are_internal_errors_and_clean_up() {
    let app = TestApp::new();
    app.store.fail_uploads("bucket unavailable").await;

    let (status, body) = app
        .post_json(json!({
            "psd_id": "1",
            "updates": [{ "layer_id": "title", "text": "x" }]
        }))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["error"]
            .as_str()
            .expect("error message")
            .contains("bucket unavailable")
    );
    assert!(body.get("failed_layers").is_none());
    assert_eq!(app.store.put_calls().await, 1);
    assert_absent(&app.render_path());
}

#[tokio::test]
async fn editor_failures_are_internal_errors() {
    let app = TestApp::new();
    let editor = app.editor.clone().fail_open("application not running");
    let app = app.with_editor(editor);

    let (status, body) = app
        .post_json(json!({
            "psd_id": "1",
            "updates": [{ "layer_id": "title", "text": "x" }]
        }))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["error"]
            .as_str()
            .expect("error message")
            .contains("application not running")
    );
    assert_eq!(app.store.put_calls().await, 0);
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let app = TestApp::new();
    let text = "x".repeat(BODY_LIMIT + 1);
    let (status, body) = app
        .post_json(json!({
            "psd_id": "1",
            "updates": [{ "layer_id": "title", "text": text }]
        }))
        .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].is_string());
    assert_eq!(app.editor.open_count(), 0);
}

#[tokio::test]
async fn health_endpoint_reports_no_content() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri(HEALTH_PATH)
        .body(Body::empty())
        .expect("request should build");
    let response = app
        .router()
        .oneshot(request)
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn responses_carry_request_id_and_document() {
    let app = TestApp::new();
    let router = app.router();
    let mut request_ids = Vec::new();

    for (psd_id, expected_status) in [("1", StatusCode::OK), ("999", StatusCode::NOT_FOUND)] {
        let payload = json!({
            "psd_id": psd_id,
            "updates": [{ "layer_id": "title", "text": "x" }]
        });
        let request = Request::builder()
            .method(Method::POST)
            .uri(UPDATE_PSD_TEXT_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request should build");
        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");

        assert_eq!(response.status(), expected_status);
        let ctx = response
            .extensions()
            .get::<RequestContext>()
            .expect("request context");
        assert_eq!(ctx.document(), Some(psd_id));
        assert!(!ctx.request_id.is_empty());
        request_ids.push(ctx.request_id.clone());
    }

    assert_ne!(request_ids[0], request_ids[1]);
}
