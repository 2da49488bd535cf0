use axum::extract::{Multipart, Path};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use docanalysis_client::{ApiClient, ClientError, TrainingConfig};
use serde_json::json;

const VALID_TOKEN: &str = "token-abc";

fn bearer_matches(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .map(|h| h == format!("Bearer {}", token))
        .unwrap_or(false)
}

async fn spawn_backend(app: Router) -> String {
    let _ = env_logger::builder().is_test(true).try_init();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api/v1", addr)
}

fn client_against(base_url: String) -> ApiClient {
    ApiClient::new().unwrap().with_base_url(base_url)
}

async fn upload_handler(headers: HeaderMap, mut multipart: Multipart) -> impl IntoResponse {
    if !bearer_matches(&headers, VALID_TOKEN) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "unauthorized" })),
        )
            .into_response();
    }

    let field = multipart.next_field().await.unwrap().unwrap();
    assert_eq!(field.name(), Some("file"));
    let name = field.file_name().unwrap().to_string();
    let bytes = field.bytes().await.unwrap();
    assert!(!bytes.is_empty());

    Json(json!({ "data": { "id": "doc-1", "name": name } })).into_response()
}

#[tokio::test]
async fn test_upload_document_unwraps_envelope() {
    let app = Router::new().route("/api/v1/documents/upload", post(upload_handler));
    let base_url = spawn_backend(app).await;
    let client = client_against(base_url);

    let document = client
        .upload_document(VALID_TOKEN, "contract.pdf", b"%PDF-1.4".to_vec())
        .await
        .unwrap();

    assert_eq!(document.id, "doc-1");
    assert_eq!(document.name, "contract.pdf");
}

#[tokio::test]
async fn test_compare_then_fetch_comparison() {
    let app = Router::new()
        .route(
            "/api/v1/documents/compare",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["document1_id"], "doc-1");
                assert_eq!(body["document2_id"], "doc-2");
                Json(json!({
                    "data": { "comparison_id": "cmp-7", "status": "pending", "differences": [] }
                }))
            }),
        )
        .route(
            "/api/v1/documents/comparison/{comparison_id}",
            get(|Path(comparison_id): Path<String>| async move {
                assert_eq!(comparison_id, "cmp-7");
                Json(json!({
                    "data": {
                        "comparison_id": "cmp-7",
                        "status": "completed",
                        "differences": [{
                            "type": "clause_changed",
                            "description": "payment terms differ",
                            "location": "section 4.2"
                        }]
                    }
                }))
            }),
        );
    let base_url = spawn_backend(app).await;
    let client = client_against(base_url);

    let pending = client
        .compare_documents(VALID_TOKEN, "doc-1", "doc-2")
        .await
        .unwrap();
    assert_eq!(pending.status, "pending");
    assert_eq!(pending.comparison_id.as_deref(), Some("cmp-7"));

    let report = client.get_comparison(VALID_TOKEN, "cmp-7").await.unwrap();
    assert_eq!(report.status, "completed");
    assert_eq!(report.differences.len(), 1);
    assert_eq!(report.differences[0].kind, "clause_changed");
}

#[tokio::test]
async fn test_adjusted_config_scales_with_file_count() {
    let app = Router::new().route(
        "/api/v1/admin/get-adjusted-config",
        post(|Json(body): Json<serde_json::Value>| async move {
            assert_eq!(body["num_files"], 50);
            assert_eq!(body["config"]["batchSize"], 32);
            Json(json!({
                "epochs": 20,
                "batchSize": 64,
                "learningRate": 0.0005,
                "validationSplit": 0.2
            }))
        }),
    );
    let base_url = spawn_backend(app).await;
    let client = client_against(base_url);

    let adjusted = client
        .adjusted_config(VALID_TOKEN, &TrainingConfig::default(), 50)
        .await
        .unwrap();

    assert_eq!(adjusted.epochs, 20);
    assert_eq!(adjusted.batch_size, 64);
    assert_eq!(adjusted.learning_rate, 0.0005);
}

#[tokio::test]
async fn test_adjusted_config_out_of_range_is_rejected() {
    // A server echoing values outside its own accepted ranges must not be
    // taken at face value
    let app = Router::new().route(
        "/api/v1/admin/get-adjusted-config",
        post(|| async {
            Json(json!({
                "epochs": 500,
                "batchSize": 64,
                "learningRate": 0.0005,
                "validationSplit": 0.2
            }))
        }),
    );
    let base_url = spawn_backend(app).await;
    let client = client_against(base_url);

    let err = client
        .adjusted_config(VALID_TOKEN, &TrainingConfig::default(), 10)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
}

#[tokio::test]
async fn test_upload_without_valid_token_is_unauthorized() {
    let app = Router::new().route("/api/v1/documents/upload", post(upload_handler));
    let base_url = spawn_backend(app).await;
    let client = client_against(base_url);

    let err = client
        .upload_document("stale-token", "contract.pdf", b"%PDF-1.4".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized));
}
