//! Gemini REST 클라이언트 테스트
//!
//! 127.0.0.1에 목(mock) axum 서버를 띄워 요청 형식과 응답 파싱을 확인합니다.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use pdf_chat::embedding::EmbeddingOptions;
use pdf_chat::{EmbeddingProvider, GeminiEmbedding, GeminiGenerator, TextGenerator};

const API_KEY: &str = "test-key";

#[derive(Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

async fn mock_models(
    State(state): State<MockState>,
    Path(action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"message": "API key not valid", "status": "PERMISSION_DENIED"}})),
        )
            .into_response();
    }

    state
        .requests
        .lock()
        .unwrap()
        .push((action.clone(), body.clone()));

    let dimension = |req: &Value| req["outputDimensionality"].as_u64().unwrap_or(768) as usize;

    if action.starts_with("slow") {
        tokio::time::sleep(Duration::from_secs(3)).await;
    }

    if action.starts_with("broken") {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": {"message": "model overloaded", "status": "UNAVAILABLE"}})),
        )
            .into_response()
    } else if action.ends_with(":embedContent") {
        Json(json!({"embedding": {"values": vec![0.5f32; dimension(&body)]}})).into_response()
    } else if action.ends_with(":batchEmbedContents") {
        let embeddings: Vec<Value> = body["requests"]
            .as_array()
            .map(|reqs| {
                reqs.iter()
                    .map(|r| json!({"values": vec![0.25f32; dimension(r)]}))
                    .collect()
            })
            .unwrap_or_default();
        Json(json!({"embeddings": embeddings})).into_response()
    } else if action.ends_with(":generateContent") {
        if action.starts_with("silent") {
            return Json(json!({"candidates": []})).into_response();
        }
        Json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Crabs "}, {"text": "are the mascot."}]}
            }]
        }))
        .into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn spawn_mock() -> (SocketAddr, MockState) {
    let state = MockState::default();
    let app = Router::new()
        .route("/models/:action", post(mock_models))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

fn embedder(addr: SocketAddr, model: &str, api_key: &str) -> GeminiEmbedding {
    GeminiEmbedding::with_options(
        api_key.to_string(),
        EmbeddingOptions {
            model: model.to_string(),
            requests_per_minute: 6000,
            timeout: Some(Duration::from_secs(5)),
            base_url: format!("http://{}", addr),
            ..Default::default()
        },
    )
    .unwrap()
}

fn generator(addr: SocketAddr, model: &str, timeout: Option<Duration>) -> GeminiGenerator {
    GeminiGenerator::with_model(API_KEY.to_string(), model, timeout)
        .unwrap()
        .with_base_url(format!("http://{}", addr))
}

#[tokio::test]
async fn test_embed_single_text() {
    let (addr, state) = spawn_mock().await;
    let client = embedder(addr, "gemini-embedding-001", API_KEY);

    let vector = client.embed("hello world").await.unwrap();
    assert_eq!(vector.len(), 768);

    let requests = state.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "gemini-embedding-001:embedContent");
    assert_eq!(requests[0].1["content"]["parts"][0]["text"], "hello world");
    assert_eq!(requests[0].1["outputDimensionality"], 768);
}

#[tokio::test]
async fn test_embed_batch_splits_large_inputs() {
    let (addr, state) = spawn_mock().await;
    let client = embedder(addr, "gemini-embedding-001", API_KEY);

    let texts: Vec<String> = (0..150).map(|i| format!("paragraph {}", i)).collect();
    let vectors = client.embed_batch(&texts).await.unwrap();
    assert_eq!(vectors.len(), 150);
    assert!(vectors.iter().all(|v| v.len() == 768));

    let requests = state.requests.lock().unwrap();
    let batch_sizes: Vec<usize> = requests
        .iter()
        .filter(|(action, _)| action.ends_with(":batchEmbedContents"))
        .map(|(_, body)| body["requests"].as_array().unwrap().len())
        .collect();
    assert_eq!(batch_sizes, vec![100, 50]);
}

#[tokio::test]
async fn test_embed_rejected_key_is_error() {
    let (addr, _state) = spawn_mock().await;
    let client = embedder(addr, "gemini-embedding-001", "wrong-key");

    let err = client.embed("hello").await.unwrap_err();
    assert!(format!("{:#}", err).contains("PERMISSION_DENIED"));
}

#[tokio::test]
async fn test_generate_concatenates_parts() {
    let (addr, state) = spawn_mock().await;
    let generator = generator(addr, "gemini-2.0-flash", Some(Duration::from_secs(5)));

    let answer = generator.generate("QUESTION: 'mascot?'").await.unwrap();
    assert_eq!(answer, "Crabs are the mascot.");

    let requests = state.requests.lock().unwrap();
    assert_eq!(requests[0].0, "gemini-2.0-flash:generateContent");
    assert_eq!(
        requests[0].1["contents"][0]["parts"][0]["text"],
        "QUESTION: 'mascot?'"
    );
}

#[tokio::test]
async fn test_generate_without_candidates_is_error() {
    let (addr, _state) = spawn_mock().await;
    let generator = generator(addr, "silent-model", Some(Duration::from_secs(5)));

    assert!(generator.generate("anything").await.is_err());
}

#[tokio::test]
async fn test_generate_upstream_failure_is_error() {
    let (addr, _state) = spawn_mock().await;
    let generator = generator(addr, "broken-model", Some(Duration::from_secs(5)));

    let err = generator.generate("anything").await.unwrap_err();
    assert!(format!("{:#}", err).contains("UNAVAILABLE"));
}

#[tokio::test]
async fn test_generate_times_out_when_configured() {
    let (addr, _state) = spawn_mock().await;
    let generator = generator(addr, "slow-model", Some(Duration::from_millis(200)));

    assert!(generator.generate("anything").await.is_err());
}

#[tokio::test]
async fn test_generate_waits_without_timeout() {
    let (addr, _state) = spawn_mock().await;
    let generator = generator(addr, "slow-model", None);

    let answer = generator.generate("anything").await.unwrap();
    assert_eq!(answer, "Crabs are the mascot.");
}
