//! 임베딩 모듈 - Gemini API를 통한 텍스트 벡터화
//!
//! 텍스트를 벡터로 변환하는 Gemini 임베딩 프로바이더입니다.
//! 업로드된 PDF 청크와 질문을 같은 공간으로 임베딩합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = GeminiEmbedding::new(get_api_key()?)?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    ///
    /// 하나라도 실패하면 전체가 실패합니다.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Google Gemini Embedding
// ============================================================================

/// Gemini API 기본 주소
/// source: https://ai.google.dev/api
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// 기본 임베딩 모델 (MRL 지원)
pub const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";

/// 기본 임베딩 차원
pub const DEFAULT_DIMENSION: usize = 768;

/// Rate Limiter 기본값 (Gemini 무료 티어: 60 RPM)
pub const DEFAULT_RATE_LIMIT_RPM: u32 = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// batchEmbedContents 한 번에 보낼 수 있는 최대 요청 수
const MAX_BATCH_SIZE: usize = 100;

/// 임베딩 클라이언트 설정
#[derive(Debug, Clone)]
pub struct EmbeddingOptions {
    /// 모델 이름 (`models/` 접두사 제외)
    pub model: String,
    /// 출력 차원 (768, 1536, 3072 중 선택)
    pub dimension: usize,
    /// 분당 최대 요청 수
    pub requests_per_minute: u32,
    /// HTTP 요청 타임아웃 (None이면 제한 없음)
    pub timeout: Option<Duration>,
    /// API 주소 (테스트용으로 교체 가능)
    pub base_url: String,
}

impl Default for EmbeddingOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
            requests_per_minute: DEFAULT_RATE_LIMIT_RPM,
            timeout: None,
            base_url: GEMINI_API_BASE.to_string(),
        }
    }
}

/// Google Gemini 임베딩 구현체
///
/// source: https://ai.google.dev/gemini-api/docs/embeddings
#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: String,
    client: reqwest::Client,
    options: EmbeddingOptions,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// Rate Limiter with minimum delay between requests
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay: window / max_requests.max(1),
            last_request: None,
        }
    }

    /// 요청 가능 여부 확인 및 대기
    async fn acquire(&mut self) {
        // 1. 최소 딜레이 적용 (버스트 방지)
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                let wait_time = self.min_delay - elapsed;
                tracing::debug!("Min delay: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        let now = Instant::now();

        // 2. 윈도우 밖의 오래된 요청 제거
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        // 3. Rate limit 초과 시 대기
        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window.saturating_sub(now.duration_since(oldest));
                if !wait_time.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        // 4. 현재 요청 기록
        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

impl GeminiEmbedding {
    /// 기본 설정으로 생성
    ///
    /// # Arguments
    /// * `api_key` - Google AI API 키
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_options(api_key, EmbeddingOptions::default())
    }

    /// 설정을 지정하여 생성
    pub fn with_options(api_key: String, options: EmbeddingOptions) -> Result<Self> {
        // 유효한 차원 확인
        if ![768, 1536, 3072].contains(&options.dimension) {
            anyhow::bail!(
                "Invalid dimension: {}. Must be 768, 1536, or 3072",
                options.dimension
            );
        }

        if options.requests_per_minute == 0 {
            anyhow::bail!("requests_per_minute must be at least 1");
        }

        let client = http_client(options.timeout)?;

        let rate_limiter = Arc::new(Mutex::new(RateLimiter::new(
            options.requests_per_minute,
            RATE_LIMIT_WINDOW,
        )));

        Ok(Self {
            api_key,
            client,
            options,
            rate_limiter,
        })
    }

    /// 임베딩 차원 반환
    pub fn dimension(&self) -> usize {
        self.options.dimension
    }

    fn model_path(&self) -> String {
        format!("models/{}", self.options.model)
    }

    fn build_request(&self, text: &str) -> EmbedRequest {
        EmbedRequest {
            model: self.model_path(),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            task_type: TASK_TYPE_RETRIEVAL_DOCUMENT.to_string(),
            output_dimensionality: Some(self.options.dimension),
        }
    }

    /// API 호출 후 응답 본문 파싱
    async fn post<Req: Serialize + Sync, Resp: DeserializeOwned>(
        &self,
        method: &str,
        request: &Req,
    ) -> Result<Resp> {
        {
            let mut limiter = self.rate_limiter.lock().await;
            limiter.acquire().await;
        }

        let url = format!(
            "{}/{}:{}",
            self.options.base_url.trim_end_matches('/'),
            self.model_path(),
            method
        );

        // API 키는 URL이 아닌 헤더로 전송
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .context("Failed to send embedding request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            return Err(gemini_error(status, &body));
        }

        serde_json::from_str(&body).context("Failed to parse embedding response")
    }

    fn check_dimension(&self, values: &[f32]) -> Result<()> {
        if values.len() != self.options.dimension {
            anyhow::bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.options.dimension,
                values.len()
            );
        }
        Ok(())
    }
}

/// 문서 검색용 task type (질문과 청크 모두 동일하게 사용)
const TASK_TYPE_RETRIEVAL_DOCUMENT: &str = "RETRIEVAL_DOCUMENT";

/// Gemini API 요청 본문
/// source: https://ai.google.dev/gemini-api/docs/embeddings
#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(rename = "taskType")]
    task_type: String,
    #[serde(rename = "outputDimensionality", skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

/// Gemini API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

/// Gemini API용 HTTP 클라이언트 (생성 API와 공용)
///
/// 타임아웃을 지정하지 않으면 응답을 끝까지 기다립니다.
pub(crate) fn http_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().context("Failed to create HTTP client")
}

/// 실패 응답을 에러로 변환 (생성 API와 공용)
pub(crate) fn gemini_error(status: reqwest::StatusCode, body: &str) -> anyhow::Error {
    match serde_json::from_str::<GeminiError>(body) {
        Ok(error) => anyhow::anyhow!(
            "Gemini API error ({}): {}",
            error.error.status,
            error.error.message
        ),
        Err(_) => anyhow::anyhow!("Gemini API error ({}): {}", status, body),
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // 빈 텍스트 처리
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.options.dimension]);
        }

        let response: EmbedResponse = self.post("embedContent", &self.build_request(text)).await?;
        self.check_dimension(&response.embedding.values)?;
        Ok(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(MAX_BATCH_SIZE).enumerate() {
            tracing::debug!(
                "Embedding batch {} ({} texts, {} total)",
                i + 1,
                batch.len(),
                texts.len()
            );

            let request = BatchEmbedRequest {
                requests: batch.iter().map(|t| self.build_request(t)).collect(),
            };
            let response: BatchEmbedResponse = self.post("batchEmbedContents", &request).await?;

            if response.embeddings.len() != batch.len() {
                anyhow::bail!(
                    "Embedding count mismatch: sent {}, received {}",
                    batch.len(),
                    response.embeddings.len()
                );
            }

            for embedding in response.embeddings {
                self.check_dimension(&embedding.values)?;
                results.push(embedding.values);
            }
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.options.dimension
    }

    fn name(&self) -> &str {
        &self.options.model
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (환경변수에서)
///
/// 우선순위:
/// 1. `GEMINI_API_KEY` 환경변수
/// 2. `GOOGLE_AI_API_KEY` 환경변수
pub fn get_api_key() -> Result<String> {
    for var in ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"] {
        if let Ok(key) = std::env::var(var) {
            if !key.is_empty() {
                tracing::debug!("Using API key from {}", var);
                return Ok(key);
            }
        }
    }

    anyhow::bail!(
        "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable.\n\
         Get your API key at: https://aistudio.google.com/app/apikey"
    )
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    get_api_key().is_ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn options_with_dimension(dimension: usize) -> EmbeddingOptions {
        EmbeddingOptions {
            dimension,
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_dimension() {
        let result =
            GeminiEmbedding::with_options("fake_key".to_string(), options_with_dimension(999));
        let err = result.err();
        assert!(err
            .as_ref()
            .map(|e| e.to_string().contains("Invalid dimension"))
            .unwrap_or(false));
    }

    #[test]
    fn test_valid_dimensions() {
        for dim in [768, 1536, 3072] {
            let result =
                GeminiEmbedding::with_options("fake_key".to_string(), options_with_dimension(dim));
            assert!(result.is_ok());
        }
    }

    #[test]
    fn test_zero_rpm_rejected() {
        let options = EmbeddingOptions {
            requests_per_minute: 0,
            ..Default::default()
        };
        assert!(GeminiEmbedding::with_options("fake_key".to_string(), options).is_err());
    }

    #[test]
    fn test_request_shape() {
        let embedder = GeminiEmbedding::new("fake_key".to_string()).unwrap();
        let json = serde_json::to_value(embedder.build_request("hello")).unwrap();

        assert_eq!(json["model"], "models/gemini-embedding-001");
        assert_eq!(json["taskType"], "RETRIEVAL_DOCUMENT");
        assert_eq!(json["outputDimensionality"], 768);
        assert_eq!(json["content"]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_gemini_error_parsing() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        let err = gemini_error(reqwest::StatusCode::BAD_REQUEST, body);
        assert_eq!(
            err.to_string(),
            "Gemini API error (INVALID_ARGUMENT): API key not valid"
        );

        let err = gemini_error(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert!(err.to_string().contains("upstream down"));
    }

    #[tokio::test]
    async fn test_embed_empty_text_skips_api() {
        // 잘못된 주소여도 빈 텍스트는 호출하지 않음
        let options = EmbeddingOptions {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let embedder = GeminiEmbedding::with_options("fake_key".to_string(), options).unwrap();
        let embedding = embedder.embed("   ").await.unwrap();
        assert_eq!(embedding, vec![0.0; DEFAULT_DIMENSION]);
    }

    #[tokio::test]
    async fn test_rate_limiter_min_delay() {
        let mut limiter = RateLimiter::new(600, Duration::from_secs(60));
        assert_eq!(limiter.min_delay, Duration::from_millis(100));

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
