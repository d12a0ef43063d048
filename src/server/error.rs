//! HTTP 에러 응답
//!
//! 모든 에러는 `{"error": "..."}` JSON과 HTTP 상태 코드로 응답합니다.
//! 외부 서비스 실패의 상세 내용은 서버 로그에만 남기고 클라이언트에는
//! 일반 메시지만 돌려줍니다.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::knowledge::PipelineError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 에러 응답 본문
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// API 에러
#[derive(Debug, Error)]
pub enum ApiError {
    /// 입력 누락/형식 오류 (400)
    #[error("{0}")]
    Input(String),

    /// 활성 컬렉션 없음 (401)
    #[error("{0}")]
    Session(String),

    /// 검색 결과 없음 (404)
    #[error("{0}")]
    NotFound(String),

    /// 외부 서비스 또는 저장소 실패 (500)
    #[error("{message}")]
    Upstream {
        message: &'static str,
        #[source]
        source: BoxError,
    },

    /// multipart 본문 파싱 실패 (크기 초과 포함)
    #[error(transparent)]
    Multipart(#[from] MultipartError),
}

impl ApiError {
    /// 500 에러 생성 (상세 내용은 로그에만 남음)
    pub fn upstream(message: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Upstream {
            message,
            source: source.into(),
        }
    }

    /// 업로드 처리 중 발생한 파이프라인 에러 변환
    pub fn from_ingest(err: PipelineError) -> Self {
        let message = match err {
            PipelineError::Extraction(_) | PipelineError::NoContent => {
                "Failed to extract text from PDF"
            }
            PipelineError::Embedding(_) => "Failed to generate embeddings",
            PipelineError::Store(_) => "Failed to create or load the index",
            _ => "File upload failed",
        };
        Self::upstream(message, err)
    }

    /// 질문 처리 중 발생한 파이프라인 에러 변환
    pub fn from_ask(err: PipelineError) -> Self {
        match err {
            PipelineError::NoIndex(_) => Self::Session("Session expired or invalid".to_string()),
            PipelineError::NoMatch => Self::NotFound("No relevant information found".to_string()),
            other => Self::upstream("Failed to process the question", other),
        }
    }

    /// 세션 종료 중 발생한 파이프라인 에러 변환
    pub fn from_end(err: PipelineError) -> Self {
        Self::upstream("Failed to delete the index", err)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Input(_) => StatusCode::BAD_REQUEST,
            Self::Session(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Multipart(err) => err.status(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Input(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            Self::Upstream { message, source } => {
                tracing::error!("{}: {}", message, source);
                message.to_string()
            }
            Self::Multipart(err) => {
                tracing::warn!("Rejected multipart body: {}", err);
                err.body_text()
            }
            other => {
                tracing::debug!("Request rejected ({}): {}", status, other);
                other.to_string()
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Input("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from_ask(PipelineError::NoIndex("c".into())).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from_ask(PipelineError::NoMatch).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from_ask(PipelineError::Generation(anyhow::anyhow!("boom"))).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_message_hides_details() {
        let err = ApiError::from_ingest(PipelineError::Embedding(anyhow::anyhow!(
            "Gemini API error (PERMISSION_DENIED): key sk-secret"
        )));
        assert_eq!(err.to_string(), "Failed to generate embeddings");
    }

    #[test]
    fn test_ingest_messages() {
        assert_eq!(
            ApiError::from_ingest(PipelineError::NoContent).to_string(),
            "Failed to extract text from PDF"
        );
        assert_eq!(
            ApiError::from_ingest(PipelineError::Store(anyhow::anyhow!("disk full"))).to_string(),
            "Failed to create or load the index"
        );
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::Input("No file part".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "No file part");
    }
}
