//! HTTP 핸들러
//!
//! - `POST /upload`: PDF 업로드 → 인덱싱
//! - `POST /ask`: 질문 → 답변
//! - `POST /end_session`: 컬렉션 삭제
//! - `GET /health`: 상태 확인

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::session::{collection_name, validate_user_id};
use super::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EndSessionRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

/// 업로드 multipart 필드 이름
const PDF_FIELD: &str = "pdf";
const USER_ID_FIELD: &str = "user_id";

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_handler() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

/// POST /upload
///
/// multipart 필드 `pdf`(파일)와 `user_id`(텍스트)를 받습니다.
/// 입력 오류(400)일 때는 저장소를 건드리지 않습니다.
pub async fn upload_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    // multipart 본문이 아니면 파일 파트도 없는 것으로 취급
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!("Upload without multipart body: {}", rejection.body_text());
        ApiError::Input("No file part".to_string())
    })?;

    let mut user_id: Option<String> = None;
    let mut pdf: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(USER_ID_FIELD) => user_id = Some(field.text().await?),
            Some(PDF_FIELD) => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                pdf = Some((filename, data.to_vec()));
            }
            _ => tracing::debug!("Ignoring multipart field {:?}", name),
        }
    }

    let user_id = validate_user_id(user_id.as_deref())?;
    let (filename, data) = pdf.ok_or_else(|| ApiError::Input("No file part".to_string()))?;
    if filename.is_empty() {
        return Err(ApiError::Input("No selected file".to_string()));
    }

    let collection = collection_name(user_id);
    tracing::info!(
        "Upload received: {} ({} bytes) for {}",
        filename,
        data.len(),
        collection
    );

    let upload = state
        .uploads
        .save(&filename, &data)
        .await
        .map_err(|e| ApiError::upstream("File upload failed", e))?;

    let result = state.pipeline.ingest_file(&collection, upload.path()).await;
    upload.remove().await;

    let report = result.map_err(ApiError::from_ingest)?;
    tracing::info!(
        "Indexed {} chunks into {}",
        report.chunk_count,
        report.collection
    );

    Ok(Json(MessageResponse {
        message: "PDF processed and indexed successfully".to_string(),
    }))
}

/// POST /ask
///
/// JSON `{question, user_id}`. 컬렉션이 없으면 생성 모델을 호출하지 않고 401.
pub async fn ask_handler(
    State(state): State<AppState>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let Json(request) = body?;

    let question = request
        .question
        .as_deref()
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::Input("No question provided".to_string()))?;
    let user_id = validate_user_id(request.user_id.as_deref())?;

    let collection = collection_name(user_id);
    let answer = state
        .pipeline
        .ask(&collection, question)
        .await
        .map_err(ApiError::from_ask)?;

    tracing::info!(
        "Answered question for {} using {} passage(s)",
        collection,
        answer.passages.len()
    );

    Ok(Json(AnswerResponse {
        answer: answer.text,
    }))
}

/// POST /end_session
///
/// 여러 번 호출해도 안전합니다. 삭제할 컬렉션이 없으면 그 사실만 알려줍니다.
/// `user_id`가 없으면 저장소를 건드리지 않고 같은 응답을 돌려줍니다.
pub async fn end_session_handler(
    State(state): State<AppState>,
    body: Result<Json<EndSessionRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(request) = body?;

    let user_id = request
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());
    let Some(user_id) = user_id else {
        tracing::info!("Session ended without user_id");
        return Ok(no_index_status());
    };

    let collection = collection_name(validate_user_id(Some(user_id))?);

    let deleted = state
        .pipeline
        .end(&collection)
        .await
        .map_err(ApiError::from_end)?;

    if !deleted {
        tracing::info!("Session ended without index: {}", collection);
        return Ok(no_index_status());
    }

    tracing::info!("Session ended: {}", collection);
    Ok(Json(StatusResponse {
        status: "Session ended".to_string(),
    }))
}

fn no_index_status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "Session ended, no current index".to_string(),
    })
}
