//! HTTP 서버 모듈
//!
//! axum 라우터 구성과 서버 실행을 담당합니다.
//! 외부 서비스 클라이언트는 시작 시 한 번 만들어 `AppState`로 주입합니다.

pub mod error;
pub mod handlers;
pub mod session;
pub mod upload;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{ServerConfig, VectorStoreKind};
use crate::embedding::{EmbeddingOptions, GeminiEmbedding};
use crate::extractor::PdfExtractor;
use crate::generation::GeminiGenerator;
use crate::knowledge::{
    default_chunker, LanceVectorStore, MemoryVectorStore, RagPipeline, VectorStore,
};

pub use error::ApiError;
pub use upload::UploadDir;

// ============================================================================
// AppState
// ============================================================================

/// 핸들러 공유 상태
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
    pub uploads: Arc<UploadDir>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: RagPipeline, uploads: UploadDir, max_upload_bytes: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            uploads: Arc::new(uploads),
            max_upload_bytes,
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// 라우터 생성
pub fn create_app(state: AppState) -> Router {
    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        // 상태 확인
        .route("/health", get(handlers::health_handler))
        // PDF 업로드 및 인덱싱
        .route("/upload", post(handlers::upload_handler))
        // 질문 답변
        .route("/ask", post(handlers::ask_handler))
        // 세션 종료 (컬렉션 삭제)
        .route("/end_session", post(handlers::end_session_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Startup
// ============================================================================

/// 설정에 맞는 벡터 저장소 열기
pub async fn open_vector_store(config: &ServerConfig) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.vector_store {
        VectorStoreKind::Lance => Arc::new(
            LanceVectorStore::open(&config.lance_path)
                .await
                .context("Failed to open vector store")?,
        ),
        VectorStoreKind::Memory => Arc::new(MemoryVectorStore::new()),
    };
    tracing::info!("Vector store: {}", store.name());
    Ok(store)
}

/// Gemini 클라이언트로 파이프라인 구성
pub async fn build_pipeline(config: &ServerConfig, api_key: String) -> Result<RagPipeline> {
    let embedder = GeminiEmbedding::with_options(
        api_key.clone(),
        EmbeddingOptions {
            model: config.embedding_model.clone(),
            requests_per_minute: config.embed_rpm,
            timeout: config.request_timeout,
            ..Default::default()
        },
    )
    .context("Failed to create embedder")?;

    let generator =
        GeminiGenerator::with_model(api_key, &config.generation_model, config.request_timeout)
            .context("Failed to create generator")?;

    tracing::info!(
        "Using Gemini embedding {} (dimension: {}) and generation {}",
        config.embedding_model,
        embedder.dimension(),
        config.generation_model
    );

    let store = open_vector_store(config).await?;

    Ok(RagPipeline::new(
        Arc::new(PdfExtractor),
        default_chunker(),
        Arc::new(embedder),
        store,
        Arc::new(generator),
        config.top_k,
    ))
}

/// 서버 실행 (Ctrl+C로 종료)
pub async fn serve(config: ServerConfig, api_key: String) -> Result<()> {
    config.validate()?;

    let uploads = UploadDir::prepare(&config.upload_dir).await?;
    let pipeline = build_pipeline(&config, api_key).await?;
    tracing::info!("Retrieving top {} passage(s) per question", pipeline.top_k());
    let app = create_app(AppState::new(pipeline, uploads, config.max_upload_bytes));

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;

    tracing::info!("API server listening on {}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
