//! pdf-chat - PDF 문서 대화형 RAG 서버
//!
//! PDF를 업로드하면 문단 단위로 나눠 Gemini로 임베딩하고
//! 세션별 LanceDB 컬렉션에 저장합니다. 질문이 오면 가까운 문단을 찾아
//! Gemini 생성 모델로 답변합니다.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod extractor;
pub mod generation;
pub mod knowledge;
pub mod server;

// Re-exports
pub use config::{ServerConfig, VectorStoreKind};
pub use embedding::{EmbeddingProvider, GeminiEmbedding, get_api_key, has_api_key};
pub use extractor::{DocumentExtractor, ExtractedPage, PdfExtractor};
pub use generation::{GeminiGenerator, TextGenerator, make_rag_prompt};
pub use knowledge::{
    Chunker, LanceVectorStore, MemoryVectorStore, ParagraphChunker, PipelineError, RagPipeline,
    SearchResult, VectorEntry, VectorStore, EMBEDDING_DIMENSION,
};
pub use server::{create_app, AppState, UploadDir};
