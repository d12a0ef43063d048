//! Knowledge 모듈 - 세션별 벡터 컬렉션과 RAG 파이프라인
//!
//! - Chunker: 빈 줄 기준 문단 분할
//! - VectorStore: 컬렉션 생성/교체/검색/삭제 인터페이스
//! - LanceDB / Memory: VectorStore 구현체
//! - Pipeline: 업로드 → 인덱싱, 질문 → 답변

mod chunker;
mod lance;
mod memory;
mod pipeline;
mod vector;

// Re-exports
pub use chunker::{default_chunker, Chunker, ParagraphChunker};
pub use lance::LanceVectorStore;
pub use memory::MemoryVectorStore;
pub use pipeline::{Answer, IngestReport, PipelineError, RagPipeline, DEFAULT_TOP_K};
pub use vector::{
    cosine_similarity, ensure_dimension, SearchResult, VectorEntry, VectorStore,
    EMBEDDING_DIMENSION,
};
