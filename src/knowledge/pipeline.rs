//! RAG 파이프라인 - 업로드 인덱싱, 질문 답변, 세션 정리
//!
//! 추출기, 청커, 임베더, 벡터 저장소, 생성기를 주입받아 조합합니다.
//! 모든 협력 객체는 서버 시작 시 한 번 만들어집니다.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::embedding::EmbeddingProvider;
use crate::extractor::{join_pages, DocumentExtractor};
use crate::generation::{make_rag_prompt, TextGenerator};

use super::chunker::Chunker;
use super::vector::{SearchResult, VectorEntry, VectorStore};

/// 기본 검색 결과 수
pub const DEFAULT_TOP_K: usize = 3;

// ============================================================================
// Types
// ============================================================================

/// 파이프라인 에러
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 문서를 읽거나 파싱하지 못함
    #[error("text extraction failed: {0:#}")]
    Extraction(anyhow::Error),

    /// 추출은 됐지만 청크가 하나도 없음
    #[error("document has no text content")]
    NoContent,

    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error("vector store operation failed: {0:#}")]
    Store(anyhow::Error),

    #[error("answer generation failed: {0:#}")]
    Generation(anyhow::Error),

    /// 세션에 연결된 컬렉션이 없음
    #[error("no collection named {0}")]
    NoIndex(String),

    /// 검색 결과가 비어있음
    #[error("no relevant passages found")]
    NoMatch,
}

/// 인덱싱 결과
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub collection: String,
    pub chunk_count: usize,
}

/// 질문 답변 결과
#[derive(Debug, Clone)]
pub struct Answer {
    /// 생성된 답변 (가공하지 않음)
    pub text: String,
    /// 프롬프트에 사용된 청크
    pub passages: Vec<SearchResult>,
}

// ============================================================================
// RagPipeline
// ============================================================================

/// RAG 파이프라인
pub struct RagPipeline {
    extractor: Arc<dyn DocumentExtractor>,
    chunker: Box<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn TextGenerator>,
    top_k: usize,
}

impl RagPipeline {
    /// 새 파이프라인 생성
    ///
    /// `top_k`는 최소 1로 보정됩니다.
    pub fn new(
        extractor: Arc<dyn DocumentExtractor>,
        chunker: Box<dyn Chunker>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn TextGenerator>,
        top_k: usize,
    ) -> Self {
        Self {
            extractor,
            chunker,
            embedder,
            store,
            generator,
            top_k: top_k.max(1),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// 파일에서 텍스트를 추출해 컬렉션에 인덱싱
    pub async fn ingest_file(
        &self,
        collection: &str,
        path: &Path,
    ) -> Result<IngestReport, PipelineError> {
        let pages = self
            .extractor
            .extract(path)
            .await
            .map_err(PipelineError::Extraction)?;

        let text = join_pages(&pages);
        tracing::debug!(
            "Extracted {} chars from {} pages ({})",
            text.len(),
            pages.len(),
            self.extractor.name()
        );

        self.ingest_text(collection, &text).await
    }

    /// 텍스트를 청킹/임베딩하여 컬렉션을 새로 만듦
    ///
    /// 임베딩이 모두 성공한 뒤에만 기존 컬렉션을 교체하므로,
    /// 임베딩 실패 시 저장소는 변경되지 않습니다.
    pub async fn ingest_text(
        &self,
        collection: &str,
        text: &str,
    ) -> Result<IngestReport, PipelineError> {
        // 1. 청킹
        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            tracing::warn!("No chunks generated for collection: {}", collection);
            return Err(PipelineError::NoContent);
        }

        // 2. 임베딩 (하나라도 실패하면 중단)
        let embeddings = self
            .embedder
            .embed_batch(&chunks)
            .await
            .map_err(PipelineError::Embedding)?;

        if embeddings.len() != chunks.len() {
            return Err(PipelineError::Embedding(anyhow::anyhow!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let entries: Vec<VectorEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| VectorEntry::from_chunk(i, text, embedding))
            .collect();

        // 3. 컬렉션 교체 후 업서트
        self.store
            .create_or_replace(collection)
            .await
            .map_err(PipelineError::Store)?;

        let inserted = self
            .store
            .upsert(collection, &entries)
            .await
            .map_err(PipelineError::Store)?;

        tracing::info!(
            "Indexed collection: {} (chunks={}, chunker={}, embedder={})",
            collection,
            inserted,
            self.chunker.name(),
            self.embedder.name()
        );

        Ok(IngestReport {
            collection: collection.to_string(),
            chunk_count: inserted,
        })
    }

    /// 컬렉션에서 관련 청크를 찾아 답변 생성
    pub async fn ask(&self, collection: &str, question: &str) -> Result<Answer, PipelineError> {
        let exists = self
            .store
            .exists(collection)
            .await
            .map_err(PipelineError::Store)?;
        if !exists {
            return Err(PipelineError::NoIndex(collection.to_string()));
        }

        let query_embedding = self
            .embedder
            .embed(question)
            .await
            .map_err(PipelineError::Embedding)?;

        let passages = self
            .store
            .query(collection, &query_embedding, self.top_k)
            .await
            .map_err(PipelineError::Store)?;

        if passages.is_empty() {
            return Err(PipelineError::NoMatch);
        }

        tracing::debug!(
            "Retrieved passages {:?} from {}",
            passages.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            collection
        );

        let passage = passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let prompt = make_rag_prompt(question, &passage);

        let text = self
            .generator
            .generate(&prompt)
            .await
            .map_err(PipelineError::Generation)?;

        Ok(Answer { text, passages })
    }

    /// 컬렉션 삭제. 삭제했으면 true, 없었으면 false
    pub async fn end(&self, collection: &str) -> Result<bool, PipelineError> {
        self.store
            .delete(collection)
            .await
            .map_err(PipelineError::Store)
    }
}

// ============================================================================
// Tests
// ============================================================================
