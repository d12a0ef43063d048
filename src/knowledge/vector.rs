//! Vector Store - 컬렉션 단위 벡터 저장소 트레이트 및 유틸리티
//!
//! 세션마다 하나의 컬렉션을 만들고, 업로드 때마다 새로 교체합니다.

use anyhow::Result;
use async_trait::async_trait;

/// 벡터 임베딩 차원 (Gemini gemini-embedding-001, outputDimensionality=768)
/// source: https://ai.google.dev/gemini-api/docs/embeddings
pub const EMBEDDING_DIMENSION: i32 = 768;

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    /// 청크 위치 인덱스의 문자열 표현 ("0", "1", ...)
    pub id: String,
    /// 청크 원문
    pub text: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

impl VectorEntry {
    /// 청크 인덱스로 엔트리 생성
    pub fn from_chunk(index: usize, text: String, embedding: Vec<f32>) -> Self {
        Self {
            id: index.to_string(),
            text,
            embedding,
        }
    }
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// 청크 ID
    pub id: String,
    /// 청크 원문
    pub text: String,
    /// 유사도 스코어 (높을수록 가까움)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 이름으로 구분되는 컬렉션의 생성/삭제/업서트/검색 인터페이스입니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 같은 이름의 컬렉션이 있으면 삭제한 뒤 빈 컬렉션 생성
    async fn create_or_replace(&self, name: &str) -> Result<()>;

    /// ID 기준 삽입 또는 덮어쓰기
    async fn upsert(&self, name: &str, entries: &[VectorEntry]) -> Result<usize>;

    /// 가장 가까운 `limit`개 엔트리 (가까운 순)
    async fn query(&self, name: &str, embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// ID로 엔트리 조회 (없는 ID는 무시)
    async fn fetch(&self, name: &str, ids: &[String]) -> Result<Vec<VectorEntry>>;

    /// 컬렉션 존재 여부
    async fn exists(&self, name: &str) -> Result<bool>;

    /// 컬렉션 이름 목록
    async fn list(&self) -> Result<Vec<String>>;

    /// 컬렉션 삭제. 삭제했으면 true, 없었으면 false
    async fn delete(&self, name: &str) -> Result<bool>;

    /// 저장소 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 차원 검증
pub fn ensure_dimension(embedding: &[f32]) -> Result<()> {
    if embedding.len() != EMBEDDING_DIMENSION as usize {
        anyhow::bail!(
            "Embedding dimension mismatch: expected {}, got {}",
            EMBEDDING_DIMENSION,
            embedding.len()
        );
    }
    Ok(())
}

/// 코사인 유사도 계산
///
/// 두 벡터 간의 코사인 유사도를 계산합니다.
/// 결과는 -1.0 ~ 1.0 범위입니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================
