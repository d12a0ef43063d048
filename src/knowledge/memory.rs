//! In-memory Vector Store
//!
//! 프로세스 메모리에만 보관하는 저장소입니다. 재시작하면 사라집니다.
//! 데이터 디렉토리 없이 서버를 띄우거나 테스트할 때 사용합니다.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::vector::{cosine_similarity, ensure_dimension, SearchResult, VectorEntry, VectorStore};

/// 컬렉션: id -> 엔트리 (id 순서 유지)
type Collection = BTreeMap<String, VectorEntry>;

/// 메모리 벡터 저장소 (코사인 유사도)
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn create_or_replace(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.insert(name.to_string(), Collection::new()).is_some() {
            tracing::info!("Dropped existing collection: {}", name);
        }
        tracing::info!("Created collection: {}", name);
        Ok(())
    }

    async fn upsert(&self, name: &str, entries: &[VectorEntry]) -> Result<usize> {
        for entry in entries {
            ensure_dimension(&entry.embedding)?;
        }

        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| anyhow::anyhow!("Collection not found: {}", name))?;

        for entry in entries {
            collection.insert(entry.id.clone(), entry.clone());
        }

        Ok(entries.len())
    }

    async fn query(
        &self,
        name: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        ensure_dimension(embedding)?;

        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Collection not found: {}", name))?;

        let mut results: Vec<SearchResult> = collection
            .values()
            .map(|entry| SearchResult {
                id: entry.id.clone(),
                text: entry.text.clone(),
                similarity: cosine_similarity(embedding, &entry.embedding),
            })
            .collect();

        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(limit);

        Ok(results)
    }

    async fn fetch(&self, name: &str, ids: &[String]) -> Result<Vec<VectorEntry>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Collection not found: {}", name))?;

        Ok(ids.iter().filter_map(|id| collection.get(id).cloned()).collect())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let removed = self.collections.write().await.remove(name).is_some();
        if removed {
            tracing::info!("Deleted collection: {}", name);
        }
        Ok(removed)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// Tests
// ============================================================================
