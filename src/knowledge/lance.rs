//! LanceDB Vector Store - 컬렉션(테이블) 단위 벡터 저장소
//!
//! 컬렉션 하나가 LanceDB 테이블 하나에 대응합니다.
//! 청크 원문을 벡터와 함께 저장하므로 검색 결과에서 바로 텍스트를 얻습니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use super::vector::{
    ensure_dimension, SearchResult, VectorEntry, VectorStore, EMBEDDING_DIMENSION,
};

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
///
/// 기본 거리 함수(L2)를 그대로 사용합니다.
pub struct LanceVectorStore {
    db: Connection,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    pub async fn open(path: &Path) -> Result<Self> {
        // 부모 디렉토리 생성
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        tracing::debug!("LanceDB opened at {:?}", path);

        Ok(Self { db })
    }

    /// 컬렉션 테이블 스키마
    fn create_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    EMBEDDING_DIMENSION,
                ),
                false,
            ),
        ]))
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(entries: &[VectorEntry]) -> Result<RecordBatch> {
        if entries.is_empty() {
            anyhow::bail!("Cannot create batch from empty entries");
        }

        for entry in entries {
            ensure_dimension(&entry.embedding)
                .with_context(|| format!("Invalid embedding for chunk {}", entry.id))?;
        }

        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();

        // 임베딩을 FixedSizeList로 변환
        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vectors = FixedSizeListArray::try_new(
            field,
            EMBEDDING_DIMENSION,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        RecordBatch::try_new(
            Self::create_schema(),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(texts)),
                Arc::new(vectors),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    /// RecordBatch에서 (id, text) 컬럼 꺼내기
    fn text_columns(batch: &RecordBatch) -> Result<(&StringArray, &StringArray)> {
        let ids = batch
            .column_by_name("id")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| anyhow::anyhow!("Missing id column"))?;

        let texts = batch
            .column_by_name("text")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| anyhow::anyhow!("Missing text column"))?;

        Ok((ids, texts))
    }

    async fn open_table(&self, name: &str) -> Result<lancedb::table::Table> {
        self.db
            .open_table(name)
            .execute()
            .await
            .with_context(|| format!("Failed to open collection: {}", name))
    }
}

/// LanceDB 필터 문자열 리터럴 이스케이프
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn create_or_replace(&self, name: &str) -> Result<()> {
        if self.exists(name).await? {
            self.db
                .drop_table(name)
                .await
                .with_context(|| format!("Failed to drop existing collection: {}", name))?;
            tracing::info!("Dropped existing collection: {}", name);
        }

        self.db
            .create_empty_table(name, Self::create_schema())
            .execute()
            .await
            .with_context(|| format!("Failed to create collection: {}", name))?;

        tracing::info!(
            "Created collection: {} (dimension: {})",
            name,
            EMBEDDING_DIMENSION
        );
        Ok(())
    }

    async fn upsert(&self, name: &str, entries: &[VectorEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let batch = Self::entries_to_batch(entries)?;
        let schema = batch.schema();
        let table = self.open_table(name).await?;

        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(batches))
            .await
            .context("Failed to upsert vectors")?;

        Ok(entries.len())
    }

    async fn query(
        &self,
        name: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        ensure_dimension(embedding)?;
        let table = self.open_table(name).await?;

        let results = table
            .vector_search(embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = results.try_collect().await?;
        let mut search_results = Vec::new();

        for batch in batches {
            let (ids, texts) = Self::text_columns(&batch)?;

            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                search_results.push(SearchResult {
                    id: ids.value(i).to_string(),
                    text: texts.value(i).to_string(),
                    similarity: 1.0 / (1.0 + distances.value(i)),
                });
            }
        }

        Ok(search_results)
    }

    async fn fetch(&self, name: &str, ids: &[String]) -> Result<Vec<VectorEntry>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let table = self.open_table(name).await?;
        let filter = format!(
            "id IN ({})",
            ids.iter()
                .map(|id| quote_literal(id))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let results = table
            .query()
            .only_if(filter)
            .execute()
            .await
            .context("Failed to fetch vectors")?;

        let batches: Vec<RecordBatch> = results.try_collect().await?;
        let mut entries = Vec::new();

        for batch in batches {
            let (id_col, text_col) = Self::text_columns(&batch)?;
            let vectors = batch
                .column_by_name("vector")
                .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
                .ok_or_else(|| anyhow::anyhow!("Missing vector column"))?;

            for i in 0..batch.num_rows() {
                let values = vectors.value(i);
                let embedding = values
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .ok_or_else(|| anyhow::anyhow!("Unexpected vector item type"))?
                    .values()
                    .to_vec();

                entries.push(VectorEntry {
                    id: id_col.value(i).to_string(),
                    text: text_col.value(i).to_string(),
                    embedding,
                });
            }
        }

        Ok(entries)
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.list().await?.iter().any(|n| n == name))
    }

    async fn list(&self) -> Result<Vec<String>> {
        self.db
            .table_names()
            .execute()
            .await
            .context("Failed to list collections")
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        if !self.exists(name).await? {
            return Ok(false);
        }

        self.db
            .drop_table(name)
            .await
            .with_context(|| format!("Failed to delete collection: {}", name))?;

        tracing::info!("Deleted collection: {}", name);
        Ok(true)
    }

    fn name(&self) -> &str {
        "lancedb"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_entry(index: usize, value: f32) -> VectorEntry {
        VectorEntry::from_chunk(
            index,
            format!("Test chunk {}", index),
            vec![value; EMBEDDING_DIMENSION as usize],
        )
    }

    async fn open_store(temp_dir: &TempDir) -> LanceVectorStore {
        LanceVectorStore::open(&temp_dir.path().join("test.lance"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_lance_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        assert!(!store.exists("rag-experiment-u1").await.unwrap());

        store.create_or_replace("rag-experiment-u1").await.unwrap();
        assert!(store.exists("rag-experiment-u1").await.unwrap());
        assert_eq!(store.list().await.unwrap(), vec!["rag-experiment-u1"]);

        assert!(store.delete("rag-experiment-u1").await.unwrap());
        assert!(!store.delete("rag-experiment-u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_lance_replace_discards_rows() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store.create_or_replace("c").await.unwrap();
        let entries = vec![create_test_entry(0, 0.1), create_test_entry(1, 0.2)];
        assert_eq!(store.upsert("c", &entries).await.unwrap(), 2);

        store.create_or_replace("c").await.unwrap();
        let ids = vec!["0".to_string(), "1".to_string()];
        assert!(store.fetch("c", &ids).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lance_query_returns_text() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store.create_or_replace("c").await.unwrap();
        let entries = vec![
            create_test_entry(0, 0.1),
            create_test_entry(1, 0.5),
            create_test_entry(2, 0.9),
        ];
        store.upsert("c", &entries).await.unwrap();

        let query = vec![0.5; EMBEDDING_DIMENSION as usize];
        let results = store.query("c", &query, 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "1");
        assert_eq!(results[0].text, "Test chunk 1");
    }

    #[tokio::test]
    async fn test_lance_upsert_overwrites_by_id() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store.create_or_replace("c").await.unwrap();
        store.upsert("c", &[create_test_entry(0, 0.1)]).await.unwrap();

        let replacement = VectorEntry::from_chunk(
            0,
            "replaced".to_string(),
            vec![0.3; EMBEDDING_DIMENSION as usize],
        );
        store.upsert("c", &[replacement]).await.unwrap();

        let fetched = store.fetch("c", &["0".to_string()]).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].text, "replaced");
        assert_eq!(fetched[0].embedding.len(), EMBEDDING_DIMENSION as usize);
    }

    #[tokio::test]
    async fn test_lance_rejects_wrong_dimension() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store.create_or_replace("c").await.unwrap();
        let bad = VectorEntry::from_chunk(0, "bad".to_string(), vec![0.1; 3]);
        assert!(store.upsert("c", &[bad]).await.is_err());
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("12"), "'12'");
        assert_eq!(quote_literal("a'b"), "'a''b'");
    }
}
