//! SQLite-based vector index implementation.
//!
//! Stores embeddings as little-endian f32 blobs and metadata as JSON, with
//! cosine similarity computed in Rust. For large datasets consider the
//! sqlite-vec extension or a dedicated vector database.

use super::{
    cosine_similarity, ChunkMetadata, IndexStats, MetadataFilter, VectorIndex, VectorMatch,
    VectorRecord,
};
use crate::error::{LeseError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

/// SQLite-based vector index.
pub struct SqliteVectorIndex {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS vectors (
        namespace TEXT NOT NULL,
        id TEXT NOT NULL,
        source TEXT NOT NULL,
        embedding BLOB NOT NULL,
        metadata TEXT NOT NULL,
        inserted_at INTEGER,
        PRIMARY KEY (namespace, id)
    );

    CREATE INDEX IF NOT EXISTS idx_vectors_source ON vectors(namespace, source);
"#;

impl SqliteVectorIndex {
    /// Create a new SQLite vector index at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector index at {:?}", path);

        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Create an in-memory index (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LeseError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for (i, record) in records.iter().enumerate() {
            let metadata_json = serde_json::to_string(&record.metadata)?;
            tx.execute(
                r#"
                INSERT OR REPLACE INTO vectors (namespace, id, source, embedding, metadata, inserted_at)
                VALUES (?1, ?2, ?3, ?4, ?5,
                    COALESCE((SELECT inserted_at FROM vectors WHERE namespace = ?1 AND id = ?2),
                             (SELECT COALESCE(MAX(inserted_at), 0) FROM vectors) + 1 + ?6))
                "#,
                params![
                    namespace,
                    record.id,
                    record.metadata.source,
                    Self::embedding_to_bytes(&record.embedding),
                    metadata_json,
                    i as i64,
                ],
            )?;
        }

        tx.commit()?;
        debug!("Upserted {} vectors into {}", records.len(), namespace);
        Ok(records.len())
    }

    #[instrument(skip(self, embedding, filter))]
    async fn query(
        &self,
        namespace: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, embedding, metadata
            FROM vectors
            WHERE namespace = ?1
            ORDER BY inserted_at
            "#,
        )?;

        let rows = stmt.query_map(params![namespace], |row| {
            let id: String = row.get(0)?;
            let embedding_bytes: Vec<u8> = row.get(1)?;
            let metadata_json: String = row.get(2)?;
            Ok((id, embedding_bytes, metadata_json))
        })?;

        let mut matches: Vec<VectorMatch> = Vec::new();
        for row in rows {
            let (id, embedding_bytes, metadata_json) = row?;
            // Malformed stored metadata falls back to defaults.
            let metadata: ChunkMetadata =
                serde_json::from_str(&metadata_json).unwrap_or_default();
            if let Some(filter) = filter {
                if !filter.matches(&metadata) {
                    continue;
                }
            }
            let stored = Self::bytes_to_embedding(&embedding_bytes);
            matches.push(VectorMatch {
                id,
                score: cosine_similarity(embedding, &stored),
                metadata,
            });
        }

        // Stable sort preserves insertion order for ties.
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);

        debug!("Found {} matching vectors", matches.len());
        Ok(matches)
    }

    #[instrument(skip(self))]
    async fn stats(&self) -> Result<IndexStats> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT namespace, COUNT(*) FROM vectors GROUP BY namespace ORDER BY namespace",
        )?;
        let rows = stmt.query_map([], |row| {
            let namespace: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((namespace, count as usize))
        })?;

        let mut namespaces = BTreeMap::new();
        for row in rows {
            let (namespace, count) = row?;
            namespaces.insert(namespace, count);
        }

        Ok(IndexStats {
            total_vectors: namespaces.values().sum(),
            namespaces,
        })
    }

    #[instrument(skip(self))]
    async fn delete_by_source(&self, namespace: &str, source: &str) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM vectors WHERE namespace = ?1 AND source = ?2",
            params![namespace, source],
        )?;
        info!("Deleted {} vectors for source {}", deleted, source);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::SourceType;

    fn record(id: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            embedding,
            metadata: ChunkMetadata {
                content: Some(format!("text for {id}")),
                source: "manual.docx".to_string(),
                source_type: SourceType::Document,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let index = SqliteVectorIndex::in_memory().unwrap();

        index
            .upsert("docs", &[record("a", vec![1.0, 0.0]), record("b", vec![0.0, 1.0])])
            .await
            .unwrap();

        let matches = index.query("docs", &[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "a");
        assert!((matches[0].score - 1.0).abs() < 0.001);
        assert_eq!(matches[0].metadata.resolved_text(), "text for a");

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.total_vectors, 2);
        assert_eq!(stats.namespaces.get("docs"), Some(&2));

        let deleted = index.delete_by_source("docs", "manual.docx").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(index.stats().await.unwrap().total_vectors, 0);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let index = SqliteVectorIndex::in_memory().unwrap();
        index.upsert("docs", &[record("a", vec![1.0, 0.0])]).await.unwrap();
        index.upsert("videos", &[record("a", vec![0.0, 1.0])]).await.unwrap();

        let docs = index.query("docs", &[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(docs.len(), 1);
        let stats = index.stats().await.unwrap();
        assert_eq!(stats.namespaces.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_same_id_replaces() {
        let index = SqliteVectorIndex::in_memory().unwrap();
        index.upsert("docs", &[record("a", vec![1.0, 0.0])]).await.unwrap();
        index.upsert("docs", &[record("a", vec![0.0, 1.0])]).await.unwrap();

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.total_vectors, 1);
        let matches = index.query("docs", &[0.0, 1.0], 1, None).await.unwrap();
        assert!((matches[0].score - 1.0).abs() < 0.001);
    }
}
