//! In-memory vector index.
//!
//! Keeps records in insertion order per namespace, which gives deterministic
//! tie-breaking for equal scores. Used in tests and for small ephemeral
//! indexes.

use super::{
    cosine_similarity, IndexStats, MetadataFilter, VectorIndex, VectorMatch, VectorRecord,
};
use crate::error::{LeseError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tracing::debug;

/// In-memory namespaced vector index.
#[derive(Default)]
pub struct MemoryVectorIndex {
    namespaces: RwLock<HashMap<String, Vec<VectorRecord>>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<usize> {
        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|e| LeseError::VectorStore(format!("Failed to acquire lock: {}", e)))?;

        let entries = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            // Replacing in place preserves the original insertion position.
            match entries.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => entries.push(record.clone()),
            }
        }

        debug!(namespace, count = records.len(), "upserted vectors");
        Ok(records.len())
    }

    async fn query(
        &self,
        namespace: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>> {
        let namespaces = self
            .namespaces
            .read()
            .map_err(|e| LeseError::VectorStore(format!("Failed to acquire lock: {}", e)))?;

        let Some(entries) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<VectorMatch> = entries
            .iter()
            .filter(|r| filter.map(|f| f.matches(&r.metadata)).unwrap_or(true))
            .map(|r| VectorMatch {
                id: r.id.clone(),
                score: cosine_similarity(embedding, &r.embedding),
                metadata: r.metadata.clone(),
            })
            .collect();

        // Stable sort keeps insertion order for equal scores.
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);

        Ok(matches)
    }

    async fn stats(&self) -> Result<IndexStats> {
        let namespaces = self
            .namespaces
            .read()
            .map_err(|e| LeseError::VectorStore(format!("Failed to acquire lock: {}", e)))?;

        let counts: BTreeMap<String, usize> = namespaces
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.clone(), v.len()))
            .collect();

        Ok(IndexStats {
            total_vectors: counts.values().sum(),
            namespaces: counts,
        })
    }

    async fn delete_by_source(&self, namespace: &str, source: &str) -> Result<usize> {
        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|e| LeseError::VectorStore(format!("Failed to acquire lock: {}", e)))?;

        let Some(entries) = namespaces.get_mut(namespace) else {
            return Ok(0);
        };

        let before = entries.len();
        entries.retain(|r| r.metadata.source != source);
        Ok(before - entries.len())
    }
}
