//! Multi-namespace retrieval fusion.
//!
//! Fans one query embedding out across the configured namespaces, merges the
//! match pools, deduplicates by vector ID, and re-ranks by score.

use super::RetrievedContext;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::{MetadataFilter, VectorIndex, VectorMatch};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Namespace used for records written without an explicit namespace.
pub const DEFAULT_NAMESPACE: &str = "";

/// Result of a filtered retrieval that may have relaxed its filter.
#[derive(Debug)]
pub struct RetrievalOutcome {
    pub contexts: Vec<RetrievedContext>,
    /// True when the metadata filter matched nothing and the results come
    /// from an unfiltered retry. Callers must not present these as filtered.
    pub filter_relaxed: bool,
}

/// Retrieval fusion over a shared embedder and vector index.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    namespaces: Vec<String>,
}

impl Retriever {
    /// `namespaces` are queried in the given order; the default namespace is
    /// always appended. Duplicates collapse to their first occurrence.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        namespaces: Vec<String>,
    ) -> Self {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for ns in namespaces.into_iter().chain([DEFAULT_NAMESPACE.to_string()]) {
            if seen.insert(ns.clone()) {
                ordered.push(ns);
            }
        }
        Self { embedder, index, namespaces: ordered }
    }

    /// Namespaces in query order.
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// Embed the query once, fan out, fuse, and rank.
    ///
    /// Results are in non-increasing score order with contiguous 1-based
    /// ranks assigned after truncation to `top_k`.
    #[instrument(skip(self, filter), fields(top_k))]
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedContext>> {
        let embedding = self.embedder.embed_query(query).await?;

        let mut pool: Vec<VectorMatch> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for namespace in &self.namespaces {
            let matches = self.index.query(namespace, &embedding, top_k, filter).await?;
            for m in matches {
                // First occurrence wins; namespaces are queried in a fixed
                // order so this is reproducible.
                if seen.insert(m.id.clone()) {
                    pool.push(m);
                }
            }
        }

        // Stable sort: equal scores keep namespace/insertion order.
        pool.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        pool.truncate(top_k);

        let contexts = pool
            .iter()
            .enumerate()
            .map(|(i, m)| RetrievedContext::from_match(m, i as u32 + 1))
            .collect::<Vec<_>>();

        debug!(results = contexts.len(), "retrieval complete");
        Ok(contexts)
    }

    /// Filtered retrieval with a single unfiltered retry.
    ///
    /// When the filter matches nothing, retries once without it so the caller
    /// can report what the index *does* contain; the outcome is labeled so
    /// relaxed results are never mistaken for filtered ones.
    pub async fn retrieve_or_relax(
        &self,
        query: &str,
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<RetrievalOutcome> {
        let contexts = self.retrieve(query, top_k, Some(filter)).await?;
        if !contexts.is_empty() {
            return Ok(RetrievalOutcome { contexts, filter_relaxed: false });
        }

        debug!("filter matched nothing, retrying unfiltered");
        let contexts = self.retrieve(query, top_k, None).await?;
        Ok(RetrievalOutcome { contexts, filter_relaxed: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::{
        ChunkMetadata, MemoryVectorIndex, SourceType, VectorRecord,
    };
    use async_trait::async_trait;

    /// Deterministic embedder: hands back a fixed query vector.
    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| self.0.clone()).collect())
        }

        fn dimensions(&self) -> usize {
            self.0.len()
        }
    }

    fn record(id: &str, embedding: Vec<f32>, source_type: SourceType) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            embedding,
            metadata: ChunkMetadata {
                content: Some(format!("text {id}")),
                source: format!("source {id}"),
                source_type,
                ..Default::default()
            },
        }
    }

    async fn seeded_index() -> Arc<MemoryVectorIndex> {
        let index = Arc::new(MemoryVectorIndex::new());
        index
            .upsert(
                "docs",
                &[
                    record("a", vec![1.0, 0.0], SourceType::Document),
                    record("b", vec![0.6, 0.8], SourceType::Document),
                ],
            )
            .await
            .unwrap();
        index
            .upsert(
                "",
                &[
                    // Same ID as in "docs": the "docs" copy wins the dedup.
                    record("a", vec![0.0, 1.0], SourceType::Document),
                    record("c", vec![0.8, 0.6], SourceType::Video),
                ],
            )
            .await
            .unwrap();
        index
    }

    fn retriever(index: Arc<MemoryVectorIndex>) -> Retriever {
        Retriever::new(
            Arc::new(FixedEmbedder(vec![1.0, 0.0])),
            index,
            vec!["docs".to_string()],
        )
    }

    #[test]
    fn test_namespace_order_dedups_and_appends_default() {
        let r = Retriever::new(
            Arc::new(FixedEmbedder(vec![1.0])),
            Arc::new(MemoryVectorIndex::new()),
            vec!["docs".into(), "videos".into(), "docs".into()],
        );
        assert_eq!(r.namespaces(), &["docs", "videos", ""]);
    }

    #[tokio::test]
    async fn test_fusion_dedups_by_id_first_wins() {
        let r = retriever(seeded_index().await);
        let contexts = r.retrieve("question", 10, None).await.unwrap();

        let ids: Vec<&str> = contexts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        // "a" came from the docs namespace, score 1.0, not the 0.0 copy.
        assert!((contexts[0].score - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_ranks_contiguous_after_truncation() {
        let r = retriever(seeded_index().await);
        let contexts = r.retrieve("question", 2, None).await.unwrap();

        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].rank, 1);
        assert_eq!(contexts[1].rank, 2);
        for pair in contexts.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_filtered_retrieval() {
        let r = retriever(seeded_index().await);
        let filter = MetadataFilter::source_type(SourceType::Video);
        let contexts = r.retrieve("question", 10, Some(&filter)).await.unwrap();

        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].id, "c");
        assert_eq!(contexts[0].rank, 1);
    }

    #[tokio::test]
    async fn test_relaxed_retry_is_labeled() {
        let index = Arc::new(MemoryVectorIndex::new());
        index
            .upsert("docs", &[record("a", vec![1.0, 0.0], SourceType::Document)])
            .await
            .unwrap();
        let r = retriever(index);

        let filter = MetadataFilter::source_type(SourceType::Video);
        let outcome = r.retrieve_or_relax("question", 5, &filter).await.unwrap();
        assert!(outcome.filter_relaxed);
        assert_eq!(outcome.contexts.len(), 1);

        let filter = MetadataFilter::source_type(SourceType::Document);
        let outcome = r.retrieve_or_relax("question", 5, &filter).await.unwrap();
        assert!(!outcome.filter_relaxed);
    }

    #[tokio::test]
    async fn test_tie_scores_keep_stable_order() {
        let index = Arc::new(MemoryVectorIndex::new());
        index
            .upsert(
                "docs",
                &[
                    record("best", vec![1.0, 0.0], SourceType::Document),
                    record("tie1", vec![0.6, 0.8], SourceType::Document),
                    record("tie2", vec![0.6, 0.8], SourceType::Document),
                ],
            )
            .await
            .unwrap();
        let r = retriever(index);

        let contexts = r.retrieve("question", 2, None).await.unwrap();
        assert_eq!(contexts[0].id, "best");
        assert_eq!(contexts[1].id, "tie1");
        assert_eq!(contexts[1].rank, 2);
    }
}
