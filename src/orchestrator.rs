//! Ingestion orchestrator.
//!
//! Coordinates the write path: document parsing, section building, chunking,
//! content persistence, embedding, and vector upsert. Documents in a batch
//! are independent jobs; one failure never aborts the batch.

use crate::chunking::segments::chunk_segments;
use crate::chunking::{chunk_sections, DocumentChunk};
use crate::config::Settings;
use crate::content::{ContentStore, LocalContentStore};
use crate::document::{
    container::is_valid_container, convert::convert_to_container, extract_document, slugify,
    DocumentTree, Section,
};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{LeseError, Result};
use crate::transcript::{format_transcript, summarize_transcript, OutputFormat, Transcript};
use crate::vector_store::{
    ChunkMetadata, MemoryVectorIndex, SourceType, SqliteVectorIndex, TranscriptUrls, VectorIndex,
    VectorRecord,
};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Outcome of ingesting one document or transcript.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub doc_id: String,
    pub source: String,
    pub sections: usize,
    pub images: usize,
    pub chunks: usize,
}

/// Outcome of a batch ingestion. Failures carry the source filename and the
/// error message.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<IngestReport>,
    pub failed: Vec<(String, String)>,
}

/// The main orchestrator for the Lese ingestion pipeline.
pub struct Orchestrator {
    settings: Settings,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    content_store: Arc<dyn ContentStore>,
    temp_dir: PathBuf,
}

impl Orchestrator {
    /// Create an orchestrator from settings, wiring up default components.
    pub fn new(settings: Settings) -> Result<Self> {
        let embedder = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        ));

        let index: Arc<dyn VectorIndex> = match settings.vector_store.provider.as_str() {
            "memory" => Arc::new(MemoryVectorIndex::new()),
            _ => Arc::new(SqliteVectorIndex::new(&settings.sqlite_path())?),
        };

        let content_store = Arc::new(LocalContentStore::new(settings.storage_dir()));

        Self::with_components(settings, embedder, index, content_store)
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        content_store: Arc<dyn ContentStore>,
    ) -> Result<Self> {
        let temp_dir = settings.temp_dir();
        std::fs::create_dir_all(&temp_dir)?;

        Ok(Self { settings, embedder, index, content_store, temp_dir })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    pub fn index(&self) -> Arc<dyn VectorIndex> {
        self.index.clone()
    }

    /// Ingest one document: parse, section, persist, chunk, embed, upsert.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn ingest_document(&self, path: &Path) -> Result<IngestReport> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let container_path = match extension.as_str() {
            "docx" => path.to_path_buf(),
            // Legacy documents go through the converter first. A renamed
            // legacy file carrying a .docx extension is caught by the
            // container validity check below.
            "doc" => convert_to_container(path, &self.temp_dir).await?,
            other => {
                return Err(LeseError::UnsupportedFormat(format!(
                    "{other:?} ({})",
                    path.display()
                )))
            }
        };

        if !is_valid_container(&container_path) {
            return Err(LeseError::MalformedDocument(format!(
                "{} is not a structured container",
                container_path.display()
            )));
        }

        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        let doc_slug = slugify(
            path.file_stem().and_then(|s| s.to_str()).unwrap_or("document"),
        );
        let doc_id = Uuid::new_v4().to_string();

        let tree = DocumentTree::load(&container_path)?;
        let (mut sections, mut images) = extract_document(&tree, &doc_slug)?;

        // Persist images first so chunk placeholders can be resolved.
        let mut path_map: HashMap<String, String> = HashMap::new();
        for image in &mut images {
            let placeholder = image.placeholder_path();
            let stored = self.content_store.store_image(&doc_id, image).await?;
            path_map.insert(placeholder, stored.clone());
            image.storage_path = Some(stored);
            image.data.clear();
        }

        for section in &mut sections {
            let stored = self.content_store.store_section(&doc_id, section).await?;
            section.storage_path = Some(stored);
        }

        let mut chunks = chunk_sections(&sections, self.settings.ingestion.max_chunk_chars);
        for chunk in &mut chunks {
            for image_path in &mut chunk.image_paths {
                if let Some(resolved) = path_map.get(image_path) {
                    *image_path = resolved.clone();
                }
            }
        }

        let records = self.embed_document_chunks(&chunks, &sections, &doc_id, &source).await?;

        // Chunk IDs are fresh each run, so an earlier ingest of the same
        // source must be removed rather than overwritten.
        self.index
            .delete_by_source(&self.settings.vector_store.document_namespace, &source)
            .await?;
        self.index
            .upsert(&self.settings.vector_store.document_namespace, &records)
            .await?;

        info!(
            sections = sections.len(),
            images = images.len(),
            chunks = chunks.len(),
            "ingested document"
        );

        Ok(IngestReport {
            doc_id,
            source,
            sections: sections.len(),
            images: images.len(),
            chunks: chunks.len(),
        })
    }

    async fn embed_document_chunks(
        &self,
        chunks: &[DocumentChunk],
        sections: &[Section],
        doc_id: &str,
        source: &str,
    ) -> Result<Vec<VectorRecord>> {
        let by_id: HashMap<Uuid, &Section> =
            sections.iter().map(|s| (s.section_id, s)).collect();

        // An image-only chunk has no text of its own; its section title
        // stands in so the images stay retrievable.
        let texts: Vec<String> = chunks
            .iter()
            .map(|c| {
                if c.text.is_empty() {
                    by_id
                        .get(&c.section_id)
                        .map(|s| s.title.clone())
                        .unwrap_or_default()
                } else {
                    c.text.clone()
                }
            })
            .collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let records = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let section = by_id.get(&chunk.section_id);
                VectorRecord {
                    id: chunk.chunk_id.to_string(),
                    embedding,
                    metadata: ChunkMetadata {
                        content: Some(chunk.text.clone()),
                        source: source.to_string(),
                        source_type: SourceType::Document,
                        doc_id: Some(doc_id.to_string()),
                        section_id: Some(chunk.section_id.to_string()),
                        section_path: section.and_then(|s| s.storage_path.clone()),
                        section_title: section.map(|s| s.title.clone()),
                        image_paths: chunk.image_paths.clone(),
                        indexed_at: Some(Utc::now()),
                        ..Default::default()
                    },
                }
            })
            .collect();
        Ok(records)
    }

    /// Ingest every supported document under a directory.
    ///
    /// Documents run as independent jobs with bounded concurrency; each
    /// failure is recorded with its filename and processing continues.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn ingest_directory(&self, dir: &Path) -> Result<BatchReport> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| matches!(e.to_lowercase().as_str(), "docx" | "doc"))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let results = stream::iter(paths)
            .map(|path| async move {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("unknown")
                    .to_string();
                (name, self.ingest_document(&path).await)
            })
            .buffer_unordered(self.settings.ingestion.max_concurrent_documents.max(1))
            .collect::<Vec<_>>()
            .await;

        let mut report = BatchReport::default();
        for (name, result) in results {
            match result {
                Ok(ingest) => report.succeeded.push(ingest),
                Err(e) => {
                    warn!(source = %name, "document ingestion failed: {}", e);
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "batch ingestion complete"
        );
        Ok(report)
    }

    /// Ingest a video transcript: export, chunk, embed, upsert.
    #[instrument(skip(self, transcript), fields(video_id = %transcript.video_id))]
    pub async fn ingest_transcript(&self, transcript: &Transcript) -> Result<IngestReport> {
        // Export all three formats so chunks can link back to them.
        let mut urls = TranscriptUrls::default();
        for (format, ext, slot) in [
            (OutputFormat::Txt, "txt", &mut urls.txt),
            (OutputFormat::Srt, "srt", &mut urls.srt),
            (OutputFormat::Vtt, "vtt", &mut urls.vtt),
        ] {
            let rendered = format_transcript(transcript, format);
            let stored = self
                .content_store
                .store_transcript(&transcript.video_id, ext, &rendered)
                .await?;
            *slot = Some(stored);
        }

        // Topic summary sits beside the transcript exports; it is not
        // referenced from chunk metadata.
        let summary = summarize_transcript(transcript);
        self.content_store
            .store_transcript(&transcript.video_id, "md", &summary)
            .await?;

        let chunks = chunk_segments(
            &transcript.segments,
            self.settings.ingestion.segment_chunk_chars,
            self.settings.ingestion.segment_overlap_chars,
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorRecord {
                id: chunk.chunk_id.to_string(),
                embedding,
                metadata: ChunkMetadata {
                    content: Some(chunk.text.clone()),
                    source: transcript.video_id.clone(),
                    source_type: SourceType::Video,
                    start_seconds: Some(chunk.start_seconds),
                    end_seconds: Some(chunk.end_seconds),
                    video_url: transcript.video_url.clone(),
                    transcript_urls: Some(urls.clone()),
                    indexed_at: Some(Utc::now()),
                    ..Default::default()
                },
            })
            .collect();

        self.index
            .delete_by_source(&self.settings.vector_store.video_namespace, &transcript.video_id)
            .await?;
        self.index
            .upsert(&self.settings.vector_store.video_namespace, &records)
            .await?;

        info!(chunks = records.len(), "ingested transcript");

        Ok(IngestReport {
            doc_id: transcript.video_id.clone(),
            source: transcript.video_id.clone(),
            sections: 0,
            images: 0,
            chunks: records.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::TranscriptSegment;
    use async_trait::async_trait;

    struct HashEmbedder;

    #[async_trait]
    impl Embedder for HashEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let len = text.len() as f32;
            Ok(vec![len, 1.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    fn test_orchestrator(dir: &Path) -> Orchestrator {
        let mut settings = Settings::default();
        settings.general.temp_dir = dir.join("tmp").display().to_string();
        settings.content.storage_dir = dir.join("content").display().to_string();
        Orchestrator::with_components(
            settings,
            Arc::new(HashEmbedder),
            Arc::new(MemoryVectorIndex::new()),
            Arc::new(LocalContentStore::new(dir.join("content"))),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_unsupported_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"%PDF-").unwrap();

        let err = orchestrator.ingest_document(&path).await.unwrap_err();
        assert!(matches!(err, LeseError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_malformed_container_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"not a zip at all").unwrap();

        let err = orchestrator.ingest_document(&path).await.unwrap_err();
        assert!(matches!(err, LeseError::MalformedDocument(_)));
    }

    #[tokio::test]
    async fn test_batch_failures_do_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("bad.docx"), b"garbage").unwrap();
        std::fs::write(docs.join("ignored.txt"), b"not picked up").unwrap();

        let report = orchestrator.ingest_directory(&docs).await.unwrap();
        assert!(report.succeeded.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad.docx");
    }

    #[tokio::test]
    async fn test_transcript_ingestion_writes_exports_and_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());

        let transcript = Transcript::new(
            "vid1".into(),
            vec![
                TranscriptSegment { text: "Welcome.".into(), start_seconds: 0.0, end_seconds: 2.0 },
                TranscriptSegment { text: "Open the panel.".into(), start_seconds: 2.0, end_seconds: 5.0 },
            ],
        )
        .with_video_url("https://example.com/v/1");

        let report = orchestrator.ingest_transcript(&transcript).await.unwrap();
        assert_eq!(report.chunks, 1);

        for ext in ["txt", "srt", "vtt", "md"] {
            assert!(dir
                .path()
                .join("content")
                .join(format!("transcripts/vid1.{ext}"))
                .exists());
        }

        let stats = orchestrator.index().stats().await.unwrap();
        assert_eq!(stats.total_vectors, 1);
        assert_eq!(stats.namespaces.get("videos"), Some(&1));
    }

    #[tokio::test]
    async fn test_reingest_replaces_earlier_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());

        let transcript = Transcript::new(
            "vid1".into(),
            vec![TranscriptSegment {
                text: "Open the panel.".into(),
                start_seconds: 0.0,
                end_seconds: 3.0,
            }],
        );

        orchestrator.ingest_transcript(&transcript).await.unwrap();
        orchestrator.ingest_transcript(&transcript).await.unwrap();

        let stats = orchestrator.index().stats().await.unwrap();
        assert_eq!(stats.total_vectors, 1);
    }
}
