//! Content persistence.
//!
//! Resolves the placeholder paths produced during extraction into final
//! storage paths. Sections are persisted as JSON, images as raw bytes; the
//! returned paths land in chunk metadata and in served URLs.

use crate::document::{ImageRecord, Section};
use crate::error::{LeseError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Trait for content persistence backends.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Persist a section, returning its storage path.
    async fn store_section(&self, doc_id: &str, section: &Section) -> Result<String>;

    /// Persist an image, returning its storage path.
    async fn store_image(&self, doc_id: &str, image: &ImageRecord) -> Result<String>;

    /// Persist a rendered transcript export, returning its storage path.
    async fn store_transcript(
        &self,
        video_id: &str,
        extension: &str,
        content: &str,
    ) -> Result<String>;
}

/// Filesystem-backed content store.
///
/// Layout: `<root>/<doc_id>/sections/<name>.json` and
/// `<root>/<doc_id>/images/<name>`. Returned storage paths are relative to
/// the root.
pub struct LocalContentStore {
    root: PathBuf,
}

impl LocalContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn write(&self, relative: &str, bytes: &[u8]) -> Result<String> {
        let path = self.root.join(relative);
        let parent = path
            .parent()
            .ok_or_else(|| LeseError::ContentStore(format!("bad storage path: {relative}")))?;
        std::fs::create_dir_all(parent)?;
        std::fs::write(&path, bytes)?;
        Ok(relative.to_string())
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    #[instrument(skip_all, fields(doc_id, name = %section.suggested_name))]
    async fn store_section(&self, doc_id: &str, section: &Section) -> Result<String> {
        let json = serde_json::to_vec_pretty(section)?;
        let relative = format!("{}/sections/{}", doc_id, section.suggested_name);
        let path = self.write(&relative, &json)?;
        debug!("stored section");
        Ok(path)
    }

    #[instrument(skip_all, fields(doc_id, name = %image.suggested_name))]
    async fn store_image(&self, doc_id: &str, image: &ImageRecord) -> Result<String> {
        let relative = format!("{}/images/{}", doc_id, image.suggested_name);
        let path = self.write(&relative, &image.data)?;
        debug!("stored image");
        Ok(path)
    }

    #[instrument(skip_all, fields(video_id, extension))]
    async fn store_transcript(
        &self,
        video_id: &str,
        extension: &str,
        content: &str,
    ) -> Result<String> {
        let relative = format!("transcripts/{}.{}", video_id, extension);
        self.write(&relative, content.as_bytes())
    }
}
