//! Document model: content blocks, sections, and extracted images.
//!
//! A source document is parsed into an ordered list of typed [`Block`]s grouped
//! into [`Section`]s at heading boundaries. Embedded images are deduplicated by
//! content hash into [`ImageRecord`]s and referenced from blocks via
//! placeholder paths (`images/<image_id><ext>`) that are rewritten to storage
//! paths once persisted.

pub mod container;
pub mod convert;
pub mod extract;

pub use container::DocumentTree;
pub use extract::extract_document;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use uuid::Uuid;

/// One content block within a section.
///
/// Block order is preserved for chunk text assembly; it carries no retrieval
/// meaning on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    /// Normalized paragraph text.
    Text { text: String },
    /// Table captured as a row/cell grid of normalized text.
    Table { rows: Vec<Vec<String>> },
    /// Image reference; `path` is a placeholder until persisted.
    Image { path: String },
}

/// A heading-delimited span of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Generated unique ID.
    pub section_id: Uuid,
    /// Heading text, or "Untitled" for implicit sections.
    pub title: String,
    /// Heading level (>= 1).
    pub level: u32,
    /// Ordered content blocks.
    pub blocks: Vec<Block>,
    /// 1-based sequence index within the document.
    pub index: u32,
    /// Naming hint for the persistence layer; not an identity.
    pub suggested_name: String,
    /// Document slug this section belongs to.
    pub doc_slug: String,
    /// Final storage path, set after persistence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
}

impl Section {
    /// Create a section with a generated ID and derived naming hint.
    pub fn new(title: &str, level: u32, index: u32, doc_slug: &str) -> Self {
        let title_slug: String = slugify(title).chars().take(40).collect();
        Self {
            section_id: Uuid::new_v4(),
            title: title.to_string(),
            level,
            blocks: Vec::new(),
            index,
            suggested_name: format!("{}__sec{:03}_{}.json", doc_slug, index, title_slug),
            doc_slug: doc_slug.to_string(),
            storage_path: None,
        }
    }
}

/// Default title for content that precedes any heading.
pub const DEFAULT_SECTION_TITLE: &str = "Untitled";

/// An image extracted from a document, deduplicated by content hash.
///
/// Raw bytes are dropped after persistence; only the storage path survives.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// First 16 hex chars of the SHA-1 of the raw bytes. Dedup key.
    pub image_id: String,
    /// File extension derived from the part's content type (with dot).
    pub extension: String,
    /// Raw bytes; cleared once stored.
    pub data: Vec<u8>,
    /// Relationship ID the image was first seen under.
    pub source_rel_id: String,
    /// 1-based sequence number for human-friendly naming.
    pub seq: u32,
    /// Naming hint for the persistence layer.
    pub suggested_name: String,
    /// Final storage path, set after persistence.
    pub storage_path: Option<String>,
}

impl ImageRecord {
    /// Placeholder path emitted into blocks before persistence.
    pub fn placeholder_path(&self) -> String {
        format!("images/{}{}", self.image_id, self.extension)
    }
}

/// Collapse whitespace runs to a single space and trim.
pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Dedup key for image bytes: first 16 hex chars of SHA-1.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha1::digest(bytes);
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..16].to_string()
}

/// Lowercase, replace non-word runs with hyphens, trim hyphens.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_hyphen = true;
    for c in name.trim().to_lowercase().chars() {
        if c.is_alphanumeric() || c == '_' {
            out.push(c);
            last_hyphen = false;
        } else if !last_hyphen {
            out.push('-');
            last_hyphen = true;
        }
    }
    let trimmed = out.trim_matches('-').to_string();
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed
    }
}

/// Map an image part content type to a file extension.
pub fn ext_from_content_type(content_type: &str) -> &'static str {
    match content_type.to_lowercase().as_str() {
        "image/png" => ".png",
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/gif" => ".gif",
        "image/bmp" => ".bmp",
        "image/tiff" => ".tif",
        "image/x-wmf" => ".wmf",
        "image/x-emf" => ".emf",
        _ => ".bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ws() {
        assert_eq!(normalize_ws("  a \t b\n\nc "), "a b c");
        assert_eq!(normalize_ws(""), "");
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = content_hash(b"pump diagram bytes");
        let b = content_hash(b"pump diagram bytes");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, content_hash(b"other bytes"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Pump Setup Guide"), "pump-setup-guide");
        assert_eq!(slugify("  --weird__name!!  "), "weird__name");
        assert_eq!(slugify("???"), "document");
    }

    #[test]
    fn test_ext_from_content_type() {
        assert_eq!(ext_from_content_type("image/PNG"), ".png");
        assert_eq!(ext_from_content_type("image/jpeg"), ".jpg");
        assert_eq!(ext_from_content_type("application/octet-stream"), ".bin");
    }

    #[test]
    fn test_section_suggested_name() {
        let sec = Section::new("Installation & Setup", 2, 3, "guide");
        assert_eq!(sec.suggested_name, "guide__sec003_installation-setup.json");
        assert_eq!(sec.level, 2);
    }

    #[test]
    fn test_placeholder_path() {
        let img = ImageRecord {
            image_id: "abc123".into(),
            extension: ".png".into(),
            data: vec![],
            source_rel_id: "rId4".into(),
            seq: 1,
            suggested_name: "guide__img001.png".into(),
            storage_path: None,
        };
        assert_eq!(img.placeholder_path(), "images/abc123.png");
    }
}
