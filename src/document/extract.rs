//! Block extraction and section building.
//!
//! Walks a [`DocumentTree`] in order, turning paragraphs and tables into typed
//! [`Block`]s and grouping them into [`Section`]s at heading boundaries.
//! Embedded images are interned by content hash so repeated bytes collapse to
//! one [`ImageRecord`] while every textual occurrence still emits a
//! placeholder block.

use super::container::{BodyNode, DocumentTree, ImageRef};
use super::{
    content_hash, ext_from_content_type, normalize_ws, Block, ImageRecord, Section,
    DEFAULT_SECTION_TITLE,
};
use crate::error::Result;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// Extract sections and deduplicated images from a parsed document tree.
///
/// Always yields at least one section; an empty document produces a single
/// empty default section.
#[instrument(skip_all, fields(doc_slug))]
pub fn extract_document(tree: &DocumentTree, doc_slug: &str) -> Result<(Vec<Section>, Vec<ImageRecord>)> {
    let heading_re = Regex::new(r"(?i)^heading\s*(\d+)?").expect("valid heading pattern");

    let mut sections: Vec<Section> = Vec::new();
    let mut interner = ImageInterner::new(doc_slug);

    for node in &tree.body {
        match node {
            BodyNode::Paragraph(para) => {
                let text = normalize_ws(&para.text);
                if let Some(level) = heading_level(&heading_re, para.style.as_deref()) {
                    let title = if text.is_empty() {
                        DEFAULT_SECTION_TITLE.to_string()
                    } else {
                        text
                    };
                    let index = sections.len() as u32 + 1;
                    sections.push(Section::new(&title, level, index, doc_slug));
                    append_images(&mut sections, tree, &mut interner, &para.image_refs, doc_slug);
                    continue;
                }
                if !text.is_empty() {
                    current_section(&mut sections, doc_slug).blocks.push(Block::Text { text });
                }
                append_images(&mut sections, tree, &mut interner, &para.image_refs, doc_slug);
            }
            BodyNode::Table(table) => {
                let rows: Vec<Vec<String>> = table
                    .rows
                    .iter()
                    .map(|row| row.iter().map(|cell| normalize_ws(&cell.text)).collect())
                    .collect();
                if !rows.is_empty() {
                    current_section(&mut sections, doc_slug).blocks.push(Block::Table { rows });
                }
                // Cell images come after the table block, in cell order.
                let cell_refs: Vec<ImageRef> = table
                    .rows
                    .iter()
                    .flat_map(|row| row.iter().flat_map(|cell| cell.image_refs.iter().cloned()))
                    .collect();
                append_images(&mut sections, tree, &mut interner, &cell_refs, doc_slug);
            }
        }
    }

    if sections.is_empty() {
        sections.push(Section::new(DEFAULT_SECTION_TITLE, 1, 1, doc_slug));
    }

    let images = interner.into_records();
    debug!(sections = sections.len(), images = images.len(), "extracted document");
    Ok((sections, images))
}

/// Match a paragraph style against the heading pattern; the trailing digit
/// gives the level, defaulting to 1 when absent.
fn heading_level(re: &Regex, style: Option<&str>) -> Option<u32> {
    let style = style?;
    let caps = re.captures(style.trim())?;
    Some(
        caps.get(1)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(1)
            .max(1),
    )
}

fn current_section<'a>(sections: &'a mut Vec<Section>, doc_slug: &str) -> &'a mut Section {
    if sections.is_empty() {
        sections.push(Section::new(DEFAULT_SECTION_TITLE, 1, 1, doc_slug));
    }
    sections.last_mut().expect("at least one section")
}

fn append_images(
    sections: &mut Vec<Section>,
    tree: &DocumentTree,
    interner: &mut ImageInterner,
    refs: &[ImageRef],
    doc_slug: &str,
) {
    for image_ref in refs {
        if tree.header_footer_rel_ids.contains(&image_ref.rel_id) {
            continue;
        }
        let Some(part) = tree.image_parts.get(&image_ref.rel_id) else {
            warn!(rel_id = %image_ref.rel_id, "image relationship has no resolvable part");
            continue;
        };
        let path = interner.intern(&image_ref.rel_id, &part.content_type, &part.data);
        current_section(sections, doc_slug).blocks.push(Block::Image { path });
    }
}

/// Interns image bytes by content hash. A relationship seen before resolves
/// without re-hashing; distinct relationships with identical bytes share one
/// record.
struct ImageInterner {
    doc_slug: String,
    by_rel_id: HashMap<String, String>,
    by_hash: HashMap<String, usize>,
    records: Vec<ImageRecord>,
}

impl ImageInterner {
    fn new(doc_slug: &str) -> Self {
        Self {
            doc_slug: doc_slug.to_string(),
            by_rel_id: HashMap::new(),
            by_hash: HashMap::new(),
            records: Vec::new(),
        }
    }

    /// Resolve a relationship to a placeholder path, creating a record for
    /// unseen bytes.
    fn intern(&mut self, rel_id: &str, content_type: &str, data: &[u8]) -> String {
        if let Some(path) = self.by_rel_id.get(rel_id) {
            return path.clone();
        }
        let image_id = content_hash(data);
        let idx = match self.by_hash.get(&image_id) {
            Some(&idx) => idx,
            None => {
                let seq = self.records.len() as u32 + 1;
                let extension = ext_from_content_type(content_type).to_string();
                let record = ImageRecord {
                    image_id: image_id.clone(),
                    extension: extension.clone(),
                    data: data.to_vec(),
                    source_rel_id: rel_id.to_string(),
                    seq,
                    suggested_name: format!("{}__img{:03}{}", self.doc_slug, seq, extension),
                    storage_path: None,
                };
                self.records.push(record);
                self.by_hash.insert(image_id, self.records.len() - 1);
                self.records.len() - 1
            }
        };
        let path = self.records[idx].placeholder_path();
        self.by_rel_id.insert(rel_id.to_string(), path.clone());
        path
    }

    fn into_records(self) -> Vec<ImageRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::container::{CellNode, ImagePart, ParagraphNode, TableNode};
    use std::collections::HashSet;

    fn para(style: Option<&str>, text: &str, refs: Vec<ImageRef>) -> BodyNode {
        BodyNode::Paragraph(ParagraphNode {
            style: style.map(str::to_string),
            text: text.to_string(),
            image_refs: refs,
        })
    }

    fn image_ref(rel_id: &str) -> ImageRef {
        ImageRef { rel_id: rel_id.to_string(), legacy: false }
    }

    fn png_part(data: &[u8]) -> ImagePart {
        ImagePart { content_type: "image/png".into(), data: data.to_vec() }
    }

    #[test]
    fn test_duplicate_image_bytes_collapse_to_one_record() {
        let mut tree = DocumentTree::default();
        tree.image_parts.insert("rId1".into(), png_part(b"same bytes"));
        tree.image_parts.insert("rId2".into(), png_part(b"same bytes"));
        tree.body = vec![
            para(Some("Heading1"), "Setup", vec![]),
            para(None, "Install the pump.", vec![image_ref("rId1"), image_ref("rId2")]),
        ];

        let (sections, images) = extract_document(&tree, "guide").unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Setup");
        assert_eq!(images.len(), 1);

        let placeholders: Vec<&str> = sections[0]
            .blocks
            .iter()
            .filter_map(|b| match b {
                Block::Image { path } => Some(path.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(placeholders.len(), 2);
        assert_eq!(placeholders[0], placeholders[1]);
        assert_eq!(placeholders[0], images[0].placeholder_path());
    }

    #[test]
    fn test_header_footer_images_excluded() {
        let mut tree = DocumentTree::default();
        tree.image_parts.insert("rId1".into(), png_part(b"logo"));
        tree.header_footer_rel_ids = HashSet::from(["rId1".to_string()]);
        tree.body = vec![para(None, "Body text.", vec![image_ref("rId1")])];

        let (sections, images) = extract_document(&tree, "doc").unwrap();
        assert!(images.is_empty());
        assert_eq!(sections[0].blocks, vec![Block::Text { text: "Body text.".into() }]);
    }

    #[test]
    fn test_legacy_refs_share_the_interner() {
        let mut tree = DocumentTree::default();
        tree.image_parts.insert("rId1".into(), png_part(b"diagram"));
        tree.image_parts.insert("rId9".into(), png_part(b"diagram"));
        tree.body = vec![para(
            None,
            "See diagram.",
            vec![
                image_ref("rId1"),
                ImageRef { rel_id: "rId9".into(), legacy: true },
            ],
        )];

        let (_, images) = extract_document(&tree, "doc").unwrap();
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn test_leading_content_gets_default_section() {
        let mut tree = DocumentTree::default();
        tree.body = vec![
            para(None, "Preamble.", vec![]),
            para(Some("Heading2"), "Details", vec![]),
            para(None, "Body.", vec![]),
        ];

        let (sections, _) = extract_document(&tree, "doc").unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, DEFAULT_SECTION_TITLE);
        assert_eq!(sections[0].level, 1);
        assert_eq!(sections[1].title, "Details");
        assert_eq!(sections[1].level, 2);
        assert_eq!(sections[1].index, 2);
    }

    #[test]
    fn test_empty_document_yields_one_default_section() {
        let tree = DocumentTree::default();
        let (sections, images) = extract_document(&tree, "doc").unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, DEFAULT_SECTION_TITLE);
        assert!(sections[0].blocks.is_empty());
        assert!(images.is_empty());
    }

    #[test]
    fn test_table_cell_images_follow_the_table_block() {
        let mut tree = DocumentTree::default();
        tree.image_parts.insert("rId5".into(), png_part(b"cell image"));
        tree.body = vec![BodyNode::Table(TableNode {
            rows: vec![vec![
                CellNode { text: "Part".into(), image_refs: vec![] },
                CellNode { text: "Photo".into(), image_refs: vec![image_ref("rId5")] },
            ]],
        })];

        let (sections, images) = extract_document(&tree, "doc").unwrap();
        assert_eq!(images.len(), 1);
        let blocks = &sections[0].blocks;
        assert_eq!(blocks.len(), 2);
        assert!(matches!(&blocks[0], Block::Table { rows } if rows[0] == vec!["Part", "Photo"]));
        assert!(matches!(&blocks[1], Block::Image { .. }));
    }

    #[test]
    fn test_heading_level_parsing() {
        let re = Regex::new(r"(?i)^heading\s*(\d+)?").unwrap();
        assert_eq!(heading_level(&re, Some("Heading1")), Some(1));
        assert_eq!(heading_level(&re, Some("heading 3")), Some(3));
        assert_eq!(heading_level(&re, Some("Heading")), Some(1));
        assert_eq!(heading_level(&re, Some("Title")), None);
        assert_eq!(heading_level(&re, None), None);
    }
}
