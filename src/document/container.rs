//! Structured document container loading.
//!
//! Parses an OOXML-style container (a ZIP archive with a `word/` part tree)
//! into a [`DocumentTree`]: the ordered body nodes, the relationship map for
//! embedded image parts, and the set of relationship IDs referenced from
//! header/footer parts. The tree is the input contract for the block
//! extractor; tests construct it directly without a container on disk.

use crate::error::{LeseError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use tracing::{debug, instrument};
use zip::ZipArchive;

/// A reference to an embedded image from body content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Relationship ID (`rIdN`).
    pub rel_id: String,
    /// True when referenced through the legacy VML mechanism (`v:imagedata`)
    /// rather than modern DrawingML (`a:blip`).
    pub legacy: bool,
}

/// A paragraph node from the document body or a table cell.
#[derive(Debug, Clone, Default)]
pub struct ParagraphNode {
    /// Style identifier (e.g. `Heading1`), if any.
    pub style: Option<String>,
    /// Concatenated run text.
    pub text: String,
    /// Image references in document order.
    pub image_refs: Vec<ImageRef>,
}

/// A single table cell: flattened paragraph text plus any embedded images.
#[derive(Debug, Clone, Default)]
pub struct CellNode {
    pub text: String,
    pub image_refs: Vec<ImageRef>,
}

/// A table node: ordered rows of cells.
#[derive(Debug, Clone, Default)]
pub struct TableNode {
    pub rows: Vec<Vec<CellNode>>,
}

/// One top-level node of the document body.
#[derive(Debug, Clone)]
pub enum BodyNode {
    Paragraph(ParagraphNode),
    Table(TableNode),
}

/// An embedded binary part reachable through a relationship.
#[derive(Debug, Clone)]
pub struct ImagePart {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Structural tree of one document.
#[derive(Debug, Default)]
pub struct DocumentTree {
    /// Ordered body nodes.
    pub body: Vec<BodyNode>,
    /// Relationship ID -> embedded image part.
    pub image_parts: HashMap<String, ImagePart>,
    /// Relationship IDs referenced from header/footer parts. These are
    /// typically logos/branding and are excluded from body extraction.
    pub header_footer_rel_ids: HashSet<String>,
}

/// Heuristic container validity check: a ZIP archive with `word/` entries.
///
/// Used both as the `MalformedDocument` gate and to detect renamed legacy
/// documents that need conversion first.
pub fn is_valid_container(path: &Path) -> bool {
    let Ok(file) = std::fs::File::open(path) else {
        return false;
    };
    let Ok(archive) = ZipArchive::new(file) else {
        return false;
    };
    (0..archive.len()).any(|i| {
        archive
            .name_for_index(i)
            .is_some_and(|n| n.starts_with("word/"))
    })
}

impl DocumentTree {
    /// Load and parse a structured container from disk.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| LeseError::MalformedDocument(format!("not a container archive: {e}")))?;

        let names: Vec<String> = (0..archive.len())
            .filter_map(|i| archive.name_for_index(i).map(str::to_string))
            .collect();
        if !names.iter().any(|n| n.starts_with("word/")) {
            return Err(LeseError::MalformedDocument(
                "archive has no word/ part tree".into(),
            ));
        }

        let content_types = read_entry(&mut archive, "[Content_Types].xml")
            .map(|xml| parse_content_type_defaults(&xml))
            .unwrap_or_default();

        let rels_xml = read_entry(&mut archive, "word/_rels/document.xml.rels").ok_or_else(
            || LeseError::MalformedDocument("missing word/_rels/document.xml.rels".into()),
        )?;
        let rel_targets = parse_relationships(&rels_xml)?;

        let mut image_parts = HashMap::new();
        for (rel_id, target) in rel_targets {
            let entry_name = resolve_part_name(&target);
            let ext = entry_name.rsplit('.').next().unwrap_or_default().to_lowercase();
            let content_type = content_types
                .get(&ext)
                .cloned()
                .unwrap_or_else(|| guess_content_type(&ext));
            if !content_type.starts_with("image/") {
                continue;
            }
            if let Some(data) = read_entry_bytes(&mut archive, &entry_name) {
                image_parts.insert(rel_id, ImagePart { content_type, data });
            }
        }

        let mut header_footer_rel_ids = HashSet::new();
        for name in &names {
            let base = name.strip_prefix("word/").unwrap_or(name);
            if (base.starts_with("header") || base.starts_with("footer")) && base.ends_with(".xml") {
                if let Some(xml) = read_entry(&mut archive, name) {
                    collect_image_rel_ids(&xml, &mut header_footer_rel_ids)?;
                }
            }
        }

        let document_xml = read_entry(&mut archive, "word/document.xml")
            .ok_or_else(|| LeseError::MalformedDocument("missing word/document.xml".into()))?;
        let body = parse_body(&document_xml)?;

        debug!(
            nodes = body.len(),
            images = image_parts.len(),
            header_footer = header_footer_rel_ids.len(),
            "loaded document container"
        );

        Ok(Self {
            body,
            image_parts,
            header_footer_rel_ids,
        })
    }
}

fn read_entry(archive: &mut ZipArchive<std::fs::File>, name: &str) -> Option<String> {
    let mut entry = archive.by_name(name).ok()?;
    let mut content = String::new();
    entry.read_to_string(&mut content).ok()?;
    Some(content)
}

fn read_entry_bytes(archive: &mut ZipArchive<std::fs::File>, name: &str) -> Option<Vec<u8>> {
    let mut entry = archive.by_name(name).ok()?;
    let mut data = Vec::new();
    entry.read_to_end(&mut data).ok()?;
    Some(data)
}

/// Resolve a relationship target (relative to `word/`) to an archive entry name.
fn resolve_part_name(target: &str) -> String {
    if let Some(abs) = target.strip_prefix('/') {
        return abs.to_string();
    }
    if let Some(up) = target.strip_prefix("../") {
        return up.to_string();
    }
    format!("word/{}", target)
}

fn guess_content_type(ext: &str) -> String {
    match ext {
        "png" => "image/png".into(),
        "jpg" | "jpeg" => "image/jpeg".into(),
        "gif" => "image/gif".into(),
        "bmp" => "image/bmp".into(),
        "tif" | "tiff" => "image/tiff".into(),
        "wmf" => "image/x-wmf".into(),
        "emf" => "image/x-emf".into(),
        _ => "application/octet-stream".into(),
    }
}

/// Parse `<Default Extension=".." ContentType=".."/>` entries.
fn parse_content_type_defaults(xml: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if local_name(e.name().as_ref()) == b"Default" => {
                let mut ext = None;
                let mut ct = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Extension" => ext = attr_value(&attr),
                        b"ContentType" => ct = attr_value(&attr),
                        _ => {}
                    }
                }
                if let (Some(ext), Some(ct)) = (ext, ct) {
                    map.insert(ext.to_lowercase(), ct);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    map
}

/// Parse relationship entries into `rel_id -> target`.
fn parse_relationships(xml: &str) -> Result<Vec<(String, String)>> {
    let mut rels = Vec::new();
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = attr_value(&attr),
                        b"Target" => target = attr_value(&attr),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    rels.push((id, target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(LeseError::MalformedDocument(format!(
                    "invalid relationships part: {e}"
                )))
            }
            _ => {}
        }
    }
    Ok(rels)
}

/// Collect image relationship IDs (`a:blip r:embed` and legacy
/// `v:imagedata r:id`) from a header/footer part.
fn collect_image_rel_ids(xml: &str, out: &mut HashSet<String>) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) => {
                if let Some(r) = image_ref_from_element(&e) {
                    out.insert(r.rel_id);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(LeseError::MalformedDocument(format!(
                    "invalid header/footer part: {e}"
                )))
            }
            _ => {}
        }
    }
    Ok(())
}

fn local_name(qname: &[u8]) -> &[u8] {
    match qname.iter().rposition(|&b| b == b':') {
        Some(pos) => &qname[pos + 1..],
        None => qname,
    }
}

fn attr_value(attr: &quick_xml::events::attributes::Attribute<'_>) -> Option<String> {
    String::from_utf8(attr.value.to_vec()).ok()
}

/// Recognize an image reference element, modern or legacy.
fn image_ref_from_element(e: &quick_xml::events::BytesStart<'_>) -> Option<ImageRef> {
    match local_name(e.name().as_ref()) {
        b"blip" => {
            for attr in e.attributes().flatten() {
                if local_name(attr.key.as_ref()) == b"embed" {
                    return attr_value(&attr).map(|rel_id| ImageRef { rel_id, legacy: false });
                }
            }
            None
        }
        b"imagedata" => {
            for attr in e.attributes().flatten() {
                if local_name(attr.key.as_ref()) == b"id" {
                    return attr_value(&attr).map(|rel_id| ImageRef { rel_id, legacy: true });
                }
            }
            None
        }
        _ => None,
    }
}

/// Streaming parse of `word/document.xml` into ordered body nodes.
fn parse_body(xml: &str) -> Result<Vec<BodyNode>> {
    let mut reader = Reader::from_str(xml);

    let mut body = Vec::new();
    let mut table_depth = 0usize;
    let mut current_table: Option<TableNode> = None;
    let mut current_row: Option<Vec<CellNode>> = None;
    let mut current_cell: Option<CellNode> = None;
    let mut current_para: Option<ParagraphNode> = None;
    let mut in_run_text = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            LeseError::MalformedDocument(format!("invalid document part: {e}"))
        })?;
        match event {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"tbl" => {
                    table_depth += 1;
                    if table_depth == 1 {
                        current_table = Some(TableNode::default());
                    }
                }
                b"tr" if table_depth == 1 => current_row = Some(Vec::new()),
                b"tc" if table_depth == 1 => current_cell = Some(CellNode::default()),
                b"p" if table_depth == 0 => current_para = Some(ParagraphNode::default()),
                b"t" => in_run_text = true,
                _ => {
                    handle_inline(&e, current_para.as_mut(), current_cell.as_mut());
                }
            },
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == b"pStyle" {
                    if let Some(para) = current_para.as_mut() {
                        for attr in e.attributes().flatten() {
                            if local_name(attr.key.as_ref()) == b"val" {
                                para.style = attr_value(&attr);
                            }
                        }
                    }
                } else {
                    handle_inline(&e, current_para.as_mut(), current_cell.as_mut());
                }
            }
            Event::Text(t) if in_run_text => {
                let text = t.unescape().unwrap_or_default();
                if let Some(para) = current_para.as_mut() {
                    para.text.push_str(&text);
                } else if let Some(cell) = current_cell.as_mut() {
                    if !cell.text.is_empty() && !cell.text.ends_with(' ') {
                        cell.text.push(' ');
                    }
                    cell.text.push_str(&text);
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 {
                        if let Some(table) = current_table.take() {
                            body.push(BodyNode::Table(table));
                        }
                    }
                }
                b"tr" if table_depth == 1 => {
                    if let (Some(table), Some(row)) = (current_table.as_mut(), current_row.take()) {
                        table.rows.push(row);
                    }
                }
                b"tc" if table_depth == 1 => {
                    if let (Some(row), Some(cell)) = (current_row.as_mut(), current_cell.take()) {
                        row.push(cell);
                    }
                }
                b"p" if table_depth == 0 => {
                    if let Some(para) = current_para.take() {
                        body.push(BodyNode::Paragraph(para));
                    }
                }
                b"t" => in_run_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(body)
}

/// Route an image reference element to the paragraph or cell being built.
fn handle_inline(
    e: &quick_xml::events::BytesStart<'_>,
    para: Option<&mut ParagraphNode>,
    cell: Option<&mut CellNode>,
) {
    if let Some(r) = image_ref_from_element(e) {
        if let Some(para) = para {
            para.image_refs.push(r);
        } else if let Some(cell) = cell {
            cell.image_refs.push(r);
        }
    }
}
