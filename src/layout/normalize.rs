//! Layout normalization: four raw result schemas → one canonical layout.
//!
//! The parsing service has returned its layout in four different shapes over
//! time. Each is recognised by a pure structural predicate; the first
//! predicate that matches selects the extractor. Detection order:
//!
//! ```text
//! 1. NestedParagraph  {"pdf_info": [{"page_idx": 0, "para_blocks": [...]}]}
//! 2. FlatItem         [{"text": "...", "page_idx": 0, "bbox": [...]}, ...]
//! 3. PageGrid         [[{"type": "...", "content": "...", "bbox": [...]}], ...]
//! 4. Legacy           {"pages": [{"page_no": 1, "blocks": [...]}]}
//! ```
//!
//! FlatItem and PageGrid are both top-level arrays; they are told apart by
//! the first element (object carrying `text` + `page_idx` vs nested array),
//! and FlatItem is always tried first.
//!
//! Every extractor drops blocks whose joined text is empty after trimming
//! and blocks whose kind is not `text`/`title`. Shapes 1–3 also drop blocks
//! without a numeric bbox of at least four components; the legacy shape
//! substitutes `[0, 0, 0, 0]` instead. Output order is input order.

use super::types::{zero_bbox, BlockKind, LayoutBlock};
use serde_json::{Number, Value};
use std::fmt;
use tracing::{debug, info, warn};

/// The raw result schemas understood by [`normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutShape {
    /// `pdf_info` → `para_blocks` → `lines` → `spans`.
    NestedParagraph,
    /// Flat list of items carrying `text` and `page_idx`.
    FlatItem,
    /// List of pages, each a list of blocks; bbox may be 0–1 normalized.
    PageGrid,
    /// `pages` → `blocks` → `lines`.
    Legacy,
}

impl fmt::Display for LayoutShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayoutShape::NestedParagraph => "nested-paragraph (pdf_info)",
            LayoutShape::FlatItem => "flat-item (content list)",
            LayoutShape::PageGrid => "page-grid (model list)",
            LayoutShape::Legacy => "legacy (pages)",
        };
        f.write_str(name)
    }
}

struct ShapeRule {
    shape: LayoutShape,
    matches: fn(&Value) -> bool,
    extract: fn(&Value) -> Vec<LayoutBlock>,
}

/// Detection table, evaluated top to bottom.
const RULES: [ShapeRule; 4] = [
    ShapeRule {
        shape: LayoutShape::NestedParagraph,
        matches: is_nested_paragraph,
        extract: extract_nested_paragraph,
    },
    ShapeRule {
        shape: LayoutShape::FlatItem,
        matches: is_flat_item,
        extract: extract_flat_item,
    },
    ShapeRule {
        shape: LayoutShape::PageGrid,
        matches: is_page_grid,
        extract: extract_page_grid,
    },
    ShapeRule {
        shape: LayoutShape::Legacy,
        matches: is_legacy,
        extract: extract_legacy,
    },
];

/// Identify which schema `raw` follows, if any.
pub fn detect_shape(raw: &Value) -> Option<LayoutShape> {
    RULES.iter().find(|r| (r.matches)(raw)).map(|r| r.shape)
}

/// Convert a raw layout document into the canonical block sequence.
///
/// Never fails: an unrecognised document yields an empty vector and a
/// warning describing its top-level shape.
pub fn normalize(raw: &Value) -> Vec<LayoutBlock> {
    let Some(rule) = RULES.iter().find(|r| (r.matches)(raw)) else {
        warn!("Unrecognised layout format: {}", describe_top_level(raw));
        debug!("Layout sample: {}", sample(raw));
        return Vec::new();
    };

    info!("Detected layout format: {}", rule.shape);
    let blocks = (rule.extract)(raw);
    info!("Layout normalized: {} text blocks", blocks.len());
    blocks
}

// ── Predicates ───────────────────────────────────────────────────────────────

fn is_nested_paragraph(raw: &Value) -> bool {
    raw.as_object().is_some_and(|o| o.contains_key("pdf_info"))
}

fn is_flat_item(raw: &Value) -> bool {
    raw.as_array()
        .and_then(|items| items.first())
        .and_then(Value::as_object)
        .is_some_and(|first| first.contains_key("text") && first.contains_key("page_idx"))
}

fn is_page_grid(raw: &Value) -> bool {
    raw.as_array()
        .and_then(|pages| pages.first())
        .is_some_and(Value::is_array)
}

fn is_legacy(raw: &Value) -> bool {
    raw.get("pages").is_some_and(Value::is_array)
}

// ── Extractors ───────────────────────────────────────────────────────────────

fn extract_nested_paragraph(raw: &Value) -> Vec<LayoutBlock> {
    let pages = array_at(raw, "pdf_info");
    debug!("pdf_info has {} pages", pages.len());

    let mut layout = Vec::new();
    for page in pages.iter().filter(|p| p.is_object()) {
        let page_no = page_from_index(page.get("page_idx"));
        let blocks = array_at(page, "para_blocks");
        if blocks.is_empty() {
            debug!("Page {} has no para_blocks", page_no);
            continue;
        }

        for block in blocks {
            let Some(kind) = kind_of(block) else { continue };
            let Some(bbox) = numeric_bbox(block.get("bbox")) else {
                continue;
            };

            let fragments = array_at(block, "lines")
                .iter()
                .flat_map(|line| array_at(line, "spans").iter())
                .filter_map(|span| span.get("content").and_then(Value::as_str));
            let text = join_fragments(fragments);

            if !text.is_empty() {
                debug!("Page {}: {} block, {} chars", page_no, kind.as_str(), text.len());
                layout.push(LayoutBlock::new(page_no, bbox, text, kind));
            }
        }
    }
    layout
}

fn extract_flat_item(raw: &Value) -> Vec<LayoutBlock> {
    let items = raw.as_array().map(Vec::as_slice).unwrap_or_default();
    debug!("Content list has {} items", items.len());

    items
        .iter()
        .filter_map(|item| {
            let text = item.get("text").and_then(Value::as_str)?.trim();
            if text.is_empty() {
                return None;
            }
            let bbox = numeric_bbox(item.get("bbox"))?;
            let page_no = page_from_index(item.get("page_idx"));

            let kind = if item.get("text_level").and_then(Value::as_f64) == Some(1.0) {
                BlockKind::Title
            } else {
                tag_or_text(item)?
            };
            Some(LayoutBlock::new(page_no, bbox, text, kind))
        })
        .collect()
}

fn extract_page_grid(raw: &Value) -> Vec<LayoutBlock> {
    let pages = raw.as_array().map(Vec::as_slice).unwrap_or_default();
    debug!("Model list has {} pages", pages.len());

    let mut layout = Vec::new();
    for (idx, page) in pages.iter().enumerate() {
        let Some(blocks) = page.as_array() else { continue };
        let page_no = page_number(idx as u64 + 1);

        for block in blocks.iter().filter(|b| b.is_object()) {
            let Some(content) = block.get("content").and_then(Value::as_str) else {
                continue;
            };
            let content = content.trim();
            if content.is_empty() {
                continue;
            }
            let Some(bbox) = numeric_bbox(block.get("bbox")) else {
                continue;
            };
            let Some(kind) = tag_or_text(block) else { continue };

            // Coordinates here may be 0–1 fractions of the page; kept as-is.
            layout.push(LayoutBlock::new(page_no, bbox, content, kind));
        }
    }
    layout
}

fn extract_legacy(raw: &Value) -> Vec<LayoutBlock> {
    let pages = array_at(raw, "pages");
    debug!("Legacy layout has {} pages", pages.len());

    let mut layout = Vec::new();
    for page in pages {
        let page_no = ["page_no", "page", "pageNo"]
            .iter()
            .find_map(|key| page.get(*key).and_then(Value::as_u64).filter(|n| *n > 0))
            .map(page_number)
            .unwrap_or_else(|| page_from_index(page.get("page_idx")));

        let blocks = array_at(page, "blocks");
        if blocks.is_empty() {
            debug!("Page {} has no blocks", page_no);
            continue;
        }

        for (block_idx, block) in blocks.iter().enumerate() {
            let Some(kind) = kind_of(block) else { continue };
            let lines = array_at(block, "lines");
            if lines.is_empty() {
                debug!("Page {} block {} has no lines", page_no, block_idx);
                continue;
            }

            let fragments = lines.iter().filter_map(|line| {
                ["text", "content"].iter().find_map(|key| {
                    line.get(*key)
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                })
            });
            let text = join_fragments(fragments);
            if text.is_empty() {
                continue;
            }

            let bbox = ["bbox", "bbox_coords"]
                .iter()
                .find_map(|key| {
                    block
                        .get(*key)
                        .filter(|v| v.as_array().is_some_and(|a| !a.is_empty()))
                })
                .and_then(|v| numeric_bbox(Some(v)))
                .unwrap_or_else(zero_bbox);

            layout.push(LayoutBlock::new(page_no, bbox, text, kind));
        }
    }
    layout
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn array_at<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Block `type` restricted to text/title; missing or other tags → `None`.
fn kind_of(block: &Value) -> Option<BlockKind> {
    block
        .get("type")
        .and_then(Value::as_str)
        .and_then(BlockKind::from_tag)
}

/// Block `type` defaulting to text when absent; non-text tags → `None`.
fn tag_or_text(block: &Value) -> Option<BlockKind> {
    match block.get("type").and_then(Value::as_str) {
        None => Some(BlockKind::Text),
        Some(tag) => BlockKind::from_tag(tag),
    }
}

/// 0-based `page_idx` → 1-based page. Missing or invalid → page 1.
fn page_from_index(idx: Option<&Value>) -> u32 {
    page_number(idx.and_then(Value::as_u64).unwrap_or(0).saturating_add(1))
}

fn page_number(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX).max(1)
}

/// A bbox of at least four numbers, kept verbatim.
fn numeric_bbox(value: Option<&Value>) -> Option<Vec<Number>> {
    let items = value?.as_array()?;
    if items.len() < 4 {
        return None;
    }
    items
        .iter()
        .map(|v| match v {
            Value::Number(n) => Some(n.clone()),
            _ => None,
        })
        .collect()
}

fn join_fragments<'a>(fragments: impl Iterator<Item = &'a str>) -> String {
    fragments
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn describe_top_level(raw: &Value) -> String {
    match raw {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("object with keys {keys:?}")
        }
        Value::Array(items) => match items.first() {
            None => "empty array".to_string(),
            Some(first) => format!("array of {} items, first is {}", items.len(), kind_name(first)),
        },
        other => kind_name(other).to_string(),
    }
}

fn kind_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn sample(raw: &Value) -> String {
    let preview = match raw {
        Value::Array(items) => items.first().unwrap_or(raw),
        other => other,
    };
    let mut s = preview.to_string();
    if s.len() > 1000 {
        let mut cut = 1000;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn assert_invariants(blocks: &[LayoutBlock]) {
        for b in blocks {
            assert!(!b.text.is_empty());
            assert_eq!(b.text, b.text.trim());
            assert!(b.bbox.len() >= 4, "bbox too short: {:?}", b.bbox);
            assert!(b.page >= 1);
            assert!(matches!(b.kind, BlockKind::Text | BlockKind::Title));
        }
    }

    #[test]
    fn nested_paragraph_end_to_end() {
        let raw = json!({"pdf_info":[{"page_idx":0,"para_blocks":[{"type":"title","bbox":[0,0,100,20],"lines":[{"spans":[{"content":"Intro"}]}]}]}]});
        let out = serde_json::to_value(normalize(&raw)).unwrap();
        assert_eq!(
            out,
            json!([{"page":1,"bbox":[0,0,100,20],"text":"Intro","type":"title"}])
        );
    }

    #[test]
    fn nested_paragraph_joins_spans_across_lines_and_filters() {
        let raw = json!({"pdf_info": [
            {"page_idx": 0, "para_blocks": [
                {"type": "text", "bbox": [1, 2, 3, 4], "lines": [
                    {"spans": [{"content": " Hello"}, {"content": "big"}]},
                    {"spans": [{"content": ""}, {"content": "world "}]}
                ]},
                {"type": "image", "bbox": [1, 2, 3, 4], "lines": [{"spans": [{"content": "fig"}]}]},
                {"type": "text", "bbox": [1, 2, 3], "lines": [{"spans": [{"content": "short bbox"}]}]},
                {"type": "text", "bbox": [1, 2, 3, 4], "lines": [{"spans": [{"content": "   "}]}]}
            ]},
            {"page_idx": 4, "para_blocks": []},
            {"page_idx": 2, "para_blocks": [
                {"type": "title", "bbox": [5, 6, 7, 8, 9], "lines": [{"spans": [{"content": "Later"}]}]}
            ]}
        ]});
        let out = normalize(&raw);
        assert_invariants(&out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "Hello big world");
        assert_eq!(out[0].page, 1);
        assert_eq!(out[1].page, 3);
        assert_eq!(out[1].bbox.len(), 5);
        assert_eq!(out[1].kind, BlockKind::Title);
    }

    #[test]
    fn nested_paragraph_rejects_non_numeric_bbox() {
        let raw = json!({"pdf_info": [{"page_idx": 0, "para_blocks": [
            {"type": "text", "bbox": [0, "a", 1, 2], "lines": [{"spans": [{"content": "x"}]}]}
        ]}]});
        assert!(normalize(&raw).is_empty());
    }

    #[test]
    fn flat_item_levels_and_types() {
        let raw = json!([
            {"type": "text", "text": "Title here", "text_level": 1, "bbox": [10, 10, 200, 40], "page_idx": 0},
            {"type": "text", "text": "  Body  ", "bbox": [10, 50, 200, 90], "page_idx": 0},
            {"text": "No type", "bbox": [10, 50, 200, 90], "page_idx": 1},
            {"type": "equation", "text": "E=mc^2", "bbox": [1, 1, 2, 2], "page_idx": 1},
            {"type": "text", "text": "   ", "bbox": [1, 1, 2, 2], "page_idx": 1},
            {"type": "text", "text": "no bbox", "page_idx": 1}
        ]);
        assert_eq!(detect_shape(&raw), Some(LayoutShape::FlatItem));
        let out = normalize(&raw);
        assert_invariants(&out);
        let summary: Vec<(u32, &str, BlockKind)> =
            out.iter().map(|b| (b.page, b.text.as_str(), b.kind)).collect();
        assert_eq!(
            summary,
            vec![
                (1, "Title here", BlockKind::Title),
                (1, "Body", BlockKind::Text),
                (2, "No type", BlockKind::Text),
            ]
        );
    }

    #[test]
    fn page_grid_keeps_normalized_coordinates() {
        let raw = json!([
            [{"type": "title", "content": "Heading", "bbox": [0.1, 0.05, 0.9, 0.1]}],
            [],
            [{"content": "Third page", "bbox": [0.1, 0.2, 0.9, 0.3]},
             {"type": "image", "content": "img", "bbox": [0, 0, 1, 1]},
             {"content": "", "bbox": [0, 0, 1, 1]}]
        ]);
        assert_eq!(detect_shape(&raw), Some(LayoutShape::PageGrid));
        let out = normalize(&raw);
        assert_invariants(&out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].page, 1);
        assert_eq!(out[0].kind, BlockKind::Title);
        // Not rescaled to pixels.
        assert_eq!(
            serde_json::to_value(&out[0].bbox).unwrap(),
            json!([0.1, 0.05, 0.9, 0.1])
        );
        assert_eq!(out[1].page, 3);
    }

    #[test]
    fn legacy_page_number_resolution_and_bbox_fallback() {
        let raw = json!({"pages": [
            {"page_no": 7, "blocks": [
                {"type": "text", "bbox": [1, 2, 3, 4], "lines": [{"text": "A"}, {"content": "B"}]}
            ]},
            {"pageNo": 9, "blocks": [
                {"type": "title", "bbox_coords": [5, 6, 7, 8], "lines": [{"text": "", "content": "C"}]}
            ]},
            {"page_idx": 2, "blocks": [
                {"type": "text", "lines": [{"text": "D"}]},
                {"type": "text", "bbox": [1, 2], "lines": [{"text": "E"}]},
                {"type": "figure", "lines": [{"text": "F"}]},
                {"type": "text", "lines": []}
            ]},
            {"blocks": [{"type": "text", "lines": [{"text": "G"}]}]}
        ]});
        assert_eq!(detect_shape(&raw), Some(LayoutShape::Legacy));
        let out = normalize(&raw);
        assert_invariants(&out);
        let pages: Vec<u32> = out.iter().map(|b| b.page).collect();
        assert_eq!(pages, vec![7, 9, 3, 3, 1]);
        assert_eq!(out[0].text, "A B");
        assert_eq!(out[1].text, "C");
        assert_eq!(serde_json::to_value(&out[1].bbox).unwrap(), json!([5, 6, 7, 8]));
        assert_eq!(out[2].bbox, zero_bbox());
        assert_eq!(out[3].bbox, zero_bbox());
    }

    #[test]
    fn flat_item_wins_over_page_grid() {
        // First element satisfies flat-item; a later nested array would look like a grid page.
        let raw = json!([
            {"text": "first", "page_idx": 0, "bbox": [0, 0, 1, 1]},
            [{"content": "grid", "bbox": [0, 0, 1, 1]}]
        ]);
        assert_eq!(detect_shape(&raw), Some(LayoutShape::FlatItem));
        let out = normalize(&raw);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "first");
    }

    #[test]
    fn nested_paragraph_checked_before_legacy() {
        let raw = json!({
            "pdf_info": [{"page_idx": 0, "para_blocks": [
                {"type": "text", "bbox": [0, 0, 1, 1], "lines": [{"spans": [{"content": "new"}]}]}
            ]}],
            "pages": [{"blocks": [{"type": "text", "lines": [{"text": "old"}]}]}]
        });
        assert_eq!(detect_shape(&raw), Some(LayoutShape::NestedParagraph));
        assert_eq!(normalize(&raw)[0].text, "new");
    }

    #[test]
    fn unrecognised_inputs_yield_empty() {
        for raw in [
            json!(null),
            json!({}),
            json!([]),
            json!("text"),
            json!([1, 2, 3]),
            json!([{"content": "no page_idx"}]),
            json!({"data": []}),
        ] {
            assert_eq!(detect_shape(&raw), None, "{raw}");
            assert!(normalize(&raw).is_empty(), "{raw}");
        }
    }

    #[test]
    fn malformed_inner_structures_degrade_quietly() {
        let raw = json!({"pdf_info": "not a list"});
        assert!(normalize(&raw).is_empty());
        let raw = json!({"pdf_info": [1, null, {"para_blocks": "x"}]});
        assert!(normalize(&raw).is_empty());
    }

    #[test]
    fn idempotent() {
        let raw = json!({"pdf_info": [{"page_idx": 1, "para_blocks": [
            {"type": "text", "bbox": [1.5, 2, 3, 4], "lines": [{"spans": [{"content": "a"}]}]},
            {"type": "title", "bbox": [1, 2, 3, 4], "lines": [{"spans": [{"content": "b"}]}]}
        ]}]});
        assert_eq!(normalize(&raw), normalize(&raw));
    }

    #[test]
    fn describe_top_level_shapes() {
        assert!(describe_top_level(&json!({"a": 1})).contains("\"a\""));
        assert_eq!(describe_top_level(&json!([])), "empty array");
        assert_eq!(describe_top_level(&json!(3)), "number");
    }
}
