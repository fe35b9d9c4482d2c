//! Canonical layout types shared by the normalizer, the translator and the
//! HTTP layer.

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Kind of a layout block. Only text-bearing kinds survive normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// Body text paragraph. (default)
    #[default]
    Text,
    /// Heading / title.
    Title,
}

impl BlockKind {
    /// Map a source `type` tag to a kind; any other tag is not representable.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "text" => Some(BlockKind::Text),
            "title" => Some(BlockKind::Title),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Title => "title",
        }
    }
}

/// One normalized unit of extracted document content.
///
/// `bbox` keeps the numbers exactly as the source wrote them (`0` stays `0`,
/// `0.5` stays `0.5`). Depending on the source schema the coordinates are
/// pixels or 0–1 fractions of the page; nothing here rescales them.
///
/// `translated_text` is a single slot: translating the block into a second
/// language replaces the first translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutBlock {
    /// 1-based page number.
    #[serde(default = "first_page")]
    pub page: u32,

    /// `[x1, y1, x2, y2, …]`, at least four numbers.
    #[serde(default)]
    pub bbox: Vec<Number>,

    /// Trimmed, non-empty text.
    #[serde(default)]
    pub text: String,

    /// `"text"` or `"title"`.
    #[serde(rename = "type", default)]
    pub kind: BlockKind,

    /// Most recent translation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
}

fn first_page() -> u32 {
    1
}

impl LayoutBlock {
    /// Build a block without a translation.
    pub fn new(page: u32, bbox: Vec<Number>, text: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            page,
            bbox,
            text: text.into(),
            kind,
            translated_text: None,
        }
    }

    /// Whether the block already carries a non-empty translation.
    pub fn has_translation(&self) -> bool {
        self.translated_text
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }
}

/// The all-zero rectangle used by the legacy shape when no usable bbox exists.
pub fn zero_bbox() -> Vec<Number> {
    vec![Number::from(0); 4]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_type_key_and_no_empty_translation() {
        let block = LayoutBlock::new(
            1,
            vec![0.into(), 0.into(), 100.into(), 20.into()],
            "Intro",
            BlockKind::Title,
        );
        let v = serde_json::to_value(&block).unwrap();
        assert_eq!(
            v,
            json!({"page": 1, "bbox": [0, 0, 100, 20], "text": "Intro", "type": "title"})
        );
    }

    #[test]
    fn deserializes_client_supplied_block() {
        let block: LayoutBlock = serde_json::from_value(json!({
            "page": 2,
            "bbox": [0.1, 0.2, 0.3, 0.4],
            "text": "Hello",
            "type": "text",
            "translated_text": "你好"
        }))
        .unwrap();
        assert_eq!(block.page, 2);
        assert_eq!(block.kind, BlockKind::Text);
        assert!(block.has_translation());
    }

    #[test]
    fn empty_translation_does_not_count() {
        let mut block = LayoutBlock::new(1, zero_bbox(), "x", BlockKind::Text);
        block.translated_text = Some(String::new());
        assert!(!block.has_translation());
    }

    #[test]
    fn kind_tags() {
        assert_eq!(BlockKind::from_tag("title"), Some(BlockKind::Title));
        assert_eq!(BlockKind::from_tag("image"), None);
        assert_eq!(BlockKind::Text.as_str(), "text");
    }
}
