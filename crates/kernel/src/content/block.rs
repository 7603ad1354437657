//! Content blocks and the editing operations on a block sequence.
//!
//! A blog body is an ordered `Vec<ContentBlock>`. Identity is positional:
//! reordering changes indices, nothing else identifies a block.
//!
//! The editing operations model the admin editor, which edits the block list
//! client-side and submits the whole list; no handler calls them.

use serde::{Deserialize, Serialize};

/// Kind of a content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Image,
}

/// One unit of a document body.
///
/// Wire form: `{"type": "text", "value": "..."}` or
/// `{"type": "image", "value": "/uploads/..."}`. An image block without a
/// value (absent, `null` or `""`) is pending an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        value: String,
    },
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
}

impl ContentBlock {
    /// An empty text block.
    pub fn text(value: impl Into<String>) -> Self {
        ContentBlock::Text {
            value: value.into(),
        }
    }

    /// An image block waiting for its upload.
    pub fn pending_image() -> Self {
        ContentBlock::Image { value: None }
    }

    /// An image block pointing at a stored file.
    pub fn image(reference: impl Into<String>) -> Self {
        ContentBlock::Image {
            value: Some(reference.into()),
        }
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            ContentBlock::Text { .. } => BlockKind::Text,
            ContentBlock::Image { .. } => BlockKind::Image,
        }
    }

    /// True for an image block that has no stored reference yet.
    pub fn is_pending_image(&self) -> bool {
        matches!(self, ContentBlock::Image { value } if value.as_deref().is_none_or(str::is_empty))
    }

    /// The stored file reference of an image block, if any.
    pub fn image_reference(&self) -> Option<&str> {
        match self {
            ContentBlock::Image { value: Some(v) } if !v.is_empty() => Some(v),
            _ => None,
        }
    }
}

/// Direction for [`move_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

/// Append a block at the end of the sequence.
pub fn append_block(blocks: &mut Vec<ContentBlock>, kind: BlockKind) {
    blocks.push(match kind {
        BlockKind::Text => ContentBlock::text(""),
        BlockKind::Image => ContentBlock::pending_image(),
    });
}

/// Remove the block at `index`; later blocks shift down by one.
///
/// Returns the removed block, or `None` when `index` is out of range.
pub fn remove_block(blocks: &mut Vec<ContentBlock>, index: usize) -> Option<ContentBlock> {
    (index < blocks.len()).then(|| blocks.remove(index))
}

/// Swap the block at `index` with its neighbour in `direction`.
///
/// Moving the first block up, the last block down, or an out-of-range index
/// leaves the sequence unchanged. Returns whether anything moved.
pub fn move_block(blocks: &mut [ContentBlock], index: usize, direction: MoveDirection) -> bool {
    let target = match direction {
        MoveDirection::Up => index.checked_sub(1),
        MoveDirection::Down => index.checked_add(1),
    };

    match target {
        Some(target) if index < blocks.len() && target < blocks.len() => {
            blocks.swap(index, target);
            true
        }
        _ => false,
    }
}

/// Stored file references of every image block, in order.
pub fn image_references(blocks: &[ContentBlock]) -> impl Iterator<Item = &str> {
    blocks.iter().filter_map(ContentBlock::image_reference)
}
