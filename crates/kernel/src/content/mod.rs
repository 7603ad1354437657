//! Content management module.
//!
//! This module provides:
//! - ContentBlock: the ordered text/image blocks that make up a blog body
//! - Block editing operations: append, remove, move up/down
//! - Correlation: matching pending image blocks with uploaded files

pub mod block;
pub mod correlate;

pub use block::{
    BlockKind, ContentBlock, MoveDirection, append_block, image_references, move_block,
    remove_block,
};
pub use correlate::{CorrelationError, CorrelationPlan, plan_correlation};
