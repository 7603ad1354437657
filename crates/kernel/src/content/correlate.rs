//! Correlation of pending image blocks with uploaded files.
//!
//! The client submits the block list plus a flat list of new files. Each
//! pending image block takes the next unconsumed file, in left-to-right order
//! of the pending blocks only; text blocks and already-stored images never
//! consume. Planning is pure so that a mismatch is detected before any file
//! is written or any record touched.

use thiserror::Error;

use super::block::ContentBlock;

/// Failure to line up pending image blocks with uploaded files.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    /// A pending image block has no file left to consume.
    #[error("missing image file for block {block_index} (pending image #{pending_index})")]
    MissingUpload {
        block_index: usize,
        pending_index: usize,
    },

    /// More files were uploaded than there are pending image blocks.
    #[error("{supplied} image files supplied for {expected} pending image blocks")]
    SurplusUploads { expected: usize, supplied: usize },

    /// An image block carries a value that is not a stored file reference.
    #[error("invalid image reference in block {block_index}")]
    InvalidReference { block_index: usize, value: String },
}

/// Which blocks receive which upload, computed before anything is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationPlan {
    /// Block indices of the pending image blocks, in upload order.
    targets: Vec<usize>,
}

/// Plan the correlation of `blocks` with `upload_count` uploaded files.
///
/// `is_reference` decides whether a present image value is a stored file
/// reference that passes through unchanged.
pub fn plan_correlation(
    blocks: &[ContentBlock],
    upload_count: usize,
    is_reference: impl Fn(&str) -> bool,
) -> Result<CorrelationPlan, CorrelationError> {
    let mut targets = Vec::new();

    for (block_index, block) in blocks.iter().enumerate() {
        let ContentBlock::Image { value } = block else {
            continue;
        };

        match value.as_deref() {
            None | Some("") => {
                if targets.len() >= upload_count {
                    return Err(CorrelationError::MissingUpload {
                        block_index,
                        pending_index: targets.len(),
                    });
                }
                targets.push(block_index);
            }
            Some(v) if is_reference(v) => {}
            Some(v) => {
                return Err(CorrelationError::InvalidReference {
                    block_index,
                    value: v.to_string(),
                });
            }
        }
    }

    if targets.len() < upload_count {
        return Err(CorrelationError::SurplusUploads {
            expected: targets.len(),
            supplied: upload_count,
        });
    }

    Ok(CorrelationPlan { targets })
}

impl CorrelationPlan {
    /// Number of uploads this plan consumes.
    pub fn pending_count(&self) -> usize {
        self.targets.len()
    }

    /// Assign stored references to the pending blocks.
    ///
    /// `references[k]` is the stored location of the k-th uploaded file.
    pub fn apply(
        &self,
        blocks: &mut [ContentBlock],
        references: Vec<String>,
    ) -> Result<(), CorrelationError> {
        if references.len() > self.targets.len() {
            return Err(CorrelationError::SurplusUploads {
                expected: self.targets.len(),
                supplied: references.len(),
            });
        }
        if let Some(&block_index) = self.targets.get(references.len()) {
            return Err(CorrelationError::MissingUpload {
                block_index,
                pending_index: references.len(),
            });
        }

        for (&index, reference) in self.targets.iter().zip(references) {
            if let Some(block) = blocks.get_mut(index) {
                *block = ContentBlock::image(reference);
            }
        }

        Ok(())
    }
}
