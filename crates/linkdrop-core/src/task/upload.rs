//! Parts of a split artifact.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One volume of a split artifact.
///
/// `sequence_index` is 1-based and contiguous; it fixes the upload order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPart {
    pub sequence_index: u32,
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl UploadPart {
    pub fn new(sequence_index: u32, path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            sequence_index,
            path: path.into(),
            size_bytes,
        }
    }

    /// File name used as the upload name.
    pub fn file_name(&self) -> String {
        self.path.file_name().map_or_else(
            || format!("part{:03}", self.sequence_index),
            |n| n.to_string_lossy().into_owned(),
        )
    }
}

/// Check that parts are numbered `1..=n` without gaps, in order.
pub fn is_contiguous(parts: &[UploadPart]) -> bool {
    parts
        .iter()
        .zip(1u32..)
        .all(|(part, expected)| part.sequence_index == expected)
}
