//! Archive splitting for oversized artifacts.
//!
//! The actual work is delegated to an external tool; this module only runs
//! it and collects the numbered volumes it leaves behind.

mod coreutils;
mod seven_zip;

use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use linkdrop_core::{Settings, SplitterKind, UploadPart};

pub use coreutils::SplitCommandSplitter;
pub use seven_zip::SevenZipSplitter;

/// Errors from splitting an artifact.
#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} exited with status {code:?}: {output}")]
    Failed {
        tool: String,
        code: Option<i32>,
        output: String,
    },

    #[error("{tool} produced no parts")]
    NoParts { tool: String },

    #[error("Part numbering has a gap after part {after}")]
    Gap { after: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Splits a file into ordered volumes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArchiveSplitter: Send + Sync {
    /// Split `source` into volumes of at most `volume_size` bytes inside
    /// `out_dir`. Parts come back ordered and numbered from 1.
    async fn split(
        &self,
        source: &Path,
        out_dir: &Path,
        volume_size: u64,
    ) -> Result<Vec<UploadPart>, SplitError>;

    /// Tool name for status messages.
    fn name(&self) -> &'static str;
}

/// Build the configured splitter.
pub fn build_splitter(settings: &Settings) -> Arc<dyn ArchiveSplitter> {
    match settings.splitter {
        SplitterKind::Split => Arc::new(SplitCommandSplitter::new(settings.tools.split.clone())),
        SplitterKind::SevenZip => Arc::new(SevenZipSplitter::new(settings.tools.seven_zip.clone())),
    }
}

/// Collect `<prefix>NNN` files from `dir`, ordered by their numeric suffix.
///
/// The suffix must be all digits and the numbering must run `1..=n`.
pub(crate) async fn collect_parts(
    dir: &Path,
    prefix: &str,
    tool: &str,
) -> Result<Vec<UploadPart>, SplitError> {
    let mut found = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(suffix) = name.strip_prefix(prefix) else {
            continue;
        };
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let Ok(index) = suffix.parse::<u32>() else {
            continue;
        };
        let size = entry.metadata().await?.len();
        found.push(UploadPart::new(index, entry.path(), size));
    }

    if found.is_empty() {
        return Err(SplitError::NoParts {
            tool: tool.to_string(),
        });
    }

    found.sort_by_key(|p| p.sequence_index);
    for (expected, part) in (1u32..).zip(&found) {
        if part.sequence_index != expected {
            return Err(SplitError::Gap {
                after: expected - 1,
            });
        }
    }
    Ok(found)
}

/// Last lines of a tool's combined output, for error messages.
pub(crate) fn output_tail(stdout: &[u8], stderr: &[u8]) -> String {
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(stdout),
        String::from_utf8_lossy(stderr)
    );
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(3);
    lines[start..].join(" | ")
}
