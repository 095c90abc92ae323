//! coreutils `split` backend.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use linkdrop_core::UploadPart;

use super::{ArchiveSplitter, SplitError, collect_parts, output_tail};

/// Cuts the file into raw byte slices `<name>.001`, `<name>.002`, ...
///
/// Reassemble with `cat name.* > name`.
#[derive(Debug, Clone)]
pub struct SplitCommandSplitter {
    program: PathBuf,
}

impl SplitCommandSplitter {
    pub const fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

#[async_trait]
impl ArchiveSplitter for SplitCommandSplitter {
    async fn split(
        &self,
        source: &Path,
        out_dir: &Path,
        volume_size: u64,
    ) -> Result<Vec<UploadPart>, SplitError> {
        let file_name = source
            .file_name()
            .map_or_else(|| "artifact".to_string(), |n| n.to_string_lossy().into_owned());
        let prefix = format!("{file_name}.");

        let output = Command::new(&self.program)
            .arg(format!("--bytes={volume_size}"))
            .arg("--numeric-suffixes=1")
            .arg("--suffix-length=3")
            .arg(source)
            .arg(out_dir.join(&prefix))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| SplitError::Spawn {
                tool: self.name().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(SplitError::Failed {
                tool: self.name().to_string(),
                code: output.status.code(),
                output: output_tail(&output.stdout, &output.stderr),
            });
        }

        collect_parts(out_dir, &prefix, self.name()).await
    }

    fn name(&self) -> &'static str {
        "split"
    }
}
