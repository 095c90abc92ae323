//! `7z` backend.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use linkdrop_core::UploadPart;

use super::{ArchiveSplitter, SplitError, collect_parts, output_tail};

/// Store-only multi-volume archive `<name>.7z.001`, `<name>.7z.002`, ...
#[derive(Debug, Clone)]
pub struct SevenZipSplitter {
    program: PathBuf,
}

impl SevenZipSplitter {
    pub const fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

#[async_trait]
impl ArchiveSplitter for SevenZipSplitter {
    async fn split(
        &self,
        source: &Path,
        out_dir: &Path,
        volume_size: u64,
    ) -> Result<Vec<UploadPart>, SplitError> {
        let file_name = source
            .file_name()
            .map_or_else(|| "artifact".to_string(), |n| n.to_string_lossy().into_owned());
        let archive = format!("{file_name}.7z");

        let output = Command::new(&self.program)
            .arg("a")
            .arg("-t7z")
            .arg("-mx0")
            .arg(format!("-v{volume_size}b"))
            .arg("-y")
            .arg(out_dir.join(&archive))
            .arg(source)
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

        collect_parts(out_dir, &format!("{archive}."), self.name()).await
    }

    fn name(&self) -> &'static str {
        "7z"
    }
}
