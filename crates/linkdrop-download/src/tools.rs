//! External tool discovery, version checks and self-update.

use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

use linkdrop_core::{Settings, SplitterKind, ToolPaths};

/// Upper bound for a `--version` call.
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for the update command.
const UPDATE_TIMEOUT: Duration = Duration::from_secs(600);

/// One configured tool and where `which` found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub name: &'static str,
    pub configured: PathBuf,
    pub resolved: Option<PathBuf>,
}

impl ToolStatus {
    pub const fn is_available(&self) -> bool {
        self.resolved.is_some()
    }
}

/// Tools the current settings may invoke.
fn relevant_tools(settings: &Settings) -> Vec<(&'static str, PathBuf)> {
    let tools: &ToolPaths = &settings.tools;
    let mut list = vec![
        ("wget", tools.direct.clone()),
        ("yt-dlp", tools.extractor.clone()),
    ];
    if settings.prefer_multi_connection {
        list.push(("aria2c", tools.multi_connection.clone()));
    }
    match settings.splitter {
        SplitterKind::Split => list.push(("split", tools.split.clone())),
        SplitterKind::SevenZip => list.push(("7z", tools.seven_zip.clone())),
    }
    list.push(("ffprobe", tools.ffprobe.clone()));
    list.push(("ffmpeg", tools.ffmpeg.clone()));
    list
}

/// Look every relevant tool up on `PATH`. Missing tools are logged at `warn`.
pub fn locate_tools(settings: &Settings) -> Vec<ToolStatus> {
    relevant_tools(settings)
        .into_iter()
        .map(|(name, configured)| {
            let resolved = which::which(&configured).ok();
            if resolved.is_none() {
                tracing::warn!(tool = name, path = %configured.display(), "Tool not found");
            }
            ToolStatus {
                name,
                configured,
                resolved,
            }
        })
        .collect()
}

/// First non-empty output line of `<program> --version`.
///
/// `7z` prints its banner without a flag; the ffmpeg tools take `-version`.
pub async fn tool_version(name: &str, program: &Path) -> Option<String> {
    let mut cmd = Command::new(program);
    match name {
        "7z" => {}
        "ffprobe" | "ffmpeg" => {
            cmd.arg("-version");
        }
        _ => {
            cmd.arg("--version");
        }
    }
    cmd.stdin(Stdio::null()).kill_on_drop(true);

    let output = timeout(VERSION_TIMEOUT, cmd.output()).await.ok()?.ok()?;
    let text = if output.stdout.is_empty() {
        output.stderr
    } else {
        output.stdout
    };
    String::from_utf8_lossy(&text)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(ToString::to_string)
}

/// Errors from the update command.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Update command is empty")]
    EmptyCommand,

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Update timed out after {0:?}")]
    TimedOut(Duration),
}

/// Outcome of `/update`.
#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub success: bool,
    /// Last lines of the update command's output.
    pub output_tail: String,
    /// `(tool, version)` after the update.
    pub versions: Vec<(&'static str, Option<String>)>,
}

impl UpdateReport {
    /// Chat-ready summary.
    pub fn render(&self) -> String {
        let mut out = if self.success {
            "✅ Tools updated.".to_string()
        } else {
            "⚠️ Update command failed.".to_string()
        };
        if !self.output_tail.is_empty() {
            out.push_str("\n\n");
            out.push_str(&self.output_tail);
        }
        out.push_str("\n\nVersions:");
        for (name, version) in &self.versions {
            let _ = write!(
                out,
                "\n- {name}: {}",
                version.as_deref().unwrap_or("not found")
            );
        }
        out
    }
}

/// Runs the configured update command and reports tool versions.
#[derive(Debug, Clone)]
pub struct ToolUpdater {
    command: Vec<String>,
    settings: Settings,
}

impl ToolUpdater {
    pub fn new(settings: &Settings) -> Self {
        Self {
            command: settings.update_command.clone(),
            settings: settings.clone(),
        }
    }

    pub async fn run(&self) -> Result<UpdateReport, UpdateError> {
        let (program, args) = self.command.split_first().ok_or(UpdateError::EmptyCommand)?;
        tracing::info!(command = %self.command.join(" "), "Running tool update");

        let output = timeout(
            UPDATE_TIMEOUT,
            Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| UpdateError::TimedOut(UPDATE_TIMEOUT))?
        .map_err(|source| UpdateError::Spawn {
            program: program.clone(),
            source,
        })?;

        let success = output.status.success();
        if !success {
            tracing::warn!(status = ?output.status.code(), "Update command failed");
        }

        Ok(UpdateReport {
            success,
            output_tail: crate::split::output_tail(&output.stdout, &output.stderr),
            versions: self.versions().await,
        })
    }

    /// Current version of every relevant tool.
    pub async fn versions(&self) -> Vec<(&'static str, Option<String>)> {
        let mut versions = Vec::new();
        for (name, program) in relevant_tools(&self.settings) {
            versions.push((name, tool_version(name, &program).await));
        }
        versions
    }
}
