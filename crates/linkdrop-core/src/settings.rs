//! Settings domain types and validation.
//!
//! Pure data; the binary assembles a `Settings` from flags and environment and
//! hands it to the supervisor once at startup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Default number of tasks allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT_TASKS: u32 = 5;

/// Default minimum spacing between status edits for one task.
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(20);

/// Largest file uploaded in one piece (1990 MiB).
pub const DEFAULT_MAX_DIRECT_SIZE: u64 = 1990 * MIB;

/// Grace period between SIGTERM and SIGKILL on cancellation.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(10);

/// Which external tool splits oversized artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitterKind {
    /// coreutils `split`: raw byte slices, reassembled with `cat`.
    #[default]
    Split,
    /// `7z` store-only multi-volume archive.
    #[serde(rename = "7z")]
    SevenZip,
}

impl fmt::Display for SplitterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Split => f.write_str("split"),
            Self::SevenZip => f.write_str("7z"),
        }
    }
}

impl FromStr for SplitterKind {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "split" => Ok(Self::Split),
            "7z" | "7zip" | "sevenzip" => Ok(Self::SevenZip),
            other => Err(SettingsError::UnknownSplitter(other.to_string())),
        }
    }
}

/// Paths (or bare names resolved through `PATH`) of the external tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    /// Direct HTTP fetcher (`wget`).
    pub direct: PathBuf,
    /// Media extractor (`yt-dlp`).
    pub extractor: PathBuf,
    /// Multi-connection fetcher (`aria2c`).
    pub multi_connection: PathBuf,
    /// coreutils `split`.
    pub split: PathBuf,
    /// `7z`.
    pub seven_zip: PathBuf,
    /// `ffprobe`, for video duration and resolution.
    pub ffprobe: PathBuf,
    /// `ffmpeg`, for video thumbnails.
    pub ffmpeg: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            direct: PathBuf::from("wget"),
            extractor: PathBuf::from("yt-dlp"),
            multi_connection: PathBuf::from("aria2c"),
            split: PathBuf::from("split"),
            seven_zip: PathBuf::from("7z"),
            ffprobe: PathBuf::from("ffprobe"),
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Global concurrency bound on running tasks.
    pub max_concurrent_tasks: u32,

    /// Minimum spacing between non-forced status edits of one task.
    pub status_interval: Duration,

    /// Files strictly larger than this are split before upload.
    pub max_direct_size: u64,

    /// Volume size handed to the splitter.
    pub split_volume_size: u64,

    /// Parent directory for per-task work directories.
    pub download_dir: PathBuf,

    /// SIGTERM to SIGKILL grace on cancellation.
    pub cancel_grace: Duration,

    /// Telegram user id allowed to run owner-only commands.
    pub owner_id: Option<i64>,

    pub tools: ToolPaths,

    pub splitter: SplitterKind,

    /// Use `aria2c` instead of `wget` for direct downloads.
    pub prefer_multi_connection: bool,

    /// Command run by `/update` (program followed by its arguments).
    pub update_command: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            status_interval: DEFAULT_STATUS_INTERVAL,
            max_direct_size: DEFAULT_MAX_DIRECT_SIZE,
            split_volume_size: DEFAULT_MAX_DIRECT_SIZE,
            download_dir: PathBuf::from("/tmp/downloads"),
            cancel_grace: DEFAULT_CANCEL_GRACE,
            owner_id: None,
            tools: ToolPaths::default(),
            splitter: SplitterKind::default(),
            prefer_multi_connection: false,
            update_command: ["pip", "install", "--upgrade", "yt-dlp[default]"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl Settings {
    /// Whether `user` may run owner-only commands.
    #[must_use]
    pub fn is_owner(&self, user: i64) -> bool {
        self.owner_id == Some(user)
    }

    /// Whether an artifact of `size` bytes must be split.
    #[must_use]
    pub const fn needs_split(&self, size: u64) -> bool {
        size > self.max_direct_size
    }
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Max concurrent tasks must be between 1 and 64, got {0}")]
    InvalidConcurrency(u32),

    #[error("Status interval must be at least one second, got {0:?}")]
    InvalidStatusInterval(Duration),

    #[error("Max direct size must be greater than zero")]
    ZeroDirectSize,

    #[error("Split volume size must be between 1 byte and the max direct size ({max}), got {got}")]
    InvalidVolumeSize { got: u64, max: u64 },

    #[error("Download directory cannot be empty")]
    EmptyDownloadDir,

    #[error("Update command cannot be empty")]
    EmptyUpdateCommand,

    #[error("Unknown splitter {0:?} (expected \"split\" or \"7z\")")]
    UnknownSplitter(String),
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if !(1..=64).contains(&settings.max_concurrent_tasks) {
        return Err(SettingsError::InvalidConcurrency(
            settings.max_concurrent_tasks,
        ));
    }

    if settings.status_interval < Duration::from_secs(1) {
        return Err(SettingsError::InvalidStatusInterval(
            settings.status_interval,
        ));
    }

    if settings.max_direct_size == 0 {
        return Err(SettingsError::ZeroDirectSize);
    }

    if settings.split_volume_size == 0 || settings.split_volume_size > settings.max_direct_size {
        return Err(SettingsError::InvalidVolumeSize {
            got: settings.split_volume_size,
            max: settings.max_direct_size,
        });
    }

    if settings.download_dir.as_os_str().is_empty() {
        return Err(SettingsError::EmptyDownloadDir);
    }

    if settings
        .update_command
        .first()
        .is_none_or(|program| program.trim().is_empty())
    {
        return Err(SettingsError::EmptyUpdateCommand);
    }

    Ok(())
}
