//! Command-line and environment configuration.
//!
//! Every option can come from a flag, an environment variable, or a `.env`
//! file loaded before parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use linkdrop_core::{
    Settings, SettingsError, SplitterKind, ToolPaths, validate_settings,
};
use linkdrop_telegram::DEFAULT_API_URL;

const MIB: u64 = 1024 * 1024;

/// Telegram bot that downloads links and uploads the result.
#[derive(Debug, Clone, Parser)]
#[command(name = "linkdrop", version, about)]
pub struct BotConfig {
    /// Bot API token from @BotFather.
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    pub bot_token: String,

    /// Telegram user id allowed to run /update and cancel any task.
    #[arg(long, env = "OWNER_ID")]
    pub owner_id: Option<i64>,

    /// Bot API base URL (a local Bot API server lifts the upload limit).
    #[arg(long, env = "API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Parent directory of per-task work directories.
    #[arg(long, env = "DOWNLOAD_DIR", default_value = "/tmp/downloads")]
    pub download_dir: PathBuf,

    /// Tasks allowed to run at the same time.
    #[arg(long, env = "MAX_CONCURRENT_TASKS", default_value_t = linkdrop_core::DEFAULT_MAX_CONCURRENT_TASKS)]
    pub max_concurrent_tasks: u32,

    /// Minimum seconds between two progress edits of one status message.
    #[arg(long, env = "STATUS_INTERVAL_SECS", default_value_t = 20)]
    pub status_interval_secs: u64,

    /// Largest file uploaded in one piece, in MiB.
    #[arg(long, env = "MAX_DIRECT_SIZE_MIB", default_value_t = 1990)]
    pub max_direct_size_mib: u64,

    /// Volume size for split archives, in MiB (defaults to the direct limit).
    #[arg(long, env = "SPLIT_VOLUME_MIB")]
    pub split_volume_mib: Option<u64>,

    /// Archive splitter: `split` or `7z`.
    #[arg(long, env = "SPLITTER", default_value = "split")]
    pub splitter: SplitterKind,

    /// Use aria2c instead of wget for direct files.
    #[arg(long, env = "PREFER_ARIA2")]
    pub prefer_aria2: bool,

    /// Seconds between SIGTERM and SIGKILL when cancelling a tool.
    #[arg(long, env = "CANCEL_GRACE_SECS", default_value_t = 10)]
    pub cancel_grace_secs: u64,

    #[arg(long, env = "WGET_PATH", default_value = "wget")]
    pub wget_path: PathBuf,

    #[arg(long, env = "YTDLP_PATH", default_value = "yt-dlp")]
    pub ytdlp_path: PathBuf,

    #[arg(long, env = "ARIA2C_PATH", default_value = "aria2c")]
    pub aria2c_path: PathBuf,

    #[arg(long, env = "SPLIT_PATH", default_value = "split")]
    pub split_path: PathBuf,

    #[arg(long, env = "SEVEN_ZIP_PATH", default_value = "7z")]
    pub seven_zip_path: PathBuf,

    /// Reads video duration and resolution for upload captions.
    #[arg(long, env = "FFPROBE_PATH", default_value = "ffprobe")]
    pub ffprobe_path: PathBuf,

    /// Renders video thumbnails.
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    pub ffmpeg_path: PathBuf,

    /// Command run by /update, split on whitespace.
    #[arg(long, env = "UPDATE_COMMAND")]
    pub update_command: Option<String>,

    /// Directory for daily rotated log files. Stdout only when unset.
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Long-poll timeout for getUpdates, in seconds.
    #[arg(long, env = "POLL_TIMEOUT_SECS", default_value_t = 30)]
    pub poll_timeout_secs: u64,

    /// Seconds to wait for running tasks on shutdown.
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 30)]
    pub shutdown_grace_secs: u64,
}

impl BotConfig {
    /// Load `.env` (if present), then parse flags and environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }

    /// Assemble and validate the supervisor settings.
    pub fn to_settings(&self) -> Result<Settings, SettingsError> {
        let defaults = Settings::default();
        let max_direct_size = self.max_direct_size_mib.saturating_mul(MIB);
        let update_command = self.update_command.as_deref().map_or_else(
            || defaults.update_command.clone(),
            |cmd| cmd.split_whitespace().map(ToString::to_string).collect(),
        );

        let settings = Settings {
            max_concurrent_tasks: self.max_concurrent_tasks,
            status_interval: Duration::from_secs(self.status_interval_secs),
            max_direct_size,
            split_volume_size: self
                .split_volume_mib
                .map_or(max_direct_size, |mib| mib.saturating_mul(MIB)),
            download_dir: self.download_dir.clone(),
            cancel_grace: Duration::from_secs(self.cancel_grace_secs),
            owner_id: self.owner_id,
            tools: ToolPaths {
                direct: self.wget_path.clone(),
                extractor: self.ytdlp_path.clone(),
                multi_connection: self.aria2c_path.clone(),
                split: self.split_path.clone(),
                seven_zip: self.seven_zip_path.clone(),
                ffprobe: self.ffprobe_path.clone(),
                ffmpeg: self.ffmpeg_path.clone(),
            },
            splitter: self.splitter,
            prefer_multi_connection: self.prefer_aria2,
            update_command,
        };

        validate_settings(&settings)?;
        Ok(settings)
    }

    pub const fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
