//! Video metadata and thumbnails.
//!
//! Both are best effort: a missing `ffprobe` or `ffmpeg`, an unreadable
//! stream or a timeout only means the video is sent without them.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;

use linkdrop_core::{MediaInfo, Settings};

/// Upper bound for one `ffprobe` or `ffmpeg` run.
const INSPECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Telegram rejects thumbnails above this size.
pub const MAX_THUMBNAIL_BYTES: u64 = 200 * 1024;

/// Reads stream properties of a video and renders a preview frame.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaInspector: Send + Sync {
    /// Duration and resolution of the first video stream.
    async fn inspect(&self, video: &Path) -> Option<MediaInfo>;

    /// Write a JPEG preview of `video` into `out_dir`.
    async fn thumbnail(&self, video: &Path, out_dir: &Path) -> Option<PathBuf>;
}

pub fn build_media_inspector(settings: &Settings) -> Arc<dyn MediaInspector> {
    Arc::new(FfmpegInspector::new(
        settings.tools.ffprobe.clone(),
        settings.tools.ffmpeg.clone(),
    ))
}

/// `ffprobe` for metadata, `ffmpeg`'s `thumbnail` filter for previews.
#[derive(Debug, Clone)]
pub struct FfmpegInspector {
    ffprobe: PathBuf,
    ffmpeg: PathBuf,
}

impl FfmpegInspector {
    pub const fn new(ffprobe: PathBuf, ffmpeg: PathBuf) -> Self {
        Self { ffprobe, ffmpeg }
    }
}

#[async_trait]
impl MediaInspector for FfmpegInspector {
    async fn inspect(&self, video: &Path) -> Option<MediaInfo> {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(video);
        let stdout = run_quiet(cmd, "ffprobe").await?;

        let info = parse_stream_report(&stdout);
        if info.is_none() {
            tracing::debug!(path = %video.display(), "No video stream found");
        }
        info
    }

    async fn thumbnail(&self, video: &Path, out_dir: &Path) -> Option<PathBuf> {
        let stem = video
            .file_stem()
            .map_or_else(|| "thumb".to_string(), |s| s.to_string_lossy().into_owned());
        let out = out_dir.join(format!("{stem}.thumb.jpg"));

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-y", "-v", "error", "-i"])
            .arg(video)
            .args(["-vf", "thumbnail,scale=320:-2", "-frames:v", "1", "-f", "image2"])
            .arg(&out);
        run_quiet(cmd, "ffmpeg").await?;

        let size = tokio::fs::metadata(&out).await.ok()?.len();
        if size == 0 || size > MAX_THUMBNAIL_BYTES {
            tracing::debug!(path = %out.display(), size, "Thumbnail unusable");
            return None;
        }
        Some(out)
    }
}

/// Stdout of a successful run, or `None` after logging why not.
async fn run_quiet(mut cmd: Command, tool: &str) -> Option<Vec<u8>> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match timeout(INSPECT_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            tracing::debug!(tool, error = %e, "Failed to run media tool");
            return None;
        }
        Err(_) => {
            tracing::warn!(tool, timeout = ?INSPECT_TIMEOUT, "Media tool timed out");
            return None;
        }
    };

    if !output.status.success() {
        tracing::debug!(
            tool,
            status = ?output.status.code(),
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "Media tool failed"
        );
        return None;
    }
    Some(output.stdout)
}

#[derive(Debug, Deserialize)]
struct StreamReport {
    #[serde(default)]
    streams: Vec<StreamEntry>,
    format: Option<FormatEntry>,
}

#[derive(Debug, Deserialize)]
struct StreamEntry {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FormatEntry {
    duration: Option<String>,
}

/// Extract [`MediaInfo`] from `ffprobe -print_format json` output.
///
/// The container duration wins over the stream's when both parse; `ffprobe`
/// reports them as decimal strings or `N/A`.
fn parse_stream_report(json: &[u8]) -> Option<MediaInfo> {
    let report: StreamReport = serde_json::from_slice(json).ok()?;
    let video = report
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))?;
    let (width, height) = (video.width?, video.height?);
    if width == 0 || height == 0 {
        return None;
    }

    let seconds = |d: Option<&str>| {
        d.and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && (0.0..1e12).contains(secs))
    };
    let duration = seconds(report.format.as_ref().and_then(|f| f.duration.as_deref()))
        .or_else(|| seconds(video.duration.as_deref()))
        .map(Duration::from_secs_f64);

    Some(MediaInfo {
        duration,
        width,
        height,
    })
}

/// Caption line such as `⏱ 01:02:03 · 1920x1080`.
pub fn describe_media(info: &MediaInfo) -> String {
    let resolution = format!("{}x{}", info.width, info.height);
    match info.duration {
        Some(duration) => {
            let secs = duration.as_secs();
            format!(
                "⏱ {:02}:{:02}:{:02} · {resolution}",
                secs / 3600,
                (secs / 60) % 60,
                secs % 60
            )
        }
        None => resolution,
    }
}
