//! Tool selection and command construction.
//!
//! A task's URL is classified by shape and mapped to an ordered list of
//! command plans. The worker runs them in order and stops at the first one
//! that succeeds.

use std::fmt;
use std::path::{Path, PathBuf};

use linkdrop_core::{Settings, TaskSource, ToolPaths};

/// URL endings that point at a file a plain HTTP fetch can retrieve.
const DIRECT_EXTENSIONS: &[&str] = &[
    ".mp4", ".mkv", ".avi", ".mov", ".webm", ".flv", ".mp3", ".wav", ".ogg", ".m4a", ".zip",
    ".rar", ".7z", ".tar", ".gz", ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".jpg", ".jpeg",
    ".png", ".gif", ".bmp", ".iso", ".apk", ".exe",
];

/// Hosts that always need the media extractor.
const EXTRACTOR_DOMAINS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "dailymotion.com",
    "twitch.tv",
    "twitter.com",
    "x.com",
    "tiktok.com",
    "instagram.com",
    "facebook.com",
    "reddit.com",
    "soundcloud.com",
];

/// Substrings that mark a streaming manifest.
const MANIFEST_MARKERS: &[&str] = &[".m3u8", ".mpd", "manifest"];

/// Fallback name when neither the URL nor the user gives one.
const DEFAULT_FILE_NAME: &str = "download";

/// Family of an external downloader. Selects the output parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolFamily {
    /// Single-connection HTTP fetch (`wget`).
    Direct,
    /// Media extraction (`yt-dlp`).
    Extractor,
    /// Multi-connection fetch (`aria2c`).
    MultiConnection,
}

impl ToolFamily {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "wget",
            Self::Extractor => "yt-dlp",
            Self::MultiConnection => "aria2c",
        }
    }
}

impl fmt::Display for ToolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-resolved command line for one download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub family: ToolFamily,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Directory the tool writes into; also its working directory.
    pub work_dir: PathBuf,
}

impl CommandSpec {
    /// Program and arguments joined for logs.
    pub fn describe(&self) -> String {
        let mut out = self.program.display().to_string();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }
}

/// How a URL should be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlShape {
    /// Ends in a known file extension.
    DirectFile,
    /// Known media host or streaming manifest.
    Streaming,
    /// Anything else.
    Unknown,
}

/// Classify a URL by its shape.
pub fn classify(url: &str) -> UrlShape {
    let lower = url.to_ascii_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or(&lower);

    if MANIFEST_MARKERS.iter().any(|m| lower.contains(m)) || is_extractor_host(path) {
        return UrlShape::Streaming;
    }
    if DIRECT_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return UrlShape::DirectFile;
    }
    UrlShape::Unknown
}

fn is_extractor_host(url: &str) -> bool {
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = after_scheme.split('/').next().unwrap_or_default();
    let host = authority
        .rsplit('@')
        .next()
        .unwrap_or(authority)
        .split(':')
        .next()
        .unwrap_or_default();
    EXTRACTOR_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
}

/// Builds command plans for a task.
#[derive(Debug, Clone)]
pub struct ToolSelector {
    tools: ToolPaths,
    prefer_multi_connection: bool,
}

impl ToolSelector {
    pub fn new(settings: &Settings) -> Self {
        Self {
            tools: settings.tools.clone(),
            prefer_multi_connection: settings.prefer_multi_connection,
        }
    }

    /// Ordered list of attempts for `source`, written into `work_dir`.
    pub fn plan(&self, source: &TaskSource, work_dir: &Path) -> Vec<CommandSpec> {
        let direct = if self.prefer_multi_connection {
            ToolFamily::MultiConnection
        } else {
            ToolFamily::Direct
        };

        let families = match classify(&source.url) {
            UrlShape::DirectFile => vec![direct, ToolFamily::Extractor],
            UrlShape::Streaming => vec![ToolFamily::Extractor],
            UrlShape::Unknown => vec![ToolFamily::Extractor, direct],
        };

        families
            .into_iter()
            .map(|family| self.build(family, source, work_dir))
            .collect()
    }

    fn build(&self, family: ToolFamily, source: &TaskSource, work_dir: &Path) -> CommandSpec {
        let file_name = output_file_name(source);
        let (program, args) = match family {
            ToolFamily::Direct => (
                self.tools.direct.clone(),
                vec![
                    "--progress=dot:giga".to_string(),
                    "--tries=3".to_string(),
                    "--timeout=30".to_string(),
                    "-O".to_string(),
                    work_dir.join(&file_name).display().to_string(),
                    source.url.clone(),
                ],
            ),
            ToolFamily::Extractor => (
                self.tools.extractor.clone(),
                vec![
                    "--newline".to_string(),
                    "--no-colors".to_string(),
                    "--no-playlist".to_string(),
                    "-f".to_string(),
                    "bestvideo+bestaudio/best".to_string(),
                    "--merge-output-format".to_string(),
                    "mp4".to_string(),
                    "--concurrent-fragments".to_string(),
                    "10".to_string(),
                    "--retries".to_string(),
                    "10".to_string(),
                    "--fragment-retries".to_string(),
                    "10".to_string(),
                    "-o".to_string(),
                    work_dir.join("%(title).200B.%(ext)s").display().to_string(),
                    source.url.clone(),
                ],
            ),
            ToolFamily::MultiConnection => (
                self.tools.multi_connection.clone(),
                vec![
                    "-x16".to_string(),
                    "-s16".to_string(),
                    "-k1M".to_string(),
                    "--summary-interval=1".to_string(),
                    "--console-log-level=warn".to_string(),
                    "--file-allocation=none".to_string(),
                    format!("--dir={}", work_dir.display()),
                    format!("--out={file_name}"),
                    source.url.clone(),
                ],
            ),
        };

        CommandSpec {
            family,
            program,
            args,
            work_dir: work_dir.to_path_buf(),
        }
    }
}

/// Byte budget for a sanitized name. Leaves room under the usual 255-byte
/// limit for an appended extension and a `.NNN` volume suffix.
pub const MAX_NAME_BYTES: usize = 200;

/// Longest suffix still treated as an extension when truncating.
const MAX_EXT_BYTES: usize = 10;

/// File name for direct fetches: the display name, else the URL's last segment.
pub fn output_file_name(source: &TaskSource) -> String {
    sanitize_file_name(&source.label())
}

/// Replace path separators and control characters so the name stays inside
/// the work directory.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        DEFAULT_FILE_NAME.to_string()
    } else {
        truncate_name(trimmed)
    }
}

/// Cut `name` to [`MAX_NAME_BYTES`] on a char boundary, keeping a short
/// extension intact.
fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_NAME_BYTES {
        return name.to_string();
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() && ext.len() <= MAX_EXT_BYTES => {
            (stem, Some(ext))
        }
        _ => (name, None),
    };

    let budget = MAX_NAME_BYTES - ext.map_or(0, |e| e.len() + 1);
    let mut end = budget.min(stem.len());
    while !stem.is_char_boundary(end) {
        end -= 1;
    }

    let mut out = stem[..end].trim_end().to_string();
    if let Some(ext) = ext {
        out.push('.');
        out.push_str(ext);
    }
    out
}
