//! Progress parsers for downloader output.
//!
//! One stateful parser per run and tool family. Parsing is best effort: a line
//! that does not look like progress yields `None`, never an error.
//!
//! # Recognised formats
//!
//! ```text
//! wget --progress=dot:giga
//!   Length: 256000000 (244M) [video/mp4]
//!   1048576K ........ ........ ........ ........ 45%  110M 5s
//!
//! yt-dlp --newline
//!   [download]  45.0% of ~10.00MiB at  1.00MiB/s ETA 00:05
//!
//! aria2c
//!   [#2089b0 400MiB/1.2GiB(33%) CN:16 DL:12MiB ETA:1m5s]
//! ```

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use linkdrop_core::ProgressSample;

use super::command::ToolFamily;

static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\d.,]+)\s*([KMGT]?)(?:i?B)?$").expect("valid regex"));
static COMPACT_DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)([dhms])").expect("valid regex"));

static WGET_LENGTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Length:\s+(\d+)").expect("valid regex"));
static WGET_DOTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)K\s[\s.,]*?(\d{1,3})%\s+([\d.,]+[KMGT]?)(?:=(\S+)|\s+(\S+))?")
        .expect("valid regex")
});

static YTDLP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[download\]\s+([\d.]+)%\s+of\s+~?\s*([\d.]+\s*[KMGT]?i?B)(?:\s+at\s+(?:([\d.]+\s*[KMGT]?i?B)/s|\S+))?(?:\s+ETA\s+(\S+))?",
    )
    .expect("valid regex")
});

static ARIA2_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[#\w+\s+([\d.]+[KMGT]?i?B)/([\d.]+[KMGT]?i?B)\((\d{1,3})%\)").expect("valid regex")
});
static ARIA2_DL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"DL:([\d.]+[KMGT]?i?B)").expect("valid regex"));
static ARIA2_ETA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ETA:(\w+)").expect("valid regex"));

/// Turns tool output lines into progress samples.
pub trait ProgressParser: Send {
    fn parse_line(&mut self, line: &str) -> Option<ProgressSample>;
}

/// Fresh parser for a tool family.
pub fn parser_for(family: ToolFamily) -> Box<dyn ProgressParser> {
    match family {
        ToolFamily::Direct => Box::new(WgetParser::default()),
        ToolFamily::Extractor => Box::new(YtDlpParser),
        ToolFamily::MultiConnection => Box::new(Aria2Parser),
    }
}

/// `wget --progress=dot:giga` parser. Remembers the `Length:` header.
#[derive(Debug, Default)]
pub struct WgetParser {
    total: Option<u64>,
}

impl ProgressParser for WgetParser {
    fn parse_line(&mut self, line: &str) -> Option<ProgressSample> {
        if let Some(caps) = WGET_LENGTH_RE.captures(line.trim_start()) {
            self.total = caps[1].parse().ok();
            return None;
        }

        let caps = WGET_DOTS_RE.captures(line)?;
        let offset_kib: u64 = caps[1].parse().ok()?;
        let percent: f64 = caps[2].parse().ok()?;
        let rate = parse_size(&caps[3]);
        let eta = caps.get(5).and_then(|m| parse_compact_duration(m.as_str()));

        let sample = ProgressSample::from_percent(percent)
            .with_rate(rate)
            .with_eta(eta);
        Some(match self.total {
            Some(total) => {
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let done = (total as f64 * sample.percent / 100.0) as u64;
                sample.with_bytes(done, total)
            }
            None => sample.with_bytes(offset_kib.saturating_mul(1024), 0),
        })
    }
}

/// `yt-dlp --newline` parser.
#[derive(Debug, Default)]
pub struct YtDlpParser;

impl ProgressParser for YtDlpParser {
    fn parse_line(&mut self, line: &str) -> Option<ProgressSample> {
        let caps = YTDLP_RE.captures(line.trim())?;
        let percent: f64 = caps[1].parse().ok()?;
        let total = parse_size(&caps[2]).unwrap_or(0);
        let rate = caps.get(3).and_then(|m| parse_size(m.as_str()));
        let eta = caps.get(4).and_then(|m| parse_clock_duration(m.as_str()));

        let sample = ProgressSample::from_percent(percent)
            .with_rate(rate)
            .with_eta(eta);
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let done = (total as f64 * sample.percent / 100.0) as u64;
        Some(sample.with_bytes(done, total))
    }
}

/// `aria2c` summary line parser.
#[derive(Debug, Default)]
pub struct Aria2Parser;

impl ProgressParser for Aria2Parser {
    fn parse_line(&mut self, line: &str) -> Option<ProgressSample> {
        let caps = ARIA2_RE.captures(line)?;
        let done = parse_size(&caps[1])?;
        let total = parse_size(&caps[2])?;
        let percent: f64 = caps[3].parse().ok()?;
        let rate = ARIA2_DL_RE
            .captures(line)
            .and_then(|c| parse_size(&c[1]));
        let eta = ARIA2_ETA_RE
            .captures(line)
            .and_then(|c| parse_compact_duration(&c[1]));

        Some(
            ProgressSample::from_percent(percent)
                .with_bytes(done, total)
                .with_rate(rate)
                .with_eta(eta),
        )
    }
}

/// Parse sizes like `10.00MiB`, `110M`, `512B`. Units are binary.
pub fn parse_size(text: &str) -> Option<u64> {
    let caps = SIZE_RE.captures(text.trim())?;
    let value: f64 = caps[1].replace(',', ".").parse().ok()?;
    let multiplier: f64 = match &caps[2] {
        "" => 1.0,
        "K" => 1024.0,
        "M" => 1024.0 * 1024.0,
        "G" => 1024.0 * 1024.0 * 1024.0,
        "T" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some((value * multiplier) as u64)
}

/// Parse `5s`, `1m5s`, `2h3m`, `1d2h`.
pub fn parse_compact_duration(text: &str) -> Option<Duration> {
    let mut secs = 0u64;
    let mut consumed = 0usize;
    for caps in COMPACT_DURATION_RE.captures_iter(text) {
        let value: u64 = caps[1].parse().ok()?;
        let unit = match &caps[2] {
            "d" => 86_400,
            "h" => 3_600,
            "m" => 60,
            _ => 1,
        };
        secs = secs.saturating_add(value.saturating_mul(unit));
        consumed += caps[0].len();
    }
    (consumed > 0 && consumed == text.len()).then(|| Duration::from_secs(secs))
}

/// Parse `SS`, `MM:SS` or `HH:MM:SS`.
pub fn parse_clock_duration(text: &str) -> Option<Duration> {
    let mut secs = 0u64;
    let mut fields = 0;
    for part in text.split(':') {
        let value: u64 = part.parse().ok()?;
        secs = secs.checked_mul(60)?.checked_add(value)?;
        fields += 1;
    }
    (1..=3).contains(&fields).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("10.00MiB"), Some(10 * MIB));
        assert_eq!(parse_size("110M"), Some(110 * MIB));
        assert_eq!(parse_size("512B"), Some(512));
        assert_eq!(parse_size("4,5K"), Some(4608));
        assert_eq!(parse_size("Unknown"), None);
    }

    #[test]
    fn test_parse_durations() {
        assert_eq!(parse_compact_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_compact_duration("1m5s"), Some(Duration::from_secs(65)));
        assert_eq!(parse_compact_duration("1d2h"), Some(Duration::from_secs(93_600)));
        assert_eq!(parse_compact_duration("soon"), None);
        assert_eq!(parse_clock_duration("00:05"), Some(Duration::from_secs(5)));
        assert_eq!(parse_clock_duration("01:02:03"), Some(Duration::from_secs(3723)));
        assert_eq!(parse_clock_duration("Unknown"), None);
    }

    #[test]
    fn test_wget_with_length() {
        let mut parser = WgetParser::default();
        assert!(parser
            .parse_line("Length: 256000000 (244M) [video/mp4]")
            .is_none());

        let sample = parser
            .parse_line("  1048576K ........ ........ ........ ........ 45%  110M 5s")
            .unwrap();
        assert!((sample.percent - 45.0).abs() < f64::EPSILON);
        assert_eq!(sample.bytes_total, 256_000_000);
        assert_eq!(sample.bytes_done, 115_200_000);
        assert_eq!(sample.transfer_rate, Some(110 * MIB));
        assert_eq!(sample.eta, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_wget_final_line() {
        let mut parser = WgetParser::default();
        let sample = parser
            .parse_line("  2048K ........ ........     100%  112M=2.3s")
            .unwrap();
        assert!((sample.percent - 100.0).abs() < f64::EPSILON);
        assert_eq!(sample.eta, None);
        assert_eq!(sample.bytes_done, 2048 * 1024);
    }

    #[test]
    fn test_ytdlp_line() {
        let mut parser = YtDlpParser;
        let sample = parser
            .parse_line("[download]  45.0% of ~10.00MiB at  1.00MiB/s ETA 00:05")
            .unwrap();
        assert!((sample.percent - 45.0).abs() < f64::EPSILON);
        assert_eq!(sample.bytes_total, 10 * MIB);
        assert_eq!(sample.transfer_rate, Some(MIB));
        assert_eq!(sample.eta, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_ytdlp_unknown_rate_and_done_line() {
        let mut parser = YtDlpParser;
        let sample = parser
            .parse_line("[download]   3.2% of 100.00MiB at Unknown B/s ETA Unknown")
            .unwrap();
        assert_eq!(sample.transfer_rate, None);
        assert_eq!(sample.eta, None);

        let done = parser
            .parse_line("[download] 100% of 10.00MiB in 00:00:05 at 2.00MiB/s")
            .unwrap();
        assert!((done.percent - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_aria2_line() {
        let mut parser = Aria2Parser;
        let sample = parser
            .parse_line("[#2089b0 400MiB/1.2GiB(33%) CN:16 DL:12MiB ETA:1m5s]")
            .unwrap();
        assert_eq!(sample.bytes_done, 400 * MIB);
        assert!((sample.percent - 33.0).abs() < f64::EPSILON);
        assert_eq!(sample.transfer_rate, Some(12 * MIB));
        assert_eq!(sample.eta, Some(Duration::from_secs(65)));
    }

    #[test]
    fn test_unrelated_lines_are_ignored() {
        for family in [ToolFamily::Direct, ToolFamily::Extractor, ToolFamily::MultiConnection] {
            let mut parser = parser_for(family);
            assert!(parser.parse_line("").is_none());
            assert!(parser.parse_line("Resolving example.com... 93.184.216.34").is_none());
            assert!(parser.parse_line("[youtube] abc: Downloading webpage").is_none());
        }
    }
}
