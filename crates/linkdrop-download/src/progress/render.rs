//! Status message text.
//!
//! Every phase of a task renders to a plain-text block. The reporter compares
//! these strings to skip edits that would not change anything.

use std::fmt::Write;
use std::time::Duration;

use indicatif::{HumanBytes, HumanDuration};
use linkdrop_core::{ProgressSample, TaskError, TaskId, TaskState};

const BAR_CELLS: usize = 10;

/// Fixed-width block bar for a 0..=100 percentage.
pub fn progress_bar(percent: f64) -> String {
    let clamped = if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let filled = ((clamped / 100.0) * BAR_CELLS as f64).round() as usize;
    let filled = filled.min(BAR_CELLS);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(BAR_CELLS - filled))
}

/// Shown while the task waits for a free slot.
pub fn render_queued(id: TaskId, label: &str, position: u32) -> String {
    format!("🕒 Queued {id}: {label}\nPosition in queue: {position}")
}

/// Shown right after promotion, before the tool prints anything.
pub fn render_starting(id: TaskId, label: &str, tool: &str) -> String {
    format!("⏬ Starting {id}: {label}\nTool: {tool}")
}

/// Download progress from a parsed sample.
pub fn render_download(id: TaskId, label: &str, sample: &ProgressSample, elapsed: Duration) -> String {
    let mut out = format!(
        "⏬ Downloading {id}: {label}\n{} {:.1}%",
        progress_bar(sample.percent),
        sample.percent
    );

    if sample.total_known() {
        let _ = write!(
            out,
            "\n{} of {}",
            HumanBytes(sample.bytes_done),
            HumanBytes(sample.bytes_total)
        );
    } else if sample.bytes_done > 0 {
        let _ = write!(out, "\n{}", HumanBytes(sample.bytes_done));
    }
    if let Some(rate) = sample.transfer_rate {
        let _ = write!(out, " at {}/s", HumanBytes(rate));
    }

    out.push('\n');
    if let Some(eta) = sample.eta {
        let _ = write!(out, "ETA {} · ", HumanDuration(eta));
    }
    let _ = write!(out, "elapsed {}", HumanDuration(elapsed));
    out
}

/// Shown while an oversized artifact is being split.
pub fn render_splitting(id: TaskId, label: &str, size: u64, splitter: &str) -> String {
    format!(
        "✂️ Splitting {id}: {label}\n{} with {splitter}",
        HumanBytes(size)
    )
}

/// Upload progress. `part` is `(k, n)` for split uploads.
pub fn render_upload(
    id: TaskId,
    label: &str,
    part: Option<(u32, u32)>,
    sent: u64,
    total: u64,
) -> String {
    let mut out = match part {
        Some((k, n)) => format!("⏫ Uploading {id}: {label}\nPart {k}/{n}"),
        None => format!("⏫ Uploading {id}: {label}"),
    };
    if total > 0 {
        #[allow(clippy::cast_precision_loss)]
        let percent = (sent as f64 / total as f64) * 100.0;
        let _ = write!(
            out,
            "\n{} {percent:.1}%\n{} of {}",
            progress_bar(percent),
            HumanBytes(sent),
            HumanBytes(total)
        );
    }
    out
}

/// The one final edit of a task.
pub fn render_final(
    id: TaskId,
    label: &str,
    state: TaskState,
    error: Option<&TaskError>,
    elapsed: Duration,
) -> String {
    match state {
        TaskState::Completed => format!(
            "✅ Completed {id}: {label}\nTook {}",
            HumanDuration(elapsed)
        ),
        TaskState::Cancelled => format!("🚫 Cancelled {id}: {label}"),
        _ => {
            let reason = error.map_or_else(|| "Unknown error".to_string(), TaskError::user_message);
            format!("❌ Failed {id}: {label}\n{reason}")
        }
    }
}
