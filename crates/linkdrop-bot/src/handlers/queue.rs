//! `/queue`.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use linkdrop_core::{QueueSnapshot, TaskState};

use super::{BotContext, IncomingMessage};

pub async fn handle_queue(ctx: &BotContext, msg: &IncomingMessage) {
    let snapshot = ctx.supervisor.snapshot().await;
    ctx.reply(msg.chat, &render_queue(&snapshot)).await;
}

/// Running tasks first, then the waiting line in FIFO order.
pub fn render_queue(snapshot: &QueueSnapshot) -> String {
    if snapshot.is_empty() {
        return format!(
            "No active tasks. Up to {} run at a time.",
            snapshot.max_running
        );
    }

    let mut out = format!(
        "Running {}/{}, waiting {}",
        snapshot.running_count, snapshot.max_running, snapshot.queued_count
    );
    for item in &snapshot.items {
        let _ = match item.state {
            TaskState::Queued => write!(
                out,
                "\n🕒 {} {} (position {}, since {})",
                item.id,
                item.label,
                item.position,
                clock(&item.submitted_at)
            ),
            _ => write!(
                out,
                "\n⏬ {} {} (running {}s)",
                item.id, item.label, item.elapsed_secs
            ),
        };
    }
    out
}

fn clock(at: &DateTime<Utc>) -> String {
    at.format("%H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use linkdrop_core::{OwnerId, QueuedTask, TaskId};

    fn item(id: u64, state: TaskState, position: u32) -> QueuedTask {
        QueuedTask {
            id: TaskId::new(id),
            owner: OwnerId(1),
            label: format!("file{id}.mp4"),
            state,
            position,
            submitted_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            elapsed_secs: 12,
        }
    }

    #[test]
    fn test_empty_queue() {
        assert_eq!(
            render_queue(&QueueSnapshot::new(5)),
            "No active tasks. Up to 5 run at a time."
        );
    }

    #[test]
    fn test_running_and_queued() {
        let snapshot = QueueSnapshot {
            items: vec![item(1, TaskState::Running, 0), item(2, TaskState::Queued, 1)],
            max_running: 1,
            running_count: 1,
            queued_count: 1,
        };
        let text = render_queue(&snapshot);
        assert!(text.starts_with("Running 1/1, waiting 1"));
        assert!(text.contains("⏬ #1 file1.mp4 (running 12s)"));
        assert!(text.contains("🕒 #2 file2.mp4 (position 1, since 03:04:05 UTC)"));
    }
}
