//! `/cancel <id>`.

use linkdrop_core::TaskId;
use linkdrop_download::CancelOutcome;

use super::{BotContext, IncomingMessage};

pub async fn handle_cancel(ctx: &BotContext, msg: &IncomingMessage, id: Option<TaskId>) {
    let Some(id) = id else {
        ctx.reply(msg.chat, "Usage: /cancel <task id>, e.g. /cancel 3")
            .await;
        return;
    };

    let outcome = ctx.supervisor.cancel(id, msg.from).await;
    ctx.reply(msg.chat, &cancel_reply(id, &outcome)).await;
}

/// Short text describing a cancel outcome.
pub fn cancel_reply(id: TaskId, outcome: &CancelOutcome) -> String {
    match outcome {
        CancelOutcome::Cancelled {
            was_running: true, ..
        } => format!("Stopping task {id}…"),
        CancelOutcome::Cancelled { .. } => format!("Task {id} removed from the queue."),
        CancelOutcome::NotFound => format!("No active task {id}."),
        CancelOutcome::NotPermitted => "You can only cancel your own tasks.".to_string(),
        CancelOutcome::AlreadyStopping => format!("Task {id} is already stopping."),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::super::testing::{context, message};
    use super::super::handle_message;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_flow() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, chat) = context(dir.path(), 1);

        handle_message(&ctx, message(5, "https://example.com/a.mp4")).await;
        handle_message(&ctx, message(6, "https://example.com/b.mp4")).await;

        handle_message(&ctx, message(7, "/cancel 2")).await;
        handle_message(&ctx, message(6, "/cancel 2")).await;
        handle_message(&ctx, message(6, "/cancel 2")).await;
        handle_message(&ctx, message(1, "/cancel 1")).await;
        handle_message(&ctx, message(5, "/cancel")).await;

        let sent = chat.sent_texts();
        let replies = &sent[2..];
        assert_eq!(replies[0], "You can only cancel your own tasks.");
        assert_eq!(replies[1], "Task #2 removed from the queue.");
        assert_eq!(replies[2], "No active task #2.");
        assert_eq!(replies[3], "Stopping task #1…");
        assert!(replies[4].starts_with("Usage"));

        assert!(ctx.supervisor.shutdown(Duration::from_secs(10)).await);
    }
}
