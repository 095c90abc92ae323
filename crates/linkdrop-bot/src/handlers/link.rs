//! Link submission.

use linkdrop_core::{TaskRequest, TaskSource};

use super::{BotContext, IncomingMessage};

/// Post a status message for the link, then ask the supervisor to admit it.
///
/// On rejection the status message is edited to say why. From admission on,
/// every edit of the status message comes from the supervisor.
pub async fn handle_link(ctx: &BotContext, msg: &IncomingMessage, source: TaskSource) {
    let text = format!("🔗 Received: {}", source.label());
    let status_message = match ctx.chat.send_message(msg.chat, &text, None).await {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(chat = %msg.chat, error = %e, "Failed to post status message");
            return;
        }
    };

    let request = TaskRequest {
        source,
        chat: msg.chat,
        status_message,
    };

    match ctx.supervisor.submit(msg.from, request).await {
        Ok(admission) => {
            tracing::debug!(
                task = %admission.task.id,
                owner = %msg.from,
                promoted = admission.promoted(),
                "Link admitted"
            );
        }
        Err(e) => {
            tracing::info!(owner = %msg.from, error = %e, "Link rejected");
            if let Err(e) = ctx
                .chat
                .edit_message(status_message, &format!("⛔ {}", e.user_message()), None)
                .await
            {
                tracing::warn!(error = %e, "Failed to report rejection");
            }
        }
    }
}
