//! Inline "Cancel" button presses.

use linkdrop_download::CancelOutcome;
use linkdrop_telegram::parse_cancel_data;

use super::{BotContext, IncomingCallback};

pub async fn handle_callback(ctx: &BotContext, query: IncomingCallback) {
    let answer = match parse_cancel_data(&query.data) {
        Some(id) => match ctx.supervisor.cancel(id, query.from).await {
            CancelOutcome::Cancelled { .. } => "Cancelling…",
            CancelOutcome::NotFound => "This task has already finished.",
            CancelOutcome::NotPermitted => "Only the requester can cancel this task.",
            CancelOutcome::AlreadyStopping => "Already stopping.",
        },
        None => {
            tracing::debug!(data = %query.data, "Ignoring unknown callback data");
            ""
        }
    };

    // Always answer so the client stops its loading indicator
    if let Err(e) = ctx.chat.answer_callback(&query.id, answer).await {
        tracing::warn!(error = %e, "Failed to answer callback query");
    }
}
