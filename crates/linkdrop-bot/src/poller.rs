//! Long-polling loop.
//!
//! Fetches updates with `getUpdates`, turns each into an [`Incoming`] value
//! and runs its handler on a tracked task so a slow handler never blocks
//! polling.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use linkdrop_core::{ChatId, OwnerId};
use linkdrop_telegram::{BotClient, TelegramError, Update};

use crate::handlers::{BotContext, IncomingCallback, IncomingMessage, handle_callback, handle_message};

/// Pause after a failed poll that did not ask for a specific delay.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// How long in-flight handlers may run once polling stops.
const HANDLER_DRAIN: Duration = Duration::from_secs(10);

/// A routed update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Message(IncomingMessage),
    Callback(IncomingCallback),
}

/// Convert a raw update into something a handler understands.
///
/// Messages without text or sender, and messages from other bots, are
/// dropped. A button press without data is still routed so it gets answered.
pub fn route_update(update: Update) -> Option<Incoming> {
    if let Some(query) = update.callback_query {
        return Some(Incoming::Callback(IncomingCallback {
            id: query.id,
            from: OwnerId(query.from.id),
            data: query.data.unwrap_or_default(),
        }));
    }

    let message = update.message?;
    let from = message.from?;
    if from.is_bot {
        return None;
    }
    Some(Incoming::Message(IncomingMessage {
        chat: ChatId(message.chat.id),
        from: OwnerId(from.id),
        text: message.text?,
    }))
}

async fn dispatch(ctx: &BotContext, incoming: Incoming) {
    match incoming {
        Incoming::Message(msg) => handle_message(ctx, msg).await,
        Incoming::Callback(query) => handle_callback(ctx, query).await,
    }
}

/// Sleep for `delay` unless `shutdown` fires first. Returns `false` on shutdown.
async fn pause(shutdown: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        biased;
        () = shutdown.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

/// Poll until `ctx.shutdown` is cancelled, then drain running handlers.
pub async fn run_poller(client: &BotClient, ctx: Arc<BotContext>, poll_timeout: Duration) {
    let tracker = TaskTracker::new();
    let mut offset: i64 = 0;

    tracing::info!(bot = %ctx.bot_username, "Polling for updates");
    loop {
        let batch = tokio::select! {
            biased;
            () = ctx.shutdown.cancelled() => break,
            batch = client.get_updates(offset, poll_timeout) => batch,
        };

        match batch {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let Some(incoming) = route_update(update) else {
                        continue;
                    };
                    let ctx = ctx.clone();
                    tracker.spawn(async move { dispatch(&ctx, incoming).await });
                }
            }
            Err(TelegramError::RetryAfter(delay)) => {
                tracing::warn!(?delay, "getUpdates rate limited");
                if !pause(&ctx.shutdown, delay).await {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "getUpdates failed");
                if !pause(&ctx.shutdown, ERROR_BACKOFF).await {
                    break;
                }
            }
        }
    }

    tracing::info!("Polling stopped");
    tracker.close();
    if tokio::time::timeout(HANDLER_DRAIN, tracker.wait())
        .await
        .is_err()
    {
        tracing::warn!("Handlers still running after drain timeout");
    }

    acknowledge(client, offset).await;
}

/// Confirm everything up to `offset` so a restart does not replay it
/// (an `/update` would otherwise trigger itself again).
async fn acknowledge(client: &BotClient, offset: i64) {
    if offset == 0 {
        return;
    }
    if let Err(e) = client.get_updates(offset, Duration::ZERO).await {
        tracing::warn!(error = %e, "Failed to confirm processed updates");
    }
}
