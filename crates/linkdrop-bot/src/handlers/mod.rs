//! Update handlers.
//!
//! Handlers receive platform-neutral [`IncomingMessage`] and
//! [`IncomingCallback`] values; the poller converts Telegram updates into
//! them. Chat failures are logged and never propagate: one bad update must not
//! stop the poller.

mod callback;
mod cancel;
mod link;
mod queue;
mod update;

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use linkdrop_core::{ChatId, ChatTransport, OwnerId};
use linkdrop_download::{TaskSupervisor, ToolUpdater};

use crate::commands::{HELP_TEXT, Inbound, parse_inbound};

pub use callback::handle_callback;
pub use cancel::{cancel_reply, handle_cancel};
pub use link::handle_link;
pub use queue::{handle_queue, render_queue};
pub use update::handle_update;

/// Shared state for all handlers.
pub struct BotContext {
    pub chat: Arc<dyn ChatTransport>,
    pub supervisor: Arc<TaskSupervisor>,
    pub updater: ToolUpdater,
    /// Username without `@`, for `/cmd@bot` addressing.
    pub bot_username: String,
    /// Cancelled to stop the poller (after a successful `/update`).
    pub shutdown: CancellationToken,
    /// Serializes `/update` runs.
    update_lock: Mutex<()>,
}

impl BotContext {
    pub fn new(
        chat: Arc<dyn ChatTransport>,
        supervisor: Arc<TaskSupervisor>,
        updater: ToolUpdater,
        bot_username: impl Into<String>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            chat,
            supervisor,
            updater,
            bot_username: bot_username.into(),
            shutdown,
            update_lock: Mutex::new(()),
        }
    }

    /// Send a plain message, logging failures.
    pub async fn reply(&self, chat: ChatId, text: &str) {
        if let Err(e) = self.chat.send_message(chat, text, None).await {
            tracing::warn!(chat = %chat, error = %e, "Failed to send reply");
        }
    }
}

/// A text message from a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat: ChatId,
    pub from: OwnerId,
    pub text: String,
}

/// An inline button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingCallback {
    pub id: String,
    pub from: OwnerId,
    pub data: String,
}

/// Route a text message to its handler.
pub async fn handle_message(ctx: &BotContext, msg: IncomingMessage) {
    match parse_inbound(&msg.text, &ctx.bot_username) {
        Inbound::Help => ctx.reply(msg.chat, HELP_TEXT).await,
        Inbound::Link(source) => handle_link(ctx, &msg, source).await,
        Inbound::Cancel(id) => handle_cancel(ctx, &msg, id).await,
        Inbound::Queue => handle_queue(ctx, &msg).await,
        Inbound::Update => handle_update(ctx, &msg).await,
        Inbound::UnknownCommand(name) => {
            ctx.reply(msg.chat, &format!("Unknown command /{name}. Try /help."))
                .await;
        }
        Inbound::Ignored => {
            tracing::debug!(chat = %msg.chat, "Ignoring command for another bot");
        }
        Inbound::Other => {
            ctx.reply(msg.chat, "Send an http:// or https:// link, or /help.")
                .await;
        }
    }
}
