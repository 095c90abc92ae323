//! `/update` (owner only).
//!
//! Upgrades the downloader tools, reports their versions and then stops the
//! poller so the service manager restarts the bot with the new tools.

use super::{BotContext, IncomingMessage};

pub async fn handle_update(ctx: &BotContext, msg: &IncomingMessage) {
    if !ctx.supervisor.settings().is_owner(msg.from.0) {
        ctx.reply(msg.chat, "Only the bot owner can run /update.")
            .await;
        return;
    }

    let Ok(_guard) = ctx.update_lock.try_lock() else {
        ctx.reply(msg.chat, "An update is already running.").await;
        return;
    };

    let status = match ctx
        .chat
        .send_message(msg.chat, "🔄 Updating tools…", None)
        .await
    {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to post update status");
            None
        }
    };

    let (text, restart) = match ctx.updater.run().await {
        Ok(report) => {
            tracing::info!(success = report.success, "Tool update finished");
            let mut text = report.render();
            if report.success {
                text.push_str("\n\nRestarting…");
            }
            (text, report.success)
        }
        Err(e) => {
            tracing::error!(error = %e, "Tool update failed");
            (format!("⚠️ Update failed: {e}"), false)
        }
    };

    match status {
        Some(target) => {
            if let Err(e) = ctx.chat.edit_message(target, &text, None).await {
                tracing::warn!(error = %e, "Failed to report update result");
            }
        }
        None => ctx.reply(msg.chat, &text).await,
    }

    if restart {
        tracing::info!("Requesting shutdown after tool update");
        ctx.shutdown.cancel();
    }
}
