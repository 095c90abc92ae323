//! Composition root.
//!
//! The only place where the Bot API client, the chat transport, the external
//! tool adapters and the supervisor are built and wired together.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use linkdrop_download::{
    SupervisorDeps, TaskSupervisor, ToolUpdater, build_media_inspector, build_splitter, locate_tools,
};
use linkdrop_telegram::{BotClient, TelegramTransport};

use crate::config::BotConfig;
use crate::handlers::BotContext;

/// Everything `main` needs to run the bot.
pub struct BotRuntime {
    pub client: BotClient,
    pub context: Arc<BotContext>,
    pub supervisor: Arc<TaskSupervisor>,
    pub shutdown: CancellationToken,
}

pub async fn bootstrap(config: &BotConfig) -> Result<BotRuntime> {
    let settings = config.to_settings().context("Invalid configuration")?;

    tokio::fs::create_dir_all(&settings.download_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create download directory {}",
                settings.download_dir.display()
            )
        })?;

    // Missing tools are reported but not fatal; tasks fail with a clear error
    let missing: Vec<_> = locate_tools(&settings)
        .into_iter()
        .filter(|status| !status.is_available())
        .map(|status| status.name)
        .collect();
    if !missing.is_empty() {
        tracing::warn!(?missing, "Some download tools are unavailable");
    }

    let client = BotClient::new(&config.bot_token, &config.api_url)
        .context("Failed to build the Bot API client")?;
    let me = client
        .get_me()
        .await
        .context("getMe failed, check BOT_TOKEN and API_URL")?;
    let bot_username = me.username.unwrap_or_default();
    tracing::info!(bot = %bot_username, id = me.id, "Authorized");

    if settings.owner_id.is_none() {
        tracing::warn!("OWNER_ID is not set; /update is disabled");
    }

    let chat = Arc::new(TelegramTransport::new(client.clone()));
    let supervisor = TaskSupervisor::new(SupervisorDeps {
        chat: chat.clone(),
        splitter: build_splitter(&settings),
        media: build_media_inspector(&settings),
        settings: Arc::new(settings.clone()),
    });

    let shutdown = CancellationToken::new();
    let context = Arc::new(BotContext::new(
        chat,
        supervisor.clone(),
        ToolUpdater::new(&settings),
        bot_username,
        shutdown.clone(),
    ));

    Ok(BotRuntime {
        client,
        context,
        supervisor,
        shutdown,
    })
}
