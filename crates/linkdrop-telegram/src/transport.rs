//! [`ChatTransport`] over the Bot API.

use async_trait::async_trait;

use linkdrop_core::{ChatError, ChatId, ChatTransport, MessageRef, OutgoingFile, TaskId, UploadProgress};

use crate::client::BotClient;
use crate::types::cancel_keyboard;

/// Chat transport backed by a [`BotClient`].
#[derive(Debug, Clone)]
pub struct TelegramTransport {
    client: BotClient,
}

impl TelegramTransport {
    pub const fn new(client: BotClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        cancel_for: Option<TaskId>,
    ) -> Result<MessageRef, ChatError> {
        let message = self
            .client
            .send_message(chat.0, text, cancel_for.map(cancel_keyboard))
            .await?;
        Ok(MessageRef::new(ChatId(message.chat.id), message.message_id))
    }

    async fn edit_message(
        &self,
        target: MessageRef,
        text: &str,
        cancel_for: Option<TaskId>,
    ) -> Result<(), ChatError> {
        self.client
            .edit_message_text(
                target.chat.0,
                target.message_id,
                text,
                cancel_for.map(cancel_keyboard),
            )
            .await?;
        Ok(())
    }

    async fn send_file(
        &self,
        chat: ChatId,
        file: &OutgoingFile,
        progress: UploadProgress,
    ) -> Result<(), ChatError> {
        self.client.send_file(chat.0, file, progress).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), ChatError> {
        self.client.answer_callback_query(callback_id, text).await?;
        Ok(())
    }
}
