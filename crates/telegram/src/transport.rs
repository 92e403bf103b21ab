//! `Transport` implementation backed by the Bot API client.

use std::sync::Arc;

use async_trait::async_trait;

use pricelog_core::domain::UserId;
use pricelog_core::outbound::{
    CallbackAnswer, CallbackRef, Keyboard, MessageRef, Transport, TransportError,
};

use crate::api::BotApi;

pub struct TelegramTransport {
    api: Arc<BotApi>,
}

impl TelegramTransport {
    pub fn new(api: Arc<BotApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(
        &self,
        user: &UserId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), TransportError> {
        self.api.send_message(&user.0, text, keyboard.as_ref()).await?;
        Ok(())
    }

    async fn edit(
        &self,
        message: &MessageRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), TransportError> {
        self.api
            .edit_message_text(&message.chat.0, message.message_id, text, keyboard.as_ref())
            .await
    }

    async fn answer(
        &self,
        callback: &CallbackRef,
        answer: CallbackAnswer,
    ) -> Result<(), TransportError> {
        let (text, show_alert) = match &answer {
            CallbackAnswer::Plain => (None, false),
            CallbackAnswer::Notice(text) => (Some(text.as_str()), false),
            CallbackAnswer::Alert(text) => (Some(text.as_str()), true),
        };
        self.api.answer_callback_query(&callback.0, text, show_alert).await
    }
}
