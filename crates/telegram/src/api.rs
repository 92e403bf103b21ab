//! Bot API client over HTTPS. Covers the four methods the bot uses:
//! `getUpdates` long polls, `sendMessage`, `editMessageText` and
//! `answerCallbackQuery`.
//!
//! Messages go out with MarkdownV2 enabled. Dialog texts mix escaped
//! markdown with plain prompts, so a parse rejection is retried once
//! without a parse mode rather than dropped.

use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use pricelog_core::config::TelegramConfig;
use pricelog_core::outbound::{Keyboard, TransportError};

pub struct BotApi {
    http: Client,
    method_base: String,
}

impl BotApi {
    pub fn new(config: &TelegramConfig) -> Self {
        let method_base = format!(
            "{}/bot{}",
            config.api_base.trim_end_matches('/'),
            config.bot_token.expose_secret()
        );
        Self { http: Client::new(), method_base }
    }

    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TransportError> {
        let payload = GetUpdatesPayload {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message", "callback_query"],
        };
        self.call("getUpdates", &payload)
            .await
            .map_err(|failure| TransportError::Receive(failure.to_string()))
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<Message, TransportError> {
        let mut payload = SendMessagePayload {
            chat_id,
            text,
            parse_mode: Some("MarkdownV2"),
            reply_markup: keyboard.map(reply_markup),
        };
        match self.call("sendMessage", &payload).await {
            Ok(message) => Ok(message),
            Err(failure) if failure.is_parse_rejection() => {
                debug!(chat_id, "markdown rejected, resending as plain text");
                payload.parse_mode = None;
                self.call("sendMessage", &payload)
                    .await
                    .map_err(|failure| TransportError::Send(failure.to_string()))
            }
            Err(failure) => Err(TransportError::Send(failure.to_string())),
        }
    }

    pub async fn edit_message_text(
        &self,
        chat_id: &str,
        message_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        let mut payload = EditMessagePayload {
            chat_id,
            message_id,
            text,
            parse_mode: Some("MarkdownV2"),
            reply_markup: keyboard.map(reply_markup),
        };
        let result: Result<Message, ApiFailure> = match self.call("editMessageText", &payload).await
        {
            Err(failure) if failure.is_parse_rejection() => {
                debug!(chat_id, message_id, "markdown rejected, editing as plain text");
                payload.parse_mode = None;
                self.call("editMessageText", &payload).await
            }
            other => other,
        };
        match result {
            Ok(_) => Ok(()),
            // Re-rendering identical content is not an error worth failing
            // the dialog over.
            Err(failure) if failure.is_not_modified() => {
                debug!(chat_id, message_id, "edit left the message unchanged");
                Ok(())
            }
            Err(failure) => Err(TransportError::Edit(failure.to_string())),
        }
    }

    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), TransportError> {
        let payload = AnswerCallbackPayload { callback_query_id, text, show_alert };
        self.call::<_, bool>("answerCallbackQuery", &payload)
            .await
            .map(|_| ())
            .map_err(|failure| TransportError::Answer(failure.to_string()))
    }

    async fn call<P, T>(&self, method: &str, payload: &P) -> Result<T, ApiFailure>
    where
        P: Serialize,
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.method_base, method);
        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|error| ApiFailure::Http(error.to_string()))?;

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|error| ApiFailure::Http(error.to_string()))?;

        if body.ok {
            body.result.ok_or_else(|| ApiFailure::Http("missing result field".to_owned()))
        } else {
            let description =
                body.description.unwrap_or_else(|| "no description given".to_owned());
            warn!(method, description = %description, "bot api call rejected");
            Err(ApiFailure::Api { error_code: body.error_code, description })
        }
    }
}

enum ApiFailure {
    Http(String),
    Api { error_code: Option<i64>, description: String },
}

impl ApiFailure {
    fn is_parse_rejection(&self) -> bool {
        match self {
            Self::Api { error_code: Some(400), description } => {
                description.contains("can't parse entities")
            }
            _ => false,
        }
    }

    fn is_not_modified(&self) -> bool {
        matches!(
            self,
            Self::Api { description, .. } if description.contains("message is not modified")
        )
    }
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(detail) => write!(f, "http request failed: {detail}"),
            Self::Api { error_code: Some(code), description } => {
                write!(f, "bot api error {code}: {description}")
            }
            Self::Api { error_code: None, description } => {
                write!(f, "bot api error: {description}")
            }
        }
    }
}

fn reply_markup(keyboard: &Keyboard) -> ReplyMarkup {
    ReplyMarkup {
        inline_keyboard: keyboard
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|button| InlineKeyboardButton {
                        text: button.label.clone(),
                        callback_data: button.payload.clone(),
                    })
                    .collect()
            })
            .collect(),
    }
}

#[derive(Debug, Serialize)]
struct GetUpdatesPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup>,
}

#[derive(Debug, Serialize)]
struct EditMessagePayload<'a> {
    chat_id: &'a str,
    message_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup>,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackPayload<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    show_alert: bool,
}

#[derive(Debug, Serialize)]
struct ReplyMarkup {
    inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardButton {
    text: String,
    callback_data: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}
