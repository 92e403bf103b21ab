//! Outbound messaging seam between the dialog engine and the chat
//! transport.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{catalog, UserId};

/// Longest message body the transport will accept; longer renders are
/// replaced with a placeholder by the caller.
pub const MESSAGE_LIMIT: usize = 4000;

/// Points at a previously sent message so it can be edited in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageRef {
    pub chat: UserId,
    pub message_id: i64,
}

/// Opaque id of a pending button callback, used to acknowledge it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackRef(pub String);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub payload: String,
}

impl Button {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self { label: label.into(), payload: payload.into() }
    }
}

/// Inline keyboard attached to an outbound message, row-major.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }

    pub fn push_row(&mut self, buttons: Vec<Button>) {
        self.rows.push(buttons);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }
}

/// Builds a keyboard from catalog items: one button per item, payload
/// `prefix` + item slug, laid out `per_row` buttons wide.
pub fn choice_keyboard(items: &[&str], prefix: &str, per_row: usize) -> Keyboard {
    let per_row = per_row.max(1);
    let mut keyboard = Keyboard::new();
    let mut row = Vec::with_capacity(per_row);
    for item in items {
        row.push(Button::new(*item, format!("{prefix}{}", catalog::slug(item))));
        if row.len() == per_row {
            keyboard.push_row(std::mem::take(&mut row));
        }
    }
    if !row.is_empty() {
        keyboard.push_row(row);
    }
    keyboard
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport edit failed: {0}")]
    Edit(String),
    #[error("transport callback answer failed: {0}")]
    Answer(String),
    #[error("transport receive failed: {0}")]
    Receive(String),
}

/// How a handler wants the callback acknowledged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackAnswer {
    /// Silent acknowledgement, clears the client spinner.
    Plain,
    /// Small transient notice at the top of the chat.
    Notice(String),
    /// Modal alert the user must dismiss.
    Alert(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        user: &UserId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), TransportError>;

    async fn edit(
        &self,
        message: &MessageRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), TransportError>;

    async fn answer(
        &self,
        callback: &CallbackRef,
        answer: CallbackAnswer,
    ) -> Result<(), TransportError>;
}

/// Transport that drops everything. Used where a runner needs a transport
/// before the real one is wired in.
#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl Transport for NoopTransport {
    async fn send(
        &self,
        _user: &UserId,
        _text: &str,
        _keyboard: Option<Keyboard>,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn edit(
        &self,
        _message: &MessageRef,
        _text: &str,
        _keyboard: Option<Keyboard>,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn answer(
        &self,
        _callback: &CallbackRef,
        _answer: CallbackAnswer,
    ) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::choice_keyboard;

    #[test]
    fn choice_keyboard_lays_out_rows_and_slugs_payloads() {
        let keyboard = choice_keyboard(&["Carrot", "Beet root", "Corn"], "pick_", 2);
        assert_eq!(keyboard.rows.len(), 2);
        assert_eq!(keyboard.rows[0].len(), 2);
        assert_eq!(keyboard.rows[1].len(), 1);
        assert_eq!(keyboard.rows[0][1].payload, "pick_beet_root");
        assert_eq!(keyboard.rows[0][1].label, "Beet root");
    }

    #[test]
    fn per_row_of_zero_is_clamped() {
        let keyboard = choice_keyboard(&["Carrot"], "pick_", 0);
        assert_eq!(keyboard.rows.len(), 1);
    }
}
