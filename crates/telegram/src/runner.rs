//! Long-polling update loop. Pulls update batches from an `UpdateSource`,
//! converts each into a dialog event, runs it through the dispatcher and
//! acknowledges pending button callbacks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use pricelog_core::dialogs::{menu, Dispatcher, InboundEvent, Outcome, StepContext};
use pricelog_core::domain::UserId;
use pricelog_core::outbound::{
    CallbackAnswer, CallbackRef, MessageRef, Transport, TransportError,
};
use pricelog_core::store::EntryStore;

use crate::api::{BotApi, Update, User};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Where update batches come from. `Ok(None)` means the stream is closed
/// and the runner should stop.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn next_updates(&self) -> Result<Option<Vec<Update>>, TransportError>;
}

/// `getUpdates` long polling with a persistent offset, so every update is
/// confirmed exactly once.
pub struct LongPollSource {
    api: Arc<BotApi>,
    timeout_secs: u64,
    offset: Mutex<Option<i64>>,
}

impl LongPollSource {
    pub fn new(api: Arc<BotApi>, timeout_secs: u64) -> Self {
        Self { api, timeout_secs, offset: Mutex::new(None) }
    }
}

#[async_trait]
impl UpdateSource for LongPollSource {
    async fn next_updates(&self) -> Result<Option<Vec<Update>>, TransportError> {
        let offset = *self.offset.lock().await;
        let updates = self.api.get_updates(offset, self.timeout_secs).await?;
        if let Some(last) = updates.iter().map(|update| update.update_id).max() {
            *self.offset.lock().await = Some(last + 1);
        }
        Ok(Some(updates))
    }
}

pub struct PollingRunner {
    source: Arc<dyn UpdateSource>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn EntryStore>,
    dispatcher: Dispatcher,
    page_size: usize,
    reconnect_policy: ReconnectPolicy,
}

impl PollingRunner {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn EntryStore>,
        dispatcher: Dispatcher,
        page_size: usize,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { source, transport, store, dispatcher, page_size, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        let mut attempt: u32 = 0;
        loop {
            match self.source.next_updates().await {
                Ok(None) => {
                    info!("update stream closed");
                    return Ok(());
                }
                Ok(Some(updates)) => {
                    attempt = 0;
                    for update in updates {
                        self.process(update).await;
                    }
                }
                Err(poll_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %poll_error,
                        "polling for updates failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "polling retries exhausted; stopping without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn process(&self, update: Update) {
        let update_id = update.update_id;
        let Some(incoming) = classify(update) else {
            debug!(update_id, "ignoring unsupported update");
            return;
        };

        let cx = StepContext {
            user: incoming.user,
            submitted_by: incoming.submitted_by,
            transport: self.transport.clone(),
            store: self.store.clone(),
            page_size: self.page_size,
            message: incoming.message,
            callback: incoming.callback,
        };

        let outcome = self.dispatcher.dispatch(&cx, &incoming.event).await;
        if outcome == Outcome::Ignored && menu::is_global_menu_trigger(&incoming.event) {
            if let Err(render_error) = menu::render_main_menu(&cx, &incoming.event).await {
                warn!(user = %cx.user, error = %render_error, "failed to render the main menu");
            }
        }

        // Every pressed button gets acknowledged so the client spinner
        // clears; a handler may have answered with a notice already, in
        // which case this second answer is rejected and dropped.
        if let Some(callback) = &cx.callback {
            if let Err(answer_error) =
                self.transport.answer(callback, CallbackAnswer::Plain).await
            {
                debug!(user = %cx.user, error = %answer_error, "callback answer not delivered");
            }
        }

        debug!(update_id, user = %cx.user, ?outcome, "update processed");
    }
}

struct Incoming {
    user: UserId,
    submitted_by: String,
    event: InboundEvent,
    message: Option<MessageRef>,
    callback: Option<CallbackRef>,
}

fn classify(update: Update) -> Option<Incoming> {
    if let Some(message) = update.message {
        let text = message.text?;
        return Some(Incoming {
            user: UserId(message.chat.id.to_string()),
            submitted_by: sender_name(message.from.as_ref()),
            event: InboundEvent::text(text),
            message: None,
            callback: None,
        });
    }

    if let Some(callback) = update.callback_query {
        let data = callback.data?;
        let message = callback.message.as_ref().map(|attached| MessageRef {
            chat: UserId(attached.chat.id.to_string()),
            message_id: attached.message_id,
        });
        let user = message
            .as_ref()
            .map(|attached| attached.chat.clone())
            .unwrap_or_else(|| UserId(callback.from.id.to_string()));
        return Some(Incoming {
            user,
            submitted_by: sender_name(Some(&callback.from)),
            event: InboundEvent::button(data),
            message,
            callback: Some(CallbackRef(callback.id)),
        });
    }

    None
}

fn sender_name(user: Option<&User>) -> String {
    match user {
        Some(user) => user.username.clone().unwrap_or_else(|| user.id.to_string()),
        None => "unknown".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use pricelog_core::dialogs::standard_dispatcher;
    use pricelog_core::domain::UserId;
    use pricelog_core::outbound::{
        CallbackAnswer, CallbackRef, Keyboard, MessageRef, Transport, TransportError,
    };
    use pricelog_store::InMemoryEntryStore;

    use super::{
        classify, sender_name, PollingRunner, ReconnectPolicy, Update, UpdateSource, User,
    };
    use crate::api::{CallbackQuery, Chat, Message};

    #[derive(Default)]
    struct RecordingTransport {
        texts: Mutex<Vec<String>>,
        answers: Mutex<Vec<CallbackAnswer>>,
    }

    impl RecordingTransport {
        async fn texts(&self) -> Vec<String> {
            self.texts.lock().await.clone()
        }

        async fn answers(&self) -> Vec<CallbackAnswer> {
            self.answers.lock().await.clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(
            &self,
            _user: &UserId,
            text: &str,
            _keyboard: Option<Keyboard>,
        ) -> Result<(), TransportError> {
            self.texts.lock().await.push(text.to_owned());
            Ok(())
        }

        async fn edit(
            &self,
            _message: &MessageRef,
            text: &str,
            _keyboard: Option<Keyboard>,
        ) -> Result<(), TransportError> {
            self.texts.lock().await.push(text.to_owned());
            Ok(())
        }

        async fn answer(
            &self,
            _callback: &CallbackRef,
            answer: CallbackAnswer,
        ) -> Result<(), TransportError> {
            self.answers.lock().await.push(answer);
            Ok(())
        }
    }

    struct ScriptedSource {
        batches: Mutex<VecDeque<Result<Option<Vec<Update>>, TransportError>>>,
        polls: Mutex<usize>,
    }

    impl ScriptedSource {
        fn new(batches: Vec<Result<Option<Vec<Update>>, TransportError>>) -> Self {
            Self { batches: Mutex::new(batches.into()), polls: Mutex::new(0) }
        }

        async fn polls(&self) -> usize {
            *self.polls.lock().await
        }
    }

    #[async_trait]
    impl UpdateSource for ScriptedSource {
        async fn next_updates(&self) -> Result<Option<Vec<Update>>, TransportError> {
            *self.polls.lock().await += 1;
            self.batches.lock().await.pop_front().unwrap_or(Ok(None))
        }
    }

    fn text_update(update_id: i64, text: &str) -> Update {
        Update {
            update_id,
            message: Some(Message {
                message_id: update_id,
                chat: Chat { id: 100 },
                from: Some(User { id: 100, username: Some("alice".to_owned()) }),
                text: Some(text.to_owned()),
            }),
            callback_query: None,
        }
    }

    fn button_update(update_id: i64, data: &str) -> Update {
        Update {
            update_id,
            message: None,
            callback_query: Some(CallbackQuery {
                id: format!("cb-{update_id}"),
                from: User { id: 100, username: Some("alice".to_owned()) },
                message: Some(Message {
                    message_id: 7,
                    chat: Chat { id: 100 },
                    from: None,
                    text: None,
                }),
                data: Some(data.to_owned()),
            }),
        }
    }

    fn runner(
        source: Arc<ScriptedSource>,
        transport: Arc<RecordingTransport>,
    ) -> PollingRunner {
        PollingRunner::new(
            source,
            transport,
            Arc::new(InMemoryEntryStore::new()),
            standard_dispatcher(),
            5,
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        )
    }

    #[tokio::test]
    async fn start_command_outside_a_dialog_opens_the_main_menu() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(Some(vec![text_update(1, "/start")])),
            Ok(None),
        ]));
        let transport = Arc::new(RecordingTransport::default());

        runner(source, transport.clone()).start().await.expect("runner");

        assert_eq!(transport.texts().await, vec!["Welcome! Select an option:"]);
    }

    #[tokio::test]
    async fn button_presses_are_dispatched_and_acknowledged() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(Some(vec![text_update(1, "/insights"), button_update(2, "menu_nav_menu")])),
            Ok(None),
        ]));
        let transport = Arc::new(RecordingTransport::default());

        runner(source, transport.clone()).start().await.expect("runner");

        let texts = transport.texts().await;
        assert_eq!(texts.last().map(String::as_str), Some("Welcome! Select an option:"));
        assert_eq!(transport.answers().await, vec![CallbackAnswer::Plain]);
    }

    #[tokio::test]
    async fn polling_retries_then_stops_when_the_stream_closes() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(TransportError::Receive("network down".to_owned())),
            Ok(None),
        ]));
        let transport = Arc::new(RecordingTransport::default());

        runner(source.clone(), transport).start().await.expect("runner");

        assert_eq!(source.polls().await, 2);
    }

    #[tokio::test]
    async fn polling_retries_are_exhausted_without_crashing() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(TransportError::Receive("fail-1".to_owned())),
            Err(TransportError::Receive("fail-2".to_owned())),
            Err(TransportError::Receive("fail-3".to_owned())),
        ]));
        let transport = Arc::new(RecordingTransport::default());

        runner(source.clone(), transport).start().await.expect("runner");

        assert_eq!(source.polls().await, 3);
    }

    #[test]
    fn sender_names_prefer_usernames_and_fall_back_to_numeric_ids() {
        assert_eq!(
            sender_name(Some(&User { id: 7, username: Some("alice".to_owned()) })),
            "alice"
        );
        assert_eq!(sender_name(Some(&User { id: 7, username: None })), "7");
        assert_eq!(sender_name(None), "unknown");
    }

    #[test]
    fn callback_updates_carry_the_message_and_callback_refs() {
        let incoming = classify(button_update(9, "delete_do_yes")).expect("classified");
        assert_eq!(incoming.user, UserId("100".to_owned()));
        let message = incoming.message.expect("message ref");
        assert_eq!(message.message_id, 7);
        assert_eq!(incoming.callback.expect("callback ref").0, "cb-9");
    }

    #[test]
    fn updates_without_text_or_data_are_ignored() {
        let bare = Update {
            update_id: 1,
            message: Some(Message {
                message_id: 1,
                chat: Chat { id: 100 },
                from: None,
                text: None,
            }),
            callback_query: None,
        };
        assert!(classify(bare).is_none());
    }
}
