//! Step registry: one immutable `StateGraph` per dialog, built once at
//! startup, mapping (state, event) pairs to handler functions.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::UserId;
use crate::outbound::{
    CallbackAnswer, CallbackRef, Keyboard, MessageRef, Transport, TransportError,
};
use crate::store::{EntryStore, StoreError};

use super::event::{EventMatcher, InboundEvent};
use super::state::{DialogFields, DialogId, DialogState, FieldsMismatch};

/// What a handler tells the dispatcher to do with the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Move to (or stay in) a state of the same dialog.
    Next(DialogState),
    /// Dialog finished; drop the session.
    End,
    /// Dialog finished; immediately start another dialog for this user
    /// through its registered entry handler.
    Handoff(DialogId),
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Fields(#[from] FieldsMismatch),
    #[error("session carries no value for `{0}`")]
    MissingSessionValue(&'static str),
    #[error("button payload lacks the expected `{0}` prefix")]
    BadPayload(&'static str),
    #[error("no graph registered for dialog `{0}`")]
    MissingGraph(DialogId),
    #[error("no handoff entry registered for dialog `{0}`")]
    MissingHandoff(DialogId),
    #[error("handler for dialog `{dialog}` returned a `{returned}` state")]
    ForeignState { dialog: DialogId, returned: DialogId },
}

/// Everything a handler may touch besides the event and its own fields.
/// Built by the runner once per inbound event.
pub struct StepContext {
    pub user: UserId,
    /// Identity written into the `submitted_by` column: the sender's
    /// username when present, otherwise their numeric id.
    pub submitted_by: String,
    pub transport: Arc<dyn Transport>,
    pub store: Arc<dyn EntryStore>,
    /// Entries shown per page in the read dialog.
    pub page_size: usize,
    /// The bot message the pressed button is attached to, if any.
    pub message: Option<MessageRef>,
    /// The pending callback to acknowledge, if the event is a press.
    pub callback: Option<CallbackRef>,
}

impl StepContext {
    /// Edits the message the button lives on for presses, sends a fresh
    /// message for text input. Handlers render at most once per step.
    pub async fn render(
        &self,
        event: &InboundEvent,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), TransportError> {
        match (&self.message, event.is_button()) {
            (Some(message), true) => self.transport.edit(message, text, keyboard).await,
            _ => self.transport.send(&self.user, text, keyboard).await,
        }
    }

    pub async fn send(
        &self,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), TransportError> {
        self.transport.send(&self.user, text, keyboard).await
    }

    /// Transient notice on the pending callback; no-op for text events.
    pub async fn answer_notice(&self, text: &str) -> Result<(), TransportError> {
        if let Some(callback) = &self.callback {
            self.transport.answer(callback, CallbackAnswer::Notice(text.to_owned())).await?;
        }
        Ok(())
    }

    /// Modal alert on the pending callback; no-op for text events.
    pub async fn answer_alert(&self, text: &str) -> Result<(), TransportError> {
        if let Some(callback) = &self.callback {
            self.transport.answer(callback, CallbackAnswer::Alert(text.to_owned())).await?;
        }
        Ok(())
    }
}

/// Borrowed arguments of one handler invocation.
pub struct StepArgs<'a> {
    pub cx: &'a StepContext,
    pub event: &'a InboundEvent,
    pub fields: &'a mut DialogFields,
}

pub type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<Step, HandlerError>> + Send + 'a>>;

/// Handlers are plain functions; the registry stores them as pointers.
pub type StepHandler = fn(StepArgs<'_>) -> StepFuture<'_>;

type Route = (EventMatcher, StepHandler);

/// Per-dialog routing table. Immutable once built; routes are tried in
/// registration order and the first matching one wins.
pub struct StateGraph {
    dialog: DialogId,
    entry_points: Vec<Route>,
    transitions: HashMap<DialogState, Vec<Route>>,
    fallbacks: Vec<Route>,
    initial_fields: fn() -> DialogFields,
}

impl StateGraph {
    pub fn builder(dialog: DialogId, initial_fields: fn() -> DialogFields) -> StateGraphBuilder {
        StateGraphBuilder {
            graph: StateGraph {
                dialog,
                entry_points: Vec::new(),
                transitions: HashMap::new(),
                fallbacks: Vec::new(),
                initial_fields,
            },
        }
    }

    pub fn dialog(&self) -> DialogId {
        self.dialog
    }

    pub fn new_fields(&self) -> DialogFields {
        (self.initial_fields)()
    }

    pub fn entry_handler(&self, event: &InboundEvent) -> Option<StepHandler> {
        first_match(&self.entry_points, event)
    }

    pub fn transition_handler(
        &self,
        state: DialogState,
        event: &InboundEvent,
    ) -> Option<StepHandler> {
        first_match(self.transitions.get(&state)?, event)
    }

    pub fn fallback_handler(&self, event: &InboundEvent) -> Option<StepHandler> {
        first_match(&self.fallbacks, event)
    }
}

fn first_match(routes: &[Route], event: &InboundEvent) -> Option<StepHandler> {
    routes
        .iter()
        .find(|(matcher, _)| matcher.matches(event))
        .map(|(_, handler)| *handler)
}

pub struct StateGraphBuilder {
    graph: StateGraph,
}

impl StateGraphBuilder {
    pub fn entry(mut self, matcher: EventMatcher, handler: StepHandler) -> Self {
        self.graph.entry_points.push((matcher, handler));
        self
    }

    pub fn on(
        mut self,
        state: DialogState,
        matcher: EventMatcher,
        handler: StepHandler,
    ) -> Self {
        debug_assert_eq!(state.dialog(), self.graph.dialog);
        self.graph.transitions.entry(state).or_default().push((matcher, handler));
        self
    }

    pub fn fallback(mut self, matcher: EventMatcher, handler: StepHandler) -> Self {
        self.graph.fallbacks.push((matcher, handler));
        self
    }

    pub fn build(self) -> StateGraph {
        self.graph
    }
}
