//! Routes inbound events to dialog handlers and owns the session
//! lifecycle around each step.

use std::collections::HashMap;

use tracing::{debug, error, warn};

use crate::domain::UserId;

use super::event::InboundEvent;
use super::graph::{HandlerError, StateGraph, Step, StepArgs, StepContext, StepHandler};
use super::session::SessionStore;
use super::state::{DialogFields, DialogId, DialogState};

/// Sent when a handler fails in a way it did not anticipate. The session
/// is deliberately left as it was; `/cancel` always recovers.
pub const UNEXPECTED_ERROR_TEXT: &str = "Sorry, an error occurred while processing your request.\n\
     If the problem persists, please contact an administrator.";

/// Entry handlers reachable through `Step::Handoff`, wired at startup so
/// dialogs never import one another.
#[derive(Default)]
pub struct HandoffTable {
    entries: HashMap<DialogId, StepHandler>,
}

impl HandoffTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, dialog: DialogId, entry: StepHandler) {
        self.entries.insert(dialog, entry);
    }

    pub fn entry(&self, dialog: DialogId) -> Option<StepHandler> {
        self.entries.get(&dialog).copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A handler ran and the session was updated accordingly.
    Handled,
    /// No route wanted the event; it was dropped without a reply.
    Ignored,
    /// A handler failed; the user was notified and the session kept.
    Failed,
}

pub struct Dispatcher {
    graphs: Vec<StateGraph>,
    sessions: SessionStore,
    handoffs: HandoffTable,
}

impl Dispatcher {
    pub fn new(graphs: Vec<StateGraph>, handoffs: HandoffTable) -> Self {
        Self { graphs, sessions: SessionStore::new(), handoffs }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Routes one event for one user. Handler errors stop here: they are
    /// logged, the user gets a generic apology, and the session stays
    /// untouched so the surrounding loop keeps running.
    pub async fn dispatch(&self, cx: &StepContext, event: &InboundEvent) -> Outcome {
        match self.route(cx, event).await {
            Ok(outcome) => outcome,
            Err(handler_error) => {
                error!(
                    user = %cx.user,
                    error = %handler_error,
                    "dialog handler failed; session left untouched"
                );
                if let Err(send_error) = cx.send(UNEXPECTED_ERROR_TEXT, None).await {
                    warn!(
                        user = %cx.user,
                        error = %send_error,
                        "failed to deliver the error notice"
                    );
                }
                Outcome::Failed
            }
        }
    }

    async fn route(
        &self,
        cx: &StepContext,
        event: &InboundEvent,
    ) -> Result<Outcome, HandlerError> {
        let Some(session) = self.sessions.get(&cx.user).await else {
            return self.route_entry(cx, event).await;
        };

        let dialog = session.state.dialog();
        let graph = self.graph(dialog)?;
        let handler = graph
            .transition_handler(session.state, event)
            .or_else(|| graph.fallback_handler(event));
        let Some(handler) = handler else {
            debug!(
                user = %cx.user,
                dialog = dialog.name(),
                state = ?session.state,
                "event matched no route; dropped"
            );
            return Ok(Outcome::Ignored);
        };

        // Handlers mutate a copy; it only replaces the stored fields when
        // the step succeeds.
        let mut fields = session.fields;
        let step = handler(StepArgs { cx, event, fields: &mut fields }).await?;
        self.apply(&cx.user, cx, event, dialog, fields, step).await?;
        Ok(Outcome::Handled)
    }

    async fn route_entry(
        &self,
        cx: &StepContext,
        event: &InboundEvent,
    ) -> Result<Outcome, HandlerError> {
        for graph in &self.graphs {
            let Some(handler) = graph.entry_handler(event) else {
                continue;
            };
            debug!(user = %cx.user, dialog = graph.dialog().name(), "dialog entry matched");
            let mut fields = graph.new_fields();
            let step = handler(StepArgs { cx, event, fields: &mut fields }).await?;
            self.apply(&cx.user, cx, event, graph.dialog(), fields, step).await?;
            return Ok(Outcome::Handled);
        }
        Ok(Outcome::Ignored)
    }

    async fn apply(
        &self,
        user: &UserId,
        cx: &StepContext,
        event: &InboundEvent,
        dialog: DialogId,
        fields: DialogFields,
        step: Step,
    ) -> Result<(), HandlerError> {
        match step {
            Step::Next(state) => {
                if state.dialog() != dialog {
                    return Err(HandlerError::ForeignState {
                        dialog,
                        returned: state.dialog(),
                    });
                }
                self.sessions.set(user, state, fields).await;
            }
            Step::End => self.sessions.clear(user).await,
            Step::Handoff(target) => {
                self.sessions.clear(user).await;
                let entry = self
                    .handoffs
                    .entry(target)
                    .ok_or(HandlerError::MissingHandoff(target))?;
                let graph = self.graph(target)?;
                let mut fields = graph.new_fields();
                let step = entry(StepArgs { cx, event, fields: &mut fields }).await?;
                match step {
                    Step::Next(state) if state.dialog() == target => {
                        self.sessions.set(user, state, fields).await;
                    }
                    Step::Next(state) => {
                        return Err(HandlerError::ForeignState {
                            dialog: target,
                            returned: state.dialog(),
                        });
                    }
                    Step::End => {}
                    Step::Handoff(next) => {
                        // One hop only; a chain would risk a loop.
                        warn!(
                            from = target.name(),
                            to = next.name(),
                            "chained handoff refused; dialog ended"
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn graph(&self, dialog: DialogId) -> Result<&StateGraph, HandlerError> {
        self.graphs
            .iter()
            .find(|graph| graph.dialog() == dialog)
            .ok_or(HandlerError::MissingGraph(dialog))
    }
}

#[cfg(test)]
mod tests {
    use super::{Dispatcher, HandoffTable, Outcome, UNEXPECTED_ERROR_TEXT};
    use crate::dialogs::event::{EventMatcher, InboundEvent};
    use crate::dialogs::graph::{
        HandlerError, StateGraph, Step, StepArgs, StepFuture,
    };
    use crate::dialogs::state::{
        DialogFields, DialogId, DialogState, InsightsState, ReadState,
    };
    use crate::dialogs::testkit;
    use crate::outbound::TransportError;

    fn begin(_args: StepArgs<'_>) -> StepFuture<'_> {
        Box::pin(async { Ok(Step::Next(DialogState::Read(ReadState::AwaitingIdInput))) })
    }

    fn finish(args: StepArgs<'_>) -> StepFuture<'_> {
        Box::pin(async move {
            args.cx.render(args.event, "done", None).await?;
            Ok(Step::End)
        })
    }

    fn explode(_args: StepArgs<'_>) -> StepFuture<'_> {
        Box::pin(async {
            Err(HandlerError::Transport(TransportError::Send("boom".into())))
        })
    }

    fn hand_off(_args: StepArgs<'_>) -> StepFuture<'_> {
        Box::pin(async { Ok(Step::Handoff(DialogId::Insights)) })
    }

    fn insights_entry(_args: StepArgs<'_>) -> StepFuture<'_> {
        Box::pin(async {
            Ok(Step::Next(DialogState::Insights(InsightsState::MenuDisplayed)))
        })
    }

    fn test_graph() -> StateGraph {
        StateGraph::builder(DialogId::Read, || DialogFields::for_dialog(DialogId::Read))
            .entry(EventMatcher::Command("view"), begin)
            .on(
                DialogState::Read(ReadState::AwaitingIdInput),
                EventMatcher::FreeText,
                finish,
            )
            .on(
                DialogState::Read(ReadState::AwaitingIdInput),
                EventMatcher::Exact("explode"),
                explode,
            )
            .on(
                DialogState::Read(ReadState::AwaitingIdInput),
                EventMatcher::Exact("go_insights"),
                hand_off,
            )
            .build()
    }

    fn insights_graph() -> StateGraph {
        StateGraph::builder(DialogId::Insights, || {
            DialogFields::for_dialog(DialogId::Insights)
        })
        .build()
    }

    fn dispatcher() -> Dispatcher {
        let mut handoffs = HandoffTable::new();
        handoffs.register(DialogId::Insights, insights_entry);
        Dispatcher::new(vec![test_graph(), insights_graph()], handoffs)
    }

    #[tokio::test]
    async fn entry_event_starts_a_session() {
        let dispatcher = dispatcher();
        let harness = testkit::Harness::new();
        let cx = harness.context("alice");

        let outcome = dispatcher.dispatch(&cx, &InboundEvent::text("/view")).await;

        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(
            dispatcher.sessions().state(&cx.user).await,
            Some(DialogState::Read(ReadState::AwaitingIdInput))
        );
    }

    #[tokio::test]
    async fn unmatched_events_are_dropped_without_replies() {
        let dispatcher = dispatcher();
        let harness = testkit::Harness::new();
        let cx = harness.context("alice");

        assert_eq!(
            dispatcher.dispatch(&cx, &InboundEvent::text("hello there")).await,
            Outcome::Ignored
        );
        dispatcher.dispatch(&cx, &InboundEvent::text("/view")).await;
        assert_eq!(
            dispatcher.dispatch(&cx, &InboundEvent::button("not_a_route")).await,
            Outcome::Ignored
        );

        // Only the entry step rendered anything.
        assert!(harness.transport.texts().await.is_empty());
        assert_eq!(
            dispatcher.sessions().state(&cx.user).await,
            Some(DialogState::Read(ReadState::AwaitingIdInput))
        );
    }

    #[tokio::test]
    async fn end_step_clears_the_session() {
        let dispatcher = dispatcher();
        let harness = testkit::Harness::new();
        let cx = harness.context("alice");

        dispatcher.dispatch(&cx, &InboundEvent::text("/view")).await;
        let outcome = dispatcher.dispatch(&cx, &InboundEvent::text("abc-123")).await;

        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(dispatcher.sessions().state(&cx.user).await, None);
    }

    #[tokio::test]
    async fn handler_errors_notify_the_user_and_preserve_the_session() {
        let dispatcher = dispatcher();
        let harness = testkit::Harness::new();
        let cx = harness.context("alice");

        dispatcher.dispatch(&cx, &InboundEvent::text("/view")).await;
        let outcome = dispatcher.dispatch(&cx, &InboundEvent::button("explode")).await;

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(harness.transport.texts().await, vec![UNEXPECTED_ERROR_TEXT.to_owned()]);
        assert_eq!(
            dispatcher.sessions().state(&cx.user).await,
            Some(DialogState::Read(ReadState::AwaitingIdInput))
        );
    }

    #[tokio::test]
    async fn handoff_switches_dialogs_through_the_table() {
        let dispatcher = dispatcher();
        let harness = testkit::Harness::new();
        let cx = harness.context("alice");

        dispatcher.dispatch(&cx, &InboundEvent::text("/view")).await;
        let outcome = dispatcher.dispatch(&cx, &InboundEvent::button("go_insights")).await;

        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(
            dispatcher.sessions().state(&cx.user).await,
            Some(DialogState::Insights(InsightsState::MenuDisplayed))
        );
    }

    #[tokio::test]
    async fn users_do_not_share_sessions() {
        let dispatcher = dispatcher();
        let harness = testkit::Harness::new();
        let alice = harness.context("alice");
        let bob = harness.context("bob");

        dispatcher.dispatch(&alice, &InboundEvent::text("/view")).await;

        assert!(dispatcher.sessions().state(&alice.user).await.is_some());
        assert_eq!(dispatcher.sessions().state(&bob.user).await, None);
        assert_eq!(
            dispatcher.dispatch(&bob, &InboundEvent::text("some text")).await,
            Outcome::Ignored
        );
    }
}
