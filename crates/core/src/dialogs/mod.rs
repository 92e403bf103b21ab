//! Conversation engine: per-user sessions, per-dialog state graphs, and
//! the dispatcher that routes chat events through them.

pub mod create;
pub mod delete;
pub mod dispatch;
pub mod event;
pub mod graph;
pub mod insights;
pub mod menu;
pub mod payloads;
pub mod read;
pub mod session;
pub mod state;
pub mod update;

#[cfg(test)]
pub(crate) mod testkit;

pub use dispatch::{Dispatcher, HandoffTable, Outcome};
pub use event::{EventMatcher, InboundEvent};
pub use graph::{HandlerError, StateGraph, Step, StepArgs, StepContext, StepFuture, StepHandler};
pub use session::{DialogSession, SessionStore};
pub use state::{DialogFields, DialogId, DialogState};

/// Dispatcher wired with all five dialogs and the handoff the post-action
/// "new entry" button relies on.
pub fn standard_dispatcher() -> Dispatcher {
    let mut handoffs = HandoffTable::new();
    handoffs.register(DialogId::Create, create::start);
    Dispatcher::new(
        vec![create::graph(), read::graph(), update::graph(), delete::graph(), insights::graph()],
        handoffs,
    )
}
