//! Delete dialog: look an entry up by id, show it, and remove its row
//! after an explicit confirmation.

use tracing::{error, info};

use crate::format::{entry_details_markdown, escape_markdown};
use crate::outbound::{Button, Keyboard};
use crate::store::StoreError;

use super::event::EventMatcher;
use super::graph::{HandlerError, StateGraph, Step, StepArgs, StepFuture};
use super::menu::{self, post_action_keyboard, POST_ACTION_PROMPT};
use super::payloads;
use super::state::{DeleteState, DialogFields, DialogId, DialogState};

fn state(step: DeleteState) -> DialogState {
    DialogState::Delete(step)
}

pub fn graph() -> StateGraph {
    use DeleteState::*;
    use EventMatcher::{AnyButton, Command, Exact, FreeText};

    StateGraph::builder(DialogId::Delete, || DialogFields::for_dialog(DialogId::Delete))
        .entry(Command("delete"), start)
        .entry(Exact(payloads::MENU_DELETE), start)
        .on(state(AskId), FreeText, id_received)
        .on(state(Confirm), Exact(payloads::DELETE_YES), confirm_delete)
        .on(state(Confirm), Exact(payloads::DELETE_NO), confirm_delete)
        .fallback(Command("cancel"), menu::cancel_dialog)
        .fallback(AnyButton, menu::post_action_navigation)
        .build()
}

fn start(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        info!(user = %args.cx.user, "delete dialog started");
        args.cx.send("Please enter the ID of the entry you want to delete:", None).await?;
        Ok(Step::Next(state(DeleteState::AskId)))
    })
}

fn id_received(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let entry_id = args.event.free_text().unwrap_or_default().trim().to_owned();
        let fetched = if args.cx.store.is_ready() {
            args.cx.store.find_by_id(&entry_id).await
        } else {
            Err(StoreError::Unavailable)
        };
        let found = match fetched {
            Ok(found) => found,
            Err(store_error) => {
                error!(user = %args.cx.user, error = %store_error, "entry lookup failed");
                args.cx
                    .render(
                        args.event,
                        "⚠️ An error occurred while fetching data.",
                        Some(post_action_keyboard()),
                    )
                    .await?;
                return Ok(Step::End);
            }
        };
        let Some((row, record)) = found else {
            args.cx
                .render(
                    args.event,
                    &format!("No entry found with ID: {entry_id}. Please try again or /cancel."),
                    None,
                )
                .await?;
            return Ok(Step::Next(state(DeleteState::AskId)));
        };

        let fields = args.fields.as_delete_mut()?;
        fields.entry_id = Some(entry_id);
        fields.row = Some(row);

        let keyboard = Keyboard::new()
            .row(vec![Button::new("🗑️ Yes, Delete it", payloads::DELETE_YES)])
            .row(vec![Button::new("❌ No, Keep it", payloads::DELETE_NO)]);
        args.cx
            .render(
                args.event,
                &format!(
                    "Found entry:\n{}\n\n⚠️ *ARE YOU SURE* you want to delete this entry? \
                     This action cannot be undone\\.",
                    entry_details_markdown(&record, "Entry Details")
                ),
                Some(keyboard),
            )
            .await?;
        Ok(Step::Next(state(DeleteState::Confirm)))
    })
}

fn confirm_delete(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let fields = args.fields.as_delete_mut()?;
        let final_message = if args.event.button_data() == Some(payloads::DELETE_YES) {
            let row = fields.row.ok_or(HandlerError::MissingSessionValue("row position"))?;
            let entry_id = fields
                .entry_id
                .take()
                .ok_or(HandlerError::MissingSessionValue("entry id"))?;
            let outcome = if args.cx.store.is_ready() {
                args.cx.store.delete(row).await
            } else {
                Err(StoreError::Unavailable)
            };
            match outcome {
                Ok(()) => {
                    info!(user = %args.cx.user, id = %entry_id, "entry deleted");
                    format!("✅ Entry ID `{}` has been deleted.", escape_markdown(&entry_id))
                }
                Err(store_error) => {
                    error!(
                        user = %args.cx.user,
                        id = %entry_id,
                        error = %store_error,
                        "delete failed"
                    );
                    "❌ Error deleting entry from the sheet.".to_owned()
                }
            }
        } else {
            "Deletion canceled.".to_owned()
        };

        args.cx
            .render(
                args.event,
                &format!("{final_message}\n\n{POST_ACTION_PROMPT}"),
                Some(post_action_keyboard()),
            )
            .await?;
        Ok(Step::End)
    })
}
