//! Read dialog: view a single entry by id, or page through all entries
//! newest first.

use tracing::{error, info};

use crate::format::{entry_details_markdown, escape_markdown};
use crate::outbound::{Button, Keyboard};
use crate::store::StoreError;

use super::event::{EventMatcher, InboundEvent};
use super::graph::{HandlerError, StateGraph, Step, StepArgs, StepContext, StepFuture};
use super::menu::{self, post_action_keyboard, POST_ACTION_PROMPT};
use super::payloads;
use super::state::{DialogFields, DialogId, DialogState, ReadState};

fn state(step: ReadState) -> DialogState {
    DialogState::Read(step)
}

pub fn graph() -> StateGraph {
    use EventMatcher::{AnyButton, Command, Exact, FreeText, Prefix};
    use ReadState::*;

    StateGraph::builder(DialogId::Read, || DialogFields::for_dialog(DialogId::Read))
        .entry(Command("view"), start)
        .entry(Exact(payloads::MENU_VIEW), start)
        .on(state(AwaitingMenuChoice), Exact(payloads::VIEW_BY_ID), ask_for_id)
        .on(state(AwaitingMenuChoice), Prefix(payloads::VIEW_LAST_PREFIX), show_page)
        .on(state(AwaitingMenuChoice), Exact(payloads::VIEW_CANCEL), cancel_view)
        .on(state(AwaitingIdInput), FreeText, show_entry_by_id)
        .on(state(Paginating), Prefix(payloads::VIEW_LAST_PREFIX), show_page)
        .on(state(Paginating), Exact(payloads::VIEW_BACK_TO_OPTIONS), start)
        .on(state(Paginating), Exact(payloads::VIEW_CANCEL), cancel_view)
        .fallback(Command("cancel"), menu::cancel_dialog)
        .fallback(Exact(payloads::VIEW_CANCEL), cancel_view)
        .fallback(AnyButton, menu::post_action_navigation)
        .build()
}

fn start(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let keyboard = Keyboard::new()
            .row(vec![Button::new(
                format!("👁️ View Last {} Entries", args.cx.page_size),
                payloads::view_page(0),
            )])
            .row(vec![Button::new("🆔 View Entry by ID", payloads::VIEW_BY_ID)])
            .row(vec![Button::new("❌ Cancel View", payloads::VIEW_CANCEL)]);
        args.cx
            .render(
                args.event,
                &escape_markdown("How would you like to view entries?"),
                Some(keyboard),
            )
            .await?;
        Ok(Step::Next(state(ReadState::AwaitingMenuChoice)))
    })
}

fn ask_for_id(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        args.cx
            .render(
                args.event,
                &escape_markdown("Please send the ID of the entry you want to view:"),
                None,
            )
            .await?;
        Ok(Step::Next(state(ReadState::AwaitingIdInput)))
    })
}

fn show_entry_by_id(args: StepArgs<'_>) -> StepFuture<'_> {
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
                        &escape_markdown("⚠️ An error occurred while fetching data."),
                        Some(post_action_keyboard()),
                    )
                    .await?;
                return Ok(Step::End);
            }
        };

        let final_message = match found {
            Some((_, record)) => {
                format!(
                    "{}\n\n{POST_ACTION_PROMPT}",
                    entry_details_markdown(&record, "Entry Details")
                )
            }
            None => {
                format!(
                    "⚠️ No entry found with ID: `{}`\n\n{POST_ACTION_PROMPT}",
                    escape_markdown(&entry_id)
                )
            }
        };
        args.cx.render(args.event, &final_message, Some(post_action_keyboard())).await?;
        Ok(Step::End)
    })
}

/// Renders one page of entries, newest first. Beyond the last page the
/// user gets a transient notice and the view stays where it was.
fn show_page(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let page: usize = payloads::require_suffix(args.event, payloads::VIEW_LAST_PREFIX)?
            .parse()
            .unwrap_or(0);

        args.cx.render(args.event, &escape_markdown("🔄 Fetching entries..."), None).await?;

        let fetched = if args.cx.store.is_ready() {
            args.cx.store.get_all().await
        } else {
            Err(StoreError::Unavailable)
        };
        let mut records = match fetched {
            Ok(records) => records,
            Err(store_error) => {
                error!(user = %args.cx.user, error = %store_error, "failed to fetch entries");
                args.cx
                    .render(
                        args.event,
                        &escape_markdown("⚠️ An error occurred while fetching data."),
                        Some(post_action_keyboard()),
                    )
                    .await?;
                return Ok(Step::End);
            }
        };

        if records.is_empty() {
            args.cx
                .render(
                    args.event,
                    &escape_markdown(&format!(
                        "ℹ️ The sheet has no data entries.\n\n{POST_ACTION_PROMPT}"
                    )),
                    Some(post_action_keyboard()),
                )
                .await?;
            return Ok(Step::End);
        }

        records.reverse();
        let total = records.len();
        let per_page = args.cx.page_size.max(1);
        let start_index = page * per_page;
        let end_index = (page + 1) * per_page;
        let page_records = records.get(start_index..total.min(end_index)).unwrap_or_default();

        if page_records.is_empty() {
            args.cx.answer_notice("ℹ️ No more entries to display.").await?;
            return Ok(Step::Next(state(ReadState::Paginating)));
        }

        let mut parts = vec![escape_markdown(&format!("Displaying Entries (Page {})", page + 1))];
        for (offset, record) in page_records.iter().enumerate() {
            let entry_number = total - (start_index + offset);
            parts.push(escape_markdown(&format!("\n--- Entry {entry_number} ---")));
            parts.push(entry_details_markdown(record, ""));
        }

        let mut keyboard = Keyboard::new();
        let mut nav_row = Vec::new();
        if page > 0 {
            nav_row.push(Button::new("⬅️ Prev", payloads::view_page(page - 1)));
        }
        if end_index < total {
            nav_row.push(Button::new("Next ➡️", payloads::view_page(page + 1)));
        }
        if !nav_row.is_empty() {
            keyboard.push_row(nav_row);
        }
        keyboard.push_row(vec![Button::new(
            "↩️ Back to View Options",
            payloads::VIEW_BACK_TO_OPTIONS,
        )]);

        args.cx.render(args.event, &parts.join("\n"), Some(keyboard)).await?;
        Ok(Step::Next(state(ReadState::Paginating)))
    })
}

fn cancel_view(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        info!(user = %args.cx.user, "view dialog canceled");
        render_view_canceled(args.cx, args.event).await?;
        Ok(Step::End)
    })
}

async fn render_view_canceled(
    cx: &StepContext,
    event: &InboundEvent,
) -> Result<(), HandlerError> {
    cx.render(
        event,
        &format!("View operation canceled.\n\n{POST_ACTION_PROMPT}"),
        Some(post_action_keyboard()),
    )
    .await?;
    Ok(())
}
