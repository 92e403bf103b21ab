//! Update dialog: look an entry up by id, tick the fields to change,
//! collect the new values one by one, confirm, and write the cells back.

use chrono::Utc;
use tracing::{error, info};

use crate::domain::{catalog, parse_price, Column, FieldKey};
use crate::format::{entry_details_markdown, escape_markdown, truncate_value};
use crate::outbound::{choice_keyboard, Button, Keyboard};
use crate::store::StoreError;

use super::event::{EventMatcher, InboundEvent};
use super::graph::{HandlerError, StateGraph, Step, StepArgs, StepContext, StepFuture};
use super::menu::{self, post_action_keyboard, POST_ACTION_PROMPT};
use super::payloads;
use super::state::{DialogFields, DialogId, DialogState, UpdateFields, UpdateState};

/// Longest original value shown on a checklist button.
const CHECKLIST_VALUE_CHARS: usize = 15;

fn state(step: UpdateState) -> DialogState {
    DialogState::Update(step)
}

pub fn graph() -> StateGraph {
    use EventMatcher::{AnyButton, Command, Exact, FreeText, Prefix};
    use UpdateState::*;

    StateGraph::builder(DialogId::Update, || DialogFields::for_dialog(DialogId::Update))
        .entry(Command("update"), start)
        .entry(Exact(payloads::MENU_UPDATE), start)
        .on(state(AskId), FreeText, id_received)
        .on(state(SelectFields), Prefix(payloads::UPDATE_FIELD_TOGGLE_PREFIX), toggle_field)
        .on(state(SelectFields), Exact(payloads::UPDATE_PROCEED), proceed_with_selection)
        .on(state(SelectFields), Exact(payloads::UPDATE_CANCEL_SELECTION), cancel_update)
        .on(
            state(EnterValues),
            Prefix(payloads::UPDATE_NEW_PRODUCT_PREFIX),
            button_value_chosen,
        )
        .on(
            state(EnterValues),
            Prefix(payloads::UPDATE_NEW_LOCATION_PREFIX),
            button_value_chosen,
        )
        .on(state(EnterValues), Command("skip_remark_update"), skip_remark)
        .on(state(EnterValues), FreeText, text_value_received)
        .on(state(Confirm), Exact(payloads::UPDATE_EXECUTE), execute_updates)
        .on(state(Confirm), Exact(payloads::UPDATE_CANCEL_FINAL), menu::cancel_dialog)
        .fallback(Command("cancel"), menu::cancel_dialog)
        .fallback(AnyButton, menu::post_action_navigation)
        .build()
}

fn start(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        info!(user = %args.cx.user, "update dialog started");
        args.cx
            .send("✏️ Please enter the ID of the entry you wish to update:", None)
            .await?;
        Ok(Step::Next(state(UpdateState::AskId)))
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
                        &escape_markdown("⚠️ An error occurred while fetching data."),
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
                    &format!(
                        "⚠️ No entry found with ID: `{}`. Please try again, or /cancel.",
                        escape_markdown(&entry_id)
                    ),
                    None,
                )
                .await?;
            return Ok(Step::Next(state(UpdateState::AskId)));
        };

        let fields = args.fields.as_update_mut()?;
        fields.entry_id = Some(entry_id);
        fields.row = Some(row);
        fields.original = Some(record);
        fields.selected.clear();
        fields.new_values.clear();
        show_field_checklist(args.cx, args.event, fields).await
    })
}

/// Checklist of the four editable fields, each button carrying the field
/// slug and showing a shortened current value.
async fn show_field_checklist(
    cx: &StepContext,
    event: &InboundEvent,
    fields: &UpdateFields,
) -> Result<Step, HandlerError> {
    let entry_id =
        fields.entry_id.as_deref().ok_or(HandlerError::MissingSessionValue("entry id"))?;
    let original =
        fields.original.as_ref().ok_or(HandlerError::MissingSessionValue("original entry"))?;

    let mut keyboard = Keyboard::new();
    for key in FieldKey::DISPLAY_ORDER {
        let marker = if fields.selected.contains(&key) { "✅" } else { "☑️" };
        let value = truncate_value(&original.field_value(key), CHECKLIST_VALUE_CHARS);
        keyboard.push_row(vec![Button::new(
            format!("{marker} {}: {value}", key.label()),
            format!("{}{}", payloads::UPDATE_FIELD_TOGGLE_PREFIX, key.slug()),
        )]);
    }
    keyboard.push_row(vec![Button::new("➡️ Proceed with Selection", payloads::UPDATE_PROCEED)]);
    keyboard.push_row(vec![Button::new("❌ Cancel Update", payloads::UPDATE_CANCEL_SELECTION)]);

    let text = format!(
        "✏️ *Updating Entry ID: `{}`*\n\n{}\n\nSelect fields to update, then click 'Proceed'.",
        escape_markdown(entry_id),
        entry_details_markdown(original, "Entry Details")
    );
    cx.render(event, &text, Some(keyboard)).await?;
    Ok(Step::Next(state(UpdateState::SelectFields)))
}

fn toggle_field(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let slug = payloads::require_suffix(args.event, payloads::UPDATE_FIELD_TOGGLE_PREFIX)?;
        let key = FieldKey::from_slug(slug)
            .ok_or(HandlerError::BadPayload(payloads::UPDATE_FIELD_TOGGLE_PREFIX))?;
        let fields = args.fields.as_update_mut()?;
        match fields.selected.iter().position(|selected| *selected == key) {
            Some(index) => {
                fields.selected.remove(index);
            }
            None => fields.selected.push(key),
        }
        show_field_checklist(args.cx, args.event, fields).await
    })
}

fn proceed_with_selection(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let fields = args.fields.as_update_mut()?;
        if fields.selected.is_empty() {
            args.cx.answer_alert("Please select at least one field to update.").await?;
            return Ok(Step::Next(state(UpdateState::SelectFields)));
        }
        fields.queue = FieldKey::DISPLAY_ORDER
            .into_iter()
            .filter(|key| fields.selected.contains(key))
            .collect();
        ask_next_value(args.cx, args.event, fields).await
    })
}

/// Prompts for the next queued field, or moves to the change summary once
/// every selected field has a new value.
async fn ask_next_value(
    cx: &StepContext,
    event: &InboundEvent,
    fields: &mut UpdateFields,
) -> Result<Step, HandlerError> {
    let Some(key) = fields.queue.front().copied() else {
        return show_change_summary(cx, event, fields).await;
    };
    fields.current = Some(key);
    let original =
        fields.original.as_ref().ok_or(HandlerError::MissingSessionValue("original entry"))?;
    let current_value = escape_markdown(&original.field_value(key));

    let (text, keyboard) = match key {
        FieldKey::Product => (
            format!("Select new *Product* (current: `{current_value}`):"),
            Some(choice_keyboard(&catalog::PRODUCTS, payloads::UPDATE_NEW_PRODUCT_PREFIX, 1)),
        ),
        FieldKey::Location => (
            format!("Select new *Location* (current: `{current_value}`):"),
            Some(choice_keyboard(&catalog::LOCATIONS, payloads::UPDATE_NEW_LOCATION_PREFIX, 1)),
        ),
        FieldKey::Price => (format!("Enter new *Price* (current: `{current_value}`):"), None),
        FieldKey::Remark => (
            format!("Enter new *Remark* (current: `{current_value}`)\nor use /skip_remark_update."),
            None,
        ),
    };
    cx.render(event, &text, keyboard).await?;
    Ok(Step::Next(state(UpdateState::EnterValues)))
}

fn button_value_chosen(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let fields = args.fields.as_update_mut()?;
        let key = fields.current.ok_or(HandlerError::MissingSessionValue("field under edit"))?;
        let new_value = match key {
            FieldKey::Product => catalog::product_from_slug(payloads::require_suffix(
                args.event,
                payloads::UPDATE_NEW_PRODUCT_PREFIX,
            )?),
            FieldKey::Location => catalog::location_from_slug(payloads::require_suffix(
                args.event,
                payloads::UPDATE_NEW_LOCATION_PREFIX,
            )?),
            FieldKey::Price | FieldKey::Remark => {
                return Err(HandlerError::BadPayload(payloads::UPDATE_NEW_PRODUCT_PREFIX));
            }
        };
        fields.new_values.insert(key, new_value);
        fields.queue.pop_front();
        fields.current = None;
        ask_next_value(args.cx, args.event, fields).await
    })
}

fn text_value_received(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let input = args.event.free_text().unwrap_or_default().to_owned();
        let fields = args.fields.as_update_mut()?;
        let key = fields.current.ok_or(HandlerError::MissingSessionValue("field under edit"))?;
        let new_value = match key {
            FieldKey::Price => match parse_price(&input) {
                Ok(price) => price.to_string(),
                Err(_) => {
                    args.cx
                        .render(args.event, "⚠️ Invalid price. Please enter a positive number.", None)
                        .await?;
                    return Ok(Step::Next(state(UpdateState::EnterValues)));
                }
            },
            _ => input,
        };
        fields.new_values.insert(key, new_value);
        fields.queue.pop_front();
        fields.current = None;
        ask_next_value(args.cx, args.event, fields).await
    })
}

fn skip_remark(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let fields = args.fields.as_update_mut()?;
        if fields.current != Some(FieldKey::Remark) {
            args.cx.render(args.event, "This command is only for the remark field.", None).await?;
            return Ok(Step::Next(state(UpdateState::EnterValues)));
        }
        fields.new_values.insert(FieldKey::Remark, String::new());
        fields.queue.pop_front();
        fields.current = None;
        ask_next_value(args.cx, args.event, fields).await
    })
}

async fn show_change_summary(
    cx: &StepContext,
    event: &InboundEvent,
    fields: &UpdateFields,
) -> Result<Step, HandlerError> {
    if fields.new_values.is_empty() {
        cx.render(
            event,
            &format!("No changes were made. Update canceled.\n\n{POST_ACTION_PROMPT}"),
            Some(post_action_keyboard()),
        )
        .await?;
        return Ok(Step::End);
    }

    let original =
        fields.original.as_ref().ok_or(HandlerError::MissingSessionValue("original entry"))?;
    let mut summary = vec!["*Confirm Changes:*".to_owned()];
    for (key, value) in &fields.new_values {
        summary.push(format!(
            "  - *{}:* `{}` ➡️ `{}`",
            key.label(),
            escape_markdown(&original.field_value(*key)),
            escape_markdown(value)
        ));
    }
    summary.push("\nApply these updates?".to_owned());

    let keyboard = Keyboard::new()
        .row(vec![Button::new("✅ Yes, Apply Updates", payloads::UPDATE_EXECUTE)])
        .row(vec![Button::new("❌ No, Cancel", payloads::UPDATE_CANCEL_FINAL)]);
    cx.render(event, &summary.join("\n"), Some(keyboard)).await?;
    Ok(Step::Next(state(UpdateState::Confirm)))
}

fn execute_updates(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        args.cx.render(args.event, "🔄 Applying updates...", None).await?;
        let fields = args.fields.as_update_mut()?;
        let row = fields.row.ok_or(HandlerError::MissingSessionValue("row position"))?;
        let entry_id = fields
            .entry_id
            .take()
            .ok_or(HandlerError::MissingSessionValue("entry id"))?;

        // The timestamp cell is rewritten alongside the edited fields so
        // the row reflects its modification time.
        let mut changes: Vec<(Column, String)> = fields
            .new_values
            .iter()
            .map(|(key, value)| (key.column(), value.clone()))
            .collect();
        changes.push((Column::Timestamp, Utc::now().to_rfc3339()));

        let outcome = if args.cx.store.is_ready() {
            args.cx.store.update_cells(row, &changes).await
        } else {
            Err(StoreError::Unavailable)
        };

        let final_message = match outcome {
            Ok(()) => {
                info!(user = %args.cx.user, id = %entry_id, "entry updated");
                format!("✅ Entry ID `{}` updated successfully.", escape_markdown(&entry_id))
            }
            Err(store_error) => {
                error!(user = %args.cx.user, id = %entry_id, error = %store_error, "update failed");
                format!("❌ Error! Could not update entry ID `{}`.", escape_markdown(&entry_id))
            }
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

fn cancel_update(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        info!(user = %args.cx.user, "update dialog canceled");
        args.cx
            .render(
                args.event,
                &format!("Update operation has been canceled.\n\n{POST_ACTION_PROMPT}"),
                Some(post_action_keyboard()),
            )
            .await?;
        Ok(Step::End)
    })
}
