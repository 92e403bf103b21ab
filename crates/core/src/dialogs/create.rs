//! Create dialog: a chooser that branches into a single-entry flow and a
//! multi-product batch flow sharing one location and remark.

use tracing::{error, info};

use crate::domain::{catalog, parse_price, EntryRecord};
use crate::outbound::{choice_keyboard, Button, Keyboard};
use crate::store::StoreError;

use super::event::{EventMatcher, InboundEvent};
use super::graph::{
    HandlerError, StateGraph, Step, StepArgs, StepContext, StepFuture,
};
use super::menu::{self, post_action_keyboard, POST_ACTION_PROMPT};
use super::payloads;
use super::state::{BatchLine, CreateFields, CreateState, DialogFields, DialogId, DialogState};

fn state(step: CreateState) -> DialogState {
    DialogState::Create(step)
}

pub fn graph() -> StateGraph {
    use CreateState::*;
    use EventMatcher::{AnyButton, Command, Exact, FreeText, Prefix};

    StateGraph::builder(DialogId::Create, || DialogFields::for_dialog(DialogId::Create))
        .entry(Command("new"), start)
        .entry(Exact(payloads::MENU_NEW), start)
        .on(state(ChooseEntryType), Exact(payloads::CREATE_CHOOSE_SINGLE), choose_single)
        .on(state(ChooseEntryType), Exact(payloads::CREATE_CHOOSE_BATCH), choose_batch)
        .on(state(ChooseEntryType), Exact(payloads::CREATE_CANCEL_ALL), menu::cancel_dialog)
        .on(
            state(BatchSelectLocation),
            Prefix(payloads::CREATE_BATCH_LOCATION_PREFIX),
            batch_location_chosen,
        )
        .on(state(BatchEnterRemark), Command("skip_remark_batch"), batch_skip_remark)
        .on(state(BatchEnterRemark), FreeText, batch_remark_entered)
        .on(
            state(BatchToggleProducts),
            Prefix(payloads::CREATE_BATCH_TOGGLE_PREFIX),
            batch_toggle_product,
        )
        .on(state(BatchToggleProducts), Exact(payloads::CREATE_BATCH_DONE), batch_products_done)
        .on(state(BatchEnterPrice), FreeText, batch_price_entered)
        .on(state(BatchConfirm), Exact(payloads::CREATE_BATCH_SUBMIT), batch_submit)
        .on(state(BatchConfirm), Exact(payloads::CREATE_BATCH_CANCEL), menu::cancel_dialog)
        .on(
            state(SingleSelectProduct),
            Prefix(payloads::CREATE_SINGLE_PRODUCT_PREFIX),
            single_product_chosen,
        )
        .on(state(SingleEnterPrice), FreeText, single_price_entered)
        .on(
            state(SingleSelectLocation),
            Prefix(payloads::CREATE_SINGLE_LOCATION_PREFIX),
            single_location_chosen,
        )
        .on(state(SingleEnterRemark), Command("skip_remark_single"), single_skip_remark)
        .on(state(SingleEnterRemark), FreeText, single_remark_entered)
        .on(state(SingleConfirm), Exact(payloads::CREATE_SINGLE_SUBMIT), single_submit)
        .on(state(SingleConfirm), Exact(payloads::CREATE_SINGLE_CANCEL), menu::cancel_dialog)
        .fallback(Command("cancel"), menu::cancel_dialog)
        .fallback(Exact(payloads::CREATE_CANCEL_ALL), menu::cancel_dialog)
        .fallback(AnyButton, menu::post_action_navigation)
        .build()
}

/// Entry point, also registered as the handoff target for the "new entry"
/// navigation button.
pub fn start(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        info!(user = %args.cx.user, "create dialog started");
        let keyboard = Keyboard::new()
            .row(vec![Button::new("☝️ Add Single Product", payloads::CREATE_CHOOSE_SINGLE)])
            .row(vec![Button::new("📦 Add Batch of Products", payloads::CREATE_CHOOSE_BATCH)])
            .row(vec![Button::new("❌ Cancel", payloads::CREATE_CANCEL_ALL)]);
        args.cx
            .render(args.event, "How would you like to add new data?", Some(keyboard))
            .await?;
        Ok(Step::Next(state(CreateState::ChooseEntryType)))
    })
}

// --- Single entry flow ---

fn choose_single(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let keyboard =
            choice_keyboard(&catalog::PRODUCTS, payloads::CREATE_SINGLE_PRODUCT_PREFIX, 1);
        args.cx
            .render(
                args.event,
                "--- Single Product Entry ---\nPlease select the Product:",
                Some(keyboard),
            )
            .await?;
        Ok(Step::Next(state(CreateState::SingleSelectProduct)))
    })
}

fn single_product_chosen(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let slug = payloads::require_suffix(args.event, payloads::CREATE_SINGLE_PRODUCT_PREFIX)?;
        let product = catalog::product_from_slug(slug);
        let fields = args.fields.as_create_mut()?;
        fields.product = Some(product.clone());
        args.cx
            .render(
                args.event,
                &format!("Product: {product}\n\nPlease enter the buying price (e.g., 120.50):"),
                None,
            )
            .await?;
        Ok(Step::Next(state(CreateState::SingleEnterPrice)))
    })
}

fn single_price_entered(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let input = args.event.free_text().unwrap_or_default();
        let fields = args.fields.as_create_mut()?;
        let Ok(price) = parse_price(input) else {
            args.cx
                .render(args.event, "⚠️ Invalid price. Please enter a positive number:", None)
                .await?;
            return Ok(Step::Next(state(CreateState::SingleEnterPrice)));
        };
        fields.price = Some(price);
        let product = fields
            .product
            .clone()
            .ok_or(HandlerError::MissingSessionValue("product"))?;
        let keyboard =
            choice_keyboard(&catalog::LOCATIONS, payloads::CREATE_SINGLE_LOCATION_PREFIX, 1);
        args.cx
            .render(
                args.event,
                &format!("Product: {product}\nPrice: {price}\n\nPlease select the Location:"),
                Some(keyboard),
            )
            .await?;
        Ok(Step::Next(state(CreateState::SingleSelectLocation)))
    })
}

fn single_location_chosen(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let slug = payloads::require_suffix(args.event, payloads::CREATE_SINGLE_LOCATION_PREFIX)?;
        let location = catalog::location_from_slug(slug);
        let fields = args.fields.as_create_mut()?;
        fields.location = Some(location.clone());
        let product = fields
            .product
            .clone()
            .ok_or(HandlerError::MissingSessionValue("product"))?;
        let price = fields.price.ok_or(HandlerError::MissingSessionValue("price"))?;
        args.cx
            .render(
                args.event,
                &format!(
                    "Product: {product}\nPrice: {price}\nLocation: {location}\n\n\
                     Please enter remarks, or use /skip_remark_single."
                ),
                None,
            )
            .await?;
        Ok(Step::Next(state(CreateState::SingleEnterRemark)))
    })
}

fn single_remark_entered(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let remark = args.event.free_text().unwrap_or_default().to_owned();
        let fields = args.fields.as_create_mut()?;
        fields.remark = Some(remark);
        args.cx.send("✅ Remark set.", None).await?;
        show_single_confirmation(args.cx, args.event, fields).await
    })
}

fn single_skip_remark(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let fields = args.fields.as_create_mut()?;
        fields.remark = Some(String::new());
        args.cx.send("✅ Remark skipped.", None).await?;
        show_single_confirmation(args.cx, args.event, fields).await
    })
}

async fn show_single_confirmation(
    cx: &StepContext,
    event: &InboundEvent,
    fields: &CreateFields,
) -> Result<Step, HandlerError> {
    let product = fields.product.as_deref().ok_or(HandlerError::MissingSessionValue("product"))?;
    let price = fields.price.ok_or(HandlerError::MissingSessionValue("price"))?;
    let location =
        fields.location.as_deref().ok_or(HandlerError::MissingSessionValue("location"))?;
    let remark = fields.remark.as_deref().unwrap_or_default();
    let remark_display = if remark.is_empty() { "None" } else { remark };
    let summary = format!(
        "--- Confirm Single Entry ---\n\n\
         Product: {product}\nPrice: {price}\nLocation: {location}\nRemark: {remark_display}\n\n\
         Submit this entry?"
    );
    let keyboard = Keyboard::new()
        .row(vec![Button::new("✅ Yes, Submit", payloads::CREATE_SINGLE_SUBMIT)])
        .row(vec![Button::new("❌ No, Cancel", payloads::CREATE_SINGLE_CANCEL)]);
    cx.render(event, &summary, Some(keyboard)).await?;
    Ok(Step::Next(state(CreateState::SingleConfirm)))
}

fn single_submit(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        args.cx.render(args.event, "🔄 Submitting entry...", None).await?;
        let fields = args.fields.as_create_mut()?;
        let product = fields
            .product
            .take()
            .ok_or(HandlerError::MissingSessionValue("product"))?;
        let price = fields.price.ok_or(HandlerError::MissingSessionValue("price"))?;
        let location = fields
            .location
            .take()
            .ok_or(HandlerError::MissingSessionValue("location"))?;
        let remark = fields.remark.take().unwrap_or_default();

        let record =
            EntryRecord::new(args.cx.submitted_by.clone(), product, price, location, remark);
        let outcome = if args.cx.store.is_ready() {
            args.cx.store.append(std::slice::from_ref(&record)).await
        } else {
            Err(StoreError::Unavailable)
        };

        let final_message = match outcome {
            Ok(()) => {
                info!(user = %args.cx.user, id = %record.id, "single entry submitted");
                format!("✅ Entry submitted successfully.\nID: {}", record.id)
            }
            Err(store_error) => {
                error!(user = %args.cx.user, error = %store_error, "single entry submission failed");
                "❌ Entry submission failed. Please contact an admin.".to_owned()
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

// --- Batch flow ---

fn choose_batch(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let keyboard =
            choice_keyboard(&catalog::LOCATIONS, payloads::CREATE_BATCH_LOCATION_PREFIX, 1);
        args.cx
            .render(
                args.event,
                "--- Batch Entry ---\nPlease select a common LOCATION for this batch:",
                Some(keyboard),
            )
            .await?;
        Ok(Step::Next(state(CreateState::BatchSelectLocation)))
    })
}

fn batch_location_chosen(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let slug = payloads::require_suffix(args.event, payloads::CREATE_BATCH_LOCATION_PREFIX)?;
        let location = catalog::location_from_slug(slug);
        let fields = args.fields.as_create_mut()?;
        fields.batch_location = Some(location.clone());
        args.cx
            .render(
                args.event,
                &format!(
                    "✅ Batch Location: {location}\n\n\
                     Now, please enter common remarks for this batch, or use /skip_remark_batch."
                ),
                None,
            )
            .await?;
        Ok(Step::Next(state(CreateState::BatchEnterRemark)))
    })
}

fn batch_remark_entered(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let remark = args.event.free_text().unwrap_or_default().to_owned();
        let fields = args.fields.as_create_mut()?;
        fields.batch_remark = Some(remark);
        args.cx.send("✅ Batch Remark set.", None).await?;
        show_product_checklist(args.cx, args.event, fields).await
    })
}

fn batch_skip_remark(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let fields = args.fields.as_create_mut()?;
        fields.batch_remark = Some(String::new());
        args.cx.send("✅ Batch Remark skipped.", None).await?;
        show_product_checklist(args.cx, args.event, fields).await
    })
}

/// Redraws the product checklist, two buttons per row, with a marker in
/// front of every selected product.
async fn show_product_checklist(
    cx: &StepContext,
    event: &InboundEvent,
    fields: &CreateFields,
) -> Result<Step, HandlerError> {
    let location = fields
        .batch_location
        .as_deref()
        .ok_or(HandlerError::MissingSessionValue("batch location"))?;

    let mut keyboard = Keyboard::new();
    let mut row = Vec::with_capacity(2);
    for product in catalog::PRODUCTS {
        let marker =
            if fields.selected_products.iter().any(|name| name == product) { "✅" } else { "☑️" };
        row.push(Button::new(
            format!("{marker} {product}"),
            format!("{}{}", payloads::CREATE_BATCH_TOGGLE_PREFIX, catalog::slug(product)),
        ));
        if row.len() == 2 {
            keyboard.push_row(std::mem::take(&mut row));
        }
    }
    if !row.is_empty() {
        keyboard.push_row(row);
    }
    keyboard.push_row(vec![Button::new(
        "➡️ Done Selecting Products",
        payloads::CREATE_BATCH_DONE,
    )]);

    let text = format!(
        "--- Batch Product Selection ---\nLocation: {location}\n\n\
         Select all products for this batch. You have selected {} product(s).\n\
         Click 'Done' when you are finished.",
        fields.selected_products.len()
    );
    cx.render(event, &text, Some(keyboard)).await?;
    Ok(Step::Next(state(CreateState::BatchToggleProducts)))
}

fn batch_toggle_product(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let slug = payloads::require_suffix(args.event, payloads::CREATE_BATCH_TOGGLE_PREFIX)?;
        let product = catalog::product_from_slug(slug);
        let fields = args.fields.as_create_mut()?;
        match fields.selected_products.iter().position(|name| *name == product) {
            Some(index) => {
                fields.selected_products.remove(index);
            }
            None => fields.selected_products.push(product),
        }
        show_product_checklist(args.cx, args.event, fields).await
    })
}

fn batch_products_done(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let fields = args.fields.as_create_mut()?;
        if fields.selected_products.is_empty() {
            args.cx
                .answer_alert("Please select at least one product before proceeding.")
                .await?;
            return Ok(Step::Next(state(CreateState::BatchToggleProducts)));
        }
        fields.price_queue = fields.selected_products.iter().cloned().collect();
        fields.batch_lines.clear();
        ask_next_batch_price(args.cx, args.event, fields).await
    })
}

/// Prompts for the price of the next queued product, or moves to the
/// confirmation summary once the queue is drained.
async fn ask_next_batch_price(
    cx: &StepContext,
    event: &InboundEvent,
    fields: &mut CreateFields,
) -> Result<Step, HandlerError> {
    let Some(product) = fields.price_queue.front().cloned() else {
        return show_batch_confirmation(cx, event, fields).await;
    };
    fields.awaiting_price_for = Some(product.clone());
    cx.render(event, &format!("Please enter the buying price for: *{product}*"), None).await?;
    Ok(Step::Next(state(CreateState::BatchEnterPrice)))
}

fn batch_price_entered(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let input = args.event.free_text().unwrap_or_default();
        let fields = args.fields.as_create_mut()?;
        let Ok(price) = parse_price(input) else {
            args.cx
                .render(
                    args.event,
                    "⚠️ Invalid price. Please enter a positive number (e.g., 120.50):",
                    None,
                )
                .await?;
            return Ok(Step::Next(state(CreateState::BatchEnterPrice)));
        };
        let product = fields
            .awaiting_price_for
            .take()
            .ok_or(HandlerError::MissingSessionValue("product awaiting a price"))?;
        fields.price_queue.pop_front();
        fields.batch_lines.push(BatchLine { product, price });
        ask_next_batch_price(args.cx, args.event, fields).await
    })
}

async fn show_batch_confirmation(
    cx: &StepContext,
    event: &InboundEvent,
    fields: &CreateFields,
) -> Result<Step, HandlerError> {
    let location = fields
        .batch_location
        .as_deref()
        .ok_or(HandlerError::MissingSessionValue("batch location"))?;
    let remark = fields.batch_remark.as_deref().unwrap_or_default();
    let remark_display = if remark.is_empty() { "None" } else { remark };

    let mut summary = vec![
        "--- Confirm Batch Submission ---".to_owned(),
        format!("**Location:** {location}"),
        format!("**Remark:** {remark_display}\n"),
        "**Products & Prices:**".to_owned(),
    ];
    for (index, line) in fields.batch_lines.iter().enumerate() {
        summary.push(format!("{}. {}: **{}**", index + 1, line.product, line.price));
    }
    summary.push("\nSubmit this batch to the sheet?".to_owned());

    let keyboard = Keyboard::new()
        .row(vec![Button::new("✅ Yes, Submit Batch", payloads::CREATE_BATCH_SUBMIT)])
        .row(vec![Button::new("❌ No, Cancel", payloads::CREATE_BATCH_CANCEL)]);
    cx.render(event, &summary.join("\n"), Some(keyboard)).await?;
    Ok(Step::Next(state(CreateState::BatchConfirm)))
}

fn batch_submit(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        args.cx
            .render(args.event, "🔄 Submitting batch entries... This may take a moment.", None)
            .await?;
        let fields = args.fields.as_create_mut()?;
        let location = fields
            .batch_location
            .take()
            .ok_or(HandlerError::MissingSessionValue("batch location"))?;
        let remark = fields.batch_remark.take().unwrap_or_default();
        let records: Vec<EntryRecord> = fields
            .batch_lines
            .drain(..)
            .map(|line| {
                EntryRecord::new(
                    args.cx.submitted_by.clone(),
                    line.product,
                    line.price,
                    location.clone(),
                    remark.clone(),
                )
            })
            .collect();

        let outcome = if args.cx.store.is_ready() {
            args.cx.store.append(&records).await
        } else {
            Err(StoreError::Unavailable)
        };

        let final_message = match outcome {
            Ok(()) => {
                info!(
                    user = %args.cx.user,
                    entries = records.len(),
                    "batch submitted"
                );
                format!("✅ Batch with {} entries submitted successfully.", records.len())
            }
            Err(store_error) => {
                error!(user = %args.cx.user, error = %store_error, "batch submission failed");
                "❌ Batch submission failed. Please contact an admin.".to_owned()
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
