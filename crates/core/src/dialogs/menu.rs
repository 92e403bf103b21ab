//! Main menu, the shared post-action navigation, and the fallbacks every
//! dialog graph registers.

use tracing::{info, warn};

use crate::outbound::{Button, Keyboard, TransportError};

use super::event::InboundEvent;
use super::graph::{Step, StepArgs, StepContext, StepFuture};
use super::payloads;
use super::state::DialogId;

pub const MAIN_MENU_TEXT: &str = "Welcome! Select an option:";
pub const POST_ACTION_PROMPT: &str = "What would you like to do next?";

pub fn main_menu_keyboard() -> Keyboard {
    Keyboard::new()
        .row(vec![Button::new("➕ New Entry", payloads::MENU_NEW)])
        .row(vec![Button::new("✏️ Update Entry", payloads::MENU_UPDATE)])
        .row(vec![Button::new("🗑️ Delete Entry", payloads::MENU_DELETE)])
        .row(vec![Button::new("👁️ View Entries", payloads::MENU_VIEW)])
        .row(vec![Button::new("📊 Price Insights", payloads::MENU_INSIGHTS)])
}

/// Navigation shown under every terminal message of a dialog.
pub fn post_action_keyboard() -> Keyboard {
    Keyboard::new().row(vec![
        Button::new("➕ New Entry", payloads::MENU_NEW),
        Button::new("📋 Main Menu", payloads::MENU_MAIN),
    ])
}

/// Shared `/cancel` fallback: ends the dialog and offers navigation.
pub fn cancel_dialog(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        info!(user = %args.cx.user, "dialog canceled by user");
        args.cx
            .render(
                args.event,
                &format!("Operation canceled. {POST_ACTION_PROMPT}"),
                Some(post_action_keyboard()),
            )
            .await?;
        Ok(Step::End)
    })
}

/// Catch-all button fallback. Post-action keyboards outlive their dialog,
/// so "new entry" and "main menu" presses can arrive while any session is
/// active; everything else ends the dialog silently.
pub fn post_action_navigation(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        match args.event.button_data() {
            Some(payloads::MENU_MAIN) => {
                args.cx.render(args.event, MAIN_MENU_TEXT, Some(main_menu_keyboard())).await?;
                Ok(Step::End)
            }
            Some(payloads::MENU_NEW) => Ok(Step::Handoff(DialogId::Create)),
            other => {
                warn!(
                    user = %args.cx.user,
                    payload = other.unwrap_or_default(),
                    "unrecognized button press ended the dialog"
                );
                Ok(Step::End)
            }
        }
    })
}

/// Whether an event is one of the global menu triggers handled outside
/// any dialog: `/start`, `/help`, `/menu`, or the start-menu button.
pub fn is_global_menu_trigger(event: &InboundEvent) -> bool {
    matches!(event.command(), Some("start" | "help" | "menu"))
        || event.button_data() == Some(payloads::OPEN_MENU_FROM_START)
}

pub async fn render_main_menu(
    cx: &StepContext,
    event: &InboundEvent,
) -> Result<(), TransportError> {
    cx.render(event, MAIN_MENU_TEXT, Some(main_menu_keyboard())).await
}
