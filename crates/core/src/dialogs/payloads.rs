//! Callback-payload grammar. Prefixed payloads carry a suffix (an item
//! slug or a page index); everything else matches exactly.

use super::event::InboundEvent;
use super::graph::HandlerError;

// Main menu navigation.
pub const MENU_NEW: &str = "menu_nav_new";
pub const MENU_UPDATE: &str = "menu_nav_update";
pub const MENU_DELETE: &str = "menu_nav_delete";
pub const MENU_VIEW: &str = "menu_nav_view";
pub const MENU_INSIGHTS: &str = "menu_nav_insights";
pub const MENU_MAIN: &str = "menu_nav_menu";
pub const OPEN_MENU_FROM_START: &str = "menu_open_from_start";

// Create dialog.
pub const CREATE_CHOOSE_SINGLE: &str = "create_choose_single";
pub const CREATE_CHOOSE_BATCH: &str = "create_choose_batch";
pub const CREATE_CANCEL_ALL: &str = "create_op_cancel_all";
pub const CREATE_BATCH_LOCATION_PREFIX: &str = "create_b_loc_";
pub const CREATE_BATCH_TOGGLE_PREFIX: &str = "create_b_prod_toggle_";
pub const CREATE_BATCH_DONE: &str = "create_b_prod_done";
pub const CREATE_BATCH_SUBMIT: &str = "create_b_submit_final";
pub const CREATE_BATCH_CANCEL: &str = "create_b_cancel_conf";
pub const CREATE_SINGLE_PRODUCT_PREFIX: &str = "create_s_prod_";
pub const CREATE_SINGLE_LOCATION_PREFIX: &str = "create_s_loc_";
pub const CREATE_SINGLE_SUBMIT: &str = "create_s_submit_final";
pub const CREATE_SINGLE_CANCEL: &str = "create_s_cancel_conf";

// Update dialog.
pub const UPDATE_FIELD_TOGGLE_PREFIX: &str = "update_field_";
pub const UPDATE_PROCEED: &str = "update_proceed_sel";
pub const UPDATE_CANCEL_SELECTION: &str = "update_cancel_sel";
pub const UPDATE_NEW_PRODUCT_PREFIX: &str = "update_val_prod_";
pub const UPDATE_NEW_LOCATION_PREFIX: &str = "update_val_loc_";
pub const UPDATE_EXECUTE: &str = "update_execute_now";
pub const UPDATE_CANCEL_FINAL: &str = "update_cancel_final";

// Delete dialog.
pub const DELETE_YES: &str = "delete_do_yes";
pub const DELETE_NO: &str = "delete_do_no";

// Read dialog. `view_last_` carries a zero-based page index.
pub const VIEW_LAST_PREFIX: &str = "view_last_";
pub const VIEW_BY_ID: &str = "view_by_id_ask";
pub const VIEW_CANCEL: &str = "view_op_cancel";
pub const VIEW_BACK_TO_OPTIONS: &str = "view_back_to_main_menu";

// Insights dialog.
pub const INSIGHTS_PREFIX: &str = "insights_action_";
pub const INSIGHTS_BY_PRODUCT: &str = "insights_action_by_product";
pub const INSIGHTS_BY_LOCATION: &str = "insights_action_by_location";
pub const INSIGHTS_BY_PRODUCT_LOCATION: &str = "insights_action_by_prod_loc";
pub const INSIGHTS_CANCEL: &str = "insights_action_cancel";

/// Page payload for the read dialog.
pub fn view_page(page: usize) -> String {
    format!("{VIEW_LAST_PREFIX}{page}")
}

/// Suffix of a prefixed payload.
pub fn suffix<'a>(data: &'a str, prefix: &str) -> Option<&'a str> {
    data.strip_prefix(prefix)
}

/// Suffix of a prefixed payload carried by a button event. The routing
/// matcher already checked the prefix, so a miss is a handler bug.
pub fn require_suffix<'a>(
    event: &'a InboundEvent,
    prefix: &'static str,
) -> Result<&'a str, HandlerError> {
    event
        .button_data()
        .and_then(|data| suffix(data, prefix))
        .ok_or(HandlerError::BadPayload(prefix))
}
