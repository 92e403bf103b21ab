//! Insights dialog: one menu, three grouped average-price reports.

use tracing::{error, info};

use crate::format::escape_markdown;
use crate::insights::{average_prices, clean_records, split_composite_key, GroupBy};
use crate::outbound::{Button, Keyboard, MESSAGE_LIMIT};
use crate::store::StoreError;

use super::event::EventMatcher;
use super::graph::{StateGraph, Step, StepArgs, StepFuture};
use super::menu::{self, post_action_keyboard, POST_ACTION_PROMPT};
use super::payloads;
use super::state::{DialogFields, DialogId, DialogState, InsightsState};

pub fn graph() -> StateGraph {
    use EventMatcher::{AnyButton, Command, Exact, Prefix};

    StateGraph::builder(DialogId::Insights, || DialogFields::for_dialog(DialogId::Insights))
        .entry(Command("insights"), start)
        .entry(Exact(payloads::MENU_INSIGHTS), start)
        // The cancel payload shares the prefix, so it has to be routed
        // before the prefix matcher.
        .on(
            DialogState::Insights(InsightsState::MenuDisplayed),
            Exact(payloads::INSIGHTS_CANCEL),
            cancel_insights,
        )
        .on(
            DialogState::Insights(InsightsState::MenuDisplayed),
            Prefix(payloads::INSIGHTS_PREFIX),
            run_insight,
        )
        .fallback(Command("cancel"), menu::cancel_dialog)
        .fallback(Exact(payloads::INSIGHTS_CANCEL), cancel_insights)
        .fallback(AnyButton, menu::post_action_navigation)
        .build()
}

fn start(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let keyboard = Keyboard::new()
            .row(vec![Button::new("📊 Avg Price by Product", payloads::INSIGHTS_BY_PRODUCT)])
            .row(vec![Button::new("📍 Avg Price by Location", payloads::INSIGHTS_BY_LOCATION)])
            .row(vec![Button::new(
                "📈 Avg Price by Product & Location",
                payloads::INSIGHTS_BY_PRODUCT_LOCATION,
            )])
            .row(vec![Button::new("❌ Cancel Insights", payloads::INSIGHTS_CANCEL)]);
        args.cx
            .render(
                args.event,
                "📈 *Price Insights Menu:*\nSelect the type of insight you want to see\\.",
                Some(keyboard),
            )
            .await?;
        Ok(Step::Next(DialogState::Insights(InsightsState::MenuDisplayed)))
    })
}

fn run_insight(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        let action = payloads::require_suffix(args.event, payloads::INSIGHTS_PREFIX)?;
        let group_by = match action {
            "by_product" => GroupBy::Product,
            "by_location" => GroupBy::Location,
            "by_prod_loc" => GroupBy::ProductLocation,
            other => {
                info!(user = %args.cx.user, action = other, "unknown insight selection");
                args.cx
                    .render(
                        args.event,
                        &escape_markdown("⚠️ Invalid insight selection. Please try again."),
                        None,
                    )
                    .await?;
                return Ok(Step::Next(DialogState::Insights(InsightsState::MenuDisplayed)));
            }
        };

        args.cx
            .render(
                args.event,
                &escape_markdown("🔄 Calculating insights, please wait..."),
                None,
            )
            .await?;

        let fetched = if args.cx.store.is_ready() {
            args.cx.store.get_all().await
        } else {
            Err(StoreError::Unavailable)
        };
        let records = match fetched {
            Ok(records) => records,
            Err(store_error) => {
                error!(user = %args.cx.user, error = %store_error, "failed to load insight data");
                args.cx
                    .render(
                        args.event,
                        &format!(
                            "❌ Could not load data for insights. Please try again later.\
                             \n\n{POST_ACTION_PROMPT}"
                        ),
                        Some(post_action_keyboard()),
                    )
                    .await?;
                return Ok(Step::End);
            }
        };

        let cleaned = clean_records(&records);
        if cleaned.is_empty() {
            args.cx
                .render(
                    args.event,
                    &format!("ℹ️ No data available for insights.\n\n{POST_ACTION_PROMPT}"),
                    Some(post_action_keyboard()),
                )
                .await?;
            return Ok(Step::End);
        }

        let averages = average_prices(&cleaned, group_by);
        let mut parts = vec!["*Average Price Insights:*\n".to_owned()];
        match group_by {
            GroupBy::Product => {
                for (product, stats) in &averages {
                    parts.push(format!(
                        "  📦 *{}:* `{:.2}` \\(from {} entries\\)",
                        escape_markdown(product),
                        stats.average,
                        stats.count
                    ));
                }
            }
            GroupBy::Location => {
                for (location, stats) in &averages {
                    parts.push(format!(
                        "  📍 *{}:* `{:.2}` \\(from {} entries\\)",
                        escape_markdown(location),
                        stats.average,
                        stats.count
                    ));
                }
            }
            GroupBy::ProductLocation => {
                let mut last_product = None;
                for (key, stats) in &averages {
                    let (product, location) = split_composite_key(key);
                    if last_product != Some(product) {
                        parts.push(format!("\n  📦 *{}:*", escape_markdown(product)));
                        last_product = Some(product);
                    }
                    parts.push(format!(
                        "    📍 _{}:_ `{:.2}` \\({} entries\\)",
                        escape_markdown(location),
                        stats.average,
                        stats.count
                    ));
                }
            }
        }

        let mut result = parts.join("\n");
        result.push_str(&format!("\n\n{POST_ACTION_PROMPT}"));
        if result.len() > MESSAGE_LIMIT {
            result = escape_markdown(&format!(
                "📊 Insights generated successfully, but the result is too long to display \
                 directly.\n\n{POST_ACTION_PROMPT}"
            ));
        }
        args.cx.render(args.event, &result, Some(post_action_keyboard())).await?;
        Ok(Step::End)
    })
}

fn cancel_insights(args: StepArgs<'_>) -> StepFuture<'_> {
    Box::pin(async move {
        info!(user = %args.cx.user, "insights dialog canceled");
        args.cx
            .render(
                args.event,
                &format!("Insights operation canceled.\n\n{POST_ACTION_PROMPT}"),
                Some(post_action_keyboard()),
            )
            .await?;
        Ok(Step::End)
    })
}
