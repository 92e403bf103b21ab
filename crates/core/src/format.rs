//! Text helpers for everything the dialogs render.

use crate::domain::{Column, EntryRecord};

/// Characters Telegram's MarkdownV2 dialect requires escaping.
const RESERVED: &str = r"_*[]()~`>#+-=|{}.!";

pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if RESERVED.contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Title-cases a string: every alphabetic character that follows a
/// non-alphabetic one (or starts the string) is uppercased, the rest are
/// lowercased. `"chilly green (elfora)"` becomes `"Chilly Green (Elfora)"`.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

/// Turns an internal slug like `beet_root` into `Beet Root`.
pub fn display_name(raw: &str) -> String {
    title_case(&raw.replace('_', " "))
}

/// Strips everything but letters, digits, and spaces, collapses runs of
/// whitespace, and title-cases the result. Used to normalize free-form
/// sheet values before grouping them.
pub fn clean_display_text(raw: &str) -> String {
    let kept: String =
        raw.chars().filter(|ch| ch.is_alphanumeric() || ch.is_whitespace()).collect();
    title_case(&kept).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Shortens checklist values so button labels stay readable.
pub fn truncate_value(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_owned();
    }
    let head: String = value.chars().take(max_chars).collect();
    format!("{head}...")
}

/// Renders one record as an indented MarkdownV2 detail block.
pub fn entry_details_markdown(record: &EntryRecord, title: &str) -> String {
    let mut parts = Vec::with_capacity(Column::ORDER.len() + 1);
    if !title.is_empty() {
        parts.push(format!("*{}:*", escape_markdown(title)));
    }
    for column in Column::ORDER {
        let header = escape_markdown(&display_name(column.header()));
        let value = escape_markdown(&record.cell(column));
        parts.push(format!("  *{header}:* `{value}`"));
    }
    parts.join("\n")
}
