//! Fixed-width summary rendering and chat markup escaping.
//!
//! Summaries are monospace receipts inside a fenced `text` block, sent
//! with MarkdownV2 parse mode. Rendering is pure and never fails.

use crate::schema::ExpenseRecord;
use crate::transport::{InlineButton, InlineKeyboard};

const WIDTH: usize = 36;
const ITEM_WIDTH: usize = WIDTH - 18;

/// MarkdownV2 special characters. Each occurrence in a user-supplied
/// field gets a leading backslash.
const MARKUP_SPECIALS: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Callback payload for the confirm button on a summary.
pub const CALLBACK_CONFIRM: &str = "expense_ok";
/// Callback payload for the edit button on a summary.
pub const CALLBACK_EDIT: &str = "expense_edit";

/// The confirm/edit keyboard attached to every pending-record summary.
pub fn confirm_keyboard() -> InlineKeyboard {
    InlineKeyboard::single_row(vec![
        InlineButton::new("✅ OK", CALLBACK_CONFIRM),
        InlineButton::new("✏️ Edit", CALLBACK_EDIT),
    ])
}

/// Backslash-escape every MarkdownV2 special character.
pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if MARKUP_SPECIALS.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Render a pending record as a 36-column receipt. Item names are
/// truncated to the item column; merchant and item names are escaped.
pub fn render_summary(record: &ExpenseRecord) -> String {
    let ruler = "=".repeat(WIDTH);
    let mut lines: Vec<String> = Vec::new();

    lines.push(ruler.clone());
    lines.push(format!("* {} *", escape_markup(&record.merchant)));
    lines.push(format!(
        "{} {:>pad$}",
        record.date.format("%Y-%m-%d"),
        record.category.as_str(),
        pad = WIDTH - 11
    ));
    lines.push(ruler.clone());

    for (i, item) in record.items.iter().enumerate() {
        let name: String = escape_markup(&item.name).chars().take(ITEM_WIDTH).collect();
        lines.push(format!(
            "{:>2}. {:<name_pad$} {:>2} x {:>7}",
            i + 1,
            name,
            item.quantity,
            format!("{:.2}", item.price),
            name_pad = ITEM_WIDTH
        ));
    }

    lines.push(ruler.clone());
    if !record.tax.is_zero() {
        lines.push(format!(
            "Tax:{:>pad$}",
            format!("{:.2}", record.tax),
            pad = WIDTH - 4
        ));
    }
    lines.push(format!(
        "Total:{:>pad$}",
        format!("{:.2}", record.total),
        pad = WIDTH - 6
    ));
    lines.push(ruler);
    lines.push(String::new());

    format!("```text\n{}\n```", lines.join("\n"))
}
