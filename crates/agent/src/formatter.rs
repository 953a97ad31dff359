//! Result formatting.
//!
//! The model is unreliable at tabulating raw records and at remembering to
//! close with recommendations, so both are done here before the result
//! re-enters the conversation.

use caregaps_core::{ToolPayload, ToolResult};
use serde_json::{Map, Value};

/// Maximum characters kept per table cell.
pub const CELL_WIDTH: usize = 80;

pub const NO_RESULTS: &str = "No results found.";

/// Appended to every non-empty structured result.
pub const NEXT_ACTIONS_INSTRUCTION: &str = "[INSTRUCTION: After presenting this data, you MUST add a '### Next Best Actions:' section with 3-5 specific, actionable recommendations based on this data. Be concrete and clinical in your recommendations.]";

/// Text of the tool-result message for `result`.
///
/// Failures pass through untouched.
pub fn shape_result(result: &ToolResult) -> String {
    match result {
        ToolResult::Success { payload } => {
            let mut text = format_payload(payload);
            if payload.is_structured() && !payload.is_empty() {
                text.push_str("\n\n");
                text.push_str(NEXT_ACTIONS_INSTRUCTION);
            }
            text
        }
        ToolResult::Failure { message } => message.clone(),
    }
}

pub fn format_payload(payload: &ToolPayload) -> String {
    match payload {
        ToolPayload::Records(rows) if rows.is_empty() => NO_RESULTS.to_string(),
        ToolPayload::Records(rows) => format_table(rows),
        ToolPayload::List(items) if items.is_empty() => NO_RESULTS.to_string(),
        ToolPayload::List(items) => items
            .iter()
            .map(|item| format!("• {}", cell_text(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        ToolPayload::Record(record) => record
            .iter()
            .map(|(key, value)| format!("{}: {}", humanize(key), cell_text(value)))
            .collect::<Vec<_>>()
            .join("\n"),
        ToolPayload::Scalar(value) => cell_text(value),
    }
}

/// Markdown table over the first record's columns.
///
/// Layout: header, separator, one line per record, then a total line and a
/// recommendations prompt.
pub fn format_table(rows: &[Map<String, Value>]) -> String {
    let Some(first) = rows.first() else {
        return NO_RESULTS.to_string();
    };
    let columns: Vec<&String> = first.keys().collect();

    let mut lines = Vec::with_capacity(rows.len() + 5);
    lines.push(format!(
        "| {} |",
        columns
            .iter()
            .map(|c| humanize(c))
            .collect::<Vec<_>>()
            .join(" | ")
    ));
    lines.push(format!("|{}|", vec!["---"; columns.len()].join("|")));

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| match row.get(c.as_str()) {
                None | Some(Value::Null) => String::new(),
                Some(value) => truncate(&cell_text(value), CELL_WIDTH),
            })
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }

    lines.push(format!("\n**Total: {} results**", rows.len()));
    lines.push("\n### Next Best Actions:".to_string());
    lines.push("Please provide 3-5 specific action items based on this data.".to_string());
    lines.join("\n")
}

/// `open_gap_count` → `Open Gap Count`
///
/// Every letter that follows a non-letter is capitalized, every other
/// letter lowercased.
pub fn humanize(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut at_word_start = true;
    for c in field.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}
