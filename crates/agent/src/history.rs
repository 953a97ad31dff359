//! History truncation.

use caregaps_core::{HistoryPolicy, Message, Role};

/// Cut `messages` down to the leading system message (if any) plus the
/// trailing window, when the list is longer than the policy threshold.
pub fn truncate(messages: Vec<Message>, policy: HistoryPolicy) -> Vec<Message> {
    let before = messages.len();
    if before <= policy.threshold {
        return messages;
    }

    let tail_start = before.saturating_sub(policy.window);
    let keep_system = tail_start > 0 && messages.first().is_some_and(|m| m.role == Role::System);

    let kept: Vec<Message> = messages
        .into_iter()
        .enumerate()
        .filter(|(i, _)| (*i == 0 && keep_system) || *i >= tail_start)
        .map(|(_, m)| m)
        .collect();

    tracing::debug!(before, after = kept.len(), "Truncated conversation history");
    kept
}
