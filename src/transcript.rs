use chrono::{ DateTime, Utc };

use crate::models::chat::{ ChatTurn, Role };

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Assistant => "Assistant",
    }
}

/// Plain-text rendering of a conversation, a deterministic function of
/// (turns, model, token total, export timestamp).
pub fn render_plain(
    turns: &[ChatTurn],
    model: &str,
    total_tokens: u64,
    exported_at: DateTime<Utc>
) -> String {
    let mut out = String::from("Chat export\n");
    out.push_str(&format!("Date: {}\n", exported_at.format("%Y-%m-%d %H:%M")));
    out.push_str(&format!("Model: {}\n", model));
    out.push_str(&format!("Messages: {}\n", turns.len()));
    out.push_str(&format!("Tokens used: {}\n", total_tokens));
    out.push_str(&format!("{}\n\n", "=".repeat(60)));

    for (index, turn) in turns.iter().enumerate() {
        let time = turn.timestamp
            .map(|stamp| format!(" ({})", stamp.format("%H:%M:%S")))
            .unwrap_or_default();
        out.push_str(&format!("[{}] {}{}:\n", index + 1, role_label(turn.role), time));
        out.push_str(&format!("{}\n\n", turn.content));
        out.push_str(&format!("{}\n\n", "-".repeat(60)));
    }

    out
}

/// Headered markdown rendering of the same conversation.
pub fn render_markdown(
    turns: &[ChatTurn],
    model: &str,
    total_tokens: u64,
    exported_at: DateTime<Utc>
) -> String {
    let mut out = String::from("# Chat export\n\n");
    out.push_str(&format!("**Date:** {}  \n", exported_at.format("%Y-%m-%d %H:%M")));
    out.push_str(&format!("**Model:** {}  \n", model));
    out.push_str(&format!("**Messages:** {}  \n", turns.len()));
    out.push_str(&format!("**Tokens used:** {}  \n\n", total_tokens));
    out.push_str("---\n\n");

    for turn in turns {
        let time = turn.timestamp
            .map(|stamp| format!(" _({})_", stamp.format("%H:%M:%S")))
            .unwrap_or_default();
        out.push_str(&format!("## {}{}\n\n", role_label(turn.role), time));
        out.push_str(&format!("{}\n\n", turn.content));
        out.push_str("---\n\n");
    }

    out
}
