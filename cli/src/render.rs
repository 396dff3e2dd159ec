//! Text rendering of snapshot changes.
//!
//! The terminal is append-only, so instead of redrawing the conversation we
//! print what changed between two consecutive snapshots.

use tutorchat::ChatSnapshot;
use tutorchat::session::connection::{ConnectionState, ConnectionStatus};
use tutorchat::session::message::{ChatMessage, DeliveryState, Role};

/// Lines describing everything that changed from `prev` to `next`.
#[must_use]
pub fn render_changes(prev: &ChatSnapshot, next: &ChatSnapshot) -> Vec<String> {
    let mut lines = Vec::new();

    if prev.context.context_id != next.context.context_id {
        let context = next.context.context_id.as_deref().unwrap_or("(none)");
        lines.push(format!("[context] {context}"));
    }
    if prev.connection != next.connection {
        lines.push(render_connection(&next.connection));
    }

    for (idx, message) in next.messages.iter().enumerate() {
        match prev.messages.iter().find(|m| m.id == message.id) {
            Some(before) if before.delivery == message.delivery => {}
            Some(_) => lines.push(render_delivery(message)),
            // An optimistic entry confirmed in place keeps its slot but
            // takes the server id.
            None if replaced_in_place(prev.messages.get(idx), message) => lines.push(render_delivery(message)),
            None => lines.push(render_message(message)),
        }
    }

    if !prev.is_typing && next.is_typing {
        lines.push("[tutor is typing...]".to_owned());
    }
    if prev.last_error != next.last_error {
        if let Some(notice) = &next.last_error {
            lines.push(format!("[notice] {} (/dismiss to clear)", notice.message));
        }
    }
    if prev.usage_limits != next.usage_limits {
        if let Some(limits) = &next.usage_limits {
            if let (Some(used), Some(limit)) = (limits.messages_used, limits.messages_limit) {
                lines.push(format!("[usage] {used}/{limit} messages"));
            }
        }
    }

    lines
}

#[must_use]
pub fn render_connection(connection: &ConnectionState) -> String {
    let status = match connection.status {
        ConnectionStatus::Disconnected => "disconnected".to_owned(),
        ConnectionStatus::Connecting if connection.attempt > 0 => {
            format!("reconnecting (attempt {})", connection.attempt)
        }
        ConnectionStatus::Connecting => "connecting".to_owned(),
        ConnectionStatus::Connected => "connected".to_owned(),
        ConnectionStatus::Error => "error".to_owned(),
    };
    let mut line = format!("[status] {status}");
    if connection.status == ConnectionStatus::Error {
        if let Some(error) = &connection.error {
            line.push_str(": ");
            line.push_str(error);
        }
        if connection.retry_available {
            line.push_str(" (/reconnect to try again)");
        }
    }
    line
}

#[must_use]
pub fn render_message(message: &ChatMessage) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "tutor",
    };
    let marker = match message.delivery {
        DeliveryState::Pending => " (sending)",
        DeliveryState::Sent => "",
        DeliveryState::Failed => " (failed)",
    };
    format!("{speaker}{marker}: {}", message.content)
}

fn render_delivery(message: &ChatMessage) -> String {
    match message.delivery {
        DeliveryState::Pending => format!("[sending] {}", message.id),
        DeliveryState::Sent => format!("[sent] {}", message.id),
        DeliveryState::Failed => format!(
            "[failed] {}: {} (/retry {})",
            message.id,
            message.error_detail.as_deref().unwrap_or("unknown error"),
            message.id
        ),
    }
}

fn replaced_in_place(before: Option<&ChatMessage>, after: &ChatMessage) -> bool {
    before.is_some_and(|b| b.is_unconfirmed() && b.role == after.role && b.content == after.content)
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
