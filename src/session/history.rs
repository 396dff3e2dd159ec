//! Conversation history reconciliation.
//!
//! DESIGN
//! ======
//! A history response replaces local state wholesale, except for local sends
//! the server has not seen yet. Those are re-appended after the server list
//! so an optimistic message is never lost to a reconnect-triggered refresh.
//!
//! A local entry counts as represented in the server list when a server
//! message carries its id or echoes it as `client_id`. When the server does
//! not echo correlation ids, a user message with identical content stands in
//! for it, each server message pairing with at most one local entry, newest
//! first. That fallback is an approximation: a lost resend of text that also
//! appears earlier in the conversation is treated as delivered.

use std::collections::VecDeque;

use events::ServerMessage;

use super::message::{ChatMessage, Role};

/// Outstanding history requests on the current connection, oldest first.
///
/// Responses on one ordered connection arrive in request order, so a
/// response that does not echo its context belongs to the front entry.
#[derive(Clone, Debug, Default)]
pub(crate) struct HistoryRequests {
    queue: VecDeque<String>,
}

impl HistoryRequests {
    pub(crate) fn push(&mut self, context_id: impl Into<String>) {
        self.queue.push_back(context_id.into());
    }

    /// Work out which context a response answers and retire its request.
    pub(crate) fn resolve(&mut self, echoed: Option<&str>) -> Option<String> {
        match echoed {
            Some(context_id) => {
                if let Some(pos) = self.queue.iter().position(|c| c == context_id) {
                    self.queue.remove(pos);
                }
                Some(context_id.to_owned())
            }
            None => self.queue.pop_front(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.queue.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Install `server` history, keeping local sends it does not account for.
pub(crate) fn merge_history(local: &[ChatMessage], server: &[ServerMessage]) -> Vec<ChatMessage> {
    let mut merged: Vec<ChatMessage> = server.iter().map(ChatMessage::from_server).collect();
    let mut claimed = vec![false; server.len()];

    let unconfirmed: Vec<&ChatMessage> = local.iter().filter(|m| m.is_unconfirmed()).collect();
    let mut keep = vec![true; unconfirmed.len()];

    for (i, entry) in unconfirmed.iter().enumerate() {
        if let Some(pos) = server
            .iter()
            .position(|s| s.id == entry.id || s.client_id.as_deref() == Some(entry.id.as_str()))
        {
            claimed[pos] = true;
            keep[i] = false;
        }
    }

    for (i, entry) in unconfirmed.iter().enumerate().rev() {
        if !keep[i] {
            continue;
        }
        let found = server.iter().enumerate().rev().find(|(pos, s)| {
            !claimed[*pos] && s.client_id.is_none() && s.role == Role::User && s.content == entry.content
        });
        if let Some((pos, _)) = found {
            claimed[pos] = true;
            keep[i] = false;
        }
    }

    merged.extend(
        unconfirmed
            .into_iter()
            .zip(keep)
            .filter_map(|(entry, keep)| keep.then(|| entry.clone())),
    );
    merged
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
