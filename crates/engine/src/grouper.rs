//! Session grouping by session id.
//!
//! First-seen order is kept for sessions and for messages inside a session.
//! Nothing is sorted: a session's start date is whatever its first row says.

use convoquery_core::message::Message;
use indexmap::IndexMap;

/// One session and its messages in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGroup {
    pub session_id: String,
    pub messages: Vec<Message>,
}

impl SessionGroup {
    /// `message_date` of the first message in arrival order, or `""` for an
    /// empty group. Not validated and not the chronological minimum.
    pub fn start_date(&self) -> &str {
        self.messages
            .first()
            .map(|m| m.message_date.as_str())
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Group messages by `session_id`.
pub fn group_sessions(messages: impl IntoIterator<Item = Message>) -> Vec<SessionGroup> {
    let mut groups: IndexMap<String, Vec<Message>> = IndexMap::new();
    for message in messages {
        groups
            .entry(message.session_id.clone())
            .or_default()
            .push(message);
    }

    groups
        .into_iter()
        .map(|(session_id, messages)| SessionGroup {
            session_id,
            messages,
        })
        .collect()
}
