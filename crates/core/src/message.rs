//! Message, Query and SessionResult domain types.
//!
//! These are the value objects that flow through a run:
//! ingestion produces Messages and Queries → the engine groups messages by
//! session → every (session, query) pair produces one answer in a SessionResult.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered string-to-string map used for open column sets.
pub type FieldMap = IndexMap<String, String>;

/// Column names of the five required message fields, as they are addressed
/// by queries. Each field answers to its snake_case, spaced and compact
/// spelling.
const REQUIRED_FIELDS: [(RequiredField, [&str; 3]); 5] = [
    (
        RequiredField::MessageType,
        ["message_type", "message type", "messagetype"],
    ),
    (
        RequiredField::MessageContent,
        ["message_content", "message content", "messagecontent"],
    ),
    (
        RequiredField::SessionId,
        ["session_id", "session id", "sessionid"],
    ),
    (
        RequiredField::MessageDate,
        ["message_date", "message date", "messagedate"],
    ),
    (
        RequiredField::ParticipantIdentifier,
        [
            "participant_identifier",
            "participant identifier",
            "participantidentifier",
        ],
    ),
];

#[derive(Debug, Clone, Copy)]
enum RequiredField {
    MessageType,
    MessageContent,
    SessionId,
    MessageDate,
    ParticipantIdentifier,
}

/// A single row of the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_type: String,
    pub message_content: String,
    pub session_id: String,
    pub message_date: String,
    pub participant_identifier: String,

    /// Additional columns discovered at ingestion, keyed by lowercased
    /// column name.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extra: FieldMap,
}

impl Message {
    /// Create a message with the five required fields and no extra columns.
    pub fn new(
        session_id: impl Into<String>,
        message_type: impl Into<String>,
        message_content: impl Into<String>,
        message_date: impl Into<String>,
        participant_identifier: impl Into<String>,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            message_content: message_content.into(),
            session_id: session_id.into(),
            message_date: message_date.into(),
            participant_identifier: participant_identifier.into(),
            extra: FieldMap::new(),
        }
    }

    /// Attach an extra column (builder style). The key is lowercased.
    pub fn with_field(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.extra.insert(key.as_ref().to_lowercase(), value.into());
        self
    }

    /// Look up a field by column name, case-insensitively.
    ///
    /// Required fields are checked first, then the extra columns in
    /// insertion order.
    pub fn field(&self, column: &str) -> Option<&str> {
        let wanted = column.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }

        for (field, aliases) in &REQUIRED_FIELDS {
            if aliases.contains(&wanted.as_str()) {
                return Some(self.required(*field));
            }
        }

        self.extra
            .iter()
            .find(|(key, _)| key.to_lowercase() == wanted)
            .map(|(_, value)| value.as_str())
    }

    fn required(&self, field: RequiredField) -> &str {
        match field {
            RequiredField::MessageType => &self.message_type,
            RequiredField::MessageContent => &self.message_content,
            RequiredField::SessionId => &self.session_id,
            RequiredField::MessageDate => &self.message_date,
            RequiredField::ParticipantIdentifier => &self.participant_identifier,
        }
    }
}

/// An analytical question asked of every session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Unique per run; used as the output column key.
    pub name: String,

    /// Free-text question sent to the completion service.
    pub description: String,

    /// Optional instruction describing the expected answer shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
}

impl Query {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            output_format: None,
        }
    }

    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = Some(format.into());
        self
    }

    /// The output format, if one is set and not blank.
    pub fn output_format(&self) -> Option<&str> {
        self.output_format
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
    }
}

/// One aggregated output row: a session plus one answer per query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_id: String,

    /// `message_date` of the session's first message in arrival order.
    #[serde(rename = "Start date")]
    pub start_date: String,

    /// Query name → answer, extracted value, or error placeholder.
    #[serde(flatten)]
    pub answers: FieldMap,
}

impl SessionResult {
    pub fn new(session_id: impl Into<String>, start_date: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            start_date: start_date.into(),
            answers: FieldMap::new(),
        }
    }

    /// Record the answer for a query, replacing any earlier value.
    pub fn set_answer(&mut self, query_name: impl Into<String>, value: impl Into<String>) {
        self.answers.insert(query_name.into(), value.into());
    }

    pub fn answer(&self, query_name: &str) -> Option<&str> {
        self.answers.get(query_name).map(String::as_str)
    }
}
