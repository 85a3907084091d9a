//! Prompt construction for one (session, query) pair.
//!
//! The transcript carries only four fields per message (type, participant,
//! date, content) to bound payload size. Field values are sanitized before
//! the line structure is added, so the transcript keeps its newlines.

use crate::grouper::SessionGroup;
use convoquery_config::PromptConfig;
use convoquery_core::message::{Message, Query};
use convoquery_core::provider::PromptMessage;
use convoquery_core::sanitize::{sanitize, truncate_with_marker};

/// Appended wherever content or the transcript was cut.
pub const TRUNCATION_MARKER: &str = "...[truncated]";

/// Builds transcripts and the system/user prompt pair.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    max_content_chars: usize,
    max_transcript_chars: usize,
    default_output_format: String,
}

impl PromptBuilder {
    pub fn new(config: &PromptConfig) -> Self {
        Self {
            max_content_chars: config.max_content_chars,
            max_transcript_chars: config.max_transcript_chars,
            default_output_format: sanitize(&config.default_output_format),
        }
    }

    /// One line per message, length-bounded per message and overall.
    pub fn transcript(&self, session: &SessionGroup) -> String {
        let lines: Vec<String> = session
            .messages
            .iter()
            .map(|m| self.transcript_line(m))
            .collect();

        truncate_with_marker(
            &lines.join("\n"),
            self.max_transcript_chars,
            TRUNCATION_MARKER,
        )
    }

    fn transcript_line(&self, message: &Message) -> String {
        let content = truncate_with_marker(
            &sanitize(&message.message_content),
            self.max_content_chars,
            TRUNCATION_MARKER,
        );

        let mut line = format!(
            "[{}] {}",
            sanitize(&message.message_date),
            sanitize(&message.message_type)
        );
        let participant = sanitize(&message.participant_identifier);
        if !participant.trim().is_empty() {
            line.push_str(&format!(" ({})", participant.trim()));
        }
        line.push_str(": ");
        line.push_str(&content);
        line
    }

    /// The output-format instruction for `query`.
    pub fn output_instruction(&self, query: &Query) -> String {
        query
            .output_format()
            .map(sanitize)
            .unwrap_or_else(|| self.default_output_format.clone())
    }

    /// System + user prompt for one (session, query) pair.
    pub fn build(&self, session: &SessionGroup, query: &Query) -> Vec<PromptMessage> {
        let description = sanitize(&query.description);
        let session_id = sanitize(&session.session_id);

        let system = format!(
            "You analyze a single conversation session and answer one question about it.\n\
             Question: {description}\n\
             Session ID: {session_id}\n\
             If your answer refers to the session, use the session ID exactly as given above; never invent or alter one.\n\
             Output format: {}",
            self.output_instruction(query),
        );

        let user = format!(
            "Conversation transcript:\n{}\n\nBased on this transcript, answer the question: {description}",
            self.transcript(session),
        );

        vec![PromptMessage::system(system), PromptMessage::user(user)]
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(&PromptConfig::default())
    }
}
