//! Direct extraction. Answers "read this column" queries from the messages
//! themselves instead of asking the completion service.
//!
//! A query is a candidate when its description mentions one of the
//! extraction phrases, or when its name or description mentions the
//! participant identifier. The target column is the first quoted text in the
//! description; the participant identifier is the fallback target.

use crate::grouper::SessionGroup;
use convoquery_core::message::Query;
use regex_lite::Regex;
use std::sync::LazyLock;

const EXTRACTION_PHRASES: [&str; 3] = ["extract column", "get column", "pull column"];
const PARTICIPANT_COLUMN: &str = "participant identifier";

/// First `"double"` or `'single'` quoted substring.
static QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""([^"]*)"|'([^']*)'"#).expect("quoted-text pattern is valid")
});

/// What a candidate query wants to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionTarget {
    /// Lowercased column name; empty when the query gave none.
    pub column: String,
}

/// Decide whether `query` is a direct-extraction candidate and, if so,
/// which column it targets.
pub fn target_for(query: &Query) -> Option<ExtractionTarget> {
    let description = query.description.to_lowercase();
    let name = query.name.to_lowercase();

    let asks_for_column = EXTRACTION_PHRASES.iter().any(|p| description.contains(p));
    let mentions_participant =
        description.contains(PARTICIPANT_COLUMN) || name.contains(PARTICIPANT_COLUMN);

    if !asks_for_column && !mentions_participant {
        return None;
    }

    let column = match first_quoted(&query.description) {
        Some(quoted) => quoted.to_lowercase(),
        None if mentions_participant => PARTICIPANT_COLUMN.to_string(),
        None => String::new(),
    };

    Some(ExtractionTarget { column })
}

fn first_quoted(text: &str) -> Option<&str> {
    let caps = QUOTED.captures(text)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

/// Try to answer `query` for `session` without a remote call.
///
/// Returns the first non-blank value of the target column across the
/// session's messages in order, trimmed. The participant identifier is a
/// required message field, so it is read like any other column. `None`
/// means "no match" and sends the pair to the completion service.
pub fn resolve(query: &Query, session: &SessionGroup) -> Option<String> {
    let target = target_for(query)?;
    let column = target.column.trim();
    if column.is_empty() {
        return None;
    }

    session
        .messages
        .iter()
        .filter_map(|m| m.field(column))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}
