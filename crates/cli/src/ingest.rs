//! Reading the message and query tables from delimited files.
//!
//! Header names are matched loosely: case, spaces and underscores are
//! ignored, so `Session ID`, `session_id` and `SessionId` are the same
//! column. Cell values are kept verbatim.

use convoquery_core::message::{Message, Query};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Cannot read {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Malformed table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("Delimiter '{0}' is not a single ASCII character")]
    Delimiter(char),
}

const MESSAGE_COLUMNS: [&str; 5] = [
    "Message Type",
    "Message Content",
    "Session ID",
    "Message Date",
    "Participant Identifier",
];

/// Lowercase and drop spaces and underscores.
fn normalize(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn reader<R: Read>(input: R, delimiter: char) -> Result<csv::Reader<R>, IngestError> {
    let delimiter = u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or(IngestError::Delimiter(delimiter))?;

    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(input))
}

fn open(path: &Path) -> Result<std::fs::File, IngestError> {
    std::fs::File::open(path).map_err(|e| IngestError::Open {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

fn find_column(headers: &csv::StringRecord, name: &'static str) -> Result<usize, IngestError> {
    let wanted = normalize(name);
    headers
        .iter()
        .position(|h| normalize(h) == wanted)
        .ok_or(IngestError::MissingColumn(name))
}

fn is_blank(record: &csv::StringRecord) -> bool {
    record.iter().all(|v| v.trim().is_empty())
}

pub fn read_messages(path: &Path, delimiter: char) -> Result<Vec<Message>, IngestError> {
    parse_messages(open(path)?, delimiter)
}

pub fn read_queries(path: &Path, delimiter: char) -> Result<Vec<Query>, IngestError> {
    parse_queries(open(path)?, delimiter)
}

/// Parse the message table. All five required columns must be present;
/// every other column is kept as a lowercased extra field.
pub fn parse_messages<R: Read>(input: R, delimiter: char) -> Result<Vec<Message>, IngestError> {
    let mut rdr = reader(input, delimiter)?;
    let headers = rdr.headers()?.clone();

    let mut required = [0usize; 5];
    for (slot, name) in required.iter_mut().zip(MESSAGE_COLUMNS) {
        *slot = find_column(&headers, name)?;
    }
    let extras: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, h)| !required.contains(i) && !h.is_empty())
        .map(|(i, h)| (i, h.to_lowercase()))
        .collect();

    let mut messages = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if is_blank(&record) {
            continue;
        }
        let cell = |i: usize| record.get(i).unwrap_or("").to_string();

        let [message_type, content, session_id, date, participant] = required;
        let mut message = Message::new(
            cell(session_id),
            cell(message_type),
            cell(content),
            cell(date),
            cell(participant),
        );
        for (i, key) in &extras {
            message = message.with_field(key, cell(*i));
        }
        messages.push(message);
    }

    tracing::debug!(count = messages.len(), "Parsed message table");
    Ok(messages)
}

/// Parse the query table: `Query Name` and `Query Description` are required,
/// `Output Format` is optional.
pub fn parse_queries<R: Read>(input: R, delimiter: char) -> Result<Vec<Query>, IngestError> {
    let mut rdr = reader(input, delimiter)?;
    let headers = rdr.headers()?.clone();

    let name_col = find_column(&headers, "Query Name")?;
    let description_col = find_column(&headers, "Query Description")?;
    let format_col = find_column(&headers, "Output Format").ok();

    let mut queries = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if is_blank(&record) {
            continue;
        }

        let mut query = Query::new(
            record.get(name_col).unwrap_or("").trim(),
            record.get(description_col).unwrap_or(""),
        );
        if let Some(format) = format_col.and_then(|i| record.get(i)) {
            if !format.trim().is_empty() {
                query = query.with_output_format(format);
            }
        }
        queries.push(query);
    }

    tracing::debug!(count = queries.len(), "Parsed query table");
    Ok(queries)
}
