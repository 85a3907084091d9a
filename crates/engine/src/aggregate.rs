//! Result aggregation, one record per session and one value per query.

use crate::grouper::SessionGroup;
use convoquery_core::event::Resolution;
use convoquery_core::message::{FieldMap, Query, SessionResult};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

/// Stored when a query somehow ended a session without any value.
pub const UNRESOLVED_PLACEHOLDER: &str = "Error: no result";

/// Owns the SessionResults of a run in first-seen session order.
#[derive(Debug)]
pub struct ResultAggregator {
    records: IndexMap<String, SessionResult>,
    query_names: Vec<String>,
}

impl ResultAggregator {
    pub fn new(sessions: &[SessionGroup], queries: &[Query]) -> Self {
        let records = sessions
            .iter()
            .map(|g| {
                (
                    g.session_id.clone(),
                    SessionResult::new(g.session_id.clone(), g.start_date()),
                )
            })
            .collect();

        Self {
            records,
            query_names: queries.iter().map(|q| q.name.clone()).collect(),
        }
    }

    /// Merge one outcome. Outcomes for unknown sessions or queries are
    /// dropped; returns whether the value was stored.
    pub fn record(&mut self, session_id: &str, query_name: &str, value: impl Into<String>) -> bool {
        if !self.query_names.iter().any(|n| n == query_name) {
            warn!(query = %query_name, "Ignoring outcome for unknown query");
            return false;
        }
        match self.records.get_mut(session_id) {
            Some(record) => {
                record.set_answer(query_name, value);
                true
            }
            None => {
                warn!(session_id = %session_id, "Ignoring outcome for unknown session");
                false
            }
        }
    }

    /// Whether every query has a value for `session_id`.
    pub fn is_session_complete(&self, session_id: &str) -> bool {
        self.records.get(session_id).is_some_and(|r| {
            self.query_names
                .iter()
                .all(|name| r.answers.contains_key(name))
        })
    }

    /// Hand over the full list. Answers are put in query order and any gap
    /// is filled with [`UNRESOLVED_PLACEHOLDER`].
    pub fn finish(self) -> Vec<SessionResult> {
        let query_names = self.query_names;
        self.records
            .into_values()
            .map(|mut record| {
                let mut ordered = FieldMap::with_capacity(query_names.len());
                for name in &query_names {
                    let value = record.answers.shift_remove(name).unwrap_or_else(|| {
                        warn!(session_id = %record.session_id, query = %name, "Query left without a value");
                        UNRESOLVED_PLACEHOLDER.to_string()
                    });
                    ordered.insert(name.clone(), value);
                }
                record.answers = ordered;
                record
            })
            .collect()
    }
}

/// Counts of how the (session, query) pairs of a run were answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub sessions: usize,
    pub extracted: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub rate_limited: usize,
}

impl RunStats {
    pub fn count(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Extracted => self.extracted += 1,
            Resolution::Completed => self.completed += 1,
            Resolution::Failed => self.failed += 1,
            Resolution::Skipped => self.skipped += 1,
        }
    }

    /// Pairs answered in total.
    pub fn resolved(&self) -> usize {
        self.extracted + self.completed + self.failed + self.skipped
    }

    /// Remote calls that were actually made.
    pub fn remote_calls(&self) -> usize {
        self.completed + self.failed
    }
}

/// The outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub results: Vec<SessionResult>,
    pub stats: RunStats,
}
