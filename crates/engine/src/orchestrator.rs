//! Run entry point. Validates the inputs, connects to the completion
//! service with the supplied credential and drives one [`Scheduler`].

use crate::aggregate::RunReport;
use crate::client::{CompletionClient, RequestSettings};
use crate::grouper::group_sessions;
use crate::prompt::PromptBuilder;
use crate::scheduler::Scheduler;
use chrono::Utc;
use convoquery_config::AppConfig;
use convoquery_core::error::{Error, Result};
use convoquery_core::event::{EventBus, RunEvent};
use convoquery_core::message::{Message, Query};
use convoquery_core::provider::CompletionService;
use convoquery_core::sanitize::sanitize;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Builds a completion service for a credential.
pub trait ServiceConnector: Send + Sync {
    fn connect(&self, credential: &str) -> Arc<dyn CompletionService>;
}

impl<F> ServiceConnector for F
where
    F: Fn(&str) -> Arc<dyn CompletionService> + Send + Sync,
{
    fn connect(&self, credential: &str) -> Arc<dyn CompletionService> {
        self(credential)
    }
}

/// Runs the query workload for a message log.
pub struct Orchestrator {
    config: AppConfig,
    connector: Box<dyn ServiceConnector>,
    events: Arc<EventBus>,
    processing: AtomicBool,
}

impl Orchestrator {
    pub fn new(config: AppConfig, connector: impl ServiceConnector + 'static) -> Self {
        Self {
            config,
            connector: Box::new(connector),
            events: Arc::new(EventBus::default()),
            processing: AtomicBool::new(false),
        }
    }

    /// Publish run events on an existing bus.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// True while a run is in progress.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Answer every query for every session.
    ///
    /// Fails with [`Error::InputInvalid`] before any call is made when the
    /// credential is missing or blank, when either list is empty, or when
    /// query names are blank or repeated. Every other failure ends up as a
    /// placeholder answer inside the report.
    pub async fn run(
        &self,
        messages: Vec<Message>,
        queries: Vec<Query>,
        credential: Option<&str>,
    ) -> Result<RunReport> {
        let _guard = ProcessingGuard::enter(&self.processing)?;

        let outcome = self.execute(messages, queries, credential).await;
        if let Err(e) = &outcome {
            warn!("Run aborted: {e}");
        }
        self.events.publish(RunEvent::RunFinished {
            success: outcome.is_ok(),
            timestamp: Utc::now(),
        });
        outcome
    }

    async fn execute(
        &self,
        messages: Vec<Message>,
        queries: Vec<Query>,
        credential: Option<&str>,
    ) -> Result<RunReport> {
        let credential = credential
            .map(|c| sanitize(c).trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::InputInvalid("no API key provided".into()))?;
        if messages.is_empty() {
            return Err(Error::InputInvalid("no messages loaded".into()));
        }
        if queries.is_empty() {
            return Err(Error::InputInvalid("no queries loaded".into()));
        }
        check_query_names(&queries)?;

        let sessions = group_sessions(messages);
        info!(
            sessions = sessions.len(),
            queries = queries.len(),
            model = %self.config.model,
            "Starting run"
        );
        self.events.publish(RunEvent::RunStarted {
            sessions: sessions.len(),
            queries: queries.len(),
            timestamp: Utc::now(),
        });

        let client = CompletionClient::new(
            self.connector.connect(&credential),
            PromptBuilder::new(&self.config.prompt),
            RequestSettings::from_config(&self.config),
        );
        let scheduler = Scheduler::new(client, &self.config.scheduler, self.events.clone());
        let report = scheduler.run(&sessions, &queries).await;

        info!(
            extracted = report.stats.extracted,
            completed = report.stats.completed,
            failed = report.stats.failed,
            skipped = report.stats.skipped,
            slots = scheduler.slots().capacity(),
            peak_in_flight = scheduler.slots().peak(),
            "Run finished"
        );
        Ok(report)
    }
}

/// Query names key the result columns, so they must be present and unique.
fn check_query_names(queries: &[Query]) -> Result<()> {
    let mut seen = HashSet::new();
    for query in queries {
        let name = query.name.trim();
        if name.is_empty() {
            return Err(Error::InputInvalid("query with an empty name".into()));
        }
        if !seen.insert(name) {
            return Err(Error::InputInvalid(format!("duplicate query name '{name}'")));
        }
    }
    Ok(())
}

/// Holds the processing flag for the duration of a run.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl<'a> ProcessingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::Internal("a run is already in progress".into()))?;
        Ok(Self(flag))
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_names_must_be_unique() {
        let queries = vec![Query::new("Topic", "a"), Query::new("Topic ", "b")];
        assert!(matches!(
            check_query_names(&queries),
            Err(Error::InputInvalid(_))
        ));
    }

    #[test]
    fn blank_query_name_is_rejected() {
        let queries = vec![Query::new("  ", "a")];
        assert!(check_query_names(&queries).is_err());
    }

    #[test]
    fn guard_resets_flag() {
        let flag = AtomicBool::new(false);
        {
            let _guard = ProcessingGuard::enter(&flag).unwrap();
            assert!(flag.load(Ordering::SeqCst));
            assert!(ProcessingGuard::enter(&flag).is_err());
            assert!(flag.load(Ordering::SeqCst));
        }
        assert!(!flag.load(Ordering::SeqCst));
    }
}
