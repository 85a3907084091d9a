//! The dispatch scheduler — walks the (session × query) workload of one run.
//!
//! Sessions are processed one at a time in first-seen order. Inside a session
//! every query is driven concurrently on the calling task:
//!
//! 1. **Extract** the answer from the messages when the query asks for a column
//! 2. **Acquire** a request slot, or give up after `slot_wait`
//! 3. **Pace** the call with the current delay (and a cooldown when due)
//! 4. **Call** the completion service while holding the slot
//! 5. **Record** the answer, or a placeholder describing the failure
//!
//! A rate-limit report restarts the pacing streak, holds every further call
//! for a long cooldown and raises a deduplicated notice.

use crate::aggregate::{ResultAggregator, RunReport, RunStats};
use crate::client::CompletionClient;
use crate::extract;
use crate::grouper::SessionGroup;
use crate::notice::{NoticeGate, RATE_LIMIT_NOTICE};
use crate::pacing::{Pacer, PacingPolicy};
use crate::slots::SlotPool;
use convoquery_config::SchedulerConfig;
use convoquery_core::error::{DispatchError, ProviderError};
use convoquery_core::event::{EventBus, Resolution, RunEvent};
use convoquery_core::message::Query;
use convoquery_core::sanitize::sanitize;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Per-run scheduler. Owns the slot pool, the pacing counter and the notice
/// gate, so two runs never share throttling state.
pub struct Scheduler {
    /// Client used for every remote call
    client: CompletionClient,

    /// Slot wait and session pause
    slot_wait: Duration,
    session_pause: Duration,

    /// Bound on in-flight remote calls
    slots: SlotPool,

    /// Consecutive-call counter
    pacer: Mutex<Pacer>,

    /// Rate-limit notice deduplication
    notices: Mutex<NoticeGate>,

    /// Progress and notice sink
    events: Arc<EventBus>,

    stats: Mutex<RunStats>,
}

impl Scheduler {
    pub fn new(client: CompletionClient, config: &SchedulerConfig, events: Arc<EventBus>) -> Self {
        Self {
            client,
            slot_wait: config.slot_wait(),
            session_pause: config.session_pause(),
            slots: SlotPool::new(config.max_concurrent),
            pacer: Mutex::new(Pacer::new(PacingPolicy::from_config(config))),
            notices: Mutex::new(NoticeGate::new(config.notice_window())),
            events,
            stats: Mutex::new(RunStats::default()),
        }
    }

    /// Answer every query for every session and return the ordered results.
    pub async fn run(&self, sessions: &[SessionGroup], queries: &[Query]) -> RunReport {
        let mut aggregator = ResultAggregator::new(sessions, queries);
        let total = sessions.len();

        for (index, session) in sessions.iter().enumerate() {
            if index > 0 && !self.session_pause.is_zero() {
                tokio::time::sleep(self.session_pause).await;
            }

            info!(
                session_id = %session.session_id,
                messages = session.len(),
                "Processing session {}/{}",
                index + 1,
                total
            );
            self.events.publish(RunEvent::SessionStarted {
                session_id: session.session_id.clone(),
                index,
                total,
            });

            let answers = join_all(queries.iter().map(|q| self.answer(session, q))).await;
            for (query, value) in queries.iter().zip(answers) {
                aggregator.record(&session.session_id, &query.name, value);
            }

            debug_assert!(aggregator.is_session_complete(&session.session_id));
            self.events.publish(RunEvent::SessionFinished {
                session_id: session.session_id.clone(),
            });
        }

        let mut stats = self.stats();
        stats.sessions = total;

        RunReport {
            results: aggregator.finish(),
            stats,
        }
    }

    /// Resolve one pair to its final value. Never fails: errors become
    /// placeholders.
    async fn answer(&self, session: &SessionGroup, query: &Query) -> String {
        let (value, resolution) = match extract::resolve(query, session) {
            Some(value) => {
                debug!(session_id = %session.session_id, query = %query.name, "Answered by extraction");
                (value, Resolution::Extracted)
            }
            None => match self.dispatch(session, query).await {
                Ok(answer) => (answer, Resolution::Completed),
                Err(e) => {
                    warn!(session_id = %session.session_id, query = %query.name, "Query failed: {e}");
                    let resolution = match e {
                        DispatchError::QueueTimeout { .. } => Resolution::Skipped,
                        DispatchError::Provider(_) => Resolution::Failed,
                    };
                    (sanitize(&e.placeholder()), resolution)
                }
            },
        };

        self.stats.lock().count(resolution);
        self.events.publish(RunEvent::QueryResolved {
            session_id: session.session_id.clone(),
            query_name: query.name.clone(),
            resolution,
        });

        value
    }

    /// Make one paced remote call for the pair, inside a request slot.
    pub async fn dispatch(
        &self,
        session: &SessionGroup,
        query: &Query,
    ) -> Result<String, DispatchError> {
        let _slot = self
            .slots
            .acquire_within(self.slot_wait)
            .await
            .map_err(|t| DispatchError::QueueTimeout { waited: t.waited })?;

        let step = self.pacer.lock().next_call(Instant::now());
        if let Some(cooldown) = step.cooldown {
            info!("Pausing {}ms before the next call", cooldown.as_millis());
        }
        debug!(
            session_id = %session.session_id,
            query = %query.name,
            delay_ms = step.delay.as_millis() as u64,
            service = %self.client.service_name(),
            "Dispatching completion call"
        );
        self.events.publish(RunEvent::CallDispatched {
            session_id: session.session_id.clone(),
            query_name: query.name.clone(),
            delay: step.delay,
            cooldown: step.cooldown,
        });
        tokio::time::sleep(step.total()).await;
        self.wait_for_resume().await;

        match self.client.answer(session, query).await {
            Ok(answer) => Ok(answer),
            Err(e) => {
                if e.is_rate_limited() {
                    let cooldown = self.pacer.lock().rate_limited(Instant::now());
                    self.stats.lock().rate_limited += 1;
                    self.notify_rate_limit(&e, cooldown);
                }
                Err(e.into())
            }
        }
    }

    /// A cooldown may have started while this call slept its delay.
    async fn wait_for_resume(&self) {
        loop {
            let hold = self.pacer.lock().hold_remaining(Instant::now());
            match hold {
                Some(left) => tokio::time::sleep(left).await,
                None => break,
            }
        }
    }

    fn notify_rate_limit(&self, error: &ProviderError, cooldown: Duration) {
        if !self.notices.lock().admit(RATE_LIMIT_NOTICE) {
            debug!("Rate-limit notice suppressed");
            return;
        }

        warn!("{error}; cooling down for {}s", cooldown.as_secs());
        self.events.publish(RunEvent::Notice {
            key: RATE_LIMIT_NOTICE.to_string(),
            message: format!(
                "Rate limit reached, waiting {}s before continuing",
                cooldown.as_secs()
            ),
        });
    }

    pub fn slots(&self) -> &SlotPool {
        &self.slots
    }

    /// Calls made since the last cooldown or rate limit.
    pub fn consecutive_calls(&self) -> u32 {
        self.pacer.lock().consecutive()
    }

    pub fn stats(&self) -> RunStats {
        *self.stats.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RequestSettings;
    use crate::prompt::PromptBuilder;
    use async_trait::async_trait;
    use convoquery_core::message::Message;
    use convoquery_core::provider::{CompletionRequest, CompletionResponse, CompletionService};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails with a rate limit on the first call, then answers "ok".
    struct FirstCallLimited {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionService for FirstCallLimited {
        fn name(&self) -> &str {
            "first-call-limited"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(ProviderError::RateLimited("slow down".into()));
            }
            Ok(CompletionResponse {
                content: "ok".into(),
                model: "stub".into(),
                usage: None,
            })
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            max_concurrent: 1,
            ..SchedulerConfig::default()
        }
    }

    fn scheduler(service: Arc<dyn CompletionService>) -> Scheduler {
        let client =
            CompletionClient::new(service, PromptBuilder::default(), RequestSettings::default());
        Scheduler::new(client, &config(), Arc::new(EventBus::default()))
    }

    fn session() -> SessionGroup {
        SessionGroup {
            session_id: "s1".into(),
            messages: vec![Message::new("s1", "user", "hi", "2024-01-01", "")],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_resets_streak_and_counts() {
        let service = Arc::new(FirstCallLimited {
            calls: AtomicUsize::new(0),
        });
        let scheduler = scheduler(service.clone());
        let query = Query::new("Mood", "How does the user feel?");

        let err = scheduler.dispatch(&session(), &query).await.unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(scheduler.consecutive_calls(), 0);
        assert_eq!(scheduler.stats().rate_limited, 1);

        let limited_at = Instant::now();
        let ok = scheduler.dispatch(&session(), &query).await.unwrap();
        assert_eq!(ok, "ok");
        assert!(limited_at.elapsed() >= config().rate_limit_cooldown());
        assert_eq!(scheduler.consecutive_calls(), 1);
        assert_eq!(scheduler.slots().in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_notice_is_deduplicated() {
        let scheduler = scheduler(Arc::new(FirstCallLimited {
            calls: AtomicUsize::new(0),
        }));
        let mut rx = scheduler.events.subscribe();

        scheduler.notify_rate_limit(&ProviderError::RateLimited("a".into()), Duration::from_secs(1));
        scheduler.notify_rate_limit(&ProviderError::RateLimited("b".into()), Duration::from_secs(1));

        let mut notices = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event.as_ref(), RunEvent::Notice { .. }) {
                notices += 1;
            }
        }
        assert_eq!(notices, 1);
    }
}
