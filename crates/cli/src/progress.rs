//! Terminal progress from the run event bus.

use convoquery_core::event::{EventBus, Resolution, RunEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// One progress line for an event, or `None` for events not shown.
pub fn describe(event: &RunEvent) -> Option<String> {
    match event {
        RunEvent::RunStarted {
            sessions, queries, ..
        } => Some(format!(
            "  Processing {sessions} session(s) × {queries} query(ies)"
        )),
        RunEvent::SessionStarted {
            session_id,
            index,
            total,
        } => Some(format!("  [{}/{total}] Session {session_id}", index + 1)),
        RunEvent::QueryResolved {
            query_name,
            resolution,
            ..
        } => {
            let how = match resolution {
                Resolution::Extracted => "extracted",
                Resolution::Completed => "answered",
                Resolution::Failed => "failed",
                Resolution::Skipped => "skipped",
            };
            Some(format!("        {query_name}: {how}"))
        }
        RunEvent::Notice { message, .. } => Some(format!("  ⚠️  {message}")),
        RunEvent::RunFinished { success, .. } => Some(if *success {
            "  ✅ Done".to_string()
        } else {
            "  ❌ Run aborted".to_string()
        }),
        RunEvent::CallDispatched { .. } | RunEvent::SessionFinished { .. } => None,
    }
}

/// Print progress until the run finishes.
pub fn spawn(events: &EventBus) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(line) = describe(&event) {
                        eprintln!("{line}");
                    }
                    if matches!(event.as_ref(), RunEvent::RunFinished { .. }) {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "Progress display fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
