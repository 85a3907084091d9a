//! Query orchestration for ConvoQuery.
//!
//! A run goes through the following stages:
//!
//! 1. **Group** the message log into sessions (first-seen order)
//! 2. **Extract** column values for queries that ask for one
//! 3. **Dispatch** the remaining (session, query) pairs to the completion
//!    service, bounded by request slots and paced between calls
//! 4. **Aggregate** every answer into one `SessionResult` per session
//!
//! [`Orchestrator`] is the entry point; everything below it is usable on its
//! own for testing.

pub mod aggregate;
pub mod client;
pub mod extract;
pub mod grouper;
pub mod notice;
pub mod orchestrator;
pub mod pacing;
pub mod prompt;
pub mod scheduler;
pub mod slots;

pub use aggregate::{ResultAggregator, RunReport, RunStats};
pub use client::{CompletionClient, RequestSettings};
pub use grouper::{SessionGroup, group_sessions};
pub use orchestrator::{Orchestrator, ServiceConnector};
pub use pacing::{Pacer, PacingPolicy, PacingStep};
pub use prompt::PromptBuilder;
pub use scheduler::Scheduler;
pub use slots::{SlotPermit, SlotPool, SlotTimeout};
