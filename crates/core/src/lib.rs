//! # ConvoQuery Core
//!
//! Domain types, traits, and error definitions for the ConvoQuery session
//! analysis engine. Nothing here performs I/O; the crate defines the model
//! that the engine, the providers and the CLI build against.
//!
//! - [`message`]: Message / Query / SessionResult records
//! - [`provider`]: the `CompletionService` trait and its request types
//! - [`event`]: run events for progress reporting
//! - [`sanitize`]: single-byte text sanitization
//! - [`error`]: the run-level and per-query error taxonomy

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod sanitize;

// Re-export key types at crate root for ergonomics
pub use error::{DispatchError, Error, ProviderError, Result};
pub use event::{EventBus, Resolution, RunEvent};
pub use message::{FieldMap, Message, Query, SessionResult};
pub use provider::{CompletionRequest, CompletionResponse, CompletionService, PromptMessage};
pub use sanitize::sanitize;
