//! Completion service implementations for ConvoQuery.
//!
//! All services implement the `convoquery_core::CompletionService` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatService;
