//! Lernex Stream - LLM transport feeding the rendering core
//!
//! This crate contains the network-facing half of the engine:
//! - OpenAI-compatible chat-completions client with SSE streaming
//! - Bounded retries with exponential backoff and jitter
//! - Pipelines wiring chunk streams into the incremental formatter and
//!   the quiz-question feed

pub mod client;
pub mod pipeline;
pub mod retry;

pub use client::{ChatMessage, ClientConfig, Completion, LlmClient, Usage};
pub use pipeline::{stream_lesson, stream_quiz, LessonEvent, LessonRender};
pub use retry::{retry, RetryConfig};
