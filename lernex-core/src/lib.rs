//! Lernex Core - Lesson rendering engine
//!
//! This crate contains the content-rendering core for lernex, independent
//! of transport and CLI concerns:
//! - LaTeX/Markdown-to-HTML formatter with document and fragment modes
//! - Math segmentation with currency heuristics and auto-close
//! - Incremental streaming renderer with safe flush points
//! - Debounced typeset scheduling for the host typesetter
//! - Quiz-question extraction from partially-received JSON
//! - Configuration management

pub mod config;
pub mod escape;
pub mod format;
pub mod math;
pub mod placeholder;
pub mod quiz;
pub mod stream;
pub mod table;
pub mod typeset;

// Re-export commonly used types
pub use config::FormatConfig;
pub use format::{format_fragment, format_html};
pub use math::{boundary_state, split_segments, MathBoundaryState, Segment};
pub use quiz::{extract_questions, QuizFeed, QuizQuestion};
pub use stream::{FlushChunk, FlushReason, StreamingFormatter};
pub use typeset::{TypesetRequest, TypesetScheduler};
