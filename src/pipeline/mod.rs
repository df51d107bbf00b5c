//! Pipeline stages for document summarization.
//!
//! Each submodule implements exactly one transformation step; the
//! [`orchestrator`] sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ fanout ──▶ refine ──▶ (stream / report)
//! (path/URL/  (lopdf)   (parallel  (sequential,
//!  .enc)                 summaries) page i needs i-1)
//! ```
//!
//! 1. [`input`]   — resolve a path, URL or encrypted upload to in-memory bytes
//! 2. [`extract`] — bytes to ordered page texts; runs in `spawn_blocking`
//! 3. [`fanout`]  — one summary call per page, results kept in page order
//! 4. [`refine`]  — thread each page's summary through the previous one
//! 5. [`postprocess`] — deterministic cleanup of service responses

pub mod extract;
pub mod fanout;
pub mod input;
pub mod orchestrator;
pub mod postprocess;
pub mod refine;
