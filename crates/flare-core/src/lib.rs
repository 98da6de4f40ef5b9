//! flare-core — rule engine and highlighting for flare.
//!
//! This crate holds the synchronous heart of the pipeline: the compiled
//! [`rules::RuleSet`] with its deterministic evaluation order, the
//! [`highlight`] fragment builder, rule-file loading, and the event types
//! shared with the async layer.
//!
//! # Architecture
//!
//! ```text
//! File ──► Tail ──► Pipeline ──► match ──► highlight ──► filter ──► consumer
//!                   (flare-watch)   │            │
//!                                   └─ rules ────┘  (this crate)
//! ```
//!
//! Everything here is pure and thread-agnostic; concurrency lives entirely
//! in `flare-watch`.

pub mod config;
pub mod highlight;
pub mod rules;
pub mod types;

pub use rules::{CompileError, Match, Rule, RuleDefinition, RuleSet};
pub use types::{Fragment, HighlightedEvent, LogEvent, Severity, Span};
