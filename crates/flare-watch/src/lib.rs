//! flare-watch — concurrent file tailing and classification for flare.
//!
//! # Architecture
//!
//! ```text
//! File ──► tail ──┐
//! File ──► tail ──┼──► pipeline ──► events()
//! File ──► tail ──┘        ▲
//!            ▲             │ Arc<RuleSet> snapshots
//!            └── controller (apply / set_rules / shutdown)
//! ```
//!
//! One tokio task per watched file, one pipeline task, and one controller
//! command task that is the only writer of the source map and the active
//! rule-set pointer. Transport between stages is bounded at capacity 1, so a
//! slow consumer stalls the producers instead of buffering without limit.

pub mod controller;
pub mod pipeline;
pub mod tail;

pub use controller::{rule_groups, ApplyError, Controller, RuleGroup, Selection};
pub use pipeline::{classify, FilterOptions};
pub use tail::{SourceError, TailHandle};
