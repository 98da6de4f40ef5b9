//! Classification stage: raw [`LogEvent`]s in, [`HighlightedEvent`]s out.
//!
//! [`classify`] is the pure per-event policy; [`run`] is the async stage the
//! controller drives. The stage snapshots the active rule set once per event
//! from a `watch` channel, so a hot swap never mixes rule sets within one
//! line. This is the single place lines are intentionally dropped; nothing
//! else in the pipeline discards data.

use chrono::Utc;
use flare_core::highlight::build_fragments;
use flare_core::{Fragment, HighlightedEvent, LogEvent, RuleSet, Severity};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Severity/show-all policy for the filter stage.
#[derive(Debug, Clone, Copy)]
pub struct FilterOptions {
    /// Emit unmatched and below-threshold lines too.
    pub show_all: bool,
    /// Lowest severity that passes when `show_all` is off.
    pub min_severity: Severity,
}

impl Default for FilterOptions {
    fn default() -> Self {
        FilterOptions {
            show_all: false,
            min_severity: Severity::Medium,
        }
    }
}

/// Apply rules and the severity/show-all policy to one event.
///
/// Policy, in order:
/// 1. Events carrying an error always pass through (severity `normal`) —
///    visibility of failures is the presentation layer's call, not ours.
/// 2. Matched lines are dropped iff `show_all` is off and the rule's
///    severity does not meet `min_severity`.
/// 3. Unmatched lines are dropped iff `show_all` is off; otherwise they pass
///    as one plain fragment.
pub fn classify(
    event: LogEvent,
    rules: &RuleSet,
    opts: &FilterOptions,
) -> Option<HighlightedEvent> {
    let ts = Utc::now();

    if event.error.is_some() {
        return Some(HighlightedEvent {
            ts,
            path: event.path,
            line: event.line,
            rule: None,
            severity: Severity::Normal,
            color: String::new(),
            tags: Vec::new(),
            fragments: Vec::new(),
            error: event.error,
        });
    }

    match rules.match_line(&event.line) {
        Some(m) => {
            let severity = m.rule.severity;
            if !opts.show_all && !severity.meets(opts.min_severity) {
                return None;
            }
            let fragments = build_fragments(&event.line, &m.spans);
            let rule = Some(m.rule.name.clone());
            let color = m.rule.color.clone();
            let tags = m.rule.tags.clone();
            Some(HighlightedEvent {
                ts,
                path: event.path,
                line: event.line,
                rule,
                severity,
                color,
                tags,
                fragments,
                error: None,
            })
        }
        None => {
            if !opts.show_all {
                return None;
            }
            let fragments = vec![Fragment::plain(event.line.as_str())];
            Some(HighlightedEvent {
                ts,
                path: event.path,
                line: event.line,
                rule: None,
                severity: Severity::Normal,
                color: String::new(),
                tags: Vec::new(),
                fragments,
                error: None,
            })
        }
    }
}

/// The async classification stage.
///
/// Consumes the fan-in channel until it closes or `cancel` fires, then drops
/// its output sender — the downstream stream closes exactly once, and only
/// after every producer has stopped feeding this stage.
pub(crate) async fn run(
    mut raw: mpsc::Receiver<LogEvent>,
    rules_rx: watch::Receiver<Arc<RuleSet>>,
    opts: FilterOptions,
    out: mpsc::Sender<HighlightedEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return,
            event = raw.recv() => match event {
                Some(event) => event,
                None => return,
            },
        };

        // One immutable snapshot per event; a concurrent set_rules swaps the
        // Arc for later events without touching this one.
        let rules = rules_rx.borrow().clone();
        if let Some(highlighted) = classify(event, &rules, &opts) {
            tokio::select! {
                sent = out.send(highlighted) => {
                    if sent.is_err() {
                        return;
                    }
                }
                _ = cancel.cancelled() => return,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
