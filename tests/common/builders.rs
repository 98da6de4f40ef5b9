//! Rule-set builders and event-stream helpers shared by the harnesses.

use flare_core::{HighlightedEvent, LogEvent, RuleDefinition, RuleSet};
use std::time::Duration;
use tokio::sync::mpsc;

/// Generous upper bound for a positive wait; the tailer's fallback poll is
/// 250ms, so anything near a second means something is actually broken.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Window for asserting that nothing arrives — long enough to cover several
/// poll intervals.
pub const QUIET_WINDOW: Duration = Duration::from_millis(700);

pub fn rule(name: &str, pattern: &str, severity: &str) -> RuleDefinition {
    RuleDefinition {
        name: name.to_string(),
        pattern: pattern.to_string(),
        severity: severity.to_string(),
        ..Default::default()
    }
}

/// A single high-severity rule matching every non-empty line.
pub fn match_everything() -> RuleSet {
    RuleSet::compile(&[rule("any", ".", "high")]).expect("compile match-everything rule")
}

/// Compile a rule set or panic; for harness setup only.
pub fn compile(defs: &[RuleDefinition]) -> RuleSet {
    RuleSet::compile(defs).expect("compile harness rule set")
}

// ---------------------------------------------------------------------------
// Stream helpers
// ---------------------------------------------------------------------------

/// Receive the next highlighted event or panic after [`EVENT_TIMEOUT`].
pub async fn next_event(rx: &mut mpsc::Receiver<HighlightedEvent>) -> HighlightedEvent {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for highlighted event")
        .expect("event stream closed unexpectedly")
}

/// Receive the next raw log event or panic after [`EVENT_TIMEOUT`].
pub async fn next_raw(rx: &mut mpsc::Receiver<LogEvent>) -> LogEvent {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for log event")
        .expect("log event channel closed unexpectedly")
}

/// Collect `n` highlighted events.
pub async fn collect_events(
    rx: &mut mpsc::Receiver<HighlightedEvent>,
    n: usize,
) -> Vec<HighlightedEvent> {
    let mut events = Vec::with_capacity(n);
    for _ in 0..n {
        events.push(next_event(rx).await);
    }
    events
}

/// Assert that nothing arrives within [`QUIET_WINDOW`].
pub async fn assert_quiet(rx: &mut mpsc::Receiver<HighlightedEvent>) {
    if let Ok(Some(event)) = tokio::time::timeout(QUIET_WINDOW, rx.recv()).await {
        panic!("expected no event, got one for {}", event.path.display());
    }
}

/// Assert that the stream closes, draining any in-flight events first.
pub async fn assert_closed(rx: &mut mpsc::Receiver<HighlightedEvent>) {
    loop {
        let next = tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
            .await
            .expect("timed out waiting for stream to close");
        if next.is_none() {
            return;
        }
    }
}
