//! Controller: source lifecycle, fan-in, and runtime reconfiguration.
//!
//! The controller owns the live map of path → tail source and the active
//! rule-set pointer. All mutation of that state happens on one command task
//! (the serialization point): [`Controller::apply`] and
//! [`Controller::set_rules`] enqueue commands that the task processes one at
//! a time, so there is no lock held across I/O and no data race to reason
//! about.
//!
//! Fan-in uses a single bounded channel whose sender is cloned per source;
//! each source dropping its sender is its completion acknowledgement, and
//! the channel — and therefore the downstream event stream — closes exactly
//! once, when the last producer is gone.

use crate::pipeline::{self, FilterOptions};
use crate::tail::{self, SourceError, TailHandle};
use flare_core::{HighlightedEvent, LogEvent, RuleSet};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Desired ordered set of file paths to watch. The caller is responsible for
/// trimming and deduplicating entries.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub paths: Vec<PathBuf>,
}

impl Selection {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Selection {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}

/// A distinct tag value with the number of rules carrying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleGroup {
    pub tag: String,
    pub count: usize,
}

/// Group all distinct tag values across `rules` in first-seen declaration
/// order, each with the count of rules carrying that tag. Pure; used by the
/// reconfiguration surface to offer tag filtering.
pub fn rule_groups(rules: &RuleSet) -> Vec<RuleGroup> {
    let mut groups: Vec<RuleGroup> = Vec::new();
    for rule in rules.rules() {
        for tag in &rule.tags {
            match groups.iter_mut().find(|g| &g.tag == tag) {
                Some(group) => group.count += 1,
                None => groups.push(RuleGroup {
                    tag: tag.clone(),
                    count: 1,
                }),
            }
        }
    }
    groups
}

/// Failure of an [`Controller::apply`] call.
///
/// Partial success is explicit: sources that started successfully keep
/// running, and `Sources` lists exactly the additions that failed.
#[derive(Debug)]
pub enum ApplyError {
    /// The controller has already shut down.
    Closed,
    /// One or more additions failed.
    Sources { failures: Vec<(PathBuf, SourceError)> },
}

impl std::error::Error for ApplyError {}

impl std::fmt::Display for ApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyError::Closed => write!(f, "controller is shut down"),
            ApplyError::Sources { failures } => {
                write!(f, "{} source(s) failed to start: ", failures.len())?;
                for (i, (_, err)) in failures.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{err}")?;
                }
                Ok(())
            }
        }
    }
}

enum Command {
    Apply {
        selection: Selection,
        reply: oneshot::Sender<Result<(), ApplyError>>,
    },
    SetRules {
        rules: RuleSet,
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running watch pipeline.
///
/// Spawned once with an initial rule set; reconfigured at runtime through
/// [`apply`](Controller::apply) and [`set_rules`](Controller::set_rules);
/// torn down with [`shutdown`](Controller::shutdown).
#[derive(Debug)]
pub struct Controller {
    commands: mpsc::Sender<Command>,
    events: Option<mpsc::Receiver<HighlightedEvent>>,
    cancel: CancellationToken,
    actor: JoinHandle<()>,
}

impl Controller {
    /// Spawn the pipeline stage and the command task. No sources are running
    /// until the first [`apply`](Controller::apply).
    pub fn spawn(rules: RuleSet, opts: FilterOptions) -> Controller {
        let cancel = CancellationToken::new();
        // Capacity 1 end to end: a stalled consumer stalls the producers
        // instead of growing a buffer.
        let (raw_tx, raw_rx) = mpsc::channel::<LogEvent>(1);
        let (out_tx, out_rx) = mpsc::channel::<HighlightedEvent>(1);
        let (rules_tx, rules_rx) = watch::channel(Arc::new(rules));
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(16);

        tokio::spawn(pipeline::run(
            raw_rx,
            rules_rx,
            opts,
            out_tx,
            cancel.clone(),
        ));
        let actor = tokio::spawn(actor_loop(cmd_rx, raw_tx, rules_tx, cancel.clone()));

        Controller {
            commands: cmd_tx,
            events: Some(out_rx),
            cancel,
            actor,
        }
    }

    /// Reconcile the running sources against `selection`: start sources for
    /// newly added paths, tear down sources for removed paths, leave
    /// unaffected paths running untouched.
    ///
    /// All additions and removals are attempted; additions that fail are
    /// reported together in [`ApplyError::Sources`] without rolling back the
    /// ones that started.
    pub async fn apply(&self, selection: Selection) -> Result<(), ApplyError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Apply { selection, reply })
            .await
            .map_err(|_| ApplyError::Closed)?;
        response.await.map_err(|_| ApplyError::Closed)?
    }

    /// Atomically replace the active rule set. Lines classified after this
    /// resolves see the new rules; in-flight lines finish under whichever
    /// snapshot they already took.
    pub async fn set_rules(&self, rules: RuleSet) {
        let (reply, response) = oneshot::channel();
        if self
            .commands
            .send(Command::SetRules { rules, reply })
            .await
            .is_ok()
        {
            let _ = response.await;
        }
    }

    /// The merged output stream, open until shutdown. Yields `Some` on the
    /// first call only; the stream is single-consumer.
    pub fn events(&mut self) -> Option<mpsc::Receiver<HighlightedEvent>> {
        self.events.take()
    }

    /// Cancel every source and the pipeline stage, then wait for all of them
    /// to finish. After this returns, every file handle is released and the
    /// event stream has closed.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.actor.await;
    }
}

// ---------------------------------------------------------------------------
// Command task — the single serialization point
// ---------------------------------------------------------------------------

async fn actor_loop(
    mut commands: mpsc::Receiver<Command>,
    raw_tx: mpsc::Sender<LogEvent>,
    rules_tx: watch::Sender<Arc<RuleSet>>,
    cancel: CancellationToken,
) {
    let mut sources: HashMap<PathBuf, TailHandle> = HashMap::new();
    // Insertion-ordered view of `sources`, for deterministic teardown.
    let mut active: Vec<PathBuf> = Vec::new();

    loop {
        let command = tokio::select! {
            _ = cancel.cancelled() => break,
            command = commands.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            Command::Apply { selection, reply } => {
                let result =
                    reconcile(&mut sources, &mut active, selection, &raw_tx, &cancel).await;
                let _ = reply.send(result);
            }
            Command::SetRules { rules, reply } => {
                debug!(rules = rules.len(), "rule set swapped");
                let _ = rules_tx.send(Arc::new(rules));
                let _ = reply.send(());
            }
        }
    }

    // Shutdown: every source is joined before this task drops the raw
    // sender, so the pipeline never loses a producer mid-write.
    for path in active.drain(..) {
        if let Some(handle) = sources.remove(&path) {
            handle.shutdown().await;
        }
    }
}

async fn reconcile(
    sources: &mut HashMap<PathBuf, TailHandle>,
    active: &mut Vec<PathBuf>,
    selection: Selection,
    raw_tx: &mpsc::Sender<LogEvent>,
    cancel: &CancellationToken,
) -> Result<(), ApplyError> {
    // Removals first, and teardown completes before the map entry is
    // forgotten — a rapid add/remove sequence can never leak a source.
    let removed: Vec<PathBuf> = active
        .iter()
        .filter(|path| !selection.contains(path))
        .cloned()
        .collect();
    for path in removed {
        if let Some(handle) = sources.remove(&path) {
            debug!(path = %path.display(), "removing tail source");
            handle.shutdown().await;
        }
        active.retain(|p| p != &path);
    }

    let mut failures = Vec::new();
    for path in selection.paths {
        if sources.contains_key(&path) {
            // Already running; no restart, no gap.
            continue;
        }
        match tail::spawn(path.clone(), raw_tx.clone(), cancel.child_token()) {
            Ok(handle) => {
                debug!(path = %path.display(), "adding tail source");
                sources.insert(path.clone(), handle);
                active.push(path);
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "tail source failed to start");
                failures.push((path, err));
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ApplyError::Sources { failures })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
