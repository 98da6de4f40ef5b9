//! Single-file tail source.
//!
//! [`spawn`] starts one task that streams newly appended lines from a file as
//! [`LogEvent`]s, surviving truncation and rotation. Creation is synchronous
//! and fails with [`SourceError::NotFound`] when the file does not exist;
//! once running, the source never terminates on its own — read failures are
//! forwarded as error events and the task keeps waiting.
//!
//! # Rotation
//!
//! A `notify` watcher on the file's parent directory provides wake-ups, but
//! rotation detection itself is an explicit state check on every pass:
//!
//! - inode at the path differs from the open handle ⇒ the file was replaced;
//!   reopen and deliver from the start of the new file
//! - size at the path is below the read offset ⇒ the file was truncated;
//!   seek back to the start
//! - the path is gone ⇒ keep the old handle and wait for recreation
//!
//! A fallback poll interval bounds the latency of a missed notification, so
//! the watcher is an optimisation, never a correctness requirement.

use flare_core::LogEvent;
use notify::{RecursiveMode, Watcher};
use std::io::{self, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Fallback poll cadence when no filesystem notification arrives.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

const READ_CHUNK: usize = 8 * 1024;

/// Why a tail source could not be created.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{}: no such file", path.display())]
    NotFound { path: PathBuf },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Handle to a running tail source. Dropping the handle does NOT stop the
/// task; call [`TailHandle::shutdown`] to cancel it and wait for the file
/// handle to be released.
#[derive(Debug)]
pub struct TailHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TailHandle {
    /// Cancel the source and wait for it to finish its in-flight read and
    /// release its file handle. Consumes the handle, so teardown can only
    /// happen once.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Start tailing `path`, delivering lines (file order, from the start of the
/// file) into `events`. Rejects synchronously if the file does not exist.
pub fn spawn(
    path: PathBuf,
    events: mpsc::Sender<LogEvent>,
    cancel: CancellationToken,
) -> Result<TailHandle, SourceError> {
    if let Err(source) = std::fs::metadata(&path) {
        return Err(match source.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound { path },
            _ => SourceError::Io { path, source },
        });
    }
    let task = tokio::spawn(run(path, events, cancel.clone()));
    Ok(TailHandle { cancel, task })
}

async fn run(path: PathBuf, events: mpsc::Sender<LogEvent>, cancel: CancellationToken) {
    // Wake-up signal only; all state decisions are explicit checks below.
    let (wake_tx, mut wake) = mpsc::channel::<()>(1);
    let _watcher = watch_parent(&path, wake_tx);

    let mut tailer = Tailer::new(path.clone());
    let mut poll = tokio::time::interval(POLL_INTERVAL);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut lines = Vec::new();

    debug!(path = %path.display(), "tail source started");
    loop {
        match tailer.drain(&mut lines).await {
            Ok(()) => {
                for line in lines.drain(..) {
                    if !forward(&events, LogEvent::line(&path, line), &cancel).await {
                        return;
                    }
                }
            }
            Err(err) => {
                // Transient: report it, drop the handle so the next pass
                // reopens, and keep going.
                tailer.reset();
                lines.clear();
                if !forward(&events, LogEvent::error(&path, err), &cancel).await {
                    return;
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(path = %path.display(), "tail source stopped");
                return;
            }
            _ = wake.recv() => {}
            _ = poll.tick() => {}
        }
    }
    // Every return above drops the Tailer, releasing the file handle exactly
    // once regardless of which path exited the loop.
}

/// Send one event, abandoning the send if the source is cancelled or the
/// consumer is gone. Returns false when the task should exit.
async fn forward(
    events: &mpsc::Sender<LogEvent>,
    event: LogEvent,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        sent = events.send(event) => sent.is_ok(),
        _ = cancel.cancelled() => false,
    }
}

/// Watch the file's parent directory for changes, coalescing notifications
/// into a capacity-1 wake channel. Returns `None` (poll-only mode) if the
/// watcher cannot be set up.
fn watch_parent(path: &Path, wake: mpsc::Sender<()>) -> Option<notify::RecommendedWatcher> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut watcher = match notify::recommended_watcher(
        move |res: Result<notify::Event, notify::Error>| {
            if res.is_ok() {
                let _ = wake.try_send(());
            }
        },
    ) {
        Ok(w) => w,
        Err(err) => {
            warn!(path = %path.display(), %err, "file watcher unavailable, polling only");
            return None;
        }
    };
    if let Err(err) = watcher.watch(dir, RecursiveMode::NonRecursive) {
        warn!(path = %path.display(), %err, "file watcher unavailable, polling only");
        return None;
    }
    Some(watcher)
}

// ---------------------------------------------------------------------------
// Tailer — file state machine
// ---------------------------------------------------------------------------

struct Tailer {
    path: PathBuf,
    file: Option<File>,
    /// Inode of the open handle; compared against the path on every pass.
    ino: u64,
    /// Bytes consumed from the open handle.
    offset: u64,
    /// Trailing bytes not yet terminated by a newline.
    partial: Vec<u8>,
}

impl Tailer {
    fn new(path: PathBuf) -> Self {
        Tailer {
            path,
            file: None,
            ino: 0,
            offset: 0,
            partial: Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.file = None;
        self.partial.clear();
        self.offset = 0;
    }

    /// Read everything currently available, run the rotation check, and read
    /// again if the check moved the handle. Draining before the check means a
    /// rotated-away file is emptied before the source switches to its
    /// replacement.
    async fn drain(&mut self, lines: &mut Vec<String>) -> io::Result<()> {
        self.read_available(lines).await?;
        if self.check_rotation().await? {
            self.read_available(lines).await?;
        }
        Ok(())
    }

    /// Append every complete line the open handle currently holds.
    async fn read_available(&mut self, lines: &mut Vec<String>) -> io::Result<()> {
        let Some(file) = self.file.as_mut() else {
            // Path currently absent; wait for recreation.
            return Ok(());
        };

        let mut buf = [0u8; READ_CHUNK];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            self.offset += n as u64;
            self.partial.extend_from_slice(&buf[..n]);
            while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
                let mut raw: Vec<u8> = self.partial.drain(..=pos).collect();
                raw.pop();
                if raw.last() == Some(&b'\r') {
                    raw.pop();
                }
                lines.push(String::from_utf8_lossy(&raw).into_owned());
            }
        }
    }

    /// Explicit rotation/truncation check against the path's current state.
    /// Returns true when the handle was reopened or rewound and another read
    /// pass is worthwhile.
    async fn check_rotation(&mut self) -> io::Result<bool> {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            // Removed out from under us; the open handle stays valid and the
            // next recreation shows up as an inode change.
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err),
        };

        if self.file.is_none() {
            self.open().await?;
            return Ok(true);
        }
        if meta.ino() != self.ino {
            debug!(path = %self.path.display(), "file replaced, reopening");
            self.open().await?;
            return Ok(true);
        }
        if meta.len() < self.offset {
            debug!(path = %self.path.display(), "file truncated, rewinding");
            if let Some(file) = self.file.as_mut() {
                file.seek(SeekFrom::Start(0)).await?;
            }
            self.offset = 0;
            self.partial.clear();
            return Ok(true);
        }
        Ok(false)
    }

    /// (Re)open the path from the beginning, discarding partial state.
    async fn open(&mut self) -> io::Result<()> {
        let file = File::open(&self.path).await?;
        self.ino = file.metadata().await?.ino();
        self.offset = 0;
        self.partial.clear();
        self.file = Some(file);
        Ok(())
    }
}
