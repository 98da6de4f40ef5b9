//! Core types for flare-core.
//!
//! This module defines the fundamental data structures shared across all
//! pipeline stages: the [`Severity`] ladder, the raw [`LogEvent`] produced by
//! a tail source, the [`Fragment`] partition of a highlighted line, and the
//! consumer-facing [`HighlightedEvent`].

use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Importance level a rule assigns to a match, most urgent first.
///
/// The derived `Ord` follows declaration order, so `Critical < High < …`,
/// which is exactly the "lower rank is more urgent" comparison used
/// throughout the matcher and the severity filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Normal,
}

impl Severity {
    /// Integer rank, `Critical` = 0 through `Normal` = 4.
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Whether this severity is at least as urgent as `min`.
    pub fn meets(self, min: Severity) -> bool {
        self.rank() <= min.rank()
    }

    /// Lenient conversion from a rule-definition label. Unknown or empty
    /// labels normalise to [`Severity::Medium`]; `med` is accepted as an
    /// alias. Use the strict [`FromStr`] impl when unknown input must be
    /// rejected instead (e.g. CLI flags).
    pub fn from_label(label: &str) -> Severity {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "low" => Severity::Low,
            "normal" => Severity::Normal,
            _ => Severity::Medium,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
            Severity::Normal => write!(f, "normal"),
        }
    }
}

/// Strict severity parse for user-supplied input.
impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" | "med" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "normal" => Ok(Severity::Normal),
            _ => Err(UnknownSeverity(value.to_string())),
        }
    }
}

/// Error returned by the strict [`Severity`] parse.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown severity {0:?} (expected critical|high|medium|low|normal)")]
pub struct UnknownSeverity(pub String);

/// A `[start, end)` byte-offset range into a line's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }
}

/// A single line read from a watched file.
///
/// Either `line` carries text, or `error` carries a transient read failure
/// that the tail source forwarded instead of dying. The error is `Arc`-held
/// so events stay cheaply clonable.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub path: PathBuf,
    pub line: String,
    pub error: Option<Arc<io::Error>>,
}

impl LogEvent {
    /// A successfully read line.
    pub fn line(path: impl Into<PathBuf>, line: impl Into<String>) -> Self {
        LogEvent {
            path: path.into(),
            line: line.into(),
            error: None,
        }
    }

    /// A forwarded read error.
    pub fn error(path: impl Into<PathBuf>, error: io::Error) -> Self {
        LogEvent {
            path: path.into(),
            line: String::new(),
            error: Some(Arc::new(error)),
        }
    }
}

/// A contiguous slice of a line's text with an emphasis flag.
///
/// Fragments partition a line losslessly: concatenating every fragment's
/// `text` reproduces the original line byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub emphasized: bool,
}

impl Fragment {
    pub fn plain(text: impl Into<String>) -> Self {
        Fragment {
            text: text.into(),
            emphasized: false,
        }
    }

    pub fn emphasized(text: impl Into<String>) -> Self {
        Fragment {
            text: text.into(),
            emphasized: true,
        }
    }
}

/// A classified, highlight-annotated line as consumed by the presentation
/// layer. Produced per accepted line and consumed once; the core never
/// buffers these.
#[derive(Debug, Clone)]
pub struct HighlightedEvent {
    /// Classification timestamp (UTC).
    pub ts: chrono::DateTime<chrono::Utc>,
    /// Path of the file the line came from.
    pub path: PathBuf,
    /// Raw line as read from the file (UTF-8 lossy converted).
    pub line: String,
    /// Name of the winning rule, `None` when no rule matched.
    pub rule: Option<String>,
    pub severity: Severity,
    /// Color hint copied from the winning rule, empty when unmatched.
    pub color: String,
    pub tags: Vec<String>,
    /// Lossless emphasis partition of `line`.
    pub fragments: Vec<Fragment>,
    /// Forwarded read error, if the upstream event carried one.
    pub error: Option<Arc<io::Error>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
