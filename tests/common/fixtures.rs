//! Temp-dir log file fixtures.
//!
//! [`LogDir`] wraps a [`tempfile::TempDir`] and exposes the small set of
//! filesystem operations the harnesses exercise: append, truncate, and
//! rotate. Writes are flushed before returning so a tailer's next poll sees
//! them.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub struct LogDir {
    dir: tempfile::TempDir,
}

impl LogDir {
    pub fn new() -> Self {
        LogDir {
            dir: tempfile::TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Create (or truncate) an empty file.
    pub fn create(&self, name: &str) -> PathBuf {
        let path = self.path(name);
        File::create(&path).expect("create log file");
        path
    }

    /// Append `lines`, each newline-terminated.
    pub fn append(&self, name: &str, lines: &[&str]) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(name))
            .expect("open log file for append");
        for line in lines {
            writeln!(file, "{line}").expect("append line");
        }
        file.flush().expect("flush log file");
    }

    /// Append raw bytes without adding a newline.
    pub fn append_raw(&self, name: &str, bytes: &[u8]) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(name))
            .expect("open log file for append");
        file.write_all(bytes).expect("append bytes");
        file.flush().expect("flush log file");
    }

    /// Rename the file aside, logrotate-style. The next `append` to the
    /// original name recreates it as a new inode.
    pub fn rotate(&self, name: &str) {
        let path = self.path(name);
        let mut aside = path.clone().into_os_string();
        aside.push(".1");
        fs::rename(&path, aside).expect("rotate log file aside");
    }

    /// Truncate the file to zero length in place (same inode).
    pub fn truncate(&self, name: &str) {
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.path(name))
            .expect("truncate log file");
    }
}

impl Default for LogDir {
    fn default() -> Self {
        Self::new()
    }
}
