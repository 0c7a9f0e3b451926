//! Per-session attendance log.
//!
//! The log file is truncated when a session starts and receives one
//! `<name> -> Present` line the first time each student is seen.

use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Status written for every recognised student.
pub const PRESENT: &str = "Present";

/// One line of the attendance log.
#[derive(Debug, Clone)]
pub struct AttendanceEntry {
    pub name: String,
    pub marked_at: DateTime<Local>,
}

/// Append-only log with a present-set guarding against duplicates.
pub struct AttendanceLog {
    path: PathBuf,
    writer: BufWriter<File>,
    present: HashSet<String>,
    entries: Vec<AttendanceEntry>,
}

impl AttendanceLog {
    /// Create (or truncate) the log file at `path`.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        tracing::debug!(path = %path.display(), "attendance log opened");
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            present: HashSet::new(),
            entries: Vec::new(),
        })
    }

    /// Mark `name` present.
    ///
    /// Returns `Ok(false)` without writing if the student was already marked
    /// in this session. The line is flushed before the student enters the
    /// present-set, so a failed write can be retried on a later frame.
    pub fn record(&mut self, name: &str) -> io::Result<bool> {
        if self.present.contains(name) {
            return Ok(false);
        }

        writeln!(self.writer, "{name} -> {PRESENT}")?;
        self.writer.flush()?;

        self.present.insert(name.to_string());
        self.entries.push(AttendanceEntry {
            name: name.to_string(),
            marked_at: Local::now(),
        });
        Ok(true)
    }

    /// Entries in the order they were written.
    pub fn entries(&self) -> &[AttendanceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
