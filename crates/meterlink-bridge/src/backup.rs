//! Dated backup files for received telegrams
//!
//! Each telegram is appended to `{base}/{YYYY}/{MM}/{DD}.log`, derived
//! from the moment it was received. Files are append-only and never
//! rotated by this system; one file serves a calendar day.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use meterlink_core::{MeterlinkError, Result};

/// Appends telegrams to the dated log hierarchy
///
/// Every write opens, appends, and closes the target file. The handle is
/// never cached across calls, so concurrent writes for different
/// messages each perform one exclusive append and records never
/// interleave at the byte level.
#[derive(Debug, Clone)]
pub struct BackupWriter {
    base: PathBuf,
}

impl BackupWriter {
    /// Create a writer rooted at the given base path
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Base path of the log hierarchy
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn dated_dir(&self, date: NaiveDate) -> PathBuf {
        self.base
            .join(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
    }

    /// Target file for a calendar day: `{base}/{YYYY}/{MM}/{DD}.log`
    pub fn target_path(&self, date: NaiveDate) -> PathBuf {
        self.dated_dir(date).join(format!("{:02}.log", date.day()))
    }

    /// Append a telegram stamped with the current local time
    pub fn write(&self, payload: &[u8]) -> Result<PathBuf> {
        self.write_at(Local::now().naive_local(), payload)
    }

    /// Append a telegram stamped with the given receive time
    ///
    /// Creates missing directory levels (idempotent), then appends one
    /// record: a bracketed timestamp line, the raw payload bytes, and a
    /// trailing newline. The record is written with a single call so two
    /// near-simultaneous appends to the same file both land complete.
    pub fn write_at(&self, received_at: NaiveDateTime, payload: &[u8]) -> Result<PathBuf> {
        let dir = self.dated_dir(received_at.date());
        fs::create_dir_all(&dir).map_err(|e| MeterlinkError::DirectoryCreate {
            path: dir.display().to_string(),
            source: e,
        })?;

        let path = dir.join(format!("{:02}.log", received_at.day()));
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| MeterlinkError::FileOpen {
                path: path.display().to_string(),
                source: e,
            })?;

        let timestamp = received_at.format("%Y-%m-%d %H:%M:%S");
        let mut record = Vec::with_capacity(payload.len() + 24);
        record.extend_from_slice(format!("[{timestamp}]\n").as_bytes());
        record.extend_from_slice(payload);
        record.push(b'\n');

        file.write_all(&record)
            .map_err(|e| MeterlinkError::FileWrite {
                path: path.display().to_string(),
                source: e,
            })?;

        debug!(path = %path.display(), bytes = payload.len(), "appended telegram record");
        Ok(path)
    }
}
