//! File-backed issue tracker.
//!
//! Items are loaded from a JSON snapshot (an array of items) into a
//! [`MemoryTracker`] working copy. Changes stay in memory until
//! [`FileTracker::save`] writes the snapshot back via temp file + rename.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::core::item::{Comment, LabelEvent, TrackedItem};
use crate::error::{Result, StewardError};
use crate::tracker::{IssueTracker, MemoryTracker};

/// Issue tracker backed by a JSON snapshot file.
#[derive(Debug)]
pub struct FileTracker {
    /// Snapshot location.
    path: PathBuf,
    /// Working copy.
    inner: MemoryTracker,
}

impl FileTracker {
    /// Open a snapshot, acting as `actor`.
    pub fn open(path: impl Into<PathBuf>, actor: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let content = fs::read_to_string(&path).map_err(|e| StewardError::storage(&path, e))?;
        let items: Vec<TrackedItem> = serde_json::from_str(&content)?;
        let inner = MemoryTracker::with_items(actor, items)?;
        Ok(Self { path, inner })
    }

    #[cfg(test)]
    pub(crate) fn path(&self) -> &std::path::Path {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn working_copy(&self) -> &MemoryTracker {
        &self.inner
    }

    /// Write the working copy back to the snapshot file.
    pub fn save(&self) -> Result<()> {
        let items = self.inner.items()?;
        let json = serde_json::to_string_pretty(&items)?;

        let temp_path = self.temp_path();
        {
            let mut file =
                fs::File::create(&temp_path).map_err(|e| StewardError::storage(&temp_path, e))?;
            file.write_all(json.as_bytes())
                .map_err(|e| StewardError::storage(&temp_path, e))?;
            file.sync_all()
                .map_err(|e| StewardError::storage(&temp_path, e))?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| StewardError::storage(&self.path, e))?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "items.json".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }
}

impl IssueTracker for FileTracker {
    fn items(&self) -> Result<Vec<TrackedItem>> {
        self.inner.items()
    }

    fn label_events(&self, number: u64) -> Result<Vec<LabelEvent>> {
        self.inner.label_events(number)
    }

    fn last_modified(&self, number: u64) -> Result<DateTime<Utc>> {
        self.inner.last_modified(number)
    }

    fn comments(&self, number: u64) -> Result<Vec<Comment>> {
        self.inner.comments(number)
    }

    fn add_label(&self, number: u64, label: &str) -> Result<()> {
        self.inner.add_label(number, label)
    }

    fn remove_label(&self, number: u64, label: &str) -> Result<()> {
        self.inner.remove_label(number, label)
    }

    fn post_comment(&self, number: u64, body: &str) -> Result<Comment> {
        self.inner.post_comment(number, body)
    }

    fn delete_comment(&self, number: u64, id: u64) -> Result<()> {
        self.inner.delete_comment(number, id)
    }

    fn clear_milestone(&self, number: u64) -> Result<()> {
        self.inner.clear_milestone(number)
    }

    fn flush(&self) -> Result<()> {
        self.save()
    }
}
