//! Accepted-line history.
//!
//! A bounded log, most recent entry last. When full, the oldest entry is
//! evicted. Consecutive duplicates and empty lines are never recorded.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Entries kept when no size is configured.
pub const DEFAULT_HISTORY_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<String>,
    max_size: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

impl History {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_size,
        }
    }

    /// Append `line`. Returns whether it was recorded.
    pub fn push(&mut self, line: &str) -> bool {
        if line.is_empty() || self.max_size == 0 {
            return false;
        }
        if self.entries.back().is_some_and(|last| last == line) {
            return false;
        }
        while self.entries.len() >= self.max_size {
            self.entries.pop_front();
        }
        self.entries.push_back(line.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Entry at `index`, oldest first.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Index of the newest entry older than `before` that contains
    /// `pattern`. An empty pattern matches nothing.
    pub fn search_backward(&self, pattern: &str, before: usize) -> Option<usize> {
        if pattern.is_empty() {
            return None;
        }
        let end = before.min(self.entries.len());
        self.entries
            .range(..end)
            .rposition(|entry| entry.contains(pattern))
    }

    /// Append the lines of a plain-text history file. A missing file is
    /// not an error. Returns the number of entries recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(&mut self, path: &Path) -> Result<usize> {
        if !path.exists() {
            return Ok(0);
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read history {}", path.display()))?;
        let recorded = content.lines().filter(|line| self.push(line)).count();
        tracing::debug!(path = %path.display(), recorded, "loaded history");
        Ok(recorded)
    }

    /// Write every entry, one per line, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create history dir {}", parent.display()))?;
        }
        let mut content = String::new();
        for entry in &self.entries {
            content.push_str(entry);
            content.push('\n');
        }
        fs::write(path, content)
            .with_context(|| format!("Failed to write history {}", path.display()))
    }
}
