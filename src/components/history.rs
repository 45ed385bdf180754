use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::log_warn;

pub const DEFAULT_MAX_HISTORY_ITEMS: usize = 10;
/// Prompts shorter than this (after trimming) are not remembered.
pub const MIN_HISTORY_PROMPT_CHARS: usize = 5;

// ============================================================================
// STORE ERRORS
// ============================================================================

/// Error type for the on-disk history and credential files.
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Serialize(String),
    InvalidFormat(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "I/O error: {}", e),
            StoreError::Serialize(e) => write!(f, "Serialization error: {}", e),
            StoreError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for StoreError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        StoreError::Serialize(e.to_string())
    }
}

// ============================================================================
// PROMPT HISTORY
// ============================================================================

/// Most-recent-first list of distinct prompts, capped in length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptHistory {
    items: Vec<String>,
    max_items: usize,
}

impl Default for PromptHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_ITEMS)
    }
}

impl PromptHistory {
    pub fn new(max_items: usize) -> Self {
        Self {
            items: Vec::new(),
            max_items,
        }
    }

    pub fn from_items(items: Vec<String>, max_items: usize) -> Self {
        let mut h = Self { items, max_items };
        h.items.truncate(max_items);
        h
    }

    /// Remember a prompt. Returns false when it was too short to keep.
    pub fn add(&mut self, prompt: &str) -> bool {
        let trimmed = prompt.trim();
        if trimmed.chars().count() < MIN_HISTORY_PROMPT_CHARS {
            return false;
        }
        self.items.retain(|p| p != trimmed);
        self.items.insert(0, trimmed.to_string());
        self.items.truncate(self.max_items);
        true
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Menu label: "3. first fifty characters..."
    pub fn display_label(&self, index: usize) -> Option<String> {
        let prompt = self.items.get(index)?;
        let shown = if prompt.chars().count() > 50 {
            format!("{}...", prompt.chars().take(50).collect::<String>())
        } else {
            prompt.clone()
        };
        Some(format!("{}. {}", index + 1, shown))
    }
}

// ============================================================================
// HISTORY STORES
// ============================================================================

pub trait HistoryStore {
    fn append(&mut self, prompt: &str) -> Result<(), StoreError>;
    /// Most recent first.
    fn list(&self) -> Vec<String>;
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// Non-persistent store for tests and embedding hosts.
#[derive(Clone, Debug, Default)]
pub struct MemoryHistoryStore {
    history: PromptHistory,
}

impl MemoryHistoryStore {
    pub fn new(max_items: usize) -> Self {
        Self {
            history: PromptHistory::new(max_items),
        }
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn append(&mut self, prompt: &str) -> Result<(), StoreError> {
        self.history.add(prompt);
        Ok(())
    }

    fn list(&self) -> Vec<String> {
        self.history.items().to_vec()
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.history.clear();
        Ok(())
    }
}

pub const HISTORY_FILE_NAME: &str = "refpaint_history.bin";
const HISTORY_MAGIC: &str = "RPH1";

#[derive(Serialize, Deserialize)]
struct HistoryFile {
    magic: String,
    items: Vec<String>,
}

/// History persisted as a small bincode file, rewritten after every change.
#[derive(Debug)]
pub struct FileHistoryStore {
    path: PathBuf,
    history: PromptHistory,
}

impl FileHistoryStore {
    pub fn default_path() -> Option<PathBuf> {
        crate::settings::config_dir().map(|d| d.join(HISTORY_FILE_NAME))
    }

    /// Open (or start) the history file at `path`. A missing file is an empty
    /// history; a corrupt one is logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>, max_items: usize) -> Self {
        let path = path.into();
        let items = match read_history(&path) {
            Ok(items) => items,
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                log_warn!("Discarding unreadable prompt history {}: {}", path.display(), e);
                Vec::new()
            }
        };
        Self {
            path,
            history: PromptHistory::from_items(items, max_items),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let file = File::create(&self.path)?;
        let data = HistoryFile {
            magic: HISTORY_MAGIC.to_string(),
            items: self.history.items().to_vec(),
        };
        bincode::serialize_into(BufWriter::new(file), &data)?;
        Ok(())
    }
}

fn read_history(path: &Path) -> Result<Vec<String>, StoreError> {
    let raw = std::fs::read(path)?;
    let file: HistoryFile = bincode::deserialize(&raw)?;
    if file.magic != HISTORY_MAGIC {
        return Err(StoreError::InvalidFormat(format!("unexpected header '{}'", file.magic)));
    }
    Ok(file.items)
}

impl HistoryStore for FileHistoryStore {
    fn append(&mut self, prompt: &str) -> Result<(), StoreError> {
        if self.history.add(prompt) {
            self.flush()?;
        }
        Ok(())
    }

    fn list(&self) -> Vec<String> {
        self.history.items().to_vec()
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.history.clear();
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_prompts_are_skipped() {
        let mut h = PromptHistory::default();
        assert!(!h.add("  cat "));
        assert!(!h.add("abcd"));
        assert!(h.add("  a cat on a mat  "));
        assert_eq!(h.items(), ["a cat on a mat"]);
    }

    #[test]
    fn duplicates_move_to_front_and_list_is_capped() {
        let mut h = PromptHistory::new(3);
        for p in ["prompt one", "prompt two", "prompt three", "prompt one", "prompt four"] {
            h.add(p);
        }
        assert_eq!(h.items(), ["prompt four", "prompt one", "prompt three"]);
    }

    #[test]
    fn labels_truncate_long_prompts() {
        let mut h = PromptHistory::default();
        h.add(&"x".repeat(80));
        let label = h.display_label(0).unwrap();
        assert_eq!(label, format!("1. {}...", "x".repeat(50)));
        assert!(h.display_label(1).is_none());
    }

    #[test]
    fn file_store_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.bin");
        {
            let mut store = FileHistoryStore::open(&path, 10);
            store.append("first prompt").unwrap();
            store.append("second prompt").unwrap();
        }
        let mut store = FileHistoryStore::open(&path, 10);
        assert_eq!(store.list(), vec!["second prompt", "first prompt"]);
        store.clear().unwrap();
        assert!(FileHistoryStore::open(&path, 10).list().is_empty());
    }

    #[test]
    fn corrupt_history_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.bin");
        std::fs::write(&path, b"garbage").unwrap();
        let mut store = FileHistoryStore::open(&path, 10);
        assert!(store.list().is_empty());
        store.append("recovered prompt").unwrap();
        assert_eq!(FileHistoryStore::open(&path, 10).list(), vec!["recovered prompt"]);
    }
}
