//! Persistence for the model selection and per-model preferences.
//!
//! Two small JSON files under `~/.local/share/deltactl/`: `selection.json`
//! holds the `{id, model}` pair of the last confirmed selection, and
//! `context_lengths.json` maps model identifiers to a preferred context
//! length. Writes are last-write-wins and always follow a completed state
//! transition, so no locking is needed.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use super::state::PersistedSelection;
use crate::config::Config;

/// File-backed store for the selection and context-length preferences.
pub struct SelectionStore {
    dir: PathBuf,
}

impl SelectionStore {
    /// Opens the store at the platform data directory.
    pub fn new() -> Result<Self> {
        Ok(Self::at(Config::data_dir()?))
    }

    /// Opens the store at an explicit directory. Tests point this at a
    /// temp dir.
    pub fn at(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Returns the persisted selection, or `None` when absent or
    /// unreadable. A corrupt file is treated as no selection.
    pub fn load_selection(&self) -> Option<PersistedSelection> {
        let contents = fs::read_to_string(self.selection_path()).ok()?;
        serde_json::from_str(&contents).ok()
    }

    pub fn save_selection(&self, selection: &PersistedSelection) -> Result<()> {
        fs::create_dir_all(&self.dir).context("Failed to create data directory")?;
        let json = serde_json::to_string_pretty(selection)?;
        fs::write(self.selection_path(), json).context("Failed to write selection")?;
        Ok(())
    }

    pub fn clear_selection(&self) -> Result<()> {
        let path = self.selection_path();
        if path.exists() {
            fs::remove_file(&path).context("Failed to clear selection")?;
        }
        Ok(())
    }

    /// Returns the preferred context length for a model, keyed by its
    /// underlying identifier.
    pub fn context_length_for(&self, model: &str) -> Option<u32> {
        self.load_context_prefs().get(model).copied()
    }

    pub fn set_context_length(&self, model: &str, length: u32) -> Result<()> {
        fs::create_dir_all(&self.dir).context("Failed to create data directory")?;
        let mut prefs = self.load_context_prefs();
        prefs.insert(model.to_string(), length);
        let json = serde_json::to_string_pretty(&prefs)?;
        fs::write(self.context_prefs_path(), json)
            .context("Failed to write context-length preferences")?;
        Ok(())
    }

    fn load_context_prefs(&self) -> HashMap<String, u32> {
        fs::read_to_string(self.context_prefs_path())
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default()
    }

    fn selection_path(&self) -> PathBuf {
        self.dir.join(crate::constants::SELECTION_FILENAME)
    }

    fn context_prefs_path(&self) -> PathBuf {
        self.dir.join(crate::constants::CONTEXT_PREFS_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(tag: &str) -> SelectionStore {
        let dir = std::env::temp_dir().join(format!("deltactl_test_{tag}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        SelectionStore::at(dir)
    }

    #[test]
    fn selection_roundtrip() {
        let store = temp_store("selection");
        assert!(store.load_selection().is_none());

        let selection = PersistedSelection {
            id: "qwen3:0.6b".to_string(),
            model: "qwen3-0.6b-instruct".to_string(),
        };
        store.save_selection(&selection).unwrap();
        assert_eq!(store.load_selection(), Some(selection));

        store.clear_selection().unwrap();
        assert!(store.load_selection().is_none());

        let _ = fs::remove_dir_all(&store.dir);
    }

    #[test]
    fn clear_without_file_is_ok() {
        let store = temp_store("clear");
        store.clear_selection().unwrap();
    }

    #[test]
    fn context_lengths_are_scoped_per_model() {
        let store = temp_store("context");
        assert!(store.context_length_for("qwen3:0.6b").is_none());

        store.set_context_length("qwen3:0.6b", 8192).unwrap();
        store.set_context_length("llama3:8b", 4096).unwrap();
        assert_eq!(store.context_length_for("qwen3:0.6b"), Some(8192));
        assert_eq!(store.context_length_for("llama3:8b"), Some(4096));

        store.set_context_length("qwen3:0.6b", 16384).unwrap();
        assert_eq!(store.context_length_for("qwen3:0.6b"), Some(16384));

        let _ = fs::remove_dir_all(&store.dir);
    }

    #[test]
    fn corrupt_selection_treated_as_absent() {
        let store = temp_store("corrupt");
        fs::create_dir_all(&store.dir).unwrap();
        fs::write(store.selection_path(), "{not json").unwrap();
        assert!(store.load_selection().is_none());
        let _ = fs::remove_dir_all(&store.dir);
    }
}
