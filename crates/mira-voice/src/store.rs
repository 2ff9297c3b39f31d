//! Single-slot JSON persistence for the script.
//!
//! The whole script is written after every mutation and read once at startup.
//! An absent or corrupt slot falls back to a script with one empty step.

use crate::error::{MiraError, MiraResult};
use crate::script::Script;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Stores the script as one JSON array in a single file slot.
pub struct ScriptStore {
    path: PathBuf,
}

impl ScriptStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default slot: MIRA_STORAGE_PATH or ./data, then mira/script.json.
    pub fn default_path() -> PathBuf {
        let base = std::env::var("MIRA_STORAGE_PATH").unwrap_or_else(|_| "./data".to_string());
        PathBuf::from(base).join("mira").join("script.json")
    }

    /// Store at the default slot path.
    pub fn open_default() -> Self {
        Self::new(Self::default_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the script, falling back to a single empty step when the slot is
    /// absent or does not parse.
    pub fn load(&self) -> Script {
        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(script) => script,
                Err(e) => {
                    warn!("script slot corrupt, starting fresh: {}", e);
                    Script::with_default_step()
                }
            },
            Err(_) => Script::with_default_step(),
        }
    }

    /// Persist the whole script. Called after every mutation.
    pub fn save(&self, script: &Script) -> MiraResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string(script).map_err(|e| MiraError::Store(e.to_string()))?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Step;

    #[test]
    fn absent_slot_yields_one_default_step() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScriptStore::new(dir.path().join("script.json"));

        let script = store.load();
        assert_eq!(script.len(), 1);
        assert!(!script.steps()[0].is_speakable());
    }

    #[test]
    fn corrupt_slot_yields_one_default_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        fs::write(&path, "{not json").unwrap();

        let script = ScriptStore::new(path).load();
        assert_eq!(script.len(), 1);
    }

    #[test]
    fn round_trip_preserves_order_text_and_delay() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScriptStore::new(dir.path().join("script.json"));

        let script = Script::from_steps(vec![
            Step::with_text("first", 0.5),
            Step::with_text("", 2.0),
            Step::with_text("third", 0.0),
        ]);
        store.save(&script).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.len(), script.len());
        for (a, b) in script.steps().iter().zip(loaded.steps()) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.delay, b.delay);
            assert_eq!(a.id, b.id);
        }
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScriptStore::new(dir.path().join("nested").join("deep").join("script.json"));
        store.save(&Script::with_default_step()).unwrap();
        assert!(store.path().exists());
    }
}
