//! Durable key-value state for the balance and anchor.
//!
//! The scheduler writes both values through on every change and reads them
//! once at startup. Any read failure (missing file, unreadable file, corrupt
//! value) falls back to the defaults: zero balance, anchor at "now".

use crate::clock::EpochMillis;
use crate::error::{PiggyError, Result};
use crate::money::Cents;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Store key for the balance, persisted as a decimal string (`"1.50"`).
pub const BALANCE_KEY: &str = "balance";

/// Store key for the anchor, persisted as epoch milliseconds.
pub const ANCHOR_KEY: &str = "anchor";

/// String key-value store with last-write-wins semantics.
pub trait StateStore: Send {
    /// Read a value. `Ok(None)` when the key has never been written.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// The persisted part of the scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedState {
    pub balance: Cents,
    pub anchor: EpochMillis,
}

impl PersistedState {
    /// Read balance and anchor, substituting defaults for anything absent or
    /// unreadable.
    pub fn load(store: &dyn StateStore, now: EpochMillis) -> Self {
        let balance = match store.get(BALANCE_KEY) {
            Ok(Some(raw)) => Cents::parse(&raw).unwrap_or_else(|e| {
                warn!("ignoring corrupt persisted balance {raw:?}: {e}");
                Cents::ZERO
            }),
            Ok(None) => Cents::ZERO,
            Err(e) => {
                warn!("cannot read persisted balance, starting from zero: {e}");
                Cents::ZERO
            }
        };

        let anchor = match store.get(ANCHOR_KEY) {
            Ok(Some(raw)) => raw.trim().parse::<EpochMillis>().unwrap_or_else(|e| {
                warn!("ignoring corrupt persisted anchor {raw:?}: {e}");
                now
            }),
            Ok(None) => now,
            Err(e) => {
                warn!("cannot read persisted anchor, anchoring at now: {e}");
                now
            }
        };

        debug!(%balance, anchor, "loaded scheduler state");
        Self { balance, anchor }
    }

    /// Write both values. The caller decides whether a failure matters.
    pub fn save(&self, store: &mut dyn StateStore) -> Result<()> {
        store.set(BALANCE_KEY, &self.balance.to_string())?;
        store.set(ANCHOR_KEY, &self.anchor.to_string())?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// On-disk layout of [`JsonFileStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFile {
    /// Schema version.
    #[serde(default = "default_store_version")]
    version: u8,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

fn default_store_version() -> u8 {
    1
}

/// File-backed store holding every entry in one pretty-printed JSON file.
///
/// The file is read lazily on first access and rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Option<BTreeMap<String, String>>,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Default state file: `~/.config/piggy/state.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("piggy").join("state.json"))
    }

    fn read_file(path: &Path) -> Result<BTreeMap<String, String>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(PiggyError::Store(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };

        let file: StoreFile = serde_json::from_slice(&bytes)
            .map_err(|e| PiggyError::Store(format!("cannot parse {}: {e}", path.display())))?;
        Ok(file.entries)
    }

    fn write_file(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PiggyError::Store(format!("cannot create state dir: {e}")))?;
        }

        let file = StoreFile {
            version: default_store_version(),
            entries: entries.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| PiggyError::Store(format!("cannot serialize state: {e}")))?;
        std::fs::write(&self.path, json)
            .map_err(|e| PiggyError::Store(format!("cannot write state: {e}")))?;
        Ok(())
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(entries) = &self.entries {
            return Ok(entries.get(key).cloned());
        }
        Ok(Self::read_file(&self.path)?.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.entries.is_none() {
            // A corrupt file is treated like a missing one and overwritten.
            let loaded = Self::read_file(&self.path).unwrap_or_else(|e| {
                warn!("replacing unreadable state file: {e}");
                BTreeMap::new()
            });
            self.entries = Some(loaded);
        }

        let mut entries = self.entries.take().unwrap_or_default();
        entries.insert(key.to_owned(), value.to_owned());
        let result = self.write_file(&entries);
        self.entries = Some(entries);
        result
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-memory store. Clones share the same entries, so a caller can keep a
/// clone to inspect what the scheduler wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate an entry.
    #[must_use]
    pub fn with_entry(self, key: &str, value: &str) -> Self {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_owned(), value.to_owned());
        }
        self
    }

    /// Current value of `key`, bypassing failure injection.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    /// Make every subsequent `get` fail, simulating an unavailable store.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `set` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PiggyError::Store("store unavailable".to_owned()));
        }
        let entries = self
            .entries
            .lock()
            .map_err(|e| PiggyError::Store(format!("store lock poisoned: {e}")))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PiggyError::Store("store unavailable".to_owned()));
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| PiggyError::Store(format!("store lock poisoned: {e}")))?;
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}
