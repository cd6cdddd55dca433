//! In-process transactional store implementing [`LedgerStore`].
//!
//! Committed state lives in a [`MemoryStore`]; each invocation works in a
//! [`Transaction`] that buffers its writes and records the version of every
//! committed key it read. `commit` rejects the whole write set if any of
//! those keys changed in the meantime.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LedgerError, Result};
use crate::key::{Namespace, StateKey};
use crate::store::{LedgerStore, Selector, StateIter};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Entry {
    version: u64,
    /// `None` marks a tombstone.
    #[serde(with = "hex_bytes")]
    value: Option<Vec<u8>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Committed {
    height: u64,
    entries: BTreeMap<String, Entry>,
}

impl Committed {
    fn version_of(&self, key: &str) -> u64 {
        self.entries.get(key).map(|e| e.version).unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Committed>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an invocation-scoped transaction over the current committed state.
    pub fn begin(&self) -> Transaction<'_> {
        Transaction {
            store: self,
            reads: RefCell::new(BTreeMap::new()),
            writes: BTreeMap::new(),
        }
    }

    /// Number of commits that carried at least one write.
    pub fn height(&self) -> u64 {
        self.inner.read().height
    }

    pub fn committed_value(&self, key: &StateKey) -> Option<Vec<u8>> {
        self.inner
            .read()
            .entries
            .get(&key.encode())
            .and_then(|e| e.value.clone())
    }

    /// Loads a snapshot written by [`MemoryStore::save`]; a missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let bytes = fs::read(path)
            .map_err(|e| LedgerError::Store(format!("read {}: {e}", path.display())))?;
        let committed: Committed = serde_json::from_slice(&bytes)
            .map_err(|e| LedgerError::Store(format!("parse {}: {e}", path.display())))?;
        debug!(path = %path.display(), height = committed.height, "state snapshot loaded");
        Ok(Self {
            inner: RwLock::new(committed),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = {
            let committed = self.inner.read();
            serde_json::to_vec_pretty(&*committed)
                .map_err(|e| LedgerError::Store(format!("encode snapshot: {e}")))?
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| LedgerError::Store(format!("mkdir {}: {e}", parent.display())))?;
            }
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)
            .map_err(|e| LedgerError::Store(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, path)
            .map_err(|e| LedgerError::Store(format!("rename to {}: {e}", path.display())))?;
        Ok(())
    }
}

pub struct Transaction<'a> {
    store: &'a MemoryStore,
    reads: RefCell<BTreeMap<String, u64>>,
    writes: BTreeMap<String, Option<Vec<u8>>>,
}

impl Transaction<'_> {
    /// Validates the read set and applies every buffered write at once.
    ///
    /// Returns the new store height. On [`LedgerError::Conflict`] nothing is
    /// written and the invocation may be retried from scratch.
    pub fn commit(self) -> Result<u64> {
        let mut committed = self.store.inner.write();
        for (key, seen) in self.reads.borrow().iter() {
            if committed.version_of(key) != *seen {
                warn!(key = %key, "write conflict, discarding invocation");
                return Err(LedgerError::Conflict { key: key.clone() });
            }
        }
        if self.writes.is_empty() {
            return Ok(committed.height);
        }
        committed.height += 1;
        let version = committed.height;
        let count = self.writes.len();
        for (key, value) in self.writes {
            committed.entries.insert(key, Entry { version, value });
        }
        debug!(height = version, writes = count, "transaction committed");
        Ok(version)
    }

    fn record_read(&self, key: &str, version: u64) {
        self.reads.borrow_mut().entry(key.to_string()).or_insert(version);
    }

    /// Live entries under `prefix`, with this transaction's writes layered on top.
    fn merged_range(&self, prefix: &str) -> Result<Vec<(StateKey, Vec<u8>)>> {
        let mut view: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        {
            let committed = self.store.inner.read();
            let hits = committed
                .entries
                .range(prefix.to_string()..)
                .take_while(|(k, _)| k.starts_with(prefix));
            for (key, entry) in hits {
                self.record_read(key, entry.version);
                if let Some(value) = &entry.value {
                    view.insert(key.clone(), value.clone());
                }
            }
        }
        let pending = self
            .writes
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix));
        for (key, value) in pending {
            match value {
                Some(v) => view.insert(key.clone(), v.clone()),
                None => view.remove(key),
            };
        }
        view.into_iter()
            .map(|(key, value)| Ok((StateKey::decode(&key)?, value)))
            .collect()
    }
}

impl LedgerStore for Transaction<'_> {
    fn get_state(&self, key: &StateKey) -> Result<Option<Vec<u8>>> {
        let encoded = key.encode();
        if let Some(pending) = self.writes.get(&encoded) {
            return Ok(pending.clone());
        }
        let committed = self.store.inner.read();
        let entry = committed.entries.get(&encoded);
        self.record_read(&encoded, entry.map(|e| e.version).unwrap_or(0));
        Ok(entry.and_then(|e| e.value.clone()))
    }

    fn put_state(&mut self, key: StateKey, value: Vec<u8>) -> Result<()> {
        self.writes.insert(key.encode(), Some(value));
        Ok(())
    }

    fn delete_state(&mut self, key: &StateKey) -> Result<()> {
        self.writes.insert(key.encode(), None);
        Ok(())
    }

    fn scan_partial(&self, namespace: Namespace, partial: &[&str]) -> Result<Vec<(StateKey, Vec<u8>)>> {
        let prefix = StateKey::new(namespace, partial.iter().copied()).scan_prefix();
        self.merged_range(&prefix)
    }

    fn query(&self, selector: &Selector) -> Result<StateIter<'_>> {
        let prefix = StateKey::new(selector.namespace, Vec::<String>::new()).scan_prefix();
        let selector = selector.clone();
        let hits = self.merged_range(&prefix)?;
        Ok(Box::new(
            hits.into_iter()
                .filter(move |(_, value)| selector.matches(value))
                .map(Ok),
        ))
    }
}

mod hex_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| hex::decode(encoded).map_err(D::Error::custom))
            .transpose()
    }
}
