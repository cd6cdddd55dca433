//! Ledger access adapter: the only contract the engine has with storage.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{LedgerError, Result};
use crate::key::{Namespace, StateKey};

/// Single-pass, finite sequence of query hits in the store's native order.
pub type StateIter<'a> = Box<dyn Iterator<Item = Result<(StateKey, Vec<u8>)>> + 'a>;

/// Field-equality filter over the JSON documents of one namespace.
#[derive(Clone, Debug, PartialEq)]
pub struct Selector {
    pub namespace: Namespace,
    pub field: String,
    pub value: Value,
}

impl Selector {
    pub fn field_eq(namespace: Namespace, field: &str, value: impl Into<Value>) -> Self {
        Self {
            namespace,
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn matches(&self, document: &[u8]) -> bool {
        serde_json::from_slice::<Value>(document)
            .ok()
            .and_then(|doc| doc.get(&self.field).cloned())
            .is_some_and(|v| v == self.value)
    }
}

/// Invocation-scoped view of the replicated key-value store.
///
/// Implementations guarantee that every write made through one instance
/// commits together or not at all.
pub trait LedgerStore {
    fn get_state(&self, key: &StateKey) -> Result<Option<Vec<u8>>>;

    fn put_state(&mut self, key: StateKey, value: Vec<u8>) -> Result<()>;

    /// Writes a tombstone; later reads see the key as absent.
    fn delete_state(&mut self, key: &StateKey) -> Result<()>;

    /// Every live entry of `namespace` whose leading components equal `partial`.
    fn scan_partial(&self, namespace: Namespace, partial: &[&str]) -> Result<Vec<(StateKey, Vec<u8>)>>;

    fn query(&self, selector: &Selector) -> Result<StateIter<'_>>;
}

pub(crate) fn load<T: DeserializeOwned>(store: &dyn LedgerStore, key: &StateKey) -> Result<Option<T>> {
    match store.get_state(key)? {
        Some(bytes) => decode(key, &bytes).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn save<T: Serialize>(store: &mut dyn LedgerStore, key: StateKey, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value).map_err(|source| LedgerError::Codec {
        key: key.encode(),
        source,
    })?;
    store.put_state(key, bytes)
}

pub(crate) fn decode<T: DeserializeOwned>(key: &StateKey, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|source| LedgerError::Codec {
        key: key.encode(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_matches_field_equality() {
        let selector = Selector::field_eq(Namespace::Token, "TokenType", "NFTPOD");
        assert!(selector.matches(br#"{"Symbol":"A","TokenType":"NFTPOD"}"#));
        assert!(!selector.matches(br#"{"Symbol":"B","TokenType":"CRYPTO"}"#));
        assert!(!selector.matches(br#"{"Symbol":"C"}"#));
        assert!(!selector.matches(b"not json"));
    }
}
