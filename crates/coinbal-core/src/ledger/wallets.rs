use tracing::info;

use super::Ledger;
use crate::error::{LedgerError, Result};
use crate::key::StateKey;
use crate::store;

impl Ledger<'_> {
    pub fn register_address(&mut self, address: &str) -> Result<()> {
        if self.address_exists(address)? {
            return Err(LedgerError::Duplicate(format!(
                "address {address} is already registered"
            )));
        }
        store::save(self.store_mut(), StateKey::wallet(address), &address)?;
        info!(address, "wallet registered");
        Ok(())
    }

    pub fn address_exists(&self, address: &str) -> Result<bool> {
        Ok(self.store().get_state(&StateKey::wallet(address))?.is_some())
    }

    pub(crate) fn require_address(&self, address: &str) -> Result<()> {
        if self.address_exists(address)? {
            Ok(())
        } else {
            Err(LedgerError::NotFound(format!(
                "the address {address} is not registered"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::LedgerError;
    use crate::ledger::testkit::with_ledger;
    use crate::memory::MemoryStore;

    #[test]
    fn addresses_register_once() {
        let store = MemoryStore::new();
        with_ledger(&store, |l| l.register_address("alice")).unwrap();
        let err = with_ledger(&store, |l| l.register_address("alice")).unwrap_err();
        assert!(matches!(err, LedgerError::Duplicate(_)));
        assert!(with_ledger(&store, |l| l.address_exists("alice")).unwrap());
        assert!(!with_ledger(&store, |l| l.address_exists("bob")).unwrap());
        let err = with_ledger(&store, |l| l.require_address("bob")).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }
}
