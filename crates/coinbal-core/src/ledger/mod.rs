//! Ledger components operating on one invocation's store view.
//!
//! [`Ledger`] wraps the invocation-scoped [`LedgerStore`]; each component
//! (wallets, token registry, balance store, transfer engine, mint/burn,
//! financial scores) adds its operations in its own `impl Ledger` block.
//! Nothing is cached across invocations: every operation reads current
//! state through the store.

mod balances;
mod registry;
mod scores;
mod supply;
mod transfer;
mod wallets;

pub use transfer::verify_sender;

use crate::store::LedgerStore;

pub struct Ledger<'s> {
    store: &'s mut dyn LedgerStore,
}

impl<'s> Ledger<'s> {
    pub fn new(store: &'s mut dyn LedgerStore) -> Self {
        Self { store }
    }

    fn store(&self) -> &dyn LedgerStore {
        &*self.store
    }

    fn store_mut(&mut self) -> &mut dyn LedgerStore {
        &mut *self.store
    }
}
