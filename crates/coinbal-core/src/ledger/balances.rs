use tracing::{debug, info};

use super::Ledger;
use crate::error::Result;
use crate::key::{BalanceKey, Namespace};
use crate::model::{Address, Balance};
use crate::store::{self, Selector};

impl Ledger<'_> {
    /// Loads the balance at `key`, or a zero balance if none is stored.
    ///
    /// Nothing is persisted here. With `enforce_address` the address must
    /// have a wallet record.
    pub fn check_or_create(&self, key: &BalanceKey, enforce_address: bool) -> Result<Balance> {
        if enforce_address {
            self.require_address(&key.address)?;
        }
        let stored: Option<Balance> = store::load(self.store(), &key.state_key())?;
        Ok(stored.unwrap_or_else(|| {
            debug!(balance = %key, "no stored balance, starting from zero");
            Balance::zero(&key.address, &key.token)
        }))
    }

    pub fn save_balance(&mut self, balance: &Balance) -> Result<()> {
        store::save(self.store_mut(), balance.key().state_key(), balance)
    }

    /// Existence-checked read of one balance.
    pub fn balance_of(&self, address: &str, symbol: &str) -> Result<Balance> {
        self.check_or_create(&BalanceKey::new(address, symbol), true)
    }

    /// Materializes the (possibly zero) balance. Repeating it changes nothing.
    pub fn initialise_balance(&mut self, address: &str, symbol: &str) -> Result<Balance> {
        let balance = self.balance_of(address, symbol)?;
        self.save_balance(&balance)?;
        info!(balance = %balance.key(), amount = %balance.amount, "balance initialised");
        Ok(balance)
    }

    /// Every stored balance of `address`, ordered by token symbol.
    pub fn balances_of_address(&self, address: &str) -> Result<Vec<Balance>> {
        self.store()
            .scan_partial(Namespace::Balances, &[address])?
            .into_iter()
            .map(|(key, bytes)| store::decode(&key, &bytes))
            .collect()
    }

    /// Every stored balance of `symbol`, in the store's query order.
    pub fn balances_of_token(&self, symbol: &str) -> Result<Vec<Balance>> {
        let selector = Selector::field_eq(Namespace::Balances, "Token", symbol);
        self.store()
            .query(&selector)?
            .map(|hit| hit.and_then(|(key, bytes)| store::decode(&key, &bytes)))
            .collect()
    }

    pub fn token_holders(&self, symbol: &str) -> Result<Vec<Address>> {
        Ok(self
            .balances_of_token(symbol)?
            .into_iter()
            .map(|balance| balance.address)
            .collect())
    }
}
