//! Transfer engine: single signed transfers and batch transfers.
//!
//! Both paths run through a working set, so a balance touched earlier in
//! the same invocation is read back from memory rather than from the store.
//! Nothing reaches the store until the whole request has validated.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::Ledger;
use crate::amount::Amount;
use crate::auth::SignatureVerifier;
use crate::error::{LedgerError, Result};
use crate::key::BalanceKey;
use crate::model::{Balance, Output, Timestamp, Token, Transfer, TRANSFER_TYPE};

/// Balances read or updated during one invocation, keyed by (address, token).
#[derive(Debug, Default)]
struct WorkingSet {
    balances: BTreeMap<BalanceKey, Balance>,
}

impl WorkingSet {
    fn new() -> Self {
        Self::default()
    }

    /// In-batch value of `key`, falling back to the store on first touch.
    fn get_or_load(
        &mut self,
        ledger: &Ledger<'_>,
        key: &BalanceKey,
        enforce_address: bool,
    ) -> Result<Balance> {
        if let Some(balance) = self.balances.get(key) {
            return Ok(balance.clone());
        }
        let balance = ledger.check_or_create(key, enforce_address)?;
        Ok(balance)
    }

    fn put(&mut self, balance: Balance) {
        self.balances.insert(balance.key(), balance);
    }

    /// Writes every touched balance through `ledger` and hands them back.
    fn flush(self, ledger: &mut Ledger<'_>) -> Result<BTreeMap<BalanceKey, Balance>> {
        for balance in self.balances.values() {
            ledger.save_balance(balance)?;
        }
        Ok(self.balances)
    }
}

/// Rejects a transfer unless `signature` signs its digest under the sender's key.
///
/// The supplied `digest` must equal [`Transfer::digest`], so a signature
/// cannot be replayed against different transfer fields.
pub fn verify_sender(
    verifier: &dyn SignatureVerifier,
    transfer: &Transfer,
    digest: &str,
    signature: &str,
) -> Result<()> {
    let expected = transfer.digest_hex();
    let supplied = digest.trim();
    let supplied = supplied.strip_prefix("0x").unwrap_or(supplied);
    if !supplied.eq_ignore_ascii_case(&expected) {
        return Err(LedgerError::Auth(format!(
            "digest {supplied} does not match transfer {}",
            transfer.id
        )));
    }
    verifier.verify(&transfer.from, &expected, signature)
}

impl Ledger<'_> {
    /// Token-level preconditions shared by every balance movement.
    pub(crate) fn check_transfer_conditions(
        &self,
        symbol: &str,
        date: Timestamp,
        amount: Amount,
    ) -> Result<Token> {
        let token = self.get_token(symbol)?;
        if date < token.lock_up_date {
            return Err(LedgerError::LockUp {
                symbol: token.symbol,
                lock_up_date: token.lock_up_date,
                date,
            });
        }
        if token.token_type.requires_integral() && !amount.is_integral() {
            return Err(LedgerError::Validation(format!(
                "the transfer amount for an {} token should be an integer, got {amount}",
                token.token_type
            )));
        }
        Ok(token)
    }

    fn apply_transfer(&self, set: &mut WorkingSet, transfer: &Transfer) -> Result<()> {
        self.check_transfer_conditions(&transfer.token, transfer.date, transfer.amount)?;

        let sender_key = BalanceKey::new(&transfer.from, &transfer.token);
        let receiver_key = BalanceKey::new(&transfer.to, &transfer.token);
        let mut sender = set.get_or_load(self, &sender_key, !transfer.avoid_check_from)?;
        let mut receiver = set.get_or_load(self, &receiver_key, !transfer.avoid_check_to)?;

        sender.amount = sender.amount.checked_sub(transfer.amount)?;
        receiver.amount = receiver.amount.checked_add(transfer.amount)?;
        debug!(
            id = %transfer.id,
            from = %sender_key,
            to = %receiver_key,
            amount = %transfer.amount,
            "transfer applied to working set"
        );
        set.put(sender);
        set.put(receiver);
        Ok(())
    }

    /// Moves `transfer.amount` from sender to receiver.
    ///
    /// The caller is expected to have authorised the sender, see [`verify_sender`].
    pub fn transfer(&mut self, mut transfer: Transfer) -> Result<Output> {
        if transfer.from == transfer.to {
            return Err(LedgerError::Validation(
                "sender and receiver cannot be the same in a transfer".into(),
            ));
        }
        if transfer.amount.is_zero() {
            return Err(LedgerError::Validation(
                "the transfer amount should be greater than zero".into(),
            ));
        }

        let mut set = WorkingSet::new();
        self.apply_transfer(&mut set, &transfer)?;
        let balances = set.flush(self)?;

        transfer.kind = TRANSFER_TYPE.to_string();
        info!(id = %transfer.id, token = %transfer.token, amount = %transfer.amount, "transfer committed");
        let mut out = Output::default().with_transaction(transfer);
        out.update_balances = Some(balances);
        Ok(out)
    }

    /// Applies `transfers` in order as one all-or-nothing batch.
    ///
    /// Entries moving nothing (same sender and receiver, or a zero amount)
    /// are skipped.
    pub fn multitransfer(&mut self, transfers: Vec<Transfer>) -> Result<Output> {
        let mut set = WorkingSet::new();
        let mut out = Output::default();
        let mut applied = 0usize;
        for transfer in transfers {
            if transfer.from == transfer.to || transfer.amount.is_zero() {
                debug!(id = %transfer.id, "skipping no-op batch entry");
                continue;
            }
            self.apply_transfer(&mut set, &transfer)?;
            out = out.with_transaction(transfer);
            applied += 1;
        }
        let balances = set.flush(self)?;
        info!(applied, balances = balances.len(), "batch transfer committed");
        out.update_balances = Some(balances);
        Ok(out)
    }
}
