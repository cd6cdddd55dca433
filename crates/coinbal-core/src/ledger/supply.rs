//! Mint and burn: every supply change is paired with an equal balance change
//! in the same invocation, so both land or neither does.

use tracing::info;

use super::Ledger;
use crate::error::{LedgerError, Result};
use crate::key::BalanceKey;
use crate::model::{Output, Token, Transfer};

impl Ledger<'_> {
    fn supply_change_token(&self, request: &Transfer, action: &str) -> Result<Token> {
        if request.amount.is_zero() {
            return Err(LedgerError::Validation(format!(
                "the {action} amount should be greater than zero"
            )));
        }
        let token = self.get_token(&request.token)?;
        if token.token_type.requires_integral() && !request.amount.is_integral() {
            return Err(LedgerError::Validation(format!(
                "the {action} amount for an {} token should be an integer, got {}",
                token.token_type, request.amount
            )));
        }
        Ok(token)
    }

    /// Issues `request.amount` new tokens to `request.to`.
    pub fn mint(&mut self, request: Transfer) -> Result<Output> {
        let mut token = self.supply_change_token(&request, "mint")?;
        let mut balance = self.check_or_create(&BalanceKey::new(&request.to, &token.symbol), true)?;

        balance.amount = balance.amount.checked_add(request.amount)?;
        token.supply = token.supply.checked_add(request.amount)?;
        self.save_balance(&balance)?;
        self.save_token(&token)?;

        info!(id = %request.id, to = %request.to, amount = %request.amount, supply = %token.supply, "minted");
        Ok(Output::default()
            .with_balance(balance)
            .with_token(token)
            .with_transaction(request))
    }

    /// Destroys `request.amount` tokens held by `request.from`.
    pub fn burn(&mut self, request: Transfer) -> Result<Output> {
        let mut token = self.supply_change_token(&request, "burn")?;
        let mut balance =
            self.check_or_create(&BalanceKey::new(&request.from, &token.symbol), true)?;

        balance.amount = balance.amount.checked_sub(request.amount)?;
        token.supply = token.supply.checked_sub(request.amount)?;
        self.save_balance(&balance)?;
        self.save_token(&token)?;

        info!(id = %request.id, from = %request.from, amount = %request.amount, supply = %token.supply, "burned");
        Ok(Output::default()
            .with_balance(balance)
            .with_token(token)
            .with_transaction(request))
    }
}
