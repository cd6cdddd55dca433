use tracing::{debug, info};

use super::Ledger;
use crate::amount::Amount;
use crate::error::{LedgerError, Result};
use crate::key::{BalanceKey, Namespace, StateKey};
use crate::model::{Balance, Output, Symbol, Token, TokenType};
use crate::store::{self, Selector};

fn ensure_integral_supply(token_type: TokenType, supply: Amount) -> Result<()> {
    if token_type.requires_integral() && !supply.is_integral() {
        return Err(LedgerError::Validation(format!(
            "the supply of an {token_type} token should be an integer, got {supply}"
        )));
    }
    Ok(())
}

impl Ledger<'_> {
    pub fn try_token(&self, symbol: &str) -> Result<Option<Token>> {
        store::load(self.store(), &StateKey::token(symbol))
    }

    pub fn get_token(&self, symbol: &str) -> Result<Token> {
        self.try_token(symbol)?.ok_or_else(|| {
            LedgerError::NotFound(format!("token {symbol} is not registered on the system"))
        })
    }

    pub(crate) fn save_token(&mut self, token: &Token) -> Result<()> {
        store::save(self.store_mut(), StateKey::token(&token.symbol), token)
    }

    /// Lists a new token and credits its whole supply to `initial_address`.
    ///
    /// A removed symbol can only be listed again once nobody holds any of it.
    pub fn register_token(&mut self, token: Token, initial_address: &str) -> Result<Output> {
        if self.try_token(&token.symbol)?.is_some() {
            return Err(LedgerError::Duplicate(format!(
                "token {} already registered on the system",
                token.symbol
            )));
        }
        let outstanding = self
            .balances_of_token(&token.symbol)?
            .into_iter()
            .filter(|balance| !balance.amount.is_zero())
            .count();
        if outstanding > 0 {
            return Err(LedgerError::Duplicate(format!(
                "token {} was removed but {outstanding} balance(s) of it are still held",
                token.symbol
            )));
        }
        ensure_integral_supply(token.token_type, token.supply)?;
        self.save_token(&token)?;

        let mut balance = Balance::zero(initial_address, &token.symbol);
        balance.amount = token.supply;
        self.save_balance(&balance)?;
        info!(symbol = %token.symbol, supply = %token.supply, holder = initial_address, "token registered");
        Ok(Output::default().with_token(token).with_balance(balance))
    }

    /// Tombstones the token record. Balances of the token are left in place.
    pub fn remove_token(&mut self, symbol: &str) -> Result<()> {
        let token = self.get_token(symbol)?;
        self.store_mut().delete_state(&StateKey::token(&token.symbol))?;
        info!(symbol, "token removed");
        Ok(())
    }

    /// Rewrites token metadata; the stored supply always wins over the request.
    pub fn update_token(&mut self, mut token: Token) -> Result<Output> {
        let current = self.get_token(&token.symbol)?;
        token.supply = current.supply;
        ensure_integral_supply(token.token_type, token.supply)?;
        if token.token_type.requires_integral() && !current.token_type.requires_integral() {
            self.ensure_integral_balances(&token)?;
        }
        self.save_token(&token)?;
        info!(symbol = %token.symbol, "token info updated");
        Ok(Output::default().with_token(token))
    }

    fn ensure_integral_balances(&self, token: &Token) -> Result<()> {
        for balance in self.balances_of_token(&token.symbol)? {
            if !balance.amount.is_integral() {
                return Err(LedgerError::Validation(format!(
                    "{} holds {} {}, which an {} token cannot represent",
                    balance.address, balance.amount, token.symbol, token.token_type
                )));
            }
        }
        Ok(())
    }

    /// Tokens of one type, decoded lazily in the store's iteration order.
    pub fn tokens_by_type(
        &self,
        token_type: TokenType,
    ) -> Result<impl Iterator<Item = Result<Token>> + '_> {
        debug!(%token_type, "querying tokens by type");
        let selector = Selector::field_eq(Namespace::Token, "TokenType", token_type.as_str());
        let hits = self.store().query(&selector)?;
        Ok(hits.map(|hit| hit.and_then(|(key, bytes)| store::decode(&key, &bytes))))
    }

    pub fn token_symbols_by_type(
        &self,
        token_type: TokenType,
    ) -> Result<impl Iterator<Item = Result<Symbol>> + '_> {
        Ok(self
            .tokens_by_type(token_type)?
            .map(|token| token.map(|t| t.symbol)))
    }

    /// Balance of `address` in every token of `token_type`, keyed by symbol.
    pub fn wallet_by_type(
        &self,
        address: &str,
        token_type: TokenType,
    ) -> Result<Vec<(Symbol, Balance)>> {
        let symbols = self
            .token_symbols_by_type(token_type)?
            .collect::<Result<Vec<_>>>()?;
        symbols
            .into_iter()
            .map(|symbol| {
                let balance = self.check_or_create(&BalanceKey::new(address, &symbol), true)?;
                Ok((symbol, balance))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::amount::Amount;
    use crate::error::{LedgerError, Result};
    use crate::key::BalanceKey;
    use crate::ledger::testkit::{seed, token, with_ledger};
    use crate::memory::MemoryStore;
    use crate::model::{TokenType, Transfer};

    fn transfer_of(symbol: &str, from: &str, to: &str, amount: Amount) -> Transfer {
        Transfer {
            kind: String::new(),
            token: symbol.into(),
            from: from.into(),
            to: to.into(),
            avoid_check_to: false,
            avoid_check_from: false,
            amount,
            id: format!("{from}-{to}"),
            date: 0,
        }
    }

    #[test]
    fn register_credits_initial_holder() {
        let store = MemoryStore::new();
        let out = with_ledger(&store, |l| {
            l.register_token(token("PRV", TokenType::Crypto, Amount::whole(100)), "treasury")
        })
        .unwrap();
        assert_eq!(out.update_tokens.unwrap()["PRV"].supply, Amount::whole(100));
        let balance = with_ledger(&store, |l| {
            l.check_or_create(&BalanceKey::new("treasury", "PRV"), false)
        })
        .unwrap();
        assert_eq!(balance.amount, Amount::whole(100));
    }

    #[test]
    fn duplicate_symbol_keeps_first_supply() {
        let store = MemoryStore::new();
        seed(&store, token("PRV", TokenType::Crypto, Amount::whole(10)), "a", &[]);
        let err = with_ledger(&store, |l| {
            l.register_token(token("PRV", TokenType::Social, Amount::whole(99)), "b")
        })
        .unwrap_err();
        assert!(matches!(err, LedgerError::Duplicate(_)));
        let stored = with_ledger(&store, |l| l.get_token("PRV")).unwrap();
        assert_eq!(stored.supply, Amount::whole(10));
        assert_eq!(stored.token_type, TokenType::Crypto);
    }

    #[test]
    fn nft_supply_must_be_integral() {
        let store = MemoryStore::new();
        let supply: Amount = "3.5".parse().unwrap();
        let err = with_ledger(&store, |l| {
            l.register_token(token("POD", TokenType::NftPod, supply), "a")
        })
        .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(with_ledger(&store, |l| l.try_token("POD")).unwrap().is_none());
    }

    #[test]
    fn update_preserves_supply() {
        let store = MemoryStore::new();
        seed(&store, token("PRV", TokenType::Crypto, Amount::whole(10)), "a", &[]);
        let mut request = token("PRV", TokenType::Crypto, Amount::whole(1_000));
        request.name = "Renamed".into();
        request.lock_up_date = 50;
        with_ledger(&store, |l| l.update_token(request)).unwrap();
        let stored = with_ledger(&store, |l| l.get_token("PRV")).unwrap();
        assert_eq!(stored.name, "Renamed");
        assert_eq!(stored.lock_up_date, 50);
        assert_eq!(stored.supply, Amount::whole(10));

        let err = with_ledger(&store, |l| {
            l.update_token(token("NOPE", TokenType::Crypto, Amount::ZERO))
        })
        .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn update_to_nft_rejects_fractional_holdings() {
        let store = MemoryStore::new();
        seed(&store, token("PRV", TokenType::Crypto, Amount::whole(10)), "a", &["a", "b"]);
        let split = transfer_of("PRV", "a", "b", "2.5".parse().unwrap());
        with_ledger(&store, |l| l.transfer(split)).unwrap();

        let err = with_ledger(&store, |l| {
            l.update_token(token("PRV", TokenType::NftPod, Amount::ZERO))
        })
        .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        let stored = with_ledger(&store, |l| l.get_token("PRV")).unwrap();
        assert_eq!(stored.token_type, TokenType::Crypto);

        // Once the holdings are whole again the type change goes through.
        let rejoin = transfer_of("PRV", "b", "a", "0.5".parse().unwrap());
        with_ledger(&store, |l| l.transfer(rejoin)).unwrap();
        with_ledger(&store, |l| {
            l.update_token(token("PRV", TokenType::NftPod, Amount::ZERO))
        })
        .unwrap();
        let stored = with_ledger(&store, |l| l.get_token("PRV")).unwrap();
        assert_eq!(stored.token_type, TokenType::NftPod);
    }

    #[test]
    fn reregistration_is_blocked_while_old_balances_remain() {
        let store = MemoryStore::new();
        seed(&store, token("PRV", TokenType::Crypto, Amount::whole(10)), "a", &["a", "b"]);
        with_ledger(&store, |l| l.transfer(transfer_of("PRV", "a", "b", Amount::whole(4)))).unwrap();
        with_ledger(&store, |l| l.remove_token("PRV")).unwrap();

        let err = with_ledger(&store, |l| {
            l.register_token(token("PRV", TokenType::Crypto, Amount::whole(5)), "a")
        })
        .unwrap_err();
        assert!(matches!(err, LedgerError::Duplicate(_)));
        assert!(with_ledger(&store, |l| l.try_token("PRV")).unwrap().is_none());
        let held: Vec<_> = with_ledger(&store, |l| l.balances_of_token("PRV"))
            .unwrap()
            .into_iter()
            .map(|b| (b.address, b.amount))
            .collect();
        assert!(held.contains(&("a".to_string(), Amount::whole(6))));
        assert!(held.contains(&("b".to_string(), Amount::whole(4))));
    }

    #[test]
    fn reregistration_after_balances_drain() {
        let store = MemoryStore::new();
        seed(&store, token("PRV", TokenType::Crypto, Amount::whole(10)), "a", &["a"]);
        with_ledger(&store, |l| l.burn(transfer_of("PRV", "a", "", Amount::whole(10)))).unwrap();
        with_ledger(&store, |l| l.remove_token("PRV")).unwrap();

        with_ledger(&store, |l| {
            l.register_token(token("PRV", TokenType::Crypto, Amount::whole(5)), "a")
        })
        .unwrap();
        let circulating: Amount = with_ledger(&store, |l| l.balances_of_token("PRV"))
            .unwrap()
            .iter()
            .try_fold(Amount::ZERO, |sum, b| sum.checked_add(b.amount))
            .unwrap();
        assert_eq!(circulating, Amount::whole(5));
        assert_eq!(with_ledger(&store, |l| l.get_token("PRV")).unwrap().supply, circulating);
    }

    #[test]
    fn remove_tombstones_token_but_keeps_balances() {
        let store = MemoryStore::new();
        seed(&store, token("PRV", TokenType::Crypto, Amount::whole(10)), "a", &[]);
        with_ledger(&store, |l| l.remove_token("PRV")).unwrap();
        assert!(with_ledger(&store, |l| l.try_token("PRV")).unwrap().is_none());
        let balance = with_ledger(&store, |l| {
            l.check_or_create(&BalanceKey::new("a", "PRV"), false)
        })
        .unwrap();
        assert_eq!(balance.amount, Amount::whole(10));
        let err = with_ledger(&store, |l| l.remove_token("PRV")).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn lists_by_type() {
        let store = MemoryStore::new();
        seed(&store, token("A", TokenType::NftPod, Amount::whole(1)), "x", &["x"]);
        seed(&store, token("B", TokenType::Crypto, Amount::whole(1)), "x", &[]);
        seed(&store, token("C", TokenType::NftPod, Amount::whole(2)), "x", &[]);
        let mut symbols = with_ledger(&store, |l| {
            l.token_symbols_by_type(TokenType::NftPod)?.collect::<Result<Vec<_>>>()
        })
        .unwrap();
        symbols.sort();
        assert_eq!(symbols, vec!["A".to_string(), "C".to_string()]);

        let wallet = with_ledger(&store, |l| l.wallet_by_type("x", TokenType::NftPod)).unwrap();
        assert_eq!(wallet.len(), 2);
        let err = with_ledger(&store, |l| l.wallet_by_type("ghost", TokenType::NftPod)).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }
}
