//! Dispatch surface: operation name plus string arguments in, JSON payload out.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::actors::ActorRegistry;
use crate::auth::{RoleAttestor, SignatureVerifier};
use crate::error::{LedgerError, Result};
use crate::ledger::{verify_sender, Ledger};
use crate::memory::MemoryStore;
use crate::model::{FinancialScores, Role, Token, TokenType, Transfer};
use crate::store::LedgerStore;

macro_rules! operations {
    ($($variant:ident => $name:literal,)*) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Operation {
            $($variant,)*
        }

        impl Operation {
            pub const ALL: &'static [Operation] = &[$(Operation::$variant,)*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Operation::$variant => $name,)*
                }
            }
        }

        impl FromStr for Operation {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok(Operation::$variant),)*
                    other => Err(LedgerError::Validation(format!(
                        "incorrect function name {other:?}"
                    ))),
                }
            }
        }
    };
}

operations! {
    RegisterToken => "registerToken",
    RemoveToken => "removeToken",
    UpdateTokenInfo => "updateTokenInfo",
    GetToken => "getToken",
    GetTokenInfoByType => "getTokenInfoByType",
    GetTokenListByType => "getTokenListByType",
    RegisterAddress => "registerAddress",
    CheckAddressExist => "checkAddressExist",
    GetWalletType => "getWalletType",
    BalanceOf => "balanceOf",
    InitialiseBalance => "initialiseBalance",
    Transfer => "transfer",
    Multitransfer => "multitransfer",
    Mint => "mint",
    Burn => "burn",
    InitialiseFinancialScores => "initialiseFinancialScores",
    UpdateFinancialScores => "updateFinancialScores",
    GetFinancialScores => "getFinancialScores",
    GetBalancesOfAddress => "getBalancesOfAddress",
    GetBalancesOfTokenHolders => "getBalancesOfTokenHolders",
    GetTokenHolderList => "getTokenHolderList",
}

impl Operation {
    /// Operations gated on the administrator role.
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Operation::RegisterToken
                | Operation::RemoveToken
                | Operation::UpdateTokenInfo
                | Operation::Mint
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ledger contract with its injected collaborators.
pub struct CoinBalance {
    verifier: Box<dyn SignatureVerifier>,
    actors: Box<dyn ActorRegistry>,
}

impl CoinBalance {
    pub fn new(verifier: Box<dyn SignatureVerifier>, actors: Box<dyn ActorRegistry>) -> Self {
        Self { verifier, actors }
    }

    /// Runs one invocation against `store` and returns its JSON payload.
    ///
    /// `store` must be invocation-scoped: on error the host discards every
    /// write made through it.
    pub fn invoke(
        &self,
        store: &mut dyn LedgerStore,
        caller: &dyn RoleAttestor,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>> {
        let op: Operation = function.parse()?;
        if op.requires_admin() {
            caller
                .assert_role(Role::Admin)
                .map_err(|e| LedgerError::Auth(format!("permission denied to call {op}: {e}")))?;
        }
        debug!(operation = %op, args = args.len(), "dispatching");
        let mut ledger = Ledger::new(store);
        let ledger = &mut ledger;

        match op {
            Operation::RegisterToken => {
                let [token, address] = expect_args::<2>(op, args)?;
                let token: Token = parse_json("token", token)?;
                encode(&ledger.register_token(token, address)?)
            }
            Operation::RemoveToken => {
                let [symbol] = expect_args::<1>(op, args)?;
                ledger.remove_token(symbol)?;
                Ok(Vec::new())
            }
            Operation::UpdateTokenInfo => {
                let [token] = expect_args::<1>(op, args)?;
                encode(&ledger.update_token(parse_json("token", token)?)?)
            }
            Operation::GetToken => {
                let [symbol] = expect_args::<1>(op, args)?;
                encode(&ledger.get_token(symbol)?)
            }
            Operation::GetTokenInfoByType => {
                let [kind] = expect_args::<1>(op, args)?;
                let tokens = ledger
                    .tokens_by_type(kind.parse::<TokenType>()?)?
                    .collect::<Result<Vec<_>>>()?;
                encode(&tokens)
            }
            Operation::GetTokenListByType => {
                let [kind] = expect_args::<1>(op, args)?;
                let symbols = ledger
                    .token_symbols_by_type(kind.parse::<TokenType>()?)?
                    .collect::<Result<Vec<_>>>()?;
                encode(&symbols)
            }
            Operation::RegisterAddress => {
                let [address] = expect_args::<1>(op, args)?;
                ledger.register_address(address)?;
                Ok(Vec::new())
            }
            Operation::CheckAddressExist => {
                let [address] = expect_args::<1>(op, args)?;
                ledger.require_address(address)?;
                Ok(Vec::new())
            }
            Operation::GetWalletType => {
                let [address, kind] = expect_args::<2>(op, args)?;
                let wallet: BTreeMap<_, _> = ledger
                    .wallet_by_type(address, kind.parse::<TokenType>()?)?
                    .into_iter()
                    .collect();
                encode(&wallet)
            }
            Operation::BalanceOf => {
                let [address, symbol] = expect_args::<2>(op, args)?;
                encode(&ledger.balance_of(address, symbol)?)
            }
            Operation::InitialiseBalance => {
                let [address, symbol] = expect_args::<2>(op, args)?;
                ledger.initialise_balance(address, symbol)?;
                Ok(Vec::new())
            }
            Operation::Transfer => {
                let [transfer, digest, signature] = expect_args::<3>(op, args)?;
                let transfer: Transfer = parse_json("transfer", transfer)?;
                verify_sender(self.verifier.as_ref(), &transfer, digest, signature)?;
                encode(&ledger.transfer(transfer)?)
            }
            Operation::Multitransfer => {
                if args.is_empty() {
                    return Err(LedgerError::arity(op.as_str(), "at least 1"));
                }
                let transfers = args
                    .iter()
                    .map(|arg| parse_json::<Transfer>("transfer", arg))
                    .collect::<Result<Vec<_>>>()?;
                encode(&ledger.multitransfer(transfers)?)
            }
            Operation::Mint => {
                let [request] = expect_args::<1>(op, args)?;
                encode(&ledger.mint(parse_json("mint request", request)?)?)
            }
            Operation::Burn => {
                let [request] = expect_args::<1>(op, args)?;
                encode(&ledger.burn(parse_json("burn request", request)?)?)
            }
            Operation::InitialiseFinancialScores => {
                let [actor, scores] = expect_args::<2>(op, args)?;
                let scores: FinancialScores = parse_json("financial scores", scores)?;
                ledger.initialise_scores(actor, scores)?;
                Ok(Vec::new())
            }
            Operation::UpdateFinancialScores => {
                let [actor, scores] = expect_args::<2>(op, args)?;
                let scores: FinancialScores = parse_json("financial scores", scores)?;
                ledger.update_scores(actor, scores, self.actors.as_ref())?;
                Ok(Vec::new())
            }
            Operation::GetFinancialScores => {
                let [actor] = expect_args::<1>(op, args)?;
                encode(&ledger.get_scores(actor)?)
            }
            Operation::GetBalancesOfAddress => {
                let [address] = expect_args::<1>(op, args)?;
                encode(&ledger.balances_of_address(address)?)
            }
            Operation::GetBalancesOfTokenHolders => {
                let [symbol] = expect_args::<1>(op, args)?;
                encode(&ledger.balances_of_token(symbol)?)
            }
            Operation::GetTokenHolderList => {
                let [symbol] = expect_args::<1>(op, args)?;
                encode(&ledger.token_holders(symbol)?)
            }
        }
    }

    /// Runs [`CoinBalance::invoke`] in a fresh transaction and commits it on success.
    pub fn execute(
        &self,
        store: &MemoryStore,
        caller: &dyn RoleAttestor,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>> {
        let mut tx = store.begin();
        let result = self
            .invoke(&mut tx, caller, function, args)
            .and_then(|payload| tx.commit().map(|_| payload));
        if let Err(err) = &result {
            warn!(function, kind = err.kind().as_str(), error = %err, "invocation rejected");
        }
        result
    }
}

/// Structured failure payload: `{"error": <kind>, "message": <text>}`.
pub fn error_payload(err: &LedgerError) -> String {
    json!({ "error": err.kind().as_str(), "message": err.to_string() }).to_string()
}

fn expect_args<const N: usize>(op: Operation, args: &[String]) -> Result<[&str; N]> {
    if args.len() != N {
        return Err(LedgerError::arity(op.as_str(), &N.to_string()));
    }
    Ok(std::array::from_fn(|i| args[i].as_str()))
}

fn parse_json<T: DeserializeOwned>(what: &str, arg: &str) -> Result<T> {
    serde_json::from_str(arg).map_err(|e| LedgerError::bad_json(what, e))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| LedgerError::Store(format!("encode payload: {e}")))
}
