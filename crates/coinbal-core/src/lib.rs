//! Multi-token balance ledger engine.
//!
//! The engine tracks token metadata, per-(address, token) balances and
//! per-actor financial scores in an external transactional key-value store
//! reached through [`store::LedgerStore`]. Every operation reads current
//! state, validates, and writes back through that store; the host commits
//! the writes of one invocation together or not at all.
//!
//! [`contract::CoinBalance`] is the string-dispatch entry point;
//! [`ledger::Ledger`] exposes the same operations as typed methods.

pub mod actors;
pub mod amount;
pub mod auth;
pub mod contract;
pub mod error;
pub mod key;
pub mod ledger;
pub mod memory;
pub mod model;
pub mod store;

pub use actors::{ActorRegistry, InMemoryActorRegistry};
pub use amount::{Amount, AmountError, SCALE};
pub use auth::{CallerIdentity, Ed25519Verifier, RoleAttestor, SignatureVerifier};
pub use contract::{error_payload, CoinBalance, Operation};
pub use error::{ErrorKind, LedgerError, Result};
pub use key::{BalanceKey, Namespace, StateKey};
pub use ledger::Ledger;
pub use memory::{MemoryStore, Transaction};
pub use model::{Balance, FinancialScores, Output, Role, Token, TokenType, Transfer};
pub use store::{LedgerStore, Selector, StateIter};
