//! Structured state keys and their canonical string encoding.
//!
//! A key is a namespace plus an ordered list of components, encoded as
//! `NAMESPACE/c1/c2`. Components are percent-escaped (`%` and `/`), so an
//! identifier containing the separator can never alias another key and a
//! partial-key prefix (`NAMESPACE/c1/`) only matches keys whose first
//! component is exactly `c1`.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{LedgerError, Result};

const SEPARATOR: char = '/';

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Namespace {
    Wallets,
    Token,
    Balances,
    FinancialScores,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [
        Namespace::Wallets,
        Namespace::Token,
        Namespace::Balances,
        Namespace::FinancialScores,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Wallets => "WALLETS",
            Namespace::Token => "TOKEN",
            Namespace::Balances => "BALANCES",
            Namespace::FinancialScores => "SCORES",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ns| ns.as_str() == tag)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateKey {
    namespace: Namespace,
    components: Vec<String>,
}

impl StateKey {
    pub fn new<I, S>(namespace: Namespace, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespace,
            components: components.into_iter().map(Into::into).collect(),
        }
    }

    pub fn wallet(address: &str) -> Self {
        Self::new(Namespace::Wallets, [address])
    }

    pub fn token(symbol: &str) -> Self {
        Self::new(Namespace::Token, [symbol])
    }

    pub fn scores(actor_id: &str) -> Self {
        Self::new(Namespace::FinancialScores, [actor_id])
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn encode(&self) -> String {
        let mut out = String::from(self.namespace.as_str());
        for component in &self.components {
            out.push(SEPARATOR);
            out.push_str(&escape(component));
        }
        out
    }

    /// Prefix matched by every key that extends `self` with more components.
    pub fn scan_prefix(&self) -> String {
        let mut prefix = self.encode();
        prefix.push(SEPARATOR);
        prefix
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let mut parts = encoded.split(SEPARATOR);
        let tag = parts.next().unwrap_or_default();
        let namespace = Namespace::from_tag(tag)
            .ok_or_else(|| LedgerError::Store(format!("unknown key namespace in {encoded:?}")))?;
        let components = parts
            .map(|part| unescape(part).ok_or_else(|| LedgerError::Store(format!("bad key {encoded:?}"))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            namespace,
            components,
        })
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Typed (address, token) key of a balance record.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BalanceKey {
    pub address: String,
    pub token: String,
}

impl BalanceKey {
    pub fn new(address: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: token.into(),
        }
    }

    pub fn state_key(&self) -> StateKey {
        StateKey::new(
            Namespace::Balances,
            [self.address.as_str(), self.token.as_str()],
        )
    }

    pub fn from_state_key(key: &StateKey) -> Option<Self> {
        match (key.namespace(), key.components()) {
            (Namespace::Balances, [address, token]) => Some(Self::new(address, token)),
            _ => None,
        }
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", escape(&self.address), escape(&self.token))
    }
}

impl Serialize for BalanceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn escape(component: &str) -> String {
    component.replace('%', "%25").replace(SEPARATOR, "%2F")
}

fn unescape(part: &str) -> Option<String> {
    let mut out = String::with_capacity(part.len());
    let mut rest = part;
    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let code = rest.get(idx + 1..idx + 3)?;
        match code {
            "25" => out.push('%'),
            "2F" => out.push(SEPARATOR),
            _ => return None,
        }
        rest = &rest[idx + 3..];
    }
    out.push_str(rest);
    Some(out)
}
