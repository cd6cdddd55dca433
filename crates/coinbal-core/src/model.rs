use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::amount::Amount;
use crate::error::LedgerError;
use crate::key::BalanceKey;

pub type Address = String;
pub type Symbol = String;
/// Unix timestamp in seconds.
pub type Timestamp = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TokenType {
    #[serde(rename = "CRYPTO")]
    Crypto,
    #[serde(rename = "SOCIAL")]
    Social,
    #[serde(rename = "FTPOD", alias = "FT_POD")]
    FtPod,
    #[serde(rename = "NFTPOD", alias = "NFT_POD")]
    NftPod,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Crypto => "CRYPTO",
            TokenType::Social => "SOCIAL",
            TokenType::FtPod => "FTPOD",
            TokenType::NftPod => "NFTPOD",
        }
    }

    /// Supply, balances and transfer amounts must be whole numbers.
    pub fn requires_integral(&self) -> bool {
        matches!(self, TokenType::NftPod)
    }
}

impl FromStr for TokenType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CRYPTO" => Ok(TokenType::Crypto),
            "SOCIAL" => Ok(TokenType::Social),
            "FTPOD" | "FT_POD" => Ok(TokenType::FtPod),
            "NFTPOD" | "NFT_POD" => Ok(TokenType::NftPod),
            other => Err(LedgerError::Validation(format!("unknown token type {other:?}"))),
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    User,
    Business,
    Guarantor,
    CourtMember,
    Exchange,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
            Role::Business => "BUSINESS",
            Role::Guarantor => "GUARANTOR",
            Role::CourtMember => "COURT_MEMBER",
            Role::Exchange => "EXCHANGE",
        }
    }
}

impl FromStr for Role {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            "BUSINESS" => Ok(Role::Business),
            "GUARANTOR" => Ok(Role::Guarantor),
            "COURT_MEMBER" => Ok(Role::CourtMember),
            "EXCHANGE" => Ok(Role::Exchange),
            other => Err(LedgerError::Validation(format!("unknown role {other:?}"))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "TokenType")]
    pub token_type: TokenType,
    #[serde(rename = "Symbol")]
    pub symbol: Symbol,
    #[serde(rename = "Supply", default)]
    pub supply: Amount,
    #[serde(rename = "LockUpDate", default)]
    pub lock_up_date: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(rename = "Address")]
    pub address: Address,
    #[serde(rename = "Token")]
    pub token: Symbol,
    #[serde(rename = "Amount", default)]
    pub amount: Amount,
    #[serde(rename = "Credit", default)]
    pub credit: f64,
    #[serde(rename = "LockUpDate", default)]
    pub lock_up_date: Timestamp,
}

impl Balance {
    pub fn zero(address: &str, token: &str) -> Self {
        Self {
            address: address.to_string(),
            token: token.to_string(),
            amount: Amount::ZERO,
            credit: 0.0,
            lock_up_date: 0,
        }
    }

    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(&self.address, &self.token)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    #[serde(rename = "Type", default)]
    pub kind: String,
    #[serde(rename = "Token")]
    pub token: Symbol,
    #[serde(rename = "From", default)]
    pub from: Address,
    #[serde(rename = "To", default)]
    pub to: Address,
    #[serde(rename = "AvoidCheckTo", default)]
    pub avoid_check_to: bool,
    #[serde(rename = "AvoidCheckFrom", default)]
    pub avoid_check_from: bool,
    #[serde(rename = "Amount")]
    pub amount: Amount,
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Date", default)]
    pub date: Timestamp,
}

pub const TRANSFER_TYPE: &str = "Transfer";
const TRANSFER_DIGEST_TAG: &[u8] = b"coinbal-transfer-v1";

impl Transfer {
    /// SHA-256 commitment the sender signs to authorise this transfer.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(TRANSFER_DIGEST_TAG);
        for field in [&self.id, &self.token, &self.from, &self.to] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update(self.amount.units().to_le_bytes());
        hasher.update(self.date.to_le_bytes());
        hasher.finalize().into()
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinancialScores {
    #[serde(rename = "TrustScore")]
    pub trust_score: f64,
    #[serde(rename = "EndorsementScore")]
    pub endorsement_score: f64,
}

impl FinancialScores {
    pub fn validate(&self) -> Result<(), LedgerError> {
        for (name, value) in [
            ("trust score", self.trust_score),
            ("endorsement score", self.endorsement_score),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(LedgerError::Validation(format!(
                    "{name} should be between 0 and 1, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Envelope returned by every successful mutating operation.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Output {
    #[serde(rename = "UpdateBalances")]
    pub update_balances: Option<BTreeMap<BalanceKey, Balance>>,
    #[serde(rename = "UpdateTokens")]
    pub update_tokens: Option<BTreeMap<Symbol, Token>>,
    #[serde(rename = "Transactions")]
    pub transactions: Option<BTreeMap<String, Transfer>>,
}

impl Output {
    pub fn with_balance(mut self, balance: Balance) -> Self {
        self.update_balances
            .get_or_insert_with(BTreeMap::new)
            .insert(balance.key(), balance);
        self
    }

    pub fn with_token(mut self, token: Token) -> Self {
        self.update_tokens
            .get_or_insert_with(BTreeMap::new)
            .insert(token.symbol.clone(), token);
        self
    }

    pub fn with_transaction(mut self, transfer: Transfer) -> Self {
        self.transactions
            .get_or_insert_with(BTreeMap::new)
            .insert(transfer.id.clone(), transfer);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_json_uses_ledger_field_names() {
        let token: Token = serde_json::from_str(
            r#"{"Name":"Pod","TokenType":"NFT_POD","Symbol":"POD1","Supply":3,"LockUpDate":100}"#,
        )
        .unwrap();
        assert_eq!(token.token_type, TokenType::NftPod);
        assert_eq!(token.supply, Amount::whole(3));
        let json = serde_json::to_string(&token).unwrap();
        assert!(json.contains(r#""TokenType":"NFTPOD""#));
        assert!(json.contains(r#""Supply":3"#));
    }

    #[test]
    fn unknown_token_type_is_rejected() {
        assert!("GOLD".parse::<TokenType>().is_err());
        assert!(serde_json::from_str::<Token>(r#"{"TokenType":"GOLD","Symbol":"X"}"#).is_err());
    }

    #[test]
    fn digest_binds_every_field() {
        let transfer: Transfer = serde_json::from_str(
            r#"{"Token":"PRV","From":"a","To":"b","Amount":1.5,"Id":"t1","Date":7}"#,
        )
        .unwrap();
        let mut other = transfer.clone();
        other.amount = Amount::whole(2);
        assert_ne!(transfer.digest(), other.digest());
        let mut shifted = transfer.clone();
        shifted.from = "ab".into();
        shifted.to = String::new();
        assert_ne!(transfer.digest(), shifted.digest());
        assert_eq!(transfer.digest_hex().len(), 64);
    }

    #[test]
    fn scores_outside_unit_interval_fail() {
        let ok = FinancialScores {
            trust_score: 1.0,
            endorsement_score: 0.0,
        };
        assert!(ok.validate().is_ok());
        let bad = FinancialScores {
            trust_score: 0.5,
            endorsement_score: 1.2,
        };
        assert!(bad.validate().is_err());
        let nan = FinancialScores {
            trust_score: f64::NAN,
            endorsement_score: 0.5,
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn output_serializes_unset_maps_as_null() {
        let out = Output::default().with_token(Token {
            name: "Privi".into(),
            token_type: TokenType::Crypto,
            symbol: "PRV".into(),
            supply: Amount::whole(5),
            lock_up_date: 0,
        });
        let json = serde_json::to_value(&out).unwrap();
        assert!(json["UpdateBalances"].is_null());
        assert!(json["Transactions"].is_null());
        assert_eq!(json["UpdateTokens"]["PRV"]["Supply"], serde_json::json!(5));
    }
}
