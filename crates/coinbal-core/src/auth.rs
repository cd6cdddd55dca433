//! Permission and signature gate.
//!
//! Both capabilities are external to the engine and injected as traits, so
//! hosts can plug in certificate attributes or another signature scheme.

use ed25519_dalek::{Signature, VerifyingKey};

use crate::error::{LedgerError, Result};
use crate::model::Role;

/// Attests the role attribute carried by the caller of an invocation.
pub trait RoleAttestor {
    fn assert_role(&self, role: Role) -> Result<()>;
}

/// Caller identity with a fixed, already-attested role.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    pub role: Option<Role>,
}

impl CallerIdentity {
    pub fn with_role(role: Role) -> Self {
        Self { role: Some(role) }
    }

    pub fn anonymous() -> Self {
        Self { role: None }
    }
}

impl RoleAttestor for CallerIdentity {
    fn assert_role(&self, role: Role) -> Result<()> {
        match self.role {
            Some(held) if held == role => Ok(()),
            Some(held) => Err(LedgerError::Auth(format!(
                "caller holds role {held}, {role} required"
            ))),
            None => Err(LedgerError::Auth(format!(
                "caller has no role attribute, {role} required"
            ))),
        }
    }
}

/// Checks a signature over a caller-supplied digest. All inputs are hex.
pub trait SignatureVerifier {
    fn verify(&self, public_key: &str, digest: &str, signature: &str) -> Result<()>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, public_key: &str, digest: &str, signature: &str) -> Result<()> {
        let key_bytes: [u8; 32] = decode_fixed("public key", public_key)?;
        let digest = decode_hex("digest", digest)?;
        let sig_bytes: [u8; 64] = decode_fixed("signature", signature)?;
        let key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|_| LedgerError::Auth(format!("malformed public key {public_key}")))?;
        let signature = Signature::from_bytes(&sig_bytes);
        key.verify_strict(&digest, &signature).map_err(|_| {
            LedgerError::Auth(format!(
                "the signature is not valid, no permissions for address {public_key}"
            ))
        })
    }
}

pub(crate) fn decode_hex(what: &str, value: &str) -> Result<Vec<u8>> {
    let trimmed = value.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(trimmed).map_err(|e| LedgerError::Auth(format!("error decoding {what}: {e}")))
}

fn decode_fixed<const N: usize>(what: &str, value: &str) -> Result<[u8; N]> {
    let bytes = decode_hex(what, value)?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        LedgerError::Auth(format!("{what} must be {N} bytes, got {}", b.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    #[test]
    fn role_must_match_exactly() {
        let admin = CallerIdentity::with_role(Role::Admin);
        assert!(admin.assert_role(Role::Admin).is_ok());
        let user = CallerIdentity::with_role(Role::User);
        assert!(matches!(user.assert_role(Role::Admin), Err(LedgerError::Auth(_))));
        assert!(CallerIdentity::anonymous().assert_role(Role::Admin).is_err());
    }

    #[test]
    fn verifies_ed25519_over_digest() {
        let sk = SigningKey::generate(&mut OsRng);
        let pk_hex = hex::encode(sk.verifying_key().as_bytes());
        let digest = [7u8; 32];
        let sig_hex = hex::encode(sk.sign(&digest).to_bytes());
        let verifier = Ed25519Verifier;
        verifier
            .verify(&format!("0x{pk_hex}"), &hex::encode(digest), &sig_hex)
            .unwrap();

        let err = verifier
            .verify(&pk_hex, &hex::encode([8u8; 32]), &sig_hex)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Auth(_)));
        assert!(verifier.verify("zz", &hex::encode(digest), &sig_hex).is_err());
        assert!(verifier.verify(&pk_hex, &hex::encode(digest), "00").is_err());
    }
}
