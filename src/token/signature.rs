//! Cryptographic signature verification.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use super::codec::DecodedToken;
use super::key_source::KeySource;
use super::VerificationError;

/// Checks the signature of an already-decoded token.
#[async_trait]
pub trait SignatureCheck: Send + Sync {
    /// Verify `token`'s signature. `decoded` is the structural decode of the same string, used
    /// for key selection.
    async fn check(&self, token: &str, decoded: &DecodedToken)
        -> Result<(), VerificationError>;
}

/// Standard signature verifier backed by a [`KeySource`].
///
/// Picks the key by the header's `kid`. Tokens without a `kid` are rejected unless the kid-less
/// fallback is enabled, in which case every key in the set is tried.
pub struct SignatureVerifier {
    key_source: Arc<dyn KeySource>,
    algorithm: Algorithm,
    expired_code: String,
    kidless_fallback: bool,
}

impl SignatureVerifier {
    /// Create a verifier requiring a `kid` header.
    pub fn new(
        key_source: Arc<dyn KeySource>,
        algorithm: Algorithm,
        expired_code: impl Into<String>,
    ) -> Self {
        SignatureVerifier {
            key_source,
            algorithm,
            expired_code: expired_code.into(),
            kidless_fallback: false,
        }
    }

    /// Accept tokens without a `kid` header by trying every key in the set.
    pub fn with_kidless_fallback(mut self) -> Self {
        self.kidless_fallback = true;
        self
    }

    fn verify_with_key(&self, token: &str, key: &DecodingKey) -> Result<(), VerificationError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        // Audience and issuer are the claims validator's responsibility.
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::from(["exp".to_owned()]);

        match jsonwebtoken::decode::<serde_json::Value>(token, key, &validation) {
            Ok(_) => Ok(()),
            Err(err) => match err.kind() {
                ErrorKind::ExpiredSignature => Err(VerificationError::Expired {
                    code: self.expired_code.clone(),
                }),
                _ => Err(VerificationError::InvalidSignature),
            },
        }
    }
}

#[async_trait]
impl SignatureCheck for SignatureVerifier {
    async fn check(
        &self,
        token: &str,
        decoded: &DecodedToken,
    ) -> Result<(), VerificationError> {
        let keys = self.key_source.fetch_keys().await?;

        match &decoded.header.kid {
            Some(kid) => {
                let key = keys.get(kid).ok_or(VerificationError::NoMatchingKid)?;
                self.verify_with_key(token, key)
            }
            None if self.kidless_fallback => {
                for (kid, key) in keys.iter() {
                    match self.verify_with_key(token, key) {
                        Ok(()) => {
                            log::debug!(target: "gatekit",
                                kid = kid;
                                "kid-less token verified by key set scan");
                            return Ok(());
                        }
                        // Expiration is a property of the token, not of which key matched.
                        Err(err @ VerificationError::Expired { .. }) => return Err(err),
                        Err(_) => continue,
                    }
                }
                Err(VerificationError::InvalidSignature)
            }
            None => Err(VerificationError::NoKidInHeader),
        }
    }
}

/// Signature check for unsigned-token development flows. Always succeeds and never contacts a
/// key source.
pub struct EmulatorSignatureCheck;

#[async_trait]
impl SignatureCheck for EmulatorSignatureCheck {
    async fn check(
        &self,
        _token: &str,
        _decoded: &DecodedToken,
    ) -> Result<(), VerificationError> {
        Ok(())
    }
}
