//! The verification pipeline: decode, validate claims, verify signature.

use std::sync::Arc;

use jsonwebtoken::Algorithm;

use super::codec::{decode_token, Claims};
use super::key_source::UrlKeySource;
use super::profile::{VerificationProfile, ALGORITHM_NONE};
use super::signature::{SignatureCheck, SignatureVerifier};
use super::validate::validate_claims;
use super::VerificationError;

/// Environment variable consulted for the project id when none is supplied explicitly.
pub const PROJECT_ID_ENV: &str = "GATEKIT_PROJECT_ID";

/// A successfully verified token.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    claims: Claims,
    uid: String,
}

impl VerifiedToken {
    /// The verified subject. A convenience copy of the `sub` claim, not a separate claim.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// The full verified claims.
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Consume the token, returning the claims.
    pub fn into_claims(self) -> Claims {
        self.claims
    }
}

/// Verifies compact signed tokens of one kind against one project.
///
/// Verification runs in a fixed order: structural decode, then claims validation, then the
/// cryptographic signature check, so that a malformed or mistargeted token never pays for key
/// fetching or cryptography.
pub struct TokenVerifier {
    profile: VerificationProfile,
    project_id: Option<String>,
    signature: Arc<dyn SignatureCheck>,
}

impl TokenVerifier {
    /// Create a verifier for `profile` tokens of the given project.
    ///
    /// When `project_id` is `None`, the `GATEKIT_PROJECT_ID` environment variable is consulted
    /// once at construction; verification fails with
    /// [`VerificationError::ProjectIdNotResolved`] if neither is set.
    pub fn new(profile: VerificationProfile, project_id: Option<String>) -> crate::Result<Self> {
        let algorithm = profile
            .expected_algorithm
            .parse::<Algorithm>()
            .unwrap_or(Algorithm::RS256);
        let key_source = Arc::new(UrlKeySource::new(&profile.cert_source_url)?);
        let signature = Arc::new(
            SignatureVerifier::new(key_source, algorithm, profile.expired_error_code.clone())
                .with_kidless_fallback(),
        );
        Ok(Self::with_signature_check(profile, project_id, signature))
    }

    /// Create a verifier with an externally constructed signature check. Intended for custom
    /// key sources and tests.
    pub fn with_signature_check(
        profile: VerificationProfile,
        project_id: Option<String>,
        signature: Arc<dyn SignatureCheck>,
    ) -> Self {
        let project_id = project_id
            .or_else(|| std::env::var(PROJECT_ID_ENV).ok())
            .filter(|id| !id.is_empty());
        TokenVerifier {
            profile,
            project_id,
            signature,
        }
    }

    /// Create a verifier that accepts unsigned (`alg = "none"`) tokens without any signature
    /// check. For local development against an emulated identity service only.
    pub fn emulator(mut profile: VerificationProfile, project_id: Option<String>) -> Self {
        profile.expected_algorithm = ALGORITHM_NONE.to_owned();
        Self::with_signature_check(
            profile,
            project_id,
            Arc::new(super::signature::EmulatorSignatureCheck),
        )
    }

    /// Verify `token`, returning its claims on success.
    pub async fn verify(&self, token: &str) -> Result<VerifiedToken, VerificationError> {
        if token.is_empty() {
            return Err(VerificationError::InvalidArgument(format!(
                "{} must be a non-empty string. {}",
                self.profile.full_name,
                self.profile.docs_suffix()
            )));
        }
        let Some(project_id) = self.project_id.as_deref() else {
            return Err(VerificationError::ProjectIdNotResolved);
        };

        let decoded = decode_token(token).map_err(|_| {
            VerificationError::InvalidArgument(format!(
                "Decoding the {} failed. Make sure you passed the entire string. {}",
                self.profile.short_name,
                self.profile.docs_suffix()
            ))
        })?;

        validate_claims(&decoded, project_id, &self.profile)?;

        if self.profile.expected_algorithm != ALGORITHM_NONE {
            self.signature.check(token, &decoded).await?;
        }

        // Claims validation guarantees a non-empty subject.
        let uid = decoded.claims.sub.clone().unwrap_or_default();
        log::debug!(target: "gatekit",
            kind = self.profile.short_name.as_str(),
            uid = uid.as_str();
            "token verified");
        Ok(VerifiedToken {
            claims: decoded.claims,
            uid,
        })
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::DecodingKey;
    use serde_json::json;

    use super::*;
    use crate::token::codec::encode_unsigned;
    use crate::token::key_source::{KeySet, StaticKeySource};
    use crate::token::test_support::{
        sign_token, SIGNER1_KEY_PEM, SIGNER1_PUB_PEM, SIGNER2_PUB_PEM,
    };

    const PROJECT: &str = "project-x";

    fn verifier() -> TokenVerifier {
        let mut set = KeySet::new();
        set.insert(
            "key-1",
            DecodingKey::from_rsa_pem(SIGNER1_PUB_PEM.as_bytes()).unwrap(),
        );
        set.insert(
            "key-2",
            DecodingKey::from_rsa_pem(SIGNER2_PUB_PEM.as_bytes()).unwrap(),
        );
        let profile = VerificationProfile::id_token("https://keys.example/certs");
        let signature = Arc::new(SignatureVerifier::new(
            Arc::new(StaticKeySource::new(set)),
            Algorithm::RS256,
            profile.expired_error_code.clone(),
        ));
        TokenVerifier::with_signature_check(profile, Some(PROJECT.to_owned()), signature)
    }

    fn claims(expires_in: i64) -> serde_json::Value {
        let now = chrono::Utc::now().timestamp();
        json!({
            "iss": "https://sessions.gatekit.dev/project-x",
            "sub": "user-1",
            "aud": PROJECT,
            "iat": now - 60,
            "exp": now + expires_in,
            "role": "admin",
        })
    }

    #[tokio::test]
    async fn valid_token_resolves_with_uid_equal_to_sub() {
        let token = sign_token(SIGNER1_KEY_PEM, Some("key-1"), &claims(3600));
        let verified = verifier().verify(&token).await.unwrap();
        assert_eq!(verified.uid(), "user-1");
        assert_eq!(verified.claims().sub.as_deref(), Some("user-1"));
        assert_eq!(verified.claims().custom["role"], json!("admin"));
    }

    #[tokio::test]
    async fn empty_input_is_invalid_argument() {
        let err = verifier().verify("").await.unwrap_err();
        assert!(matches!(err, VerificationError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn undecodable_input_gets_the_whole_string_hint() {
        let err = verifier().verify("not-a-token").await.unwrap_err();
        let VerificationError::InvalidArgument(message) = err else {
            panic!("expected InvalidArgument, got {err:?}");
        };
        assert!(
            message.contains("Make sure you passed the entire string"),
            "{message}"
        );
    }

    #[tokio::test]
    async fn unresolved_project_id_fails_before_decoding() {
        let profile = VerificationProfile::id_token("https://keys.example/certs");
        let verifier = TokenVerifier::with_signature_check(
            profile,
            None,
            Arc::new(super::super::signature::EmulatorSignatureCheck),
        );
        let token = sign_token(SIGNER1_KEY_PEM, Some("key-1"), &claims(3600));
        let err = verifier.verify(&token).await.unwrap_err();
        assert_eq!(err, VerificationError::ProjectIdNotResolved);
    }

    #[tokio::test]
    async fn claims_are_validated_before_the_signature() {
        // Wrong audience, and also signed by a key the verifier does not know: the claims error
        // must win because validation runs first.
        let mut claims = claims(3600);
        claims["aud"] = json!("other-project");
        let token = sign_token(SIGNER1_KEY_PEM, Some("unknown-kid"), &claims);
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, VerificationError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn expired_token_is_classified() {
        let token = sign_token(SIGNER1_KEY_PEM, Some("key-1"), &claims(-3600));
        let err = verifier().verify(&token).await.unwrap_err();
        assert_eq!(
            err,
            VerificationError::Expired {
                code: "id-token-expired".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn emulator_verifier_accepts_unsigned_tokens() {
        let profile = VerificationProfile::id_token("https://keys.example/certs");
        let verifier = TokenVerifier::emulator(profile, Some(PROJECT.to_owned()));

        let claims = serde_json::from_value(claims(3600)).unwrap();
        let token = encode_unsigned(&claims);
        let verified = verifier.verify(&token).await.unwrap();
        assert_eq!(verified.uid(), "user-1");
    }

    #[tokio::test]
    async fn emulator_verifier_still_validates_claims() {
        let profile = VerificationProfile::id_token("https://keys.example/certs");
        let verifier = TokenVerifier::emulator(profile, Some(PROJECT.to_owned()));

        let mut claims = claims(3600);
        claims["aud"] = json!("other-project");
        let token = encode_unsigned(&serde_json::from_value(claims).unwrap());
        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(err, VerificationError::InvalidArgument(_)));
    }
}
