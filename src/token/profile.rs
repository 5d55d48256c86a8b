//! Verification profiles.
//!
//! A [`VerificationProfile`] describes one token *kind* — ID token, session cookie, and so on —
//! and is immutable for the lifetime of the verifier built from it. The profile drives the
//! expected algorithm, issuer and audience shapes, and the human-readable names used in error
//! messages, so that "ID token expired" and "session cookie expired" stay distinguishable.

/// Algorithm name expected by the standard profiles.
pub const ALGORITHM_RS256: &str = "RS256";

/// Sentinel algorithm of unsigned tokens, accepted only by emulator-mode verifiers.
pub const ALGORITHM_NONE: &str = "none";

/// Audience minted into custom tokens (tokens created by `createCustomToken`-style APIs, meant to
/// be exchanged for an ID token rather than verified directly). Used to produce a targeted
/// "you passed the wrong kind of token" message.
pub const CUSTOM_TOKEN_AUDIENCE: &str =
    "https://identity.gatekit.dev/v1/projects/-/token-service";

/// How the `aud` claim is matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudiencePolicy {
    /// `aud` must equal the project id exactly.
    Project,
    /// `aud` must contain `prefix + project_id`. Used by the multi-audience token kinds, where
    /// `aud` is an array; the issuer is implied by the matched entry and not checked separately.
    Scoped {
        /// Prefix the project id is scoped under.
        prefix: String,
    },
}

/// Immutable description of one verifiable token kind.
///
/// Create one per token kind at service construction and reuse it; all fields are read-only
/// afterwards.
#[derive(Debug, Clone)]
pub struct VerificationProfile {
    /// URL the signing public keys are published at.
    pub cert_source_url: String,
    /// Algorithm tokens of this kind must be signed with ([`ALGORITHM_NONE`] accepts unsigned
    /// tokens and skips signature verification entirely).
    pub expected_algorithm: String,
    /// Expected issuer is `issuer_prefix + project_id`.
    pub issuer_prefix: String,
    /// Documentation link embedded in error messages.
    pub docs_url: String,
    /// Name of the API the caller invoked, for error messages (e.g. `verifyIdToken()`).
    pub api_name: String,
    /// Capitalized token-kind name for the start of error messages (e.g. `ID token`).
    pub full_name: String,
    /// Token-kind name used mid-sentence (e.g. `ID token`, `session cookie`).
    pub short_name: String,
    /// Stable error code reported when a token of this kind has expired.
    pub expired_error_code: String,
    /// How the audience claim is matched.
    pub audience: AudiencePolicy,
    /// Maximum accepted `sub` length, if this kind restricts it.
    pub subject_max_len: Option<usize>,
}

impl VerificationProfile {
    /// Profile for ID tokens issued to signed-in end users.
    pub fn id_token(cert_source_url: impl Into<String>) -> Self {
        VerificationProfile {
            cert_source_url: cert_source_url.into(),
            expected_algorithm: ALGORITHM_RS256.to_owned(),
            issuer_prefix: "https://sessions.gatekit.dev/".to_owned(),
            docs_url: "https://docs.gatekit.dev/identity/verify-id-tokens".to_owned(),
            api_name: "verify_id_token()".to_owned(),
            full_name: "ID token".to_owned(),
            short_name: "ID token".to_owned(),
            expired_error_code: "id-token-expired".to_owned(),
            audience: AudiencePolicy::Project,
            subject_max_len: Some(128),
        }
    }

    /// Profile for long-lived session cookies minted from ID tokens.
    pub fn session_cookie(cert_source_url: impl Into<String>) -> Self {
        VerificationProfile {
            cert_source_url: cert_source_url.into(),
            expected_algorithm: ALGORITHM_RS256.to_owned(),
            issuer_prefix: "https://cookies.gatekit.dev/".to_owned(),
            docs_url: "https://docs.gatekit.dev/identity/manage-cookies".to_owned(),
            api_name: "verify_session_cookie()".to_owned(),
            full_name: "Session cookie".to_owned(),
            short_name: "session cookie".to_owned(),
            expired_error_code: "session-cookie-expired".to_owned(),
            audience: AudiencePolicy::Project,
            subject_max_len: None,
        }
    }

    /// Suffix appended to claim-validation error messages pointing at the docs for this token
    /// kind.
    pub(crate) fn docs_suffix(&self) -> String {
        format!(
            "See {} for details on how to retrieve a valid {}.",
            self.docs_url, self.short_name
        )
    }
}
