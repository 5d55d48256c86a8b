use serde::{Deserialize, Serialize};

/// Enum representing possible errors that can occur while verifying a signed token.
///
/// The variant is the contract: callers should match on it rather than on the message, which is
/// human-readable guidance tailored to the token kind being verified.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum VerificationError {
    /// The token string is malformed, not decodable, or carries claims that do not match the
    /// verification profile (wrong algorithm, audience, issuer, subject, or token kind).
    #[error("{0}")]
    InvalidArgument(String),

    /// The environment does not determine which project to validate tokens against.
    #[error(
        "unable to determine project id: set the project id explicitly when constructing the \
         verifier, or set the GATEKIT_PROJECT_ID environment variable"
    )]
    ProjectIdNotResolved,

    /// The token's `exp` claim is in the past. The code distinguishes which token kind expired
    /// (e.g. `id-token-expired` vs `session-cookie-expired`).
    #[error("{code}: the token has expired; fetch a fresh token and retry")]
    Expired {
        /// Profile-specific expired-error code.
        code: String,
    },

    /// Cryptographic signature verification failed against every attempted key.
    #[error("the token signature is invalid")]
    InvalidSignature,

    /// The token header names a key id that is not part of the fetched key set. Most commonly the
    /// signing keys have rotated past the token's key and the token is stale.
    #[error("the token references a key id that is not part of the current key set")]
    NoMatchingKid,

    /// The token header carries no key id, and the verifier does not accept kid-less tokens.
    #[error("the token header has no \"kid\" claim")]
    NoKidInHeader,

    /// The public key source could not be reached or returned an invalid response.
    #[error("error fetching public keys: {0}")]
    KeyFetch(String),
}
