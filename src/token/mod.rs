//! Verification of compact signed tokens (JWTs).
//!
//! The pipeline is [`TokenVerifier`]: structural decode ([`codec`]), claims validation against a
//! [`VerificationProfile`], then a cryptographic [`SignatureCheck`] backed by a cached
//! [`KeySource`]. Every failure is a [`VerificationError`] variant with a profile-aware message.
//!
//! ```no_run
//! # async fn example() -> gatekit_core::Result<()> {
//! use gatekit_core::token::{TokenVerifier, VerificationProfile};
//!
//! let profile = VerificationProfile::id_token("https://keys.gatekit.dev/certs");
//! let verifier = TokenVerifier::new(profile, Some("my-project".to_owned()))?;
//! let verified = verifier.verify("eyJhbGciOi...").await?;
//! println!("verified subject: {}", verified.uid());
//! # Ok(())
//! # }
//! ```

pub mod codec;
mod error;
pub mod key_source;
pub mod profile;
pub mod signature;
mod validate;
mod verifier;

pub use codec::{decode_token, Audience, Claims, DecodedToken, Header};
pub use error::VerificationError;
pub use key_source::{JwksKeySource, KeySet, KeySource, StaticKeySource, UrlKeySource};
pub use profile::{
    AudiencePolicy, VerificationProfile, ALGORITHM_NONE, ALGORITHM_RS256, CUSTOM_TOKEN_AUDIENCE,
};
pub use signature::{EmulatorSignatureCheck, SignatureCheck, SignatureVerifier};
pub use verifier::{TokenVerifier, VerifiedToken, PROJECT_ID_ENV};
