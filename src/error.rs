use crate::token::VerificationError;

/// Represents a result type for operations in the GateKit SDK.
///
/// This `Result` type is a standard Rust `Result` type where the error variant is defined by the
/// GateKit-specific [`Error`] enum.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur in the GateKit SDK.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Error verifying a signed token.
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Invalid key-source URL configuration.
    #[error("invalid key source url configuration")]
    InvalidKeySourceUrl(#[source] url::ParseError),
}
