//! Structural decoding of the compact token serialization.
//!
//! A compact token is `header.payload.signature`, each segment base64url-encoded without padding;
//! header and payload are JSON objects. Decoding here is purely structural: no signature check,
//! no claims validation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::VerificationError;

/// Decoded token header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Signing algorithm name, e.g. `"RS256"`, or `"none"` for unsigned tokens.
    pub alg: String,
    /// Token type, conventionally `"JWT"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Id of the key the token was signed with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// Decoded token payload.
///
/// Registered claims are typed; everything else is kept in [`custom`](Claims::custom).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Subject (the primary identifier the token was minted for).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    /// Expiration time, seconds since the UNIX epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Issued-at time, seconds since the UNIX epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// All remaining claims.
    #[serde(flatten)]
    pub custom: serde_json::Map<String, serde_json::Value>,
}

/// The `aud` claim: a single audience for most token kinds, an array for the multi-audience
/// kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// A single audience value.
    Single(String),
    /// Multiple audience values; membership is checked instead of equality.
    Many(Vec<String>),
}

impl Audience {
    /// Return `true` if `value` is the audience or one of the audiences.
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == value,
            Audience::Many(auds) => auds.iter().any(|aud| aud == value),
        }
    }
}

/// A structurally decoded, not-yet-verified token.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    /// Decoded header segment.
    pub header: Header,
    /// Decoded payload segment.
    pub claims: Claims,
}

/// Split and parse a compact token without verifying anything.
///
/// Fails with [`VerificationError::InvalidArgument`] if the input is not three dot-separated
/// base64url segments with JSON header and payload.
pub fn decode_token(token: &str) -> Result<DecodedToken, VerificationError> {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(VerificationError::InvalidArgument(
            "the token must consist of three dot-separated segments".to_owned(),
        ));
    };

    Ok(DecodedToken {
        header: decode_segment(header, "header")?,
        claims: decode_segment(payload, "payload")?,
    })
}

fn decode_segment<T: DeserializeOwned>(
    segment: &str,
    name: &str,
) -> Result<T, VerificationError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|_| {
        VerificationError::InvalidArgument(format!(
            "the token {name} segment is not valid base64url"
        ))
    })?;
    serde_json::from_slice(&bytes).map_err(|_| {
        VerificationError::InvalidArgument(format!("the token {name} segment is not valid JSON"))
    })
}

/// Encode an unsigned (`alg = "none"`) compact token with an empty signature segment.
///
/// Used for local/emulator flows where tokens are accepted without a signature, and as the
/// inverse of [`decode_token`] for structural round-trips.
pub fn encode_unsigned(claims: &Claims) -> String {
    let header = Header {
        alg: super::ALGORITHM_NONE.to_owned(),
        typ: Some("JWT".to_owned()),
        kid: None,
    };
    // Serializing our own in-memory types cannot fail.
    let header_json = serde_json::to_vec(&header).expect("header serialization should not fail");
    let claims_json = serde_json::to_vec(claims).expect("claims serialization should not fail");
    format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(claims_json)
    )
}
