//! `gatekit_core` is a common library to build GateKit server SDKs for different languages. If
//! you're integrating GateKit into a backend service, you probably want one of the higher-level
//! SDKs built on top of this crate.
//!
//! # Overview
//!
//! `gatekit_core` is organized as a set of building blocks that help to build server SDKs. The two
//! subsystems are independent and can be used separately.
//!
//! [`token`] implements the signed-token verification pipeline: a structural
//! [decoder](token::decode_token), a claims validator, and a signature verifier backed by a
//! pluggable [`KeySource`](token::KeySource). A [`TokenVerifier`](token::TokenVerifier) composes
//! the three into one call that yields a [`VerifiedToken`](token::VerifiedToken) or a classified
//! [`VerificationError`](token::VerificationError). Verification of each token kind (ID token,
//! session cookie, and so on) is driven by an immutable
//! [`VerificationProfile`](token::VerificationProfile), so a verifier constructed once can be
//! reused for many requests. Public keys are cached per key-source instance and refreshed when
//! their TTL elapses; a refresh builds the replacement key set completely before swapping it in,
//! so concurrent verifications never observe a partial key map.
//!
//! [`conditions`] implements the template condition evaluator: a tagged condition tree (AND/OR,
//! constants, percentage rollouts, custom-signal comparisons) evaluated against a per-request
//! [`EvaluationContext`](conditions::EvaluationContext). Evaluation is a pure function of its
//! inputs, never fails, and degrades to `false` on malformed configuration so that serving
//! template values can never crash a caller. Percentage rollouts bucket clients with
//! [`fingerprint64`](fingerprint::fingerprint64), which is bit-compatible with the reference
//! implementation used by SDKs in other languages.
//!
//! # Error Handling
//!
//! Fallible operations return [`Error`]. Token verification failures carry a stable
//! [`VerificationError`](token::VerificationError) kind; match on the kind rather than the
//! message, which is human-readable guidance and may change between releases.
//!
//! # Logging
//!
//! The crate uses the [`log`](https://docs.rs/log/latest/log/) crate with target `"gatekit"`.
//! Consider installing a `log`-compatible logger for visibility into key fetches and evaluation
//! fallbacks.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod conditions;
pub mod fingerprint;
pub mod token;

mod error;

pub use error::{Error, Result};
