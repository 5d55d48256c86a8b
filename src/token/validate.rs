//! Claims-level validation against a verification profile.
//!
//! All checks here are structural and run before any cryptography. The first failing check wins.
//! Messages embed the profile's human names and documentation link so that the guidance differs
//! per token kind; callers classify on the error variant, not the text.

use super::codec::DecodedToken;
use super::profile::{AudiencePolicy, VerificationProfile, ALGORITHM_NONE, CUSTOM_TOKEN_AUDIENCE};
use super::VerificationError;

pub(crate) fn validate_claims(
    decoded: &DecodedToken,
    project_id: &str,
    profile: &VerificationProfile,
) -> Result<(), VerificationError> {
    let header = &decoded.header;
    let claims = &decoded.claims;
    let suffix = profile.docs_suffix();
    let invalid = VerificationError::InvalidArgument;

    if profile.expected_algorithm != ALGORITHM_NONE {
        if header.kid.is_none() {
            return Err(invalid(missing_kid_message(decoded, profile, &suffix)));
        }
        if header.alg != profile.expected_algorithm {
            return Err(invalid(format!(
                "{} has incorrect algorithm. Expected \"{}\" but got \"{}\". {suffix}",
                profile.full_name, profile.expected_algorithm, header.alg
            )));
        }
    }

    match &profile.audience {
        AudiencePolicy::Project => {
            if !claims
                .aud
                .as_ref()
                .is_some_and(|aud| aud.contains(project_id))
            {
                return Err(invalid(format!(
                    "{} has incorrect \"aud\" (audience) claim. Expected \"{project_id}\" but \
                     got {}. Make sure the {} comes from the same project as the credential \
                     used to initialize this verifier. {suffix}",
                    profile.full_name,
                    claim_for_display(&claims.aud),
                    profile.short_name
                )));
            }

            let expected_issuer = format!("{}{project_id}", profile.issuer_prefix);
            if claims.iss.as_deref() != Some(expected_issuer.as_str()) {
                return Err(invalid(format!(
                    "{} has incorrect \"iss\" (issuer) claim. Expected \"{expected_issuer}\" \
                     but got {}. Make sure the {} comes from the same project as the credential \
                     used to initialize this verifier. {suffix}",
                    profile.full_name,
                    claim_for_display(&claims.iss),
                    profile.short_name
                )));
            }
        }
        // Multi-audience kinds: membership of the scoped identifier implies the issuer, so no
        // separate issuer check.
        AudiencePolicy::Scoped { prefix } => {
            let expected = format!("{prefix}{project_id}");
            if !claims
                .aud
                .as_ref()
                .is_some_and(|aud| aud.contains(&expected))
            {
                return Err(invalid(format!(
                    "{} has incorrect \"aud\" (audience) claim. Expected \"{expected}\" to be \
                     present but got {}. {suffix}",
                    profile.full_name,
                    claim_for_display(&claims.aud)
                )));
            }
        }
    }

    match claims.sub.as_deref() {
        None => {
            return Err(invalid(format!(
                "{} has no \"sub\" (subject) claim. {suffix}",
                profile.full_name
            )));
        }
        Some("") => {
            return Err(invalid(format!(
                "{} has an empty string \"sub\" (subject) claim. {suffix}",
                profile.full_name
            )));
        }
        Some(sub) => {
            if let Some(max_len) = profile.subject_max_len {
                // The cap counts characters, not bytes, so multi-byte subjects are not
                // penalized.
                if sub.chars().count() > max_len {
                    return Err(invalid(format!(
                        "{} has a \"sub\" (subject) claim longer than {max_len} characters. \
                         {suffix}",
                        profile.full_name
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Diagnose a missing `kid`: most commonly the caller passed a custom token (minted to be
/// exchanged, not verified) to the wrong API.
fn missing_kid_message(
    decoded: &DecodedToken,
    profile: &VerificationProfile,
    suffix: &str,
) -> String {
    let claims = &decoded.claims;
    let is_custom_token = claims
        .aud
        .as_ref()
        .is_some_and(|aud| aud.contains(CUSTOM_TOKEN_AUDIENCE));
    let is_legacy_custom_token = decoded.header.alg == "HS256"
        && claims.custom.get("v") == Some(&serde_json::Value::from(0))
        && claims.custom.contains_key("d");

    if is_custom_token {
        format!(
            "{} expects {} {}, but was given a custom token. {suffix}",
            profile.api_name,
            article(&profile.short_name),
            profile.short_name
        )
    } else if is_legacy_custom_token {
        format!(
            "{} expects {} {}, but was given a legacy custom token. {suffix}",
            profile.api_name,
            article(&profile.short_name),
            profile.short_name
        )
    } else {
        format!(
            "{} has no \"kid\" claim. {suffix}",
            profile.full_name
        )
    }
}

fn article(noun: &str) -> &'static str {
    match noun.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u' | 'A' | 'E' | 'I' | 'O' | 'U') => "an",
        _ => "a",
    }
}

fn claim_for_display<T: serde::Serialize>(claim: &Option<T>) -> String {
    match claim {
        Some(value) => {
            serde_json::to_string(value).unwrap_or_else(|_| "<unprintable>".to_owned())
        }
        None => "no claim".to_owned(),
    }
}
