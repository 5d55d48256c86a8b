//! Custom-signal comparisons.
//!
//! Comparisons never fail: a missing signal, an unparseable number or version, or an invalid
//! regular expression evaluates the condition to `false`.

use std::cmp::Ordering;
use std::collections::HashMap;

use regex::Regex;

use super::{CustomSignalCondition, CustomSignalOperator, SignalValue};

pub(super) fn eval_custom_signal(
    condition: &CustomSignalCondition,
    signals: &HashMap<String, SignalValue>,
) -> bool {
    let Some(actual) = signals.get(&condition.custom_signal_key) else {
        return false;
    };
    let targets = &condition.target_custom_signal_values;

    use CustomSignalOperator::*;
    match condition.custom_signal_operator {
        StringContains => {
            let actual = actual.to_comparison_string();
            let actual = actual.trim();
            targets.iter().any(|target| actual.contains(target.trim()))
        }
        StringDoesNotContain => {
            let actual = actual.to_comparison_string();
            let actual = actual.trim();
            !targets.is_empty() && !targets.iter().any(|target| actual.contains(target.trim()))
        }
        StringExactlyMatches => {
            let actual = actual.to_comparison_string();
            let actual = actual.trim();
            targets.iter().any(|target| actual == target.trim())
        }
        StringContainsRegex => {
            let actual = actual.to_comparison_string();
            let actual = actual.trim();
            targets
                .iter()
                .any(|target| match Regex::new(target.trim()) {
                    Ok(regex) => regex.is_match(actual),
                    Err(err) => {
                        log::warn!(target: "gatekit",
                            pattern = target.as_str(),
                            error:display = err;
                            "invalid regex in custom signal condition");
                        false
                    }
                })
        }
        NumericLessThan => compare_numbers(actual, targets, Ordering::is_lt),
        NumericLessEqual => compare_numbers(actual, targets, Ordering::is_le),
        NumericEqual => compare_numbers(actual, targets, Ordering::is_eq),
        NumericNotEqual => compare_numbers(actual, targets, Ordering::is_ne),
        NumericGreaterThan => compare_numbers(actual, targets, Ordering::is_gt),
        NumericGreaterEqual => compare_numbers(actual, targets, Ordering::is_ge),
        SemanticVersionLessThan => compare_versions(actual, targets, Ordering::is_lt),
        SemanticVersionLessEqual => compare_versions(actual, targets, Ordering::is_le),
        SemanticVersionEqual => compare_versions(actual, targets, Ordering::is_eq),
        SemanticVersionNotEqual => compare_versions(actual, targets, Ordering::is_ne),
        SemanticVersionGreaterThan => compare_versions(actual, targets, Ordering::is_gt),
        SemanticVersionGreaterEqual => compare_versions(actual, targets, Ordering::is_ge),
        Unknown => false,
    }
}

/// Numeric comparison against the single (first) target value. Unparseable actual or target is
/// `false`, not an error.
fn compare_numbers(
    actual: &SignalValue,
    targets: &[String],
    check: impl Fn(Ordering) -> bool,
) -> bool {
    let Some(actual) = actual.as_number() else {
        return false;
    };
    let Some(target) = targets.first().and_then(|t| t.trim().parse::<f64>().ok()) else {
        return false;
    };
    let Some(ordering) = actual.partial_cmp(&target) else {
        // NaN comparisons are undefined; fail closed.
        return false;
    };
    check(ordering)
}

/// Version comparison against the single (first) target value.
fn compare_versions(
    actual: &SignalValue,
    targets: &[String],
    check: impl Fn(Ordering) -> bool,
) -> bool {
    let Some(actual) = parse_version(&actual.to_comparison_string()) else {
        return false;
    };
    let Some(target) = targets.first().and_then(|t| parse_version(t)) else {
        return false;
    };
    check(actual.cmp(&target))
}

/// Maximum number of dot-separated version components.
const MAX_VERSION_SEGMENTS: usize = 5;

/// Parse a version as dot-separated numeric components, zero-padded to a fixed width so that
/// `"5"`, `"5.0"`, and `"5.0.0"` compare equal. Non-numeric or oversized versions are `None`.
fn parse_version(version: &str) -> Option<[u64; MAX_VERSION_SEGMENTS]> {
    let version = version.trim();
    if version.is_empty() {
        return None;
    }
    let mut segments = [0u64; MAX_VERSION_SEGMENTS];
    let mut count = 0;
    for part in version.split('.') {
        if count >= MAX_VERSION_SEGMENTS {
            return None;
        }
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        segments[count] = part.parse().ok()?;
        count += 1;
    }
    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(
        operator: CustomSignalOperator,
        key: &str,
        targets: &[&str],
    ) -> CustomSignalCondition {
        CustomSignalCondition {
            custom_signal_operator: operator,
            custom_signal_key: key.to_owned(),
            target_custom_signal_values: targets.iter().map(|t| (*t).to_owned()).collect(),
        }
    }

    fn signals(entries: &[(&str, SignalValue)]) -> HashMap<String, SignalValue> {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_owned(), value.clone()))
            .collect()
    }

    fn eval(operator: CustomSignalOperator, actual: SignalValue, targets: &[&str]) -> bool {
        eval_custom_signal(
            &condition(operator, "signal", targets),
            &signals(&[("signal", actual)]),
        )
    }

    use CustomSignalOperator::*;

    #[test]
    fn missing_signal_is_false() {
        let condition = condition(StringContains, "absent", &["a"]);
        assert!(!eval_custom_signal(&condition, &HashMap::new()));
    }

    #[test]
    fn string_contains() {
        assert!(eval(StringContains, "paid tier".into(), &["paid"]));
        assert!(eval(StringContains, "paid tier".into(), &["free", "tier"]));
        assert!(!eval(StringContains, "paid tier".into(), &["free"]));
        // Values are trimmed before comparison.
        assert!(eval(StringContains, "  paid tier  ".into(), &[" paid "]));
    }

    #[test]
    fn string_does_not_contain() {
        assert!(eval(StringDoesNotContain, "paid tier".into(), &["free"]));
        assert!(!eval(StringDoesNotContain, "paid tier".into(), &["free", "tier"]));
        // No targets to rule out means no match.
        assert!(!eval(StringDoesNotContain, "paid tier".into(), &[]));
    }

    #[test]
    fn string_exactly_matches() {
        assert!(eval(StringExactlyMatches, "beta".into(), &["alpha", "beta"]));
        assert!(eval(StringExactlyMatches, "  beta ".into(), &["beta"]));
        assert!(!eval(StringExactlyMatches, "beta tester".into(), &["beta"]));
        // Numbers compare through their string form.
        assert!(eval(StringExactlyMatches, 42.0.into(), &["42"]));
    }

    #[test]
    fn string_contains_regex() {
        assert!(eval(StringContainsRegex, "user@example.com".into(), &["^user@.*"]));
        assert!(!eval(StringContainsRegex, "admin@example.com".into(), &["^user@.*"]));
        // Actual value and pattern are trimmed like the rest of the string family, so an
        // anchored pattern still matches a padded value.
        assert!(eval(StringContainsRegex, "  user@example.com ".into(), &["^user@.*"]));
        assert!(eval(StringContainsRegex, "user@example.com".into(), &[" ^user@.* "]));
        // An invalid pattern fails closed instead of erroring.
        assert!(!eval(StringContainsRegex, "user".into(), &["("]));
    }

    #[test]
    fn numeric_comparisons() {
        assert!(eval(NumericGreaterEqual, 5.0.into(), &["5"]));
        assert!(eval(NumericGreaterEqual, "5.0".into(), &["5"]));
        assert!(eval(NumericLessThan, 4.5.into(), &["5"]));
        assert!(!eval(NumericLessThan, 5.0.into(), &["5"]));
        assert!(eval(NumericEqual, "10".into(), &[" 10 "]));
        assert!(eval(NumericNotEqual, 10.5.into(), &["10"]));
        assert!(!eval(NumericGreaterThan, 5.0.into(), &["5"]));
        assert!(eval(NumericLessEqual, 5.0.into(), &["5"]));
    }

    #[test]
    fn numeric_with_unparseable_values_is_false() {
        assert!(!eval(NumericGreaterEqual, "not a number".into(), &["5"]));
        assert!(!eval(NumericGreaterEqual, 5.0.into(), &["not a number"]));
        assert!(!eval(NumericGreaterEqual, 5.0.into(), &[]));
    }

    #[test]
    fn semantic_version_comparisons() {
        assert!(eval(SemanticVersionEqual, "5.0".into(), &["5"]));
        assert!(eval(SemanticVersionEqual, 5.0.into(), &["5.0.0"]));
        assert!(eval(SemanticVersionGreaterThan, "1.10.0".into(), &["1.2"]));
        assert!(eval(SemanticVersionLessThan, "1.2.0".into(), &["1.10"]));
        assert!(eval(SemanticVersionLessEqual, "2.0.0".into(), &["2"]));
        assert!(eval(SemanticVersionGreaterEqual, "2.0.1".into(), &["2"]));
        assert!(eval(SemanticVersionNotEqual, "2.0.1".into(), &["2"]));
        assert!(!eval(SemanticVersionEqual, "2.0.1".into(), &["2"]));
    }

    #[test]
    fn semantic_version_with_unparseable_values_is_false() {
        assert!(!eval(SemanticVersionEqual, "5.0-beta".into(), &["5.0"]));
        assert!(!eval(SemanticVersionEqual, "5.0".into(), &["five"]));
        assert!(!eval(SemanticVersionEqual, "".into(), &["5.0"]));
        // More than five components is rejected.
        assert!(!eval(SemanticVersionEqual, "1.2.3.4.5.6".into(), &["1.2.3.4.5.6"]));
    }

    #[test]
    fn version_parsing() {
        assert_eq!(parse_version("5"), Some([5, 0, 0, 0, 0]));
        assert_eq!(parse_version(" 1.2.3 "), Some([1, 2, 3, 0, 0]));
        assert_eq!(parse_version("1.2.3.4.5"), Some([1, 2, 3, 4, 5]));
        assert_eq!(parse_version("1..2"), None);
        assert_eq!(parse_version("1.2-rc1"), None);
        assert_eq!(parse_version("-1.2"), None);
    }

    #[test]
    fn unknown_operator_is_false() {
        assert!(!eval(Unknown, "anything".into(), &["anything"]));
    }
}
