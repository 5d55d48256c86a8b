//! Template condition model and evaluator.
//!
//! A template maps named conditions to the configuration values they gate. Each named condition is
//! a tree of [`OneOfCondition`] nodes: boolean composition (AND/OR), literal `true`/`false`,
//! percentage rollouts, and custom-signal comparisons. [`evaluate_conditions`] evaluates a list of
//! named conditions against a per-request [`EvaluationContext`] and returns a name → bool map in
//! insertion order.
//!
//! Evaluation is fail-closed: malformed or unrecognized configuration evaluates to `false`, never
//! to an error, so serving template values cannot crash the caller.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

mod custom_signal;
mod eval;
mod percent;

pub use eval::{evaluate_conditions, MAX_CONDITION_RECURSION_DEPTH};

/// A condition tree with the name it is referred to by from template parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedCondition {
    /// Name of the condition.
    pub name: String,
    /// Root of the condition tree.
    pub condition: OneOfCondition,
}

/// A single node of a condition tree. Exactly one case is set.
///
/// The wire format is an object with at most one of the known members set (`{"orCondition":
/// {...}}`, `{"true": {}}`, ...). An object with several members set decodes to the first known
/// member in declaration order; an empty or unrecognized object decodes to [`Unknown`], which
/// evaluates to `false`.
///
/// [`Unknown`]: OneOfCondition::Unknown
#[derive(Debug, Clone)]
pub enum OneOfCondition {
    /// True if any child condition is true. An empty child list is `false`.
    Or(ConditionList),
    /// True if every child condition is true. An empty child list is `true`.
    And(ConditionList),
    /// Literal `true`.
    True,
    /// Literal `false`.
    False,
    /// Percentage rollout over hashed randomization ids.
    Percent(PercentCondition),
    /// Comparison against a caller-provided signal value.
    CustomSignal(CustomSignalCondition),
    /// Unrecognized node (empty object or a member added by a newer server). Evaluates to
    /// `false`.
    Unknown,
}

/// Children of an AND/OR node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionList {
    /// Child conditions, evaluated left to right with short-circuiting.
    #[serde(default)]
    pub conditions: Vec<OneOfCondition>,
}

// The wire format is a message with optional members rather than a tagged union, so the enum
// round-trips through a raw struct mirroring the wire shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOneOfCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    or_condition: Option<ConditionList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    and_condition: Option<ConditionList>,
    #[serde(default, rename = "true", skip_serializing_if = "Option::is_none")]
    true_value: Option<EmptyValue>,
    #[serde(default, rename = "false", skip_serializing_if = "Option::is_none")]
    false_value: Option<EmptyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    percent: Option<PercentCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_signal: Option<CustomSignalCondition>,
}

/// Wire representation of the `true`/`false` markers (an empty message).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EmptyValue {}

impl From<RawOneOfCondition> for OneOfCondition {
    fn from(raw: RawOneOfCondition) -> Self {
        if let Some(or) = raw.or_condition {
            OneOfCondition::Or(or)
        } else if let Some(and) = raw.and_condition {
            OneOfCondition::And(and)
        } else if raw.true_value.is_some() {
            OneOfCondition::True
        } else if raw.false_value.is_some() {
            OneOfCondition::False
        } else if let Some(percent) = raw.percent {
            OneOfCondition::Percent(percent)
        } else if let Some(custom_signal) = raw.custom_signal {
            OneOfCondition::CustomSignal(custom_signal)
        } else {
            OneOfCondition::Unknown
        }
    }
}

impl From<&OneOfCondition> for RawOneOfCondition {
    fn from(condition: &OneOfCondition) -> Self {
        let mut raw = RawOneOfCondition::default();
        match condition {
            OneOfCondition::Or(or) => raw.or_condition = Some(or.clone()),
            OneOfCondition::And(and) => raw.and_condition = Some(and.clone()),
            OneOfCondition::True => raw.true_value = Some(EmptyValue {}),
            OneOfCondition::False => raw.false_value = Some(EmptyValue {}),
            OneOfCondition::Percent(percent) => raw.percent = Some(percent.clone()),
            OneOfCondition::CustomSignal(signal) => raw.custom_signal = Some(signal.clone()),
            OneOfCondition::Unknown => {}
        }
        raw
    }
}

impl<'de> Deserialize<'de> for OneOfCondition {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawOneOfCondition::deserialize(deserializer).map(OneOfCondition::from)
    }
}

impl Serialize for OneOfCondition {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawOneOfCondition::from(self).serialize(serializer)
    }
}

/// Percentage rollout condition.
///
/// Bounds are expressed in micropercent: a percentage scaled by 1,000,000, so 100% is
/// 100,000,000. Unset numeric members default to 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentCondition {
    /// How the client's bucket is compared against the bounds.
    #[serde(default)]
    pub percent_operator: PercentOperator,
    /// Seed prepended (with a `.` separator) to the randomization id before hashing, so that
    /// independent rollouts assign independent buckets.
    #[serde(default)]
    pub seed: Option<String>,
    /// Bound for [`LessOrEqual`](PercentOperator::LessOrEqual) and
    /// [`GreaterThan`](PercentOperator::GreaterThan), in micropercent.
    #[serde(default)]
    pub micro_percent: u32,
    /// Bounds for [`Between`](PercentOperator::Between).
    #[serde(default)]
    pub micro_percent_range: Option<MicroPercentRange>,
}

/// Comparison operator of a [`PercentCondition`].
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PercentOperator {
    /// Bucket must be less than or equal to `microPercent`.
    LessOrEqual,
    /// Bucket must be greater than `microPercent`.
    GreaterThan,
    /// Bucket must be inside `microPercentRange` (lower exclusive, upper inclusive).
    Between,
    /// Operator missing or not recognized. Evaluates to `false`.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Bucket range of a [`PercentOperator::Between`] condition, in micropercent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroPercentRange {
    /// Exclusive lower bound.
    #[serde(default)]
    pub micro_percent_lower_bound: u32,
    /// Inclusive upper bound.
    #[serde(default)]
    pub micro_percent_upper_bound: u32,
}

/// Comparison of a caller-provided signal value against a list of target values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSignalCondition {
    /// Comparison to apply.
    #[serde(default)]
    pub custom_signal_operator: CustomSignalOperator,
    /// Key of the signal in the evaluation context.
    pub custom_signal_key: String,
    /// Target values. String-family operators match against any of them; numeric and version
    /// operators use the first.
    #[serde(default)]
    pub target_custom_signal_values: Vec<String>,
}

/// Operator of a [`CustomSignalCondition`].
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomSignalOperator {
    /// Actual value contains any target as a substring.
    StringContains,
    /// Actual value contains no target as a substring.
    StringDoesNotContain,
    /// Actual value equals any target.
    StringExactlyMatches,
    /// Any target, interpreted as a regular expression, matches the actual value.
    StringContainsRegex,
    /// Numeric `<`.
    NumericLessThan,
    /// Numeric `<=`.
    NumericLessEqual,
    /// Numeric `==`.
    NumericEqual,
    /// Numeric `!=`.
    NumericNotEqual,
    /// Numeric `>`.
    NumericGreaterThan,
    /// Numeric `>=`.
    NumericGreaterEqual,
    /// Version `<`.
    SemanticVersionLessThan,
    /// Version `<=`.
    SemanticVersionLessEqual,
    /// Version `==`. Missing trailing components are zero, so `"5"` equals `"5.0.0"`.
    SemanticVersionEqual,
    /// Version `!=`.
    SemanticVersionNotEqual,
    /// Version `>`.
    SemanticVersionGreaterThan,
    /// Version `>=`.
    SemanticVersionGreaterEqual,
    /// Operator missing or not recognized. Evaluates to `false`.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Per-request context a condition tree is evaluated against. Never retained between calls.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    /// Stable client identifier hashed for percentage rollouts. Conditions with a percent node
    /// evaluate to `false` when this is absent or empty.
    pub randomization_id: Option<String>,
    /// Custom signal values keyed by signal name.
    pub signals: HashMap<String, SignalValue>,
}

/// Value of a custom signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    /// A string value.
    String(String),
    /// A numerical value.
    Number(f64),
}

impl SignalValue {
    /// String form used by the string-family operators.
    pub(crate) fn to_comparison_string(&self) -> String {
        match self {
            SignalValue::String(s) => s.clone(),
            SignalValue::Number(n) => n.to_string(),
        }
    }

    /// Numeric form used by the numeric-family operators. `None` if the value does not parse.
    pub(crate) fn as_number(&self) -> Option<f64> {
        match self {
            SignalValue::String(s) => s.trim().parse().ok(),
            SignalValue::Number(n) => Some(*n),
        }
    }
}

impl From<&str> for SignalValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for SignalValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for SignalValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_condition_tree() {
        let named: NamedCondition = serde_json::from_str(
            r#"
            {
              "name": "holdout",
              "condition": {
                "orCondition": {
                  "conditions": [
                    {"percent": {
                      "percentOperator": "BETWEEN",
                      "seed": "holdout-2024",
                      "microPercentRange": {"microPercentUpperBound": 50000000}
                    }},
                    {"customSignal": {
                      "customSignalOperator": "STRING_EXACTLY_MATCHES",
                      "customSignalKey": "plan",
                      "targetCustomSignalValues": ["enterprise"]
                    }},
                    {"true": {}}
                  ]
                }
              }
            }
            "#,
        )
        .unwrap();

        assert_eq!(named.name, "holdout");
        let OneOfCondition::Or(or) = &named.condition else {
            panic!("expected an orCondition, got {:?}", named.condition);
        };
        assert_eq!(or.conditions.len(), 3);
        let OneOfCondition::Percent(percent) = &or.conditions[0] else {
            panic!("expected a percent node");
        };
        assert_eq!(percent.percent_operator, PercentOperator::Between);
        assert_eq!(percent.seed.as_deref(), Some("holdout-2024"));
        assert_eq!(
            percent
                .micro_percent_range
                .unwrap()
                .micro_percent_upper_bound,
            50000000
        );
        assert!(matches!(&or.conditions[2], OneOfCondition::True));
    }

    #[test]
    fn parse_empty_node_as_unknown() {
        let condition: OneOfCondition = serde_json::from_str("{}").unwrap();
        assert!(matches!(condition, OneOfCondition::Unknown));
    }

    #[test]
    fn parse_unrecognized_node_as_unknown() {
        let condition: OneOfCondition =
            serde_json::from_str(r#"{"quantumCondition": {"qubits": 3}}"#).unwrap();
        assert!(matches!(condition, OneOfCondition::Unknown));
    }

    #[test]
    fn parse_multiple_members_picks_first_known() {
        // Not a valid server payload, but decoding must stay deterministic.
        let condition: OneOfCondition = serde_json::from_str(
            r#"{"andCondition": {"conditions": []}, "orCondition": {"conditions": []}}"#,
        )
        .unwrap();
        assert!(matches!(condition, OneOfCondition::Or(_)));
    }

    #[test]
    fn parse_unknown_operators() {
        let percent: PercentCondition =
            serde_json::from_str(r#"{"percentOperator": "APPROXIMATELY"}"#).unwrap();
        assert_eq!(percent.percent_operator, PercentOperator::Unknown);

        let signal: CustomSignalCondition = serde_json::from_str(
            r#"{"customSignalOperator": "FUZZY_MATCHES", "customSignalKey": "k"}"#,
        )
        .unwrap();
        assert_eq!(
            signal.custom_signal_operator,
            CustomSignalOperator::Unknown
        );
    }

    #[test]
    fn condition_serialization_round_trips() {
        let condition = OneOfCondition::And(ConditionList {
            conditions: vec![OneOfCondition::True, OneOfCondition::False],
        });
        let json = serde_json::to_string(&condition).unwrap();
        assert_eq!(json, r#"{"andCondition":{"conditions":[{"true":{}},{"false":{}}]}}"#);
        let back: OneOfCondition = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, OneOfCondition::And(_)));
    }
}
