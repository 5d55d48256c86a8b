//! Recursive condition-tree evaluation.

use super::{custom_signal, percent, EvaluationContext, NamedCondition, OneOfCondition};

/// Maximum condition-tree depth. Nodes nested deeper evaluate to `false` without an error, which
/// bounds evaluation of pathological or cyclic server payloads.
pub const MAX_CONDITION_RECURSION_DEPTH: usize = 10;

/// Evaluate a list of named conditions against `context`.
///
/// Each named condition is evaluated independently; the result preserves the input order. This is
/// a pure function of its inputs: no I/O, no shared state, and it never fails — malformed
/// configuration evaluates to `false`.
pub fn evaluate_conditions(
    conditions: &[NamedCondition],
    context: &EvaluationContext,
) -> Vec<(String, bool)> {
    conditions
        .iter()
        .map(|named| {
            let value = evaluate(&named.condition, context, 0);
            log::trace!(target: "gatekit",
                condition = named.name.as_str(),
                value;
                "evaluated a condition");
            (named.name.clone(), value)
        })
        .collect()
}

fn evaluate(condition: &OneOfCondition, context: &EvaluationContext, depth: usize) -> bool {
    if depth >= MAX_CONDITION_RECURSION_DEPTH {
        log::warn!(target: "gatekit",
            depth;
            "condition tree exceeds maximum depth, evaluating node to false");
        return false;
    }

    match condition {
        OneOfCondition::Or(list) => list
            .conditions
            .iter()
            .any(|child| evaluate(child, context, depth + 1)),
        OneOfCondition::And(list) => list
            .conditions
            .iter()
            .all(|child| evaluate(child, context, depth + 1)),
        OneOfCondition::True => true,
        OneOfCondition::False => false,
        OneOfCondition::Percent(condition) => {
            percent::eval_percent(condition, context.randomization_id.as_deref())
        }
        OneOfCondition::CustomSignal(condition) => {
            custom_signal::eval_custom_signal(condition, &context.signals)
        }
        OneOfCondition::Unknown => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::ConditionList;

    fn or(conditions: Vec<OneOfCondition>) -> OneOfCondition {
        OneOfCondition::Or(ConditionList { conditions })
    }

    fn and(conditions: Vec<OneOfCondition>) -> OneOfCondition {
        OneOfCondition::And(ConditionList { conditions })
    }

    fn eval_one(condition: OneOfCondition) -> bool {
        let named = vec![NamedCondition {
            name: "test".to_owned(),
            condition,
        }];
        let results = evaluate_conditions(&named, &EvaluationContext::default());
        results[0].1
    }

    #[test]
    fn literals() {
        assert!(eval_one(OneOfCondition::True));
        assert!(!eval_one(OneOfCondition::False));
        assert!(!eval_one(OneOfCondition::Unknown));
    }

    #[test]
    fn empty_or_is_false() {
        assert!(!eval_one(or(vec![])));
    }

    #[test]
    fn empty_and_is_true() {
        assert!(eval_one(and(vec![])));
    }

    #[test]
    fn or_shortcircuits_on_first_true() {
        assert!(eval_one(or(vec![
            OneOfCondition::False,
            OneOfCondition::True,
            OneOfCondition::Unknown,
        ])));
    }

    #[test]
    fn and_shortcircuits_on_first_false() {
        assert!(!eval_one(and(vec![
            OneOfCondition::True,
            OneOfCondition::False,
            OneOfCondition::True,
        ])));
    }

    fn nested(levels: usize, leaf: OneOfCondition) -> OneOfCondition {
        let mut node = leaf;
        for _ in 0..levels {
            node = and(vec![node]);
        }
        node
    }

    #[test]
    fn nesting_within_depth_limit_reaches_leaf() {
        // Root at depth 0, leaf at depth 9.
        assert!(eval_one(nested(9, OneOfCondition::True)));
    }

    #[test]
    fn nesting_past_depth_limit_is_false() {
        // The leaf sits at depth 10 and is cut off, so the innermost AND sees no true child.
        assert!(!eval_one(nested(10, OneOfCondition::True)));
        assert!(!eval_one(nested(11, OneOfCondition::True)));
    }

    #[test]
    fn results_preserve_input_order() {
        let named: Vec<NamedCondition> = ["c", "a", "b"]
            .iter()
            .map(|name| NamedCondition {
                name: (*name).to_owned(),
                condition: OneOfCondition::True,
            })
            .collect();
        let results = evaluate_conditions(&named, &EvaluationContext::default());
        let names: Vec<&str> = results.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
