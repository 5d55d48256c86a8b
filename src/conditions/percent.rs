//! Percentage-rollout evaluation.
//!
//! A client's bucket is derived from `seed.randomizationId` with
//! [`fingerprint64`](crate::fingerprint::fingerprint64), so the same client lands in the same
//! bucket in every SDK language. The fingerprint is interpreted as a two's-complement signed
//! 64-bit integer and its absolute value is taken before reducing to the micropercent scale,
//! matching the reference implementation. `unsigned_abs` keeps `i64::MIN` well-defined: it maps
//! to 2^63 instead of overflowing.

use crate::fingerprint::fingerprint64;

use super::{PercentCondition, PercentOperator};

/// Total number of micropercent buckets (100% scaled by 1,000,000).
const TOTAL_MICRO_PERCENT: u64 = 100_000_000;

pub(super) fn eval_percent(condition: &PercentCondition, randomization_id: Option<&str>) -> bool {
    let Some(randomization_id) = randomization_id.filter(|id| !id.is_empty()) else {
        log::warn!(target: "gatekit",
            "missing randomization id, evaluating percent condition to false");
        return false;
    };

    let bucket = bucket(condition.seed.as_deref(), randomization_id);

    match condition.percent_operator {
        PercentOperator::LessOrEqual => bucket <= condition.micro_percent as u64,
        PercentOperator::GreaterThan => bucket > condition.micro_percent as u64,
        PercentOperator::Between => {
            let range = condition.micro_percent_range.unwrap_or_default();
            bucket > range.micro_percent_lower_bound as u64
                && bucket <= range.micro_percent_upper_bound as u64
        }
        PercentOperator::Unknown => false,
    }
}

/// Micropercent bucket assigned to `randomization_id` under `seed`.
fn bucket(seed: Option<&str>, randomization_id: &str) -> u64 {
    let input = match seed.filter(|seed| !seed.is_empty()) {
        Some(seed) => format!("{seed}.{randomization_id}"),
        None => randomization_id.to_owned(),
    };
    bucket_of_hash(fingerprint64(input.as_bytes()))
}

fn bucket_of_hash(hash: u64) -> u64 {
    (hash as i64).unsigned_abs() % TOTAL_MICRO_PERCENT
}
