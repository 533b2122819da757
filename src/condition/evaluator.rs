//! Aggregation of criterion results under a trigger policy.

use std::collections::HashMap;

use super::criterion::CriterionId;

/// Computes a condition result from per-criterion results.
///
/// `criteria` is the condition's current collection; `results` holds the
/// latest result of each criterion that has received telemetry.
///
/// - With `all_required`, every criterion must have a result and it must be
///   `true`. A criterion without a result counts as failed.
/// - Otherwise at least one criterion must have a `true` result. Criteria
///   without a result are ignored.
///
/// An empty collection is `false` under both policies.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use telemetry_conditions::condition::{compute_condition, CriterionId};
///
/// let (a, b) = (CriterionId::new(1), CriterionId::new(2));
/// let results = HashMap::from([(a, true)]);
///
/// assert!(compute_condition(&[a, b], &results, false));
/// assert!(!compute_condition(&[a, b], &results, true));
/// assert!(!compute_condition(&[], &results, true));
/// ```
#[must_use]
pub fn compute_condition<'a, I>(criteria: I, results: &HashMap<CriterionId, bool>, all_required: bool) -> bool
where
    I: IntoIterator<Item = &'a CriterionId>,
{
    let mut criteria = criteria.into_iter().peekable();
    if criteria.peek().is_none() {
        return false;
    }

    if all_required {
        criteria.all(|id| results.get(id) == Some(&true))
    } else {
        criteria.any(|id| results.get(id) == Some(&true))
    }
}
