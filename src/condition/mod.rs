//! Conditions and their criteria.
//!
//! A `Condition` owns an ordered list of `Criterion`s, each testing one
//! telemetry field. Criteria report results over the condition's inbound
//! queue; the condition folds them with `compute_condition` and publishes
//! `ConditionEvent`s to any number of `ConditionStream`s. This module is
//! embedded-first: the caller drives `Condition::process_events` from its own
//! loop.

/// Condition aggregate and lifecycle.
#[allow(clippy::module_inception)]
pub mod condition;
/// Single telemetry predicate.
pub mod criterion;
/// Trigger policy evaluation.
pub mod evaluator;
/// Inbound messages and outbound events.
pub mod events;
/// Subscriber stream handle.
pub mod stream;

pub use condition::{Condition, ConditionContext, ConditionState};
pub use criterion::{Criterion, CriterionId};
pub use evaluator::compute_condition;
pub use events::{ConditionEvent, ConditionPayload, CriterionSnapshot};
pub use stream::ConditionStream;
