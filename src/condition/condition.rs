use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, trace, warn};

use crate::config::{ConditionConfiguration, ConditionDefinition, CriterionConfiguration, EngineConfig, Trigger};
use crate::error::{EngineResult, ExecutionError};
use crate::identifier::Identifier;
use crate::objects::{DomainObject, ObjectProvider};
use crate::subscription::SubscriptionHandle;
use crate::telemetry::TelemetryProvider;

use super::criterion::{Criterion, CriterionId};
use super::evaluator::compute_condition;
use super::events::{ConditionEvent, ConditionMsg, ConditionPayload, Outbox};
use super::stream::ConditionStream;

/// Collaborators a condition resolves objects and telemetry through.
#[derive(Clone)]
pub struct ConditionContext {
    /// Resolves criterion references and the backing condition object.
    pub objects: Arc<dyn ObjectProvider>,
    /// Usually a `TelemetryRegistry`.
    pub telemetry: Arc<dyn TelemetryProvider>,
}

impl ConditionContext {
    #[must_use]
    pub fn new(objects: Arc<dyn ObjectProvider>, telemetry: Arc<dyn TelemetryProvider>) -> Self {
        Self { objects, telemetry }
    }
}

impl fmt::Debug for ConditionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionContext").finish_non_exhaustive()
    }
}

/// Lifecycle of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionState {
    /// Built, backing object not yet observed.
    Uninitialized,
    /// Observing the backing object for configuration changes.
    Observing,
    /// Terminal.
    Destroyed,
}

/// A set of criteria combined under a trigger into one boolean.
///
/// The condition owns its criteria. Criterion results and observed
/// configuration changes are queued and applied by [`Condition::process_events`];
/// every structural change or result is followed by a re-evaluation and a
/// `conditionResultUpdated` event on each [`ConditionStream`].
pub struct Condition {
    id: Identifier,
    trigger: Trigger,
    criteria: Vec<Criterion>,
    results: HashMap<CriterionId, bool>,
    result: bool,
    state: ConditionState,
    subscribed: bool,
    next_criterion: u64,
    context: ConditionContext,
    config: EngineConfig,
    outbox: Outbox,
    inbox: Receiver<ConditionMsg>,
    observer: Option<Box<dyn SubscriptionHandle>>,
    streams: Vec<Sender<ConditionEvent>>,
    dropped_events: u64,
}

impl Condition {
    /// Builds a condition and its criteria. Nothing is subscribed yet.
    #[must_use]
    pub fn new(configuration: ConditionConfiguration, context: ConditionContext, config: EngineConfig) -> Self {
        let (id, definition) = configuration.into_parts();
        let (tx, inbox) = bounded(config.message_queue_capacity.max(1));
        let outbox = Outbox::new(id.clone(), tx);

        let mut condition = Self {
            id,
            trigger: definition.trigger,
            criteria: Vec::with_capacity(definition.criteria.len()),
            results: HashMap::new(),
            result: false,
            state: ConditionState::Uninitialized,
            subscribed: false,
            next_criterion: 1,
            context,
            config,
            outbox,
            inbox,
            observer: None,
            streams: Vec::new(),
            dropped_events: 0,
        };
        for criterion in definition.criteria {
            condition.push_criterion(criterion);
        }
        condition.evaluate();

        debug!(condition = %condition.id, trigger = %condition.trigger, criteria = condition.criteria.len(), "condition created");
        condition
    }

    #[must_use]
    pub const fn id(&self) -> &Identifier {
        &self.id
    }

    #[must_use]
    pub const fn trigger(&self) -> Trigger {
        self.trigger
    }

    /// The current aggregate result.
    #[must_use]
    pub const fn result(&self) -> bool {
        self.result
    }

    #[must_use]
    pub const fn state(&self) -> ConditionState {
        self.state
    }

    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Criteria in order.
    #[must_use]
    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    #[must_use]
    pub fn criterion(&self, id: CriterionId) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.id() == id)
    }

    /// Latest result per criterion. Criteria without a result are absent.
    #[must_use]
    pub const fn criteria_results(&self) -> &HashMap<CriterionId, bool> {
        &self.results
    }

    /// Inbound messages dropped because the queue was full.
    #[must_use]
    pub fn dropped_messages(&self) -> u64 {
        self.outbox.dropped()
    }

    /// Outbound events dropped because a stream was full.
    #[must_use]
    pub const fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    /// Opens a new event stream. A destroyed condition yields a stream that is
    /// already disconnected.
    pub fn events(&mut self) -> ConditionStream {
        let (tx, rx) = bounded(self.config.stream_capacity.max(1));
        if self.state == ConditionState::Destroyed {
            drop(tx);
        } else {
            self.streams.push(tx);
        }
        ConditionStream::new(self.id.clone(), rx)
    }

    /// Attaches the observer that feeds configuration changes of the backing
    /// object into the queue.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::ObjectNotFound` if the backing object does not
    /// exist, or the provider's error if observation fails. The state is left
    /// unchanged in both cases.
    pub fn observe_for_changes(&mut self) -> EngineResult<()> {
        if self.state != ConditionState::Uninitialized {
            return Ok(());
        }

        if self.context.objects.get(&self.id)?.is_none() {
            return Err(ExecutionError::ObjectNotFound {
                id: self.id.to_key_string(),
            }
            .into());
        }

        let outbox = self.outbox.clone();
        let handle = self.context.objects.observe(
            &self.id,
            Arc::new(move |object: &DomainObject| {
                outbox.send(ConditionMsg::ObjectChanged(Box::new(object.clone())));
            }),
        )?;

        self.observer = Some(handle);
        self.state = ConditionState::Observing;
        debug!(condition = %self.id, "observing condition object");
        Ok(())
    }

    /// Applies every queued message in arrival order. Returns how many were applied.
    pub fn process_events(&mut self) -> usize {
        if self.state == ConditionState::Destroyed {
            self.inbox.try_iter().for_each(drop);
            return 0;
        }

        let mut applied = 0;
        while let Ok(msg) = self.inbox.try_recv() {
            self.apply(msg);
            applied += 1;
            if self.state == ConditionState::Destroyed {
                break;
            }
        }
        applied
    }

    /// Applies a full definition: trigger first, then all criteria are replaced.
    pub fn update(&mut self, definition: ConditionDefinition) {
        if self.is_destroyed() {
            return;
        }
        self.update_trigger(definition.trigger);
        self.update_criteria(definition.criteria);
    }

    /// Destroys every criterion and builds the given ones in its place.
    pub fn update_criteria(&mut self, criteria: Vec<CriterionConfiguration>) {
        if self.is_destroyed() {
            return;
        }
        self.destroy_criteria();
        for criterion in criteria {
            self.push_criterion(criterion);
        }
        debug!(condition = %self.id, criteria = self.criteria.len(), "criteria replaced");
        self.emit_condition_updated();
        self.handle_condition_updated();
    }

    /// Appends a criterion and returns its id. `None` once destroyed.
    pub fn add_criterion(&mut self, configuration: CriterionConfiguration) -> Option<CriterionId> {
        if self.is_destroyed() {
            return None;
        }
        let id = self.push_criterion(configuration);
        debug!(condition = %self.id, criterion = %id, "criterion added");
        self.emit_condition_updated();
        self.handle_condition_updated();
        Some(id)
    }

    /// Replaces a criterion in place. The replacement gets a new id, which is
    /// returned; `None` if `id` is unknown.
    pub fn update_criterion(&mut self, id: CriterionId, configuration: CriterionConfiguration) -> Option<CriterionId> {
        if self.is_destroyed() {
            return None;
        }
        let index = self.criteria.iter().position(|c| c.id() == id)?;

        let mut replacement = self.build_criterion(configuration);
        if self.subscribed {
            replacement.subscribe();
        }
        let new_id = replacement.id();

        let mut old = std::mem::replace(&mut self.criteria[index], replacement);
        old.destroy();
        self.results.remove(&id);

        debug!(condition = %self.id, old = %id, new = %new_id, "criterion replaced");
        self.emit_condition_updated();
        self.handle_condition_updated();
        Some(new_id)
    }

    /// Destroys and removes a criterion. Unknown ids are a no-op returning `false`.
    pub fn remove_criterion(&mut self, id: CriterionId) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let Some(index) = self.criteria.iter().position(|c| c.id() == id) else {
            return false;
        };

        let mut removed = self.criteria.remove(index);
        removed.destroy();
        self.results.remove(&id);

        debug!(condition = %self.id, criterion = %id, "criterion removed");
        self.emit_condition_updated();
        self.handle_condition_updated();
        true
    }

    /// Changes the trigger. Setting the current trigger again is a no-op.
    pub fn update_trigger(&mut self, trigger: Trigger) {
        if self.is_destroyed() || self.trigger == trigger {
            return;
        }
        debug!(condition = %self.id, from = %self.trigger, to = %trigger, "trigger changed");
        self.trigger = trigger;
        self.emit_condition_updated();
        self.handle_condition_updated();
    }

    /// Subscribes every criterion to its telemetry. Criteria added later are
    /// subscribed as they are built.
    pub fn subscribe(&mut self) {
        if self.is_destroyed() {
            return;
        }
        self.subscribed = true;
        for criterion in &mut self.criteria {
            criterion.subscribe();
        }
    }

    /// Stops telemetry delivery to every criterion. Idempotent.
    pub fn unsubscribe(&mut self) {
        self.subscribed = false;
        for criterion in &mut self.criteria {
            criterion.unsubscribe();
        }
    }

    /// Recomputes the aggregate result from the current criteria and results.
    pub fn evaluate(&mut self) -> bool {
        let ids: Vec<CriterionId> = self.criteria.iter().map(Criterion::id).collect();
        self.result = compute_condition(&ids, &self.results, self.trigger.requires_all());
        self.result
    }

    /// Detaches the change observer and destroys every criterion, last first.
    /// Streams disconnect. Idempotent; the condition is inert afterwards.
    pub fn destroy(&mut self) {
        if self.is_destroyed() {
            return;
        }
        if let Some(mut observer) = self.observer.take() {
            observer.unsubscribe();
        }
        self.subscribed = false;
        self.destroy_criteria();
        self.streams.clear();
        self.state = ConditionState::Destroyed;
        self.inbox.try_iter().for_each(drop);
        debug!(condition = %self.id, "condition destroyed");
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.state == ConditionState::Destroyed
    }

    fn apply(&mut self, msg: ConditionMsg) {
        match msg {
            ConditionMsg::CriterionResult { id, epoch, result } => {
                let current = self
                    .criterion(id)
                    .is_some_and(|c| c.is_subscribed() && c.epoch() == epoch);
                if !current {
                    trace!(condition = %self.id, criterion = %id, "ignoring result from detached criterion");
                    return;
                }
                self.results.insert(id, result);
                self.handle_condition_updated();
            }
            ConditionMsg::CriterionUpdated { id } => {
                if self.criterion(id).is_some() {
                    self.emit_condition_updated();
                }
            }
            ConditionMsg::ObjectChanged(object) => match ConditionDefinition::from_domain_object(&object) {
                Ok(definition) => {
                    debug!(condition = %self.id, "condition object changed");
                    self.update(definition);
                }
                Err(e) => {
                    warn!(condition = %self.id, error = %e, "ignoring malformed condition configuration");
                }
            },
        }
    }

    fn build_criterion(&mut self, configuration: CriterionConfiguration) -> Criterion {
        let id = CriterionId::new(self.next_criterion);
        self.next_criterion += 1;
        Criterion::new(
            id,
            configuration,
            Arc::clone(&self.context.objects),
            Arc::clone(&self.context.telemetry),
            self.outbox.clone(),
        )
    }

    fn push_criterion(&mut self, configuration: CriterionConfiguration) -> CriterionId {
        let mut criterion = self.build_criterion(configuration);
        if self.subscribed {
            criterion.subscribe();
        }
        let id = criterion.id();
        self.criteria.push(criterion);
        id
    }

    fn destroy_criteria(&mut self) {
        while let Some(mut criterion) = self.criteria.pop() {
            criterion.destroy();
        }
        self.results.clear();
    }

    fn handle_condition_updated(&mut self) {
        let result = self.evaluate();
        trace!(condition = %self.id, result, "condition evaluated");
        self.emit(ConditionPayload::ConditionResultUpdated { result });
    }

    fn emit_condition_updated(&mut self) {
        let criteria = self.criteria.iter().map(Criterion::snapshot).collect();
        self.emit(ConditionPayload::ConditionUpdated {
            trigger: self.trigger,
            criteria,
        });
    }

    fn emit(&mut self, payload: ConditionPayload) {
        if self.streams.is_empty() {
            return;
        }
        let event = ConditionEvent::new(self.id.clone(), payload);
        let mut dropped = 0;
        self.streams.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                dropped += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        if dropped > 0 {
            self.dropped_events += dropped;
            warn!(condition = %self.id, dropped, "condition stream full; event dropped");
        }
    }
}

impl Drop for Condition {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("id", &self.id)
            .field("trigger", &self.trigger)
            .field("criteria", &self.criteria)
            .field("result", &self.result)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::objects::InMemoryObjects;
    use crate::telemetry::{InMemoryTelemetry, TelemetryMetadata, ValueMetadata};
    use crate::value::{Datum, Value};

    struct Fixture {
        objects: InMemoryObjects,
        telemetry: InMemoryTelemetry,
    }

    impl Fixture {
        fn new() -> Self {
            let objects = InMemoryObjects::new();
            for key in ["a", "b"] {
                objects
                    .insert(
                        DomainObject::new(Identifier::from_key(key), "generator")
                            .with_telemetry(TelemetryMetadata::new(vec![ValueMetadata::new("value").range(1)])),
                    )
                    .unwrap();
            }
            Self {
                objects,
                telemetry: InMemoryTelemetry::new(),
            }
        }

        fn context(&self) -> ConditionContext {
            ConditionContext::new(Arc::new(self.objects.clone()), Arc::new(self.telemetry.clone()))
        }

        fn condition(&self, trigger: Trigger, keys: &[&str]) -> Condition {
            let mut cfg = ConditionConfiguration::new(Identifier::from_key("cond"), trigger);
            for key in keys {
                cfg = cfg.with_criterion(is_true(key));
            }
            Condition::new(cfg, self.context(), EngineConfig::default())
        }

        fn publish(&self, key: &str, value: bool) {
            self.telemetry
                .publish(&Identifier::from_key(key), Datum::new().with("value", value))
                .unwrap();
        }
    }

    fn is_true(key: &str) -> CriterionConfiguration {
        CriterionConfiguration::new("isTrue", vec![], "value", key)
    }

    fn results(stream: &ConditionStream) -> Vec<bool> {
        stream.drain().iter().filter_map(ConditionEvent::result).collect()
    }

    #[test]
    fn test_new_condition_evaluates_false() {
        let fx = Fixture::new();
        let condition = fx.condition(Trigger::Any, &["a"]);
        assert!(!condition.result());
        assert_eq!(condition.state(), ConditionState::Uninitialized);
        assert_eq!(condition.criteria().len(), 1);
    }

    #[test]
    fn test_criterion_results_drive_aggregate() {
        let fx = Fixture::new();
        let mut condition = fx.condition(Trigger::All, &["a", "b"]);
        let stream = condition.events();
        condition.subscribe();

        fx.publish("a", true);
        condition.process_events();
        assert!(!condition.result());

        fx.publish("b", true);
        condition.process_events();
        assert!(condition.result());
        assert_eq!(results(&stream), vec![false, true]);
    }

    #[test]
    fn test_update_criterion_keeps_position_and_drops_stale_result() {
        let fx = Fixture::new();
        let mut condition = fx.condition(Trigger::Any, &["a", "b"]);
        condition.subscribe();
        fx.publish("a", true);
        condition.process_events();
        assert!(condition.result());

        let old = condition.criteria()[0].id();
        let new = condition.update_criterion(old, is_true("b")).unwrap();

        assert_ne!(old, new);
        assert_eq!(condition.criteria()[0].id(), new);
        assert!(!condition.criteria_results().contains_key(&old));
        assert!(!condition.result());
        assert!(condition.criteria()[0].is_subscribed());
    }

    #[test]
    fn test_remove_unknown_criterion_is_noop() {
        let fx = Fixture::new();
        let mut condition = fx.condition(Trigger::Any, &["a"]);
        let stream = condition.events();

        assert!(!condition.remove_criterion(CriterionId::new(99)));
        assert!(stream.drain().is_empty());
    }

    #[test]
    fn test_same_trigger_is_noop() {
        let fx = Fixture::new();
        let mut condition = fx.condition(Trigger::Any, &["a"]);
        let stream = condition.events();

        condition.update_trigger(Trigger::Any);
        assert!(stream.drain().is_empty());

        condition.update_trigger(Trigger::All);
        assert_eq!(condition.trigger(), Trigger::All);
        assert_eq!(results(&stream), vec![false]);
    }

    #[test]
    fn test_added_criteria_follow_subscription() {
        let fx = Fixture::new();
        let mut condition = fx.condition(Trigger::Any, &[]);
        condition.subscribe();

        let id = condition.add_criterion(is_true("a")).unwrap();
        assert!(condition.criterion(id).unwrap().is_subscribed());

        fx.publish("a", true);
        condition.process_events();
        assert!(condition.result());
    }

    #[test]
    fn test_result_queued_before_unsubscribe_is_dropped() {
        let fx = Fixture::new();
        let mut condition = fx.condition(Trigger::Any, &["a"]);
        condition.subscribe();

        fx.publish("a", true);
        condition.unsubscribe();
        condition.subscribe();
        condition.process_events();

        assert!(!condition.result());
        assert!(condition.criteria_results().is_empty());

        fx.publish("a", true);
        condition.process_events();
        assert!(condition.result());
    }

    #[test]
    fn test_unresolved_criterion_has_no_result() {
        let fx = Fixture::new();
        let mut condition = fx.condition(Trigger::Any, &["a", "missing"]);
        condition.subscribe();

        fx.publish("a", true);
        condition.process_events();
        assert!(condition.result());
        assert_eq!(condition.criteria_results().len(), 1);

        condition.update_trigger(Trigger::All);
        assert!(!condition.result());
    }

    #[test]
    fn test_observe_missing_object_leaves_state() {
        let fx = Fixture::new();
        let mut condition = fx.condition(Trigger::Any, &["a"]);
        let err = condition.observe_for_changes().unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(condition.state(), ConditionState::Uninitialized);
    }

    #[test]
    fn test_observed_change_replaces_criteria() {
        let fx = Fixture::new();
        let backing = DomainObject::new(Identifier::from_key("cond"), "conditionSet.condition")
            .with_configuration(json!({"trigger": "any", "criteria": []}));
        fx.objects.insert(backing.clone()).unwrap();

        let mut condition = fx.condition(Trigger::Any, &["a"]);
        condition.observe_for_changes().unwrap();
        assert_eq!(condition.state(), ConditionState::Observing);

        fx.objects
            .update(backing.clone().with_configuration(json!({
                "trigger": "all",
                "criteria": [
                    {"operation": "isTrue", "metaDataKey": "value", "key": "a"},
                    {"operation": "isTrue", "metaDataKey": "value", "key": "b"}
                ]
            })))
            .unwrap();
        condition.process_events();
        assert_eq!(condition.trigger(), Trigger::All);
        assert_eq!(condition.criteria().len(), 2);

        fx.objects
            .update(backing.with_configuration(json!({"trigger": 7})))
            .unwrap();
        condition.process_events();
        assert_eq!(condition.trigger(), Trigger::All);
        assert_eq!(condition.criteria().len(), 2);
    }

    #[test]
    fn test_destroy_is_terminal_and_idempotent() {
        let fx = Fixture::new();
        let mut condition = fx.condition(Trigger::Any, &["a"]);
        let stream = condition.events();
        condition.subscribe();

        fx.publish("a", true);
        condition.destroy();
        condition.destroy();

        assert_eq!(condition.process_events(), 0);
        assert!(condition.criteria().is_empty());
        assert_eq!(fx.telemetry.subscriber_count(&Identifier::from_key("a")), 0);
        assert!(condition.add_criterion(is_true("a")).is_none());
        assert!(stream.is_disconnected());
        assert!(condition.events().is_disconnected());
    }

    #[test]
    fn test_full_stream_counts_dropped_events() {
        let fx = Fixture::new();
        let mut cfg = ConditionConfiguration::new(Identifier::from_key("cond"), Trigger::Any);
        cfg = cfg.with_criterion(is_true("a"));
        let mut condition = Condition::new(
            cfg,
            fx.context(),
            EngineConfig {
                stream_capacity: 1,
                ..EngineConfig::default()
            },
        );
        let _stream = condition.events();

        condition.update_trigger(Trigger::All);
        assert!(condition.dropped_events() >= 1);
    }

    #[test]
    fn test_dropped_stream_is_pruned() {
        let fx = Fixture::new();
        let mut condition = fx.condition(Trigger::Any, &["a"]);
        drop(condition.events());
        condition.update_trigger(Trigger::All);
        assert_eq!(condition.dropped_events(), 0);
        assert!(condition.streams.is_empty());
    }

    #[test]
    fn test_misconfigured_criterion_reports_false() {
        let fx = Fixture::new();
        let mut cfg = ConditionConfiguration::new(Identifier::from_key("cond"), Trigger::Any);
        cfg = cfg.with_criterion(CriterionConfiguration::new("isSomething", vec![Value::Int(1)], "value", "a"));
        let mut condition = Condition::new(cfg, fx.context(), EngineConfig::default());
        condition.subscribe();

        fx.publish("a", true);
        condition.process_events();
        assert_eq!(condition.criteria_results().values().copied().collect::<Vec<_>>(), vec![false]);
        assert!(!condition.result());
    }
}
