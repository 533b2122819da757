//! A single telemetry predicate.
//!
//! A criterion reads one field of one telemetry object and tests it with its
//! predicate each time a datum arrives, reporting the boolean result to the
//! owning condition. Anything wrong with its configuration makes it report
//! `false` (bad operation or field) or nothing at all (unresolvable telemetry
//! object); it never fails the condition.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::CriterionConfiguration;
use crate::error::ValidationError;
use crate::identifier::Identifier;
use crate::objects::ObjectProvider;
use crate::operation::Predicate;
use crate::subscription::SubscriptionHandle;
use crate::telemetry::{TelemetryMetadata, TelemetryProvider, TelemetrySink};
use crate::value::Datum;

use super::events::{ConditionMsg, CriterionSnapshot, Outbox};

/// Identifier of a criterion within its condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CriterionId(u64);

impl CriterionId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CriterionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "criterion-{}", self.0)
    }
}

const RESULT_FALSE: u8 = 1;
const RESULT_TRUE: u8 = 2;

/// State shared with the telemetry callback.
///
/// `epoch` advances on every subscribe and unsubscribe; a callback only
/// reports while the epoch it was created under is current.
#[derive(Debug, Default)]
struct Shared {
    active: AtomicBool,
    epoch: AtomicU64,
    result: AtomicU8,
}

impl Shared {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.is_active() && self.epoch() == epoch
    }

    fn activate(&self) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        self.active.store(true, Ordering::Release);
        epoch
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    fn store_result(&self, result: bool) {
        let encoded = if result { RESULT_TRUE } else { RESULT_FALSE };
        self.result.store(encoded, Ordering::Release);
    }

    fn result(&self) -> Option<bool> {
        match self.result.load(Ordering::Acquire) {
            RESULT_TRUE => Some(true),
            RESULT_FALSE => Some(false),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Matcher {
    predicate: Option<Predicate>,
    field: Option<String>,
}

impl Matcher {
    fn evaluate(&self, datum: &Datum) -> bool {
        match (&self.predicate, &self.field) {
            (Some(predicate), Some(field)) => predicate.test(datum.get(field)),
            _ => false,
        }
    }
}

/// A telemetry predicate owned by a `Condition`.
pub struct Criterion {
    id: CriterionId,
    configuration: CriterionConfiguration,
    error: Option<ValidationError>,
    matcher: Arc<Matcher>,
    shared: Arc<Shared>,
    objects: Arc<dyn ObjectProvider>,
    telemetry: Arc<dyn TelemetryProvider>,
    outbox: Outbox,
    subscription: Option<Box<dyn SubscriptionHandle>>,
    resolved: Option<Identifier>,
    destroyed: bool,
}

impl Criterion {
    pub(crate) fn new(
        id: CriterionId,
        configuration: CriterionConfiguration,
        objects: Arc<dyn ObjectProvider>,
        telemetry: Arc<dyn TelemetryProvider>,
        outbox: Outbox,
    ) -> Self {
        let mut error = None;
        let predicate = match Predicate::compile(&configuration.operation, &configuration.input) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(criterion = %id, operation = %configuration.operation, error = %e, "criterion misconfigured; evaluating as false");
                error = Some(e);
                None
            }
        };

        let metadata_key = configuration.metadata_key.trim();
        let field = if metadata_key.is_empty() {
            warn!(criterion = %id, "criterion has no metadata key; evaluating as false");
            if error.is_none() {
                error = Some(ValidationError::MissingField {
                    field: "metaDataKey".to_string(),
                });
            }
            None
        } else {
            Some(metadata_key.to_string())
        };

        Self {
            id,
            configuration,
            error,
            matcher: Arc::new(Matcher { predicate, field }),
            shared: Arc::new(Shared::default()),
            objects,
            telemetry,
            outbox,
            subscription: None,
            resolved: None,
            destroyed: false,
        }
    }

    #[must_use]
    pub const fn id(&self) -> CriterionId {
        self.id
    }

    #[must_use]
    pub const fn configuration(&self) -> &CriterionConfiguration {
        &self.configuration
    }

    /// The first configuration problem found, if any.
    #[must_use]
    pub const fn configuration_error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }

    /// Latest result; `None` until the first datum arrives.
    #[must_use]
    pub fn result(&self) -> Option<bool> {
        self.shared.result()
    }

    /// True while a telemetry subscription is live.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some() && self.shared.is_active()
    }

    /// The telemetry object the criterion resolved to, once subscribed.
    #[must_use]
    pub const fn resolved_object(&self) -> Option<&Identifier> {
        self.resolved.as_ref()
    }

    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Tests a datum against the predicate. Misconfigured criteria yield `false`.
    #[must_use]
    pub fn evaluate(&self, datum: &Datum) -> bool {
        self.matcher.evaluate(datum)
    }

    /// Resolves the telemetry object and subscribes to it.
    ///
    /// Does nothing if already subscribed or destroyed. Resolution failures
    /// are logged and leave the criterion without a result.
    pub fn subscribe(&mut self) {
        if self.destroyed || self.subscription.is_some() {
            return;
        }

        let Some(object_id) = self.configuration.telemetry_object() else {
            warn!(criterion = %self.id, "criterion has no telemetry reference");
            return;
        };

        let object = match self.objects.get(&object_id) {
            Ok(Some(object)) => object,
            Ok(None) => {
                warn!(criterion = %self.id, object = %object_id, "telemetry object not found; criterion stays unresolved");
                return;
            }
            Err(e) => {
                warn!(criterion = %self.id, object = %object_id, error = %e, "telemetry object lookup failed");
                return;
            }
        };

        let metadata = match self.telemetry.metadata(&object) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(criterion = %self.id, object = %object_id, error = %e, "telemetry metadata unavailable");
                None
            }
        };

        self.matcher = Arc::new(Matcher {
            predicate: self.matcher.predicate.clone(),
            field: self.resolve_field(metadata.as_ref()),
        });

        let epoch = self.shared.activate();
        let sink = self.sink(epoch);
        match self.telemetry.subscribe(&object, sink) {
            Ok(handle) => {
                debug!(criterion = %self.id, object = %object_id, "criterion subscribed");
                self.subscription = Some(handle);
                self.resolved = Some(object_id);
                self.outbox.send(ConditionMsg::CriterionUpdated { id: self.id });
            }
            Err(e) => {
                self.shared.deactivate();
                warn!(criterion = %self.id, object = %object_id, error = %e, "telemetry subscription failed");
            }
        }
    }

    /// Stops telemetry delivery. Idempotent.
    pub fn unsubscribe(&mut self) {
        self.shared.deactivate();
        if let Some(mut handle) = self.subscription.take() {
            handle.unsubscribe();
            debug!(criterion = %self.id, "criterion unsubscribed");
        }
    }

    /// Unsubscribes and releases the telemetry reference. Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.unsubscribe();
        self.resolved = None;
        self.destroyed = true;
    }

    /// Subscription generation; results reported under an older one are stale.
    pub(crate) fn epoch(&self) -> u64 {
        self.shared.epoch()
    }

    pub(crate) fn snapshot(&self) -> CriterionSnapshot {
        CriterionSnapshot {
            id: self.id,
            configuration: self.configuration.clone(),
            subscribed: self.is_subscribed(),
            result: self.result(),
        }
    }

    /// Maps the configured metadata key to the datum field to read.
    fn resolve_field(&self, metadata: Option<&TelemetryMetadata>) -> Option<String> {
        let key = self.configuration.metadata_key.trim();
        if key.is_empty() {
            return None;
        }
        let Some(metadata) = metadata else {
            return Some(key.to_string());
        };

        if let Some(value) = metadata.value(key) {
            Some(value.source_key().to_string())
        } else {
            warn!(criterion = %self.id, metadata_key = key, "metadata key not produced by telemetry object; evaluating as false");
            None
        }
    }

    fn sink(&self, epoch: u64) -> TelemetrySink {
        let id = self.id;
        let matcher = Arc::clone(&self.matcher);
        let shared = Arc::clone(&self.shared);
        let outbox = self.outbox.clone();

        Arc::new(move |datum: &Datum| {
            if !shared.is_current(epoch) {
                return;
            }
            let result = matcher.evaluate(datum);
            shared.store_result(result);
            trace!(criterion = %id, result, "criterion evaluated");
            outbox.send(ConditionMsg::CriterionResult { id, epoch, result });
        })
    }
}

impl Drop for Criterion {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Criterion")
            .field("id", &self.id)
            .field("configuration", &self.configuration)
            .field("subscribed", &self.is_subscribed())
            .field("result", &self.result())
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::{bounded, Receiver};

    use super::*;
    use crate::objects::{DomainObject, InMemoryObjects};
    use crate::telemetry::{InMemoryTelemetry, ValueMetadata};
    use crate::value::Value;

    struct Fixture {
        objects: InMemoryObjects,
        telemetry: InMemoryTelemetry,
        outbox: Outbox,
        rx: Receiver<ConditionMsg>,
    }

    fn fixture() -> Fixture {
        let objects = InMemoryObjects::new();
        let sine = DomainObject::new(Identifier::new("taxonomy", "sine"), "generator").with_telemetry(
            TelemetryMetadata::new(vec![
                ValueMetadata::new("utc").domain(1),
                ValueMetadata::new("sin").with_source("sinValue").range(1),
            ]),
        );
        objects.insert(sine).unwrap();
        let (tx, rx) = bounded(64);
        Fixture {
            objects,
            telemetry: InMemoryTelemetry::new(),
            outbox: Outbox::new(Identifier::from_key("cond"), tx),
            rx,
        }
    }

    fn criterion(fx: &Fixture, id: u64, configuration: CriterionConfiguration) -> Criterion {
        Criterion::new(
            CriterionId::new(id),
            configuration,
            Arc::new(fx.objects.clone()),
            Arc::new(fx.telemetry.clone()),
            fx.outbox.clone(),
        )
    }

    fn greater_than_zero() -> CriterionConfiguration {
        CriterionConfiguration::new("greaterThan", vec![Value::Int(0)], "sin", "taxonomy:sine")
    }

    #[test]
    fn test_evaluate_before_resolution_reads_metadata_key() {
        let fx = fixture();
        let c = criterion(&fx, 1, greater_than_zero());
        assert!(c.evaluate(&Datum::new().with("sin", 0.5)));
        assert!(!c.evaluate(&Datum::new().with("sin", -0.5)));
        assert!(!c.evaluate(&Datum::new()));
        assert!(c.result().is_none());
    }

    #[test]
    fn test_subscribe_resolves_source_field_and_reports_results() {
        let fx = fixture();
        let mut c = criterion(&fx, 1, greater_than_zero());
        c.subscribe();
        assert!(c.is_subscribed());
        assert_eq!(c.resolved_object(), Some(&Identifier::new("taxonomy", "sine")));

        let sine = Identifier::new("taxonomy", "sine");
        fx.telemetry.publish(&sine, Datum::new().with("sinValue", 0.7)).unwrap();
        fx.telemetry.publish(&sine, Datum::new().with("sinValue", -0.7)).unwrap();

        let msgs: Vec<_> = fx.rx.try_iter().collect();
        assert!(matches!(msgs[0], ConditionMsg::CriterionUpdated { .. }));
        assert!(matches!(msgs[1], ConditionMsg::CriterionResult { result: true, .. }));
        assert!(matches!(msgs[2], ConditionMsg::CriterionResult { result: false, .. }));
        assert_eq!(c.result(), Some(false));
    }

    #[test]
    fn test_misconfigured_operation_evaluates_false() {
        let fx = fixture();
        let mut c = criterion(
            &fx,
            1,
            CriterionConfiguration::new("between", vec![Value::Int(1)], "sin", "taxonomy:sine"),
        );
        assert!(matches!(
            c.configuration_error(),
            Some(ValidationError::InvalidArity { .. })
        ));

        c.subscribe();
        fx.telemetry
            .publish(&Identifier::new("taxonomy", "sine"), Datum::new().with("sinValue", 2))
            .unwrap();

        assert_eq!(c.result(), Some(false));
    }

    #[test]
    fn test_unknown_metadata_key_evaluates_false() {
        let fx = fixture();
        let mut c = criterion(
            &fx,
            1,
            CriterionConfiguration::new("isDefined", vec![], "tan", "taxonomy:sine"),
        );
        c.subscribe();
        fx.telemetry
            .publish(&Identifier::new("taxonomy", "sine"), Datum::new().with("tan", 1))
            .unwrap();
        assert_eq!(c.result(), Some(false));
    }

    #[test]
    fn test_unresolvable_reference_stays_without_result() {
        let fx = fixture();
        let mut c = criterion(
            &fx,
            1,
            CriterionConfiguration::new("isDefined", vec![], "sin", "taxonomy:missing"),
        );
        c.subscribe();
        assert!(!c.is_subscribed());
        assert!(c.result().is_none());
        assert!(fx.rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_and_destroy_are_idempotent() {
        let fx = fixture();
        let sine = Identifier::new("taxonomy", "sine");
        let mut c = criterion(&fx, 1, greater_than_zero());

        c.unsubscribe();
        c.subscribe();
        assert_eq!(fx.telemetry.subscriber_count(&sine), 1);

        c.unsubscribe();
        c.unsubscribe();
        assert_eq!(fx.telemetry.subscriber_count(&sine), 0);

        c.destroy();
        c.destroy();
        assert!(c.is_destroyed());

        c.subscribe();
        assert!(!c.is_subscribed());
        assert_eq!(fx.telemetry.publish(&sine, Datum::new().with("sinValue", 1)).unwrap(), 0);
    }

    #[test]
    fn test_resubscribe_keeps_source_field() {
        let fx = fixture();
        let sine = Identifier::new("taxonomy", "sine");
        let mut c = criterion(&fx, 1, greater_than_zero());

        c.subscribe();
        fx.telemetry.publish(&sine, Datum::new().with("sinValue", -0.7)).unwrap();
        assert_eq!(c.result(), Some(false));

        c.unsubscribe();
        c.subscribe();
        fx.telemetry.publish(&sine, Datum::new().with("sinValue", 0.9)).unwrap();
        assert_eq!(c.result(), Some(true));
        assert!(c.evaluate(&Datum::new().with("sinValue", 0.1)));
    }

    #[test]
    fn test_results_carry_subscription_epoch() {
        let fx = fixture();
        let sine = Identifier::new("taxonomy", "sine");
        let mut c = criterion(&fx, 1, greater_than_zero());

        c.subscribe();
        let first = c.epoch();
        fx.telemetry.publish(&sine, Datum::new().with("sinValue", 0.5)).unwrap();
        c.unsubscribe();
        assert_ne!(c.epoch(), first);

        c.subscribe();
        let second = c.epoch();
        assert_ne!(second, first);
        fx.telemetry.publish(&sine, Datum::new().with("sinValue", 0.5)).unwrap();

        let epochs: Vec<u64> = fx
            .rx
            .try_iter()
            .filter_map(|msg| match msg {
                ConditionMsg::CriterionResult { epoch, .. } => Some(epoch),
                _ => None,
            })
            .collect();
        assert_eq!(epochs, vec![first, second]);
    }

    #[test]
    fn test_drop_releases_subscription() {
        let fx = fixture();
        let sine = Identifier::new("taxonomy", "sine");
        let mut c = criterion(&fx, 1, greater_than_zero());
        c.subscribe();
        drop(c);
        assert_eq!(fx.telemetry.subscriber_count(&sine), 0);
    }
}
