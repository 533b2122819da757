//! Telemetry provider contract.
//!
//! Providers deliver live data through a sink callback and serve historical
//! data on request. Connection management and retries are the provider's
//! business; the engine only subscribes and unsubscribes.

use std::sync::Arc;

use crate::error::EngineResult;
use crate::objects::DomainObject;
use crate::subscription::SubscriptionHandle;
use crate::value::Datum;

use super::metadata::TelemetryMetadata;

/// Callback receiving live telemetry.
pub type TelemetrySink = Arc<dyn Fn(&Datum) + Send + Sync>;

/// Source of telemetry for domain objects.
pub trait TelemetryProvider: Send + Sync {
    /// Whether this provider serves telemetry for the object.
    fn supports(&self, object: &DomainObject) -> bool;

    /// Field metadata for the object.
    fn metadata(&self, object: &DomainObject) -> EngineResult<Option<TelemetryMetadata>> {
        Ok(object.telemetry.clone())
    }

    /// Subscribe to live telemetry.
    fn subscribe(&self, object: &DomainObject, sink: TelemetrySink) -> EngineResult<Box<dyn SubscriptionHandle>>;

    /// Historical telemetry, oldest first.
    fn request(&self, object: &DomainObject) -> EngineResult<Vec<Datum>>;
}
