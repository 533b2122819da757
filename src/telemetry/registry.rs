//! Provider registry: routes each object to the first provider that supports it.

use std::sync::Arc;

use tracing::debug;

use crate::error::{EngineResult, ExecutionError};
use crate::objects::DomainObject;
use crate::subscription::SubscriptionHandle;
use crate::value::Datum;

use super::metadata::TelemetryMetadata;
use super::traits::{TelemetryProvider, TelemetrySink};

/// Ordered collection of telemetry providers.
#[derive(Clone, Default)]
pub struct TelemetryRegistry {
    providers: Vec<Arc<dyn TelemetryProvider>>,
}

impl TelemetryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a provider. Earlier providers win.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn TelemetryProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn find(&self, object: &DomainObject) -> EngineResult<&Arc<dyn TelemetryProvider>> {
        self.providers
            .iter()
            .find(|p| p.supports(object))
            .ok_or_else(|| {
                debug!(object = %object.identifier, kind = %object.kind, "no telemetry provider");
                ExecutionError::Unsupported {
                    id: object.identifier.to_key_string(),
                }
                .into()
            })
    }
}

impl TelemetryProvider for TelemetryRegistry {
    fn supports(&self, object: &DomainObject) -> bool {
        self.providers.iter().any(|p| p.supports(object))
    }

    fn metadata(&self, object: &DomainObject) -> EngineResult<Option<TelemetryMetadata>> {
        self.find(object)?.metadata(object)
    }

    fn subscribe(&self, object: &DomainObject, sink: TelemetrySink) -> EngineResult<Box<dyn SubscriptionHandle>> {
        self.find(object)?.subscribe(object, sink)
    }

    fn request(&self, object: &DomainObject) -> EngineResult<Vec<Datum>> {
        self.find(object)?.request(object)
    }
}

impl std::fmt::Debug for TelemetryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryRegistry")
            .field("providers", &self.providers.len())
            .finish()
    }
}
