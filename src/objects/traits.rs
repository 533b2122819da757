//! Object provider contract.
//!
//! The engine never persists objects. It reads them (to resolve telemetry
//! references and backing condition objects) and observes them for changes.

use std::sync::Arc;

use crate::error::EngineResult;
use crate::identifier::Identifier;
use crate::subscription::SubscriptionHandle;

use super::domain::DomainObject;

/// Callback invoked with the new state of an observed object.
pub type ObjectObserver = Arc<dyn Fn(&DomainObject) + Send + Sync>;

/// Source of domain objects.
pub trait ObjectProvider: Send + Sync {
    /// Get an object by identifier.
    fn get(&self, id: &Identifier) -> EngineResult<Option<DomainObject>>;

    /// Observe an object for mutations.
    fn observe(&self, id: &Identifier, observer: ObjectObserver) -> EngineResult<Box<dyn SubscriptionHandle>>;
}
