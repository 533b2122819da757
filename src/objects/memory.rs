//! In-memory object store.
//!
//! Thread-safe reference implementation of `ObjectProvider`, intended for
//! embedded usage and tests. Observers are notified synchronously from
//! `update`, outside the store's locks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use tracing::debug;

use crate::error::{EngineError, EngineResult, ExecutionError};
use crate::identifier::Identifier;
use crate::subscription::{CallbackHandle, SubscriptionHandle};

use super::domain::DomainObject;
use super::traits::{ObjectObserver, ObjectProvider};

fn lock_err(context: &'static str) -> EngineError {
    EngineError::internal(format!("poisoned lock: {context}"))
}

#[derive(Default)]
struct Inner {
    objects: RwLock<HashMap<Identifier, DomainObject>>,
    observers: Mutex<HashMap<Identifier, Vec<(u64, ObjectObserver)>>>,
    next_token: AtomicU64,
}

/// In-memory `ObjectProvider`.
#[derive(Clone, Default)]
pub struct InMemoryObjects {
    inner: Arc<Inner>,
}

impl InMemoryObjects {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an object without notifying observers.
    pub fn insert(&self, object: DomainObject) -> EngineResult<()> {
        let mut objects = self.inner.objects.write().map_err(|_| lock_err("objects"))?;
        objects.insert(object.identifier.clone(), object);
        Ok(())
    }

    /// Store a new state of an object and notify its observers.
    ///
    /// Returns the number of observers notified.
    pub fn update(&self, object: DomainObject) -> EngineResult<usize> {
        self.insert(object.clone())?;

        let observers: Vec<ObjectObserver> = {
            let observers = self.inner.observers.lock().map_err(|_| lock_err("observers"))?;
            observers
                .get(&object.identifier)
                .map(|list| list.iter().map(|(_, o)| Arc::clone(o)).collect())
                .unwrap_or_default()
        };

        debug!(object = %object.identifier, observers = observers.len(), "object updated");
        for observer in &observers {
            observer(&object);
        }
        Ok(observers.len())
    }

    /// Remove an object. Observers stay registered but receive nothing further.
    pub fn remove(&self, id: &Identifier) -> EngineResult<Option<DomainObject>> {
        let mut objects = self.inner.objects.write().map_err(|_| lock_err("objects"))?;
        Ok(objects.remove(id))
    }

    /// Number of live observers of an object.
    #[must_use]
    pub fn observer_count(&self, id: &Identifier) -> usize {
        self.inner
            .observers
            .lock()
            .map(|observers| observers.get(id).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl ObjectProvider for InMemoryObjects {
    fn get(&self, id: &Identifier) -> EngineResult<Option<DomainObject>> {
        let objects = self.inner.objects.read().map_err(|_| lock_err("objects"))?;
        Ok(objects.get(id).cloned())
    }

    fn observe(&self, id: &Identifier, observer: ObjectObserver) -> EngineResult<Box<dyn SubscriptionHandle>> {
        if self.get(id)?.is_none() {
            return Err(ExecutionError::ObjectNotFound { id: id.to_key_string() }.into());
        }

        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        {
            let mut observers = self.inner.observers.lock().map_err(|_| lock_err("observers"))?;
            observers.entry(id.clone()).or_default().push((token, observer));
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let id = id.clone();
        Ok(Box::new(CallbackHandle::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let Ok(mut observers) = inner.observers.lock() else {
                return;
            };
            if let Some(list) = observers.get_mut(&id) {
                list.retain(|(t, _)| *t != token);
                if list.is_empty() {
                    observers.remove(&id);
                }
            };
        })))
    }
}

impl std::fmt::Debug for InMemoryObjects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.inner.objects.read().map(|o| o.len()).unwrap_or(0);
        f.debug_struct("InMemoryObjects").field("objects", &count).finish()
    }
}
