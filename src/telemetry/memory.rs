//! In-memory telemetry provider.
//!
//! Serves any object that carries telemetry metadata. `publish` records the
//! datum as history and delivers it synchronously to live subscribers.
//! History is kept per object up to a fixed number of datums; older ones are
//! evicted first.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::trace;

use crate::error::{EngineError, EngineResult};
use crate::identifier::Identifier;
use crate::objects::DomainObject;
use crate::subscription::{CallbackHandle, SubscriptionHandle};
use crate::value::Datum;

use super::traits::{TelemetryProvider, TelemetrySink};

fn lock_err(context: &'static str) -> EngineError {
    EngineError::internal(format!("poisoned lock: {context}"))
}

/// Datums retained per object by [`InMemoryTelemetry::new`].
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

struct Inner {
    subscribers: Mutex<HashMap<Identifier, Vec<(u64, TelemetrySink)>>>,
    history: Mutex<HashMap<Identifier, VecDeque<Datum>>>,
    history_limit: usize,
    next_token: AtomicU64,
}

/// In-memory `TelemetryProvider`.
#[derive(Clone)]
pub struct InMemoryTelemetry {
    inner: Arc<Inner>,
}

impl Default for InMemoryTelemetry {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl InMemoryTelemetry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `limit` datums of history per object. Zero disables history.
    #[must_use]
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: Mutex::new(HashMap::new()),
                history: Mutex::new(HashMap::new()),
                history_limit: limit,
                next_token: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn history_limit(&self) -> usize {
        self.inner.history_limit
    }

    /// Record a datum and deliver it to subscribers of `id`.
    ///
    /// Returns the number of subscribers the datum was delivered to.
    pub fn publish(&self, id: &Identifier, datum: Datum) -> EngineResult<usize> {
        if self.inner.history_limit > 0 {
            let mut history = self.inner.history.lock().map_err(|_| lock_err("history"))?;
            let entries = history.entry(id.clone()).or_default();
            if entries.len() == self.inner.history_limit {
                entries.pop_front();
            }
            entries.push_back(datum.clone());
        }

        let sinks: Vec<TelemetrySink> = {
            let subscribers = self.inner.subscribers.lock().map_err(|_| lock_err("subscribers"))?;
            subscribers
                .get(id)
                .map(|list| list.iter().map(|(_, s)| Arc::clone(s)).collect())
                .unwrap_or_default()
        };

        trace!(object = %id, subscribers = sinks.len(), "publishing datum");
        for sink in &sinks {
            sink(&datum);
        }
        Ok(sinks.len())
    }

    /// Number of live subscriptions for an object.
    #[must_use]
    pub fn subscriber_count(&self, id: &Identifier) -> usize {
        self.inner
            .subscribers
            .lock()
            .map(|s| s.get(id).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl TelemetryProvider for InMemoryTelemetry {
    fn supports(&self, object: &DomainObject) -> bool {
        object.telemetry.is_some()
    }

    fn subscribe(&self, object: &DomainObject, sink: TelemetrySink) -> EngineResult<Box<dyn SubscriptionHandle>> {
        let id = object.identifier.clone();
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        {
            let mut subscribers = self.inner.subscribers.lock().map_err(|_| lock_err("subscribers"))?;
            subscribers.entry(id.clone()).or_default().push((token, sink));
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Ok(Box::new(CallbackHandle::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let Ok(mut subscribers) = inner.subscribers.lock() else {
                return;
            };
            if let Some(list) = subscribers.get_mut(&id) {
                list.retain(|(t, _)| *t != token);
                if list.is_empty() {
                    subscribers.remove(&id);
                }
            };
        })))
    }

    fn request(&self, object: &DomainObject) -> EngineResult<Vec<Datum>> {
        let history = self.inner.history.lock().map_err(|_| lock_err("history"))?;
        Ok(history
            .get(&object.identifier)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default())
    }
}

impl std::fmt::Debug for InMemoryTelemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTelemetry").finish_non_exhaustive()
    }
}
