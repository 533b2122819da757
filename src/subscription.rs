//! Cancellation handles shared by telemetry subscriptions and object observers.

/// A live registration with a provider.
///
/// `unsubscribe` is synchronous and idempotent: once it returns, the provider
/// no longer invokes the callback, and calling it again does nothing.
pub trait SubscriptionHandle: Send {
    /// Stops delivery.
    fn unsubscribe(&mut self);

    /// Returns true until `unsubscribe` has been called.
    fn is_active(&self) -> bool;
}

/// Handle that runs a closure on the first `unsubscribe` (or on drop).
pub struct CallbackHandle {
    on_unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl CallbackHandle {
    /// Wraps the teardown closure.
    #[must_use]
    pub fn new(on_unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            on_unsubscribe: Some(Box::new(on_unsubscribe)),
        }
    }
}

impl SubscriptionHandle for CallbackHandle {
    fn unsubscribe(&mut self) {
        if let Some(teardown) = self.on_unsubscribe.take() {
            teardown();
        }
    }

    fn is_active(&self) -> bool {
        self.on_unsubscribe.is_some()
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackHandle")
            .field("active", &self.is_active())
            .finish()
    }
}
