use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::error::{EngineResult, ExecutionError};
use crate::identifier::Identifier;

use super::events::ConditionEvent;

/// A subscriber stream of condition events.
///
/// Dropping the stream detaches it; the condition prunes it on its next emit.
/// The stream disconnects once the condition is destroyed.
#[derive(Debug)]
pub struct ConditionStream {
    condition: Identifier,
    rx: Receiver<ConditionEvent>,
}

impl ConditionStream {
    pub(crate) fn new(condition: Identifier, rx: Receiver<ConditionEvent>) -> Self {
        Self { condition, rx }
    }

    /// The condition this stream observes.
    #[must_use]
    pub const fn condition(&self) -> &Identifier {
        &self.condition
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> EngineResult<ConditionEvent> {
        self.rx.recv().map_err(|_| {
            ExecutionError::Disconnected {
                path: "condition_stream".to_string(),
            }
            .into()
        })
    }

    /// Receive the next event with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> EngineResult<ConditionEvent> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => ExecutionError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }
            .into(),
            RecvTimeoutError::Disconnected => ExecutionError::Disconnected {
                path: "condition_stream".to_string(),
            }
            .into(),
        })
    }

    /// Next event if one is queued.
    #[must_use]
    pub fn try_recv(&self) -> Option<ConditionEvent> {
        self.rx.try_recv().ok()
    }

    /// All queued events, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<ConditionEvent> {
        self.rx.try_iter().collect()
    }

    /// True once the condition has been destroyed and the queue is empty.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.rx.is_empty() && matches!(self.rx.try_recv(), Err(crossbeam_channel::TryRecvError::Disconnected))
    }
}
