//! Messages into a condition and events out of it.
//!
//! Inbound traffic (criterion results, criterion updates, observed object
//! changes) is queued on a bounded channel owned by the condition and applied
//! by `Condition::process_events`. Producers never block.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{CriterionConfiguration, Trigger};
use crate::identifier::Identifier;
use crate::objects::DomainObject;

use super::criterion::CriterionId;

#[derive(Debug, Clone)]
pub(crate) enum ConditionMsg {
    CriterionResult { id: CriterionId, epoch: u64, result: bool },
    CriterionUpdated { id: CriterionId },
    ObjectChanged(Box<DomainObject>),
}

/// Producer side of a condition's inbound queue.
#[derive(Debug, Clone)]
pub(crate) struct Outbox {
    condition: Identifier,
    tx: Sender<ConditionMsg>,
    dropped: Arc<AtomicU64>,
}

impl Outbox {
    pub(crate) fn new(condition: Identifier, tx: Sender<ConditionMsg>) -> Self {
        Self {
            condition,
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub(crate) fn send(&self, msg: ConditionMsg) {
        match self.tx.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(condition = %self.condition, "condition queue full; message dropped");
            }
            // The condition is gone.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// State of one criterion as reported in `conditionUpdated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionSnapshot {
    pub id: CriterionId,
    #[serde(flatten)]
    pub configuration: CriterionConfiguration,
    /// Whether the telemetry reference resolved and a subscription is live.
    pub subscribed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<bool>,
}

/// Event payloads.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConditionPayload {
    /// The trigger or a criterion changed.
    ConditionUpdated {
        trigger: Trigger,
        criteria: Vec<CriterionSnapshot>,
    },

    /// The aggregate result was recomputed.
    ConditionResultUpdated {
        result: bool,
    },
}

/// An event emitted by a condition.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionEvent {
    pub condition: Identifier,
    pub timestamp: DateTime<Utc>,
    pub payload: ConditionPayload,
}

impl ConditionEvent {
    #[must_use]
    pub fn new(condition: Identifier, payload: ConditionPayload) -> Self {
        Self {
            condition,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// The aggregate result, for `conditionResultUpdated` events.
    #[must_use]
    pub const fn result(&self) -> Option<bool> {
        match self.payload {
            ConditionPayload::ConditionResultUpdated { result } => Some(result),
            ConditionPayload::ConditionUpdated { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_result(&self) -> bool {
        matches!(self.payload, ConditionPayload::ConditionResultUpdated { .. })
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::bounded;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_outbox_counts_drops_when_full() {
        let (tx, rx) = bounded(1);
        let outbox = Outbox::new(Identifier::from_key("c"), tx);

        outbox.send(ConditionMsg::CriterionUpdated { id: CriterionId::new(1) });
        outbox.send(ConditionMsg::CriterionUpdated { id: CriterionId::new(2) });

        assert_eq!(outbox.dropped(), 1);
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_outbox_ignores_disconnected_condition() {
        let (tx, rx) = bounded(1);
        drop(rx);
        let outbox = Outbox::new(Identifier::from_key("c"), tx);
        outbox.send(ConditionMsg::CriterionResult {
            id: CriterionId::new(1),
            epoch: 1,
            result: true,
        });
        assert_eq!(outbox.dropped(), 0);
    }

    #[test]
    fn test_event_wire_shape() {
        let event = ConditionEvent::new(
            Identifier::new("ns", "c"),
            ConditionPayload::ConditionResultUpdated { result: true },
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["payload"], json!({"type": "conditionResultUpdated", "result": true}));
        assert_eq!(event.result(), Some(true));
        assert!(event.is_result());

        let updated = ConditionPayload::ConditionUpdated {
            trigger: Trigger::Any,
            criteria: vec![CriterionSnapshot {
                id: CriterionId::new(3),
                configuration: CriterionConfiguration::new("isDefined", vec![], "sin", "sine"),
                subscribed: false,
                result: None,
            }],
        };
        let value = serde_json::to_value(&updated).unwrap();
        assert_eq!(value["type"], json!("conditionUpdated"));
        assert_eq!(value["trigger"], json!("any"));
        assert_eq!(value["criteria"][0]["metaDataKey"], json!("sin"));
        assert_eq!(value["criteria"][0]["id"], json!(3));
    }
}
