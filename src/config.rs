//! Configuration types.
//!
//! Condition and criterion configurations use the same JSON shape the
//! owning domain objects persist, e.g.
//!
//! ```json
//! {
//!   "identifier": {"namespace": "", "key": "cond-1"},
//!   "trigger": "all",
//!   "criteria": [
//!     {"operation": "greaterThan", "input": ["10"], "metaDataKey": "sin", "key": "taxonomy:sine"}
//!   ]
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identifier::Identifier;
use crate::objects::DomainObject;
use crate::value::Value;

/// How criterion results combine into the condition result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Every criterion must be met.
    #[default]
    All,
    /// At least one criterion must be met.
    Any,
}

impl Trigger {
    /// True for [`Trigger::All`].
    #[must_use]
    pub const fn requires_all(self) -> bool {
        matches!(self, Self::All)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Any => write!(f, "any"),
        }
    }
}

impl FromStr for Trigger {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "any" => Ok(Self::Any),
            _ => Err(ValidationError::UnknownTrigger {
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration of one criterion. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriterionConfiguration {
    /// Operation name, e.g. `greaterThan`.
    #[serde(default)]
    pub operation: String,
    /// Operation inputs.
    #[serde(default)]
    pub input: Vec<Value>,
    /// Telemetry metadata key the criterion reads.
    #[serde(default, rename = "metaDataKey", alias = "metadataKey")]
    pub metadata_key: String,
    /// Key-string of the telemetry object.
    #[serde(default)]
    pub key: String,
}

impl CriterionConfiguration {
    /// Creates a configuration.
    #[must_use]
    pub fn new(
        operation: impl Into<String>,
        input: Vec<Value>,
        metadata_key: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            input,
            metadata_key: metadata_key.into(),
            key: key.into(),
        }
    }

    /// The referenced telemetry object, if any.
    #[must_use]
    pub fn telemetry_object(&self) -> Option<Identifier> {
        let key = self.key.trim();
        (!key.is_empty()).then(|| Identifier::parse_key_string(key))
    }
}

/// Trigger and criteria, as kept in a condition object's `configuration`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionDefinition {
    #[serde(default)]
    pub trigger: Trigger,
    #[serde(default)]
    pub criteria: Vec<CriterionConfiguration>,
}

/// Everything needed to build a `Condition`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfiguration {
    /// Identifier of the backing condition object.
    pub identifier: Identifier,
    #[serde(default)]
    pub trigger: Trigger,
    #[serde(default)]
    pub criteria: Vec<CriterionConfiguration>,
}

impl ConditionConfiguration {
    /// Creates a configuration with no criteria.
    #[must_use]
    pub fn new(identifier: Identifier, trigger: Trigger) -> Self {
        Self {
            identifier,
            trigger,
            criteria: Vec::new(),
        }
    }

    /// Appends a criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: CriterionConfiguration) -> Self {
        self.criteria.push(criterion);
        self
    }

    /// Reads a configuration from a condition domain object.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the object has no configuration or it
    /// does not have the `{trigger, criteria}` shape.
    pub fn from_domain_object(object: &DomainObject) -> Result<Self, ValidationError> {
        let definition = ConditionDefinition::from_domain_object(object)?;
        Ok(Self {
            identifier: object.identifier.clone(),
            trigger: definition.trigger,
            criteria: definition.criteria,
        })
    }

    /// Splits off the identifier.
    #[must_use]
    pub fn into_parts(self) -> (Identifier, ConditionDefinition) {
        (
            self.identifier,
            ConditionDefinition {
                trigger: self.trigger,
                criteria: self.criteria,
            },
        )
    }
}

impl ConditionDefinition {
    /// Parses the `configuration` of a condition domain object.
    ///
    /// # Errors
    ///
    /// See [`ConditionConfiguration::from_domain_object`].
    pub fn from_domain_object(object: &DomainObject) -> Result<Self, ValidationError> {
        let raw = object
            .configuration
            .as_ref()
            .ok_or_else(|| ValidationError::MissingField {
                field: "configuration".to_string(),
            })?;

        serde_json::from_value(raw.clone()).map_err(|e| ValidationError::InvalidConfiguration {
            reason: format!("invalid condition configuration: {e}"),
        })
    }
}

/// Engine tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Max queued inbound messages per condition before producers start dropping.
    pub message_queue_capacity: usize,
    /// Per-stream outbound event buffer.
    pub stream_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            message_queue_capacity: 4096,
            stream_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON config; missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` on malformed JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json).map_err(|e| ValidationError::InvalidConfiguration {
            reason: format!("invalid engine config: {e}"),
        })
    }
}
