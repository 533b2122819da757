//! Domain objects as the engine sees them.

use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;
use crate::telemetry::TelemetryMetadata;

/// A domain object: a condition, a telemetry point, a mean object, ...
///
/// Only the fields the engine reads are typed; anything else the object
/// carries is kept in `properties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainObject {
    /// Object identity.
    pub identifier: Identifier,

    /// Object type, e.g. `conditionSet.condition` or `telemetry-mean`.
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Telemetry metadata, present on telemetry-producing objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<TelemetryMetadata>,

    /// Type-specific configuration (conditions keep `{trigger, criteria}` here).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<serde_json::Value>,

    /// Remaining properties.
    #[serde(flatten)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl DomainObject {
    /// Creates a bare object of the given type.
    #[must_use]
    pub fn new(identifier: Identifier, kind: impl Into<String>) -> Self {
        Self {
            identifier,
            kind: kind.into(),
            name: String::new(),
            telemetry: None,
            configuration: None,
            properties: serde_json::Map::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Attaches telemetry metadata.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: TelemetryMetadata) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Sets the type-specific configuration.
    #[must_use]
    pub fn with_configuration(mut self, configuration: serde_json::Value) -> Self {
        self.configuration = Some(configuration);
        self
    }

    /// Sets an extra property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Reads an extra property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }
}
