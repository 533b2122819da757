//! Telemetry metadata: which fields a telemetry object produces.

use serde::{Deserialize, Serialize};

/// Display hints for a telemetry value. Lower numbers take priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueHints {
    /// Domain (x-axis, usually time) priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<u32>,
    /// Range (y-axis) priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<u32>,
}

/// Metadata for one field of a telemetry datum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMetadata {
    /// Metadata key, as referenced by criteria.
    pub key: String,
    #[serde(default)]
    pub name: String,
    /// Datum field holding the value, when it differs from `key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default)]
    pub hints: ValueHints,
}

impl ValueMetadata {
    /// Creates metadata for a plain field.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            key,
            source: None,
            format: None,
            hints: ValueHints::default(),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    #[must_use]
    pub const fn domain(mut self, priority: u32) -> Self {
        self.hints.domain = Some(priority);
        self
    }

    #[must_use]
    pub const fn range(mut self, priority: u32) -> Self {
        self.hints.range = Some(priority);
        self
    }

    /// The datum field actually read for this value.
    #[must_use]
    pub fn source_key(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.key)
    }
}

/// Metadata for a telemetry object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryMetadata {
    /// Field descriptions.
    #[serde(default)]
    pub values: Vec<ValueMetadata>,
}

impl TelemetryMetadata {
    #[must_use]
    pub fn new(values: Vec<ValueMetadata>) -> Self {
        Self { values }
    }

    /// Looks up a value by metadata key.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&ValueMetadata> {
        self.values.iter().find(|v| v.key == key)
    }

    /// Domain values ordered by hint priority.
    #[must_use]
    pub fn domain_values(&self) -> Vec<&ValueMetadata> {
        let mut values: Vec<_> = self.values.iter().filter(|v| v.hints.domain.is_some()).collect();
        values.sort_by_key(|v| v.hints.domain);
        values
    }

    /// Range values ordered by hint priority.
    #[must_use]
    pub fn range_values(&self) -> Vec<&ValueMetadata> {
        let mut values: Vec<_> = self.values.iter().filter(|v| v.hints.range.is_some()).collect();
        values.sort_by_key(|v| v.hints.range);
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_metadata() -> TelemetryMetadata {
        TelemetryMetadata::new(vec![
            ValueMetadata::new("utc").with_source("timestamp").domain(1),
            ValueMetadata::new("local").domain(2),
            ValueMetadata::new("cos").range(2),
            ValueMetadata::new("sin").range(1),
        ])
    }

    #[test]
    fn test_value_lookup_and_source() {
        let meta = sine_metadata();
        assert_eq!(meta.value("utc").unwrap().source_key(), "timestamp");
        assert_eq!(meta.value("sin").unwrap().source_key(), "sin");
        assert!(meta.value("tan").is_none());
    }

    #[test]
    fn test_hint_ordering() {
        let meta = sine_metadata();
        let domains: Vec<_> = meta.domain_values().iter().map(|v| v.key.as_str()).collect();
        let ranges: Vec<_> = meta.range_values().iter().map(|v| v.key.as_str()).collect();
        assert_eq!(domains, vec!["utc", "local"]);
        assert_eq!(ranges, vec!["sin", "cos"]);
    }

    #[test]
    fn test_deserialize_minimal() {
        let meta: TelemetryMetadata =
            serde_json::from_str(r#"{"values":[{"key":"value","hints":{"range":1}}]}"#).unwrap();
        assert_eq!(meta.range_values().len(), 1);
        assert!(meta.domain_values().is_empty());
    }
}
