//! Mean telemetry: a rolling average over another telemetry point.
//!
//! A `telemetry-mean` object names a linked point (`telemetryPoint`, a
//! key-string) and a window size (`samples`). Averaged datums are produced
//! only once the window is full, both for live subscriptions and for
//! historical requests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::error::{EngineResult, ExecutionError, ValidationError};
use crate::identifier::Identifier;
use crate::objects::{DomainObject, ObjectProvider};
use crate::subscription::SubscriptionHandle;
use crate::value::{Datum, Value};

use super::metadata::{TelemetryMetadata, ValueMetadata};
use super::traits::{TelemetryProvider, TelemetrySink};

/// Object type served by [`MeanTelemetryProvider`].
pub const MEAN_TYPE: &str = "telemetry-mean";

/// Field holding the averaged value in produced datums.
pub const MEAN_VALUE_KEY: &str = "value";

/// Settings read from a `telemetry-mean` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeanSettings {
    /// The averaged telemetry point.
    pub telemetry_point: Identifier,
    /// Window size, at least 1.
    pub samples: usize,
}

impl MeanSettings {
    /// Reads `telemetryPoint` and `samples` from the object's properties.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` when either is missing or `samples` is not
    /// a positive integer.
    pub fn from_object(object: &DomainObject) -> Result<Self, ValidationError> {
        let point = object
            .property("telemetryPoint")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ValidationError::MissingField {
                field: "telemetryPoint".to_string(),
            })?;

        let samples = object
            .property("samples")
            .ok_or_else(|| ValidationError::MissingField {
                field: "samples".to_string(),
            })?
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| ValidationError::InvalidConfiguration {
                reason: "samples must be a positive integer".to_string(),
            })?;

        Ok(Self {
            telemetry_point: Identifier::parse_key_string(point),
            samples,
        })
    }
}

/// Sliding-window averager over the range value of a telemetry point.
#[derive(Debug, Clone)]
pub struct TelemetryAverager {
    samples: usize,
    domain: Option<(String, String)>,
    range_field: String,
    window: VecDeque<f64>,
}

impl TelemetryAverager {
    /// Builds an averager for a point described by `metadata`.
    ///
    /// The first domain value (by hint) supplies the timestamp; the first
    /// range value is averaged.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the metadata has no range value.
    pub fn new(metadata: &TelemetryMetadata, samples: usize) -> Result<Self, ValidationError> {
        let range = metadata
            .range_values()
            .first()
            .map(|v| v.source_key().to_string())
            .ok_or_else(|| ValidationError::MissingField {
                field: "range value".to_string(),
            })?;

        let domain = metadata
            .domain_values()
            .first()
            .map(|v| (v.key.clone(), v.source_key().to_string()));

        Ok(Self {
            samples: samples.max(1),
            domain,
            range_field: range,
            window: VecDeque::with_capacity(samples.max(1) + 1),
        })
    }

    /// Feeds one datum and returns the current average.
    ///
    /// Datums without a numeric range value are ignored and yield `None`.
    pub fn create_average_datum(&mut self, datum: &Datum) -> Option<Datum> {
        let value = datum.get(&self.range_field).and_then(Value::as_number)?;

        self.window.push_back(value);
        while self.window.len() > self.samples {
            self.window.pop_front();
        }

        #[allow(clippy::cast_precision_loss)]
        let mean = self.window.iter().sum::<f64>() / self.window.len() as f64;

        let mut out = Datum::new();
        if let Some((key, source)) = &self.domain {
            if let Some(ts) = datum.get(source) {
                out.insert(key.clone(), ts.clone());
            }
        }
        out.insert(MEAN_VALUE_KEY, mean);
        Some(out)
    }

    /// Number of values currently in the window.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.window.len()
    }

    /// True once the window holds `samples` values.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.window.len() == self.samples
    }
}

/// Provider for `telemetry-mean` objects.
pub struct MeanTelemetryProvider {
    objects: Arc<dyn ObjectProvider>,
    telemetry: Arc<dyn TelemetryProvider>,
}

impl MeanTelemetryProvider {
    /// `telemetry` serves the linked points.
    #[must_use]
    pub fn new(objects: Arc<dyn ObjectProvider>, telemetry: Arc<dyn TelemetryProvider>) -> Self {
        Self { objects, telemetry }
    }

    fn linked(&self, object: &DomainObject) -> EngineResult<(MeanSettings, DomainObject, TelemetryMetadata)> {
        let settings = MeanSettings::from_object(object)?;
        let linked = self
            .objects
            .get(&settings.telemetry_point)?
            .ok_or_else(|| ExecutionError::ObjectNotFound {
                id: settings.telemetry_point.to_key_string(),
            })?;
        let metadata = self
            .telemetry
            .metadata(&linked)?
            .ok_or_else(|| ValidationError::MissingField {
                field: "telemetry".to_string(),
            })?;
        Ok((settings, linked, metadata))
    }
}

impl TelemetryProvider for MeanTelemetryProvider {
    fn supports(&self, object: &DomainObject) -> bool {
        object.kind == MEAN_TYPE
    }

    fn metadata(&self, object: &DomainObject) -> EngineResult<Option<TelemetryMetadata>> {
        let (_, _, linked) = self.linked(object)?;
        let mut values: Vec<ValueMetadata> = linked.domain_values().into_iter().cloned().collect();
        values.push(ValueMetadata::new(MEAN_VALUE_KEY).range(1));
        Ok(Some(TelemetryMetadata::new(values)))
    }

    fn subscribe(&self, object: &DomainObject, sink: TelemetrySink) -> EngineResult<Box<dyn SubscriptionHandle>> {
        let (settings, linked, metadata) = self.linked(object)?;
        let averager = Mutex::new(TelemetryAverager::new(&metadata, settings.samples)?);
        let mean_id = object.identifier.clone();

        debug!(object = %mean_id, point = %linked.identifier, samples = settings.samples, "subscribing to mean");

        let forward: TelemetrySink = Arc::new(move |datum: &Datum| {
            let averaged = {
                let Ok(mut averager) = averager.lock() else {
                    return;
                };
                match averager.create_average_datum(datum) {
                    Some(avg) if averager.is_full() => avg,
                    _ => return,
                }
            };
            trace!(object = %mean_id, "mean datum");
            sink(&averaged);
        });

        self.telemetry.subscribe(&linked, forward)
    }

    fn request(&self, object: &DomainObject) -> EngineResult<Vec<Datum>> {
        let (settings, linked, metadata) = self.linked(object)?;
        let mut averager = TelemetryAverager::new(&metadata, settings.samples)?;

        let history = self.telemetry.request(&linked)?;
        Ok(history
            .iter()
            .filter_map(|datum| {
                let avg = averager.create_average_datum(datum)?;
                averager.is_full().then_some(avg)
            })
            .collect())
    }
}

impl std::fmt::Debug for MeanTelemetryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeanTelemetryProvider").finish_non_exhaustive()
    }
}
