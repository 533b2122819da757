//! Telemetry sources consumed by criteria.
//!
//! The engine does not own any telemetry connection. It talks to providers
//! through `TelemetryProvider`; `InMemoryTelemetry` is the embedded reference
//! provider and `MeanTelemetryProvider` derives rolling averages from another
//! provider's points.

/// Rolling-average telemetry.
pub mod mean;
/// In-memory provider.
pub mod memory;
/// Field metadata.
pub mod metadata;
/// Provider routing.
pub mod registry;
/// Provider trait.
pub mod traits;

pub use mean::{MeanSettings, MeanTelemetryProvider, TelemetryAverager, MEAN_TYPE, MEAN_VALUE_KEY};
pub use memory::{InMemoryTelemetry, DEFAULT_HISTORY_LIMIT};
pub use metadata::{TelemetryMetadata, ValueHints, ValueMetadata};
pub use registry::TelemetryRegistry;
pub use traits::{TelemetryProvider, TelemetrySink};
