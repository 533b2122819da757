//! # telemetry-conditions
//!
//! A condition engine for live telemetry. A **condition** combines
//! **criteria** under a trigger policy (`all` or `any`) into a single boolean
//! that an alerting or styling layer can react to.
//!
//! ## Core Concepts
//!
//! - **Criterion**: one predicate over one field of one telemetry object
//! - **Condition**: ordered criteria aggregated under a `Trigger`
//! - **Provider**: the seam to the outside world, for domain objects
//!   (`ObjectProvider`) and telemetry (`TelemetryProvider`)
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use telemetry_conditions::{
//!     Condition, ConditionConfiguration, ConditionContext, CriterionConfiguration, Datum,
//!     DomainObject, EngineConfig, Identifier, InMemoryObjects, InMemoryTelemetry,
//!     TelemetryMetadata, Trigger, Value, ValueMetadata,
//! };
//!
//! let objects = InMemoryObjects::new();
//! let telemetry = InMemoryTelemetry::new();
//! let sine = Identifier::new("example", "sine");
//! objects
//!     .insert(DomainObject::new(sine.clone(), "generator").with_telemetry(TelemetryMetadata::new(
//!         vec![ValueMetadata::new("sin").range(1)],
//!     )))
//!     .unwrap();
//!
//! let configuration = ConditionConfiguration::new(Identifier::from_key("high"), Trigger::Any)
//!     .with_criterion(CriterionConfiguration::new(
//!         "greaterThan",
//!         vec![Value::Float(0.5)],
//!         "sin",
//!         "example:sine",
//!     ));
//!
//! let context = ConditionContext::new(Arc::new(objects), Arc::new(telemetry.clone()));
//! let mut condition = Condition::new(configuration, context, EngineConfig::default());
//! let events = condition.events();
//! condition.subscribe();
//!
//! telemetry.publish(&sine, Datum::new().with("sin", 0.9)).unwrap();
//! condition.process_events();
//!
//! assert!(condition.result());
//! assert!(events.drain().iter().any(|e| e.result() == Some(true)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod identifier;
pub mod operation;
pub mod subscription;
pub mod value;

// Providers
pub mod objects;
pub mod telemetry;

// Conditions
pub mod condition;
pub mod config;

pub use error::{EngineError, EngineResult, ExecutionError, ValidationError};
pub use identifier::Identifier;
pub use operation::{OperandKind, Operation, Predicate};
pub use subscription::{CallbackHandle, SubscriptionHandle};
pub use value::{Datum, Value};

pub use objects::{DomainObject, InMemoryObjects, ObjectObserver, ObjectProvider};
pub use telemetry::{
    InMemoryTelemetry, MeanTelemetryProvider, TelemetryMetadata, TelemetryProvider, TelemetryRegistry,
    TelemetrySink, ValueHints, ValueMetadata,
};

pub use condition::{
    compute_condition, Condition, ConditionContext, ConditionEvent, ConditionPayload, ConditionState,
    ConditionStream, Criterion, CriterionId, CriterionSnapshot,
};
pub use config::{ConditionConfiguration, ConditionDefinition, CriterionConfiguration, EngineConfig, Trigger};
