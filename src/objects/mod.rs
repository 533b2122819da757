//! Domain objects and the providers that serve them.

/// Domain object type.
pub mod domain;
/// In-memory object store.
pub mod memory;
/// Provider trait.
pub mod traits;

pub use domain::DomainObject;
pub use memory::InMemoryObjects;
pub use traits::{ObjectObserver, ObjectProvider};
