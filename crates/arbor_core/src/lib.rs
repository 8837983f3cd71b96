//! Arbor Core
//!
//! Hierarchical instance engine:
//! - Fixed-capacity collections of instances built from shared prototypes
//! - Parent/child hierarchy stored as per-depth level buckets
//! - Level-ordered world transform propagation
//! - Deferred add/delete queues processed at tick boundaries
//! - Priority-ordered, type-major component updates
//! - Message sockets for deferred cross-instance communication

pub mod collection;
pub mod component;
pub mod config;
pub mod engine;
pub mod hash;
pub mod instance;
pub mod message;
pub mod pool;
pub mod property;
pub mod prototype;
pub mod time;
pub mod transform;

pub use glam;

pub use collection::{
    Collection, CollectionDescription, CollectionError, CollectionRef, InstanceDescription, Scene,
    SceneError, SpawnParams,
};
pub use component::{
    ComponentContext, ComponentError, ComponentResult, ComponentType, ComponentTypeDescriptor,
    ComponentTypeIndex, ComponentTypeRegistry, ComponentWorld, CreateParams, NewWorldParams,
    UpdateContext, UpdateParams,
};
pub use config::{ConfigError, EngineConfig};
pub use engine::Engine;
pub use instance::{InstanceHandle, MAX_HIERARCHICAL_DEPTH, MAX_INSTANCES};
pub use message::{Message, MessagePayload, MessageRouter, MessageSocket, Url};
pub use property::{PropertyError, PropertySet, PropertyValue};
pub use prototype::{Prototype, PrototypeComponent, PrototypeLibrary, PrototypeSource};
pub use time::SimulationClock;
pub use transform::Transform;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
