//! Component types
//!
//! A component type contributes one `ComponentWorld` per collection. The
//! registry fixes which types exist and the order their worlds are ticked in.

mod descriptor;
mod handle;
mod registration_error;
mod registry;
mod world;

pub use descriptor::ComponentTypeDescriptor;
pub use handle::ComponentTypeIndex;
pub use registration_error::RegistrationError;
pub use registry::{ComponentTypeRegistry, MAX_COMPONENT_TYPES};
pub use world::{
    ComponentContext, ComponentError, ComponentResult, ComponentType, ComponentWorld,
    CreateParams, NewWorldParams, UpdateContext, UpdateParams,
};
