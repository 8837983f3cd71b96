use thiserror::Error;

/// Errors that can occur while registering or reordering component types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("component type '{name}' is already registered")]
    DuplicateName { name: String },

    #[error("component type '{name}' uses resource type {resource_type:#018x}, already claimed by '{existing}'")]
    DuplicateResourceType {
        name: String,
        resource_type: u64,
        existing: String,
    },

    #[error("cannot register '{name}': the registry already holds {max} component types")]
    TooManyTypes { name: String, max: usize },

    #[error("component type '{name}' is not registered")]
    TypeNotFound { name: String },
}
