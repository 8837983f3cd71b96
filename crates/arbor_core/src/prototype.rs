//! Prototypes: shared, read-only templates for instances
//!
//! The runtime never loads or frees prototypes itself. It asks a
//! `PrototypeSource` for an `Arc<Prototype>` and hands the reference back
//! when the instance goes away.

use crate::component::ComponentTypeIndex;
use crate::hash::hash_str;
use crate::property::PropertySet;
use glam::{Quat, Vec3};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Opaque resource a component is created from (a sprite atlas, a script...).
pub type ComponentResource = Arc<dyn Any + Send + Sync>;

pub const MAX_PROTOTYPE_COMPONENTS: usize = 0xffff;

static EMPTY: Lazy<Arc<Prototype>> = Lazy::new(|| {
    Arc::new(Prototype {
        name: String::new(),
        components: Vec::new(),
    })
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrototypeError {
    #[error("prototype '{name}' declares component '{id:#018x}' twice")]
    DuplicateComponentId { name: String, id: u64 },

    #[error("prototype '{name}' has more than {max} components")]
    TooManyComponents { name: String, max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("prototype '{path}' not found")]
    NotFound { path: String },
}

#[derive(Clone)]
pub struct PrototypeComponent {
    pub id: u64,
    pub resource_id: u64,
    pub type_index: ComponentTypeIndex,
    pub resource: Option<ComponentResource>,
    pub position: Vec3,
    pub rotation: Quat,
    pub properties: PropertySet,
}

impl PrototypeComponent {
    pub fn new(id: &str, type_index: ComponentTypeIndex) -> Self {
        Self {
            id: hash_str(id),
            resource_id: 0,
            type_index,
            resource: None,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            properties: PropertySet::new(),
        }
    }

    pub fn with_resource(mut self, path: &str, resource: ComponentResource) -> Self {
        self.resource_id = hash_str(path);
        self.resource = Some(resource);
        self
    }

    pub fn at(mut self, position: Vec3, rotation: Quat) -> Self {
        self.position = position;
        self.rotation = rotation;
        self
    }

    pub fn with_properties(mut self, properties: PropertySet) -> Self {
        self.properties = properties;
        self
    }
}

impl fmt::Debug for PrototypeComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrototypeComponent")
            .field("id", &format_args!("{:#018x}", self.id))
            .field("type_index", &self.type_index)
            .field("has_resource", &self.resource.is_some())
            .field("position", &self.position)
            .field("rotation", &self.rotation)
            .field("properties", &self.properties.len())
            .finish()
    }
}

#[derive(Debug)]
pub struct Prototype {
    name: String,
    components: Vec<PrototypeComponent>,
}

impl Prototype {
    pub fn builder(name: impl Into<String>) -> PrototypeBuilder {
        PrototypeBuilder {
            name: name.into(),
            components: Vec::new(),
        }
    }

    /// Shared component-less prototype used for bones and other empty instances.
    pub fn empty() -> Arc<Prototype> {
        Arc::clone(&EMPTY)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn components(&self) -> &[PrototypeComponent] {
        &self.components
    }

    pub fn component_index(&self, id: u64) -> Option<usize> {
        self.components.iter().position(|c| c.id == id)
    }
}

pub struct PrototypeBuilder {
    name: String,
    components: Vec<PrototypeComponent>,
}

impl PrototypeBuilder {
    pub fn component(mut self, component: PrototypeComponent) -> Self {
        self.components.push(component);
        self
    }

    pub fn build(self) -> Result<Prototype, PrototypeError> {
        if self.components.len() > MAX_PROTOTYPE_COMPONENTS {
            return Err(PrototypeError::TooManyComponents {
                name: self.name,
                max: MAX_PROTOTYPE_COMPONENTS,
            });
        }
        for (i, component) in self.components.iter().enumerate() {
            if self.components[..i].iter().any(|c| c.id == component.id) {
                return Err(PrototypeError::DuplicateComponentId {
                    name: self.name.clone(),
                    id: component.id,
                });
            }
        }
        Ok(Prototype {
            name: self.name,
            components: self.components,
        })
    }
}

/// Contract with the resource system.
pub trait PrototypeSource: Send + Sync {
    fn acquire(&self, path: &str) -> Result<Arc<Prototype>, ResourceError>;

    /// Hand back a reference obtained from `acquire`.
    fn release(&self, prototype: Arc<Prototype>) {
        drop(prototype);
    }
}

/// In-memory prototype store keyed by path.
#[derive(Default)]
pub struct PrototypeLibrary {
    entries: RwLock<HashMap<String, Arc<Prototype>>>,
}

impl PrototypeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, prototype: Prototype) -> Arc<Prototype> {
        let prototype = Arc::new(prototype);
        self.entries
            .write()
            .insert(path.into(), Arc::clone(&prototype));
        prototype
    }

    pub fn remove(&self, path: &str) -> Option<Arc<Prototype>> {
        self.entries.write().remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.read().contains_key(path)
    }

    /// Outstanding references handed out for `path`, not counting the library's own.
    pub fn reference_count(&self, path: &str) -> usize {
        self.entries
            .read()
            .get(path)
            .map(|p| Arc::strong_count(p) - 1)
            .unwrap_or(0)
    }
}

impl PrototypeSource for PrototypeLibrary {
    fn acquire(&self, path: &str) -> Result<Arc<Prototype>, ResourceError> {
        self.entries
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound {
                path: path.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_duplicate_ids() {
        let ty = ComponentTypeIndex::new(0);
        let err = Prototype::builder("dup")
            .component(PrototypeComponent::new("sprite", ty))
            .component(PrototypeComponent::new("sprite", ty))
            .build()
            .unwrap_err();
        assert!(matches!(err, PrototypeError::DuplicateComponentId { .. }));
    }

    #[test]
    fn library_tracks_references() {
        let library = PrototypeLibrary::new();
        let ty = ComponentTypeIndex::new(0);
        library.insert(
            "/hero.goc",
            Prototype::builder("hero")
                .component(PrototypeComponent::new("script", ty))
                .build()
                .unwrap(),
        );

        let acquired = library.acquire("/hero.goc").unwrap();
        assert_eq!(acquired.component_index(hash_str("script")), Some(0));
        assert_eq!(library.reference_count("/hero.goc"), 1);

        library.release(acquired);
        assert_eq!(library.reference_count("/hero.goc"), 0);
        assert_eq!(
            library.acquire("/missing.goc").unwrap_err(),
            ResourceError::NotFound {
                path: "/missing.goc".into()
            }
        );
    }
}
