use super::{ComponentType, ComponentTypeDescriptor, ComponentTypeIndex, RegistrationError};
use std::collections::HashMap;
use tracing::debug;

/// Upper bound on registered component types.
pub const MAX_COMPONENT_TYPES: usize = 255;

/// Ordered table of component types.
///
/// Types keep their registration index for life; `update_order` is a separate
/// permutation that `sort_by_priority` rebuilds.
pub struct ComponentTypeRegistry {
    types: Vec<RegisteredType>,
    name_lookup: HashMap<String, ComponentTypeIndex>,
    resource_lookup: HashMap<u64, ComponentTypeIndex>,
    update_order: Vec<ComponentTypeIndex>,
    sorted: bool,
}

impl ComponentTypeRegistry {
    pub fn new() -> Self {
        Self {
            types: Vec::new(),
            name_lookup: HashMap::new(),
            resource_lookup: HashMap::new(),
            update_order: Vec::new(),
            sorted: true,
        }
    }

    pub fn register(
        &mut self,
        descriptor: ComponentTypeDescriptor,
        component_type: impl ComponentType,
    ) -> Result<ComponentTypeIndex, RegistrationError> {
        let name_key = descriptor.name().to_string();
        if self.types.len() >= MAX_COMPONENT_TYPES {
            return Err(RegistrationError::TooManyTypes {
                name: name_key,
                max: MAX_COMPONENT_TYPES,
            });
        }
        if self.name_lookup.contains_key(&name_key) {
            return Err(RegistrationError::DuplicateName { name: name_key });
        }
        if let Some(existing) = self.resource_lookup.get(&descriptor.resource_type_hash()) {
            let existing_name = self
                .descriptor(*existing)
                .map(|d| d.name().to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            return Err(RegistrationError::DuplicateResourceType {
                name: name_key,
                resource_type: descriptor.resource_type_hash(),
                existing: existing_name,
            });
        }

        let index = ComponentTypeIndex::new(self.types.len() as u8);
        debug!(
            name = descriptor.name(),
            index = index.index(),
            priority = descriptor.priority(),
            "registered component type"
        );
        self.name_lookup.insert(name_key, index);
        self.resource_lookup
            .insert(descriptor.resource_type_hash(), index);
        self.types.push(RegisteredType {
            descriptor,
            component_type: Box::new(component_type),
        });
        self.update_order.push(index);
        self.sorted = false;

        Ok(index)
    }

    pub fn set_update_priority(&mut self, name: &str, priority: u16) -> Result<(), RegistrationError> {
        let index = self
            .find(name)
            .ok_or_else(|| RegistrationError::TypeNotFound {
                name: name.to_string(),
            })?;
        self.types[index.index()].descriptor.set_priority(priority);
        self.sorted = false;
        Ok(())
    }

    /// Reorder `update_order` by ascending priority; ties keep registration order.
    pub fn sort_by_priority(&mut self) {
        let types = &self.types;
        self.update_order
            .sort_by_key(|index| types[index.index()].descriptor.priority());
        self.sorted = true;
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn find(&self, name: &str) -> Option<ComponentTypeIndex> {
        self.name_lookup.get(name).copied()
    }

    pub fn find_by_resource_type(&self, resource_type: u64) -> Option<ComponentTypeIndex> {
        self.resource_lookup.get(&resource_type).copied()
    }

    pub fn descriptor(&self, index: ComponentTypeIndex) -> Option<&ComponentTypeDescriptor> {
        self.types.get(index.index()).map(|ty| &ty.descriptor)
    }

    pub fn component_type(&self, index: ComponentTypeIndex) -> Option<&dyn ComponentType> {
        self.types
            .get(index.index())
            .map(|ty| ty.component_type.as_ref())
    }

    /// Type indices in the order their worlds update.
    pub fn update_order(&self) -> &[ComponentTypeIndex] {
        &self.update_order
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentTypeIndex, &ComponentTypeDescriptor)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, ty)| (ComponentTypeIndex::new(i as u8), &ty.descriptor))
    }
}

impl Default for ComponentTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct RegisteredType {
    descriptor: ComponentTypeDescriptor,
    component_type: Box<dyn ComponentType>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentWorld, NewWorldParams};

    struct Inert;
    struct InertWorld;
    impl ComponentWorld for InertWorld {}
    impl ComponentType for Inert {
        fn new_world(&self, _params: &NewWorldParams<'_>) -> Box<dyn ComponentWorld> {
            Box::new(InertWorld)
        }
    }

    #[test]
    fn sorts_by_priority_keeping_ties_stable() {
        let mut registry = ComponentTypeRegistry::new();
        let late = registry
            .register(ComponentTypeDescriptor::new("late").update_priority(5), Inert)
            .unwrap();
        let first = registry
            .register(ComponentTypeDescriptor::new("first").update_priority(0), Inert)
            .unwrap();
        let tie = registry
            .register(ComponentTypeDescriptor::new("tie").update_priority(5), Inert)
            .unwrap();
        assert!(!registry.is_sorted());

        registry.sort_by_priority();
        assert_eq!(registry.update_order(), &[first, late, tie]);

        registry.set_update_priority("tie", 1).unwrap();
        registry.sort_by_priority();
        assert_eq!(registry.update_order(), &[first, tie, late]);
        // Registration indices never move.
        assert_eq!(registry.find("late"), Some(late));
    }

    #[test]
    fn rejects_duplicates() {
        let mut registry = ComponentTypeRegistry::new();
        registry
            .register(ComponentTypeDescriptor::new("sprite").resource_type("spritec"), Inert)
            .unwrap();
        assert_eq!(
            registry
                .register(ComponentTypeDescriptor::new("sprite"), Inert)
                .unwrap_err(),
            RegistrationError::DuplicateName {
                name: "sprite".into()
            }
        );
        assert!(matches!(
            registry.register(
                ComponentTypeDescriptor::new("sprite2").resource_type("spritec"),
                Inert
            ),
            Err(RegistrationError::DuplicateResourceType { .. })
        ));
        assert!(matches!(
            registry.set_update_priority("missing", 1),
            Err(RegistrationError::TypeNotFound { .. })
        ));
    }

    #[test]
    fn caps_type_count() {
        let mut registry = ComponentTypeRegistry::new();
        for i in 0..MAX_COMPONENT_TYPES {
            registry
                .register(ComponentTypeDescriptor::new(format!("type{i}")), Inert)
                .unwrap();
        }
        assert!(matches!(
            registry.register(ComponentTypeDescriptor::new("one_too_many"), Inert),
            Err(RegistrationError::TooManyTypes { max: 255, .. })
        ));
    }
}
