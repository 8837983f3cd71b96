use crate::hash::hash_str;

/// Static description of a component type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentTypeDescriptor {
    name: String,
    resource_type: u64,
    update_priority: u16,
    instance_user_data: bool,
    reads_transforms: bool,
}

impl ComponentTypeDescriptor {
    /// Create a descriptor whose resource type is derived from `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let resource_type = hash_str(&name);
        Self {
            name,
            resource_type,
            update_priority: 0,
            instance_user_data: true,
            reads_transforms: false,
        }
    }

    /// Resource extension this type is loaded from, e.g. `"spritec"`.
    pub fn resource_type(mut self, extension: &str) -> Self {
        self.resource_type = hash_str(extension);
        self
    }

    /// Lower priorities update earlier.
    pub fn update_priority(mut self, priority: u16) -> Self {
        self.update_priority = priority;
        self
    }

    /// Whether every component of this type gets a private user-data word on its instance.
    pub fn instance_user_data(mut self, enabled: bool) -> Self {
        self.instance_user_data = enabled;
        self
    }

    /// Propagate dirty transforms before this type updates.
    pub fn reads_transforms(mut self, enabled: bool) -> Self {
        self.reads_transforms = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource_type_hash(&self) -> u64 {
        self.resource_type
    }

    pub fn priority(&self) -> u16 {
        self.update_priority
    }

    pub fn has_instance_user_data(&self) -> bool {
        self.instance_user_data
    }

    pub fn needs_transforms(&self) -> bool {
        self.reads_transforms
    }

    pub(crate) fn set_priority(&mut self, priority: u16) {
        self.update_priority = priority;
    }
}
