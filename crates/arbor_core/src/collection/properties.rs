//! Property access on instances and their components

use super::lifecycle::{user_data_slots, with_context};
use super::Collection;
use crate::instance::InstanceHandle;
use crate::property::{PropertyError, PropertyValue, EULER, POSITION, ROTATION, SCALE};

impl Collection {
    /// Read a property.
    ///
    /// With no `component_id` the built-in transform properties are read:
    /// `position`, `rotation`, `scale` and `euler`.
    pub fn get_property(
        &mut self,
        handle: InstanceHandle,
        component_id: Option<u64>,
        property_id: u64,
    ) -> Result<PropertyValue, PropertyError> {
        let index = self
            .scene
            .resolve(handle)
            .map_err(|_| PropertyError::StaleInstance)?;
        let Some(component_id) = component_id else {
            return self.instance_property(handle, property_id);
        };

        let prototype = self.prototype_of(index).ok_or(PropertyError::StaleInstance)?;
        let component_index = prototype
            .component_index(component_id)
            .ok_or(PropertyError::ComponentNotFound { component_id })?;
        let component = &prototype.components()[component_index];
        let slots = user_data_slots(&self.types, &prototype);
        let world = self
            .worlds
            .get_mut(component.type_index.index())
            .ok_or(PropertyError::ComponentNotFound { component_id })?;
        with_context(
            &mut self.scene,
            index,
            component_index,
            component_id,
            slots[component_index],
            |mut ctx| world.get_property(&mut ctx, property_id),
        )
    }

    pub fn set_property(
        &mut self,
        handle: InstanceHandle,
        component_id: Option<u64>,
        property_id: u64,
        value: PropertyValue,
    ) -> Result<(), PropertyError> {
        let index = self
            .scene
            .resolve(handle)
            .map_err(|_| PropertyError::StaleInstance)?;
        let Some(component_id) = component_id else {
            return self.set_instance_property(handle, property_id, value);
        };

        let prototype = self.prototype_of(index).ok_or(PropertyError::StaleInstance)?;
        let component_index = prototype
            .component_index(component_id)
            .ok_or(PropertyError::ComponentNotFound { component_id })?;
        let component = &prototype.components()[component_index];
        let slots = user_data_slots(&self.types, &prototype);
        let world = self
            .worlds
            .get_mut(component.type_index.index())
            .ok_or(PropertyError::ComponentNotFound { component_id })?;
        with_context(
            &mut self.scene,
            index,
            component_index,
            component_id,
            slots[component_index],
            |mut ctx| world.set_property(&mut ctx, property_id, &value),
        )
    }

    fn instance_property(&self, handle: InstanceHandle, property_id: u64) -> Result<PropertyValue, PropertyError> {
        let scene = &self.scene;
        let value = if property_id == *POSITION {
            scene.position(handle).map(PropertyValue::Vector3)
        } else if property_id == *ROTATION {
            scene.rotation(handle).map(PropertyValue::Quat)
        } else if property_id == *SCALE {
            scene.scale(handle).map(PropertyValue::Vector3)
        } else if property_id == *EULER {
            scene.euler(handle).map(PropertyValue::Vector3)
        } else {
            return Err(PropertyError::NotFound { property_id });
        };
        value.ok_or(PropertyError::StaleInstance)
    }

    fn set_instance_property(
        &mut self,
        handle: InstanceHandle,
        property_id: u64,
        value: PropertyValue,
    ) -> Result<(), PropertyError> {
        let mismatch = |expected| PropertyError::TypeMismatch {
            property_id,
            expected,
        };
        let scene = &mut self.scene;
        let applied = if property_id == *POSITION {
            match value {
                PropertyValue::Vector3(v) => scene.set_position(handle, v),
                _ => return Err(mismatch("vector3")),
            }
        } else if property_id == *ROTATION {
            match value {
                PropertyValue::Quat(q) => scene.set_rotation(handle, q.normalize()),
                _ => return Err(mismatch("quat")),
            }
        } else if property_id == *SCALE {
            match value {
                PropertyValue::Vector3(v) => scene.set_scale(handle, v),
                PropertyValue::Number(n) => scene.set_uniform_scale(handle, n as f32),
                _ => return Err(mismatch("vector3 or number")),
            }
        } else if property_id == *EULER {
            match value {
                PropertyValue::Vector3(v) => scene.set_euler(handle, v),
                _ => return Err(mismatch("vector3")),
            }
        } else {
            return Err(PropertyError::NotFound { property_id });
        };
        applied.map_err(|_| PropertyError::StaleInstance)
    }
}
