//! Component world trait and the contexts handed to its callbacks

use super::ComponentTypeIndex;
use crate::collection::Scene;
use crate::instance::InstanceHandle;
use crate::message::Message;
use crate::property::{PropertyError, PropertySet, PropertyValue};
use crate::prototype::ComponentResource;
use glam::{Quat, Vec3};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    #[error("{0}")]
    Failed(String),
}

impl ComponentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

pub type ComponentResult = Result<(), ComponentError>;

/// Passed to `ComponentType::new_world` once per collection.
#[derive(Debug, Clone, Copy)]
pub struct NewWorldParams<'a> {
    pub collection: &'a str,
    pub component_type: ComponentTypeIndex,
    pub max_instances: u32,
}

/// Per-tick timing handed to every update callback.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UpdateContext {
    pub dt: f32,
    pub tick: u64,
}

/// Everything a per-instance callback may touch.
///
/// `scene` is the owning collection's scene, so callbacks can reparent,
/// create empty instances or queue deletions while they run.
pub struct ComponentContext<'a> {
    pub scene: &'a mut Scene,
    pub instance: InstanceHandle,
    /// Position of the component within its prototype.
    pub component_index: u16,
    pub component_id: u64,
    /// Present when the type reserves a user-data word on the instance.
    pub user_data: Option<&'a mut usize>,
}

pub struct CreateParams<'a> {
    pub context: ComponentContext<'a>,
    pub position: Vec3,
    pub rotation: Quat,
    pub resource: Option<&'a ComponentResource>,
    pub properties: &'a PropertySet,
}

pub struct UpdateParams<'a> {
    pub scene: &'a mut Scene,
    pub context: &'a UpdateContext,
    /// Set by the callback when it moved instances.
    pub transforms_updated: bool,
}

/// Per-collection state of one component type.
///
/// Every callback has a no-op default; implement only what the type needs.
pub trait ComponentWorld: Send {
    fn create(&mut self, _params: &mut CreateParams<'_>) -> ComponentResult {
        Ok(())
    }

    fn destroy(&mut self, _ctx: &mut ComponentContext<'_>) {}

    fn init(&mut self, _ctx: &mut ComponentContext<'_>) -> ComponentResult {
        Ok(())
    }

    fn finalize(&mut self, _ctx: &mut ComponentContext<'_>) -> ComponentResult {
        Ok(())
    }

    fn add_to_update(&mut self, _ctx: &mut ComponentContext<'_>) -> ComponentResult {
        Ok(())
    }

    fn update(&mut self, _params: &mut UpdateParams<'_>) -> ComponentResult {
        Ok(())
    }

    fn post_update(&mut self, _scene: &mut Scene) -> ComponentResult {
        Ok(())
    }

    fn render(&mut self, _scene: &mut Scene) -> ComponentResult {
        Ok(())
    }

    fn on_message(&mut self, _ctx: &mut ComponentContext<'_>, _message: &Message) -> ComponentResult {
        Ok(())
    }

    fn get_property(
        &mut self,
        _ctx: &mut ComponentContext<'_>,
        property_id: u64,
    ) -> Result<PropertyValue, PropertyError> {
        Err(PropertyError::NotFound { property_id })
    }

    fn set_property(
        &mut self,
        _ctx: &mut ComponentContext<'_>,
        property_id: u64,
        _value: &PropertyValue,
    ) -> Result<(), PropertyError> {
        Err(PropertyError::NotFound { property_id })
    }

    /// Bulk override applied once after creation and before init.
    fn set_properties(
        &mut self,
        _ctx: &mut ComponentContext<'_>,
        _properties: &PropertySet,
    ) -> ComponentResult {
        Ok(())
    }

    /// Called once when the owning collection is torn down.
    fn delete_world(&mut self) {}
}

/// Factory for per-collection worlds.
pub trait ComponentType: Send + Sync + 'static {
    fn new_world(&self, params: &NewWorldParams<'_>) -> Box<dyn ComponentWorld>;
}

impl<F> ComponentType for F
where
    F: Fn(&NewWorldParams<'_>) -> Box<dyn ComponentWorld> + Send + Sync + 'static,
{
    fn new_world(&self, params: &NewWorldParams<'_>) -> Box<dyn ComponentWorld> {
        self(params)
    }
}
