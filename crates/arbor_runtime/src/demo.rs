//! Demo component types: spinning arms and short-lived debris

use arbor_core::glam::Vec3;
use arbor_core::hash::hash_str;
use arbor_core::{
    Collection, CollectionError, ComponentContext, ComponentError, ComponentResult, ComponentType,
    ComponentTypeIndex, ComponentWorld, CreateParams, InstanceHandle, NewWorldParams, PropertyError,
    PropertySet, PropertyValue, Prototype, PrototypeComponent, SpawnParams, UpdateParams,
};
use arbor_core::prototype::PrototypeError;
use std::collections::HashMap;
use std::f32::consts::TAU;
use std::sync::Arc;

/// Degrees per second when a prototype sets no `speed`.
const DEFAULT_SPEED: f32 = 45.0;
/// Ticks a debris instance lives when its prototype sets no `ticks`.
const DEFAULT_LIFETIME: u32 = 120;

fn number(properties: &PropertySet, id: u64) -> Result<Option<f64>, ComponentError> {
    match properties.get(id) {
        None => Ok(None),
        Some(PropertyValue::Number(n)) => Ok(Some(*n)),
        Some(other) => Err(ComponentError::new(format!(
            "expected a number, got {}",
            other.type_name()
        ))),
    }
}

/// Rotates instances about their local Y axis.
pub struct Spinner;

impl ComponentType for Spinner {
    fn new_world(&self, params: &NewWorldParams<'_>) -> Box<dyn ComponentWorld> {
        Box::new(SpinnerWorld {
            speeds: HashMap::with_capacity(params.max_instances as usize),
            active: Vec::new(),
            speed_id: hash_str("speed"),
        })
    }
}

struct SpinnerWorld {
    speeds: HashMap<InstanceHandle, f32>,
    active: Vec<InstanceHandle>,
    speed_id: u64,
}

impl ComponentWorld for SpinnerWorld {
    fn create(&mut self, params: &mut CreateParams<'_>) -> ComponentResult {
        let speed = number(params.properties, self.speed_id)?.map_or(DEFAULT_SPEED, |s| s as f32);
        self.speeds.insert(params.context.instance, speed);
        Ok(())
    }

    fn destroy(&mut self, ctx: &mut ComponentContext<'_>) {
        self.speeds.remove(&ctx.instance);
        self.active.retain(|h| *h != ctx.instance);
    }

    fn add_to_update(&mut self, ctx: &mut ComponentContext<'_>) -> ComponentResult {
        self.active.push(ctx.instance);
        Ok(())
    }

    fn set_properties(&mut self, ctx: &mut ComponentContext<'_>, properties: &PropertySet) -> ComponentResult {
        if let Some(speed) = number(properties, self.speed_id)? {
            self.speeds.insert(ctx.instance, speed as f32);
        }
        Ok(())
    }

    fn update(&mut self, params: &mut UpdateParams<'_>) -> ComponentResult {
        let dt = params.context.dt;
        for handle in &self.active {
            let speed = self.speeds.get(handle).copied().unwrap_or(DEFAULT_SPEED);
            let Some(euler) = params.scene.euler(*handle) else {
                continue;
            };
            params
                .scene
                .set_euler(*handle, euler + Vec3::new(0.0, speed * dt, 0.0))
                .map_err(|err| ComponentError::new(err.to_string()))?;
        }
        params.transforms_updated = !self.active.is_empty();
        Ok(())
    }

    fn get_property(
        &mut self,
        ctx: &mut ComponentContext<'_>,
        property_id: u64,
    ) -> Result<PropertyValue, PropertyError> {
        if property_id != self.speed_id {
            return Err(PropertyError::NotFound { property_id });
        }
        self.speeds
            .get(&ctx.instance)
            .map(|speed| PropertyValue::Number(*speed as f64))
            .ok_or(PropertyError::NotFound { property_id })
    }
}

/// Deletes its instance, and everything below it, after a number of ticks.
pub struct Lifetime;

impl ComponentType for Lifetime {
    fn new_world(&self, _params: &NewWorldParams<'_>) -> Box<dyn ComponentWorld> {
        Box::new(LifetimeWorld {
            remaining: HashMap::new(),
            ticks_id: hash_str("ticks"),
        })
    }
}

struct LifetimeWorld {
    remaining: HashMap<InstanceHandle, u32>,
    ticks_id: u64,
}

impl ComponentWorld for LifetimeWorld {
    fn create(&mut self, params: &mut CreateParams<'_>) -> ComponentResult {
        self.remaining.insert(params.context.instance, DEFAULT_LIFETIME);
        Ok(())
    }

    fn destroy(&mut self, ctx: &mut ComponentContext<'_>) {
        self.remaining.remove(&ctx.instance);
    }

    fn set_properties(&mut self, ctx: &mut ComponentContext<'_>, properties: &PropertySet) -> ComponentResult {
        if let Some(ticks) = number(properties, self.ticks_id)? {
            self.remaining.insert(ctx.instance, ticks.max(1.0) as u32);
        }
        Ok(())
    }

    fn update(&mut self, params: &mut UpdateParams<'_>) -> ComponentResult {
        let mut expired = Vec::new();
        for (handle, ticks) in self.remaining.iter_mut() {
            *ticks = ticks.saturating_sub(1);
            if *ticks == 0 {
                expired.push(*handle);
            }
        }
        for handle in expired {
            self.remaining.remove(&handle);
            params
                .scene
                .delete(handle, true)
                .map_err(|err| ComponentError::new(err.to_string()))?;
        }
        Ok(())
    }
}

pub fn arm_prototype(spinner: ComponentTypeIndex) -> Result<Prototype, PrototypeError> {
    Prototype::builder("arm")
        .component(PrototypeComponent::new("spinner", spinner))
        .build()
}

pub fn debris_prototype(
    spinner: ComponentTypeIndex,
    lifetime: ComponentTypeIndex,
) -> Result<Prototype, PrototypeError> {
    Prototype::builder("debris")
        .component(
            PrototypeComponent::new("spinner", spinner).with_properties(
                PropertySet::new().with_named("speed", PropertyValue::Number(180.0)),
            ),
        )
        .component(PrototypeComponent::new("lifetime", lifetime))
        .build()
}

/// Spawn a hub with `arms` spinning children laid out on a ring; every
/// fourth arm carries a piece of debris that expires on its own.
///
/// Returns the number of instances spawned.
pub fn populate(
    collection: &mut Collection,
    arm: &Arc<Prototype>,
    debris: &Arc<Prototype>,
    arms: u32,
) -> Result<usize, CollectionError> {
    let hub = collection.spawn(SpawnParams::new(Arc::clone(arm)).named("hub"))?;
    let mut spawned = 1;
    for i in 0..arms {
        let angle = i as f32 / arms.max(1) as f32 * TAU;
        let arm_instance = collection.spawn(
            SpawnParams::new(Arc::clone(arm))
                .at(Vec3::new(angle.cos(), 0.0, angle.sin()) * 10.0)
                .with_properties(
                    "spinner",
                    PropertySet::new().with_named("speed", PropertyValue::Number(30.0 + i as f64)),
                ),
        )?;
        collection.set_parent(arm_instance, Some(hub), false)?;
        spawned += 1;

        if i % 4 == 0 {
            let piece = collection.spawn(
                SpawnParams::new(Arc::clone(debris))
                    .at(Vec3::Y)
                    .with_properties(
                        "lifetime",
                        PropertySet::new().with_named("ticks", PropertyValue::Number(60.0 + i as f64)),
                    ),
            )?;
            collection.set_parent(piece, Some(arm_instance), false)?;
            spawned += 1;
        }
    }
    Ok(spawned)
}
