//! Instance creation, initialization, finalization and removal

use super::{Collection, CollectionError, Scene, SceneError};
use crate::component::{ComponentContext, ComponentTypeRegistry, CreateParams};
use crate::hash::{hash_str, join_path};
use crate::instance::InstanceHandle;
use crate::property::PropertySet;
use crate::prototype::Prototype;
use crate::transform::Transform;
use glam::{Quat, Vec3};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Everything `Collection::spawn` needs to place one instance.
pub struct SpawnParams {
    pub prototype: Arc<Prototype>,
    /// Explicit identifier; a generated one is minted when `None`.
    pub identifier: Option<u64>,
    pub transform: Transform,
    /// Per-component property overrides keyed by component id.
    pub properties: HashMap<u64, PropertySet>,
}

impl SpawnParams {
    pub fn new(prototype: Arc<Prototype>) -> Self {
        Self {
            prototype,
            identifier: None,
            transform: Transform::IDENTITY,
            properties: HashMap::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: u64) -> Self {
        self.identifier = Some(identifier);
        self
    }

    /// Identify the instance as `/name`.
    pub fn named(self, name: &str) -> Self {
        self.with_identifier(hash_str(&join_path("/", name)))
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.transform.translation = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.transform.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.transform.scale = scale;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_properties(mut self, component: &str, properties: PropertySet) -> Self {
        self.properties.insert(hash_str(component), properties);
        self
    }
}

/// One instance of a `CollectionDescription`.
#[derive(Debug, Clone, Default)]
pub struct InstanceDescription {
    /// Name relative to the spawned collection's path.
    pub id: String,
    /// Path handed to the prototype source.
    pub prototype: String,
    pub transform: Transform,
    /// Ids of instances in the same description to parent under this one.
    pub children: Vec<String>,
    pub properties: HashMap<u64, PropertySet>,
}

impl InstanceDescription {
    pub fn new(id: impl Into<String>, prototype: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prototype: prototype.into(),
            ..Self::default()
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn child(mut self, id: impl Into<String>) -> Self {
        self.children.push(id.into());
        self
    }

    pub fn with_properties(mut self, component: &str, properties: PropertySet) -> Self {
        self.properties.insert(hash_str(component), properties);
        self
    }
}

/// A group of instances spawned together under a fresh `/collection{n}` path.
#[derive(Debug, Clone, Default)]
pub struct CollectionDescription {
    pub instances: Vec<InstanceDescription>,
}

impl CollectionDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance(mut self, instance: InstanceDescription) -> Self {
        self.instances.push(instance);
        self
    }
}

/// User-data slot of each prototype component, `None` for types without one.
pub(super) fn user_data_slots(types: &ComponentTypeRegistry, prototype: &Prototype) -> Vec<Option<usize>> {
    let mut next = 0;
    prototype
        .components()
        .iter()
        .map(|component| {
            let reserves = types
                .descriptor(component.type_index)
                .is_some_and(|d| d.has_instance_user_data());
            if reserves {
                next += 1;
                Some(next - 1)
            } else {
                None
            }
        })
        .collect()
}

/// Run `f` with a context for one component, writing its user-data word back afterwards.
pub(super) fn with_context<R>(
    scene: &mut Scene,
    index: u16,
    component_index: usize,
    component_id: u64,
    slot: Option<usize>,
    f: impl FnOnce(ComponentContext<'_>) -> R,
) -> R {
    let instance = scene.handle_of(index);
    let mut word = slot
        .and_then(|slot| scene.user_data_word(index, slot))
        .unwrap_or(0);
    let result = {
        let user_data = if slot.is_some() { Some(&mut word) } else { None };
        f(ComponentContext {
            scene: &mut *scene,
            instance,
            component_index: component_index as u16,
            component_id,
            user_data,
        })
    };
    if let Some(slot) = slot {
        scene.set_user_data_word(index, slot, word);
    }
    result
}

impl Collection {
    pub(super) fn prototype_of(&self, index: u16) -> Option<Arc<Prototype>> {
        self.scene.slot(index).map(|i| Arc::clone(&i.prototype))
    }

    fn stale(&self, index: u16) -> CollectionError {
        SceneError::StaleHandle(self.scene.handle_of(index)).into()
    }

    /// Claim a slot for `prototype` after checking its component types exist.
    fn allocate_for(&mut self, prototype: Arc<Prototype>) -> Result<u16, CollectionError> {
        if let Some(component) = prototype
            .components()
            .iter()
            .find(|c| c.type_index.index() >= self.worlds.len())
        {
            return Err(CollectionError::UnknownComponentType {
                prototype: prototype.name().to_string(),
                type_index: component.type_index,
            });
        }
        let words = user_data_slots(&self.types, &prototype)
            .iter()
            .flatten()
            .count();
        Ok(self.scene.allocate(prototype, words)?)
    }

    /// Like `allocate_for`, for a prototype obtained from the resource source.
    /// The reference goes back to the source if no slot is claimed.
    fn allocate_acquired(&mut self, prototype: Arc<Prototype>) -> Result<u16, CollectionError> {
        match self.allocate_for(Arc::clone(&prototype)) {
            Ok(index) => {
                if let Some(instance) = self.scene.slot_mut(index) {
                    instance.prototype_acquired = true;
                }
                Ok(index)
            }
            Err(err) => {
                self.prototypes.release(prototype);
                Err(err)
            }
        }
    }

    /// Free the slot; an acquired prototype reference goes back to its source.
    fn release_slot(&mut self, index: u16) {
        let acquired = self
            .scene
            .slot(index)
            .is_some_and(|instance| instance.prototype_acquired);
        if let Some(prototype) = self.scene.remove_instance(index) {
            if acquired {
                self.prototypes.release(prototype);
            }
        }
    }

    /// Destroy components and free the slot right away.
    pub(super) fn remove(&mut self, index: u16) {
        let Some(prototype) = self.prototype_of(index) else {
            return;
        };
        self.destroy_components(index, &prototype, prototype.components().len());
        self.release_slot(index);
    }

    /// Create an instance and its components; it joins the update set at the next add pass.
    pub fn new_instance(&mut self, prototype: Arc<Prototype>) -> Result<InstanceHandle, CollectionError> {
        if self.scene.is_marked() {
            return Err(CollectionError::MarkedForDeletion);
        }
        let index = self.allocate_for(prototype)?;
        self.finish_new_instance(index)
    }

    pub fn new_instance_from_path(&mut self, path: &str) -> Result<InstanceHandle, CollectionError> {
        if self.scene.is_marked() {
            return Err(CollectionError::MarkedForDeletion);
        }
        let prototype = self.prototypes.acquire(path)?;
        let index = self.allocate_acquired(prototype)?;
        self.finish_new_instance(index)
    }

    fn finish_new_instance(&mut self, index: u16) -> Result<InstanceHandle, CollectionError> {
        if let Err(err) = self.create_components(index) {
            self.release_slot(index);
            return Err(err);
        }
        Ok(self.scene.handle_of(index))
    }

    /// Create, identify, configure and initialize an instance in one call.
    ///
    /// Failures before components exist leave no trace. Later failures queue
    /// the instance for deletion and report the error.
    pub fn spawn(&mut self, params: SpawnParams) -> Result<InstanceHandle, CollectionError> {
        if self.scene.is_marked() {
            return Err(CollectionError::MarkedForDeletion);
        }
        let SpawnParams {
            prototype,
            identifier,
            transform,
            properties,
        } = params;

        let index = self.allocate_for(prototype)?;
        self.scene.place(index, transform, "/");
        let identifier = match identifier {
            Some(id) => id,
            None => match self.scene.assign_generated_identifier(index) {
                Some(id) => id,
                None => {
                    self.release_slot(index);
                    return Err(CollectionError::IdentifierPoolExhausted);
                }
            },
        };
        if let Err(err) = self.scene.set_identifier_index(index, identifier) {
            self.release_slot(index);
            return Err(err.into());
        }
        if let Err(err) = self.create_components(index) {
            self.release_slot(index);
            return Err(err);
        }

        let configured = self
            .apply_properties(index, &properties)
            .and_then(|()| self.init_instance(index));
        if let Err(err) = configured {
            warn!(%err, "spawned instance failed to configure, deleting it");
            self.scene.queue_delete(index, false);
            return Err(err);
        }

        let handle = self.scene.handle_of(index);
        debug!(%handle, identifier, "spawned instance");
        Ok(handle)
    }

    /// Spawn every instance of `description` under a new collection path.
    ///
    /// Returns the identifier each description id was given, keyed by the hash of that id.
    pub fn spawn_from_description(
        &mut self,
        description: &CollectionDescription,
        root_transform: Transform,
    ) -> Result<HashMap<u64, u64>, CollectionError> {
        if self.scene.is_marked() {
            return Err(CollectionError::MarkedForDeletion);
        }
        let prefix = self.scene.minter().next_collection_path();
        let mut created: Vec<u16> = Vec::with_capacity(description.instances.len());
        let mut identifiers = HashMap::with_capacity(description.instances.len());

        for instance in &description.instances {
            match self.place_described(instance, &prefix) {
                Ok((index, identifier)) => {
                    created.push(index);
                    identifiers.insert(hash_str(&instance.id), identifier);
                }
                Err(err) => {
                    self.unwind(&created, 0);
                    return Err(err);
                }
            }
        }

        for (instance, &parent) in description.instances.iter().zip(&created) {
            for child_id in &instance.children {
                let child_identifier = hash_str(&join_path(&prefix, child_id));
                let Some(child) = self.scene.index_of_identifier(child_identifier) else {
                    self.unwind(&created, 0);
                    return Err(CollectionError::InvalidDescription {
                        reason: format!("'{}' lists unknown child '{}'", instance.id, child_id),
                    });
                };
                if let Err(err) = self.scene.set_parent_index(child, Some(parent), false) {
                    self.unwind(&created, 0);
                    return Err(err.into());
                }
            }
        }

        for &index in &created {
            if let Some(instance) = self.scene.slot_mut(index) {
                if instance.parent.is_none() {
                    let placed = root_transform.mul(&instance.transform);
                    instance.set_transform(placed);
                }
            }
        }
        self.scene.propagate_transforms();

        for (n, &index) in created.iter().enumerate() {
            if let Err(err) = self.create_components(index) {
                self.unwind(&created, n);
                return Err(err);
            }
        }

        for (instance, &index) in description.instances.iter().zip(&created) {
            let configured = self
                .apply_properties(index, &instance.properties)
                .and_then(|()| self.init_instance(index));
            if let Err(err) = configured {
                warn!(%err, id = instance.id.as_str(), "described instance failed to configure, deleting the spawn");
                for &index in &created {
                    self.scene.queue_delete(index, false);
                }
                return Err(err);
            }
        }

        debug!(prefix = prefix.as_str(), count = created.len(), "spawned collection description");
        Ok(identifiers)
    }

    fn place_described(
        &mut self,
        instance: &InstanceDescription,
        prefix: &str,
    ) -> Result<(u16, u64), CollectionError> {
        let prototype = self.prototypes.acquire(&instance.prototype)?;
        let index = self.allocate_acquired(prototype)?;
        self.scene.place(index, instance.transform, prefix);
        let identifier = hash_str(&join_path(prefix, &instance.id));
        if let Err(err) = self.scene.set_identifier_index(index, identifier) {
            self.release_slot(index);
            return Err(err.into());
        }
        Ok((index, identifier))
    }

    /// Drop instances created by a failed description spawn; the first
    /// `with_components` of them already have components.
    fn unwind(&mut self, created: &[u16], with_components: usize) {
        for (n, &index) in created.iter().enumerate() {
            if n < with_components {
                self.remove(index);
            } else {
                self.release_slot(index);
            }
        }
    }

    fn create_components(&mut self, index: u16) -> Result<(), CollectionError> {
        let Some(prototype) = self.prototype_of(index) else {
            return Err(self.stale(index));
        };
        let slots = user_data_slots(&self.types, &prototype);
        let mut created = 0;
        let mut failure = None;

        for (i, component) in prototype.components().iter().enumerate() {
            let type_slot = component.type_index.index();
            let Some(world) = self.worlds.get_mut(type_slot) else {
                break;
            };
            let result = with_context(&mut self.scene, index, i, component.id, slots[i], |context| {
                world.create(&mut CreateParams {
                    context,
                    position: component.position,
                    rotation: component.rotation,
                    resource: component.resource.as_ref(),
                    properties: &component.properties,
                })
            });
            match result {
                Ok(()) => {
                    self.component_counts[type_slot] += 1;
                    created += 1;
                }
                Err(source) => {
                    failure = Some(CollectionError::ComponentCreate {
                        component_id: component.id,
                        source,
                    });
                    break;
                }
            }
        }

        if let Some(err) = failure {
            warn!(%err, prototype = prototype.name(), "component creation failed, rolling back");
            self.destroy_components(index, &prototype, created);
            return Err(err);
        }
        Ok(())
    }

    /// Destroy the first `count` components of the instance.
    fn destroy_components(&mut self, index: u16, prototype: &Prototype, count: usize) {
        let slots = user_data_slots(&self.types, prototype);
        for (i, component) in prototype.components().iter().enumerate().take(count) {
            let type_slot = component.type_index.index();
            let Some(world) = self.worlds.get_mut(type_slot) else {
                continue;
            };
            with_context(&mut self.scene, index, i, component.id, slots[i], |mut ctx| {
                world.destroy(&mut ctx)
            });
            if let Some(live) = self.component_counts.get_mut(type_slot) {
                *live = live.saturating_sub(1);
            }
        }
    }

    fn apply_properties(
        &mut self,
        index: u16,
        overrides: &HashMap<u64, PropertySet>,
    ) -> Result<(), CollectionError> {
        let Some(prototype) = self.prototype_of(index) else {
            return Err(self.stale(index));
        };
        let slots = user_data_slots(&self.types, &prototype);
        for (i, component) in prototype.components().iter().enumerate() {
            let merged = match overrides.get(&component.id) {
                Some(overrides) => component.properties.merged(overrides),
                None => component.properties.clone(),
            };
            let Some(world) = self.worlds.get_mut(component.type_index.index()) else {
                continue;
            };
            let result = with_context(&mut self.scene, index, i, component.id, slots[i], |mut ctx| {
                world.set_properties(&mut ctx, &merged)
            });
            if let Err(source) = result {
                return Err(CollectionError::ComponentProperties {
                    component_id: component.id,
                    source,
                });
            }
        }
        Ok(())
    }

    fn init_instance(&mut self, index: u16) -> Result<(), CollectionError> {
        let Some(instance) = self.scene.slot_mut(index) else {
            return Err(self.stale(index));
        };
        if instance.flags.initialized {
            warn!(index, "instance is already initialized");
            return Ok(());
        }
        instance.flags.initialized = true;
        let prototype = Arc::clone(&instance.prototype);
        self.scene.refresh_world(index);

        let slots = user_data_slots(&self.types, &prototype);
        for (i, component) in prototype.components().iter().enumerate() {
            let Some(world) = self.worlds.get_mut(component.type_index.index()) else {
                continue;
            };
            let result = with_context(&mut self.scene, index, i, component.id, slots[i], |mut ctx| {
                world.init(&mut ctx)
            });
            if let Err(source) = result {
                return Err(CollectionError::ComponentInit {
                    component_id: component.id,
                    source,
                });
            }
        }
        Ok(())
    }

    /// Run finalize callbacks if the instance is initialized. `false` if any failed.
    pub(super) fn finalize_index(&mut self, index: u16) -> bool {
        let Some(instance) = self.scene.slot_mut(index) else {
            return true;
        };
        if !instance.flags.initialized {
            return true;
        }
        instance.flags.initialized = false;
        let prototype = Arc::clone(&instance.prototype);

        let slots = user_data_slots(&self.types, &prototype);
        let mut result = true;
        for (i, component) in prototype.components().iter().enumerate() {
            let Some(world) = self.worlds.get_mut(component.type_index.index()) else {
                continue;
            };
            let outcome = with_context(&mut self.scene, index, i, component.id, slots[i], |mut ctx| {
                world.finalize(&mut ctx)
            });
            if let Err(err) = outcome {
                warn!(%err, index, "component finalize failed");
                result = false;
            }
        }
        result
    }

    /// Propagate transforms, initialize every uninitialized instance, run the
    /// add pass and drain both sockets.
    pub fn init(&mut self) -> bool {
        if self.scene.in_update {
            error!("collection init requested during update");
            return false;
        }
        self.scene.propagate_transforms();

        let mut result = true;
        let indices: Vec<u16> = self.scene.pool.iter_allocated().map(|i| i as u16).collect();
        for index in indices {
            let pending = self
                .scene
                .slot(index)
                .is_some_and(|i| !i.flags.initialized && !i.flags.to_be_deleted);
            if !pending {
                continue;
            }
            if let Err(err) = self.init_instance(index) {
                warn!(%err, index, "instance failed to initialize");
                result = false;
            }
        }
        if !self.process_add_queue() {
            result = false;
        }
        if !self.dispatch_all() {
            result = false;
        }
        result
    }

    /// Finalize every initialized instance.
    pub fn finalize(&mut self) -> bool {
        let indices: Vec<u16> = self.scene.pool.iter_allocated().map(|i| i as u16).collect();
        let mut result = true;
        for index in indices {
            if !self.finalize_index(index) {
                result = false;
            }
        }
        result
    }

    /// Hand every queued instance to its components' `add_to_update`.
    pub(super) fn process_add_queue(&mut self) -> bool {
        if self.scene.in_update {
            error!("instances can not be added to update during the update");
            return false;
        }
        let mut result = true;
        while let Some(index) = self.scene.pop_add() {
            let Some(prototype) = self
                .scene
                .slot(index)
                .filter(|i| !i.flags.to_be_deleted)
                .map(|i| Arc::clone(&i.prototype))
            else {
                continue;
            };
            let slots = user_data_slots(&self.types, &prototype);
            for (i, component) in prototype.components().iter().enumerate() {
                let Some(world) = self.worlds.get_mut(component.type_index.index()) else {
                    continue;
                };
                let outcome = with_context(&mut self.scene, index, i, component.id, slots[i], |mut ctx| {
                    world.add_to_update(&mut ctx)
                });
                if let Err(err) = outcome {
                    warn!(%err, index, "component add_to_update failed");
                    result = false;
                    break;
                }
            }
        }
        result
    }
}
