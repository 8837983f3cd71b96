//! Scene: the instance arena of one collection
//!
//! Holds everything component callbacks are allowed to touch: slots,
//! hierarchy links, level buckets, world transforms, identifiers, the
//! deferred queues and the collection's message sockets.

use super::queue::{LifecycleQueue, QueueEnds};
use crate::hash::{hash_str, join_path};
use crate::instance::{Instance, InstanceHandle, MAX_HIERARCHICAL_DEPTH};
use crate::message::{Message, MessageError, MessageRouter, MessageSocket, Url};
use crate::pool::{IdentifierMinter, IndexPool};
use crate::prototype::Prototype;
use crate::transform::{matrix_scale, Transform};
use glam::{Mat4, Quat, Vec3};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("instance handle {0} is stale")]
    StaleHandle(InstanceHandle),

    #[error("collection is full ({capacity} instances)")]
    CapacityExhausted { capacity: usize },

    #[error("identifier {id:#018x} is already in use")]
    IdentifierInUse { id: u64 },

    #[error("instance already has an identifier")]
    IdentifierAlreadySet,

    #[error("reparenting would exceed the maximum hierarchy depth of {max}")]
    MaxDepthExceeded { max: usize },

    #[error("reparenting would make the instance its own ancestor")]
    Cycle,

    #[error("bone instances are deleted together with their owner")]
    BoneDeletion,

    #[error("collection is marked for deletion")]
    MarkedForDeletion,
}

pub(crate) struct SceneParams {
    pub(crate) name: String,
    pub(crate) max_instances: u32,
    pub(crate) router: MessageRouter,
    pub(crate) component_socket: MessageSocket,
    pub(crate) frame_socket: MessageSocket,
    pub(crate) scale_along_z: bool,
    pub(crate) parallel_threshold: usize,
}

pub struct Scene {
    name: String,
    name_hash: u64,
    pub(crate) pool: IndexPool,
    pub(crate) instances: Vec<Option<Instance>>,
    pub(crate) levels: Vec<Vec<u16>>,
    pub(crate) world_transforms: Vec<Mat4>,
    pub(crate) id_to_instance: HashMap<u64, u16>,
    minter: IdentifierMinter,
    pub(crate) add_queue: QueueEnds,
    pub(crate) delete_queue: QueueEnds,
    router: MessageRouter,
    component_socket: MessageSocket,
    frame_socket: MessageSocket,
    pub(crate) dirty: bool,
    pub(crate) in_update: bool,
    marked: Arc<AtomicBool>,
    scale_along_z: bool,
    pub(crate) parallel_threshold: usize,
}

impl Scene {
    pub(crate) fn new(params: SceneParams) -> Self {
        let capacity = params.max_instances as usize;
        let mut instances = Vec::with_capacity(capacity);
        instances.resize_with(capacity, || None);
        Self {
            name_hash: hash_str(&params.name),
            name: params.name,
            pool: IndexPool::new(params.max_instances),
            instances,
            levels: vec![Vec::new(); MAX_HIERARCHICAL_DEPTH],
            world_transforms: vec![Mat4::IDENTITY; capacity],
            id_to_instance: HashMap::new(),
            minter: IdentifierMinter::new(params.max_instances),
            add_queue: QueueEnds::default(),
            delete_queue: QueueEnds::default(),
            router: params.router,
            component_socket: params.component_socket,
            frame_socket: params.frame_socket,
            dirty: true,
            in_update: false,
            marked: Arc::new(AtomicBool::new(false)),
            scale_along_z: params.scale_along_z,
            parallel_threshold: params.parallel_threshold,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_hash(&self) -> u64 {
        self.name_hash
    }

    pub(crate) fn is_marked(&self) -> bool {
        self.marked.load(Ordering::Acquire)
    }

    pub(crate) fn mark(&self) {
        self.marked.store(true, Ordering::Release);
    }

    /// Shared view of the deletion mark, readable without the collection lock.
    pub(crate) fn deletion_mark(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.marked)
    }

    pub fn max_instances(&self) -> usize {
        self.pool.capacity()
    }

    pub fn instance_count(&self) -> usize {
        self.pool.len()
    }

    pub fn is_full(&self) -> bool {
        self.pool.remaining() == 0
    }

    pub fn contains(&self, handle: InstanceHandle) -> bool {
        self.resolve(handle).is_ok()
    }

    /// Live instances in slot order.
    pub fn instances(&self) -> Vec<InstanceHandle> {
        self.pool
            .iter_allocated()
            .map(|index| self.handle_of(index as u16))
            .collect()
    }

    pub fn minter(&self) -> &IdentifierMinter {
        &self.minter
    }

    pub fn transforms_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_transforms_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_updating(&self) -> bool {
        self.in_update
    }

    // ------------------------------------------------------------------
    // Slots
    // ------------------------------------------------------------------

    pub(crate) fn resolve(&self, handle: InstanceHandle) -> Result<u16, SceneError> {
        let index = handle.index();
        let live = (index as usize) < self.instances.len()
            && self.pool.is_allocated(index)
            && self.pool.generation(index) == handle.generation()
            && self.instances[index as usize].is_some();
        if live {
            Ok(index as u16)
        } else {
            Err(SceneError::StaleHandle(handle))
        }
    }

    #[inline]
    pub(crate) fn handle_of(&self, index: u16) -> InstanceHandle {
        InstanceHandle::new(index as u32, self.pool.generation(index as u32))
    }

    #[inline]
    pub(crate) fn slot(&self, index: u16) -> Option<&Instance> {
        self.instances.get(index as usize).and_then(Option::as_ref)
    }

    #[inline]
    pub(crate) fn slot_mut(&mut self, index: u16) -> Option<&mut Instance> {
        self.instances.get_mut(index as usize).and_then(Option::as_mut)
    }

    fn read<T>(&self, handle: InstanceHandle, f: impl FnOnce(&Instance) -> T) -> Option<T> {
        let index = self.resolve(handle).ok()?;
        self.slot(index).map(f)
    }

    /// Mutate a live instance and mark transforms dirty.
    fn modify(&mut self, handle: InstanceHandle, f: impl FnOnce(&mut Instance)) -> Result<(), SceneError> {
        let index = self.resolve(handle)?;
        if let Some(instance) = self.slot_mut(index) {
            f(instance);
        }
        self.dirty = true;
        Ok(())
    }

    /// Claim a slot, place it at the root level and queue it for the add pass.
    pub(crate) fn allocate(
        &mut self,
        prototype: Arc<Prototype>,
        user_data_words: usize,
    ) -> Result<u16, SceneError> {
        let index = self
            .pool
            .allocate()
            .map_err(|_| SceneError::CapacityExhausted {
                capacity: self.pool.capacity(),
            })? as u16;
        self.instances[index as usize] =
            Some(Instance::new(prototype, user_data_words, self.scale_along_z));
        self.world_transforms[index as usize] = Mat4::IDENTITY;
        self.insert_level(index);
        self.enqueue_add(index);
        self.dirty = true;
        Ok(index)
    }

    /// Create a component-less instance, typically a bone owned by a component.
    pub fn new_empty_instance(&mut self) -> Result<InstanceHandle, SceneError> {
        if self.is_marked() {
            return Err(SceneError::MarkedForDeletion);
        }
        let index = self.allocate(Prototype::empty(), 0)?;
        Ok(self.handle_of(index))
    }

    /// Put a freshly allocated spawn at its starting transform.
    pub(crate) fn place(&mut self, index: u16, transform: Transform, path_prefix: &str) {
        if let Some(instance) = self.slot_mut(index) {
            instance.set_transform(transform);
            instance.path_prefix = path_prefix.to_string();
        }
        self.world_transforms[index as usize] = transform.to_matrix();
        self.dirty = true;
    }

    /// Free a slot immediately, returning the prototype reference it held.
    ///
    /// Children move to the former parent (appended in order) or become roots.
    pub(crate) fn remove_instance(&mut self, index: u16) -> Option<Arc<Prototype>> {
        let (to_be_added, parent) = {
            let instance = self.slot(index)?;
            (instance.flags.to_be_added, instance.parent)
        };
        if to_be_added {
            self.queue_remove(LifecycleQueue::Add, index);
        }
        self.release_identifier(index);

        let children = self.children_of(index);
        self.unlink(index);
        self.erase_level(index);
        for &child in &children {
            if let Some(instance) = self.slot_mut(child) {
                instance.parent = None;
                instance.next_sibling = None;
            }
        }
        if let Some(parent) = parent {
            self.append_children(parent, &children);
        }
        let new_depth = parent
            .and_then(|p| self.slot(p))
            .map_or(0, |p| p.depth + 1);
        for &child in &children {
            self.move_to_depth(child, new_depth);
            self.relevel_descendants(child);
        }

        let instance = self.instances[index as usize].take()?;
        self.world_transforms[index as usize] = Mat4::IDENTITY;
        if let Err(err) = self.pool.release(index as u32) {
            warn!(index, %err, "failed to release instance slot");
        }
        self.dirty = true;
        Some(instance.prototype)
    }

    pub(crate) fn user_data_word(&self, index: u16, slot: usize) -> Option<usize> {
        self.slot(index)
            .and_then(|instance| instance.user_data.get(slot).copied())
    }

    pub(crate) fn set_user_data_word(&mut self, index: u16, slot: usize, value: usize) {
        if let Some(word) = self
            .slot_mut(index)
            .and_then(|instance| instance.user_data.get_mut(slot))
        {
            *word = value;
        }
    }

    pub fn prototype(&self, handle: InstanceHandle) -> Option<Arc<Prototype>> {
        self.read(handle, |i| Arc::clone(&i.prototype))
    }

    // ------------------------------------------------------------------
    // Identifiers
    // ------------------------------------------------------------------

    pub fn set_identifier(&mut self, handle: InstanceHandle, id: u64) -> Result<(), SceneError> {
        let index = self.resolve(handle)?;
        self.set_identifier_index(index, id)
    }

    pub(crate) fn set_identifier_index(&mut self, index: u16, id: u64) -> Result<(), SceneError> {
        if self.id_to_instance.contains_key(&id) {
            return Err(SceneError::IdentifierInUse { id });
        }
        let handle = self.handle_of(index);
        let instance = self
            .slot_mut(index)
            .ok_or(SceneError::StaleHandle(handle))?;
        if instance.identifier.is_some() {
            return Err(SceneError::IdentifierAlreadySet);
        }
        instance.identifier = Some(id);
        self.id_to_instance.insert(id, index);
        Ok(())
    }

    /// Give the instance the next minted identifier.
    pub(crate) fn assign_generated_identifier(&mut self, index: u16) -> Option<u64> {
        let (minted_index, id) = self.minter.mint()?;
        if let Some(instance) = self.slot_mut(index) {
            instance.identifier_index = Some(minted_index);
            instance.flags.generated_id = true;
        }
        Some(id)
    }

    pub(crate) fn release_identifier(&mut self, index: u16) {
        let Some(instance) = self.slot_mut(index) else {
            return;
        };
        let identifier = instance.identifier.take();
        let minted = instance.identifier_index.take();
        if let Some(id) = identifier {
            if self.id_to_instance.get(&id) == Some(&index) {
                self.id_to_instance.remove(&id);
            }
        }
        if let Some(minted) = minted {
            self.minter.release_index(minted);
        }
    }

    pub fn identifier(&self, handle: InstanceHandle) -> Option<u64> {
        self.read(handle, |i| i.identifier).flatten()
    }

    pub fn has_generated_identifier(&self, handle: InstanceHandle) -> bool {
        self.read(handle, |i| i.flags.generated_id).unwrap_or(false)
    }

    pub fn instance_by_identifier(&self, id: u64) -> Option<InstanceHandle> {
        self.index_of_identifier(id).map(|index| self.handle_of(index))
    }

    pub(crate) fn index_of_identifier(&self, id: u64) -> Option<u16> {
        self.id_to_instance.get(&id).copied()
    }

    /// Hash of `relative` resolved against the instance's path prefix.
    pub fn absolute_identifier(&self, handle: InstanceHandle, relative: &str) -> Option<u64> {
        self.read(handle, |i| hash_str(&join_path(&i.path_prefix, relative)))
    }

    // ------------------------------------------------------------------
    // Local transforms
    // ------------------------------------------------------------------

    pub fn local_transform(&self, handle: InstanceHandle) -> Option<Transform> {
        self.read(handle, |i| i.transform)
    }

    pub fn set_local_transform(&mut self, handle: InstanceHandle, transform: Transform) -> Result<(), SceneError> {
        self.modify(handle, |i| i.set_transform(transform))
    }

    pub fn position(&self, handle: InstanceHandle) -> Option<Vec3> {
        self.read(handle, |i| i.transform.translation)
    }

    pub fn set_position(&mut self, handle: InstanceHandle, position: Vec3) -> Result<(), SceneError> {
        self.modify(handle, |i| i.transform.translation = position)
    }

    pub fn rotation(&self, handle: InstanceHandle) -> Option<Quat> {
        self.read(handle, |i| i.transform.rotation)
    }

    pub fn set_rotation(&mut self, handle: InstanceHandle, rotation: Quat) -> Result<(), SceneError> {
        self.modify(handle, |i| {
            i.transform.rotation = rotation;
            i.sync_euler_from_rotation();
        })
    }

    pub fn scale(&self, handle: InstanceHandle) -> Option<Vec3> {
        self.read(handle, |i| i.transform.scale)
    }

    pub fn set_scale(&mut self, handle: InstanceHandle, scale: Vec3) -> Result<(), SceneError> {
        self.modify(handle, |i| i.transform.scale = scale)
    }

    pub fn uniform_scale(&self, handle: InstanceHandle) -> Option<f32> {
        self.read(handle, |i| i.transform.uniform_scale())
    }

    pub fn set_uniform_scale(&mut self, handle: InstanceHandle, scale: f32) -> Result<(), SceneError> {
        self.set_scale(handle, Vec3::splat(scale))
    }

    /// Euler angles in degrees.
    pub fn euler(&self, handle: InstanceHandle) -> Option<Vec3> {
        self.read(handle, |i| i.euler)
    }

    /// Takes effect on the next propagation pass.
    pub fn set_euler(&mut self, handle: InstanceHandle, degrees: Vec3) -> Result<(), SceneError> {
        self.modify(handle, |i| i.euler = degrees)
    }

    // ------------------------------------------------------------------
    // World transforms (valid as of the last propagation pass)
    // ------------------------------------------------------------------

    pub fn world_matrix(&self, handle: InstanceHandle) -> Option<Mat4> {
        let index = self.resolve(handle).ok()?;
        self.world_transforms.get(index as usize).copied()
    }

    pub fn world_transform(&self, handle: InstanceHandle) -> Option<Transform> {
        self.world_matrix(handle).map(|m| Transform::from_matrix(&m))
    }

    pub fn world_position(&self, handle: InstanceHandle) -> Option<Vec3> {
        self.world_matrix(handle).map(|m| m.w_axis.truncate())
    }

    pub fn world_rotation(&self, handle: InstanceHandle) -> Option<Quat> {
        self.world_transform(handle).map(|t| t.rotation)
    }

    pub fn world_scale(&self, handle: InstanceHandle) -> Option<Vec3> {
        self.world_matrix(handle).map(|m| matrix_scale(&m))
    }

    pub fn world_uniform_scale(&self, handle: InstanceHandle) -> Option<f32> {
        self.world_scale(handle).map(|s| s.min_element())
    }

    // ------------------------------------------------------------------
    // Flags
    // ------------------------------------------------------------------

    pub fn is_bone(&self, handle: InstanceHandle) -> bool {
        self.read(handle, |i| i.flags.bone).unwrap_or(false)
    }

    pub fn set_bone(&mut self, handle: InstanceHandle, bone: bool) -> Result<(), SceneError> {
        let index = self.resolve(handle)?;
        if let Some(instance) = self.slot_mut(index) {
            instance.flags.bone = bone;
        }
        Ok(())
    }

    pub fn scale_along_z(&self, handle: InstanceHandle) -> bool {
        self.read(handle, |i| i.flags.scale_along_z).unwrap_or(false)
    }

    pub fn set_scale_along_z(&mut self, handle: InstanceHandle, enabled: bool) -> Result<(), SceneError> {
        self.modify(handle, |i| i.flags.scale_along_z = enabled)
    }

    pub fn is_initialized(&self, handle: InstanceHandle) -> bool {
        self.read(handle, |i| i.flags.initialized).unwrap_or(false)
    }

    pub fn is_pending_delete(&self, handle: InstanceHandle) -> bool {
        self.read(handle, |i| i.flags.to_be_deleted).unwrap_or(false)
    }

    pub fn is_pending_add(&self, handle: InstanceHandle) -> bool {
        self.read(handle, |i| i.flags.to_be_added).unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Drained after every component type's update.
    pub fn component_socket(&self) -> &MessageSocket {
        &self.component_socket
    }

    /// Drained once per tick.
    pub fn frame_socket(&self) -> &MessageSocket {
        &self.frame_socket
    }

    /// Address of an identified instance on this collection's component socket.
    pub fn url(&self, handle: InstanceHandle) -> Option<Url> {
        let id = self.identifier(handle)?;
        Some(Url::instance(self.component_socket.name_hash(), id))
    }

    pub fn post(&self, message: Message) -> Result<(), MessageError> {
        self.router.post(message)
    }
}
