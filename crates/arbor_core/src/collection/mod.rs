//! Collections: bounded arenas of hierarchical instances
//!
//! A `Collection` pairs a `Scene` (instances, hierarchy, transforms, queues)
//! with one `ComponentWorld` per registered component type. Keeping the two
//! apart lets component callbacks receive `&mut Scene` while their own world
//! is borrowed.

mod hierarchy;
mod lifecycle;
mod properties;
mod queue;
mod scene;
mod transform_system;
mod update;


pub use lifecycle::{CollectionDescription, InstanceDescription, SpawnParams};
pub use scene::{Scene, SceneError};

use crate::component::{
    ComponentError, ComponentTypeIndex, ComponentTypeRegistry, ComponentWorld, NewWorldParams,
};
use crate::config::EngineConfig;
use crate::instance::{InstanceHandle, MAX_INSTANCES};
use crate::message::{MessageError, MessageRouter};
use crate::prototype::{PrototypeSource, ResourceError};
use arbor_metrics::{Counters, ScopeProfiler};
use parking_lot::Mutex;
use scene::SceneParams;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Shared handle to a collection owned by the engine.
pub type CollectionRef = Arc<Mutex<Collection>>;

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("collection capacity {requested} exceeds the maximum of {max}")]
    CapacityTooLarge { requested: u32, max: u32 },

    #[error("collection is marked for deletion")]
    MarkedForDeletion,

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("prototype '{prototype}' uses unregistered component type {type_index}")]
    UnknownComponentType {
        prototype: String,
        type_index: ComponentTypeIndex,
    },

    #[error("component {component_id:#018x} failed to create: {source}")]
    ComponentCreate {
        component_id: u64,
        source: ComponentError,
    },

    #[error("component {component_id:#018x} rejected its properties: {source}")]
    ComponentProperties {
        component_id: u64,
        source: ComponentError,
    },

    #[error("component {component_id:#018x} failed to initialize: {source}")]
    ComponentInit {
        component_id: u64,
        source: ComponentError,
    },

    #[error("no identifiers left to name an instance")]
    IdentifierPoolExhausted,

    #[error("invalid collection description: {reason}")]
    InvalidDescription { reason: String },
}

pub(crate) struct CollectionParams<'a> {
    pub(crate) name: &'a str,
    pub(crate) max_instances: u32,
    pub(crate) types: Arc<ComponentTypeRegistry>,
    pub(crate) prototypes: Arc<dyn PrototypeSource>,
    pub(crate) router: MessageRouter,
    pub(crate) config: &'a EngineConfig,
}

pub struct Collection {
    scene: Scene,
    worlds: Vec<Box<dyn ComponentWorld>>,
    component_counts: Vec<u32>,
    types: Arc<ComponentTypeRegistry>,
    prototypes: Arc<dyn PrototypeSource>,
    max_delete_passes: u32,
    max_dispatch_iterations: u32,
    counters: Counters,
    profiler: ScopeProfiler,
    torn_down: bool,
}

impl Collection {
    pub(crate) fn new(params: CollectionParams<'_>) -> Result<Self, CollectionError> {
        if params.max_instances > MAX_INSTANCES {
            return Err(CollectionError::CapacityTooLarge {
                requested: params.max_instances,
                max: MAX_INSTANCES,
            });
        }

        let component_socket = params.router.new_socket(params.name)?;
        let frame_socket = match params.router.new_socket(&format!("{}_frame", params.name)) {
            Ok(socket) => socket,
            Err(err) => {
                params.router.delete_socket(component_socket.name_hash());
                return Err(err.into());
            }
        };

        let types = params.types;
        let worlds: Vec<Box<dyn ComponentWorld>> = (0..types.len())
            .filter_map(|i| {
                let type_index = ComponentTypeIndex::new(i as u8);
                types.component_type(type_index).map(|ty| {
                    ty.new_world(&NewWorldParams {
                        collection: params.name,
                        component_type: type_index,
                        max_instances: params.max_instances,
                    })
                })
            })
            .collect();

        let scene = Scene::new(SceneParams {
            name: params.name.to_string(),
            max_instances: params.max_instances,
            router: params.router,
            component_socket,
            frame_socket,
            scale_along_z: params.config.scale_along_z,
            parallel_threshold: params.config.parallel_level_threshold,
        });

        info!(
            name = params.name,
            max_instances = params.max_instances,
            component_types = worlds.len(),
            "collection created"
        );
        Ok(Self {
            scene,
            component_counts: vec![0; worlds.len()],
            worlds,
            types,
            prototypes: params.prototypes,
            max_delete_passes: params.config.max_delete_passes,
            max_dispatch_iterations: params.config.max_dispatch_iterations,
            counters: Counters::new(),
            profiler: ScopeProfiler::new(),
            torn_down: false,
        })
    }

    pub fn name(&self) -> &str {
        self.scene.name()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn component_types(&self) -> &Arc<ComponentTypeRegistry> {
        &self.types
    }

    pub fn world(&self, type_index: ComponentTypeIndex) -> Option<&dyn ComponentWorld> {
        self.worlds.get(type_index.index()).map(|w| w.as_ref())
    }

    pub fn world_mut(&mut self, type_index: ComponentTypeIndex) -> Option<&mut (dyn ComponentWorld + 'static)> {
        self.worlds.get_mut(type_index.index()).map(|w| w.as_mut())
    }

    /// Live components of `type_index` in this collection.
    pub fn component_count(&self, type_index: ComponentTypeIndex) -> u32 {
        self.component_counts
            .get(type_index.index())
            .copied()
            .unwrap_or(0)
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn profiler(&self) -> &ScopeProfiler {
        &self.profiler
    }

    pub fn reset_profiler(&mut self) {
        self.profiler.reset();
    }

    /// See `Scene::delete`.
    pub fn delete(&mut self, handle: InstanceHandle, recursive: bool) -> Result<(), SceneError> {
        self.scene.delete(handle, recursive)
    }

    /// See `Scene::set_parent`.
    pub fn set_parent(
        &mut self,
        child: InstanceHandle,
        parent: Option<InstanceHandle>,
        keep_world_transform: bool,
    ) -> Result<(), SceneError> {
        self.scene.set_parent(child, parent, keep_world_transform)
    }

    /// Flag the collection for teardown at the engine's next `post_update`.
    pub fn mark_for_deletion(&mut self) {
        self.scene.mark();
    }

    pub fn is_marked_for_deletion(&self) -> bool {
        self.scene.is_marked()
    }

    /// Finalize and remove everything, release the worlds and the sockets.
    pub(crate) fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.scene.mark();

        self.finalize();
        self.scene.discard_delete_queue();
        let indices: Vec<u16> = self.scene.pool.iter_allocated().map(|i| i as u16).collect();
        for index in indices {
            self.remove(index);
        }
        for world in &mut self.worlds {
            world.delete_world();
        }
        let router = self.scene.router().clone();
        router.delete_socket(self.scene.component_socket().name_hash());
        router.delete_socket(self.scene.frame_socket().name_hash());
        debug!(name = self.scene.name(), "collection torn down");
    }
}

impl Drop for Collection {
    fn drop(&mut self) {
        self.teardown();
    }
}
