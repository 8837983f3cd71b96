//! Engine: component registry, prototype source, router and the collection list
//!
//! The collection list is the one piece of engine state shared across
//! threads, so it sits behind a mutex. Each collection is itself behind its
//! own lock and is only ticked from one thread at a time. The list lock is
//! never held while a collection lock is taken, so a tick thread holding a
//! collection may call back into the engine.

use crate::collection::{Collection, CollectionError, CollectionParams, CollectionRef};
use crate::component::ComponentTypeRegistry;
use crate::config::{ConfigError, EngineConfig};
use crate::instance::MAX_INSTANCES;
use crate::message::MessageRouter;
use crate::prototype::PrototypeSource;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// A registered collection with the fields the engine reads without
/// taking the collection's own lock.
struct CollectionEntry {
    name_hash: u64,
    marked: Arc<AtomicBool>,
    collection: CollectionRef,
}

impl CollectionEntry {
    fn is_marked(&self) -> bool {
        self.marked.load(Ordering::Acquire)
    }
}

struct EngineState {
    collections: Vec<CollectionEntry>,
    default_capacity: u32,
}

pub struct Engine {
    config: EngineConfig,
    types: Arc<ComponentTypeRegistry>,
    prototypes: Arc<dyn PrototypeSource>,
    router: MessageRouter,
    state: Mutex<EngineState>,
}

impl Engine {
    /// Validate `config` and freeze the registry in priority order.
    pub fn new(
        config: EngineConfig,
        mut registry: ComponentTypeRegistry,
        prototypes: Arc<dyn PrototypeSource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        registry.sort_by_priority();
        info!(
            component_types = registry.len(),
            default_capacity = config.collection_max_instances,
            "engine created"
        );
        Ok(Self {
            state: Mutex::new(EngineState {
                collections: Vec::new(),
                default_capacity: config.collection_max_instances,
            }),
            config,
            types: Arc::new(registry),
            prototypes,
            router: MessageRouter::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn component_types(&self) -> &Arc<ComponentTypeRegistry> {
        &self.types
    }

    pub fn prototypes(&self) -> &Arc<dyn PrototypeSource> {
        &self.prototypes
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Create a collection; `None` uses the default capacity.
    ///
    /// Nothing is registered when creation fails.
    pub fn new_collection(&self, name: &str, capacity: Option<u32>) -> Result<CollectionRef, CollectionError> {
        let mut state = self.state.lock();
        let collection = Collection::new(CollectionParams {
            name,
            max_instances: capacity.unwrap_or(state.default_capacity),
            types: Arc::clone(&self.types),
            prototypes: Arc::clone(&self.prototypes),
            router: self.router.clone(),
            config: &self.config,
        })?;
        let name_hash = collection.scene().name_hash();
        let marked = collection.scene().deletion_mark();
        let collection = Arc::new(Mutex::new(collection));
        state.collections.push(CollectionEntry {
            name_hash,
            marked,
            collection: Arc::clone(&collection),
        });
        Ok(collection)
    }

    /// Mark `collection` for teardown at the next `post_update`.
    pub fn delete_collection(&self, collection: &CollectionRef) {
        let state = self.state.lock();
        if let Some(entry) = state
            .collections
            .iter()
            .find(|entry| Arc::ptr_eq(&entry.collection, collection))
        {
            entry.marked.store(true, Ordering::Release);
        }
    }

    /// Tear down every marked collection. Returns how many were removed.
    pub fn post_update(&self) -> usize {
        let doomed: Vec<CollectionRef> = {
            let mut state = self.state.lock();
            let (doomed, kept): (Vec<_>, Vec<_>) = state
                .collections
                .drain(..)
                .partition(|entry| entry.is_marked());
            state.collections = kept;
            doomed
                .into_iter()
                .map(|entry| entry.collection)
                .collect()
        };
        for collection in &doomed {
            let mut collection = collection.lock();
            debug!(name = collection.name(), "deleting collection");
            collection.teardown();
        }
        doomed.len()
    }

    pub fn set_default_collection_capacity(&self, capacity: u32) -> Result<(), ConfigError> {
        if capacity > MAX_INSTANCES {
            return Err(ConfigError::CapacityTooLarge {
                requested: capacity,
                max: MAX_INSTANCES,
            });
        }
        self.state.lock().default_capacity = capacity;
        Ok(())
    }

    pub fn default_collection_capacity(&self) -> u32 {
        self.state.lock().default_capacity
    }

    /// Live collections in creation order.
    pub fn collections(&self) -> Vec<CollectionRef> {
        self.state
            .lock()
            .collections
            .iter()
            .map(|entry| Arc::clone(&entry.collection))
            .collect()
    }

    pub fn find_collection(&self, name_hash: u64) -> Option<CollectionRef> {
        self.state
            .lock()
            .collections
            .iter()
            .find(|entry| entry.name_hash == name_hash)
            .map(|entry| Arc::clone(&entry.collection))
    }

    pub fn collection_count(&self) -> usize {
        self.state.lock().collections.len()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let collections = std::mem::take(&mut self.state.get_mut().collections);
        for entry in collections {
            entry.collection.lock().teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentTypeDescriptor, ComponentWorld, NewWorldParams};
    use crate::hash::hash_str;
    use crate::prototype::{Prototype, PrototypeComponent, PrototypeLibrary};

    struct Quiet;

    impl ComponentWorld for Quiet {}

    fn engine() -> Engine {
        let mut registry = ComponentTypeRegistry::new();
        registry
            .register(
                ComponentTypeDescriptor::new("quiet"),
                |_: &NewWorldParams<'_>| -> Box<dyn ComponentWorld> { Box::new(Quiet) },
            )
            .unwrap();
        Engine::new(
            EngineConfig::default(),
            registry,
            Arc::new(PrototypeLibrary::new()),
        )
        .unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig {
            max_delete_passes: 0,
            ..EngineConfig::default()
        };
        let result = Engine::new(
            config,
            ComponentTypeRegistry::new(),
            Arc::new(PrototypeLibrary::new()),
        );
        assert!(matches!(result, Err(ConfigError::NoDeletePasses)));
    }

    #[test]
    fn failed_creation_adds_nothing() {
        let engine = engine();
        engine.new_collection("main", None).unwrap();

        assert!(matches!(
            engine.new_collection("big", Some(MAX_INSTANCES + 1)),
            Err(CollectionError::CapacityTooLarge { .. })
        ));
        assert!(matches!(
            engine.new_collection("main", Some(8)),
            Err(CollectionError::Message(_))
        ));
        assert_eq!(engine.collection_count(), 1);
        assert_eq!(engine.router().socket_count(), 2);
    }

    #[test]
    fn default_capacity_applies_to_new_collections() {
        let engine = engine();
        assert_eq!(engine.default_collection_capacity(), 1024);
        engine.set_default_collection_capacity(16).unwrap();
        assert!(engine
            .set_default_collection_capacity(MAX_INSTANCES + 1)
            .is_err());

        let collection = engine.new_collection("small", None).unwrap();
        assert_eq!(collection.lock().scene().max_instances(), 16);
    }

    #[test]
    fn deleted_collections_are_reaped_in_post_update() {
        let engine = engine();
        let _a = engine.new_collection("a", Some(8)).unwrap();
        let b = engine.new_collection("b", Some(8)).unwrap();
        let c = engine.new_collection("c", Some(8)).unwrap();
        let ty = engine.component_types().find("quiet").unwrap();
        let prototype = Arc::new(
            Prototype::builder("thing")
                .component(PrototypeComponent::new("main", ty))
                .build()
                .unwrap(),
        );
        b.lock().new_instance(prototype).unwrap();

        engine.delete_collection(&b);
        assert_eq!(engine.collection_count(), 3);
        assert_eq!(engine.post_update(), 1);

        let names: Vec<String> = engine
            .collections()
            .iter()
            .map(|c| c.lock().name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(b.lock().scene().instance_count(), 0);
        assert_eq!(b.lock().component_count(ty), 0);
        assert_eq!(engine.router().socket_count(), 4);
        assert!(engine.find_collection(hash_str("b")).is_none());
        assert!(Arc::ptr_eq(
            &engine.find_collection(hash_str("c")).unwrap(),
            &c
        ));
    }

    #[test]
    fn engine_calls_do_not_lock_collections() {
        let engine = Arc::new(engine());
        let main = engine.new_collection("main", Some(4)).unwrap();
        engine.new_collection("other", Some(4)).unwrap();

        let guard = main.lock();
        let (tx, rx) = std::sync::mpsc::channel();
        let worker = {
            let engine = Arc::clone(&engine);
            let main = Arc::clone(&main);
            std::thread::spawn(move || {
                let found = engine.find_collection(hash_str("other")).is_some();
                let listed = engine.collections().len();
                engine.delete_collection(&main);
                let count = engine.collection_count();
                tx.send((found, listed, count)).unwrap();
            })
        };
        let result = rx.recv_timeout(std::time::Duration::from_secs(5));
        assert!(guard.is_marked_for_deletion());
        drop(guard);
        worker.join().unwrap();
        assert_eq!(result.unwrap(), (true, 2, 2));

        assert_eq!(engine.post_update(), 1);
        assert!(engine.find_collection(hash_str("main")).is_none());
    }

    #[test]
    fn collection_marked_from_inside_is_reaped() {
        let engine = engine();
        let main = engine.new_collection("main", Some(4)).unwrap();
        {
            let mut guard = main.lock();
            guard.mark_for_deletion();
            assert!(engine.find_collection(hash_str("main")).is_some());
            assert_eq!(engine.collection_count(), 1);
        }
        assert_eq!(engine.post_update(), 1);
        assert_eq!(engine.collection_count(), 0);
    }

    #[test]
    fn dropping_the_engine_tears_down_collections() {
        let engine = engine();
        let router = engine.router().clone();
        let collection = engine.new_collection("main", Some(4)).unwrap();
        collection
            .lock()
            .scene_mut()
            .new_empty_instance()
            .unwrap();

        drop(engine);
        assert_eq!(router.socket_count(), 0);
        assert_eq!(collection.lock().scene().instance_count(), 0);
    }
}
