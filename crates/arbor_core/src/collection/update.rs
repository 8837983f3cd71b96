//! The per-tick pipeline: add pass, type-major update, message dispatch and
//! bounded delete passes

use super::lifecycle::{user_data_slots, with_context};
use super::queue::LifecycleQueue;
use super::Collection;
use crate::component::{UpdateContext, UpdateParams};
use crate::message::{Message, MessagePayload, MessageSocket, TransformResponse, TRANSFORM_RESPONSE};
use crate::prototype::Prototype;
use arbor_metrics::time_scope;
use std::sync::Arc;
use tracing::{error, trace, warn};

impl Collection {
    /// Run one update tick. Returns `false` if any callback failed; the tick
    /// still runs to the end.
    pub fn update(&mut self, context: &UpdateContext) -> bool {
        let mut result = self.process_add_queue();

        self.scene.in_update = true;
        let types = Arc::clone(&self.types);
        let component_socket = self.scene.component_socket().clone();
        for &type_index in types.update_order() {
            let Some(descriptor) = types.descriptor(type_index) else {
                continue;
            };
            if descriptor.needs_transforms() {
                self.scene.update_transforms();
            }
            let Some(world) = self.worlds.get_mut(type_index.index()) else {
                continue;
            };

            let scene = &mut self.scene;
            let (outcome, moved) = time_scope!(self.profiler, descriptor.name(), {
                let mut params = UpdateParams {
                    scene: &mut *scene,
                    context,
                    transforms_updated: false,
                };
                let outcome = world.update(&mut params);
                (outcome, params.transforms_updated)
            });
            if let Err(err) = outcome {
                warn!(%err, component_type = descriptor.name(), "component update failed");
                result = false;
            }
            if moved {
                self.scene.dirty = true;
            }
            if !self.dispatch_messages(std::slice::from_ref(&component_socket)) {
                result = false;
            }
        }
        self.scene.in_update = false;

        self.scene.update_transforms();
        self.counters.set("instances", self.scene.instance_count() as u64);
        result
    }

    /// Give every world its render callback, in update order.
    pub fn render(&mut self) -> bool {
        let mut result = true;
        let types = Arc::clone(&self.types);
        for &type_index in types.update_order() {
            let Some(world) = self.worlds.get_mut(type_index.index()) else {
                continue;
            };
            if let Err(err) = world.render(&mut self.scene) {
                warn!(%err, type_index = type_index.index(), "component render failed");
                result = false;
            }
        }
        result
    }

    /// Run post-update callbacks, then up to `max_delete_passes` delete passes.
    ///
    /// Each pass finalizes the batch, drains messages, then frees the batch.
    /// Deletions queued by finalizers land in the next pass.
    pub fn post_update(&mut self) -> bool {
        let mut result = true;
        let types = Arc::clone(&self.types);
        for &type_index in types.update_order() {
            let Some(world) = self.worlds.get_mut(type_index.index()) else {
                continue;
            };
            if let Err(err) = world.post_update(&mut self.scene) {
                warn!(%err, type_index = type_index.index(), "component post_update failed");
                result = false;
            }
        }

        let mut deleted = 0u64;
        let mut passes = 0;
        while passes < self.max_delete_passes && !self.scene.queue_is_empty(LifecycleQueue::Delete) {
            passes += 1;
            let batch = self.scene.queue_drain(LifecycleQueue::Delete);
            for &index in &batch {
                if !self.finalize_index(index) {
                    result = false;
                }
            }
            if !self.dispatch_all() {
                result = false;
            }
            for &index in &batch {
                self.remove(index);
            }
            deleted += batch.len() as u64;
        }

        if !self.scene.queue_is_empty(LifecycleQueue::Delete) {
            warn!(
                remaining = self.scene.pending_delete_count(),
                passes,
                "instances still queued for deletion after the last delete pass"
            );
        }
        if passes == 0 && !self.dispatch_all() {
            result = false;
        }
        self.counters.set("instances_deleted", deleted);
        result
    }

    /// Drain both of the collection's sockets.
    pub fn dispatch_all(&mut self) -> bool {
        let sockets = [
            self.scene.component_socket().clone(),
            self.scene.frame_socket().clone(),
        ];
        self.dispatch_messages(&sockets)
    }

    /// Drain `sockets` until they are empty or the iteration cap is hit.
    ///
    /// Messages posted by handlers are picked up by the next iteration.
    pub fn dispatch_messages(&mut self, sockets: &[MessageSocket]) -> bool {
        let mut result = true;
        for _ in 0..self.max_dispatch_iterations {
            if !sockets.iter().any(MessageSocket::has_messages) {
                return result;
            }
            self.scene.update_transforms();
            for socket in sockets {
                for message in socket.take_pending() {
                    if !self.dispatch_message(&message) {
                        result = false;
                    }
                }
            }
            self.scene.dirty = true;
        }
        if sockets.iter().any(MessageSocket::has_messages) {
            warn!(
                iterations = self.max_dispatch_iterations,
                "message dispatch stopped with messages still pending"
            );
        }
        result
    }

    fn dispatch_message(&mut self, message: &Message) -> bool {
        let Some(index) = self.scene.index_of_identifier(message.receiver.path) else {
            error!(
                socket = self.scene.name(),
                path = format_args!("{:#018x}", message.receiver.path),
                "message addressed to an unknown instance"
            );
            return false;
        };
        trace!(index, id = message.id, "dispatching message");

        if message.receiver.fragment == 0 {
            match &message.payload {
                MessagePayload::SetParent {
                    parent,
                    keep_world_transform,
                } => return self.handle_set_parent(index, *parent, *keep_world_transform),
                MessagePayload::RequestTransform => return self.respond_transform(index, message),
                _ => {}
            }
        }

        let Some(prototype) = self.prototype_of(index) else {
            return false;
        };
        let slots = user_data_slots(&self.types, &prototype);
        if message.receiver.fragment != 0 {
            let Some(component_index) = prototype.component_index(message.receiver.fragment) else {
                error!(
                    path = format_args!("{:#018x}", message.receiver.path),
                    fragment = format_args!("{:#018x}", message.receiver.fragment),
                    "message addressed to an unknown component"
                );
                return false;
            };
            return self.deliver(index, &prototype, &slots, component_index, message);
        }

        let mut result = true;
        for component_index in 0..prototype.components().len() {
            if !self.deliver(index, &prototype, &slots, component_index, message) {
                result = false;
            }
        }
        result
    }

    fn deliver(
        &mut self,
        index: u16,
        prototype: &Prototype,
        slots: &[Option<usize>],
        component_index: usize,
        message: &Message,
    ) -> bool {
        let component = &prototype.components()[component_index];
        let Some(world) = self.worlds.get_mut(component.type_index.index()) else {
            return false;
        };
        let outcome = with_context(
            &mut self.scene,
            index,
            component_index,
            component.id,
            slots[component_index],
            |mut ctx| world.on_message(&mut ctx, message),
        );
        if let Err(err) = outcome {
            warn!(%err, index, component_id = component.id, "component failed to handle message");
            return false;
        }
        true
    }

    fn handle_set_parent(&mut self, index: u16, parent: Option<u64>, keep_world_transform: bool) -> bool {
        let parent_index = match parent {
            None => None,
            Some(id) => {
                let found = self.scene.index_of_identifier(id);
                if found.is_none() {
                    warn!(
                        parent = format_args!("{:#018x}", id),
                        "set_parent names an unknown instance, detaching instead"
                    );
                }
                found
            }
        };
        match self.scene.set_parent_index(index, parent_index, keep_world_transform) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, index, "set_parent message rejected");
                false
            }
        }
    }

    fn respond_transform(&mut self, index: u16, request: &Message) -> bool {
        let handle = self.scene.handle_of(index);
        let (Some(local), Some(world)) = (
            self.scene.local_transform(handle),
            self.scene.world_transform(handle),
        ) else {
            return false;
        };
        let response = Message::new(
            request.receiver,
            request.sender,
            *TRANSFORM_RESPONSE,
            MessagePayload::TransformResponse(TransformResponse {
                position: local.translation,
                rotation: local.rotation,
                scale: local.scale,
                world_position: world.translation,
                world_rotation: world.rotation,
                world_scale: world.scale,
            }),
        );
        match self.scene.router().post(response) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "could not deliver transform response");
                false
            }
        }
    }
}
