//! Level-ordered world transform propagation
//!
//! Level `n` only reads level `n - 1`, so each level is computed as a flat
//! batch. Batches at or above the parallel threshold go through rayon.

use super::Scene;
use crate::instance::Instance;
use crate::transform::{compose, euler_to_quat};
use glam::Mat4;
use rayon::prelude::*;

impl Scene {
    /// Propagate only if something changed since the last pass.
    pub fn update_transforms(&mut self) {
        if self.dirty {
            self.propagate_transforms();
        }
    }

    pub(crate) fn propagate_transforms(&mut self) {
        let Scene {
            levels,
            instances,
            world_transforms,
            parallel_threshold,
            ..
        } = self;

        for level in levels.iter() {
            // A level is only populated when the one above it is.
            if level.is_empty() {
                break;
            }
            for &index in level {
                if let Some(instance) = instances[index as usize].as_mut() {
                    sync_euler(instance);
                }
            }

            let instances: &[Option<Instance>] = instances;
            if level.len() >= *parallel_threshold {
                let computed: Vec<Mat4> = {
                    let worlds: &[Mat4] = world_transforms;
                    level
                        .par_iter()
                        .map(|&index| world_of(instances, worlds, index))
                        .collect()
                };
                for (&index, world) in level.iter().zip(computed) {
                    world_transforms[index as usize] = world;
                }
            } else {
                for &index in level {
                    let world = world_of(instances, world_transforms, index);
                    world_transforms[index as usize] = world;
                }
            }
        }
        self.dirty = false;
    }

    /// Recompute one instance from its parent's current world transform.
    pub(crate) fn refresh_world(&mut self, index: u16) {
        if let Some(instance) = self.instances[index as usize].as_mut() {
            sync_euler(instance);
        }
        let world = world_of(&self.instances, &self.world_transforms, index);
        self.world_transforms[index as usize] = world;
    }
}

fn sync_euler(instance: &mut Instance) {
    if instance.euler != instance.prev_euler {
        instance.transform.rotation = euler_to_quat(instance.euler);
        instance.prev_euler = instance.euler;
    }
}

fn world_of(instances: &[Option<Instance>], world_transforms: &[Mat4], index: u16) -> Mat4 {
    let Some(instance) = instances[index as usize].as_ref() else {
        return Mat4::IDENTITY;
    };
    let local = instance.transform.to_matrix();
    match instance.parent {
        Some(parent) => compose(
            &world_transforms[parent as usize],
            &local,
            instance.flags.scale_along_z,
        ),
        None => local,
    }
}
