//! Instance handle and the per-slot instance record
//!
//! Handles are lightweight (8 bytes) and refer to a slot in a collection.
//! The generation counter catches handles that outlived their instance.

use crate::prototype::Prototype;
use crate::transform::{quat_to_euler, Transform};
use glam::Vec3;
use std::fmt;
use std::sync::Arc;

/// Levels 0..MAX_HIERARCHICAL_DEPTH are valid depths.
pub const MAX_HIERARCHICAL_DEPTH: usize = 128;

/// Slots are addressed with 15 bits; this is the largest collection capacity.
pub const MAX_INSTANCES: u32 = 0x7fff;

/// Instance handle (generation-indexed for safety)
///
/// Format: [32-bit index | 32-bit generation]
/// - Index: Slot in the owning collection
/// - Generation: Incremented when the slot is released
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct InstanceHandle {
    index: u32,
    generation: u32,
}

impl InstanceHandle {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Serialize to 64-bit integer (for component user data)
    pub fn to_bits(&self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Deserialize from 64-bit integer
    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstanceFlags {
    pub initialized: bool,
    pub scale_along_z: bool,
    pub bone: bool,
    pub generated_id: bool,
    pub to_be_deleted: bool,
    pub to_be_added: bool,
}

pub(crate) struct Instance {
    pub(crate) prototype: Arc<Prototype>,
    /// The prototype came from the resource source and goes back to it on removal.
    pub(crate) prototype_acquired: bool,
    pub(crate) transform: Transform,
    /// Degrees. Compared against `prev_euler` during propagation to pick up external edits.
    pub(crate) euler: Vec3,
    pub(crate) prev_euler: Vec3,
    pub(crate) identifier: Option<u64>,
    pub(crate) identifier_index: Option<u32>,
    pub(crate) path_prefix: String,
    pub(crate) depth: u8,
    pub(crate) level_index: u16,
    pub(crate) parent: Option<u16>,
    pub(crate) first_child: Option<u16>,
    pub(crate) next_sibling: Option<u16>,
    pub(crate) next_to_delete: Option<u16>,
    pub(crate) next_to_add: Option<u16>,
    pub(crate) flags: InstanceFlags,
    pub(crate) user_data: Box<[usize]>,
}

impl Instance {
    pub(crate) fn new(prototype: Arc<Prototype>, user_data_words: usize, scale_along_z: bool) -> Self {
        Self {
            prototype,
            prototype_acquired: false,
            transform: Transform::IDENTITY,
            euler: Vec3::ZERO,
            prev_euler: Vec3::ZERO,
            identifier: None,
            identifier_index: None,
            path_prefix: String::new(),
            depth: 0,
            level_index: 0,
            parent: None,
            first_child: None,
            next_sibling: None,
            next_to_delete: None,
            next_to_add: None,
            flags: InstanceFlags {
                scale_along_z,
                ..InstanceFlags::default()
            },
            user_data: vec![0; user_data_words].into_boxed_slice(),
        }
    }

    /// Set the local transform and resync the Euler shadow copy.
    pub(crate) fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.sync_euler_from_rotation();
    }

    pub(crate) fn sync_euler_from_rotation(&mut self) {
        self.euler = quat_to_euler(self.transform.rotation);
        self.prev_euler = self.euler;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_bits_round_trip() {
        let handle = InstanceHandle::new(513, 7);
        assert_eq!(InstanceHandle::from_bits(handle.to_bits()), handle);
        assert_eq!(handle.to_string(), "513v7");
    }
}
