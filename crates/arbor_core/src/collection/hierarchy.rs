//! Parent/child links, level buckets and deferred deletion requests

use super::queue::LifecycleQueue;
use super::{Scene, SceneError};
use crate::instance::{InstanceHandle, MAX_HIERARCHICAL_DEPTH};
use crate::transform::{compose, Transform};
use glam::Mat4;
use tracing::{debug, warn};

impl Scene {
    // ------------------------------------------------------------------
    // Level buckets
    // ------------------------------------------------------------------

    pub(crate) fn insert_level(&mut self, index: u16) {
        let Some(depth) = self.slot(index).map(|i| i.depth as usize) else {
            return;
        };
        let level = &mut self.levels[depth];
        let level_index = level.len() as u16;
        level.push(index);
        if let Some(instance) = self.slot_mut(index) {
            instance.level_index = level_index;
        }
    }

    /// O(1) removal: the bucket's last entry takes this slot.
    pub(crate) fn erase_level(&mut self, index: u16) {
        let Some((depth, level_index)) = self
            .slot(index)
            .map(|i| (i.depth as usize, i.level_index as usize))
        else {
            return;
        };
        let level = &mut self.levels[depth];
        debug_assert_eq!(
            level.get(level_index),
            Some(&index),
            "level bucket {depth} lost track of instance {index}"
        );
        if level.get(level_index) != Some(&index) {
            warn!(index, depth, level_index, "level bucket out of sync; instance left in place");
            return;
        }
        level.swap_remove(level_index);
        let moved = level.get(level_index).copied();
        if let Some(moved) = moved {
            if let Some(instance) = self.slot_mut(moved) {
                instance.level_index = level_index as u16;
            }
        }
    }

    pub(crate) fn move_to_depth(&mut self, index: u16, depth: u8) {
        self.erase_level(index);
        if let Some(instance) = self.slot_mut(index) {
            instance.depth = depth;
        }
        self.insert_level(index);
    }

    /// Bring every descendant's depth back to parent depth + 1.
    pub(crate) fn relevel_descendants(&mut self, index: u16) {
        let mut stack = self.children_of(index);
        while let Some(child) = stack.pop() {
            let parent_depth = self
                .slot(child)
                .and_then(|c| c.parent)
                .and_then(|p| self.slot(p))
                .map_or(0, |p| p.depth);
            self.move_to_depth(child, parent_depth + 1);
            stack.extend(self.children_of(child));
        }
    }

    // ------------------------------------------------------------------
    // Sibling lists
    // ------------------------------------------------------------------

    pub(crate) fn children_of(&self, index: u16) -> Vec<u16> {
        let mut children = Vec::new();
        let mut cursor = self.slot(index).and_then(|i| i.first_child);
        while let Some(child) = cursor {
            children.push(child);
            cursor = self.slot(child).and_then(|i| i.next_sibling);
        }
        children
    }

    /// Detach from the parent's child list. Depth and level are left alone.
    pub(crate) fn unlink(&mut self, index: u16) {
        let Some((parent, next)) = self.slot(index).map(|i| (i.parent, i.next_sibling)) else {
            return;
        };
        if let Some(parent) = parent {
            let first = self.slot(parent).and_then(|p| p.first_child);
            if first == Some(index) {
                if let Some(p) = self.slot_mut(parent) {
                    p.first_child = next;
                }
            } else {
                let mut cursor = first;
                while let Some(current) = cursor {
                    let after = self.slot(current).and_then(|i| i.next_sibling);
                    if after == Some(index) {
                        if let Some(c) = self.slot_mut(current) {
                            c.next_sibling = next;
                        }
                        break;
                    }
                    cursor = after;
                }
            }
        }
        if let Some(instance) = self.slot_mut(index) {
            instance.parent = None;
            instance.next_sibling = None;
        }
    }

    /// Append unlinked `children` to the end of `parent`'s child list, in order.
    pub(crate) fn append_children(&mut self, parent: u16, children: &[u16]) {
        let mut last = self.children_of(parent).last().copied();
        for &child in children {
            match last {
                Some(prev) => {
                    if let Some(p) = self.slot_mut(prev) {
                        p.next_sibling = Some(child);
                    }
                }
                None => {
                    if let Some(p) = self.slot_mut(parent) {
                        p.first_child = Some(child);
                    }
                }
            }
            if let Some(c) = self.slot_mut(child) {
                c.parent = Some(parent);
                c.next_sibling = None;
            }
            last = Some(child);
        }
    }

    fn is_ancestor_of(&self, ancestor: u16, index: u16) -> bool {
        let mut cursor = self.slot(index).and_then(|i| i.parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.slot(current).and_then(|i| i.parent);
        }
        false
    }

    /// Levels below `index` in its own subtree (0 for a leaf).
    fn subtree_height(&self, index: u16) -> usize {
        let mut height = 0;
        let mut stack: Vec<(u16, usize)> = vec![(index, 0)];
        while let Some((node, h)) = stack.pop() {
            height = height.max(h);
            stack.extend(self.children_of(node).into_iter().map(|c| (c, h + 1)));
        }
        height
    }

    // ------------------------------------------------------------------
    // Public hierarchy API
    // ------------------------------------------------------------------

    /// Move `child` under `parent` (prepended as first child), or to the root when `None`.
    ///
    /// With `keep_world_transform` the local transform is rewritten right away
    /// so the world transform survives the move.
    pub fn set_parent(
        &mut self,
        child: InstanceHandle,
        parent: Option<InstanceHandle>,
        keep_world_transform: bool,
    ) -> Result<(), SceneError> {
        let child_index = self.resolve(child)?;
        let parent_index = match parent {
            Some(parent) => Some(self.resolve(parent)?),
            None => None,
        };
        self.set_parent_index(child_index, parent_index, keep_world_transform)
    }

    pub(crate) fn set_parent_index(
        &mut self,
        child: u16,
        parent: Option<u16>,
        keep_world_transform: bool,
    ) -> Result<(), SceneError> {
        let current = self.slot(child).and_then(|i| i.parent);
        if parent.is_none() && current.is_none() {
            return Ok(());
        }

        if let Some(parent) = parent {
            let parent_depth = self.slot(parent).map_or(0, |p| p.depth as usize);
            if parent_depth + 1 >= MAX_HIERARCHICAL_DEPTH {
                return Err(SceneError::MaxDepthExceeded {
                    max: MAX_HIERARCHICAL_DEPTH,
                });
            }
            if parent == child || self.is_ancestor_of(child, parent) {
                return Err(SceneError::Cycle);
            }
            if parent_depth + 1 + self.subtree_height(child) >= MAX_HIERARCHICAL_DEPTH {
                return Err(SceneError::MaxDepthExceeded {
                    max: MAX_HIERARCHICAL_DEPTH,
                });
            }
        }

        if keep_world_transform {
            self.update_transforms();
            let parent_world = parent.map_or(Mat4::IDENTITY, |p| self.world_transforms[p as usize]);
            let world = self.world_transforms[child as usize];
            let scale_along_z = self.slot(child).is_some_and(|i| i.flags.scale_along_z);
            let local = compose(&parent_world.inverse(), &world, scale_along_z);
            if let Some(instance) = self.slot_mut(child) {
                instance.set_transform(Transform::from_matrix(&local));
            }
        }

        self.unlink(child);
        let new_depth = match parent {
            Some(parent) => {
                let first = self.slot(parent).and_then(|p| p.first_child);
                if let Some(instance) = self.slot_mut(child) {
                    instance.parent = Some(parent);
                    instance.next_sibling = first;
                }
                let parent_depth = match self.slot_mut(parent) {
                    Some(p) => {
                        p.first_child = Some(child);
                        p.depth
                    }
                    None => 0,
                };
                parent_depth + 1
            }
            None => 0,
        };
        self.move_to_depth(child, new_depth);
        self.relevel_descendants(child);
        self.dirty = true;
        Ok(())
    }

    pub fn parent(&self, handle: InstanceHandle) -> Option<InstanceHandle> {
        let index = self.resolve(handle).ok()?;
        self.slot(index)
            .and_then(|i| i.parent)
            .map(|p| self.handle_of(p))
    }

    /// Direct children, first child first.
    pub fn children(&self, handle: InstanceHandle) -> Vec<InstanceHandle> {
        match self.resolve(handle) {
            Ok(index) => self
                .children_of(index)
                .into_iter()
                .map(|c| self.handle_of(c))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn child_count(&self, handle: InstanceHandle) -> usize {
        self.resolve(handle)
            .map(|index| self.children_of(index).len())
            .unwrap_or(0)
    }

    /// Whether `child` is a direct child of `parent`.
    pub fn is_child_of(&self, child: InstanceHandle, parent: InstanceHandle) -> bool {
        match (self.resolve(child), self.resolve(parent)) {
            (Ok(child), Ok(parent)) => self.slot(child).and_then(|i| i.parent) == Some(parent),
            _ => false,
        }
    }

    pub fn depth(&self, handle: InstanceHandle) -> Option<usize> {
        let index = self.resolve(handle).ok()?;
        self.slot(index).map(|i| i.depth as usize)
    }

    /// Instances at `depth`, in bucket order.
    pub fn level(&self, depth: usize) -> Vec<InstanceHandle> {
        self.levels
            .get(depth)
            .map(|level| level.iter().map(|&i| self.handle_of(i)).collect())
            .unwrap_or_default()
    }

    pub fn roots(&self) -> Vec<InstanceHandle> {
        self.level(0)
    }

    // ------------------------------------------------------------------
    // Deletion requests
    // ------------------------------------------------------------------

    /// Queue `handle` for removal in the next `post_update`.
    ///
    /// Repeated requests are ignored. Bones go through `delete_bones`.
    pub fn delete(&mut self, handle: InstanceHandle, recursive: bool) -> Result<(), SceneError> {
        let index = self.resolve(handle)?;
        if self.slot(index).is_some_and(|i| i.flags.bone) {
            return Err(SceneError::BoneDeletion);
        }
        self.queue_delete(index, recursive);
        Ok(())
    }

    pub(crate) fn queue_delete(&mut self, index: u16, recursive: bool) {
        if self.is_marked() {
            return;
        }
        match self.slot(index) {
            Some(instance) if !instance.flags.to_be_deleted => {}
            _ => return,
        }
        if recursive {
            for child in self.children_of(index) {
                self.queue_delete(child, true);
            }
        }
        if let Some(instance) = self.slot_mut(index) {
            instance.flags.to_be_deleted = true;
        }
        self.queue_push(LifecycleQueue::Delete, index);
        debug!(index, recursive, "instance queued for deletion");
    }

    /// Queue every bone below `handle`, deepest bones first.
    pub fn delete_bones(&mut self, handle: InstanceHandle) -> Result<(), SceneError> {
        let index = self.resolve(handle)?;
        self.queue_bone_descendants(index);
        Ok(())
    }

    fn queue_bone_descendants(&mut self, index: u16) {
        for child in self.children_of(index) {
            let is_live_bone = self
                .slot(child)
                .is_some_and(|c| c.flags.bone && !c.flags.to_be_deleted);
            if is_live_bone {
                self.queue_bone_descendants(child);
                self.queue_delete(child, false);
            }
        }
    }

    /// Queue every live instance, bones included.
    pub fn delete_all(&mut self) {
        let indices: Vec<u16> = self.pool.iter_allocated().map(|i| i as u16).collect();
        for index in indices {
            self.queue_delete(index, false);
        }
    }

    /// Write `transforms` in pre-order over `root` and its bone descendants.
    ///
    /// Returns how many transforms were applied.
    pub fn set_bone_transforms(
        &mut self,
        root: InstanceHandle,
        transforms: &[Transform],
    ) -> Result<usize, SceneError> {
        let root = self.resolve(root)?;
        let mut written = 0;
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            let Some(transform) = transforms.get(written) else {
                break;
            };
            if let Some(instance) = self.slot_mut(index) {
                instance.set_transform(*transform);
            }
            written += 1;
            let bones: Vec<u16> = self
                .children_of(index)
                .into_iter()
                .filter(|&c| self.slot(c).is_some_and(|i| i.flags.bone))
                .collect();
            stack.extend(bones.into_iter().rev());
        }
        self.dirty = true;
        Ok(written)
    }
}
