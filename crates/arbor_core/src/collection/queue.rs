//! Intrusive add/delete queues threaded through instance slots

use super::Scene;
use crate::instance::Instance;

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct QueueEnds {
    pub(crate) head: Option<u16>,
    pub(crate) tail: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LifecycleQueue {
    Add,
    Delete,
}

impl LifecycleQueue {
    fn next(self, instance: &Instance) -> Option<u16> {
        match self {
            LifecycleQueue::Add => instance.next_to_add,
            LifecycleQueue::Delete => instance.next_to_delete,
        }
    }

    fn next_mut(self, instance: &mut Instance) -> &mut Option<u16> {
        match self {
            LifecycleQueue::Add => &mut instance.next_to_add,
            LifecycleQueue::Delete => &mut instance.next_to_delete,
        }
    }
}

impl Scene {
    fn ends(&self, queue: LifecycleQueue) -> QueueEnds {
        match queue {
            LifecycleQueue::Add => self.add_queue,
            LifecycleQueue::Delete => self.delete_queue,
        }
    }

    fn ends_mut(&mut self, queue: LifecycleQueue) -> &mut QueueEnds {
        match queue {
            LifecycleQueue::Add => &mut self.add_queue,
            LifecycleQueue::Delete => &mut self.delete_queue,
        }
    }

    fn set_next(&mut self, queue: LifecycleQueue, index: u16, next: Option<u16>) {
        if let Some(instance) = self.slot_mut(index) {
            *queue.next_mut(instance) = next;
        }
    }

    pub(crate) fn queue_is_empty(&self, queue: LifecycleQueue) -> bool {
        self.ends(queue).head.is_none()
    }

    pub(crate) fn queue_push(&mut self, queue: LifecycleQueue, index: u16) {
        self.set_next(queue, index, None);
        match self.ends(queue).tail {
            Some(tail) => self.set_next(queue, tail, Some(index)),
            None => self.ends_mut(queue).head = Some(index),
        }
        self.ends_mut(queue).tail = Some(index);
    }

    pub(crate) fn queue_pop(&mut self, queue: LifecycleQueue) -> Option<u16> {
        let head = self.ends(queue).head?;
        let next = self
            .slot_mut(head)
            .and_then(|instance| queue.next_mut(instance).take());
        let ends = self.ends_mut(queue);
        ends.head = next;
        if next.is_none() {
            ends.tail = None;
        }
        Some(head)
    }

    /// Unlink `index` wherever it sits, fixing the tail when it was last.
    pub(crate) fn queue_remove(&mut self, queue: LifecycleQueue, index: u16) -> bool {
        let mut prev: Option<u16> = None;
        let mut cursor = self.ends(queue).head;
        while let Some(current) = cursor {
            let next = self.slot(current).and_then(|instance| queue.next(instance));
            if current == index {
                match prev {
                    Some(prev) => self.set_next(queue, prev, next),
                    None => self.ends_mut(queue).head = next,
                }
                if self.ends(queue).tail == Some(index) {
                    self.ends_mut(queue).tail = prev;
                }
                self.set_next(queue, index, None);
                return true;
            }
            prev = Some(current);
            cursor = next;
        }
        false
    }

    /// Detach the whole queue, oldest first.
    pub(crate) fn queue_drain(&mut self, queue: LifecycleQueue) -> Vec<u16> {
        let mut drained = Vec::new();
        while let Some(index) = self.queue_pop(queue) {
            drained.push(index);
        }
        drained
    }

    pub(crate) fn enqueue_add(&mut self, index: u16) {
        match self.slot_mut(index) {
            Some(instance) if !instance.flags.to_be_added => instance.flags.to_be_added = true,
            _ => return,
        }
        self.queue_push(LifecycleQueue::Add, index);
    }

    /// Next instance waiting for the add pass, with its queued flag cleared.
    pub(crate) fn pop_add(&mut self) -> Option<u16> {
        let index = self.queue_pop(LifecycleQueue::Add)?;
        if let Some(instance) = self.slot_mut(index) {
            instance.flags.to_be_added = false;
        }
        Some(index)
    }

    /// Drop every pending deletion without processing it.
    pub(crate) fn discard_delete_queue(&mut self) {
        for index in self.queue_drain(LifecycleQueue::Delete) {
            if let Some(instance) = self.slot_mut(index) {
                instance.flags.to_be_deleted = false;
            }
        }
    }

    pub fn pending_add_count(&self) -> usize {
        self.queue_len(LifecycleQueue::Add)
    }

    pub fn pending_delete_count(&self) -> usize {
        self.queue_len(LifecycleQueue::Delete)
    }

    fn queue_len(&self, queue: LifecycleQueue) -> usize {
        let mut len = 0;
        let mut cursor = self.ends(queue).head;
        while let Some(index) = cursor {
            len += 1;
            cursor = self.slot(index).and_then(|instance| queue.next(instance));
        }
        len
    }
}
