use fixedbitset::FixedBitSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("index pool exhausted (capacity {capacity})")]
    Exhausted { capacity: usize },

    #[error("index {index} is out of bounds (capacity {capacity})")]
    IndexOutOfBounds { index: usize, capacity: usize },

    #[error("index {index} is not allocated")]
    NotAllocated { index: usize },
}

/// Fixed-capacity free-list allocator over dense slot indices.
///
/// Each slot carries a generation counter bumped on release, so a handle
/// that remembers `(index, generation)` can tell when its slot was recycled.
pub struct IndexPool {
    free: Vec<u32>,
    in_use: FixedBitSet,
    generations: Vec<u32>,
}

impl IndexPool {
    pub fn new(capacity: u32) -> Self {
        // Reversed so the lowest index is popped first.
        let free: Vec<u32> = (0..capacity).rev().collect();
        Self {
            free,
            in_use: FixedBitSet::with_capacity(capacity as usize),
            generations: vec![0; capacity as usize],
        }
    }

    pub fn allocate(&mut self) -> Result<u32, PoolError> {
        let index = self.free.pop().ok_or(PoolError::Exhausted {
            capacity: self.capacity(),
        })?;
        self.in_use.insert(index as usize);
        Ok(index)
    }

    pub fn release(&mut self, index: u32) -> Result<(), PoolError> {
        let slot = index as usize;
        if slot >= self.capacity() {
            return Err(PoolError::IndexOutOfBounds {
                index: slot,
                capacity: self.capacity(),
            });
        }
        if !self.in_use.contains(slot) {
            return Err(PoolError::NotAllocated { index: slot });
        }
        self.in_use.set(slot, false);
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free.push(index);
        Ok(())
    }

    #[inline]
    pub fn is_allocated(&self, index: u32) -> bool {
        self.in_use.contains(index as usize)
    }

    /// Generation of the slot; 0 for out-of-range indices.
    #[inline]
    pub fn generation(&self, index: u32) -> u32 {
        self.generations.get(index as usize).copied().unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.generations.len()
    }

    pub fn len(&self) -> usize {
        self.capacity() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining(&self) -> usize {
        self.free.len()
    }

    /// Allocated indices in ascending order.
    pub fn iter_allocated(&self) -> impl Iterator<Item = u32> + '_ {
        self.in_use.ones().map(|index| index as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_until_exhausted() {
        let mut pool = IndexPool::new(3);
        assert_eq!(pool.allocate(), Ok(0));
        assert_eq!(pool.allocate(), Ok(1));
        assert_eq!(pool.allocate(), Ok(2));
        assert_eq!(pool.allocate(), Err(PoolError::Exhausted { capacity: 3 }));
        assert_eq!(pool.remaining(), 0);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn release_recycles_and_bumps_generation() {
        let mut pool = IndexPool::new(2);
        let a = pool.allocate().unwrap();
        let _b = pool.allocate().unwrap();
        assert_eq!(pool.generation(a), 0);

        pool.release(a).unwrap();
        assert!(!pool.is_allocated(a));
        assert_eq!(pool.generation(a), 1);
        assert_eq!(pool.allocate(), Ok(a));
        assert_eq!(pool.iter_allocated().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn release_rejects_bad_indices() {
        let mut pool = IndexPool::new(2);
        assert_eq!(pool.release(0), Err(PoolError::NotAllocated { index: 0 }));
        assert_eq!(
            pool.release(5),
            Err(PoolError::IndexOutOfBounds {
                index: 5,
                capacity: 2
            })
        );
    }
}
