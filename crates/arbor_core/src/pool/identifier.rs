//! Identifier minting for unnamed instances and spawned collections

use super::IndexPool;
use crate::hash;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

/// Thread-safe source of generated instance identifiers.
///
/// Cloning shares the underlying pool; minting may happen off the tick thread.
#[derive(Clone)]
pub struct IdentifierMinter {
    inner: Arc<Mutex<MinterState>>,
}

struct MinterState {
    pool: IndexPool,
    collection_counter: u32,
}

impl IdentifierMinter {
    pub fn new(capacity: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MinterState {
                pool: IndexPool::new(capacity),
                collection_counter: 0,
            })),
        }
    }

    /// Take a free index; `None` once every index is handed out.
    pub fn acquire_index(&self) -> Option<u32> {
        self.inner.lock().pool.allocate().ok()
    }

    pub fn release_index(&self, index: u32) {
        if let Err(err) = self.inner.lock().pool.release(index) {
            warn!(index, %err, "failed to release instance identifier index");
        }
    }

    /// Acquire an index together with the identifier it maps to.
    pub fn mint(&self) -> Option<(u32, u64)> {
        self.acquire_index()
            .map(|index| (index, hash::instance_path_hash(index)))
    }

    /// Path prefix for the next spawned collection, e.g. `/collection3`.
    pub fn next_collection_path(&self) -> String {
        let mut state = self.inner.lock();
        let n = state.collection_counter;
        state.collection_counter = state.collection_counter.wrapping_add(1);
        format!("{}collection{n}", hash::PATH_SEPARATOR)
    }

    pub fn in_use(&self) -> usize {
        self.inner.lock().pool.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn minted_identifiers_follow_index() {
        let minter = IdentifierMinter::new(4);
        let (index, id) = minter.mint().unwrap();
        assert_eq!(index, 0);
        assert_eq!(id, hash::hash_str("/instance0"));

        minter.release_index(index);
        assert_eq!(minter.in_use(), 0);
    }

    #[test]
    fn collection_paths_increase() {
        let minter = IdentifierMinter::new(1);
        assert_eq!(minter.next_collection_path(), "/collection0");
        assert_eq!(minter.next_collection_path(), "/collection1");
    }

    #[test]
    fn minting_from_several_threads_never_duplicates() {
        let minter = IdentifierMinter::new(64);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let minter = minter.clone();
                thread::spawn(move || {
                    (0..16)
                        .filter_map(|_| minter.acquire_index())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 64);
        assert!(minter.acquire_index().is_none());
    }
}
