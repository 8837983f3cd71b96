//! Slot allocation
//!
//! `IndexPool` hands out dense slot indices with per-slot generations;
//! `IdentifierMinter` builds on it to name instances that were spawned
//! without an explicit identifier.

mod identifier;
mod index_pool;

pub use identifier::IdentifierMinter;
pub use index_pool::{IndexPool, PoolError};
