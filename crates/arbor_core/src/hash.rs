//! 64-bit identifier hashing
//!
//! Every name the runtime compares at tick time (instance paths, component
//! ids, property and message names) is reduced to an xxh3 hash up front.

use xxhash_rust::xxh3::xxh3_64;

/// Separator between path segments of instance identifiers.
pub const PATH_SEPARATOR: char = '/';

#[inline]
pub fn hash_str(value: &str) -> u64 {
    xxh3_64(value.as_bytes())
}

#[inline]
pub fn hash_bytes(value: &[u8]) -> u64 {
    xxh3_64(value)
}

/// Identifier given to the `index`-th unnamed instance: `hash("/instance{index}")`.
pub fn instance_path_hash(index: u32) -> u64 {
    hash_str(&format!("{PATH_SEPARATOR}instance{index}"))
}

/// Join a relative identifier onto a path prefix, or keep it when it is already absolute.
pub fn join_path(prefix: &str, relative: &str) -> String {
    if relative.starts_with(PATH_SEPARATOR) {
        return relative.to_string();
    }
    let mut path = String::with_capacity(prefix.len() + relative.len() + 1);
    path.push_str(prefix);
    if !prefix.ends_with(PATH_SEPARATOR) {
        path.push(PATH_SEPARATOR);
    }
    path.push_str(relative);
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unnamed_identifiers_are_distinct() {
        assert_ne!(instance_path_hash(0), instance_path_hash(1));
        assert_eq!(instance_path_hash(7), hash_str("/instance7"));
    }

    #[test]
    fn join_respects_absolute_paths() {
        assert_eq!(join_path("/", "go"), "/go");
        assert_eq!(join_path("/collection0", "go"), "/collection0/go");
        assert_eq!(join_path("/collection0/", "/other"), "/other");
    }
}
