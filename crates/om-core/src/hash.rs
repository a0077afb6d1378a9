//! Fast hash map and hash set type aliases.
//!
//! The engine's hot maps are keyed by small integers: shape ids, object
//! identities and type pairs. The Fx hash from `rustc-hash` is much cheaper
//! than SipHash for such keys, and denial-of-service resistance is irrelevant
//! for process-local tables.
//!
//! # Examples
//!
//! ```
//! use om_core::{FxHashMap, ShapeId, fx_hash_map_with_capacity};
//!
//! let mut names: FxHashMap<ShapeId, &str> = fx_hash_map_with_capacity(8);
//! names.insert(ShapeId::new(3), "i32");
//! assert_eq!(names.get(&ShapeId::new(3)), Some(&"i32"));
//! ```

/// A [`HashMap`](std::collections::HashMap) using the Fx hash algorithm.
pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// A [`HashSet`](std::collections::HashSet) using the Fx hash algorithm.
pub type FxHashSet<V> = rustc_hash::FxHashSet<V>;

/// Creates a new [`FxHashMap`] with the specified capacity.
#[inline]
#[must_use]
pub fn fx_hash_map_with_capacity<K, V>(capacity: usize) -> FxHashMap<K, V> {
    FxHashMap::with_capacity_and_hasher(capacity, rustc_hash::FxBuildHasher)
}

/// Creates a new [`FxHashSet`] with the specified capacity.
#[inline]
#[must_use]
pub fn fx_hash_set_with_capacity<V>(capacity: usize) -> FxHashSet<V> {
    FxHashSet::with_capacity_and_hasher(capacity, rustc_hash::FxBuildHasher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fx_hash_map_with_capacity() {
        let map: FxHashMap<(u32, u32), usize> = fx_hash_map_with_capacity(100);
        assert!(map.capacity() >= 100);
    }

    #[test]
    fn test_fx_hash_set_with_capacity() {
        let mut set: FxHashSet<usize> = fx_hash_set_with_capacity(4);
        assert!(set.insert(1));
        assert!(!set.insert(1));
    }
}
