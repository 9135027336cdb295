use std::collections::{HashMap, HashSet};

#[cfg(feature = "ahash")]
pub type ARandomState = ahash::RandomState;
#[cfg(not(feature = "ahash"))]
pub type ARandomState = std::collections::hash_map::RandomState;

pub type AHashMap<K, V> = HashMap<K, V, ARandomState>;
pub type AHashSet<V> = HashSet<V, ARandomState>;

/// An AHashMap with space reserved for `capacity` entries.
pub fn map_with_capacity<K, V>(capacity: usize) -> AHashMap<K, V> {
    AHashMap::with_capacity_and_hasher(capacity, ARandomState::new())
}

/// An AHashSet with space reserved for `capacity` entries.
pub fn set_with_capacity<V>(capacity: usize) -> AHashSet<V> {
    AHashSet::with_capacity_and_hasher(capacity, ARandomState::new())
}
