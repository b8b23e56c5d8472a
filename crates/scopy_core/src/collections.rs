//! Collection aliases used throughout the workspace.
//!
//! Keys are interned names, type ids, or dense indices, so DoS-resistant
//! hashing buys nothing; everything hashes with FxHash.

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;

/// A set that uses FxHash for fast hashing.
pub type FxHashSet<T> = rustc_hash::FxHashSet<T>;

/// Re-export FxHashMap for convenience.
pub type FxMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// A sharded concurrent map hashed with FxHash.
///
/// Used for frame bindings and for the analyzer's summary cache, both of which
/// rely on `entry(..).or_insert(..)` for insert-if-absent semantics.
pub type FxDashMap<K, V> = DashMap<K, V, FxBuildHasher>;

/// Create an empty [`FxDashMap`].
pub fn fx_dashmap<K, V>() -> FxDashMap<K, V>
where
    K: Eq + std::hash::Hash,
{
    DashMap::with_hasher(FxBuildHasher)
}
