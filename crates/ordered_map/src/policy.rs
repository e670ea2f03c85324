use std::cmp::Ordering;
use std::marker::PhantomData;

/// Construction, release and ordering of the entries stored in an
/// [`AvlTreeMap`](crate::AvlTreeMap).
///
/// Every function is static: the policy is chosen once, as a type
/// parameter, and can't change for the lifetime of the map.
pub trait MapPolicy {
    type KeySource;
    type Key;
    type ValueSource;
    type Value;

    fn make_key(source: Self::KeySource) -> Self::Key;
    fn make_value(source: Self::ValueSource) -> Self::Value;

    /// Called exactly once for every key the map stops owning.
    fn release_key(key: Self::Key) {
        drop(key);
    }

    /// Called exactly once for every value the map stops owning.
    fn release_value(value: Self::Value) {
        drop(value);
    }

    /// Three-way comparison. Must be a total order that doesn't change while
    /// keys are stored.
    fn compare(a: &Self::Key, b: &Self::Key) -> Ordering;
}

/// Identity construction and the key's own `Ord`.
pub struct OrdPolicy<K, V>(PhantomData<fn() -> (K, V)>);

impl<K: Ord, V> MapPolicy for OrdPolicy<K, V> {
    type KeySource = K;
    type Key = K;
    type ValueSource = V;
    type Value = V;

    fn make_key(source: K) -> K {
        source
    }

    fn make_value(source: V) -> V {
        source
    }

    fn compare(a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Orders keys by `Ord` in reverse.
pub struct ReverseOrdPolicy<K, V>(PhantomData<fn() -> (K, V)>);

impl<K: Ord, V> MapPolicy for ReverseOrdPolicy<K, V> {
    type KeySource = K;
    type Key = K;
    type ValueSource = V;
    type Value = V;

    fn make_key(source: K) -> K {
        source
    }

    fn make_value(source: V) -> V {
        source
    }

    fn compare(a: &K, b: &K) -> Ordering {
        b.cmp(a)
    }
}
