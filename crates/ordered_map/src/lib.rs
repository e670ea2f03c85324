//! AVL ordered map over an index arena.
//!
//! Nodes keep parent links, so successor/predecessor and rebalancing walk
//! upward without a stack. Keys are compared, built and released through a
//! [`MapPolicy`].

mod arena;
mod avl;
mod balance;
mod error;
mod policy;

pub use arena::Handle;
pub use avl::AvlTreeMap;
pub use error::MapError;
pub use policy::{MapPolicy, OrdPolicy, ReverseOrdPolicy};

/// Map keyed by `K: Ord` with identity construction.
pub type OrdTreeMap<K, V> = AvlTreeMap<OrdPolicy<K, V>>;
