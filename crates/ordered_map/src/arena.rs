use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::MapError;

/// Largest number of slots; `u32::MAX` itself is reserved for [`Id::NIL`].
const MAX_SLOTS: usize = u32::MAX as usize;

/// Source of per-arena owner stamps.
static NEXT_OWNER: AtomicU64 = AtomicU64::new(0);

#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Id(u32);

impl Id {
    pub(crate) const NIL: Self = Self(u32::MAX);

    #[inline(always)]
    pub(crate) fn is_nil(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline(always)]
    pub(crate) fn idx(self) -> usize {
        self.0 as usize
    }
}

#[inline(always)]
fn id(v: usize) -> Id {
    debug_assert!(v < MAX_SLOTS);
    Id(v as u32)
}

/// Stable reference to one stored entry.
///
/// Rotations never move entries between slots, so a handle keeps pointing at
/// the same key until that key is removed. Slot reuse bumps the generation,
/// which makes handles to removed entries stale instead of aliasing whatever
/// is stored in the slot next; a slot whose generation is exhausted is
/// retired rather than reused.
///
/// A handle also carries a stamp of the map that issued it and never
/// resolves in any other map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    owner: u64,
    id: Id,
    generation: u32,
}

pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) parent: Id,
    pub(crate) left: Id,
    pub(crate) right: Id,
    pub(crate) height: u32,
}

impl<K, V> Node<K, V> {
    fn new(key: K, value: V) -> Self {
        Self {
            key,
            value,
            parent: Id::NIL,
            left: Id::NIL,
            right: Id::NIL,
            height: 1,
        }
    }
}

enum State<K, V> {
    Occupied(Node<K, V>),
    Vacant { next_free: Id },
}

struct Slot<K, V> {
    generation: u32,
    state: State<K, V>,
}

/// Slot storage for tree nodes with an intrusive free list.
pub(crate) struct Arena<K, V> {
    slots: Vec<Slot<K, V>>,
    free_head: Id,
    owner: u64,
}

impl<K, V> Arena<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: Id::NIL,
            owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Makes sure the next [`Arena::alloc`] won't need to grow the storage.
    pub(crate) fn try_reserve_one(&mut self) -> Result<(), MapError> {
        if !self.free_head.is_nil() {
            return Ok(());
        }
        if self.slots.len() >= MAX_SLOTS {
            return Err(MapError::CapacityExceeded(self.slots.len()));
        }
        self.slots.try_reserve(1)?;
        Ok(())
    }

    pub(crate) fn alloc(&mut self, key: K, value: V) -> Id {
        let node = Node::new(key, value);
        if self.free_head.is_nil() {
            let x = id(self.slots.len());
            self.slots.push(Slot {
                generation: 0,
                state: State::Occupied(node),
            });
            return x;
        }

        let x = self.free_head;
        let slot = &mut self.slots[x.idx()];
        self.free_head = match slot.state {
            State::Vacant { next_free } => next_free,
            State::Occupied(_) => unreachable!("free list points at occupied slot {x:?}"),
        };
        slot.state = State::Occupied(node);
        x
    }

    /// Frees the slot of `x` and hands back its key and value.
    ///
    /// A slot already at the last generation stays vacant for good, so old
    /// handles to it can't match again after the counter would wrap.
    pub(crate) fn release(&mut self, x: Id) -> (K, V) {
        let slot = &mut self.slots[x.idx()];
        let retire = slot.generation == u32::MAX;
        let next_free = if retire { Id::NIL } else { self.free_head };
        let state = std::mem::replace(&mut slot.state, State::Vacant { next_free });
        let State::Occupied(node) = state else {
            unreachable!("double release of slot {x:?}");
        };
        if !retire {
            slot.generation += 1;
            self.free_head = x;
        }
        (node.key, node.value)
    }

    #[inline]
    pub(crate) fn node(&self, x: Id) -> &Node<K, V> {
        debug_assert!(!x.is_nil());
        match &self.slots[x.idx()].state {
            State::Occupied(node) => node,
            State::Vacant { .. } => unreachable!("vacant slot {x:?} is linked into the tree"),
        }
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, x: Id) -> &mut Node<K, V> {
        debug_assert!(!x.is_nil());
        match &mut self.slots[x.idx()].state {
            State::Occupied(node) => node,
            State::Vacant { .. } => unreachable!("vacant slot {x:?} is linked into the tree"),
        }
    }

    pub(crate) fn handle(&self, x: Id) -> Handle {
        Handle {
            owner: self.owner,
            id: x,
            generation: self.slots[x.idx()].generation,
        }
    }

    /// Maps a handle back to its node, or `None` if the entry is gone or the
    /// handle came from another arena.
    pub(crate) fn resolve(&self, handle: Handle) -> Option<Id> {
        if handle.owner != self.owner {
            return None;
        }
        let slot = self.slots.get(handle.id.idx())?;
        match slot.state {
            State::Occupied(_) if slot.generation == handle.generation => Some(handle.id),
            _ => None,
        }
    }
}
