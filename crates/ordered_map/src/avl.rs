use std::cmp::Ordering;
use std::marker::PhantomData;

use tracing::{debug, trace};

use crate::arena::{Arena, Handle, Id};
use crate::balance::{fix_up, height, replace_child};
use crate::error::MapError;
use crate::policy::MapPolicy;

/// Height-balanced ordered map with parent-linked nodes.
///
/// - Keys are unique. Inserting a key that is already present keeps the
///   stored entry and discards the new one.
/// - Entries are addressed by [`Handle`]s, which survive rebalancing.
/// - Construction, release and ordering of keys and values come from the
///   policy `P`.
pub struct AvlTreeMap<P: MapPolicy> {
    arena: Arena<P::Key, P::Value>,
    root: Id,
    len: usize,
    _policy: PhantomData<fn() -> P>,
}

impl<P: MapPolicy> AvlTreeMap<P> {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: Id::NIL,
            len: 0,
            _policy: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_nil()
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn height(&self) -> usize {
        height(&self.arena, self.root) as usize
    }

    fn find(&self, key: &P::Key) -> Id {
        let mut cur = self.root;
        while !cur.is_nil() {
            let node = self.arena.node(cur);
            match P::compare(key, &node.key) {
                Ordering::Less => cur = node.left,
                Ordering::Greater => cur = node.right,
                Ordering::Equal => return cur,
            }
        }
        Id::NIL
    }

    fn handle_of(&self, x: Id) -> Option<Handle> {
        (!x.is_nil()).then(|| self.arena.handle(x))
    }

    #[track_caller]
    fn live(&self, handle: Handle) -> Id {
        match self.arena.resolve(handle) {
            Some(x) => x,
            None => panic!("stale handle {handle:?}: no such entry in this map"),
        }
    }

    pub fn search(&self, key: &P::Key) -> Option<Handle> {
        self.handle_of(self.find(key))
    }

    pub fn contains_key(&self, key: &P::Key) -> bool {
        !self.find(key).is_nil()
    }

    pub fn get_by_key(&self, key: &P::Key) -> Option<&P::Value> {
        let x = self.find(key);
        (!x.is_nil()).then(|| &self.arena.node(x).value)
    }

    /// Whether `handle` still refers to an entry of this map.
    pub fn contains(&self, handle: Handle) -> bool {
        self.arena.resolve(handle).is_some()
    }

    pub fn get(&self, handle: Handle) -> Option<(&P::Key, &P::Value)> {
        let node = self.arena.node(self.arena.resolve(handle)?);
        Some((&node.key, &node.value))
    }

    pub fn key(&self, handle: Handle) -> Option<&P::Key> {
        self.get(handle).map(|(k, _)| k)
    }

    pub fn value(&self, handle: Handle) -> Option<&P::Value> {
        self.get(handle).map(|(_, v)| v)
    }

    pub fn value_mut(&mut self, handle: Handle) -> Option<&mut P::Value> {
        let x = self.arena.resolve(handle)?;
        Some(&mut self.arena.node_mut(x).value)
    }

    fn leftmost(&self, mut x: Id) -> Id {
        if x.is_nil() {
            return x;
        }
        while !self.arena.node(x).left.is_nil() {
            x = self.arena.node(x).left;
        }
        x
    }

    fn rightmost(&self, mut x: Id) -> Id {
        if x.is_nil() {
            return x;
        }
        while !self.arena.node(x).right.is_nil() {
            x = self.arena.node(x).right;
        }
        x
    }

    pub fn minimum(&self) -> Option<Handle> {
        self.handle_of(self.leftmost(self.root))
    }

    pub fn maximum(&self) -> Option<Handle> {
        self.handle_of(self.rightmost(self.root))
    }

    /// Entry with the next larger key, or `None` at the maximum.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is stale or was issued by another map.
    #[track_caller]
    pub fn successor(&self, handle: Handle) -> Option<Handle> {
        let mut x = self.live(handle);
        let right = self.arena.node(x).right;
        if !right.is_nil() {
            return self.handle_of(self.leftmost(right));
        }
        let mut p = self.arena.node(x).parent;
        while !p.is_nil() && self.arena.node(p).right == x {
            x = p;
            p = self.arena.node(p).parent;
        }
        self.handle_of(p)
    }

    /// Entry with the next smaller key, or `None` at the minimum.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is stale or was issued by another map.
    #[track_caller]
    pub fn predecessor(&self, handle: Handle) -> Option<Handle> {
        let mut x = self.live(handle);
        let left = self.arena.node(x).left;
        if !left.is_nil() {
            return self.handle_of(self.rightmost(left));
        }
        let mut p = self.arena.node(x).parent;
        while !p.is_nil() && self.arena.node(p).left == x {
            x = p;
            p = self.arena.node(p).parent;
        }
        self.handle_of(p)
    }

    /// Inserts a new entry unless the key is already present.
    ///
    /// Returns the handle of the new entry, or `None` for a duplicate key, in
    /// which case the freshly made key is released and the value source is
    /// dropped unused.
    pub fn insert(&mut self, key: P::KeySource, value: P::ValueSource) -> Option<Handle> {
        match self.try_insert(key, value) {
            Ok(handle) => handle,
            Err(err) => panic!("insert failed: {err}"),
        }
    }

    /// Like [`AvlTreeMap::insert`], but reports allocation failure instead of
    /// panicking. The map is unchanged when an error is returned.
    pub fn try_insert(
        &mut self,
        key: P::KeySource,
        value: P::ValueSource,
    ) -> Result<Option<Handle>, MapError> {
        let key = P::make_key(key);

        let mut parent = Id::NIL;
        let mut side = Ordering::Equal;
        let mut cur = self.root;
        while !cur.is_nil() {
            let node = self.arena.node(cur);
            side = P::compare(&key, &node.key);
            parent = cur;
            cur = match side {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => {
                    P::release_key(key);
                    return Ok(None);
                }
            };
        }

        if let Err(err) = self.arena.try_reserve_one() {
            P::release_key(key);
            return Err(err);
        }
        let x = self.arena.alloc(key, P::make_value(value));
        self.arena.node_mut(x).parent = parent;
        match side {
            Ordering::Less => self.arena.node_mut(parent).left = x,
            Ordering::Greater => self.arena.node_mut(parent).right = x,
            Ordering::Equal => self.root = x,
        }
        self.len += 1;
        trace!(node = x.idx(), parent = ?parent, "attached node");

        fix_up(&mut self.arena, &mut self.root, parent);
        Ok(Some(self.arena.handle(x)))
    }

    /// Removes the entry for `key`, handing its key and value to the policy's
    /// release functions. Returns `false` if the key wasn't present.
    pub fn remove(&mut self, key: &P::Key) -> bool {
        let z = self.find(key);
        if z.is_nil() {
            return false;
        }

        let (z_left, z_right) = (self.arena.node(z).left, self.arena.node(z).right);
        let y = if z_left.is_nil() || z_right.is_nil() {
            z
        } else {
            self.leftmost(z_right)
        };

        // Splice `y` out; it has at most one child.
        let y_node = self.arena.node(y);
        let x = if y_node.left.is_nil() {
            y_node.right
        } else {
            y_node.left
        };
        let y_parent = y_node.parent;
        if !x.is_nil() {
            self.arena.node_mut(x).parent = y_parent;
        }
        replace_child(&mut self.arena, &mut self.root, y_parent, y, x);

        let mut fix_from = y_parent;
        if y != z {
            // `y` holds the next key after `z`, so it can take over `z`'s spot.
            let z_node = self.arena.node(z);
            let (left, right, parent) = (z_node.left, z_node.right, z_node.parent);
            let h = z_node.height;
            let y_node = self.arena.node_mut(y);
            y_node.left = left;
            y_node.right = right;
            y_node.parent = parent;
            y_node.height = h;
            if !left.is_nil() {
                self.arena.node_mut(left).parent = y;
            }
            if !right.is_nil() {
                self.arena.node_mut(right).parent = y;
            }
            replace_child(&mut self.arena, &mut self.root, parent, z, y);
            if fix_from == z {
                fix_from = y;
            }
            trace!(removed = z.idx(), successor = y.idx(), "relocated successor");
        }

        let (key, value) = self.arena.release(z);
        P::release_key(key);
        P::release_value(value);
        self.len -= 1;

        fix_up(&mut self.arena, &mut self.root, fix_from);
        true
    }

    /// Removes every entry, releasing keys and values through the policy.
    /// All outstanding handles become stale.
    pub fn clear(&mut self) {
        let mut released = 0_usize;
        let mut cur = self.root;
        // Post-order walk over the parent links: a node is released once both
        // of its children are gone.
        while !cur.is_nil() {
            let node = self.arena.node(cur);
            if !node.left.is_nil() {
                cur = node.left;
                continue;
            }
            if !node.right.is_nil() {
                cur = node.right;
                continue;
            }
            let parent = node.parent;
            if !parent.is_nil() {
                let p = self.arena.node_mut(parent);
                if p.left == cur {
                    p.left = Id::NIL;
                } else {
                    p.right = Id::NIL;
                }
            }
            let (key, value) = self.arena.release(cur);
            P::release_key(key);
            P::release_value(value);
            released += 1;
            cur = parent;
        }
        debug_assert_eq!(released, self.len);
        self.root = Id::NIL;
        self.len = 0;
        debug!(released, "cleared tree");
    }
}

impl<P: MapPolicy> Default for AvlTreeMap<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: MapPolicy> Drop for AvlTreeMap<P> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
impl<P: MapPolicy> AvlTreeMap<P> {
    /// Checks key order, parent links, cached heights, balance and `len`.
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        if !self.root.is_nil() && !self.arena.node(self.root).parent.is_nil() {
            return Err("root has a parent".into());
        }
        let mut count = 0;
        self.check_subtree(self.root, None, None, &mut count)?;
        if count != self.len {
            return Err(format!("len is {} but {count} nodes are reachable", self.len));
        }
        if self.is_empty() != (self.len == 0) {
            return Err("is_empty disagrees with len".into());
        }
        Ok(())
    }

    fn check_subtree(
        &self,
        x: Id,
        lower: Option<&P::Key>,
        upper: Option<&P::Key>,
        count: &mut usize,
    ) -> Result<u32, String> {
        if x.is_nil() {
            return Ok(0);
        }
        *count += 1;
        let node = self.arena.node(x);
        if let Some(lower) = lower
            && P::compare(lower, &node.key) != Ordering::Less
        {
            return Err(format!("node {x:?} is not above its lower bound"));
        }
        if let Some(upper) = upper
            && P::compare(&node.key, upper) != Ordering::Less
        {
            return Err(format!("node {x:?} is not below its upper bound"));
        }
        for child in [node.left, node.right] {
            if !child.is_nil() && self.arena.node(child).parent != x {
                return Err(format!("child {child:?} does not point back at {x:?}"));
            }
        }
        let hl = self.check_subtree(node.left, lower, Some(&node.key), count)?;
        let hr = self.check_subtree(node.right, Some(&node.key), upper, count)?;
        if node.height != 1 + hl.max(hr) {
            return Err(format!(
                "node {x:?} caches height {} instead of {}",
                node.height,
                1 + hl.max(hr)
            ));
        }
        if hl.abs_diff(hr) > 1 {
            return Err(format!("node {x:?} is unbalanced ({hl} vs {hr})"));
        }
        Ok(node.height)
    }

    pub(crate) fn root_handle(&self) -> Option<Handle> {
        self.handle_of(self.root)
    }

    pub(crate) fn children(&self, handle: Handle) -> (Option<Handle>, Option<Handle>) {
        let node = self.arena.node(self.live(handle));
        (self.handle_of(node.left), self.handle_of(node.right))
    }

    pub(crate) fn node_height(&self, handle: Handle) -> u32 {
        self.arena.node(self.live(handle)).height
    }
}
