//! Height bookkeeping and rotations.
//!
//! Everything here works on raw node ids and the root slot of one tree; the
//! map calls [`fix_up`] after every structural edit. Heights count nodes: an
//! empty subtree is 0 and a leaf is 1.

use tracing::trace;

use crate::arena::{Arena, Id};

#[inline]
pub(crate) fn height<K, V>(arena: &Arena<K, V>, x: Id) -> u32 {
    if x.is_nil() { 0 } else { arena.node(x).height }
}

pub(crate) fn update_height<K, V>(arena: &mut Arena<K, V>, x: Id) {
    if x.is_nil() {
        return;
    }
    let node = arena.node(x);
    let h = 1 + height(arena, node.left).max(height(arena, node.right));
    arena.node_mut(x).height = h;
}

pub(crate) fn balance_factor<K, V>(arena: &Arena<K, V>, x: Id) -> i64 {
    if x.is_nil() {
        return 0;
    }
    let node = arena.node(x);
    i64::from(height(arena, node.left)) - i64::from(height(arena, node.right))
}

/// Points whichever link of `parent` held `old` at `new`, or the root when
/// `parent` is nil. Doesn't touch `new`'s parent link.
pub(crate) fn replace_child<K, V>(
    arena: &mut Arena<K, V>,
    root: &mut Id,
    parent: Id,
    old: Id,
    new: Id,
) {
    if parent.is_nil() {
        *root = new;
        return;
    }
    let p = arena.node_mut(parent);
    if p.left == old {
        p.left = new;
    } else {
        debug_assert_eq!(p.right, old);
        p.right = new;
    }
}

/// Rotates `x` down to the left; its right child takes its place.
/// Returns the new subtree root.
pub(crate) fn rotate_left<K, V>(arena: &mut Arena<K, V>, root: &mut Id, x: Id) -> Id {
    let pivot = arena.node(x).right;
    debug_assert!(!pivot.is_nil(), "rotate_left needs a right child");
    let inner = arena.node(pivot).left;
    let parent = arena.node(x).parent;

    arena.node_mut(x).right = inner;
    if !inner.is_nil() {
        arena.node_mut(inner).parent = x;
    }
    arena.node_mut(pivot).left = x;
    arena.node_mut(x).parent = pivot;
    arena.node_mut(pivot).parent = parent;
    replace_child(arena, root, parent, x, pivot);

    update_height(arena, x);
    update_height(arena, pivot);
    trace!(node = x.idx(), pivot = pivot.idx(), "rotate left");
    pivot
}

/// Rotates `y` down to the right; its left child takes its place.
/// Returns the new subtree root.
pub(crate) fn rotate_right<K, V>(arena: &mut Arena<K, V>, root: &mut Id, y: Id) -> Id {
    let pivot = arena.node(y).left;
    debug_assert!(!pivot.is_nil(), "rotate_right needs a left child");
    let inner = arena.node(pivot).right;
    let parent = arena.node(y).parent;

    arena.node_mut(y).left = inner;
    if !inner.is_nil() {
        arena.node_mut(inner).parent = y;
    }
    arena.node_mut(pivot).right = y;
    arena.node_mut(y).parent = pivot;
    arena.node_mut(pivot).parent = parent;
    replace_child(arena, root, parent, y, pivot);

    update_height(arena, y);
    update_height(arena, pivot);
    trace!(node = y.idx(), pivot = pivot.idx(), "rotate right");
    pivot
}

/// Restores the balance of `t`, assuming both of its subtrees are AVL trees
/// with correct heights. Returns whatever now roots the subtree.
fn rebalance<K, V>(arena: &mut Arena<K, V>, root: &mut Id, t: Id) -> Id {
    update_height(arena, t);
    let bf = balance_factor(arena, t);
    if bf > 1 {
        let left = arena.node(t).left;
        let (ll, lr) = (arena.node(left).left, arena.node(left).right);
        if height(arena, ll) < height(arena, lr) {
            rotate_left(arena, root, left);
        }
        return rotate_right(arena, root, t);
    }
    if bf < -1 {
        let right = arena.node(t).right;
        let (rl, rr) = (arena.node(right).left, arena.node(right).right);
        if height(arena, rr) < height(arena, rl) {
            rotate_right(arena, root, right);
        }
        return rotate_left(arena, root, t);
    }
    t
}

/// Walks from `start` up to the root, refreshing heights and rotating every
/// node whose balance factor left `-1..=1`.
pub(crate) fn fix_up<K, V>(arena: &mut Arena<K, V>, root: &mut Id, start: Id) {
    let mut cur = start;
    while !cur.is_nil() {
        let top = rebalance(arena, root, cur);
        cur = arena.node(top).parent;
    }
}
