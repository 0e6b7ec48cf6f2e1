//! Heap-layout binary tree addressing shared by the content Merkle tree and
//! the key tree.
//!
//! A tree over `n` chunks has `2n - 1` nodes. The root is position 0, node
//! `p` has children `2p + 1` and `2p + 2`, and chunk `i` (1-based) is the
//! leaf at position `n + i - 2`.
//!
//! Trees hold at most [`MAX_CHUNKS`] chunks, so every position and every
//! 1-based node number fits in a `u64`. Helpers return `None` beyond that.

/// Largest supported chunk count.
pub const MAX_CHUNKS: u64 = u64::MAX / 2;

/// Last position of a tree over `n` chunks.
///
/// Returns `None` for an empty tree or one above [`MAX_CHUNKS`].
#[must_use]
pub fn last_position(n: u64) -> Option<u64> {
    if n == 0 || n > MAX_CHUNKS {
        return None;
    }
    n.checked_mul(2)?.checked_sub(2)
}

/// Leaf position of 1-based chunk `index` in a tree over `n` chunks.
///
/// Returns `None` if `index` is outside `1..=n` or the tree is too large.
#[must_use]
pub fn leaf_position(n: u64, index: u64) -> Option<u64> {
    if index == 0 || index > n || n > MAX_CHUNKS {
        return None;
    }
    n.checked_add(index)?.checked_sub(2)
}

/// 1-based chunk index of a leaf position, if `position` is a leaf.
#[must_use]
pub fn chunk_index(n: u64, position: u64) -> Option<u64> {
    let first_leaf = n.checked_sub(1)?;
    if position < first_leaf || position > last_position(n)? {
        return None;
    }
    Some(position - first_leaf + 1)
}

/// Parent of a non-root position.
#[must_use]
pub fn parent(position: u64) -> Option<u64> {
    if position == 0 {
        None
    } else {
        Some((position - 1) / 2)
    }
}

/// Whether `position` is the left child of its parent.
#[must_use]
pub fn is_left_child(position: u64) -> bool {
    position % 2 == 1
}

/// Sibling of a non-root position.
#[must_use]
pub fn sibling(position: u64) -> Option<u64> {
    if position == 0 {
        None
    } else if is_left_child(position) {
        position.checked_add(1)
    } else {
        Some(position - 1)
    }
}

/// Whether `child` is a direct child of `parent`.
#[must_use]
pub fn is_child_of(child: u64, parent_position: u64) -> bool {
    parent(child) == Some(parent_position)
}

/// Positions from the root down to `position`, both inclusive.
#[must_use]
pub fn path_from_root(position: u64) -> Vec<u64> {
    let mut path = vec![position];
    let mut current = position;
    while let Some(p) = parent(current) {
        path.push(p);
        current = p;
    }
    path.reverse();
    path
}
