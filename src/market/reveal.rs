//! Which key-tree nodes the provider must reveal, and the shape checks on a
//! reveal.
//!
//! The consumer is owed the leaf keys of chunks `a..=ctr`. Revealing a node
//! hands over every leaf below it, so the provider reveals the smallest set
//! of nodes whose subtrees cover exactly the owed leaves: whenever both
//! children are owed, their parent is revealed in their place.

use crate::crypto::keytree::KeyTree;
use crate::crypto::tree::{leaf_position, path_from_root};
use crate::crypto::vpke::{self, ErkEntry};
use crate::crypto::ProofBackend;
use crate::error::{Error, Result};
use crate::types::CurvePoint;

/// Positions to reveal for owed chunks `a..=ctr` of an `n`-chunk tree, in
/// ascending order.
///
/// Returns an empty plan when the range is empty or out of bounds.
#[must_use]
pub fn reveal_plan(n: u64, a: u64, ctr: u64) -> Vec<u64> {
    let (Some(first), Some(last)) = (leaf_position(n, a), leaf_position(n, ctr)) else {
        return Vec::new();
    };
    if first > last {
        return Vec::new();
    }

    // Walk the range edges upward in 1-based numbering, where node q has
    // children 2q and 2q + 1 and every level is one contiguous block.
    let (lo, hi) = (first + 1, last + 1);
    let deep_start = 1u64 << hi.ilog2();
    // Leaves span at most two levels; the shallower ones join one level up
    let mut shallow = (lo < deep_start).then_some((lo, deep_start - 1));
    let mut level = vec![(lo.max(deep_start), hi)];
    let mut plan = Vec::new();

    while !level.is_empty() {
        let mut parents = Vec::with_capacity(2);
        for (mut l, mut r) in merge_adjacent(level) {
            if l % 2 == 1 {
                plan.push(l - 1);
                l += 1;
            }
            if l <= r && r % 2 == 0 {
                plan.push(r - 1);
                r -= 1;
            }
            if l < r {
                parents.push((l / 2, r / 2));
            }
        }
        level = parents;
        level.extend(shallow.take());
    }

    plan.sort_unstable();
    plan
}

/// Sort ranges on one level and join those that touch.
fn merge_adjacent(mut ranges: Vec<(u64, u64)>) -> Vec<(u64, u64)> {
    ranges.sort_unstable();
    let mut merged: Vec<(u64, u64)> = Vec::with_capacity(ranges.len());
    for (l, r) in ranges {
        match merged.last_mut() {
            Some(prev) if prev.1.checked_add(1) == Some(l) => prev.1 = r,
            _ => merged.push((l, r)),
        }
    }
    merged
}

/// Check a reveal against the plan and turn it into log entries.
///
/// `c1` and `c2` carry two points per position, in position order.
///
/// # Errors
///
/// - [`Error::LengthMismatch`] if the point lists are not twice the position list
/// - [`Error::ProofInvalid`] if the positions differ from the plan or a point
///   is off the curve
pub fn check_reveal(
    positions: &[u64],
    c1: &[CurvePoint],
    c2: &[CurvePoint],
    plan: &[u64],
    backend: &dyn ProofBackend,
) -> Result<Vec<ErkEntry>> {
    let expected = positions.len() * 2;
    for actual in [c1.len(), c2.len()] {
        if actual != expected {
            return Err(Error::LengthMismatch { expected, actual });
        }
    }
    if positions != plan {
        return Err(Error::ProofInvalid(format!(
            "revealed positions {positions:?} do not match plan {plan:?}"
        )));
    }
    if let Some(bad) = c1.iter().chain(c2).find(|p| !backend.is_on_curve(p)) {
        return Err(Error::ProofInvalid(format!(
            "point not on curve: x={}",
            hex::encode(bad.x)
        )));
    }

    Ok(positions
        .iter()
        .enumerate()
        .map(|(k, position)| ErkEntry {
            position: *position,
            c1: [c1[2 * k], c1[2 * k + 1]],
            c2: [c2[2 * k], c2[2 * k + 1]],
        })
        .collect())
}

/// Reveal arguments: positions and flattened `c1`, `c2` point lists.
pub type RevealArgs = (Vec<u64>, Vec<CurvePoint>, Vec<CurvePoint>);

/// Provider-side helper: encrypt the planned node keys to `recipient`.
///
/// Returns `None` if a position is outside the tree or `recipient` is not a
/// curve point.
#[must_use]
pub fn build_reveal(
    tree: &KeyTree,
    recipient: &CurvePoint,
    plan: &[u64],
    nonce_seed: &[u8],
) -> Option<RevealArgs> {
    let mut c1 = Vec::with_capacity(plan.len() * 2);
    let mut c2 = Vec::with_capacity(plan.len() * 2);
    for position in plan {
        let halves = tree.node_key(*position)?;
        let erk = vpke::encrypt(recipient, *position, &halves, nonce_seed)?;
        c1.extend_from_slice(&erk.c1);
        c2.extend_from_slice(&erk.c2);
    }
    Some((plan.to_vec(), c1, c2))
}

/// Consumer-side helper: the revealed entry covering chunk `index`, and the
/// descent from it to the chunk's leaf.
#[must_use]
pub fn locate_leaf(n: u64, index: u64, revealed: &[ErkEntry]) -> Option<(ErkEntry, Vec<u64>)> {
    let path = path_from_root(leaf_position(n, index)?);
    revealed.iter().find_map(|erk| {
        let start = path.iter().position(|p| *p == erk.position)?;
        Some((*erk, path[start..].to_vec()))
    })
}
