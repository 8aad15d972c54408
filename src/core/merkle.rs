//! Merkle root and funnel-proof construction over a row's level hashes.
//!
//! A row's `level_hashes` form the leaves of a small Merkle tree; the
//! tree's root is substituted into the row-hash formula. This is the
//! mechanism by which a [`crate::ledger::row::LevelsPointer`] can be
//! condensed from `p` leaves down to a single leaf plus `ceil(log2(p))`
//! funnel siblings, with no loss of verifiability.

use crate::core::hash::{sha256_concat, Hash};

/// Which side of the accumulator a funnel sibling hashes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// One step of a funnel proof: the sibling hash and which side it sits on.
pub type FunnelStep = (Hash, Side);

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    sha256_concat(&[left.as_ref(), right.as_ref()])
}

/// Root of the Merkle tree over `leaves`. A single leaf is its own root.
/// Odd levels duplicate their last node, matching the funnel construction
/// in [`funnel`].
pub fn root(leaves: &[Hash]) -> Hash {
    assert!(!leaves.is_empty(), "merkle root of empty leaf set");
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    let mut next = Vec::with_capacity(level.len().div_ceil(2));
    for pair in level.chunks(2) {
        let h = if pair.len() == 2 {
            hash_pair(&pair[0], &pair[1])
        } else {
            hash_pair(&pair[0], &pair[0])
        };
        next.push(h);
    }
    next
}

/// Funnel proof for `leaves[index]`: the `ceil(log2(leaves.len()))`
/// sibling hashes (with side) needed to recompute [`root`] from that one
/// leaf alone.
pub fn funnel(leaves: &[Hash], mut index: usize) -> Vec<FunnelStep> {
    assert!(index < leaves.len());
    let mut level = leaves.to_vec();
    let mut steps = Vec::new();
    while level.len() > 1 {
        let (sibling_index, side) = if index % 2 == 0 {
            (index + 1, Side::Right)
        } else {
            (index - 1, Side::Left)
        };
        let sibling = if sibling_index < level.len() {
            level[sibling_index]
        } else {
            level[index]
        };
        steps.push((sibling, side));
        level = next_level(&level);
        index /= 2;
    }
    steps
}

/// Recompute the Merkle root from a single leaf and its funnel proof.
pub fn funnel_root(leaf: Hash, steps: &[FunnelStep]) -> Hash {
    let mut acc = leaf;
    for (sibling, side) in steps {
        acc = match side {
            Side::Left => hash_pair(sibling, &acc),
            Side::Right => hash_pair(&acc, sibling),
        };
    }
    acc
}

/// `ceil(log2(n))` for `n >= 1`; 0 when `n <= 1`.
pub fn funnel_len(n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    (usize::BITS - (n - 1).leading_zeros()) as usize
}

/// The sequence of sides a funnel proof for `index` within a tree of
/// `leaf_count` leaves takes, without needing the leaf hashes themselves.
/// [`funnel`] always produces sides matching this sequence; packed binary
/// forms rely on that to avoid storing a side per step.
pub fn funnel_sides(leaf_count: usize, mut index: usize) -> Vec<Side> {
    assert!(index < leaf_count);
    let mut len = leaf_count;
    let mut sides = Vec::new();
    while len > 1 {
        sides.push(if index % 2 == 0 { Side::Right } else { Side::Left });
        len = len.div_ceil(2);
        index /= 2;
    }
    sides
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::sha256;

    fn leaves(n: usize) -> Vec<Hash> {
        (0..n).map(|i| sha256(&[i as u8])).collect()
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let ls = leaves(1);
        assert_eq!(root(&ls), ls[0]);
    }

    #[test]
    fn funnel_reconstructs_root_for_every_index_and_size() {
        for n in 1..=17 {
            let ls = leaves(n);
            let r = root(&ls);
            for i in 0..n {
                let steps = funnel(&ls, i);
                assert_eq!(steps.len(), funnel_len(n), "n={n} i={i}");
                assert_eq!(funnel_root(ls[i], &steps), r, "n={n} i={i}");
            }
        }
    }

    #[test]
    fn funnel_sides_matches_computed_funnel() {
        for n in 1..=17 {
            let ls = leaves(n);
            for i in 0..n {
                let steps = funnel(&ls, i);
                let sides: Vec<Side> = steps.iter().map(|(_, s)| *s).collect();
                assert_eq!(funnel_sides(n, i), sides, "n={n} i={i}");
            }
        }
    }

    #[test]
    fn funnel_len_matches_ceil_log2() {
        assert_eq!(funnel_len(1), 0);
        assert_eq!(funnel_len(2), 1);
        assert_eq!(funnel_len(3), 2);
        assert_eq!(funnel_len(4), 2);
        assert_eq!(funnel_len(5), 3);
        assert_eq!(funnel_len(8), 3);
        assert_eq!(funnel_len(9), 4);
    }
}
