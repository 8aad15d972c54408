//! A ledger row: its input hash, its level hashes (or a condensed view of
//! them), and the combinator that produces the row's own hash.

use crate::core::hash::{combine_row_hash, Hash, SENTINEL};
use crate::core::merkle::{self, FunnelStep};
use crate::core::row_math::skip_count;

/// The condensation view of a row's level hashes.
///
/// `Full` carries every level hash, giving `coverage = { n - 2^k : 0 <= k
/// < p }`. `Condensed` retains only the level hash at one position plus
/// the Merkle funnel proving it belongs to the level set; the remaining
/// sibling hashes are discarded, and coverage shrinks to a single row.
#[derive(Clone, Debug)]
pub enum LevelsPointer {
    Full(Vec<Hash>),
    Condensed {
        level: usize,
        hash: Hash,
        funnel: Vec<FunnelStep>,
    },
}

impl LevelsPointer {
    pub fn full(level_hashes: Vec<Hash>) -> Self {
        assert!(!level_hashes.is_empty());
        LevelsPointer::Full(level_hashes)
    }

    /// Condense a full levels pointer down to the single level at `level`.
    pub fn condense(&self, level: usize) -> LevelsPointer {
        match self {
            LevelsPointer::Full(hashes) => {
                assert!(level < hashes.len());
                let funnel = merkle::funnel(hashes, level);
                LevelsPointer::Condensed {
                    level,
                    hash: hashes[level],
                    funnel,
                }
            }
            LevelsPointer::Condensed { level: l, .. } => {
                assert_eq!(*l, level, "already condensed to a different level");
                self.clone()
            }
        }
    }

    /// Number of level positions this pointer was built from (`p`).
    pub fn degree(&self) -> usize {
        match self {
            LevelsPointer::Full(hashes) => hashes.len(),
            LevelsPointer::Condensed { funnel, .. } => 1usize << funnel.len(),
        }
    }

    /// Merkle root over the level hashes — substituted into the row hash.
    pub fn root(&self) -> Hash {
        match self {
            LevelsPointer::Full(hashes) => merkle::root(hashes),
            LevelsPointer::Condensed { hash, funnel, .. } => merkle::funnel_root(*hash, funnel),
        }
    }

    /// The level hash at position `k`, if this pointer retains it.
    pub fn level_hash(&self, k: usize) -> Option<Hash> {
        match self {
            LevelsPointer::Full(hashes) => hashes.get(k).copied(),
            LevelsPointer::Condensed { level, hash, .. } if *level == k => Some(*hash),
            LevelsPointer::Condensed { .. } => None,
        }
    }

    /// Row numbers whose hash this pointer attests to, given the row
    /// number `n` that owns it.
    pub fn coverage(&self, n: u64) -> Vec<u64> {
        match self {
            LevelsPointer::Full(hashes) => (0..hashes.len())
                .filter_map(|k| {
                    let step = 1u64 << k;
                    (n > step).then_some(n - step)
                })
                .collect(),
            LevelsPointer::Condensed { level, .. } => {
                let step = 1u64 << level;
                if n > step {
                    vec![n - step]
                } else {
                    vec![]
                }
            }
        }
    }
}

/// A single row in a skip ledger: its own input hash plus the hashes of
/// its skip-pointer predecessors.
#[derive(Clone, Debug)]
pub struct Row {
    pub n: u64,
    pub input_hash: Hash,
    pub levels: LevelsPointer,
}

impl Row {
    pub fn new(n: u64, input_hash: Hash, levels: LevelsPointer) -> Self {
        assert!(n >= 1, "row 0 is abstract and has no physical Row value");
        Row { n, input_hash, levels }
    }

    /// `skip_count(n)`, the row's full (uncondensed) level count.
    pub fn skip_count(&self) -> u32 {
        skip_count(self.n)
    }

    /// `SHA256(input_hash || merkleRoot(level_hashes))`.
    pub fn hash(&self) -> Hash {
        combine_row_hash(&self.input_hash, &self.levels.root())
    }

    /// Hash of the predecessor this row's pointer at position `k` names,
    /// or the sentinel when that predecessor is row 0.
    pub fn predecessor_hash(&self, k: usize) -> Option<Hash> {
        if self.n == (1u64 << k) {
            return Some(SENTINEL);
        }
        self.levels.level_hash(k)
    }

    pub fn coverage(&self) -> Vec<u64> {
        self.levels.coverage(self.n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::sha256;

    #[test]
    fn row_one_hashes_against_sentinel() {
        let input = sha256(&[0x11; 32]);
        let row = Row::new(1, input, LevelsPointer::full(vec![SENTINEL]));
        let expected = combine_row_hash(&input, &SENTINEL);
        assert_eq!(row.hash(), expected);
        assert_eq!(row.predecessor_hash(0), Some(SENTINEL));
    }

    #[test]
    fn condensed_row_keeps_same_hash() {
        let levels = vec![sha256(b"a"), sha256(b"b"), sha256(b"c")];
        let input = sha256(b"input");
        let full = Row::new(4, input, LevelsPointer::full(levels.clone()));
        for k in 0..levels.len() {
            let condensed_levels = full.levels.condense(k);
            let condensed = Row::new(4, input, condensed_levels);
            assert_eq!(condensed.hash(), full.hash(), "k={k}");
        }
    }

    #[test]
    fn coverage_lists_all_predecessors_for_full_row() {
        let levels = vec![sha256(b"a"), sha256(b"b"), sha256(b"c")];
        let row = Row::new(4, sha256(b"x"), LevelsPointer::full(levels));
        let mut cov = row.coverage();
        cov.sort();
        // Row 0 is abstract and excluded even though level index 2 (step 4)
        // formally points at it.
        assert_eq!(cov, vec![2, 3]);
    }
}
