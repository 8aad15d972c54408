//! A validated, contiguous chain of [`Row`]s linking a low row number to a
//! high one — the unit every proof, pack, and cross-ledger reference is
//! built from.

use std::collections::BTreeMap;

use crate::core::errors::{SkError, SkResult};
use crate::core::hash::Hash;
use crate::core::row_math::{self, rows_linked};
use crate::ledger::path_pack::PathPack;
use crate::ledger::row::Row;

/// Result of comparing two [`Path`]s over their shared row numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Comp {
    /// Highest row number both paths attest to with matching hashes.
    pub common_no: Option<u64>,
    /// Lowest row number both paths attest to with conflicting hashes —
    /// evidence of a fork / rewrite, should never occur for an honest
    /// ledger's own history.
    pub conflict_no: Option<u64>,
}

/// An ascending, skip-linked sequence of rows: `rows[i+1].n` is always
/// reachable from `rows[i].n` by a single valid skip pointer, and every
/// level hash any row claims for an already-known row number agrees with
/// that row's own computed hash.
#[derive(Clone, Debug)]
pub struct Path {
    rows: Vec<Row>,
}

impl Path {
    /// Validate and wrap `rows` into a `Path`.
    ///
    /// Rejects: an empty row list, non-ascending row numbers, any adjacent
    /// pair not linked by a skip pointer, and any level hash that
    /// contradicts a hash already established by an earlier row or by the
    /// row itself.
    pub fn new(rows: Vec<Row>) -> SkResult<Path> {
        if rows.is_empty() {
            return Err(SkError::OutOfBounds("path must contain at least one row".into()));
        }
        for w in rows.windows(2) {
            let (a, b) = (w[0].n, w[1].n);
            if !(a < b) {
                return Err(SkError::OutOfBounds(format!(
                    "path row numbers must be strictly ascending, got {a} then {b}"
                )));
            }
            if !rows_linked(a, b) {
                return Err(SkError::RowsNotLinked { a, b });
            }
        }

        let mut known: BTreeMap<u64, Hash> = BTreeMap::new();
        for row in &rows {
            for k in 0..row.skip_count() as usize {
                let step = 1u64 << k;
                if row.n <= step {
                    continue;
                }
                let pred = row.n - step;
                if let Some(claimed) = row.levels.level_hash(k) {
                    match known.get(&pred) {
                        Some(&existing) if existing != claimed => {
                            return Err(SkError::hash_conflict(
                                format!("row {pred}"),
                                existing,
                                claimed,
                            ));
                        }
                        _ => {
                            known.insert(pred, claimed);
                        }
                    }
                }
            }

            let h = row.hash();
            if let Some(&existing) = known.get(&row.n) {
                if existing != h {
                    return Err(SkError::hash_conflict(format!("row {}", row.n), existing, h));
                }
            }
            known.insert(row.n, h);
        }

        Ok(Path { rows })
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn lo(&self) -> u64 {
        self.rows[0].n
    }

    pub fn hi(&self) -> u64 {
        self.rows[self.rows.len() - 1].n
    }

    /// Number of member rows (not the row-number span `hi - lo`).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn row_numbers(&self) -> Vec<u64> {
        self.rows.iter().map(|r| r.n).collect()
    }

    pub fn has_row(&self, n: u64) -> bool {
        self.rows.iter().any(|r| r.n == n)
    }

    /// Every row number this path attests a hash for, member or ref-only.
    pub fn known_hash_map(&self) -> BTreeMap<u64, Hash> {
        let mut known: BTreeMap<u64, Hash> = BTreeMap::new();
        for row in &self.rows {
            for k in 0..row.skip_count() as usize {
                let step = 1u64 << k;
                if row.n <= step {
                    continue;
                }
                if let Some(claimed) = row.levels.level_hash(k) {
                    known.entry(row.n - step).or_insert(claimed);
                }
            }
            known.insert(row.n, row.hash());
        }
        known
    }

    /// `true` if this path can produce a hash for row `n`, member or not.
    pub fn covers_row(&self, n: u64) -> bool {
        self.known_hash_map().contains_key(&n)
    }

    pub fn get_row_hash(&self, n: u64) -> SkResult<Hash> {
        self.known_hash_map()
            .get(&n)
            .copied()
            .ok_or(SkError::RowNotFound(n))
    }

    /// The members in `[from, to]`, re-validated as a standalone path.
    pub fn sub_path(&self, from: u64, to: u64) -> SkResult<Path> {
        let rows: Vec<Row> = self
            .rows
            .iter()
            .filter(|r| r.n >= from && r.n <= to)
            .cloned()
            .collect();
        if rows.is_empty() {
            return Err(SkError::OutOfBounds(format!(
                "no member rows in [{from}, {to}]"
            )));
        }
        Path::new(rows)
    }

    pub fn head_path(&self, to: u64) -> SkResult<Path> {
        self.sub_path(self.lo(), to)
    }

    pub fn tail_path(&self, from: u64) -> SkResult<Path> {
        self.sub_path(from, self.hi())
    }

    /// Compare two paths over the row numbers they jointly attest to.
    pub fn comp(&self, other: &Path) -> Comp {
        let a = self.known_hash_map();
        let b = other.known_hash_map();
        let mut common_no = None;
        let mut conflict_no = None;
        for (&n, &ha) in &a {
            if let Some(&hb) = b.get(&n) {
                if ha == hb {
                    common_no = Some(common_no.map_or(n, |c: u64| c.max(n)));
                } else {
                    conflict_no = Some(conflict_no.map_or(n, |c: u64| c.min(n)));
                }
            }
        }
        Comp { common_no, conflict_no }
    }

    pub fn highest_common_no(&self, other: &Path) -> Option<u64> {
        self.comp(other).common_no
    }

    /// Condense every member but `lo` to its single linking level,
    /// discarding the rest of each row's level hashes. `lo` keeps a full
    /// levels pointer so its own ref-only predecessors stay recoverable.
    pub fn compress(&self) -> Path {
        let mut rows = Vec::with_capacity(self.rows.len());
        rows.push(self.rows[0].clone());
        for w in self.rows.windows(2) {
            let (prev, cur) = (&w[0], &w[1]);
            let k = (cur.n - prev.n).trailing_zeros() as usize;
            let condensed = cur.levels.condense(k);
            rows.push(Row::new(cur.n, cur.input_hash, condensed));
        }
        Path::new(rows).expect("condensation preserves row hashes, so validation cannot fail")
    }

    /// Pack this path in its compact (condensed) binary form.
    pub fn pack(&self) -> PathPack {
        PathPack::from_path(self)
    }

    pub fn pack_len(&self) -> usize {
        self.pack().serialize().len()
    }
}

/// Rows referenced anywhere in `row_nos`' stitch closure but not carried
/// as a full member — exposed here so callers building a [`Path`] can
/// decide what full row data they still need to fetch.
pub fn stitch_ref_only(row_nos: &[u64]) -> Vec<u64> {
    row_math::ref_only_coverage(row_nos).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::sha256;
    use crate::ledger::skip_ledger::{MemSkipLedger, SkipLedger};

    fn input(i: u64) -> Hash {
        sha256(&i.to_be_bytes())
    }

    fn build_ledger(n: u64) -> MemSkipLedger {
        let mut ledger = MemSkipLedger::new();
        let inputs: Vec<Hash> = (0..n).map(input).collect();
        ledger.append_rows(&inputs).unwrap();
        ledger
    }

    #[test]
    fn rejects_unlinked_rows() {
        let ledger = build_ledger(20);
        let r3 = ledger.get_row(3).unwrap();
        let r10 = ledger.get_row(10).unwrap();
        let err = Path::new(vec![r3, r10]).unwrap_err();
        assert!(matches!(err, SkError::RowsNotLinked { a: 3, b: 10 }));
    }

    #[test]
    fn head_and_tail_subpaths_agree_with_full_path() {
        let ledger = build_ledger(52);
        let path = ledger.skip_path(1, 52).unwrap();
        let head = path.head_path(16).unwrap();
        assert_eq!(head.get_row_hash(16).unwrap(), path.get_row_hash(16).unwrap());
        let tail = path.tail_path(16).unwrap();
        assert_eq!(tail.get_row_hash(52).unwrap(), path.get_row_hash(52).unwrap());
    }

    #[test]
    fn comp_finds_common_prefix_and_no_conflict_for_consistent_ledgers() {
        let a = build_ledger(40);
        let b = build_ledger(40);
        let pa = a.state_path().unwrap();
        let pb = b.state_path().unwrap();
        let comp = pa.comp(&pb);
        assert_eq!(comp.conflict_no, None);
        assert_eq!(comp.common_no, Some(40));
    }

    #[test]
    fn comp_detects_fork_below_divergence_point() {
        let mut a = MemSkipLedger::new();
        let mut b = MemSkipLedger::new();
        let shared: Vec<Hash> = (0..8).map(input).collect();
        a.append_rows(&shared).unwrap();
        b.append_rows(&shared).unwrap();
        a.append_rows(&[sha256(b"a-fork")]).unwrap();
        b.append_rows(&[sha256(b"b-fork")]).unwrap();

        let pa = a.state_path().unwrap();
        let pb = b.state_path().unwrap();
        let comp = pa.comp(&pb);
        assert_eq!(comp.common_no, Some(8));
        assert_eq!(comp.conflict_no, Some(9));
    }

    #[test]
    fn compress_preserves_hi_hash_and_shrinks_pack() {
        let ledger = build_ledger(16);
        let path = ledger.state_path().unwrap();
        let compressed = path.compress();
        assert_eq!(compressed.get_row_hash(16).unwrap(), path.get_row_hash(16).unwrap());
        assert!(compressed.pack_len() < path.pack_len());
    }
}
