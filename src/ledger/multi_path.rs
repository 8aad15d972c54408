//! A set of intersecting [`Path`]s from one ledger, with single-authority
//! detection — the structure a [`crate::nugget::Nugget`] wraps per ledger.

use crate::core::errors::{SkError, SkResult};
use crate::core::hash::Hash;
use crate::ledger::path::{Comp, Path};
use crate::ledger::path_pack::PathPack;
use crate::partitioning::Partitioning;

/// Sorted, mutually-intersecting collection of [`Path`]s.
///
/// Construction enforces §4.5: every path (after the first, in
/// `(hi desc, lo asc)` order) must share a hash-consistent row number with
/// some earlier path, and no two paths may be exact duplicates.
#[derive(Clone, Debug)]
pub struct MultiPath {
    paths: Vec<Path>,
    single_authority: bool,
}

impl MultiPath {
    pub fn new(mut paths: Vec<Path>) -> SkResult<MultiPath> {
        if paths.is_empty() {
            return Err(SkError::OutOfBounds("multi-path must contain at least one path".into()));
        }
        paths.sort_by(|a, b| b.hi().cmp(&a.hi()).then(a.lo().cmp(&b.lo())));

        for i in 1..paths.len() {
            for j in 0..i {
                if paths[i].row_numbers() == paths[j].row_numbers() {
                    return Err(SkError::MalformedBindle(format!(
                        "duplicate path [{}..{}] in multi-path",
                        paths[i].lo(),
                        paths[i].hi()
                    )));
                }
            }
            let mut best: Option<Comp> = None;
            for j in 0..i {
                let comp = paths[i].comp(&paths[j]);
                if let Some(conflict) = comp.conflict_no {
                    if let Some(common) = comp.common_no {
                        if common >= conflict {
                            return Err(SkError::MalformedBindle(format!(
                                "multi-authority contradiction: common row {common} >= conflicting row {conflict}"
                            )));
                        }
                    }
                    return Err(SkError::hash_conflict(
                        format!("row {conflict}"),
                        Hash::default(),
                        Hash::default(),
                    ));
                }
                best = Some(match best {
                    None => comp,
                    Some(b) => upgrade_sorted(b, comp),
                });
            }
            if best.and_then(|c| c.common_no).unwrap_or(0) == 0 {
                return Err(SkError::PathsDoNotIntersect);
            }
        }

        let single_authority = compute_single_authority(&paths);

        Ok(MultiPath { paths, single_authority })
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn single_authority(&self) -> bool {
        self.single_authority
    }

    /// Descending `hi` list of rows acting as authorities: the maximal
    /// `hi` always first; more than one entry only when not
    /// single-authority.
    pub fn authority_nos(&self) -> Vec<u64> {
        if self.single_authority {
            vec![self.paths[0].hi()]
        } else {
            let top_hi = self.paths[0].hi();
            let mut authorities: Vec<u64> = self
                .paths
                .iter()
                .filter(|p| !self.chains_into_top(p, top_hi))
                .map(|p| p.hi())
                .collect();
            authorities.insert(0, top_hi);
            authorities.dedup();
            authorities
        }
    }

    fn chains_into_top(&self, path: &Path, top_hi: u64) -> bool {
        if path.hi() == top_hi {
            return true;
        }
        self.paths
            .iter()
            .any(|other| other.hi() == top_hi && other.comp(path).common_no.unwrap_or(0) > 0)
    }

    pub fn has_row(&self, n: u64) -> bool {
        self.paths.iter().any(|p| p.has_row(n))
    }

    pub fn covers_row(&self, n: u64) -> bool {
        self.paths.iter().any(|p| p.covers_row(n))
    }

    /// The first path (in stored order) whose full member set includes `n`.
    pub fn find_row(&self, n: u64) -> Option<&Path> {
        self.paths.iter().find(|p| p.has_row(n))
    }

    pub fn row_hash(&self, n: u64) -> SkResult<Hash> {
        self.paths
            .iter()
            .find_map(|p| p.get_row_hash(n).ok())
            .ok_or(SkError::RowNotFound(n))
    }

    /// Compare against another multi-path by folding [`Path::comp`] over
    /// every pairwise combination, upgrading to the strongest evidence.
    pub fn comp(&self, other: &Path) -> Comp {
        let mut best: Option<Comp> = None;
        for p in &self.paths {
            let c = p.comp(other);
            best = Some(match best {
                None => c,
                Some(b) => upgrade_sorted(b, c),
            });
        }
        best.unwrap_or(Comp { common_no: None, conflict_no: None })
    }

    /// `u32 BE path-count` followed by a [`Partitioning`] of condensed
    /// [`PathPack`]s, one per member path.
    pub fn to_bytes(&self) -> Vec<u8> {
        let parts: Vec<Vec<u8>> = self.paths.iter().map(|p| p.pack().serialize()).collect();
        Partitioning::encode(&parts)
    }

    pub fn from_bytes(bytes: &[u8]) -> SkResult<MultiPath> {
        Self::from_bytes_prefix(bytes).map(|(mp, _)| mp)
    }

    /// Decode from the front of `bytes`, also returning the number of
    /// bytes consumed — used when a `MultiPath` is embedded inside a
    /// larger framed buffer (a bindle `Nug`).
    pub fn from_bytes_prefix(bytes: &[u8]) -> SkResult<(MultiPath, usize)> {
        let (parts, consumed) = Partitioning::decode(bytes)?;
        let paths = parts
            .into_iter()
            .map(|p| PathPack::deserialize(p)?.path())
            .collect::<SkResult<Vec<_>>>()?;
        Ok((MultiPath::new(paths)?, consumed))
    }
}

/// Combine two [`Comp`] results, keeping the higher `common_no` and the
/// lower `conflict_no` — "best evidence so far" in both directions.
fn upgrade_sorted(a: Comp, b: Comp) -> Comp {
    let common_no = match (a.common_no, b.common_no) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (None, None) => None,
    };
    let conflict_no = match (a.conflict_no, b.conflict_no) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (None, None) => None,
    };
    Comp { common_no, conflict_no }
}

fn compute_single_authority(sorted_paths: &[Path]) -> bool {
    let top_hi = sorted_paths[0].hi();
    sorted_paths[1..].iter().all(|p| {
        sorted_paths
            .iter()
            .take_while(|q| q.hi() > p.hi() || (q.hi() == top_hi && p.hi() != top_hi))
            .any(|q| q.hi() >= p.hi() && q.comp(p).common_no.unwrap_or(0) > 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::sha256;
    use crate::ledger::skip_ledger::{MemSkipLedger, SkipLedger};

    fn build_ledger(n: u64) -> MemSkipLedger {
        let mut ledger = MemSkipLedger::new();
        let inputs: Vec<Hash> = (0..n).map(|i| sha256(&i.to_be_bytes())).collect();
        ledger.append_rows(&inputs).unwrap();
        ledger
    }

    #[test]
    fn s3_multi_path_authority_and_highest_common_no() {
        let ledger = build_ledger(52);
        let p1 = ledger.skip_path(1, 16).unwrap();
        let p2 = ledger.skip_path(11, 52).unwrap();
        let mp = MultiPath::new(vec![p1, p2]).unwrap();
        assert!(mp.single_authority());

        let probe = ledger.get_path(&[11, 17]).unwrap();
        assert_eq!(mp.comp(&probe).common_no, Some(16));
    }

    #[test]
    fn rejects_non_intersecting_paths() {
        let ledger = build_ledger(100);
        let p1 = ledger.skip_path(1, 8).unwrap();
        let p2 = ledger.skip_path(90, 100).unwrap();
        let err = MultiPath::new(vec![p1, p2]).unwrap_err();
        assert!(matches!(err, SkError::PathsDoNotIntersect));
    }

    #[test]
    fn rejects_exact_duplicates() {
        let ledger = build_ledger(20);
        let p1 = ledger.skip_path(1, 16).unwrap();
        let p2 = ledger.skip_path(1, 16).unwrap();
        let err = MultiPath::new(vec![p1, p2]).unwrap_err();
        assert!(matches!(err, SkError::MalformedBindle(_)));
    }

    #[test]
    fn wire_round_trips() {
        let ledger = build_ledger(52);
        let p1 = ledger.skip_path(1, 16).unwrap();
        let p2 = ledger.skip_path(11, 52).unwrap();
        let mp = MultiPath::new(vec![p1, p2]).unwrap();
        let bytes = mp.to_bytes();
        let decoded = MultiPath::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.row_hash(52).unwrap(), mp.row_hash(52).unwrap());
        assert_eq!(decoded.single_authority(), mp.single_authority());
    }
}
