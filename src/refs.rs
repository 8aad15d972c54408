//! Cross-ledger references (§3, §4.7): row→row, row→commitment, or
//! cell→cell pointers from one ledger's source data into another's.

use crate::core::errors::{SkError, SkResult};

pub const SAME_CONTENT_COL: i32 = -1;
pub const COMMIT_HASH_COL: i32 = -2;

/// A single cross-ledger pointer. The `col` fields' sentinel values pick
/// one of three modes: same-content (`from_col = to_col = -1`),
/// commit-hash (`to_col = -2`, `from_col >= 0`), or single-cell (both
/// `>= 0`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Reference {
    pub from_row: u64,
    pub from_col: i32,
    pub to_row: u64,
    pub to_col: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefMode {
    SameContent,
    CommitHash,
    SingleCell,
}

impl Reference {
    pub fn same_content(from_row: u64, to_row: u64) -> Self {
        Reference { from_row, from_col: SAME_CONTENT_COL, to_row, to_col: SAME_CONTENT_COL }
    }

    pub fn commit_hash(from_row: u64, from_col: i32, to_row: u64) -> SkResult<Self> {
        if from_col < 0 {
            return Err(SkError::MalformedReference {
                from_row,
                from_col,
                to_row,
                to_col: COMMIT_HASH_COL,
                reason: "commit-hash references require from_col >= 0".into(),
            });
        }
        Ok(Reference { from_row, from_col, to_row, to_col: COMMIT_HASH_COL })
    }

    pub fn single_cell(from_row: u64, from_col: i32, to_row: u64, to_col: i32) -> SkResult<Self> {
        if from_col < 0 || to_col < 0 {
            return Err(SkError::MalformedReference {
                from_row,
                from_col,
                to_row,
                to_col,
                reason: "single-cell references require both column indices >= 0".into(),
            });
        }
        Ok(Reference { from_row, from_col, to_row, to_col })
    }

    pub fn mode(&self) -> RefMode {
        match (self.from_col, self.to_col) {
            (SAME_CONTENT_COL, SAME_CONTENT_COL) => RefMode::SameContent,
            (_, COMMIT_HASH_COL) => RefMode::CommitHash,
            _ => RefMode::SingleCell,
        }
    }

    fn sort_key(&self) -> (u64, i32, u64, i32) {
        (self.from_row, self.from_col, self.to_row, self.to_col)
    }
}

/// `{ foreign_id, refs: sorted Reference[] }`, strictly increasing with no
/// duplicates.
#[derive(Clone, Debug)]
pub struct ForeignRefs {
    pub foreign_id: u32,
    refs: Vec<Reference>,
}

impl ForeignRefs {
    pub fn new(foreign_id: u32, refs: Vec<Reference>) -> SkResult<Self> {
        for w in refs.windows(2) {
            if w[0].sort_key() >= w[1].sort_key() {
                return Err(SkError::SerialFormat(format!(
                    "foreign refs for ledger {foreign_id} are not strictly sorted"
                )));
            }
        }
        Ok(ForeignRefs { foreign_id, refs })
    }

    pub fn refs(&self) -> &[Reference] {
        &self.refs
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.foreign_id.to_be_bytes().to_vec();
        out.extend_from_slice(&(self.refs.len() as u32).to_be_bytes());
        for r in &self.refs {
            out.extend_from_slice(&r.from_row.to_be_bytes());
            out.extend_from_slice(&r.from_col.to_be_bytes());
            out.extend_from_slice(&r.to_row.to_be_bytes());
            out.extend_from_slice(&r.to_col.to_be_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> SkResult<ForeignRefs> {
        let foreign_id = u32::from_be_bytes(
            bytes.get(..4).ok_or_else(|| SkError::serial("truncated foreign refs"))?.try_into().unwrap(),
        );
        let count = u32::from_be_bytes(
            bytes
                .get(4..8)
                .ok_or_else(|| SkError::serial("truncated foreign refs"))?
                .try_into()
                .unwrap(),
        ) as usize;
        let mut pos = 8;
        let mut refs = Vec::with_capacity(count);
        for _ in 0..count {
            let field = |p: usize, n: usize| -> SkResult<&[u8]> {
                bytes.get(p..p + n).ok_or_else(|| SkError::serial("truncated reference"))
            };
            let from_row = u64::from_be_bytes(field(pos, 8)?.try_into().unwrap());
            pos += 8;
            let from_col = i32::from_be_bytes(field(pos, 4)?.try_into().unwrap());
            pos += 4;
            let to_row = u64::from_be_bytes(field(pos, 8)?.try_into().unwrap());
            pos += 8;
            let to_col = i32::from_be_bytes(field(pos, 4)?.try_into().unwrap());
            pos += 4;
            refs.push(Reference { from_row, from_col, to_row, to_col });
        }
        if pos != bytes.len() {
            return Err(SkError::serial("trailing bytes after foreign refs"));
        }
        ForeignRefs::new(foreign_id, refs)
    }
}

/// Incremental, fail-fast builder maintaining [`ForeignRefs`]' sorted,
/// duplicate-free invariant; rejects commit-hash-only references against
/// a `commitsOnly` (timechain) foreign ledger.
pub struct ForeignRefsBuilder {
    foreign_id: u32,
    foreign_commits_only: bool,
    refs: Vec<Reference>,
}

impl ForeignRefsBuilder {
    pub fn new(foreign_id: u32, foreign_commits_only: bool) -> Self {
        ForeignRefsBuilder { foreign_id, foreign_commits_only, refs: Vec::new() }
    }

    /// Adds `r` if it sorts strictly after the last entry. Returns `false`
    /// (no-op) on an exact duplicate, per the "duplicate insert" builder
    /// convention in §7.
    pub fn add(&mut self, r: Reference) -> SkResult<bool> {
        if self.foreign_commits_only && r.to_col != COMMIT_HASH_COL {
            return Err(SkError::MalformedReference {
                from_row: r.from_row,
                from_col: r.from_col,
                to_row: r.to_row,
                to_col: r.to_col,
                reason: "only commit-hash references are legal against a commits-only ledger"
                    .into(),
            });
        }
        if let Some(last) = self.refs.last() {
            if r.sort_key() == last.sort_key() {
                return Ok(false);
            }
            if r.sort_key() < last.sort_key() {
                return Err(SkError::SerialFormat(format!(
                    "reference {r:?} does not sort after the last entry"
                )));
            }
        }
        self.refs.push(r);
        Ok(true)
    }

    pub fn build(self) -> SkResult<ForeignRefs> {
        ForeignRefs::new(self.foreign_id, self.refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsorted_refs() {
        let refs = vec![
            Reference::same_content(5, 10),
            Reference::same_content(2, 10),
        ];
        assert!(ForeignRefs::new(1, refs).is_err());
    }

    #[test]
    fn builder_rejects_exact_duplicate_as_noop() {
        let mut b = ForeignRefsBuilder::new(2, false);
        assert!(b.add(Reference::same_content(1, 2)).unwrap());
        assert!(!b.add(Reference::same_content(1, 2)).unwrap());
    }

    #[test]
    fn builder_rejects_non_commit_refs_against_commits_only_ledger() {
        let mut b = ForeignRefsBuilder::new(1, true);
        let err = b.add(Reference::same_content(1, 2)).unwrap_err();
        assert!(matches!(err, SkError::MalformedReference { .. }));
    }

    #[test]
    fn builder_accepts_commit_hash_against_commits_only_ledger() {
        let mut b = ForeignRefsBuilder::new(1, true);
        let r = Reference::commit_hash(9, 0, 64).unwrap();
        assert!(b.add(r).unwrap());
    }

    #[test]
    fn wire_round_trips() {
        let refs = vec![
            Reference::same_content(1, 2),
            Reference::single_cell(9, 0, 5, 2).unwrap(),
        ];
        let fr = ForeignRefs::new(3, refs).unwrap();
        let bytes = fr.to_bytes();
        let decoded = ForeignRefs::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.foreign_id, fr.foreign_id);
        assert_eq!(decoded.refs(), fr.refs());
    }
}
