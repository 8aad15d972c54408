//! The append-only store of rows and the primitive operations
//! (`get_row`, `row_hash`, `append_rows`, `skip_path`, `get_path`) every
//! higher layer is built from.

use crate::core::errors::{SkError, SkResult};
use crate::core::hash::{Hash, SENTINEL};
use crate::core::row_math::{self, skip_count};
use crate::ledger::path::Path;
use crate::ledger::row::{LevelsPointer, Row};

/// Shared contract for an append-only skip ledger, whether backed by
/// memory ([`MemSkipLedger`]) or a growing file ([`crate::ledger::skip_ledger_file::SkipLedgerFile`]).
///
/// Implementations must serialize writes (one writer, many readers); after
/// `append_rows` returns, the appended rows are visible to subsequent
/// reads in the same process, and no partially-written row is ever
/// observable.
pub trait SkipLedger {
    fn size(&self) -> u64;

    /// Append one row per 32-byte input hash. Returns the new size.
    fn append_rows(&mut self, input_hashes: &[Hash]) -> SkResult<u64>;

    /// Returns the row at `n`. `RowNotFound` if `n < 1` or `n > size()`.
    fn get_row(&self, n: u64) -> SkResult<Row>;

    /// `SENTINEL` at `n = 0`, else the SHA-256 of row `n`'s canonical form.
    fn row_hash(&self, n: u64) -> SkResult<Hash> {
        if n == 0 {
            return Ok(SENTINEL);
        }
        Ok(self.get_row(n)?.hash())
    }

    /// A [`Path`] whose row numbers equal `stitch(row_nos)`.
    fn get_path(&self, row_nos: &[u64]) -> SkResult<Path> {
        let stitched = row_math::stitch(row_nos);
        let rows = stitched
            .iter()
            .map(|&n| self.get_row(n))
            .collect::<SkResult<Vec<_>>>()?;
        Path::new(rows)
    }

    /// `get_path(skip_path_numbers(lo, hi))`.
    fn skip_path(&self, lo: u64, hi: u64) -> SkResult<Path> {
        self.get_path(&row_math::skip_path_numbers(lo, hi))
    }

    /// `skip_path(1, size())`.
    fn state_path(&self) -> SkResult<Path> {
        self.skip_path(1, self.size())
    }
}

/// In-memory [`SkipLedger`]. Input hashes and level-hash cells are stored
/// in two flat vectors, the level cells laid out exactly as the storage
/// contract describes: `cell_number(n)` cells precede row `n`'s own
/// `skip_count(n)` level-hash cells.
#[derive(Default)]
pub struct MemSkipLedger {
    input_hashes: Vec<Hash>,
    cells: Vec<Hash>,
}

impl MemSkipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_row_bounds(&self, n: u64) -> SkResult<()> {
        if n < 1 || n > self.size() {
            return Err(SkError::RowNotFound(n));
        }
        Ok(())
    }

    fn append_one(&mut self, input_hash: Hash) -> SkResult<()> {
        let n = self.size() + 1;
        let p = skip_count(n) as usize;
        let mut levels = Vec::with_capacity(p);
        for k in 0..p {
            let step = 1u64 << k;
            let pred_hash = if n > step {
                self.row_hash(n - step)?
            } else {
                SENTINEL
            };
            levels.push(pred_hash);
        }
        self.input_hashes.push(input_hash);
        self.cells.extend(levels);
        Ok(())
    }
}

impl SkipLedger for MemSkipLedger {
    fn size(&self) -> u64 {
        self.input_hashes.len() as u64
    }

    fn append_rows(&mut self, input_hashes: &[Hash]) -> SkResult<u64> {
        for &ih in input_hashes {
            self.append_one(ih)?;
        }
        Ok(self.size())
    }

    fn get_row(&self, n: u64) -> SkResult<Row> {
        self.check_row_bounds(n)?;
        let p = skip_count(n) as usize;
        let offset = row_math::cell_number(n) as usize;
        let levels = self.cells[offset..offset + p].to_vec();
        let input_hash = self.input_hashes[(n - 1) as usize];
        Ok(Row::new(n, input_hash, LevelsPointer::full(levels)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::sha256;

    fn input(i: u64) -> Hash {
        sha256(&i.to_be_bytes())
    }

    #[test]
    fn s1_empty_to_one_row() {
        let mut ledger = MemSkipLedger::new();
        let ih = Hash::from_slice(&[0x11; 32]).unwrap();
        let size = ledger.append_rows(&[ih]).unwrap();
        assert_eq!(size, 1);
        let row = ledger.get_row(1).unwrap();
        assert_eq!(row.input_hash, ih);
        let expected = crate::core::hash::combine_row_hash(&ih, &SENTINEL);
        assert_eq!(ledger.row_hash(1).unwrap(), expected);
        assert_eq!(ledger.skip_path(1, 1).unwrap().len(), 1);
    }

    #[test]
    fn row_hash_determinism_across_two_ledgers() {
        let mut a = MemSkipLedger::new();
        let mut b = MemSkipLedger::new();
        let inputs: Vec<Hash> = (0..40).map(input).collect();
        a.append_rows(&inputs).unwrap();
        b.append_rows(&inputs).unwrap();
        for n in 1..=40u64 {
            assert_eq!(a.row_hash(n).unwrap(), b.row_hash(n).unwrap());
        }
    }

    #[test]
    fn s2_sixteen_row_condensation() {
        let mut ledger = MemSkipLedger::new();
        let inputs: Vec<Hash> = (0..16).map(input).collect();
        ledger.append_rows(&inputs).unwrap();

        let state = ledger.state_path().unwrap();
        let nos: Vec<u64> = state.row_numbers();
        assert_eq!(nos, vec![1, 2, 4, 8, 16]);

        let compressed = state.compress();
        assert_eq!(
            compressed.get_row_hash(16).unwrap(),
            state.get_row_hash(16).unwrap()
        );
        assert!(compressed.pack_len() < state.pack_len());
    }

    #[test]
    fn get_row_out_of_bounds_errors() {
        let ledger = MemSkipLedger::new();
        assert!(matches!(ledger.get_row(1), Err(SkError::RowNotFound(1))));
    }
}
