//! Typed, per-cell salted source data (§4.6): a [`SourceRow`]'s hash is
//! the `input_hash` a skip ledger row commits to.

mod cell;
mod salt;

pub use cell::{Cell, CellValue};
pub use salt::derive_cell_salt;

use crate::core::errors::{SkError, SkResult};
use crate::core::hash::{sha256_concat, Hash};

/// One row of typed source data, keyed to a ledger row number.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceRow {
    pub row_no: u64,
    pub cells: Vec<Cell>,
}

impl SourceRow {
    pub fn new(row_no: u64, cells: Vec<Cell>) -> SkResult<Self> {
        if cells.is_empty() {
            return Err(SkError::OutOfBounds("source row must have at least one cell".into()));
        }
        Ok(SourceRow { row_no, cells })
    }

    /// `SHA256(H_1 || … || H_k)` over each cell's canonical hash — the
    /// value a ledger row's `input_hash` must equal.
    pub fn hash(&self) -> Hash {
        let hashes: Vec<Hash> = self.cells.iter().map(Cell::canonical_hash).collect();
        let slices: Vec<&[u8]> = hashes.iter().map(|h| h.as_ref()).collect();
        sha256_concat(&slices)
    }

    pub fn is_redacted(&self, col: usize) -> bool {
        self.cells.get(col).is_some_and(Cell::is_redaction)
    }

    /// Replace cell `col` with its literal canonical hash. Preserves
    /// [`SourceRow::hash`] by construction.
    pub fn redact(&self, col: usize) -> SkResult<SourceRow> {
        let cell = self
            .cells
            .get(col)
            .ok_or_else(|| SkError::OutOfBounds(format!("column {col} out of bounds")))?;
        let mut cells = self.cells.clone();
        cells[col] = Cell::redaction(cell.canonical_hash());
        Ok(SourceRow { row_no: self.row_no, cells })
    }

    /// Ordered, post-unsalting cell values — what cross-ledger
    /// `sameContent` references compare, per S4.
    pub fn cell_values(&self) -> Vec<&CellValue> {
        self.cells.iter().map(|c| &c.value).collect()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.row_no.to_be_bytes());
        out.extend_from_slice(&(self.cells.len() as u16).to_be_bytes());
        for cell in &self.cells {
            out.extend_from_slice(&cell.to_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> SkResult<(SourceRow, usize)> {
        let row_no_bytes = bytes.get(..8).ok_or_else(|| SkError::serial("truncated source row"))?;
        let row_no = u64::from_be_bytes(row_no_bytes.try_into().unwrap());
        let count_bytes = bytes.get(8..10).ok_or_else(|| SkError::serial("truncated source row"))?;
        let count = u16::from_be_bytes(count_bytes.try_into().unwrap()) as usize;

        let mut pos = 10;
        let mut cells = Vec::with_capacity(count);
        for _ in 0..count {
            let (cell, consumed) = Cell::from_bytes(&bytes[pos..])?;
            pos += consumed;
            cells.push(cell);
        }
        Ok((SourceRow { row_no, cells }, pos))
    }
}

/// Sorted, row-unique collection of [`SourceRow`]s backing a [`crate::nugget::Nugget`].
#[derive(Clone, Debug, Default)]
pub struct SourcePack {
    rows: Vec<SourceRow>,
}

impl SourcePack {
    pub fn new(rows: Vec<SourceRow>) -> SkResult<Self> {
        for w in rows.windows(2) {
            if w[0].row_no >= w[1].row_no {
                return Err(SkError::SerialFormat(format!(
                    "source rows must be strictly ascending by row_no, got {} then {}",
                    w[0].row_no, w[1].row_no
                )));
            }
        }
        Ok(SourcePack { rows })
    }

    pub fn get(&self, row_no: u64) -> Option<&SourceRow> {
        self.rows
            .binary_search_by(|r| r.row_no.cmp(&row_no))
            .ok()
            .map(|i| &self.rows[i])
    }

    pub fn row_numbers(&self) -> Vec<u64> {
        self.rows.iter().map(|r| r.row_no).collect()
    }

    pub fn rows(&self) -> &[SourceRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = (self.rows.len() as u32).to_be_bytes().to_vec();
        for row in &self.rows {
            out.extend_from_slice(&row.to_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> SkResult<SourcePack> {
        if bytes.is_empty() {
            return SourcePack::new(Vec::new());
        }
        let count_bytes = bytes.get(..4).ok_or_else(|| SkError::serial("truncated source pack"))?;
        let count = u32::from_be_bytes(count_bytes.try_into().unwrap()) as usize;
        let mut pos = 4;
        let mut rows = Vec::with_capacity(count);
        for _ in 0..count {
            let (row, consumed) = SourceRow::from_bytes(&bytes[pos..])?;
            pos += consumed;
            rows.push(row);
        }
        if pos != bytes.len() {
            return Err(SkError::serial("trailing bytes after source pack"));
        }
        SourcePack::new(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_preserves_row_hash() {
        let row = SourceRow::new(
            5,
            vec![Cell::string("hello"), Cell::long(42), Cell::null()],
        )
        .unwrap();
        let original_hash = row.hash();
        let redacted = row.redact(1).unwrap();
        assert_eq!(redacted.hash(), original_hash);
        assert!(redacted.is_redacted(1));
        assert!(!redacted.is_redacted(0));
    }

    #[test]
    fn s4_cell_data_equality_survives_distinct_salts() {
        let seed_a = [0x01u8; 32];
        let seed_b = [0x02u8; 32];
        let salt_a = derive_cell_salt(&seed_a, 9, 0);
        let salt_b = derive_cell_salt(&seed_b, 5, 2);
        assert_ne!(salt_a, salt_b);

        let cell_a = Cell::string("hello").salted(salt_a);
        let cell_b = Cell::string("hello").salted(salt_b);
        assert_ne!(cell_a.canonical_hash(), cell_b.canonical_hash());
        assert_eq!(cell_a.value, cell_b.value);
    }

    #[test]
    fn source_pack_wire_round_trips() {
        let rows = vec![
            SourceRow::new(1, vec![Cell::string("a"), Cell::long(1)]).unwrap(),
            SourceRow::new(3, vec![Cell::null()]).unwrap(),
        ];
        let pack = SourcePack::new(rows).unwrap();
        let bytes = pack.to_bytes();
        let decoded = SourcePack::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.row_numbers(), pack.row_numbers());
        assert_eq!(decoded.rows(), pack.rows());
    }

    #[test]
    fn source_pack_rejects_out_of_order_rows() {
        let r1 = SourceRow::new(5, vec![Cell::null()]).unwrap();
        let r2 = SourceRow::new(3, vec![Cell::null()]).unwrap();
        assert!(SourcePack::new(vec![r1, r2]).is_err());
    }
}
