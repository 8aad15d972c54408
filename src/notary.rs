//! Witness proofs tying a ledger row's commitment hash to a timechain
//! block's cargo hash (§3, §4.7, §4.9).

use crate::core::errors::{SkError, SkResult};
use crate::core::hash::Hash;

/// `{ row_no, cargo_hash, utc }`. `cargo_hash` is the notarized row's full
/// commitment hash (`row_hash(row_no)`), not its bare input hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NotarizedRow {
    pub row_no: u64,
    pub cargo_hash: Hash,
    pub utc: i64,
}

impl NotarizedRow {
    pub fn new(row_no: u64, cargo_hash: Hash, utc: i64) -> Self {
        NotarizedRow { row_no, cargo_hash, utc }
    }
}

/// `{ chain_id, rows: NotarizedRow[] }`, strictly increasing in both
/// `row_no` and `utc`. Never empty.
#[derive(Clone, Debug)]
pub struct NotaryPack {
    pub chain_id: u32,
    rows: Vec<NotarizedRow>,
}

impl NotaryPack {
    pub fn new(chain_id: u32, rows: Vec<NotarizedRow>) -> SkResult<Self> {
        if rows.is_empty() {
            return Err(SkError::MalformedNotarizedRow {
                row_no: 0,
                chain_id,
                reason: "notary packs may not be empty".into(),
            });
        }
        for w in rows.windows(2) {
            if w[0].row_no >= w[1].row_no || w[0].utc >= w[1].utc {
                return Err(SkError::MalformedNotarizedRow {
                    row_no: w[1].row_no,
                    chain_id,
                    reason: "notary pack rows must be dual-monotonic in row_no and utc".into(),
                });
            }
        }
        Ok(NotaryPack { chain_id, rows })
    }

    pub fn rows(&self) -> &[NotarizedRow] {
        &self.rows
    }

    pub fn latest(&self) -> &NotarizedRow {
        self.rows.last().expect("non-empty by construction")
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.chain_id.to_be_bytes().to_vec();
        out.extend_from_slice(&(self.rows.len() as u32).to_be_bytes());
        for nr in &self.rows {
            out.extend_from_slice(&nr.row_no.to_be_bytes());
            out.extend_from_slice(nr.cargo_hash.as_bytes());
            out.extend_from_slice(&nr.utc.to_be_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> SkResult<NotaryPack> {
        let chain_id = u32::from_be_bytes(
            bytes.get(..4).ok_or_else(|| SkError::serial("truncated notary pack"))?.try_into().unwrap(),
        );
        let count = u32::from_be_bytes(
            bytes
                .get(4..8)
                .ok_or_else(|| SkError::serial("truncated notary pack"))?
                .try_into()
                .unwrap(),
        ) as usize;
        let mut pos = 8;
        let mut rows = Vec::with_capacity(count);
        for _ in 0..count {
            let row_no = u64::from_be_bytes(
                bytes.get(pos..pos + 8).ok_or_else(|| SkError::serial("truncated notarized row"))?.try_into().unwrap(),
            );
            pos += 8;
            let cargo_hash = Hash::from_slice(
                bytes.get(pos..pos + 32).ok_or_else(|| SkError::serial("truncated notarized row"))?,
            )
            .expect("32-byte slice");
            pos += 32;
            let utc = i64::from_be_bytes(
                bytes.get(pos..pos + 8).ok_or_else(|| SkError::serial("truncated notarized row"))?.try_into().unwrap(),
            );
            pos += 8;
            rows.push(NotarizedRow::new(row_no, cargo_hash, utc));
        }
        if pos != bytes.len() {
            return Err(SkError::serial("trailing bytes after notary pack"));
        }
        NotaryPack::new(chain_id, rows)
    }
}

/// Builder enforcing the §4.7 dual-monotonic insertion policy: a new
/// row is rejected outright if it proves no more than an existing witness
/// already does, and otherwise supersedes any earlier, now-redundant
/// entries it dominates.
#[derive(Default)]
pub struct NotaryPackBuilder {
    chain_id: u32,
    rows: Vec<NotarizedRow>,
}

impl NotaryPackBuilder {
    pub fn new(chain_id: u32) -> Self {
        NotaryPackBuilder { chain_id, rows: Vec::new() }
    }

    /// Attempts to insert `nr`. Returns `Ok(false)` (a no-op, not an
    /// error) when `nr` carries no new information; `Err(HashConflict)`
    /// when an existing entry at the same row number disagrees on hash.
    pub fn add(&mut self, nr: NotarizedRow) -> SkResult<bool> {
        let pos = self.rows.partition_point(|r| r.row_no < nr.row_no);

        if pos < self.rows.len() && self.rows[pos].row_no == nr.row_no {
            if self.rows[pos].cargo_hash != nr.cargo_hash {
                return Err(SkError::hash_conflict(
                    format!("notarized row {}", nr.row_no),
                    self.rows[pos].cargo_hash,
                    nr.cargo_hash,
                ));
            }
            return Ok(false);
        }

        if pos < self.rows.len() && nr.utc <= self.rows[pos].utc {
            return Ok(false);
        }

        self.rows.retain(|r| !(r.row_no < nr.row_no && r.utc >= nr.utc));
        let insert_at = self.rows.partition_point(|r| r.row_no < nr.row_no);
        self.rows.insert(insert_at, nr);
        Ok(true)
    }

    pub fn build(self) -> SkResult<NotaryPack> {
        NotaryPack::new(self.chain_id, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::sha256;

    fn cargo(i: u8) -> Hash {
        sha256(&[i])
    }

    #[test]
    fn s5_later_lower_row_with_equal_utc_is_rejected() {
        let mut b = NotaryPackBuilder::new(1);
        assert!(b.add(NotarizedRow::new(64, cargo(1), 1000)).unwrap());
        assert!(!b.add(NotarizedRow::new(32, cargo(2), 1000)).unwrap());
        let pack = b.build().unwrap();
        assert_eq!(pack.rows().len(), 1);
        assert_eq!(pack.rows()[0].row_no, 64);
    }

    #[test]
    fn earlier_strictly_better_witness_supersedes_later_ones() {
        let mut b = NotaryPackBuilder::new(1);
        assert!(b.add(NotarizedRow::new(64, cargo(1), 2000)).unwrap());
        // proves more (128 > 64) at no later a time: supersedes row 64.
        assert!(b.add(NotarizedRow::new(128, cargo(2), 1500)).unwrap());
        let pack = b.build().unwrap();
        assert_eq!(pack.rows().len(), 1);
        assert_eq!(pack.rows()[0].row_no, 128);
    }

    #[test]
    fn conflicting_hash_at_same_row_is_fatal() {
        let mut b = NotaryPackBuilder::new(1);
        b.add(NotarizedRow::new(64, cargo(1), 1000)).unwrap();
        let err = b.add(NotarizedRow::new(64, cargo(2), 2000)).unwrap_err();
        assert!(matches!(err, SkError::HashConflict { .. }));
    }

    #[test]
    fn rejects_empty_pack() {
        assert!(NotaryPack::new(1, vec![]).is_err());
    }

    #[test]
    fn wire_round_trips() {
        let pack = NotaryPack::new(
            7,
            vec![NotarizedRow::new(10, cargo(1), 1000), NotarizedRow::new(20, cargo(2), 2000)],
        )
        .unwrap();
        let bytes = pack.to_bytes();
        let decoded = NotaryPack::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.chain_id, pack.chain_id);
        assert_eq!(decoded.rows(), pack.rows());
    }
}
