//! Binary, zero-copy-friendly packing of a [`Path`] (§4.4).
//!
//! ```text
//! PATH_PACK := TYPE SR_COUNT STITCH_RNS I_TBL [FUNNELS] R_TBL
//! TYPE       := u8      (0 = full, 1 = condensed)
//! SR_COUNT   := u32 BE
//! STITCH_RNS := u64 BE [SR_COUNT]    (strict-ascending)
//! I_TBL      := byte[32 * SR_COUNT]
//! FUNNELS    := byte[F]              (only if TYPE = 1)
//! R_TBL      := byte[32 * R_COUNT]
//! ```
//!
//! `STITCH_RNS` is always already `stitch()`-closed (a [`Path`]'s member
//! row numbers are idempotent under `stitch`), so `I_COUNT == SR_COUNT`
//! and no seed/expansion distinction needs to survive the wire format.
//!
//! In condensed packs, only the path's lowest row (`lo`) keeps a full
//! levels pointer; every other member condenses to the single level
//! linking it to its immediate predecessor, whose hash is always
//! reconstructible from the chain itself. `R_TBL` therefore shrinks from
//! `ref_only_coverage(members)` (full) to `ref_only_coverage({lo})`
//! (condensed), and funnel lengths are derived purely from each row
//! number's `skip_count`, so no explicit length or side bits are stored.

use std::collections::BTreeMap;

use crate::core::errors::{SkError, SkResult};
use crate::core::hash::{Hash, SENTINEL};
use crate::core::merkle::{self, Side};
use crate::core::row_math::{self, skip_count};
use crate::ledger::path::Path;
use crate::ledger::row::{LevelsPointer, Row};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackType {
    Full = 0,
    Condensed = 1,
}

/// The decoded, owned form of a `PATH_PACK`. Call [`PathPack::path`] to
/// recover the validated [`Path`] it encodes.
#[derive(Clone, Debug)]
pub struct PathPack {
    pub pack_type: PackType,
    pub stitch_row_nos: Vec<u64>,
    pub input_hashes: Vec<Hash>,
    /// Raw funnel hashes, concatenated in member order (condensed only).
    pub funnel_hashes: Vec<Hash>,
    pub ref_hashes: Vec<Hash>,
}

impl PathPack {
    /// Build the compact (condensed) pack for `path`.
    pub fn from_path(path: &Path) -> Self {
        Self::build(path, PackType::Condensed)
    }

    /// Build the full pack for `path`.
    pub fn from_path_full(path: &Path) -> Self {
        Self::build(path, PackType::Full)
    }

    fn build(path: &Path, pack_type: PackType) -> Self {
        let members = path.row_numbers();
        let input_hashes: Vec<Hash> = path.rows().iter().map(|r| r.input_hash).collect();

        match pack_type {
            PackType::Full => {
                let ref_nos = row_math::ref_only_coverage(&members);
                let known = path.known_hash_map();
                let ref_hashes = ref_nos
                    .iter()
                    .map(|n| known.get(n).copied().unwrap_or(SENTINEL))
                    .collect();
                PathPack {
                    pack_type,
                    stitch_row_nos: members,
                    input_hashes,
                    funnel_hashes: Vec::new(),
                    ref_hashes,
                }
            }
            PackType::Condensed => {
                let lo = members[0];
                let ref_nos = row_math::ref_only_coverage(&[lo]);
                let known = path.known_hash_map();
                let ref_hashes = ref_nos
                    .iter()
                    .map(|n| known.get(n).copied().unwrap_or(SENTINEL))
                    .collect();

                let mut funnel_hashes = Vec::new();
                for pair in path.rows().windows(2) {
                    let (prev, cur) = (&pair[0], &pair[1]);
                    let p = skip_count(cur.n) as usize;
                    if p < 2 {
                        continue;
                    }
                    let k = (cur.n - prev.n).trailing_zeros() as usize;
                    let condensed = cur.levels.condense(k);
                    if let LevelsPointer::Condensed { funnel, .. } = condensed {
                        funnel_hashes.extend(funnel.into_iter().map(|(h, _)| h));
                    }
                }

                PathPack {
                    pack_type,
                    stitch_row_nos: members,
                    input_hashes,
                    funnel_hashes,
                    ref_hashes,
                }
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.pack_type as u8);
        out.extend_from_slice(&(self.stitch_row_nos.len() as u32).to_be_bytes());
        for &n in &self.stitch_row_nos {
            out.extend_from_slice(&n.to_be_bytes());
        }
        for h in &self.input_hashes {
            out.extend_from_slice(h.as_bytes());
        }
        if self.pack_type == PackType::Condensed {
            for h in &self.funnel_hashes {
                out.extend_from_slice(h.as_bytes());
            }
        }
        for h in &self.ref_hashes {
            out.extend_from_slice(h.as_bytes());
        }
        out
    }

    pub fn deserialize(bytes: &[u8]) -> SkResult<Self> {
        let mut cur = Cursor { bytes, pos: 0 };

        let type_byte = cur.take_u8()?;
        let pack_type = match type_byte {
            0 => PackType::Full,
            1 => PackType::Condensed,
            other => return Err(SkError::serial(format!("unknown pack type byte {other}"))),
        };

        let sr_count = cur.take_u32()? as usize;
        if sr_count == 0 {
            return Err(SkError::serial("SR_COUNT is zero"));
        }

        let mut stitch_row_nos = Vec::with_capacity(sr_count);
        for _ in 0..sr_count {
            stitch_row_nos.push(cur.take_u64()?);
        }
        if !stitch_row_nos.windows(2).all(|w| w[0] < w[1]) {
            return Err(SkError::serial("stitch row numbers are not strictly ascending"));
        }
        if stitch_row_nos.first().copied().unwrap_or(0) < 1 {
            return Err(SkError::serial("row numbers must be >= 1"));
        }
        // stitch() must be a no-op on a well-formed pack: re-running it
        // must not introduce intermediate rows we weren't given data for.
        if row_math::stitch(&stitch_row_nos) != stitch_row_nos {
            return Err(SkError::serial("stitch row numbers are not stitch-closed"));
        }

        let mut input_hashes = Vec::with_capacity(sr_count);
        for _ in 0..sr_count {
            input_hashes.push(cur.take_hash()?);
        }

        let mut funnel_hashes = Vec::new();
        if pack_type == PackType::Condensed {
            for pair in stitch_row_nos.windows(2) {
                let p = skip_count(pair[1]) as usize;
                if p < 2 {
                    continue;
                }
                let len = merkle::funnel_len(p);
                for _ in 0..len {
                    funnel_hashes.push(cur.take_hash()?);
                }
            }
        }

        let ref_count = match pack_type {
            PackType::Full => row_math::ref_only_coverage(&stitch_row_nos).len(),
            PackType::Condensed => {
                row_math::ref_only_coverage(&[stitch_row_nos[0]]).len()
            }
        };
        let mut ref_hashes = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            ref_hashes.push(cur.take_hash()?);
        }

        if !cur.is_exhausted() {
            return Err(SkError::serial("trailing bytes after R_TBL"));
        }

        Ok(PathPack {
            pack_type,
            stitch_row_nos,
            input_hashes,
            funnel_hashes,
            ref_hashes,
        })
    }

    /// Reconstruct and validate the [`Path`] this pack encodes.
    pub fn path(&self) -> SkResult<Path> {
        let members = &self.stitch_row_nos;
        let ref_map: BTreeMap<u64, Hash> = match self.pack_type {
            PackType::Full => row_math::ref_only_coverage(members)
                .into_iter()
                .zip(self.ref_hashes.iter().copied())
                .collect(),
            PackType::Condensed => row_math::ref_only_coverage(&[members[0]])
                .into_iter()
                .zip(self.ref_hashes.iter().copied())
                .collect(),
        };

        let mut rows = Vec::with_capacity(members.len());
        let mut hash_by_no: BTreeMap<u64, Hash> = BTreeMap::new();

        match self.pack_type {
            PackType::Full => {
                for (i, &n) in members.iter().enumerate() {
                    let p = skip_count(n) as usize;
                    let mut levels = Vec::with_capacity(p);
                    for k in 0..p {
                        let step = 1u64 << k;
                        let h = if n <= step {
                            SENTINEL
                        } else {
                            let pred = n - step;
                            if let Some(&h) = hash_by_no.get(&pred) {
                                h
                            } else if let Some(&h) = ref_map.get(&pred) {
                                h
                            } else {
                                return Err(SkError::serial(format!(
                                    "no hash available for referenced row {pred}"
                                )));
                            }
                        };
                        levels.push(h);
                    }
                    let row = Row::new(n, self.input_hashes[i], LevelsPointer::full(levels));
                    hash_by_no.insert(n, row.hash());
                    rows.push(row);
                }
            }
            PackType::Condensed => {
                let mut funnel_iter = self.funnel_hashes.iter().copied();
                for (i, &n) in members.iter().enumerate() {
                    let p = skip_count(n) as usize;
                    let row = if i == 0 {
                        let mut levels = Vec::with_capacity(p);
                        for k in 0..p {
                            let step = 1u64 << k;
                            let h = if n <= step {
                                SENTINEL
                            } else {
                                *ref_map.get(&(n - step)).ok_or_else(|| {
                                    SkError::serial(format!(
                                        "missing ref hash for lo's predecessor row {}",
                                        n - step
                                    ))
                                })?
                            };
                            levels.push(h);
                        }
                        Row::new(n, self.input_hashes[i], LevelsPointer::full(levels))
                    } else {
                        let prev_n = members[i - 1];
                        let level = (n - prev_n).trailing_zeros() as usize;
                        let prev_hash = hash_by_no[&prev_n];
                        if p < 2 {
                            Row::new(
                                n,
                                self.input_hashes[i],
                                LevelsPointer::Condensed {
                                    level,
                                    hash: prev_hash,
                                    funnel: Vec::new(),
                                },
                            )
                        } else {
                            let len = merkle::funnel_len(p);
                            let sides = merkle::funnel_sides(p, level);
                            let mut funnel = Vec::with_capacity(len);
                            for side in sides {
                                let h = funnel_iter.next().ok_or_else(|| {
                                    SkError::serial("funnel block underflow")
                                })?;
                                funnel.push((h, side));
                            }
                            Row::new(
                                n,
                                self.input_hashes[i],
                                LevelsPointer::Condensed {
                                    level,
                                    hash: prev_hash,
                                    funnel,
                                },
                            )
                        }
                    };
                    hash_by_no.insert(n, row.hash());
                    rows.push(row);
                }
            }
        }

        Path::new(rows)
    }
}

/// Minimal cursor for big-endian framed reads with bounds checking.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> SkResult<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(SkError::serial("unexpected end of pack"));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u8(&mut self) -> SkResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn take_u32(&mut self) -> SkResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes(b.try_into().unwrap()))
    }

    fn take_u64(&mut self) -> SkResult<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes(b.try_into().unwrap()))
    }

    fn take_hash(&mut self) -> SkResult<Hash> {
        let b = self.take(Hash::LEN)?;
        Ok(Hash::from_slice(b).expect("fixed 32-byte slice"))
    }

    fn is_exhausted(&self) -> bool {
        self.pos == self.bytes.len()
    }
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
    fn round_trip_full_pack() {
        let ledger = build_ledger(52);
        let path = ledger.skip_path(11, 52).unwrap();
        let pack = PathPack::from_path_full(&path);
        let bytes = pack.serialize();
        let loaded = PathPack::deserialize(&bytes).unwrap();
        assert_eq!(loaded.serialize(), bytes, "byte-identical round trip");
        let reconstructed = loaded.path().unwrap();
        assert_eq!(reconstructed.get_row_hash(52), path.get_row_hash(52));
        assert_eq!(reconstructed.row_numbers(), path.row_numbers());
    }

    #[test]
    fn round_trip_condensed_pack_preserves_hi_hash() {
        let ledger = build_ledger(16);
        let path = ledger.state_path().unwrap();
        let pack = PathPack::from_path(&path);
        let bytes = pack.serialize();
        let loaded = PathPack::deserialize(&bytes).unwrap();
        let reconstructed = loaded.path().unwrap();
        assert_eq!(reconstructed.get_row_hash(16), path.get_row_hash(16));
    }

    #[test]
    fn condensed_pack_is_smaller_than_full() {
        let ledger = build_ledger(64);
        let path = ledger.state_path().unwrap();
        let full = PathPack::from_path_full(&path).serialize().len();
        let condensed = PathPack::from_path(&path).serialize().len();
        assert!(condensed < full, "{condensed} >= {full}");
    }

    #[test]
    fn rejects_out_of_order_stitch_numbers() {
        let mut bytes = vec![0u8]; // full
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(&4u64.to_be_bytes());
        bytes.extend_from_slice(&2u64.to_be_bytes()); // descending -> invalid
        let err = PathPack::deserialize(&bytes).unwrap_err();
        assert!(matches!(err, SkError::SerialFormat(_)));
    }

    #[test]
    fn rejects_truncated_input() {
        let bytes = vec![0u8, 0, 0, 0, 1]; // claims 1 row, no data follows
        assert!(PathPack::deserialize(&bytes).is_err());
    }
}
