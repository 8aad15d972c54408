//! The legacy `.morsel` container (§6), superseded by the `.bindl` bindle
//! format in [`crate::bindle`]. Kept for reading archived morsels: the
//! outer framing and the row-pack section are implemented; trail-pack,
//! source-pack, path-pack, and the named-asset block are opaque byte
//! slices a caller can hand to the newer [`crate::source`]/[`crate::notary`]
//! decoders directly, since their inner encodings are unchanged.

use std::collections::BTreeMap;

use crate::core::errors::{SkError, SkResult};
use crate::core::hash::{Hash, SENTINEL};
use crate::core::row_math::{self, skip_count};
use crate::ledger::path::Path;
use crate::ledger::row::{LevelsPointer, Row};

const MORSEL_MAGIC: &[u8; 10] = b"MRSL  0.3 ";
const MIN_PACK_COUNT: usize = 4;

/// The outer `.morsel` framing: a fixed magic/version header followed by a
/// random-access table of named packs.
pub struct MorselFile {
    packs: Vec<Vec<u8>>,
}

impl MorselFile {
    /// `packs` must hold at least [`MIN_PACK_COUNT`] sections, in the order
    /// row-pack, trail-pack, source-pack, path-pack, [assets].
    pub fn new(packs: Vec<Vec<u8>>) -> SkResult<Self> {
        if packs.len() < MIN_PACK_COUNT {
            return Err(SkError::serial(format!(
                "morsel must carry at least {MIN_PACK_COUNT} packs, got {}",
                packs.len()
            )));
        }
        if packs.len() > u8::MAX as usize {
            return Err(SkError::serial("morsel pack count exceeds a single byte"));
        }
        Ok(MorselFile { packs })
    }

    pub fn packs(&self) -> &[Vec<u8>] {
        &self.packs
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = MORSEL_MAGIC.to_vec();
        out.push(self.packs.len() as u8);
        for p in &self.packs {
            out.extend_from_slice(&(p.len() as u32).to_be_bytes());
        }
        for p in &self.packs {
            out.extend_from_slice(p);
        }
        out
    }

    pub fn load(bytes: &[u8]) -> SkResult<MorselFile> {
        if bytes.len() < MORSEL_MAGIC.len() + 1 || &bytes[..MORSEL_MAGIC.len()] != MORSEL_MAGIC {
            return Err(SkError::serial("not a morsel file: bad magic"));
        }
        let mut pos = MORSEL_MAGIC.len();
        let pack_count = bytes[pos] as usize;
        pos += 1;
        if pack_count < MIN_PACK_COUNT {
            return Err(SkError::serial(format!(
                "morsel pack count {pack_count} is below the minimum {MIN_PACK_COUNT}"
            )));
        }

        let sizes_end = pos + 4 * pack_count;
        let size_bytes = bytes
            .get(pos..sizes_end)
            .ok_or_else(|| SkError::serial("truncated morsel pack size table"))?;
        let sizes: Vec<usize> = size_bytes
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes(c.try_into().unwrap()) as usize)
            .collect();
        pos = sizes_end;

        let mut packs = Vec::with_capacity(pack_count);
        for size in sizes {
            let chunk = bytes.get(pos..pos + size).ok_or_else(|| SkError::serial("truncated morsel pack body"))?;
            packs.push(chunk.to_vec());
            pos += size;
        }

        MorselFile::new(packs)
    }
}

/// The legacy row-pack section: a full (uncondensed) set of path members,
/// laid out `I_COUNT RN_LIST R_TBL I_TBL` — the reverse field order of the
/// modern [`crate::ledger::PathPack`]'s full form.
pub struct RowPack {
    row_numbers: Vec<u64>,
    ref_hashes: Vec<Hash>,
    input_hashes: Vec<Hash>,
}

impl RowPack {
    pub fn from_path(path: &Path) -> Self {
        let row_numbers = path.row_numbers();
        let ref_nos = row_math::ref_only_coverage(&row_numbers);
        let known = path.known_hash_map();
        let ref_hashes = ref_nos.iter().map(|n| known.get(n).copied().unwrap_or(SENTINEL)).collect();
        let input_hashes = path.rows().iter().map(|r| r.input_hash).collect();
        RowPack { row_numbers, ref_hashes, input_hashes }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = (self.row_numbers.len() as u32).to_be_bytes().to_vec();
        for &n in &self.row_numbers {
            out.extend_from_slice(&n.to_be_bytes());
        }
        for h in &self.ref_hashes {
            out.extend_from_slice(h.as_bytes());
        }
        for h in &self.input_hashes {
            out.extend_from_slice(h.as_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> SkResult<RowPack> {
        let i_count = u32::from_be_bytes(
            bytes.get(..4).ok_or_else(|| SkError::serial("truncated row-pack"))?.try_into().unwrap(),
        ) as usize;
        let mut pos = 4;
        let mut row_numbers = Vec::with_capacity(i_count);
        for _ in 0..i_count {
            let n = u64::from_be_bytes(
                bytes.get(pos..pos + 8).ok_or_else(|| SkError::serial("truncated row-pack RN_LIST"))?.try_into().unwrap(),
            );
            pos += 8;
            row_numbers.push(n);
        }
        if !row_numbers.windows(2).all(|w| w[0] < w[1]) {
            return Err(SkError::serial("row-pack RN_LIST is not strictly ascending"));
        }

        let r_count = row_math::ref_only_coverage(&row_numbers).len();
        let mut ref_hashes = Vec::with_capacity(r_count);
        for _ in 0..r_count {
            let h = bytes.get(pos..pos + 32).ok_or_else(|| SkError::serial("truncated row-pack R_TBL"))?;
            ref_hashes.push(Hash::from_slice(h).expect("32-byte slice"));
            pos += 32;
        }

        let mut input_hashes = Vec::with_capacity(i_count);
        for _ in 0..i_count {
            let h = bytes.get(pos..pos + 32).ok_or_else(|| SkError::serial("truncated row-pack I_TBL"))?;
            input_hashes.push(Hash::from_slice(h).expect("32-byte slice"));
            pos += 32;
        }

        if pos != bytes.len() {
            return Err(SkError::serial("trailing bytes after row-pack"));
        }

        Ok(RowPack { row_numbers, ref_hashes, input_hashes })
    }

    /// Reconstruct and validate the [`Path`] this row-pack encodes.
    pub fn path(&self) -> SkResult<Path> {
        let ref_map: BTreeMap<u64, Hash> =
            row_math::ref_only_coverage(&self.row_numbers).into_iter().zip(self.ref_hashes.iter().copied()).collect();

        let mut rows = Vec::with_capacity(self.row_numbers.len());
        let mut hash_by_no: BTreeMap<u64, Hash> = BTreeMap::new();
        for (i, &n) in self.row_numbers.iter().enumerate() {
            let p = skip_count(n) as usize;
            let mut levels = Vec::with_capacity(p);
            for k in 0..p {
                let step = 1u64 << k;
                let h = if n <= step {
                    SENTINEL
                } else {
                    let pred = n - step;
                    hash_by_no
                        .get(&pred)
                        .or_else(|| ref_map.get(&pred))
                        .copied()
                        .ok_or_else(|| SkError::serial(format!("no hash available for referenced row {pred}")))?
                };
                levels.push(h);
            }
            let row = Row::new(n, self.input_hashes[i], LevelsPointer::full(levels));
            hash_by_no.insert(n, row.hash());
            rows.push(row);
        }
        Path::new(rows)
    }
}
