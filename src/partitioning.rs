//! Fixed-width/length-prefixed framing for random-access byte partitions
//! (§2 C13): `u32 BE part-count + u32 BE[part-count] sizes + bytes`.

use crate::core::errors::{SkError, SkResult};

pub struct Partitioning;

impl Partitioning {
    pub fn encode(parts: &[Vec<u8>]) -> Vec<u8> {
        let mut out = (parts.len() as u32).to_be_bytes().to_vec();
        for p in parts {
            out.extend_from_slice(&(p.len() as u32).to_be_bytes());
        }
        for p in parts {
            out.extend_from_slice(p);
        }
        out
    }

    /// Decode, returning each part as a slice borrowed from `bytes` (no
    /// copy) and the total number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> SkResult<(Vec<&[u8]>, usize)> {
        let count = u32::from_be_bytes(
            bytes.get(..4).ok_or_else(|| SkError::serial("truncated partition count"))?.try_into().unwrap(),
        ) as usize;

        let sizes_start = 4;
        let sizes_end = sizes_start + 4 * count;
        let size_bytes = bytes
            .get(sizes_start..sizes_end)
            .ok_or_else(|| SkError::serial("truncated partition size table"))?;
        let sizes: Vec<usize> = size_bytes
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes(c.try_into().unwrap()) as usize)
            .collect();

        let mut pos = sizes_end;
        let mut parts = Vec::with_capacity(count);
        for size in sizes {
            let part = bytes
                .get(pos..pos + size)
                .ok_or_else(|| SkError::serial("partition part exceeds available bytes"))?;
            parts.push(part);
            pos += size;
        }
        Ok((parts, pos))
    }
}
