//! A single typed, optionally-salted source cell and its canonical hash
//! (§4.6).

use crate::core::errors::{SkError, SkResult};
use crate::core::hash::{sha256_concat, Hash};

const MAX_VARIABLE_LEN: usize = 16 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Null,
    Hash(Hash),
    Bytes(Vec<u8>),
    String(String),
    Long(i64),
    Double(f64),
    /// Milliseconds since epoch.
    Date(i64),
}

impl CellValue {
    fn type_code(&self) -> u8 {
        match self {
            CellValue::Null => 1,
            CellValue::Hash(_) => 2,
            CellValue::Bytes(_) => 3,
            CellValue::String(_) => 4,
            CellValue::Long(_) => 5,
            CellValue::Double(_) => 6,
            CellValue::Date(_) => 7,
        }
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            CellValue::Null => Vec::new(),
            CellValue::Hash(h) => h.as_bytes().to_vec(),
            CellValue::Bytes(b) => encode_variable(b),
            CellValue::String(s) => encode_variable(s.as_bytes()),
            CellValue::Long(v) => v.to_be_bytes().to_vec(),
            CellValue::Double(v) => v.to_bits().to_be_bytes().to_vec(),
            CellValue::Date(v) => v.to_be_bytes().to_vec(),
        }
    }
}

fn encode_variable(bytes: &[u8]) -> Vec<u8> {
    assert!(bytes.len() <= MAX_VARIABLE_LEN, "cell payload exceeds 16 MiB");
    let len = bytes.len() as u32;
    let mut out = Vec::with_capacity(3 + bytes.len());
    out.extend_from_slice(&len.to_be_bytes()[1..]); // 3-byte BE length
    out.extend_from_slice(bytes);
    out
}

/// A typed cell value plus its optional per-cell salt.
///
/// A `hash`-typed cell (`CellValue::Hash`) is never salted: it stands for
/// redaction, and its canonical hash is its literal 32 bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub salt: Option<[u8; 32]>,
}

impl Cell {
    pub fn new(value: CellValue) -> Self {
        assert!(
            !matches!(value, CellValue::Hash(_)),
            "use Cell::redaction for hash-typed cells"
        );
        Cell { value, salt: None }
    }

    pub fn null() -> Self {
        Cell { value: CellValue::Null, salt: None }
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Cell::new(CellValue::Bytes(b.into()))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Cell::new(CellValue::String(s.into()))
    }

    pub fn long(v: i64) -> Self {
        Cell::new(CellValue::Long(v))
    }

    pub fn double(v: f64) -> Self {
        Cell::new(CellValue::Double(v))
    }

    pub fn date(v: i64) -> Self {
        Cell::new(CellValue::Date(v))
    }

    /// A redaction cell: the literal canonical hash of whatever value it
    /// replaces. Never salted.
    pub fn redaction(hash: Hash) -> Self {
        Cell { value: CellValue::Hash(hash), salt: None }
    }

    pub fn salted(mut self, salt: [u8; 32]) -> Self {
        assert!(
            !matches!(self.value, CellValue::Hash(_)),
            "hash-typed (redaction) cells must not be salted"
        );
        self.salt = Some(salt);
        self
    }

    pub fn is_redaction(&self) -> bool {
        matches!(self.value, CellValue::Hash(_))
    }

    /// `SHA256(salt || typecode || value)` when salted, `SHA256(typecode ||
    /// value)` otherwise — or, for a redaction cell, its literal hash.
    pub fn canonical_hash(&self) -> Hash {
        if let CellValue::Hash(h) = &self.value {
            return *h;
        }
        let type_byte = [self.value.type_code()];
        let encoded = self.value.encode();
        match &self.salt {
            Some(salt) => sha256_concat(&[salt, &type_byte, &encoded]),
            None => sha256_concat(&[&type_byte, &encoded]),
        }
    }

    /// Wire encoding: a signed type-code byte (negative = salted),
    /// optionally followed by a 32-byte salt, then the typed value.
    pub fn to_bytes(&self) -> Vec<u8> {
        let tc = self.value.type_code() as i8;
        let signed = if self.salt.is_some() { -tc } else { tc };
        let mut out = vec![signed as u8];
        if let Some(salt) = &self.salt {
            out.extend_from_slice(salt);
        }
        out.extend_from_slice(&self.value.encode());
        out
    }

    /// Decode one cell from the front of `bytes`, returning it and the
    /// number of bytes consumed.
    pub fn from_bytes(bytes: &[u8]) -> SkResult<(Cell, usize)> {
        let signed = *bytes.first().ok_or_else(|| SkError::serial("empty cell"))? as i8;
        let salted = signed < 0;
        let tc = signed.unsigned_abs();
        let mut pos = 1;
        let salt = if salted {
            let s = bytes
                .get(pos..pos + 32)
                .ok_or_else(|| SkError::serial("truncated cell salt"))?;
            pos += 32;
            let mut buf = [0u8; 32];
            buf.copy_from_slice(s);
            Some(buf)
        } else {
            None
        };

        let (value, consumed) = decode_value(tc, &bytes[pos..])?;
        pos += consumed;

        if salted && matches!(value, CellValue::Hash(_)) {
            return Err(SkError::serial("hash-typed cells must not be salted"));
        }
        Ok((Cell { value, salt }, pos))
    }
}

fn decode_value(tc: u8, bytes: &[u8]) -> SkResult<(CellValue, usize)> {
    match tc {
        1 => Ok((CellValue::Null, 0)),
        2 => {
            let b = bytes.get(..32).ok_or_else(|| SkError::serial("truncated hash cell"))?;
            Ok((CellValue::Hash(Hash::from_slice(b).expect("32-byte slice")), 32))
        }
        3 => {
            let (payload, consumed) = decode_variable(bytes)?;
            Ok((CellValue::Bytes(payload), consumed))
        }
        4 => {
            let (payload, consumed) = decode_variable(bytes)?;
            let s = String::from_utf8(payload).map_err(|_| SkError::serial("invalid UTF-8 in string cell"))?;
            Ok((CellValue::String(s), consumed))
        }
        5 => {
            let b = bytes.get(..8).ok_or_else(|| SkError::serial("truncated long cell"))?;
            Ok((CellValue::Long(i64::from_be_bytes(b.try_into().unwrap())), 8))
        }
        6 => {
            let b = bytes.get(..8).ok_or_else(|| SkError::serial("truncated double cell"))?;
            Ok((CellValue::Double(f64::from_bits(u64::from_be_bytes(b.try_into().unwrap()))), 8))
        }
        7 => {
            let b = bytes.get(..8).ok_or_else(|| SkError::serial("truncated date cell"))?;
            Ok((CellValue::Date(i64::from_be_bytes(b.try_into().unwrap())), 8))
        }
        other => Err(SkError::serial(format!("unknown cell type code {other}"))),
    }
}

fn decode_variable(bytes: &[u8]) -> SkResult<(Vec<u8>, usize)> {
    let len_bytes = bytes.get(..3).ok_or_else(|| SkError::serial("truncated variable-length header"))?;
    let len = u32::from_be_bytes([0, len_bytes[0], len_bytes[1], len_bytes[2]]) as usize;
    if len > MAX_VARIABLE_LEN {
        return Err(SkError::serial("variable-length cell exceeds 16 MiB"));
    }
    let payload = bytes
        .get(3..3 + len)
        .ok_or_else(|| SkError::serial("truncated variable-length payload"))?;
    Ok((payload.to_vec(), 3 + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsalted_hash_matches_manual_concat() {
        let cell = Cell::long(7);
        let expected = sha256_concat(&[&[5u8], &7i64.to_be_bytes()]);
        assert_eq!(cell.canonical_hash(), expected);
    }

    #[test]
    fn salting_changes_hash() {
        let plain = Cell::string("x");
        let salted = Cell::string("x").salted([0x42; 32]);
        assert_ne!(plain.canonical_hash(), salted.canonical_hash());
    }

    #[test]
    fn redaction_hash_is_literal() {
        let h = Hash::from_slice(&[0x07; 32]).unwrap();
        let cell = Cell::redaction(h);
        assert_eq!(cell.canonical_hash(), h);
    }

    #[test]
    #[should_panic(expected = "must not be salted")]
    fn salting_a_redaction_cell_panics() {
        let h = Hash::from_slice(&[0x01; 32]).unwrap();
        Cell::redaction(h).salted([0u8; 32]);
    }

    #[test]
    fn wire_round_trips_every_cell_kind() {
        let h = Hash::from_slice(&[0x09; 32]).unwrap();
        let cells = vec![
            Cell::null(),
            Cell::redaction(h),
            Cell::bytes(vec![1, 2, 3]),
            Cell::string("hello").salted([0x11; 32]),
            Cell::long(-42),
            Cell::double(3.25),
            Cell::date(1_700_000_000_000),
        ];
        for cell in cells {
            let bytes = cell.to_bytes();
            let (decoded, consumed) = Cell::from_bytes(&bytes).unwrap();
            assert_eq!(consumed, bytes.len());
            assert_eq!(decoded, cell);
        }
    }
}
