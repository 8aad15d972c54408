//! `.bindl` binary framing (§4.10): `MAGIC VERSION IDS PARTITION`, where
//! the partition holds one canonically-serialized `Nug` per ledger id.

use crate::core::errors::{SkError, SkResult};
use crate::ids::{validate_ledger_ids, LedgerId, LedgerInfo};
use crate::ledger::MultiPath;
use crate::nugget::Nugget;
use crate::notary::NotaryPack;
use crate::partitioning::Partitioning;
use crate::refs::ForeignRefs;
use crate::source::SourcePack;

use super::{Bindle, ObjectBundle};

const MAGIC: &[u8; 6] = b"BINDLE";
const VERSION: u16 = 1;

/// The lazily-decoded wire form of a bindle: ids are parsed eagerly (they
/// are needed to validate the file), but each `Nug` blob stays opaque
/// until [`BindleFile::into_object_bundle`] decodes and cross-validates it.
pub struct BindleFile {
    ids: Vec<LedgerId>,
    nug_blobs: Vec<Vec<u8>>,
}

impl BindleFile {
    pub fn serialize(bundle: &ObjectBundle) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        out.extend_from_slice(&VERSION.to_be_bytes());

        let ids = bundle.ids();
        out.extend_from_slice(&(ids.len() as u32).to_be_bytes());
        for id in ids {
            out.extend_from_slice(&id.id.to_be_bytes());
            out.extend_from_slice(&id.info.to_bytes());
        }

        let parts: Vec<Vec<u8>> = bundle.nuggets().iter().map(encode_nug).collect();
        out.extend_from_slice(&Partitioning::encode(&parts));
        out
    }

    pub fn load(bytes: &[u8]) -> SkResult<BindleFile> {
        if bytes.len() < 8 || &bytes[0..6] != MAGIC {
            return Err(SkError::serial("not a bindle file: bad magic"));
        }
        let version = u16::from_be_bytes(bytes[6..8].try_into().unwrap());
        if version == 0 {
            return Err(SkError::serial("bindle version 0 is invalid"));
        }
        if version > VERSION {
            log::warn!("bindle file version {version} is newer than supported {VERSION}; parsing best-effort");
        }

        let mut pos = 8;
        let id_count = u32::from_be_bytes(
            bytes.get(pos..pos + 4).ok_or_else(|| SkError::serial("truncated bindle id count"))?.try_into().unwrap(),
        ) as usize;
        pos += 4;

        let mut ids = Vec::with_capacity(id_count);
        for _ in 0..id_count {
            let numeric_id = u32::from_be_bytes(
                bytes.get(pos..pos + 4).ok_or_else(|| SkError::serial("truncated bindle ledger id"))?.try_into().unwrap(),
            );
            pos += 4;
            let (info, consumed) = LedgerInfo::from_bytes(&bytes[pos..])?;
            pos += consumed;
            ids.push(LedgerId::new(numeric_id, info));
        }
        validate_ledger_ids(&ids)?;

        let (parts, consumed) = Partitioning::decode(&bytes[pos..])?;
        pos += consumed;
        if parts.len() < ids.len() {
            return Err(SkError::malformed_bindle(
                "bindle partition has fewer parts than declared ledger ids",
            ));
        }
        let _ = pos; // trailing bytes tolerated for forward-compatible newer versions

        let nug_blobs = parts.into_iter().take(ids.len()).map(|p| p.to_vec()).collect();
        Ok(BindleFile { ids, nug_blobs })
    }

    /// Decode every `Nug` and run full §4.8/§4.9 validation.
    pub fn into_object_bundle(self) -> SkResult<ObjectBundle> {
        let mut nuggets = Vec::with_capacity(self.ids.len());
        for (id, blob) in self.ids.into_iter().zip(self.nug_blobs.into_iter()) {
            nuggets.push(decode_nug(id, &blob)?);
        }
        ObjectBundle::new(nuggets)
    }
}

fn encode_nug(nugget: &Nugget) -> Vec<u8> {
    let mut out = nugget.id().id.to_be_bytes().to_vec();
    out.extend_from_slice(&nugget.paths().to_bytes());

    let source_bytes = nugget.source().map(SourcePack::to_bytes).unwrap_or_default();
    out.extend_from_slice(&(source_bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(&source_bytes);

    let notary_parts: Vec<Vec<u8>> = nugget.notaries().iter().map(NotaryPack::to_bytes).collect();
    out.extend_from_slice(&Partitioning::encode(&notary_parts));

    let ref_parts: Vec<Vec<u8>> = nugget.refs().iter().map(ForeignRefs::to_bytes).collect();
    out.extend_from_slice(&Partitioning::encode(&ref_parts));

    out
}

fn decode_nug(id: LedgerId, bytes: &[u8]) -> SkResult<Nugget> {
    let nug_id = u32::from_be_bytes(
        bytes.get(..4).ok_or_else(|| SkError::serial("truncated nug"))?.try_into().unwrap(),
    );
    if nug_id != id.id {
        return Err(SkError::serial(format!(
            "nug id {nug_id} does not match its entry in the bindle's IDS table ({})",
            id.id
        )));
    }
    let mut pos = 4;

    let (paths, consumed) = MultiPath::from_bytes_prefix(&bytes[pos..])?;
    pos += consumed;

    let source_len = u32::from_be_bytes(
        bytes.get(pos..pos + 4).ok_or_else(|| SkError::serial("truncated nug source length"))?.try_into().unwrap(),
    ) as usize;
    pos += 4;
    let source_bytes = bytes.get(pos..pos + source_len).ok_or_else(|| SkError::serial("truncated nug source buffer"))?;
    pos += source_len;
    let source = if source_bytes.is_empty() { None } else { Some(SourcePack::from_bytes(source_bytes)?) };

    let (notary_parts, consumed) = Partitioning::decode(&bytes[pos..])?;
    pos += consumed;
    let notaries = notary_parts
        .into_iter()
        .map(NotaryPack::from_bytes)
        .collect::<SkResult<Vec<_>>>()?;

    let (ref_parts, consumed) = Partitioning::decode(&bytes[pos..])?;
    pos += consumed;
    let refs = ref_parts
        .into_iter()
        .map(ForeignRefs::from_bytes)
        .collect::<SkResult<Vec<_>>>()?;

    let _ = pos;
    Nugget::new(id, paths, source, notaries, refs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::sha256;
    use crate::ids::{ChainParams, LedgerKind};
    use crate::ledger::skip_ledger::{MemSkipLedger, SkipLedger};
    use crate::notary::NotarizedRow;
    use crate::source::{Cell, SourceRow};

    fn build_log_with_source() -> (MemSkipLedger, SourceRow) {
        let row = SourceRow::new(3, vec![Cell::string("hello")]).unwrap();
        let mut ledger = MemSkipLedger::new();
        let inputs: Vec<_> =
            (1..=3u64).map(|n| if n == 3 { row.hash() } else { sha256(&n.to_be_bytes()) }).collect();
        ledger.append_rows(&inputs).unwrap();
        (ledger, row)
    }

    fn build_timechain(n: u64) -> MemSkipLedger {
        let mut ledger = MemSkipLedger::new();
        let inputs: Vec<_> = (1..=n).map(|i| sha256(format!("block-{i}").as_bytes())).collect();
        ledger.append_rows(&inputs).unwrap();
        ledger
    }

    #[test]
    fn s6_bindle_round_trip_then_tamper_detected() {
        let (log_ledger, row) = build_log_with_source();
        let timechain = build_timechain(10);

        let log_path = log_ledger.skip_path(1, 3).unwrap();
        let log_mp = MultiPath::new(vec![log_path]).unwrap();
        let log_id = LedgerId::new(1, LedgerInfo::new(LedgerKind::Log, "log").unwrap());
        let source = SourcePack::new(vec![row]).unwrap();

        let tc_path = timechain.skip_path(1, 10).unwrap();
        let cargo_hash = tc_path.get_row_hash(10).unwrap();
        let tc_mp = MultiPath::new(vec![tc_path]).unwrap();
        let tc_id = LedgerId::new(
            2,
            LedgerInfo::new(
                LedgerKind::Timechain(ChainParams { genesis_utc: 0, block_interval_ms: 1000 }),
                "tc",
            )
            .unwrap(),
        );

        let notary = NotaryPack::new(2, vec![NotarizedRow::new(3, cargo_hash, 9_999)]).unwrap();
        let log_nugget = Nugget::new(log_id, log_mp, Some(source), vec![notary], vec![]).unwrap();
        let tc_nugget = Nugget::new(tc_id, tc_mp, None, vec![], vec![]).unwrap();

        let bundle = ObjectBundle::new(vec![log_nugget, tc_nugget]).unwrap();
        let bytes = BindleFile::serialize(&bundle);

        let reloaded = BindleFile::load(&bytes).unwrap().into_object_bundle().unwrap();
        assert_eq!(reloaded.ids().len(), 2);
        assert!(reloaded.get_nugget(1).is_ok());
        assert!(reloaded.get_nugget(2).is_ok());

        let mut tampered = bytes.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0xff;
        let result = BindleFile::load(&tampered).and_then(BindleFile::into_object_bundle);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = b"NOTBND\x00\x01\x00\x00\x00\x00".to_vec();
        assert!(matches!(BindleFile::load(&bytes), Err(SkError::SerialFormat(_))));
    }

    #[test]
    fn rejects_zero_version() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        assert!(matches!(BindleFile::load(&bytes), Err(SkError::SerialFormat(_))));
    }
}
