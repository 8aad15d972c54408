//! Ledger identity: the bindle-local numeric id, its alias/URI metadata,
//! and the type-specific parameters a ledger's kind carries (§3).

use crate::core::errors::{SkError, SkResult};

/// Parameters of a timechain ledger: how UTC milliseconds map to block
/// numbers. Block `b` covers `[genesis_utc + b * block_interval_ms,
/// genesis_utc + (b+1) * block_interval_ms)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainParams {
    pub genesis_utc: i64,
    pub block_interval_ms: u64,
}

impl ChainParams {
    pub fn block_no_for_utc(&self, utc: i64) -> u64 {
        let elapsed = (utc - self.genesis_utc).max(0) as u64;
        elapsed / self.block_interval_ms
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub type_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableMeta {
    pub columns: Option<Vec<ColumnMeta>>,
    pub date_format: Option<String>,
}

/// A ledger's kind, carrying the fields specific to it.
#[derive(Clone, Debug, PartialEq)]
pub enum LedgerKind {
    Timechain(ChainParams),
    Log,
    Table(TableMeta),
    Bstream { block_size: u32 },
}

impl LedgerKind {
    pub fn type_code(&self) -> u8 {
        match self {
            LedgerKind::Timechain(_) => 0,
            LedgerKind::Log => 1,
            LedgerKind::Table(_) => 2,
            LedgerKind::Bstream { .. } => 3,
        }
    }
}

/// `{ type, alias, uri?, description? } ∪ type-specific`.
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerInfo {
    pub kind: LedgerKind,
    pub alias: String,
    pub uri: Option<String>,
    pub description: Option<String>,
}

impl LedgerInfo {
    pub fn new(kind: LedgerKind, alias: impl Into<String>) -> SkResult<Self> {
        let alias = alias.into();
        let trimmed = alias.trim();
        if trimmed.is_empty() {
            return Err(SkError::IllegalEdit("ledger alias must be non-empty".into()));
        }
        Ok(LedgerInfo {
            kind,
            alias: trimmed.to_string(),
            uri: None,
            description: None,
        })
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Timechains carry only commitments: no source data, no foreign refs.
    pub fn commits_only(&self) -> bool {
        matches!(self.kind, LedgerKind::Timechain(_))
    }

    pub fn chain_params(&self) -> Option<&ChainParams> {
        match &self.kind {
            LedgerKind::Timechain(params) => Some(params),
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.kind.type_code()];
        write_str(&mut out, &self.alias);
        let flags = (self.uri.is_some() as u8) | ((self.description.is_some() as u8) << 1);
        out.push(flags);
        if let Some(uri) = &self.uri {
            write_str(&mut out, uri);
        }
        if let Some(desc) = &self.description {
            write_str(&mut out, desc);
        }
        match &self.kind {
            LedgerKind::Timechain(params) => {
                out.extend_from_slice(&params.genesis_utc.to_be_bytes());
                out.extend_from_slice(&params.block_interval_ms.to_be_bytes());
            }
            LedgerKind::Log => {}
            LedgerKind::Table(meta) => {
                let table_flags =
                    (meta.columns.is_some() as u8) | ((meta.date_format.is_some() as u8) << 1);
                out.push(table_flags);
                if let Some(columns) = &meta.columns {
                    out.extend_from_slice(&(columns.len() as u16).to_be_bytes());
                    for col in columns {
                        write_str(&mut out, &col.name);
                        write_str(&mut out, &col.type_name);
                    }
                }
                if let Some(fmt) = &meta.date_format {
                    write_str(&mut out, fmt);
                }
            }
            LedgerKind::Bstream { block_size } => {
                out.extend_from_slice(&block_size.to_be_bytes());
            }
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> SkResult<(LedgerInfo, usize)> {
        let type_code = *bytes.first().ok_or_else(|| SkError::serial("truncated ledger info"))?;
        let mut pos = 1;
        let (alias, consumed) = read_str(&bytes[pos..])?;
        pos += consumed;
        let flags = *bytes.get(pos).ok_or_else(|| SkError::serial("truncated ledger info"))?;
        pos += 1;
        let uri = if flags & 0x1 != 0 {
            let (s, c) = read_str(&bytes[pos..])?;
            pos += c;
            Some(s)
        } else {
            None
        };
        let description = if flags & 0x2 != 0 {
            let (s, c) = read_str(&bytes[pos..])?;
            pos += c;
            Some(s)
        } else {
            None
        };

        let kind = match type_code {
            0 => {
                let genesis_utc = i64::from_be_bytes(
                    bytes.get(pos..pos + 8).ok_or_else(|| SkError::serial("truncated chain params"))?.try_into().unwrap(),
                );
                pos += 8;
                let block_interval_ms = u64::from_be_bytes(
                    bytes.get(pos..pos + 8).ok_or_else(|| SkError::serial("truncated chain params"))?.try_into().unwrap(),
                );
                pos += 8;
                LedgerKind::Timechain(ChainParams { genesis_utc, block_interval_ms })
            }
            1 => LedgerKind::Log,
            2 => {
                let table_flags = *bytes.get(pos).ok_or_else(|| SkError::serial("truncated table meta"))?;
                pos += 1;
                let columns = if table_flags & 0x1 != 0 {
                    let count = u16::from_be_bytes(
                        bytes.get(pos..pos + 2).ok_or_else(|| SkError::serial("truncated table columns"))?.try_into().unwrap(),
                    ) as usize;
                    pos += 2;
                    let mut cols = Vec::with_capacity(count);
                    for _ in 0..count {
                        let (name, c) = read_str(&bytes[pos..])?;
                        pos += c;
                        let (type_name, c) = read_str(&bytes[pos..])?;
                        pos += c;
                        cols.push(ColumnMeta { name, type_name });
                    }
                    Some(cols)
                } else {
                    None
                };
                let date_format = if table_flags & 0x2 != 0 {
                    let (s, c) = read_str(&bytes[pos..])?;
                    pos += c;
                    Some(s)
                } else {
                    None
                };
                LedgerKind::Table(TableMeta { columns, date_format })
            }
            3 => {
                let block_size = u32::from_be_bytes(
                    bytes.get(pos..pos + 4).ok_or_else(|| SkError::serial("truncated bstream meta"))?.try_into().unwrap(),
                );
                pos += 4;
                LedgerKind::Bstream { block_size }
            }
            other => return Err(SkError::serial(format!("unknown ledger type code {other}"))),
        };

        Ok((LedgerInfo { kind, alias, uri, description }, pos))
    }
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn read_str(bytes: &[u8]) -> SkResult<(String, usize)> {
    let len = u16::from_be_bytes(
        bytes.get(..2).ok_or_else(|| SkError::serial("truncated string length"))?.try_into().unwrap(),
    ) as usize;
    let payload = bytes.get(2..2 + len).ok_or_else(|| SkError::serial("truncated string payload"))?;
    let s = String::from_utf8(payload.to_vec()).map_err(|_| SkError::serial("invalid UTF-8"))?;
    Ok((s, 2 + len))
}

/// `{ id: u32, info: LedgerInfo }`. `id` is bindle-local only; it carries
/// no meaning across bindles.
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerId {
    pub id: u32,
    pub info: LedgerInfo,
}

impl LedgerId {
    pub fn new(id: u32, info: LedgerInfo) -> Self {
        LedgerId { id, info }
    }

    pub fn commits_only(&self) -> bool {
        self.info.commits_only()
    }
}

/// Enforce the bindle-wide identity invariants from §3: strictly
/// increasing numeric ids, locally-unique trimmed aliases, and
/// locally-unique URIs where present.
pub fn validate_ledger_ids(ids: &[LedgerId]) -> SkResult<()> {
    for w in ids.windows(2) {
        if w[0].id >= w[1].id {
            return Err(SkError::MalformedBindle(format!(
                "ledger ids must be strictly increasing, got {} then {}",
                w[0].id, w[1].id
            )));
        }
    }
    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            if ids[i].info.alias == ids[j].info.alias {
                return Err(SkError::MalformedBindle(format!(
                    "duplicate ledger alias {:?}",
                    ids[i].info.alias
                )));
            }
            if let (Some(a), Some(b)) = (&ids[i].info.uri, &ids[j].info.uri) {
                if a == b {
                    return Err(SkError::MalformedBindle(format!("duplicate ledger uri {a:?}")));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_id(id: u32, alias: &str) -> LedgerId {
        LedgerId::new(id, LedgerInfo::new(LedgerKind::Log, alias).unwrap())
    }

    #[test]
    fn chain_params_maps_utc_to_block_no() {
        let params = ChainParams { genesis_utc: 1_000, block_interval_ms: 500 };
        assert_eq!(params.block_no_for_utc(1_000), 0);
        assert_eq!(params.block_no_for_utc(1_499), 0);
        assert_eq!(params.block_no_for_utc(1_500), 1);
        assert_eq!(params.block_no_for_utc(0), 0);
    }

    #[test]
    fn rejects_blank_alias() {
        assert!(LedgerInfo::new(LedgerKind::Log, "   ").is_err());
    }

    #[test]
    fn detects_duplicate_alias() {
        let ids = vec![log_id(1, "a"), log_id(2, "a")];
        assert!(matches!(validate_ledger_ids(&ids), Err(SkError::MalformedBindle(_))));
    }

    #[test]
    fn detects_non_increasing_ids() {
        let ids = vec![log_id(2, "a"), log_id(1, "b")];
        assert!(matches!(validate_ledger_ids(&ids), Err(SkError::MalformedBindle(_))));
    }

    #[test]
    fn accepts_well_formed_ids() {
        let ids = vec![log_id(1, "a"), log_id(2, "b")];
        assert!(validate_ledger_ids(&ids).is_ok());
    }

    #[test]
    fn ledger_info_wire_round_trips() {
        let info = LedgerInfo::new(
            LedgerKind::Timechain(ChainParams { genesis_utc: 10, block_interval_ms: 500 }),
            "tc",
        )
        .unwrap()
        .with_uri("https://example.test/tc")
        .with_description("a timechain");
        let bytes = info.to_bytes();
        let (decoded, consumed) = LedgerInfo::from_bytes(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, info);
    }

    #[test]
    fn table_ledger_info_wire_round_trips() {
        let meta = TableMeta {
            columns: Some(vec![ColumnMeta { name: "id".into(), type_name: "long".into() }]),
            date_format: Some("yyyy-MM-dd".into()),
        };
        let info = LedgerInfo::new(LedgerKind::Table(meta), "tbl").unwrap();
        let bytes = info.to_bytes();
        let (decoded, _) = LedgerInfo::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, info);
    }
}
