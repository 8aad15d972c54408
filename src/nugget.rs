//! Per-ledger bindle section: a ledger's identity, its multi-path proof,
//! optional source data, notarizations, and foreign references — built
//! and fully cross-checked at construction time (§4.8).

use std::collections::HashSet;

use crate::core::errors::{SkError, SkResult};
use crate::ids::LedgerId;
use crate::ledger::MultiPath;
use crate::notary::NotaryPack;
use crate::refs::{ForeignRefs, RefMode};
use crate::source::SourcePack;

/// `{ id: LedgerId, paths: MultiPath, source?: SourcePack, notaries:
/// NotaryPack[], refs: ForeignRefs[] }`, validated per §4.8 at
/// construction. A `commitsOnly` (timechain) ledger never carries source
/// data or foreign refs.
#[derive(Clone, Debug)]
pub struct Nugget {
    id: LedgerId,
    paths: MultiPath,
    source: Option<SourcePack>,
    notaries: Vec<NotaryPack>,
    refs: Vec<ForeignRefs>,
}

impl Nugget {
    pub fn new(
        id: LedgerId,
        paths: MultiPath,
        source: Option<SourcePack>,
        notaries: Vec<NotaryPack>,
        refs: Vec<ForeignRefs>,
    ) -> SkResult<Self> {
        if id.commits_only() {
            if source.is_some() {
                return Err(SkError::MalformedNugget {
                    ledger_id: id.id,
                    reason: "a commits-only (timechain) ledger may not carry source data".into(),
                });
            }
            if !refs.is_empty() {
                return Err(SkError::MalformedNugget {
                    ledger_id: id.id,
                    reason: "a commits-only (timechain) ledger may not carry foreign refs".into(),
                });
            }
        }

        if let Some(source) = &source {
            for row in source.rows() {
                let member = paths.find_row(row.row_no).ok_or_else(|| SkError::MalformedNugget {
                    ledger_id: id.id,
                    reason: format!("source row {} has no matching full path row", row.row_no),
                })?;
                let full_row = member
                    .rows()
                    .iter()
                    .find(|r| r.n == row.row_no)
                    .expect("find_row guarantees a member at this row number");
                if full_row.input_hash != row.hash() {
                    return Err(SkError::hash_conflict(
                        format!("source row {}", row.row_no),
                        full_row.input_hash,
                        row.hash(),
                    ));
                }
            }
        }

        let mut chain_ids: HashSet<u32> = HashSet::new();
        for pack in &notaries {
            if pack.chain_id == id.id {
                return Err(SkError::MalformedNugget {
                    ledger_id: id.id,
                    reason: format!("notary chain id {} collides with this nugget's own id", pack.chain_id),
                });
            }
            if !chain_ids.insert(pack.chain_id) {
                return Err(SkError::MalformedNugget {
                    ledger_id: id.id,
                    reason: format!("duplicate notary chain id {}", pack.chain_id),
                });
            }
            for nr in pack.rows() {
                let actual = paths.row_hash(nr.row_no)?;
                if actual != nr.cargo_hash {
                    return Err(SkError::hash_conflict(
                        format!("notarized row {}", nr.row_no),
                        actual,
                        nr.cargo_hash,
                    ));
                }
            }
        }

        if !refs.is_empty() {
            if id.commits_only() {
                return Err(SkError::MalformedNugget {
                    ledger_id: id.id,
                    reason: "commits-only ledgers cannot hold foreign refs".into(),
                });
            }
            let source = source.as_ref().ok_or_else(|| SkError::MalformedNugget {
                ledger_id: id.id,
                reason: "foreign refs require a source pack".into(),
            })?;
            for fr in &refs {
                for r in fr.refs() {
                    let row = source.get(r.from_row).ok_or_else(|| SkError::MalformedReference {
                        from_row: r.from_row,
                        from_col: r.from_col,
                        to_row: r.to_row,
                        to_col: r.to_col,
                        reason: "from_row has no source data in this nugget".into(),
                    })?;
                    if r.mode() != RefMode::SameContent {
                        let from_col = r.from_col as usize;
                        if from_col >= row.cells.len() {
                            return Err(SkError::MalformedReference {
                                from_row: r.from_row,
                                from_col: r.from_col,
                                to_row: r.to_row,
                                to_col: r.to_col,
                                reason: "from_col out of bounds".into(),
                            });
                        }
                        if row.is_redacted(from_col) {
                            return Err(SkError::MalformedReference {
                                from_row: r.from_row,
                                from_col: r.from_col,
                                to_row: r.to_row,
                                to_col: r.to_col,
                                reason: "referenced cell is redacted".into(),
                            });
                        }
                    }
                }
            }
        }

        Ok(Nugget { id, paths, source, notaries, refs })
    }

    pub fn id(&self) -> &LedgerId {
        &self.id
    }

    pub fn paths(&self) -> &MultiPath {
        &self.paths
    }

    pub fn source(&self) -> Option<&SourcePack> {
        self.source.as_ref()
    }

    pub fn notaries(&self) -> &[NotaryPack] {
        &self.notaries
    }

    pub fn refs(&self) -> &[ForeignRefs] {
        &self.refs
    }

    pub fn find_foreign_refs(&self, foreign_id: u32) -> Option<&ForeignRefs> {
        self.refs.iter().find(|fr| fr.foreign_id == foreign_id)
    }
}
