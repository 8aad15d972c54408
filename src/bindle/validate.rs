//! §4.9 cross-nugget validation: foreign-ref resolution and notary
//! resolution against a timechain nugget's committed blocks.

use crate::core::errors::{SkError, SkResult};
use crate::nugget::Nugget;
use crate::refs::RefMode;

pub(super) fn validate_cross_nugget(nuggets: &[Nugget]) -> SkResult<()> {
    let find = |id: u32| nuggets.iter().find(|n| n.id().id == id);

    for nugget in nuggets {
        for fr in nugget.refs() {
            let foreign = find(fr.foreign_id).ok_or_else(|| SkError::MalformedBindle(format!(
                "nugget {} references unknown foreign ledger {}",
                nugget.id().id, fr.foreign_id
            )))?;
            let local_source = nugget
                .source()
                .expect("nugget invariant: source present whenever refs are non-empty");

            for r in fr.refs() {
                let local_row = local_source.get(r.from_row).ok_or_else(|| SkError::MalformedReference {
                    from_row: r.from_row,
                    from_col: r.from_col,
                    to_row: r.to_row,
                    to_col: r.to_col,
                    reason: "from_row has no source data in this nugget".into(),
                })?;

                match r.mode() {
                    RefMode::CommitHash => {
                        if !foreign.paths().covers_row(r.to_row) {
                            return Err(SkError::MalformedReference {
                                from_row: r.from_row,
                                from_col: r.from_col,
                                to_row: r.to_row,
                                to_col: r.to_col,
                                reason: "foreign ledger's paths do not cover to_row".into(),
                            });
                        }
                        let from_col = r.from_col as usize;
                        if from_col >= local_row.cells.len() {
                            return Err(SkError::MalformedReference {
                                from_row: r.from_row,
                                from_col: r.from_col,
                                to_row: r.to_row,
                                to_col: r.to_col,
                                reason: "from_col out of bounds".into(),
                            });
                        }
                        let expected = foreign.paths().row_hash(r.to_row)?;
                        let cell = &local_row.cells[from_col];
                        let actual = match &cell.value {
                            crate::source::CellValue::Hash(h) => *h,
                            _ => {
                                return Err(SkError::MalformedReference {
                                    from_row: r.from_row,
                                    from_col: r.from_col,
                                    to_row: r.to_row,
                                    to_col: r.to_col,
                                    reason: "commit-hash reference's from_cell is not hash-typed".into(),
                                })
                            }
                        };
                        if actual != expected {
                            return Err(SkError::hash_conflict(
                                format!("commit-hash ref {}:{} -> {}", r.from_row, r.from_col, r.to_row),
                                expected,
                                actual,
                            ));
                        }
                    }
                    RefMode::SameContent => {
                        let foreign_source = foreign.source().ok_or_else(|| SkError::MalformedReference {
                            from_row: r.from_row,
                            from_col: r.from_col,
                            to_row: r.to_row,
                            to_col: r.to_col,
                            reason: "foreign ledger has no source data".into(),
                        })?;
                        let foreign_row = foreign_source.get(r.to_row).ok_or_else(|| SkError::MalformedReference {
                            from_row: r.from_row,
                            from_col: r.from_col,
                            to_row: r.to_row,
                            to_col: r.to_col,
                            reason: "to_row has no source data in foreign ledger".into(),
                        })?;
                        if (0..foreign_row.cells.len()).any(|c| foreign_row.is_redacted(c)) {
                            return Err(SkError::MalformedReference {
                                from_row: r.from_row,
                                from_col: r.from_col,
                                to_row: r.to_row,
                                to_col: r.to_col,
                                reason: "same-content reference target carries a redacted cell".into(),
                            });
                        }
                        if local_row.cell_values() != foreign_row.cell_values() {
                            return Err(SkError::MalformedReference {
                                from_row: r.from_row,
                                from_col: r.from_col,
                                to_row: r.to_row,
                                to_col: r.to_col,
                                reason: "same-content reference rows disagree on cell data".into(),
                            });
                        }
                    }
                    RefMode::SingleCell => {
                        let foreign_source = foreign.source().ok_or_else(|| SkError::MalformedReference {
                            from_row: r.from_row,
                            from_col: r.from_col,
                            to_row: r.to_row,
                            to_col: r.to_col,
                            reason: "foreign ledger has no source data".into(),
                        })?;
                        let foreign_row = foreign_source.get(r.to_row).ok_or_else(|| SkError::MalformedReference {
                            from_row: r.from_row,
                            from_col: r.from_col,
                            to_row: r.to_row,
                            to_col: r.to_col,
                            reason: "to_row has no source data in foreign ledger".into(),
                        })?;
                        let to_col = r.to_col as usize;
                        if to_col >= foreign_row.cells.len() || foreign_row.is_redacted(to_col) {
                            return Err(SkError::MalformedReference {
                                from_row: r.from_row,
                                from_col: r.from_col,
                                to_row: r.to_row,
                                to_col: r.to_col,
                                reason: "to_col out of bounds or redacted".into(),
                            });
                        }
                        let from_col = r.from_col as usize;
                        if local_row.cells[from_col].value != foreign_row.cells[to_col].value {
                            return Err(SkError::MalformedReference {
                                from_row: r.from_row,
                                from_col: r.from_col,
                                to_row: r.to_row,
                                to_col: r.to_col,
                                reason: "single-cell reference cells disagree on data".into(),
                            });
                        }
                    }
                }
            }
        }

        for pack in nugget.notaries() {
            let foreign = find(pack.chain_id).ok_or_else(|| SkError::MalformedNotarizedRow {
                row_no: 0,
                chain_id: pack.chain_id,
                reason: "notarization references unknown timechain ledger".into(),
            })?;
            let chain_params = foreign.id().info.chain_params().ok_or_else(|| SkError::MalformedNotarizedRow {
                row_no: 0,
                chain_id: pack.chain_id,
                reason: "notarization's chain_id does not identify a timechain ledger".into(),
            })?;
            for nr in pack.rows() {
                let block_no = chain_params.block_no_for_utc(nr.utc);
                let block = foreign.paths().find_row(block_no).ok_or_else(|| SkError::MalformedNotarizedRow {
                    row_no: nr.row_no,
                    chain_id: pack.chain_id,
                    reason: format!("timechain has no committed block {block_no}"),
                })?;
                let block_row = block
                    .rows()
                    .iter()
                    .find(|row| row.n == block_no)
                    .expect("find_row guarantees a member at this row number");
                if block_row.input_hash != nr.cargo_hash {
                    return Err(SkError::hash_conflict(
                        format!("timechain block {block_no} for notarized row {}", nr.row_no),
                        block_row.input_hash,
                        nr.cargo_hash,
                    ));
                }
            }
        }
    }

    Ok(())
}
