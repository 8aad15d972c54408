//! Incremental builders (§4.11): `MultiPathBuilder` accumulates
//! intersecting paths one at a time; `NuggetBuilder` composes one per
//! ledger; `BindleBuilder` composes `NuggetBuilder`s by numeric id and
//! orchestrates `addNotarizedRow` across a ledger and its timechain.

use crate::core::errors::{SkError, SkResult};
use crate::core::hash::Hash;
use crate::ids::LedgerId;
use crate::ids::LedgerInfo;
use crate::ledger::{MultiPath, Path};
use crate::notary::{NotarizedRow, NotaryPack, NotaryPackBuilder};
use crate::nugget::Nugget;
use crate::refs::{ForeignRefs, ForeignRefsBuilder, Reference};
use crate::source::SourcePack;

/// Accumulates mutually-intersecting [`Path`]s one at a time, validating
/// the running set after every insert.
#[derive(Default)]
pub struct MultiPathBuilder {
    paths: Vec<Path>,
}

impl MultiPathBuilder {
    pub fn new() -> Self {
        MultiPathBuilder::default()
    }

    pub fn covers_row(&self, n: u64) -> bool {
        self.paths.iter().any(|p| p.covers_row(n))
    }

    /// Adds `path` to the set, returning the highest row number it shares
    /// with the paths already held (§4.5's `highest_common_no`). The first
    /// path added has nothing to intersect with, so its own `hi` is
    /// returned.
    pub fn add_path(&mut self, path: Path) -> SkResult<u64> {
        let highest_common_no = if self.paths.is_empty() {
            path.hi()
        } else {
            let existing = MultiPath::new(self.paths.clone())?;
            existing.comp(&path).common_no.ok_or(SkError::PathsDoNotIntersect)?
        };

        self.paths.push(path);
        MultiPath::new(self.paths.clone())?; // validate the whole set still holds
        Ok(highest_common_no)
    }

    pub fn build(self) -> SkResult<MultiPath> {
        MultiPath::new(self.paths)
    }
}

/// Composes one ledger's [`Nugget`] incrementally.
pub struct NuggetBuilder {
    id: LedgerId,
    paths: MultiPathBuilder,
    source: Option<SourcePack>,
    notary_builders: Vec<(u32, NotaryPackBuilder)>,
    ref_builders: Vec<(u32, ForeignRefsBuilder)>,
}

impl NuggetBuilder {
    pub fn new(id: LedgerId) -> Self {
        NuggetBuilder {
            id,
            paths: MultiPathBuilder::new(),
            source: None,
            notary_builders: Vec::new(),
            ref_builders: Vec::new(),
        }
    }

    pub fn add_path(&mut self, path: Path) -> SkResult<u64> {
        self.paths.add_path(path)
    }

    pub fn set_source(&mut self, source: SourcePack) {
        self.source = Some(source);
    }

    fn notary_builder(&mut self, chain_id: u32) -> &mut NotaryPackBuilder {
        if let Some(i) = self.notary_builders.iter().position(|(id, _)| *id == chain_id) {
            &mut self.notary_builders[i].1
        } else {
            self.notary_builders.push((chain_id, NotaryPackBuilder::new(chain_id)));
            &mut self.notary_builders.last_mut().unwrap().1
        }
    }

    pub fn add_notarized_row(&mut self, chain_id: u32, nr: NotarizedRow) -> SkResult<bool> {
        self.notary_builder(chain_id).add(nr)
    }

    fn ref_builder(&mut self, foreign_id: u32, foreign_commits_only: bool) -> &mut ForeignRefsBuilder {
        if let Some(i) = self.ref_builders.iter().position(|(id, _)| *id == foreign_id) {
            &mut self.ref_builders[i].1
        } else {
            self.ref_builders.push((foreign_id, ForeignRefsBuilder::new(foreign_id, foreign_commits_only)));
            &mut self.ref_builders.last_mut().unwrap().1
        }
    }

    pub fn add_ref(&mut self, foreign_id: u32, foreign_commits_only: bool, r: Reference) -> SkResult<bool> {
        self.ref_builder(foreign_id, foreign_commits_only).add(r)
    }

    pub fn build(self) -> SkResult<Nugget> {
        let paths = self.paths.build()?;
        let notaries: Vec<NotaryPack> = self
            .notary_builders
            .into_iter()
            .map(|(_, b)| b.build())
            .collect::<SkResult<_>>()?;
        let refs: Vec<ForeignRefs> = self
            .ref_builders
            .into_iter()
            .map(|(_, b)| b.build())
            .collect::<SkResult<_>>()?;
        Nugget::new(self.id, paths, self.source, notaries, refs)
    }
}

/// A prover-supplied proof that a ledger row is notarized into a
/// timechain block: the block's own path (reaching back far enough to
/// link into whatever the timechain nugget already holds), its cargo
/// hash, and the UTC time of notarization.
pub struct Crumtrail {
    pub block_path: Path,
    pub cargo_hash: Hash,
    pub utc: i64,
}

/// Composes [`NuggetBuilder`]s by numeric id, allocated in declaration
/// order.
#[derive(Default)]
pub struct BindleBuilder {
    next_id: u32,
    nuggets: Vec<NuggetBuilder>,
}

impl BindleBuilder {
    pub fn new() -> Self {
        BindleBuilder { next_id: 1, nuggets: Vec::new() }
    }

    pub fn declare_ledger(&mut self, info: LedgerInfo) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.nuggets.push(NuggetBuilder::new(LedgerId::new(id, info)));
        id
    }

    fn nugget_mut(&mut self, id: u32) -> SkResult<&mut NuggetBuilder> {
        self.nuggets
            .iter_mut()
            .find(|n| n.id.id == id)
            .ok_or_else(|| SkError::OutOfBounds(format!("no ledger declared with id {id}")))
    }

    fn nugget_ref(&self, id: u32) -> SkResult<&NuggetBuilder> {
        self.nuggets
            .iter()
            .find(|n| n.id.id == id)
            .ok_or_else(|| SkError::OutOfBounds(format!("no ledger declared with id {id}")))
    }

    pub fn add_path(&mut self, id: u32, path: Path) -> SkResult<u64> {
        self.nugget_mut(id)?.add_path(path)
    }

    pub fn set_source(&mut self, id: u32, source: SourcePack) -> SkResult<()> {
        self.nugget_mut(id)?.set_source(source);
        Ok(())
    }

    pub fn add_ref(&mut self, id: u32, foreign_id: u32, r: Reference) -> SkResult<bool> {
        let foreign_commits_only = self.nugget_ref(foreign_id)?.id.commits_only();
        self.nugget_mut(id)?.add_ref(foreign_id, foreign_commits_only, r)
    }

    /// §4.11's central orchestration. Derives the minimal sub-path the
    /// timechain nugget needs to reach `crumtrail`'s block, attempts the
    /// notarized-row insertion first, and only splices the sub-path in on
    /// success — a rejected notarization never pollutes the timechain
    /// nugget's path set.
    pub fn add_notarized_row(
        &mut self,
        ledger_id: u32,
        row_no: u64,
        chain_id: u32,
        crumtrail: Crumtrail,
    ) -> SkResult<bool> {
        let chain_params = *self
            .nugget_ref(chain_id)?
            .id
            .info
            .chain_params()
            .ok_or_else(|| SkError::MalformedNotarizedRow {
                row_no,
                chain_id,
                reason: "notarization's chain_id does not identify a timechain ledger".into(),
            })?;
        let block_no = chain_params.block_no_for_utc(crumtrail.utc);
        let nr = NotarizedRow::new(row_no, crumtrail.cargo_hash, crumtrail.utc);

        let inserted = self.nugget_mut(ledger_id)?.add_notarized_row(chain_id, nr)?;
        if inserted {
            let tc = self.nugget_mut(chain_id)?;
            if !tc.paths.covers_row(block_no) {
                tc.add_path(crumtrail.block_path)?;
            }
        }
        Ok(inserted)
    }

    pub fn build(self) -> SkResult<Vec<Nugget>> {
        self.nuggets.into_iter().map(NuggetBuilder::build).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindle::ObjectBundle;
    use crate::core::hash::sha256;
    use crate::ids::{ChainParams, LedgerKind};
    use crate::ledger::skip_ledger::{MemSkipLedger, SkipLedger};
    use crate::source::{Cell, SourceRow};

    #[test]
    fn multi_path_builder_tracks_highest_common_no() {
        let mut ledger = MemSkipLedger::new();
        let inputs: Vec<Hash> = (0..52).map(|i| sha256(&i.to_be_bytes())).collect();
        ledger.append_rows(&inputs).unwrap();

        let mut b = MultiPathBuilder::new();
        let first = ledger.skip_path(1, 16).unwrap();
        assert_eq!(b.add_path(first).unwrap(), 16);

        let second = ledger.skip_path(11, 52).unwrap();
        assert_eq!(b.add_path(second).unwrap(), 16);
    }

    #[test]
    fn bindle_builder_end_to_end_notarization() {
        let mut timechain = MemSkipLedger::new();
        timechain
            .append_rows(&(1..=10u64).map(|i| sha256(format!("block-{i}").as_bytes())).collect::<Vec<_>>())
            .unwrap();

        let row = SourceRow::new(3, vec![Cell::string("hello")]).unwrap();
        let mut log = MemSkipLedger::new();
        log.append_rows(
            &(1..=3u64)
                .map(|n| if n == 3 { row.hash() } else { sha256(&n.to_be_bytes()) })
                .collect::<Vec<_>>(),
        )
        .unwrap();

        let mut builder = BindleBuilder::new();
        let tc_id = builder.declare_ledger(
            LedgerInfo::new(
                LedgerKind::Timechain(ChainParams { genesis_utc: 0, block_interval_ms: 1000 }),
                "tc",
            )
            .unwrap(),
        );
        let log_id = builder.declare_ledger(LedgerInfo::new(LedgerKind::Log, "log").unwrap());

        builder.set_source(log_id, SourcePack::new(vec![row]).unwrap()).unwrap();
        builder.add_path(log_id, log.skip_path(1, 3).unwrap()).unwrap();

        let cargo_hash = timechain.skip_path(1, 10).unwrap().get_row_hash(10).unwrap();
        let crumtrail = Crumtrail { block_path: timechain.skip_path(1, 10).unwrap(), cargo_hash, utc: 9_999 };
        let inserted = builder.add_notarized_row(log_id, 3, tc_id, crumtrail).unwrap();
        assert!(inserted);

        let nuggets = builder.build().unwrap();
        let bundle = ObjectBundle::new(nuggets).unwrap();
        assert!(bundle.get_nugget(tc_id).is_ok());
        assert!(bundle.get_nugget(log_id).is_ok());
    }

    #[test]
    fn rejected_notarization_does_not_touch_timechain_paths() {
        let mut timechain = MemSkipLedger::new();
        timechain
            .append_rows(&(1..=10u64).map(|i| sha256(format!("block-{i}").as_bytes())).collect::<Vec<_>>())
            .unwrap();
        let mut log = MemSkipLedger::new();
        log.append_rows(&(1..=5u64).map(|i| sha256(&i.to_be_bytes())).collect::<Vec<_>>()).unwrap();

        let mut builder = BindleBuilder::new();
        let tc_id = builder.declare_ledger(
            LedgerInfo::new(
                LedgerKind::Timechain(ChainParams { genesis_utc: 0, block_interval_ms: 1000 }),
                "tc",
            )
            .unwrap(),
        );
        let log_id = builder.declare_ledger(LedgerInfo::new(LedgerKind::Log, "log").unwrap());

        let cargo_hash_a = timechain.skip_path(1, 10).unwrap().get_row_hash(10).unwrap();
        let crumtrail_a =
            Crumtrail { block_path: timechain.skip_path(1, 10).unwrap(), cargo_hash: cargo_hash_a, utc: 5_000 };
        assert!(builder.add_notarized_row(log_id, 5, tc_id, crumtrail_a).unwrap());

        // Same row, earlier utc: NotaryPackBuilder rejects this as a no-op.
        let crumtrail_b =
            Crumtrail { block_path: timechain.skip_path(1, 10).unwrap(), cargo_hash: cargo_hash_a, utc: 4_000 };
        let inserted = builder.add_notarized_row(log_id, 5, tc_id, crumtrail_b).unwrap();
        assert!(!inserted);
    }
}
