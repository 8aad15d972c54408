//! Multi-ledger container: a sorted set of [`crate::ids::LedgerId`]s, each
//! backed by a fully cross-validated [`Nugget`] (§3, §4.8, §4.9).

pub mod codec;
pub mod validate;

use crate::core::errors::{SkError, SkResult};
use crate::ids::{validate_ledger_ids, LedgerId};
use crate::nugget::Nugget;

/// `{ ids: LedgerId[] (sorted by numeric id), get_nugget(id) -> Nugget }`.
pub trait Bindle {
    fn ids(&self) -> &[LedgerId];
    fn get_nugget(&self, id: u32) -> SkResult<&Nugget>;
}

/// The eager, fully-validated bindle variant: every nugget's cross-ledger
/// references and notarizations have already been resolved and checked
/// against their counterparts.
#[derive(Clone, Debug)]
pub struct ObjectBundle {
    ids: Vec<LedgerId>,
    nuggets: Vec<Nugget>,
}

impl ObjectBundle {
    /// Sorts `nuggets` by numeric id, then runs §4.8 (already enforced per
    /// nugget at its own construction) and §4.9 cross-nugget validation.
    pub fn new(mut nuggets: Vec<Nugget>) -> SkResult<Self> {
        nuggets.sort_by_key(|n| n.id().id);
        let ids: Vec<LedgerId> = nuggets.iter().map(|n| n.id().clone()).collect();
        validate_ledger_ids(&ids)?;
        validate::validate_cross_nugget(&nuggets)?;
        Ok(ObjectBundle { ids, nuggets })
    }

    pub fn nuggets(&self) -> &[Nugget] {
        &self.nuggets
    }
}

impl Bindle for ObjectBundle {
    fn ids(&self) -> &[LedgerId] {
        &self.ids
    }

    fn get_nugget(&self, id: u32) -> SkResult<&Nugget> {
        self.nuggets
            .iter()
            .find(|n| n.id().id == id)
            .ok_or(SkError::OutOfBounds(format!("no nugget with ledger id {id}")))
    }
}
