//! Tamper-evident skip ledger, path packaging, and bindle composition.
//!
//! A [`ledger::SkipLedger`] is an append-only log whose rows carry skip
//! pointers to earlier rows at power-of-two offsets, giving any two rows a
//! short [`ledger::Path`] of hash-linked intermediaries between them.
//! Paths condense into [`ledger::PathPack`]s for storage and transport,
//! and a ledger's concurrently-held paths group into a [`ledger::MultiPath`]
//! with single-authority detection. A [`nugget::Nugget`] wraps one
//! ledger's `MultiPath` together with its optional typed source data
//! ([`source`]), cross-ledger references ([`refs`]), and timechain
//! notarizations ([`notary`]); a [`bindle::Bindle`] collects `Nugget`s by
//! [`ids::LedgerId`] and validates them against each other.

pub mod bindle;
pub mod builders;
pub mod core;
pub mod ids;
pub mod ledger;
pub mod morsel;
pub mod notary;
pub mod nugget;
pub mod partitioning;
pub mod refs;
pub mod source;

pub use crate::core::errors::{SkError, SkResult};
pub use crate::core::hash::{sha256, Hash};
pub use bindle::{Bindle, ObjectBundle};
pub use builders::{BindleBuilder, Crumtrail, MultiPathBuilder, NuggetBuilder};
pub use ids::{ChainParams, LedgerId, LedgerInfo, LedgerKind};
pub use ledger::{Comp, MemSkipLedger, MultiPath, Path, PathPack, SkipLedger, SkipLedgerFile};
pub use notary::{NotarizedRow, NotaryPack, NotaryPackBuilder};
pub use nugget::Nugget;
pub use refs::{ForeignRefs, ForeignRefsBuilder, Reference};
pub use source::{Cell, CellValue, SourcePack, SourceRow};
