//! The skip ledger: rows, paths, packs, and multi-path composition.

pub mod multi_path;
pub mod path;
pub mod path_pack;
pub mod row;
pub mod skip_ledger;
pub mod skip_ledger_file;

pub use multi_path::MultiPath;
pub use path::{Comp, Path};
pub use path_pack::{PackType, PathPack};
pub use row::{LevelsPointer, Row};
pub use skip_ledger::{MemSkipLedger, SkipLedger};
pub use skip_ledger_file::SkipLedgerFile;
