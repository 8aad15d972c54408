//! Closed error taxonomy for the skip ledger, path packaging, and bindle
//! layers. Every failure a caller can observe belongs to exactly one of
//! these variants; validation errors are fatal at the point discovered.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed bytes: {0}")]
    SerialFormat(String),

    #[error("hash conflict at {context}: expected {expected}, got {actual}")]
    HashConflict {
        context: String,
        expected: String,
        actual: String,
    },

    #[error("malformed bindle: {0}")]
    MalformedBindle(String),

    #[error("malformed nugget (ledger {ledger_id}): {reason}")]
    MalformedNugget { ledger_id: u32, reason: String },

    #[error("malformed reference {from_row}:{from_col} -> {to_row}:{to_col}: {reason}")]
    MalformedReference {
        from_row: u64,
        from_col: i32,
        to_row: u64,
        to_col: i32,
        reason: String,
    },

    #[error("malformed notarized row {row_no} on chain {chain_id}: {reason}")]
    MalformedNotarizedRow {
        row_no: u64,
        chain_id: u32,
        reason: String,
    },

    #[error("row {0} not found")]
    RowNotFound(u64),

    #[error("index out of bounds: {0}")]
    OutOfBounds(String),

    #[error("illegal edit: {0}")]
    IllegalEdit(String),

    #[error("paths do not intersect")]
    PathsDoNotIntersect,

    #[error("rows {a} and {b} are not linked by a skip pointer")]
    RowsNotLinked { a: u64, b: u64 },
}

pub type SkResult<T> = std::result::Result<T, SkError>;

impl SkError {
    pub fn hash_conflict(
        context: impl Into<String>,
        expected: crate::core::hash::Hash,
        actual: crate::core::hash::Hash,
    ) -> Self {
        SkError::HashConflict {
            context: context.into(),
            expected: expected.to_hex(),
            actual: actual.to_hex(),
        }
    }

    pub fn serial(msg: impl Into<String>) -> Self {
        SkError::SerialFormat(msg.into())
    }

    pub fn malformed_bindle(msg: impl Into<String>) -> Self {
        SkError::MalformedBindle(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        let e = SkError::RowNotFound(42);
        assert_eq!(e.to_string(), "row 42 not found");
    }
}
