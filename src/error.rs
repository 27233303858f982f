//! Error types surfaced by the ledger.

use thiserror::Error;

use crate::model::{HashAlgorithm, IntegrityFailure};

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Requested index is outside `[0, len)`.
    #[error("record {index} not found (chain length {len})")]
    NotFound { index: u64, len: u64 },

    /// The chain holds no records. Unreachable once genesis has been written.
    #[error("chain has no records")]
    EmptyChain,

    #[error("integrity violation: {0}")]
    Integrity(IntegrityFailure),

    #[error("chain was created with {recorded}, configured for {configured}")]
    AlgorithmMismatch {
        configured: HashAlgorithm,
        recorded: HashAlgorithm,
    },

    #[error("journal line {line} is corrupt: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A failed journal write could not be undone; the journal takes no more
    /// appends until the ledger is reopened.
    #[error("journal {} is unusable after a failed write", path.display())]
    JournalFailed { path: std::path::PathBuf },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<IntegrityFailure> for LedgerError {
    fn from(failure: IntegrityFailure) -> Self {
        Self::Integrity(failure)
    }
}
