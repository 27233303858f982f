//! Append-only, hash-linked record ledger.
//!
//! Each [`Record`] carries a digest over its index, timestamp, payload and the
//! digest of its predecessor, so any edit to stored history shows up in
//! [`HashChain::verify`].

pub mod chain;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod routes;
pub mod storage;
pub mod store;
pub mod verifier;

pub use chain::{ChainOptions, HashChain};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::LedgerError;
pub use model::{
    compute_digest, HashAlgorithm, IntegrityFailure, Record, Verification, ViolationKind, SENTINEL,
};
pub use store::RecordStore;
