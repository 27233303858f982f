//! The hash chain: sole writer to the record store.
//!
//! Every append runs under one exclusive lock covering "read length and
//! latest digest", digest computation, the journal write and the push into
//! the store. Readers share the lock, so they only ever see fully appended
//! records.

use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::LedgerError;
use crate::model::{
    compute_digest, genesis_payload, verify_records, HashAlgorithm, Record, Verification,
    SENTINEL,
};
use crate::storage::{self, ChainMeta, Journal};
use crate::store::RecordStore;

/// How to build or reopen a chain.
#[derive(Clone)]
pub struct ChainOptions {
    pub algorithm: HashAlgorithm,
    pub clock: Arc<dyn Clock>,
    /// Journal directory. `None` keeps the chain in memory only.
    pub data_dir: Option<PathBuf>,
    /// Verify a reopened journal before accepting it.
    pub verify_on_open: bool,
}

impl ChainOptions {
    pub fn in_memory() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            clock: Arc::new(SystemClock),
            data_dir: None,
            verify_on_open: true,
        }
    }

    pub fn persistent(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            ..Self::in_memory()
        }
    }

    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn verify_on_open(mut self, verify: bool) -> Self {
        self.verify_on_open = verify;
        self
    }
}

struct ChainState {
    store: RecordStore,
    journal: Option<Journal>,
}

pub struct HashChain {
    algorithm: HashAlgorithm,
    clock: Arc<dyn Clock>,
    state: RwLock<ChainState>,
}

impl HashChain {
    /// In-memory chain on the system clock, holding only the genesis record.
    pub fn initialize(algorithm: HashAlgorithm) -> Self {
        Self::with_clock(algorithm, Arc::new(SystemClock))
    }

    /// In-memory chain on an injected clock.
    pub fn with_clock(algorithm: HashAlgorithm, clock: Arc<dyn Clock>) -> Self {
        let chain = Self::empty(algorithm, clock, None);
        {
            let mut state = chain.write();
            let genesis = chain.seal(&state.store, genesis_payload());
            state.store.append(genesis);
        }
        chain
    }

    /// Build a chain from options. With a data directory, an existing journal
    /// is loaded (and verified unless disabled); otherwise a fresh genesis
    /// record is written to a new journal.
    pub fn open(opts: ChainOptions) -> Result<Self, LedgerError> {
        let Some(dir) = opts.data_dir else {
            return Ok(Self::with_clock(opts.algorithm, opts.clock));
        };

        storage::ensure_dir(&dir)?;
        let meta = storage::load_meta(&dir)?;
        if let Some(meta) = &meta {
            if meta.algorithm != opts.algorithm {
                return Err(LedgerError::AlgorithmMismatch {
                    configured: opts.algorithm,
                    recorded: meta.algorithm,
                });
            }
        }

        let records = storage::load_records(&dir)?;
        // Without a manifest the algorithm is only known once the records
        // verify under it.
        if !records.is_empty() && (opts.verify_on_open || meta.is_none()) {
            let checked = verify_records(&records, opts.algorithm).into_result()?;
            debug!(checked, "journal verified on open");
        }
        if meta.is_none() {
            storage::save_meta(
                &dir,
                &ChainMeta {
                    algorithm: opts.algorithm,
                    created: records.first().map_or_else(|| opts.clock.now(), |r| r.timestamp),
                },
            )?;
        }

        let journal = Journal::open(&dir)?;
        let journal_path = journal.path().to_path_buf();

        if records.is_empty() {
            let chain = Self::empty(opts.algorithm, opts.clock, Some(journal));
            {
                let mut state = chain.write();
                let genesis = chain.seal(&state.store, genesis_payload());
                Self::commit(&mut state, genesis)?;
            }
            info!(
                path = %journal_path.display(),
                algorithm = %opts.algorithm,
                "created new ledger"
            );
            return Ok(chain);
        }

        info!(
            path = %journal_path.display(),
            records = records.len(),
            algorithm = %opts.algorithm,
            "loaded ledger from disk"
        );
        Ok(Self {
            algorithm: opts.algorithm,
            clock: opts.clock,
            state: RwLock::new(ChainState {
                store: RecordStore::from_records(records),
                journal: Some(journal),
            }),
        })
    }

    fn empty(algorithm: HashAlgorithm, clock: Arc<dyn Clock>, journal: Option<Journal>) -> Self {
        Self {
            algorithm,
            clock,
            state: RwLock::new(ChainState {
                store: RecordStore::new(),
                journal,
            }),
        }
    }

    // A record is only pushed after it is sealed and journaled, so a poisoned
    // lock still guards a consistent store.
    fn read(&self) -> RwLockReadGuard<'_, ChainState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ChainState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Build the next record on top of `store`. Timestamps never go backwards,
    /// even if the clock does.
    fn seal(&self, store: &RecordStore, payload: Value) -> Record {
        let index = store.next_index();
        let previous = store.last();
        let previous_digest = previous
            .map(|r| r.digest.clone())
            .unwrap_or_else(|| SENTINEL.to_string());
        let now = self.clock.now();
        let timestamp = match previous {
            Some(prev) if prev.timestamp > now => prev.timestamp,
            _ => now,
        };
        let digest = compute_digest(self.algorithm, index, timestamp, &payload, &previous_digest);
        Record {
            index,
            timestamp,
            payload,
            previous_digest,
            digest,
        }
    }

    fn commit(state: &mut ChainState, record: Record) -> Result<Record, LedgerError> {
        if let Some(journal) = state.journal.as_mut() {
            journal.append(&record)?;
        }
        Ok(state.store.append(record))
    }

    /// Append a caller payload and return the sealed record.
    pub fn append(&self, payload: Value) -> Result<Record, LedgerError> {
        let mut state = self.write();
        let record = self.seal(&state.store, payload);
        let record = Self::commit(&mut state, record)?;
        debug!(index = record.index, digest = %record.digest, "appended record");
        Ok(record)
    }

    pub fn all(&self) -> Vec<Record> {
        self.read().store.all()
    }

    pub fn get(&self, index: u64) -> Result<Record, LedgerError> {
        self.read().store.get(index)
    }

    pub fn latest(&self) -> Result<Record, LedgerError> {
        self.read()
            .store
            .last()
            .cloned()
            .ok_or(LedgerError::EmptyChain)
    }

    pub fn len(&self) -> u64 {
        self.read().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().store.is_empty()
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Walk the whole chain. A failure is reported and logged, never repaired;
    /// appends keep working afterwards.
    pub fn verify(&self) -> Verification {
        let state = self.read();
        let verification = verify_records(state.store.as_slice(), self.algorithm);
        if let Some(failure) = &verification.failure {
            warn!(
                index = ?failure.index,
                reason = %failure.kind,
                "ledger integrity check failed"
            );
        }
        verification
    }
}
