//! Data model for the hash-linked record ledger: records, digests and the
//! integrity walk.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// `previous_digest` of the genesis record.
pub const SENTINEL: &str = "0";

/// Fixed payload of the genesis record.
pub fn genesis_payload() -> Value {
    serde_json::json!({ "genesis": true, "ledger": "code-ledger" })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// 0-indexed position in the chain.
    pub index: u64,
    /// RFC3339 on the wire; assigned at append time.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Caller content. Never inspected by the chain.
    pub payload: Value,
    /// Hex digest of the preceding record, or [`SENTINEL`] for genesis.
    pub previous_digest: String,
    /// Hex digest over (index, timestamp, payload, previous_digest).
    pub digest: String,
}

/// Hash function a chain is built with. Fixed for the lifetime of a chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => f.write_str("sha256"),
            Self::Blake3 => f.write_str("blake3"),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            other => Err(format!("unknown hash algorithm `{other}` (expected sha256 or blake3)")),
        }
    }
}

enum ChainHasher {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl ChainHasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(bytes),
            Self::Blake3(h) => {
                h.update(bytes);
            }
        }
    }

    /// Length-prefixed update, so adjacent variable-width fields cannot bleed
    /// into each other.
    fn update_framed(&mut self, bytes: &[u8]) {
        self.update(&(bytes.len() as u64).to_be_bytes());
        self.update(bytes);
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Compute a record digest.
///
/// Encoding, in order: index as 8 bytes big-endian, timestamp as Unix
/// nanoseconds in 16 bytes big-endian, then the compact JSON payload and the
/// previous digest, each prefixed with its 8-byte big-endian length.
/// `serde_json` maps keep keys sorted, so equal payloads serialize identically.
pub fn compute_digest(
    algorithm: HashAlgorithm,
    index: u64,
    timestamp: OffsetDateTime,
    payload: &Value,
    previous_digest: &str,
) -> String {
    let mut hasher = ChainHasher::new(algorithm);
    hasher.update(&index.to_be_bytes());
    hasher.update(&timestamp.unix_timestamp_nanos().to_be_bytes());
    hasher.update_framed(payload.to_string().as_bytes());
    hasher.update_framed(previous_digest.as_bytes());
    hasher.finalize_hex()
}

/// Recompute the digest of an existing record from its stored fields.
pub fn recompute_digest(algorithm: HashAlgorithm, record: &Record) -> String {
    compute_digest(
        algorithm,
        record.index,
        record.timestamp,
        &record.payload,
        &record.previous_digest,
    )
}

/// Which invariant a record broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// `index` differs from the record's position.
    IndexGap,
    /// Genesis `previous_digest` is not the sentinel.
    MissingSentinel,
    /// `previous_digest` differs from the predecessor's digest.
    BrokenLink,
    /// Stored digest differs from the recomputed one.
    DigestMismatch,
    /// Timestamp earlier than the predecessor's.
    TimestampRegression,
    EmptyChain,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IndexGap => "index gap",
            Self::MissingSentinel => "missing sentinel",
            Self::BrokenLink => "broken link",
            Self::DigestMismatch => "digest mismatch",
            Self::TimestampRegression => "timestamp regression",
            Self::EmptyChain => "empty chain",
        })
    }
}

/// First place where a chain stops being self-consistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityFailure {
    /// `None` only for [`ViolationKind::EmptyChain`].
    pub index: Option<u64>,
    pub kind: ViolationKind,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for IntegrityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(
                f,
                "{} at index {index}: expected {}, got {}",
                self.kind, self.expected, self.actual
            ),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for IntegrityFailure {}

/// Outcome of walking a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// Number of records walked.
    pub checked: u64,
    pub failure: Option<IntegrityFailure>,
}

impl Verification {
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failing_index(&self) -> Option<u64> {
        self.failure.as_ref().and_then(|f| f.index)
    }

    pub fn reason(&self) -> Option<ViolationKind> {
        self.failure.as_ref().map(|f| f.kind)
    }

    pub fn into_result(self) -> Result<u64, IntegrityFailure> {
        match self.failure {
            None => Ok(self.checked),
            Some(failure) => Err(failure),
        }
    }
}

/// Walk `records` from index 0 and report the first record that breaks the
/// chain invariants. Checks run per record in this order: index, link,
/// digest, timestamp order.
pub fn verify_records(records: &[Record], algorithm: HashAlgorithm) -> Verification {
    if records.is_empty() {
        return Verification {
            checked: 0,
            failure: Some(IntegrityFailure {
                index: None,
                kind: ViolationKind::EmptyChain,
                expected: "genesis record".to_string(),
                actual: "no records".to_string(),
            }),
        };
    }

    let fail = |position: usize, kind, expected: String, actual: String| Verification {
        checked: position as u64,
        failure: Some(IntegrityFailure {
            index: Some(position as u64),
            kind,
            expected,
            actual,
        }),
    };

    for (position, record) in records.iter().enumerate() {
        if record.index != position as u64 {
            return fail(
                position,
                ViolationKind::IndexGap,
                position.to_string(),
                record.index.to_string(),
            );
        }

        let previous = position.checked_sub(1).map(|p| &records[p]);
        match previous {
            None if record.previous_digest != SENTINEL => {
                return fail(
                    position,
                    ViolationKind::MissingSentinel,
                    SENTINEL.to_string(),
                    record.previous_digest.clone(),
                );
            }
            Some(prev) if record.previous_digest != prev.digest => {
                return fail(
                    position,
                    ViolationKind::BrokenLink,
                    prev.digest.clone(),
                    record.previous_digest.clone(),
                );
            }
            _ => {}
        }

        let recomputed = recompute_digest(algorithm, record);
        if recomputed != record.digest {
            return fail(
                position,
                ViolationKind::DigestMismatch,
                recomputed,
                record.digest.clone(),
            );
        }

        if let Some(prev) = previous {
            if record.timestamp < prev.timestamp {
                return fail(
                    position,
                    ViolationKind::TimestampRegression,
                    format!("not before {}", prev.timestamp),
                    record.timestamp.to_string(),
                );
            }
        }
    }

    Verification {
        checked: records.len() as u64,
        failure: None,
    }
}
