//! Disk persistence for records: one JSON object per line, append-only.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{error, warn};

use crate::error::LedgerError;
use crate::model::{HashAlgorithm, Record};

const JOURNAL_FILE: &str = "ledger.jsonl";
const META_FILE: &str = "ledger.meta.json";

/// Chain-level settings written once, next to the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainMeta {
    pub algorithm: HashAlgorithm,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
}

/// Ensure that the given directory exists (create recursively if needed).
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

pub fn journal_path(dir: &Path) -> PathBuf {
    dir.join(JOURNAL_FILE)
}

pub fn meta_path(dir: &Path) -> PathBuf {
    dir.join(META_FILE)
}

pub fn load_meta(dir: &Path) -> Result<Option<ChainMeta>, LedgerError> {
    let p = meta_path(dir);
    if !p.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(p)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

pub fn save_meta(dir: &Path, meta: &ChainMeta) -> Result<(), LedgerError> {
    ensure_dir(dir)?;
    let json = serde_json::to_string_pretty(meta)?;
    let mut f = File::create(meta_path(dir))?;
    f.write_all(json.as_bytes())?;
    f.sync_all()?;
    Ok(())
}

/// Read every record from the journal in file order. A missing journal is an
/// empty chain; a line that does not parse is an error, never skipped.
pub fn load_records(dir: &Path) -> Result<Vec<Record>, LedgerError> {
    let p = journal_path(dir);
    if !p.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(p)?);
    let mut out = vec![];
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str::<Record>(&line)
            .map_err(|source| LedgerError::Corrupt { line: n + 1, source })?;
        out.push(record);
    }
    Ok(out)
}

/// Append handle on the journal file.
#[derive(Debug)]
pub struct Journal {
    file: File,
    path: PathBuf,
    /// Set when a failed write could not be rolled back. The file may then
    /// hold a torn or orphaned line, so no further appends are accepted.
    failed: bool,
}

impl Journal {
    pub fn open(dir: &Path) -> Result<Self, LedgerError> {
        ensure_dir(dir)?;
        let path = journal_path(dir);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            file,
            path,
            failed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one record as a single line and sync it to disk. On failure the
    /// file is truncated back to its previous length, so the journal never
    /// holds a record the in-memory chain does not.
    pub fn append(&mut self, record: &Record) -> Result<(), LedgerError> {
        if self.failed {
            return Err(LedgerError::JournalFailed {
                path: self.path.clone(),
            });
        }
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let start = self.file.metadata()?.len();
        let written = self
            .file
            .write_all(&line)
            .and_then(|()| self.file.sync_data());
        if let Err(e) = written {
            self.rollback(start);
            return Err(e.into());
        }
        Ok(())
    }

    fn rollback(&mut self, len: u64) {
        let truncated = self
            .file
            .set_len(len)
            .and_then(|()| self.file.sync_data());
        match truncated {
            Ok(()) => warn!(
                path = %self.path.display(),
                len,
                "rolled back failed journal write"
            ),
            Err(e) => {
                error!(
                    path = %self.path.display(),
                    "journal rollback failed, refusing further appends: {e}"
                );
                self.failed = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn record(index: u64) -> Record {
        Record {
            index,
            timestamp: datetime!(2024-05-01 12:00 UTC),
            payload: json!({ "code": format!("PRD-{index:012}") }),
            previous_digest: "0".into(),
            digest: "ab".repeat(32),
        }
    }

    #[test]
    fn missing_journal_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_records(dir.path()).unwrap().is_empty());
        assert!(load_meta(dir.path()).unwrap().is_none());
    }

    #[test]
    fn journal_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = Journal::open(dir.path()).unwrap();
        journal.append(&record(0)).unwrap();
        journal.append(&record(1)).unwrap();
        drop(journal);

        let raw = fs::read_to_string(journal_path(dir.path())).unwrap();
        assert_eq!(raw.lines().count(), 2);

        // Reopening appends instead of truncating.
        let mut journal = Journal::open(dir.path()).unwrap();
        journal.append(&record(2)).unwrap();

        let loaded = load_records(dir.path()).unwrap();
        assert_eq!(loaded, vec![record(0), record(1), record(2)]);
    }

    #[test]
    fn corrupt_line_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = Journal::open(dir.path()).unwrap();
        journal.append(&record(0)).unwrap();
        drop(journal);
        let mut f = OpenOptions::new()
            .append(true)
            .open(journal_path(dir.path()))
            .unwrap();
        f.write_all(b"{not json\n").unwrap();

        match load_records(dir.path()) {
            Err(LedgerError::Corrupt { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[test]
    fn rollback_drops_a_torn_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = Journal::open(dir.path()).unwrap();
        journal.append(&record(0)).unwrap();

        let start = journal.file.metadata().unwrap().len();
        journal.file.write_all(br#"{"index":1,"times"#).unwrap();
        journal.rollback(start);
        assert!(!journal.failed);

        journal.append(&record(1)).unwrap();
        assert_eq!(load_records(dir.path()).unwrap(), vec![record(0), record(1)]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn write_failure_poisons_journal_that_cannot_truncate() {
        if !Path::new("/dev/full").exists() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink("/dev/full", journal_path(dir.path())).unwrap();
        let mut journal = Journal::open(dir.path()).unwrap();

        assert!(matches!(journal.append(&record(0)), Err(LedgerError::Io(_))));
        assert!(journal.failed);
        assert!(matches!(
            journal.append(&record(0)),
            Err(LedgerError::JournalFailed { .. })
        ));
    }

    #[test]
    fn meta_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let meta = ChainMeta {
            algorithm: HashAlgorithm::Blake3,
            created: datetime!(2024-05-01 12:00 UTC),
        };
        save_meta(dir.path(), &meta).unwrap();
        assert_eq!(load_meta(dir.path()).unwrap(), Some(meta));
    }
}
