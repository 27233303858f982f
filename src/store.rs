//! Ordered record container. Knows nothing about hashing.

use crate::error::LedgerError;
use crate::model::Record;

#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from records already in index order (e.g. a journal).
    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn next_index(&self) -> u64 {
        self.records.len() as u64
    }

    /// Push `record` at the next position and hand it back.
    pub fn append(&mut self, record: Record) -> Record {
        self.records.push(record.clone());
        record
    }

    /// Owned snapshot in index order.
    pub fn all(&self) -> Vec<Record> {
        self.records.clone()
    }

    pub fn as_slice(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: u64) -> Result<Record, LedgerError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.records.get(i))
            .cloned()
            .ok_or(LedgerError::NotFound {
                index,
                len: self.len(),
            })
    }

    pub fn last(&self) -> Option<&Record> {
        self.records.last()
    }

    pub fn len(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn record_mut(&mut self, index: usize) -> Option<&mut Record> {
        self.records.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::OffsetDateTime;

    fn record(index: u64) -> Record {
        Record {
            index,
            timestamp: OffsetDateTime::UNIX_EPOCH,
            payload: json!({ "n": index }),
            previous_digest: "0".into(),
            digest: format!("d{index}"),
        }
    }

    #[test]
    fn appends_in_order() {
        let mut store = RecordStore::new();
        assert!(store.is_empty());
        for i in 0..3 {
            let stored = store.append(record(i));
            assert_eq!(stored.index, i);
        }
        assert_eq!(store.len(), 3);
        assert_eq!(store.next_index(), 3);
        let indices: Vec<u64> = store.all().iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(store.last().map(|r| r.index), Some(2));
    }

    #[test]
    fn snapshot_does_not_alias_history() {
        let mut store = RecordStore::new();
        store.append(record(0));
        let mut snapshot = store.all();
        snapshot[0].payload = json!("mutated");
        snapshot.clear();
        assert_eq!(store.get(0).unwrap().payload, json!({ "n": 0 }));
    }

    #[test]
    fn get_out_of_range_is_not_found() {
        let store = RecordStore::from_records(vec![record(0), record(1), record(2)]);
        assert_eq!(store.get(2).unwrap().index, 2);
        match store.get(5) {
            Err(LedgerError::NotFound { index, len }) => {
                assert_eq!(index, 5);
                assert_eq!(len, 3);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
