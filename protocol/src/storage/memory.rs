//! In-memory [`Store`] for tests and throwaway replays.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use super::store::{next_sequence, RecordSet, Store, StoreResult, WriteBatch, WriteOp};

type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// `BTreeMap` per record set behind a single `RwLock`.
///
/// Cloning is cheap and clones share the same data, like a second handle
/// to the same database.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<RecordSet, Table>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in `set`.
    pub fn count(&self, set: RecordSet) -> usize {
        self.tables.read().get(&set).map_or(0, BTreeMap::len)
    }
}

impl Store for MemoryStore {
    fn get(&self, set: RecordSet, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .tables
            .read()
            .get(&set)
            .and_then(|table| table.get(key).cloned()))
    }

    fn scan(&self, set: RecordSet) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .tables
            .read()
            .get(&set)
            .map(|table| table.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn last(&self, set: RecordSet) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .tables
            .read()
            .get(&set)
            .and_then(|table| table.iter().next_back())
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut tables = self.tables.write();

        // Resolve every key before touching the tables so a bad op leaves
        // nothing half-applied.
        let mut sequences: HashMap<RecordSet, u64> = HashMap::new();
        let mut resolved = Vec::with_capacity(batch.len());
        for op in batch.into_ops() {
            match op {
                WriteOp::Put { set, key, value } => resolved.push((set, key, value)),
                WriteOp::Append { set, value } => {
                    let seq = match sequences.get(&set) {
                        Some(seq) => *seq,
                        None => {
                            let last = tables.get(&set).and_then(|t| t.keys().next_back());
                            next_sequence(set, last.map(Vec::as_slice))?
                        }
                    };
                    sequences.insert(set, seq + 1);
                    resolved.push((set, seq.to_be_bytes().to_vec(), value));
                }
            }
        }

        for (set, key, value) in resolved {
            tables.entry(set).or_default().insert(key, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::store::{Record, StoreExt};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        name: String,
        value: u64,
    }

    impl Record for Row {
        const SET: RecordSet = RecordSet::Balances;
        fn key(&self) -> Option<Vec<u8>> {
            Some(self.name.as_bytes().to_vec())
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entry(u64);

    impl Record for Entry {
        const SET: RecordSet = RecordSet::Credits;
        fn key(&self) -> Option<Vec<u8>> {
            None
        }
    }

    fn row(name: &str, value: u64) -> Row {
        Row {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn put_then_fetch() {
        let store = MemoryStore::new();
        store.insert(&row("alice", 5)).unwrap();

        assert_eq!(store.fetch::<Row>(b"alice").unwrap(), Some(row("alice", 5)));
        assert_eq!(store.fetch::<Row>(b"bob").unwrap(), None);
        assert_eq!(store.get(RecordSet::Debits, b"alice").unwrap(), None);
    }

    #[test]
    fn put_overwrites_existing_key() {
        let store = MemoryStore::new();
        store.insert(&row("alice", 5)).unwrap();
        store.insert(&row("alice", 9)).unwrap();

        assert_eq!(store.count(RecordSet::Balances), 1);
        assert_eq!(store.fetch::<Row>(b"alice").unwrap().unwrap().value, 9);
    }

    #[test]
    fn appends_are_sequenced_across_commits() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put(&Entry(10)).unwrap();
        batch.put(&Entry(11)).unwrap();
        store.commit(batch).unwrap();
        store.insert(&Entry(12)).unwrap();

        let keys: Vec<Vec<u8>> = store
            .scan(RecordSet::Credits)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(
            keys,
            vec![
                0u64.to_be_bytes().to_vec(),
                1u64.to_be_bytes().to_vec(),
                2u64.to_be_bytes().to_vec()
            ]
        );
        assert_eq!(store.load_last::<Entry>().unwrap(), Some(Entry(12)));
    }

    #[test]
    fn scan_is_key_ordered() {
        let store = MemoryStore::new();
        store.insert(&row("carol", 3)).unwrap();
        store.insert(&row("alice", 1)).unwrap();
        store.insert(&row("bob", 2)).unwrap();

        let names: Vec<String> = store
            .load_all::<Row>()
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, ["alice", "bob", "carol"]);
    }

    #[test]
    fn corrupt_sequence_key_rejects_whole_batch() {
        let store = MemoryStore::new();
        store
            .tables
            .write()
            .entry(RecordSet::Credits)
            .or_default()
            .insert(b"bad".to_vec(), Vec::new());

        let mut batch = WriteBatch::new();
        batch.put(&row("alice", 1)).unwrap();
        batch.put(&Entry(1)).unwrap();
        assert!(store.commit(batch).is_err());
        assert_eq!(store.fetch::<Row>(b"alice").unwrap(), None);
    }

    #[test]
    fn clones_share_data() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.insert(&row("alice", 1)).unwrap();
        assert!(other.fetch::<Row>(b"alice").unwrap().is_some());
    }
}
