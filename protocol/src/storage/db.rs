//! # Persistent Record Store
//!
//! The on-disk [`Store`], built on sled's embedded key-value store.
//!
//! ## Key Layout
//!
//! Every record set shares one sled tree, `records`. Keys carry the set's
//! name and a NUL as prefix:
//!
//! | Set            | Key after prefix             | Value               |
//! |----------------|------------------------------|---------------------|
//! | `balances`     | `address \0 asset`           | `bincode(Balance)`  |
//! | `credits`      | sequence (8B BE)             | `bincode(Credit)`   |
//! | `debits`       | sequence (8B BE)             | `bincode(Debit)`    |
//! | `messages`     | `message_index` (8B BE)      | `bincode(Message)`  |
//! | `assets`       | asset name (UTF-8)           | `bincode(AssetRecord)` |
//! | issuance-like  | `tx_index` (8B BE)           | `bincode(..)`       |
//! | instruments    | `tx_hash` or match `id`      | `bincode(..)`       |
//!
//! Integers are big-endian so sled's lexicographic order is numeric order
//! and `next_back()` on a prefix finds the highest message index.
//!
//! ## Atomicity
//!
//! A [`WriteBatch`] becomes one sled `Batch` on the single tree, so a
//! balance change, its credit or debit row and its log message land
//! together or not at all. Keeping one tree is what makes that possible
//! without sled's multi-tree transactions.

use std::collections::HashMap;
use std::path::Path;

use sled::{Batch, Db, Tree};

use super::store::{next_sequence, RecordSet, Store, StoreResult, WriteBatch, WriteOp};

const RECORDS_TREE: &str = "records";

fn prefix(set: RecordSet) -> Vec<u8> {
    let mut prefix = set.name().as_bytes().to_vec();
    prefix.push(0);
    prefix
}

fn prefixed(set: RecordSet, key: &[u8]) -> Vec<u8> {
    let mut full = prefix(set);
    full.extend_from_slice(key);
    full
}

/// Persistent record store on sled.
///
/// sled handles concurrent readers; `SledStore` is `Clone` and can be
/// shared across threads. Writers are expected to be serialized by the
/// caller.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    records: Tree,
}

impl SledStore {
    /// Open or create a store at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Store that lives in a temporary directory and is removed on drop.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let records = db.open_tree(RECORDS_TREE)?;
        Ok(Self { db, records })
    }

    /// Number of records in `set`.
    pub fn count(&self, set: RecordSet) -> usize {
        self.records.scan_prefix(prefix(set)).count()
    }

    /// Blocks until all pending writes are durable.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn last_key(&self, set: RecordSet) -> StoreResult<Option<Vec<u8>>> {
        let prefix_len = prefix(set).len();
        match self.records.scan_prefix(prefix(set)).next_back() {
            Some(entry) => {
                let (key, _) = entry?;
                Ok(Some(key[prefix_len..].to_vec()))
            }
            None => Ok(None),
        }
    }
}

impl Store for SledStore {
    fn get(&self, set: RecordSet, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.records.get(prefixed(set, key))?.map(|v| v.to_vec()))
    }

    fn scan(&self, set: RecordSet) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let prefix_len = prefix(set).len();
        let mut out = Vec::new();
        for entry in self.records.scan_prefix(prefix(set)) {
            let (key, value) = entry?;
            out.push((key[prefix_len..].to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    fn last(&self, set: RecordSet) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        let prefix_len = prefix(set).len();
        match self.records.scan_prefix(prefix(set)).next_back() {
            Some(entry) => {
                let (key, value) = entry?;
                Ok(Some((key[prefix_len..].to_vec(), value.to_vec())))
            }
            None => Ok(None),
        }
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut sled_batch = Batch::default();
        let mut sequences: HashMap<RecordSet, u64> = HashMap::new();

        for op in batch.into_ops() {
            match op {
                WriteOp::Put { set, key, value } => {
                    sled_batch.insert(prefixed(set, &key), value);
                }
                WriteOp::Append { set, value } => {
                    let seq = match sequences.get(&set) {
                        Some(seq) => *seq,
                        None => next_sequence(set, self.last_key(set)?.as_deref())?,
                    };
                    sequences.insert(set, seq + 1);
                    sled_batch.insert(prefixed(set, &seq.to_be_bytes()), value);
                }
            }
        }

        self.records.apply_batch(sled_batch)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
