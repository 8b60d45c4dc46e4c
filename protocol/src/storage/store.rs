//! Store abstraction over named record sets.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("key not found: {0}")]
    NotFound(String),

    /// A message was required but the log is empty.
    #[error("no messages found")]
    NoMessages,

    /// A match id is not two 64-character hashes joined by `_`.
    #[error("malformed match id: {0}")]
    MalformedId(String),

    /// A stored key does not have the shape its record set requires.
    #[error("corrupt key in {set}: {reason}")]
    CorruptKey { set: RecordSet, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// RecordSet
// ---------------------------------------------------------------------------

/// Every named record set the core reads or writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordSet {
    Balances,
    Credits,
    Debits,
    Messages,
    Assets,
    Issuances,
    Destructions,
    Burns,
    Dividends,
    Sweeps,
    Sends,
    Orders,
    OrderMatches,
    Bets,
    BetMatches,
    Rps,
    RpsMatches,
    Dispensers,
}

impl RecordSet {
    pub const ALL: [RecordSet; 18] = [
        RecordSet::Balances,
        RecordSet::Credits,
        RecordSet::Debits,
        RecordSet::Messages,
        RecordSet::Assets,
        RecordSet::Issuances,
        RecordSet::Destructions,
        RecordSet::Burns,
        RecordSet::Dividends,
        RecordSet::Sweeps,
        RecordSet::Sends,
        RecordSet::Orders,
        RecordSet::OrderMatches,
        RecordSet::Bets,
        RecordSet::BetMatches,
        RecordSet::Rps,
        RecordSet::RpsMatches,
        RecordSet::Dispensers,
    ];

    /// Table name, also the message-log category for inserts into the set.
    pub fn name(&self) -> &'static str {
        match self {
            RecordSet::Balances => "balances",
            RecordSet::Credits => "credits",
            RecordSet::Debits => "debits",
            RecordSet::Messages => "messages",
            RecordSet::Assets => "assets",
            RecordSet::Issuances => "issuances",
            RecordSet::Destructions => "destructions",
            RecordSet::Burns => "burns",
            RecordSet::Dividends => "dividends",
            RecordSet::Sweeps => "sweeps",
            RecordSet::Sends => "sends",
            RecordSet::Orders => "orders",
            RecordSet::OrderMatches => "order_matches",
            RecordSet::Bets => "bets",
            RecordSet::BetMatches => "bet_matches",
            RecordSet::Rps => "rps",
            RecordSet::RpsMatches => "rps_matches",
            RecordSet::Dispensers => "dispensers",
        }
    }

    /// Inverse of [`RecordSet::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|set| set.name() == name)
    }

    /// `true` for sets whose keys are store-assigned sequence numbers.
    pub fn is_append_only(&self) -> bool {
        matches!(self, RecordSet::Credits | RecordSet::Debits)
    }
}

impl fmt::Display for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A typed row of one record set.
pub trait Record: Serialize + DeserializeOwned {
    /// The set this record type lives in.
    const SET: RecordSet;

    /// Primary key, or `None` for append-only sets where the store assigns
    /// the next sequence number on commit.
    fn key(&self) -> Option<Vec<u8>>;
}

pub(crate) fn encode<R: Serialize>(record: &R) -> StoreResult<Vec<u8>> {
    bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))
}

pub(crate) fn decode<R: DeserializeOwned>(bytes: &[u8]) -> StoreResult<R> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Sequence number following the last key of an append-only set.
pub(crate) fn next_sequence(set: RecordSet, last_key: Option<&[u8]>) -> StoreResult<u64> {
    match last_key {
        None => Ok(0),
        Some(key) => {
            let bytes: [u8; 8] = key.try_into().map_err(|_| StoreError::CorruptKey {
                set,
                reason: format!("expected 8-byte sequence, found {} bytes", key.len()),
            })?;
            Ok(u64::from_be_bytes(bytes) + 1)
        }
    }
}

// ---------------------------------------------------------------------------
// WriteBatch
// ---------------------------------------------------------------------------

/// A single staged mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert or overwrite `key` in `set`.
    Put {
        set: RecordSet,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    /// Append `value` under the set's next sequence number.
    Append { set: RecordSet, value: Vec<u8> },
}

/// Mutations applied atomically by [`Store::commit`], in order.
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a typed record: a put for keyed sets, an append otherwise.
    pub fn put<R: Record>(&mut self, record: &R) -> StoreResult<()> {
        let value = encode(record)?;
        let op = match record.key() {
            Some(key) => WriteOp::Put {
                set: R::SET,
                key,
                value,
            },
            None => WriteOp::Append { set: R::SET, value },
        };
        self.ops.push(op);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Transactional record store.
///
/// Implementations must make [`Store::commit`] atomic and make committed
/// writes visible to every subsequent read. Concurrent writers are not
/// coordinated here: callers serialize mutations per store, one logical
/// writer per block.
pub trait Store: Send + Sync {
    /// Raw value for `key` in `set`.
    fn get(&self, set: RecordSet, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// All `(key, value)` pairs of `set`, in ascending key order.
    fn scan(&self, set: RecordSet) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Entry with the greatest key in `set`.
    fn last(&self, set: RecordSet) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>>;

    /// Applies every op of `batch` atomically.
    fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}

/// Typed helpers on top of any [`Store`].
pub trait StoreExt: Store {
    /// Reads one record by primary key.
    fn fetch<R: Record>(&self, key: &[u8]) -> StoreResult<Option<R>> {
        self.get(R::SET, key)?.map(|bytes| decode(&bytes)).transpose()
    }

    /// Reads every record of `R`'s set in key order.
    fn load_all<R: Record>(&self) -> StoreResult<Vec<R>> {
        self.scan(R::SET)?
            .iter()
            .map(|(_, bytes)| decode(bytes))
            .collect()
    }

    /// Reads the record with the greatest key.
    fn load_last<R: Record>(&self) -> StoreResult<Option<R>> {
        self.last(R::SET)?.map(|(_, bytes)| decode(&bytes)).transpose()
    }

    /// Commits a single record on its own.
    fn insert<R: Record>(&self, record: &R) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(record)?;
        self.commit(batch)
    }
}

impl<T: Store + ?Sized> StoreExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_set_names_round_trip() {
        for set in RecordSet::ALL {
            assert_eq!(RecordSet::from_name(set.name()), Some(set));
        }
        assert_eq!(RecordSet::from_name("broadcasts"), None);
    }

    #[test]
    fn sequences_start_at_zero_and_increment() {
        assert_eq!(next_sequence(RecordSet::Credits, None).unwrap(), 0);
        let key = 41u64.to_be_bytes();
        assert_eq!(next_sequence(RecordSet::Credits, Some(&key)).unwrap(), 42);
        assert!(matches!(
            next_sequence(RecordSet::Credits, Some(b"oops")),
            Err(StoreError::CorruptKey { .. })
        ));
    }
}
