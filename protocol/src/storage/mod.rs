//! # Storage Module
//!
//! The ledger never talks to a database directly. It sees a [`Store`]: a
//! set of named record sets with keyed reads, ordered scans, and atomic
//! multi-record commits.
//!
//! ## Architecture
//!
//! ```text
//! store.rs   : Store trait, Record trait, WriteBatch, typed StoreExt helpers
//! records.rs : Typed rows: balances, credits/debits, messages, issuances,
//!               escrow-bearing instruments (orders, bets, RPS, dispensers)
//! memory.rs  : MemoryStore: BTreeMaps behind a RwLock (tests, dry runs)
//! db.rs      : SledStore: one sled tree, keys prefixed by record set
//! ```
//!
//! ## Design Decisions
//!
//! 1. **One commit per ledger step.** A balance update, its credit/debit
//!    row and its message-log entry travel in the same [`WriteBatch`], so a
//!    reader sees all three or none.
//!
//! 2. **Store-assigned sequences for append-only sets.** Credits and debits
//!    have no natural key; the store numbers them in commit order.
//!
//! 3. **Bincode on disk.** Compact and deterministic. JSON is reserved for
//!    the message log payloads, which have to be byte-stable across nodes.

pub mod db;
pub mod memory;
pub mod records;
pub mod store;

pub use db::SledStore;
pub use memory::MemoryStore;
pub use records::*;
pub use store::{Record, RecordSet, Store, StoreError, StoreExt, StoreResult, WriteBatch, WriteOp};
