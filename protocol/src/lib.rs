// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Tally Protocol Ledger Core
//!
//! Derives asset ownership, supply and event history from an ordered stream
//! of already-validated protocol messages. Every node that replays the same
//! stream must end up with byte-identical balances, asset ids and message
//! payloads, so everything here is deterministic and height-gated.
//!
//! ## Architecture
//!
//! - **asset**: Asset name ↔ id codec, sub-asset long names, registry lookups.
//! - **activation**: Protocol-change schedule: which rule applies at which height.
//! - **context**: Height, network and per-block ledger accumulator for one block.
//! - **ledger**: Balances with `credit`, `debit` and `transfer`, plus the block ledger hash.
//! - **supply**: Creation, destruction and holdings aggregates; conservation check.
//! - **messages**: Append-only message log with a stable JSON payload format.
//! - **replay**: Drives a decoded message stream through all of the above.
//! - **storage**: `Store` trait with in-memory and sled backends, typed records.
//! - **cache**: Bounded FIFO cache for data fetched from outside the ledger.
//! - **options**, **price**: Address option bitmasks and price representation.
//! - **config**: Protocol constants and network parameters.
//!
//! ## Design Philosophy
//!
//! 1. Consensus first. A constant changed here is a fork.
//! 2. One commit per state change: balance, audit record and message together.
//! 3. The library logs through `tracing` and never installs a subscriber.
//! 4. If it touches a balance, it has tests.

pub mod activation;
pub mod asset;
pub mod cache;
pub mod config;
pub mod context;
pub mod ledger;
pub mod messages;
pub mod options;
pub mod price;
pub mod replay;
pub mod storage;
pub mod supply;

pub use activation::{ProtocolSchedule, ScheduleError};
pub use asset::{AssetError, AssetId};
pub use cache::FifoCache;
pub use config::{LedgerConfig, Network};
pub use context::BlockContext;
pub use ledger::{Ledger, LedgerError};
pub use messages::{MessageError, MessageLog, MessageRenderer};
pub use replay::{BlockSummary, DecodedMessage, ReplayError, Replayer};
pub use storage::{MemoryStore, SledStore, Store, StoreError};
