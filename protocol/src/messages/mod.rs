//! # Message / Audit Log
//!
//! Every state change is also written to an append-only log that gives a
//! total order over events of all categories. Downstream consumers (block
//! explorers, wallets, the API layer) follow the log instead of diffing
//! tables.
//!
//! ## Architecture
//!
//! ```text
//! bindings.rs: BindingValue and the ordered key/value payload map
//! event.rs   : Event: one typed variant per category, decode and merge
//! json.rs    : byte-stable JSON rendering of a payload
//! log.rs     : MessageLog: index allocation, mempool stripping, renderer hook
//! ```
//!
//! ## Payload Rules
//!
//! - `message_index` is one more than the current maximum, or 0.
//! - Mempool messages lose `status`, `block_index` and `tx_index`.
//! - Bytes become lowercase hex; keys are emitted in sorted order.

pub mod bindings;
pub mod event;
pub mod json;
pub mod log;

use thiserror::Error;

use crate::storage::StoreError;

pub use bindings::{bindings_from_json, BindingValue, Bindings};
pub use event::Event;
pub use json::to_payload_json;
pub use log::{last_message, MessageLog, MessageRenderer};

/// Errors raised while building or recording messages.
#[derive(Debug, Error)]
pub enum MessageError {
    /// No event type is registered for the category.
    #[error("unknown message category: {0}")]
    UnknownCategory(String),

    /// The bindings do not fit the category's event type.
    #[error("invalid bindings for {category}: {reason}")]
    InvalidBindings { category: String, reason: String },

    /// The payload could not be rendered to JSON.
    #[error("failed to render payload: {0}")]
    Payload(#[source] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type MessageResult<T> = Result<T, MessageError>;
