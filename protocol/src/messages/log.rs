//! The append-only message log.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::bindings::Bindings;
use super::json::to_payload_json;
use super::MessageResult;
use crate::context::BlockContext;
use crate::storage::{Command, Message, Store, StoreError, StoreExt, StoreResult, WriteBatch};

/// Payload keys that only describe confirmed history.
const CONFIRMED_ONLY_FIELDS: [&str; 3] = ["status", "block_index", "tx_index"];

/// Presentation hook for confirmed messages (human-readable log lines,
/// notifications). Runs after the message is committed.
pub trait MessageRenderer: Send + Sync {
    fn render(&self, message: &Message, bindings: &Bindings, tx_hash: Option<&str>);
}

/// Allocates message indices and stages messages into write batches.
#[derive(Clone, Default)]
pub struct MessageLog {
    renderer: Option<Arc<dyn MessageRenderer>>,
}

impl fmt::Debug for MessageLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageLog")
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_renderer(renderer: Arc<dyn MessageRenderer>) -> Self {
        Self {
            renderer: Some(renderer),
        }
    }

    /// One more than the highest stored index, or 0 for an empty log.
    pub fn next_index<S: Store + ?Sized>(&self, store: &S) -> StoreResult<u64> {
        Ok(store
            .load_last::<Message>()?
            .map_or(0, |last| last.message_index + 1))
    }

    /// Builds the next message and stages it into `batch`.
    ///
    /// The index is read from the store, so a batch carries at most one
    /// message and must be committed before the next one is staged.
    pub fn stage<S: Store + ?Sized>(
        &self,
        store: &S,
        batch: &mut WriteBatch,
        ctx: &BlockContext,
        command: Command,
        category: &str,
        bindings: &mut Bindings,
    ) -> MessageResult<Message> {
        if ctx.is_mempool() {
            for field in CONFIRMED_ONLY_FIELDS {
                bindings.remove(field);
            }
        }

        let message = Message {
            message_index: self.next_index(store)?,
            block_index: ctx.block_index(),
            command,
            category: category.to_string(),
            bindings: to_payload_json(bindings)?,
            timestamp: chrono::Utc::now().timestamp(),
        };
        batch.put(&message)?;
        Ok(message)
    }

    /// Hands a committed message to the renderer. Mempool messages are
    /// never rendered.
    pub fn notify(&self, message: &Message, bindings: &Bindings, tx_hash: Option<&str>) {
        debug!(
            index = message.message_index,
            block = message.block_index,
            command = %message.command,
            category = %message.category,
            "message appended"
        );
        if message.block_index == crate::config::MEMPOOL_BLOCK_INDEX {
            return;
        }
        if let Some(renderer) = &self.renderer {
            renderer.render(message, bindings, tx_hash);
        }
    }

    /// Appends a standalone message: stage, commit, notify.
    pub fn record<S: Store + ?Sized>(
        &self,
        store: &S,
        ctx: &BlockContext,
        command: Command,
        category: &str,
        mut bindings: Bindings,
        tx_hash: Option<&str>,
    ) -> MessageResult<Message> {
        let mut batch = WriteBatch::new();
        let message = self.stage(store, &mut batch, ctx, command, category, &mut bindings)?;
        store.commit(batch)?;
        self.notify(&message, &bindings, tx_hash);
        Ok(message)
    }
}

/// The most recent message.
///
/// # Errors
///
/// [`StoreError::NoMessages`] when the log is empty.
pub fn last_message<S: Store + ?Sized>(store: &S) -> StoreResult<Message> {
    store.load_last::<Message>()?.ok_or(StoreError::NoMessages)
}
