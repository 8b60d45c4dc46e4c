//! # Message Replay
//!
//! Feeds a decoded message stream through the ledger and the message log,
//! one message at a time, in arrival order.
//!
//! ## Routing
//!
//! | Message                         | Effect                                         |
//! |---------------------------------|------------------------------------------------|
//! | confirmed `credits`/`debits`    | [`Ledger::credit`] / [`Ledger::debit`]         |
//! | other confirmed `insert`        | typed record + message, one commit             |
//! | confirmed `update`              | merged record + message, one commit            |
//! | mempool (any)                   | stripped message only                          |
//!
//! ## Block boundaries
//!
//! The first message of a new height closes the previous block. The
//! conservation check runs first when enabled; a failure leaves the block
//! open and the message unapplied. Otherwise the block's ledger accumulator
//! is hashed onto the running hash and a [`BlockSummary`] is returned.
//! Heights never go backwards.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::activation::ProtocolSchedule;
use crate::config::{LedgerConfig, MEMPOOL_BLOCK_INDEX};
use crate::context::BlockContext;
use crate::ledger::{parse_quantity, BlockLedger, Ledger, LedgerError};
use crate::messages::{bindings_from_json, Event, MessageError};
use crate::storage::{Command, Store, StoreError, WriteBatch};
use crate::supply::{self, SupplyError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("message for block {got} arrived after block {current}")]
    HeightRegression { current: u64, got: u64 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Supply(#[from] SupplyError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ReplayResult<T> = Result<T, ReplayError>;

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// One decoder output, as read from a JSON-lines stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecodedMessage {
    pub block_index: u64,
    pub command: Command,
    pub category: String,
    #[serde(default)]
    pub bindings: Map<String, Value>,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

impl DecodedMessage {
    pub fn is_mempool(&self) -> bool {
        self.block_index == MEMPOOL_BLOCK_INDEX
    }
}

/// What a closed block contributed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockSummary {
    pub height: u64,
    /// Confirmed credits and debits applied in the block.
    pub ledger_entries: usize,
    /// Running ledger hash after this block.
    pub ledger_hash: String,
    /// Confirmed messages applied in the block.
    pub messages: u64,
}

// ---------------------------------------------------------------------------
// Replayer
// ---------------------------------------------------------------------------

/// Applies decoded messages to a store in order.
#[derive(Debug)]
pub struct Replayer<S: Store> {
    ledger: Ledger<S>,
    schedule: Arc<ProtocolSchedule>,
    ctx: Option<BlockContext>,
    check_conservation: bool,
    ledger_hash: String,
    messages_in_block: u64,
}

impl<S: Store> Replayer<S> {
    pub fn new(ledger: Ledger<S>, schedule: Arc<ProtocolSchedule>, config: &LedgerConfig) -> Self {
        Self {
            ledger,
            schedule,
            ctx: None,
            check_conservation: config.check_asset_conservation,
            ledger_hash: String::new(),
            messages_in_block: 0,
        }
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    /// Height of the open block, if any message has been applied.
    pub fn height(&self) -> Option<u64> {
        self.ctx.as_ref().map(BlockContext::height)
    }

    /// Ledger hash as of the last closed block. Empty before the first one.
    pub fn ledger_hash(&self) -> &str {
        &self.ledger_hash
    }

    /// Applies one message. Returns the summary of the previous block when
    /// this message opens a new one.
    ///
    /// # Errors
    ///
    /// - [`ReplayError::HeightRegression`] for a confirmed height below the
    ///   open block.
    /// - Ledger, message, store and conservation failures, unchanged.
    pub fn apply(&mut self, message: DecodedMessage) -> ReplayResult<Option<BlockSummary>> {
        if message.is_mempool() {
            self.apply_mempool(message)?;
            return Ok(None);
        }

        let finished = match self.height() {
            Some(height) if height == message.block_index => None,
            Some(height) if message.block_index < height => {
                return Err(ReplayError::HeightRegression {
                    current: height,
                    got: message.block_index,
                });
            }
            Some(height) => {
                self.check_block()?;
                self.ctx
                    .as_mut()
                    .map(|ctx| (height, ctx.advance(message.block_index)))
            }
            None => {
                self.ctx = Some(BlockContext::new(
                    Arc::clone(&self.schedule),
                    message.block_index,
                ));
                None
            }
        };
        let summary = match finished {
            Some((height, block)) => Some(self.close(height, &block)?),
            None => None,
        };

        self.apply_confirmed(message)?;
        self.messages_in_block += 1;
        Ok(summary)
    }

    /// Closes the open block, if any. Call once the stream is exhausted.
    pub fn finish(&mut self) -> ReplayResult<Option<BlockSummary>> {
        if self.ctx.is_none() {
            return Ok(None);
        }
        self.check_block()?;
        let Some(mut ctx) = self.ctx.take() else {
            return Ok(None);
        };
        let height = ctx.height();
        let block = ctx.advance(height);
        self.close(height, &block).map(Some)
    }

    /// Runs the conservation check on the open block. The block stays open
    /// when it fails.
    fn check_block(&self) -> ReplayResult<()> {
        if self.check_conservation {
            supply::check_conservation(self.ledger.store())?;
        }
        Ok(())
    }

    fn close(&mut self, height: u64, block: &BlockLedger) -> ReplayResult<BlockSummary> {
        self.ledger_hash = block.hash(&self.ledger_hash);

        let summary = BlockSummary {
            height,
            ledger_entries: block.len(),
            ledger_hash: self.ledger_hash.clone(),
            messages: std::mem::take(&mut self.messages_in_block),
        };
        info!(
            height,
            entries = summary.ledger_entries,
            messages = summary.messages,
            hash = %summary.ledger_hash,
            "block closed"
        );
        Ok(summary)
    }

    fn apply_confirmed(&mut self, message: DecodedMessage) -> ReplayResult<()> {
        let Some(ctx) = self.ctx.as_mut() else {
            return Ok(());
        };
        let tx_hash = message.tx_hash.as_deref();

        match (message.command, message.category.as_str()) {
            (Command::Insert, category @ ("credits" | "debits")) => {
                let fields = &message.bindings;
                let address = text_field(category, fields, "address")?;
                let asset = text_field(category, fields, "asset")?;
                let quantity = parse_quantity(fields.get("quantity").unwrap_or(&Value::Null))?;
                let action = fields.get("action").and_then(Value::as_str);
                let event = fields.get("event").and_then(Value::as_str);
                if category == "credits" {
                    self.ledger.credit(ctx, address, asset, quantity, action, event)?;
                } else {
                    self.ledger.debit(ctx, address, asset, quantity, action, event)?;
                }
            }
            (Command::Insert, category) => {
                let event = Event::decode(category, Value::Object(message.bindings))?;
                store_event(&self.ledger, ctx, Command::Insert, &event, tx_hash)?;
            }
            (Command::Update, category) => {
                let event = Event::merge_update(self.ledger.store(), category, message.bindings)?;
                store_event(&self.ledger, ctx, Command::Update, &event, tx_hash)?;
            }
        }
        Ok(())
    }

    fn apply_mempool(&self, message: DecodedMessage) -> ReplayResult<()> {
        if !Event::is_known_category(&message.category) {
            return Err(MessageError::UnknownCategory(message.category).into());
        }
        let height = match self.height() {
            Some(height) => height + 1,
            None => self.schedule.network().first_block(),
        };
        let ctx = BlockContext::mempool(Arc::clone(&self.schedule), height);
        let bindings = bindings_from_json(&Value::Object(message.bindings));
        self.ledger.log().record(
            self.ledger.store(),
            &ctx,
            message.command,
            &message.category,
            bindings,
            message.tx_hash.as_deref(),
        )?;
        debug!(category = %message.category, "mempool message logged");
        Ok(())
    }
}

/// Stores `event` and its message in one commit, then notifies.
fn store_event<S: Store>(
    ledger: &Ledger<S>,
    ctx: &BlockContext,
    command: Command,
    event: &Event,
    tx_hash: Option<&str>,
) -> ReplayResult<()> {
    let mut batch = WriteBatch::new();
    event.stage(&mut batch)?;
    let mut bindings = event.to_bindings()?;
    let message = ledger.log().stage(
        ledger.store(),
        &mut batch,
        ctx,
        command,
        event.category(),
        &mut bindings,
    )?;
    ledger.store().commit(batch)?;
    ledger.log().notify(&message, &bindings, tx_hash);
    Ok(())
}

fn text_field<'a>(
    category: &str,
    fields: &'a Map<String, Value>,
    name: &str,
) -> Result<&'a str, MessageError> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| MessageError::InvalidBindings {
            category: category.to_string(),
            reason: format!("missing text field `{name}`"),
        })
}
