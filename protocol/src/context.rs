//! # Execution Context
//!
//! Everything a ledger or codec call needs to know about "now": the loaded
//! protocol schedule, the height being processed, whether the messages are
//! provisional (mempool), and the ledger-hash accumulator for the block.
//!
//! One context lives for one block's processing. [`BlockContext::advance`]
//! hands back the finished block's accumulator and resets it for the next
//! height.

use std::sync::Arc;

use serde_json::Value;

use crate::activation::{ProtocolSchedule, ScheduleResult};
use crate::config::{Network, MEMPOOL_BLOCK_INDEX};
use crate::ledger::BlockLedger;

/// Per-block execution state passed explicitly into every ledger call.
#[derive(Clone, Debug)]
pub struct BlockContext {
    schedule: Arc<ProtocolSchedule>,
    height: u64,
    mempool: bool,
    ledger: BlockLedger,
}

impl BlockContext {
    /// Context for a confirmed block at `height`.
    pub fn new(schedule: Arc<ProtocolSchedule>, height: u64) -> Self {
        Self {
            schedule,
            height,
            mempool: false,
            ledger: BlockLedger::new(),
        }
    }

    /// Context for provisional messages. `height` is the height activation
    /// checks run against (normally the next block to be mined); records are
    /// stamped with [`MEMPOOL_BLOCK_INDEX`].
    pub fn mempool(schedule: Arc<ProtocolSchedule>, height: u64) -> Self {
        Self {
            schedule,
            height,
            mempool: true,
            ledger: BlockLedger::new(),
        }
    }

    /// Height used for activation checks.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// `true` when processing unconfirmed messages.
    pub fn is_mempool(&self) -> bool {
        self.mempool
    }

    /// Block index written into records: the height, or the mempool sentinel.
    pub fn block_index(&self) -> u64 {
        if self.mempool {
            MEMPOOL_BLOCK_INDEX
        } else {
            self.height
        }
    }

    pub fn schedule(&self) -> &ProtocolSchedule {
        &self.schedule
    }

    /// Shared handle to the schedule, for building sibling contexts.
    pub fn schedule_handle(&self) -> Arc<ProtocolSchedule> {
        Arc::clone(&self.schedule)
    }

    pub fn network(&self) -> Network {
        self.schedule.network()
    }

    /// Is protocol change `name` active at this context's height?
    pub fn enabled(&self, name: &str) -> ScheduleResult<bool> {
        self.schedule.enabled(name, self.height)
    }

    /// Value of protocol parameter `name` at this context's height.
    pub fn value_at(&self, name: &str) -> ScheduleResult<&Value> {
        self.schedule.value_at(name, self.height)
    }

    /// Ledger entries applied so far in this block.
    pub fn block_ledger(&self) -> &BlockLedger {
        &self.ledger
    }

    pub(crate) fn block_ledger_mut(&mut self) -> &mut BlockLedger {
        &mut self.ledger
    }

    /// Moves to `height` (confirmed) and returns the accumulator of the block
    /// just finished.
    pub fn advance(&mut self, height: u64) -> BlockLedger {
        self.height = height;
        self.mempool = false;
        std::mem::take(&mut self.ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> Arc<ProtocolSchedule> {
        Arc::new(ProtocolSchedule::embedded(Network::Mainnet).unwrap())
    }

    #[test]
    fn confirmed_context_stamps_real_height() {
        let ctx = BlockContext::new(schedule(), 400_000);
        assert_eq!(ctx.block_index(), 400_000);
        assert!(!ctx.is_mempool());
    }

    #[test]
    fn mempool_context_stamps_sentinel_but_checks_real_height() {
        let ctx = BlockContext::mempool(schedule(), 333_499);
        assert_eq!(ctx.block_index(), MEMPOOL_BLOCK_INDEX);
        assert!(!ctx.enabled("numeric_asset_names").unwrap());
    }

    #[test]
    fn advance_resets_the_accumulator() {
        let mut ctx = BlockContext::new(schedule(), 10);
        ctx.block_ledger_mut().push(10, "addr", "XCP", 5);

        let finished = ctx.advance(11);
        assert_eq!(finished.len(), 1);
        assert!(ctx.block_ledger().is_empty());
        assert_eq!(ctx.height(), 11);
    }
}
