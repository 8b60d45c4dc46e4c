//! Credit, debit and transfer over a [`Store`].

use tracing::debug;

use super::{LedgerError, LedgerResult};
use crate::config::{BTC, CONTRACT_ADDRESS_LENGTH, MAX_INT, XCP};
use crate::context::BlockContext;
use crate::messages::{Event, MessageLog};
use crate::storage::{balance_key, Balance, Command, Credit, Debit, Store, StoreExt, WriteBatch};

const CONTRACTS_ONLY_XCP_BALANCES: &str = "contracts_only_xcp_balances";

/// Balance ledger bound to one store.
///
/// Mutations take `&self` but are not synchronized with each other: the
/// caller applies one block's messages from a single thread.
#[derive(Debug, Clone)]
pub struct Ledger<S> {
    store: S,
    log: MessageLog,
}

impl<S: Store> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self::with_log(store, MessageLog::new())
    }

    pub fn with_log(store: S, log: MessageLog) -> Self {
        Self { store, log }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Current quantity of `asset` held by `address`; 0 without a row.
    pub fn balance(&self, address: &str, asset: &str) -> LedgerResult<u64> {
        Ok(self
            .store
            .fetch::<Balance>(&balance_key(address, asset))?
            .map_or(0, |b| b.quantity))
    }

    /// Every balance row of `address`.
    pub fn balances(&self, address: &str) -> LedgerResult<Vec<Balance>> {
        Ok(self
            .store
            .load_all::<Balance>()?
            .into_iter()
            .filter(|b| b.address == address)
            .collect())
    }

    /// Removes `quantity` of `asset` from `address`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidQuantity`] above `MAX_INT`.
    /// - [`LedgerError::UnsupportedAsset`] for the settlement currency, or a
    ///   non-XCP asset on a contract address once contracts are XCP-only.
    /// - [`LedgerError::InsufficientFunds`] when the balance is short. The
    ///   balance is left untouched.
    pub fn debit(
        &self,
        ctx: &mut BlockContext,
        address: &str,
        asset: &str,
        quantity: u64,
        action: Option<&str>,
        event: Option<&str>,
    ) -> LedgerResult<()> {
        self.validate(ctx, address, asset, quantity, "debit")?;

        let available = self.balance(address, asset)?;
        if available < quantity {
            return Err(LedgerError::InsufficientFunds {
                address: address.to_string(),
                asset: asset.to_string(),
                available,
                requested: quantity,
            });
        }

        let balance = Balance {
            address: address.to_string(),
            asset: asset.to_string(),
            quantity: (available - quantity).min(MAX_INT),
        };
        let record = Debit {
            block_index: ctx.block_index(),
            address: address.to_string(),
            asset: asset.to_string(),
            quantity,
            action: action.map(str::to_string),
            event: event.map(str::to_string),
        };
        self.commit(ctx, &balance, quantity, Event::Debit(record))?;

        debug!(address, asset, quantity, remaining = balance.quantity, ?action, "debit");
        Ok(())
    }

    /// Adds `quantity` of `asset` to `address`, creating the row if needed.
    /// The resulting balance saturates at `MAX_INT`.
    ///
    /// # Errors
    ///
    /// Same validation as [`Ledger::debit`], minus the funds check.
    pub fn credit(
        &self,
        ctx: &mut BlockContext,
        address: &str,
        asset: &str,
        quantity: u64,
        action: Option<&str>,
        event: Option<&str>,
    ) -> LedgerResult<()> {
        self.validate(ctx, address, asset, quantity, "credit")?;

        let previous = self.balance(address, asset)?;
        let balance = Balance {
            address: address.to_string(),
            asset: asset.to_string(),
            quantity: previous.saturating_add(quantity).min(MAX_INT),
        };
        let record = Credit {
            block_index: ctx.block_index(),
            address: address.to_string(),
            asset: asset.to_string(),
            quantity,
            action: action.map(str::to_string),
            event: event.map(str::to_string),
        };
        self.commit(ctx, &balance, quantity, Event::Credit(record))?;

        debug!(address, asset, quantity, total = balance.quantity, ?action, "credit");
        Ok(())
    }

    /// Debits `source` then credits `destination` with the same tags. A
    /// failed debit leaves both balances untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn transfer(
        &self,
        ctx: &mut BlockContext,
        source: &str,
        destination: &str,
        asset: &str,
        quantity: u64,
        action: Option<&str>,
        event: Option<&str>,
    ) -> LedgerResult<()> {
        self.debit(ctx, source, asset, quantity, action, event)?;
        self.credit(ctx, destination, asset, quantity, action, event)
    }

    fn validate(
        &self,
        ctx: &BlockContext,
        address: &str,
        asset: &str,
        quantity: u64,
        operation: &str,
    ) -> LedgerResult<()> {
        if quantity > MAX_INT {
            return Err(LedgerError::InvalidQuantity(format!(
                "{operation} of {quantity} exceeds MAX_INT"
            )));
        }
        if asset == BTC {
            return Err(LedgerError::UnsupportedAsset(format!("cannot {operation} {BTC}")));
        }
        if ctx.enabled(CONTRACTS_ONLY_XCP_BALANCES)?
            && address.len() == CONTRACT_ADDRESS_LENGTH
            && asset != XCP
        {
            return Err(LedgerError::UnsupportedAsset(format!(
                "contract address {address} can only hold {XCP}, not {asset}"
            )));
        }
        Ok(())
    }

    /// Commits the balance row, the audit record and its message together,
    /// then feeds the block accumulator.
    fn commit(
        &self,
        ctx: &mut BlockContext,
        balance: &Balance,
        quantity: u64,
        event: Event,
    ) -> LedgerResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(balance)?;
        event.stage(&mut batch)?;
        let mut bindings = event.to_bindings()?;
        let message = self.log.stage(
            &self.store,
            &mut batch,
            ctx,
            Command::Insert,
            event.category(),
            &mut bindings,
        )?;
        self.store.commit(batch)?;
        self.log.notify(&message, &bindings, None);

        // Provisional entries never count toward the block hash.
        if !ctx.is_mempool() {
            let height = ctx.height();
            ctx.block_ledger_mut()
                .push(height, &balance.address, &balance.asset, quantity);
        }
        Ok(())
    }
}
