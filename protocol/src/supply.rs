//! # Supply Accountant
//!
//! Read-only aggregation over issuances, destructions, burns, fee-paying
//! transactions, balances and every escrow-bearing instrument.
//!
//! The invariant it exists to check:
//!
//! ```text
//! supply(a) = issued(a) - destroyed(a)
//!           = balances(a) + escrow in orders, matches, bets, RPS, dispensers
//! ```
//!
//! XCP is special: it is never issued, only earned by proof-of-burn, and it
//! is destroyed both explicitly and through the fees of issuances,
//! dividends and sweeps. Leaving any of those fee sources out breaks
//! conservation for XCP.
//!
//! Totals are `i128` so a corrupt store shows up as a negative supply
//! instead of wrapping.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::error;

use crate::activation::ScheduleError;
use crate::config::XCP;
use crate::context::BlockContext;
use crate::storage::{
    Balance, Bet, BetMatch, Burn, Destruction, Dispenser, Dividend, Issuance, MatchStatus,
    OfferStatus, Order, OrderMatch, Rps, RpsMatch, Store, StoreError, StoreExt, Sweep,
    DISPENSER_STATUS_OPEN, DISPENSER_STATUS_OPEN_EMPTY_ADDRESS,
};

const DISPENSERS_IN_HOLDERS: &str = "dispensers_in_holders";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// One asset whose supply and holdings disagree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupplyMismatch {
    pub asset: String,
    pub supply: i128,
    pub held: i128,
}

impl fmt::Display for SupplyMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} supply {} != held {}", self.asset, self.supply, self.held)
    }
}

#[derive(Debug, Error)]
pub enum SupplyError {
    /// Supply and holdings disagree for at least one asset.
    #[error("asset conservation violated: {}", format_mismatches(.0))]
    ConservationViolated(Vec<SupplyMismatch>),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn format_mismatches(mismatches: &[SupplyMismatch]) -> String {
    mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type SupplyResult<T> = Result<T, SupplyError>;

// ---------------------------------------------------------------------------
// Holders
// ---------------------------------------------------------------------------

/// A holding of one asset: a plain balance (`escrow == None`) or funds
/// locked in the instrument named by `escrow` (a tx hash or match id).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Holder {
    pub address: String,
    pub address_quantity: u64,
    pub escrow: Option<String>,
}

impl Holder {
    fn new(address: &str, quantity: u64, escrow: Option<&str>) -> Self {
        Self {
            address: address.to_string(),
            address_quantity: quantity,
            escrow: escrow.map(str::to_string),
        }
    }
}

// ---------------------------------------------------------------------------
// Supply totals
// ---------------------------------------------------------------------------

/// Sum of valid issuances of `asset`.
pub fn issued_total<S: Store + ?Sized>(store: &S, asset: &str) -> SupplyResult<i128> {
    Ok(store
        .load_all::<Issuance>()?
        .iter()
        .filter(|i| i.status.is_valid() && i.asset == asset)
        .map(|i| i.quantity as i128)
        .sum())
}

/// Sum of valid destructions of `asset`.
pub fn destroyed_total<S: Store + ?Sized>(store: &S, asset: &str) -> SupplyResult<i128> {
    Ok(store
        .load_all::<Destruction>()?
        .iter()
        .filter(|d| d.status.is_valid() && d.asset == asset)
        .map(|d| d.quantity as i128)
        .sum())
}

/// XCP earned through valid burns.
pub fn native_created<S: Store + ?Sized>(store: &S) -> SupplyResult<i128> {
    Ok(store
        .load_all::<Burn>()?
        .iter()
        .filter(|b| b.status.is_valid())
        .map(|b| b.earned as i128)
        .sum())
}

/// XCP destroyed explicitly plus fees paid by issuances, dividends and
/// sweeps.
pub fn native_destroyed<S: Store + ?Sized>(store: &S) -> SupplyResult<i128> {
    let destroyed = destroyed_total(store, XCP)?;
    let issuance_fees: i128 = store
        .load_all::<Issuance>()?
        .iter()
        .filter(|i| i.status.is_valid())
        .map(|i| i.fee_paid as i128)
        .sum();
    let dividend_fees: i128 = store
        .load_all::<Dividend>()?
        .iter()
        .filter(|d| d.status.is_valid())
        .map(|d| d.fee_paid as i128)
        .sum();
    let sweep_fees: i128 = store
        .load_all::<Sweep>()?
        .iter()
        .filter(|s| s.status.is_valid())
        .map(|s| s.fee_paid as i128)
        .sum();
    Ok(destroyed + issuance_fees + dividend_fees + sweep_fees)
}

pub fn native_supply<S: Store + ?Sized>(store: &S) -> SupplyResult<i128> {
    Ok(native_created(store)? - native_destroyed(store)?)
}

/// Outstanding supply of `asset`.
pub fn supply<S: Store + ?Sized>(store: &S, asset: &str) -> SupplyResult<i128> {
    if asset == XCP {
        return native_supply(store);
    }
    Ok(issued_total(store, asset)? - destroyed_total(store, asset)?)
}

/// Amount created per asset: XCP from burns, everything else from
/// issuances.
pub fn creations<S: Store + ?Sized>(store: &S) -> SupplyResult<BTreeMap<String, i128>> {
    let mut created = BTreeMap::new();
    created.insert(XCP.to_string(), native_created(store)?);
    for issuance in store.load_all::<Issuance>()? {
        if issuance.status.is_valid() {
            *created.entry(issuance.asset).or_insert(0) += issuance.quantity as i128;
        }
    }
    Ok(created)
}

/// Amount destroyed per asset, XCP including fees.
pub fn destructions<S: Store + ?Sized>(store: &S) -> SupplyResult<BTreeMap<String, i128>> {
    let mut destroyed = BTreeMap::new();
    destroyed.insert(XCP.to_string(), native_destroyed(store)?);
    for destruction in store.load_all::<Destruction>()? {
        if destruction.status.is_valid() && destruction.asset != XCP {
            *destroyed.entry(destruction.asset).or_insert(0) += destruction.quantity as i128;
        }
    }
    Ok(destroyed)
}

/// Creations minus destructions for every asset ever created.
pub fn supplies<S: Store + ?Sized>(store: &S) -> SupplyResult<BTreeMap<String, i128>> {
    let mut supplies = creations(store)?;
    let destroyed = destructions(store)?;
    for (asset, amount) in supplies.iter_mut() {
        *amount -= destroyed.get(asset).copied().unwrap_or(0);
    }
    Ok(supplies)
}

// ---------------------------------------------------------------------------
// Holdings
// ---------------------------------------------------------------------------

/// Every address holding `asset`, directly or in escrow.
///
/// Bets and RPS games only escrow XCP. Open dispensers are included once
/// `dispensers_in_holders` is active at the context height, with no escrow
/// reference.
pub fn holders<S: Store + ?Sized>(
    store: &S,
    ctx: &BlockContext,
    asset: &str,
    exclude_empty: bool,
) -> SupplyResult<Vec<Holder>> {
    let mut holders = Vec::new();

    for balance in store.load_all::<Balance>()? {
        if balance.asset == asset && !(exclude_empty && balance.quantity == 0) {
            holders.push(Holder::new(&balance.address, balance.quantity, None));
        }
    }

    for order in store.load_all::<Order>()? {
        if order.give_asset == asset && order.status == OfferStatus::Open {
            holders.push(Holder::new(&order.source, order.give_remaining, Some(&order.tx_hash)));
        }
    }

    for m in store.load_all::<OrderMatch>()? {
        if m.status != MatchStatus::Pending {
            continue;
        }
        if m.forward_asset == asset {
            holders.push(Holder::new(&m.tx0_address, m.forward_quantity, Some(&m.id)));
        }
        if m.backward_asset == asset {
            holders.push(Holder::new(&m.tx1_address, m.backward_quantity, Some(&m.id)));
        }
    }

    if asset == XCP {
        for bet in store.load_all::<Bet>()? {
            if bet.status == OfferStatus::Open {
                holders.push(Holder::new(&bet.source, bet.wager_remaining, Some(&bet.tx_hash)));
            }
        }
        for m in store.load_all::<BetMatch>()? {
            if m.status == MatchStatus::Pending {
                holders.push(Holder::new(&m.tx0_address, m.forward_quantity, Some(&m.id)));
                holders.push(Holder::new(&m.tx1_address, m.backward_quantity, Some(&m.id)));
            }
        }
        for game in store.load_all::<Rps>()? {
            if game.status == OfferStatus::Open {
                holders.push(Holder::new(&game.source, game.wager, Some(&game.tx_hash)));
            }
        }
        for m in store.load_all::<RpsMatch>()? {
            if m.status.is_rps_unsettled() {
                holders.push(Holder::new(&m.tx0_address, m.wager, Some(&m.id)));
                holders.push(Holder::new(&m.tx1_address, m.wager, Some(&m.id)));
            }
        }
    }

    if ctx.enabled(DISPENSERS_IN_HOLDERS)? {
        for dispenser in store.load_all::<Dispenser>()? {
            if dispenser.asset == asset && dispenser.status == DISPENSER_STATUS_OPEN {
                holders.push(Holder::new(&dispenser.source, dispenser.give_remaining, None));
            }
        }
    }

    Ok(holders)
}

/// Total held per asset: balances plus every kind of escrow.
///
/// Filled XCP-for-BTC orders still count their `give_remaining`, which
/// stays escrowed until the BTC side settles.
pub fn held<S: Store + ?Sized>(store: &S) -> SupplyResult<BTreeMap<String, i128>> {
    let mut held: BTreeMap<String, i128> = BTreeMap::new();
    let mut add = |asset: &str, quantity: u64| {
        *held.entry(asset.to_string()).or_insert(0) += quantity as i128;
    };

    for balance in store.load_all::<Balance>()? {
        add(&balance.asset, balance.quantity);
    }
    for order in store.load_all::<Order>()? {
        let escrowed = order.status == OfferStatus::Open
            || (order.status == OfferStatus::Filled
                && order.give_asset == XCP
                && order.get_asset == crate::config::BTC);
        if escrowed {
            add(&order.give_asset, order.give_remaining);
        }
    }
    for m in store.load_all::<OrderMatch>()? {
        if m.status == MatchStatus::Pending {
            add(&m.forward_asset, m.forward_quantity);
            add(&m.backward_asset, m.backward_quantity);
        }
    }
    for bet in store.load_all::<Bet>()? {
        if bet.status == OfferStatus::Open {
            add(XCP, bet.wager_remaining);
        }
    }
    for m in store.load_all::<BetMatch>()? {
        if m.status == MatchStatus::Pending {
            add(XCP, m.forward_quantity);
            add(XCP, m.backward_quantity);
        }
    }
    for game in store.load_all::<Rps>()? {
        if game.status == OfferStatus::Open {
            add(XCP, game.wager);
        }
    }
    for m in store.load_all::<RpsMatch>()? {
        if m.status.is_rps_unsettled() {
            add(XCP, m.wager);
            add(XCP, m.wager);
        }
    }
    for dispenser in store.load_all::<Dispenser>()? {
        if matches!(
            dispenser.status,
            DISPENSER_STATUS_OPEN | DISPENSER_STATUS_OPEN_EMPTY_ADDRESS
        ) {
            add(&dispenser.asset, dispenser.give_remaining);
        }
    }

    Ok(held)
}

/// Compares [`held`] with [`supplies`] for every created asset.
///
/// # Errors
///
/// [`SupplyError::ConservationViolated`] listing every mismatch, each also
/// logged at `error`.
pub fn check_conservation<S: Store + ?Sized>(store: &S) -> SupplyResult<()> {
    let supplies = supplies(store)?;
    let held = held(store)?;

    let mismatches: Vec<SupplyMismatch> = supplies
        .into_iter()
        .filter_map(|(asset, supply)| {
            let held = held.get(&asset).copied().unwrap_or(0);
            (held != supply).then_some(SupplyMismatch { asset, supply, held })
        })
        .collect();

    if mismatches.is_empty() {
        return Ok(());
    }
    for mismatch in &mismatches {
        error!(
            asset = %mismatch.asset,
            supply = %mismatch.supply,
            held = %mismatch.held,
            "asset conservation violated"
        );
    }
    Err(SupplyError::ConservationViolated(mismatches))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
