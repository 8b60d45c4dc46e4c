//! # Protocol Configuration & Constants
//!
//! Every consensus-relevant constant lives here. Two nodes that disagree on
//! any value in this file will compute different balances from the same
//! message stream, so treat edits here as protocol changes.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Native Currencies
// ---------------------------------------------------------------------------

/// The chain-native settlement currency. Asset id `0`.
///
/// Never credited or debited through the ledger: its balances live on the
/// underlying chain, not in this protocol's state.
pub const BTC: &str = "BTC";

/// The protocol's native meta-asset. Asset id `1`.
pub const XCP: &str = "XCP";

/// Display names for logs and operator tooling.
pub const BTC_NAME: &str = "Bitcoin";
pub const XCP_NAME: &str = "Counterparty";

/// One whole unit of a divisible asset, in base units. Same across assets.
pub const UNIT: u64 = 100_000_000;

// ---------------------------------------------------------------------------
// Quantity Bounds
// ---------------------------------------------------------------------------

/// Largest quantity any balance, credit or debit may hold: `2^63 - 1`.
///
/// The bound comes from the signed 64-bit integer columns of the relational
/// store the ledger was first specified against.
pub const MAX_INT: u64 = i64::MAX as u64;

// ---------------------------------------------------------------------------
// Mempool
// ---------------------------------------------------------------------------

/// Sentinel block index for provisional (unconfirmed) messages. Chosen to be
/// far above any real height the protocol will reach.
pub const MEMPOOL_BLOCK_INDEX: u64 = 9_999_999;

/// Sentinel block hash paired with [`MEMPOOL_BLOCK_INDEX`].
pub const MEMPOOL_BLOCK_HASH: &str = "mempool";

// ---------------------------------------------------------------------------
// Chain Parameters
// ---------------------------------------------------------------------------

pub const BLOCK_FIRST_MAINNET: u64 = 278_270;
pub const BURN_START_MAINNET: u64 = 278_310;
pub const BURN_END_MAINNET: u64 = 283_810;

pub const BLOCK_FIRST_TESTNET: u64 = 310_000;
pub const BURN_START_TESTNET: u64 = 310_000;
pub const BURN_END_TESTNET: u64 = 4_017_708;

pub const BLOCK_FIRST_REGTEST: u64 = 0;
pub const BURN_START_REGTEST: u64 = 101;
pub const BURN_END_REGTEST: u64 = 150_000_000;

/// Length of a contract-style address (hex-encoded 20-byte id).
pub const CONTRACT_ADDRESS_LENGTH: usize = 40;

// ---------------------------------------------------------------------------
// Address Options
// ---------------------------------------------------------------------------

/// Bit 0: transfers to this address must carry a memo.
pub const ADDRESS_OPTION_REQUIRE_MEMO: u64 = 1;

/// Bitwise OR of every defined address option.
pub const ADDRESS_OPTION_MAX_VALUE: u64 = ADDRESS_OPTION_REQUIRE_MEMO;

// ---------------------------------------------------------------------------
// Auxiliary Caches
// ---------------------------------------------------------------------------

/// Default capacity for caches of externally-fetched raw transactions.
pub const RAW_TRANSACTIONS_CACHE_SIZE: usize = 20_000;

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Which chain the ledger is tracking. Selects activation heights and
/// chain parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    /// Local test network. Every protocol change is active from genesis.
    Regtest,
}

impl Network {
    /// `true` for networks that use the testnet side of the schedule.
    pub fn is_testnet_like(&self) -> bool {
        matches!(self, Network::Testnet | Network::Regtest)
    }

    /// First block the protocol parses on this network.
    pub fn first_block(&self) -> u64 {
        match self {
            Network::Mainnet => BLOCK_FIRST_MAINNET,
            Network::Testnet => BLOCK_FIRST_TESTNET,
            Network::Regtest => BLOCK_FIRST_REGTEST,
        }
    }

    /// Inclusive burn window `(start, end)` for proof-of-burn issuance.
    pub fn burn_window(&self) -> (u64, u64) {
        match self {
            Network::Mainnet => (BURN_START_MAINNET, BURN_END_MAINNET),
            Network::Testnet => (BURN_START_TESTNET, BURN_END_TESTNET),
            Network::Regtest => (BURN_START_REGTEST, BURN_END_REGTEST),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        };
        f.write_str(name)
    }
}

/// Error returned when a network name is not recognized.
#[derive(Debug, thiserror::Error)]
#[error("unknown network: {0}")]
pub struct UnknownNetwork(pub String);

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(UnknownNetwork(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Runtime knobs for a ledger instance.
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Network whose schedule and parameters apply.
    pub network: Network,
    /// Run the asset conservation check every time a block is closed.
    pub check_asset_conservation: bool,
    /// Protocol-change schedule to load instead of the embedded one.
    pub schedule_path: Option<PathBuf>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            check_asset_conservation: true,
            schedule_path: None,
        }
    }
}
