//! # Protocol Activation Registry
//!
//! Protocol behaviour changes at fixed block heights. The schedule of those
//! heights is loaded once at startup and never mutated afterwards; every
//! caller asks the same two questions of it:
//!
//! - is change `X` active at height `H`? ([`ProtocolSchedule::enabled`])
//! - what is parameter `P` at height `H`? ([`ProtocolSchedule::value_at`])
//!
//! Both use `height >= activation` (inclusive). A single caller using `>`
//! instead is enough to fork a node off the network.
//!
//! ## Schedule Format
//!
//! ```json
//! {
//!     "numeric_asset_names": { "block_index": 333500, "testnet_block_index": 313000 },
//!     "multisig_dust_size": {
//!         "mainnet": { "0": {"value": 7800}, "600000": {"value": 1000} },
//!         "testnet": { "0": {"value": 7800} }
//!     }
//! }
//! ```
//!
//! Extra keys on flag entries are ignored.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::{LedgerConfig, Network};

/// The schedule compiled into the binary.
const EMBEDDED_SCHEDULE: &str = include_str!("protocol_changes.json");

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures while loading or querying the protocol-change schedule.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The queried change has no entry in the schedule.
    #[error("unknown protocol change: {0}")]
    UnknownChange(String),

    /// A boolean query was made against a valued parameter.
    #[error("protocol change {0} is a valued parameter, not a flag")]
    NotAFlag(String),

    /// A value query was made against a boolean flag.
    #[error("protocol change {0} is a flag, not a valued parameter")]
    NotValued(String),

    /// No schedule entry at or below the queried height.
    #[error("protocol change {name} has no {network} value at height {height}")]
    NoValueAtHeight {
        name: String,
        network: Network,
        height: u64,
    },

    /// A schedule key could not be parsed as a block height.
    #[error("protocol change {name} has invalid height key {key:?}")]
    InvalidHeight { name: String, key: String },

    #[error("malformed schedule: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("failed to read schedule: {0}")]
    Io(#[from] std::io::Error),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;

// ---------------------------------------------------------------------------
// Raw (on-disk) representation
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawValue {
    value: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChange {
    Valued {
        mainnet: BTreeMap<String, RawValue>,
        testnet: BTreeMap<String, RawValue>,
    },
    Flag {
        block_index: u64,
        testnet_block_index: u64,
    },
}

// ---------------------------------------------------------------------------
// ProtocolChange
// ---------------------------------------------------------------------------

/// One entry of the schedule.
#[derive(Clone, Debug, PartialEq)]
pub enum ProtocolChange {
    /// Active from a single height per network.
    Flag { mainnet: u64, testnet: u64 },
    /// Step function over block height, per network.
    Valued {
        mainnet: BTreeMap<u64, Value>,
        testnet: BTreeMap<u64, Value>,
    },
}

fn parse_steps(name: &str, raw: BTreeMap<String, RawValue>) -> ScheduleResult<BTreeMap<u64, Value>> {
    raw.into_iter()
        .map(|(key, entry)| {
            key.parse::<u64>()
                .map(|height| (height, entry.value))
                .map_err(|_| ScheduleError::InvalidHeight {
                    name: name.to_string(),
                    key,
                })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// ProtocolSchedule
// ---------------------------------------------------------------------------

/// Immutable, process-wide schedule of protocol changes for one network.
///
/// Share it behind an `Arc`; nothing mutates it after construction.
#[derive(Clone, Debug)]
pub struct ProtocolSchedule {
    network: Network,
    changes: HashMap<String, ProtocolChange>,
}

impl ProtocolSchedule {
    /// Loads the schedule compiled into this crate.
    pub fn embedded(network: Network) -> ScheduleResult<Self> {
        Self::from_json_str(EMBEDDED_SCHEDULE, network)
    }

    /// Loads a schedule from a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P, network: Network) -> ScheduleResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text, network)
    }

    /// Parses a schedule from its JSON text.
    pub fn from_json_str(json: &str, network: Network) -> ScheduleResult<Self> {
        let raw: HashMap<String, RawChange> = serde_json::from_str(json)?;
        let mut changes = HashMap::with_capacity(raw.len());

        for (name, entry) in raw {
            let change = match entry {
                RawChange::Flag {
                    block_index,
                    testnet_block_index,
                } => ProtocolChange::Flag {
                    mainnet: block_index,
                    testnet: testnet_block_index,
                },
                RawChange::Valued { mainnet, testnet } => ProtocolChange::Valued {
                    mainnet: parse_steps(&name, mainnet)?,
                    testnet: parse_steps(&name, testnet)?,
                },
            };
            changes.insert(name, change);
        }

        tracing::debug!(%network, changes = changes.len(), "protocol schedule loaded");
        Ok(Self { network, changes })
    }

    /// The schedule a [`LedgerConfig`] asks for: its file when one is set,
    /// the embedded schedule otherwise.
    pub fn for_config(config: &LedgerConfig) -> ScheduleResult<Self> {
        match &config.schedule_path {
            Some(path) => Self::from_path(path, config.network),
            None => Self::embedded(config.network),
        }
    }

    /// The network this schedule answers for.
    pub fn network(&self) -> Network {
        self.network
    }

    /// Looks up a raw schedule entry.
    pub fn change(&self, name: &str) -> ScheduleResult<&ProtocolChange> {
        self.changes
            .get(name)
            .ok_or_else(|| ScheduleError::UnknownChange(name.to_string()))
    }

    /// Returns `true` if the flag `name` is active at `height`.
    ///
    /// On regtest every known flag is active at every height.
    pub fn enabled(&self, name: &str, height: u64) -> ScheduleResult<bool> {
        let (mainnet, testnet) = match self.change(name)? {
            ProtocolChange::Flag { mainnet, testnet } => (*mainnet, *testnet),
            ProtocolChange::Valued { .. } => return Err(ScheduleError::NotAFlag(name.to_string())),
        };

        let threshold = match self.network {
            Network::Regtest => return Ok(true),
            Network::Testnet => testnet,
            Network::Mainnet => mainnet,
        };
        Ok(height >= threshold)
    }

    /// Returns the value of parameter `name` in force at `height`: the entry
    /// with the greatest schedule height `<= height`.
    ///
    /// Regtest takes the testnet entry with the greatest height, regardless of
    /// `height`, consistent with every change being active there.
    pub fn value_at(&self, name: &str, height: u64) -> ScheduleResult<&Value> {
        let (mainnet, testnet) = match self.change(name)? {
            ProtocolChange::Valued { mainnet, testnet } => (mainnet, testnet),
            ProtocolChange::Flag { .. } => return Err(ScheduleError::NotValued(name.to_string())),
        };

        let found = match self.network {
            Network::Regtest => testnet.values().next_back(),
            Network::Testnet => testnet.range(..=height).next_back().map(|(_, v)| v),
            Network::Mainnet => mainnet.range(..=height).next_back().map(|(_, v)| v),
        };

        found.ok_or_else(|| ScheduleError::NoValueAtHeight {
            name: name.to_string(),
            network: self.network,
            height,
        })
    }

    /// Number of changes in the schedule.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns `true` if the schedule has no entries.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEDULE: &str = r#"{
        "numeric_asset_names": {
            "block_index": 333500,
            "testnet_block_index": 313000,
            "minimum_version_major": 9
        },
        "dust": {
            "mainnet": { "0": {"value": 7800}, "600000": {"value": 1000} },
            "testnet": { "100": {"value": 5000}, "200": {"value": 10} }
        }
    }"#;

    fn schedule(network: Network) -> ProtocolSchedule {
        ProtocolSchedule::from_json_str(SCHEDULE, network).unwrap()
    }

    #[test]
    fn flag_activates_at_exact_height() {
        let mainnet = schedule(Network::Mainnet);
        assert!(!mainnet.enabled("numeric_asset_names", 333_499).unwrap());
        assert!(mainnet.enabled("numeric_asset_names", 333_500).unwrap());
        assert!(mainnet.enabled("numeric_asset_names", 333_501).unwrap());
    }

    #[test]
    fn testnet_uses_testnet_threshold() {
        let testnet = schedule(Network::Testnet);
        assert!(testnet.enabled("numeric_asset_names", 313_000).unwrap());
        assert!(!testnet.enabled("numeric_asset_names", 312_999).unwrap());
    }

    #[test]
    fn regtest_enables_everything() {
        let regtest = schedule(Network::Regtest);
        assert!(regtest.enabled("numeric_asset_names", 0).unwrap());
    }

    #[test]
    fn unknown_change_fails_loudly() {
        let mainnet = schedule(Network::Mainnet);
        assert!(matches!(
            mainnet.enabled("no_such_change", 1),
            Err(ScheduleError::UnknownChange(_))
        ));
        assert!(matches!(
            schedule(Network::Regtest).enabled("no_such_change", 1),
            Err(ScheduleError::UnknownChange(_))
        ));
    }

    #[test]
    fn value_at_picks_greatest_height_not_above_query() {
        let mainnet = schedule(Network::Mainnet);
        assert_eq!(mainnet.value_at("dust", 0).unwrap(), &Value::from(7800));
        assert_eq!(mainnet.value_at("dust", 599_999).unwrap(), &Value::from(7800));
        assert_eq!(mainnet.value_at("dust", 600_000).unwrap(), &Value::from(1000));
    }

    #[test]
    fn value_at_without_qualifying_entry_fails() {
        let testnet = schedule(Network::Testnet);
        assert!(matches!(
            testnet.value_at("dust", 99),
            Err(ScheduleError::NoValueAtHeight { height: 99, .. })
        ));
        assert_eq!(testnet.value_at("dust", 150).unwrap(), &Value::from(5000));
    }

    #[test]
    fn regtest_value_is_latest_testnet_step() {
        let regtest = schedule(Network::Regtest);
        assert_eq!(regtest.value_at("dust", 0).unwrap(), &Value::from(10));
    }

    #[test]
    fn flag_and_value_queries_are_not_interchangeable() {
        let mainnet = schedule(Network::Mainnet);
        assert!(matches!(mainnet.enabled("dust", 1), Err(ScheduleError::NotAFlag(_))));
        assert!(matches!(
            mainnet.value_at("numeric_asset_names", 1),
            Err(ScheduleError::NotValued(_))
        ));
    }

    #[test]
    fn invalid_height_key_is_rejected() {
        let bad = r#"{ "p": { "mainnet": { "tomorrow": {"value": 1} }, "testnet": {} } }"#;
        assert!(matches!(
            ProtocolSchedule::from_json_str(bad, Network::Mainnet),
            Err(ScheduleError::InvalidHeight { .. })
        ));
    }

    #[test]
    fn embedded_schedule_loads_for_every_network() {
        for network in [Network::Mainnet, Network::Testnet, Network::Regtest] {
            let schedule = ProtocolSchedule::embedded(network).unwrap();
            assert_eq!(schedule.network(), network);
            assert!(schedule.change("numeric_asset_names").is_ok());
            assert!(schedule.change("subassets").is_ok());
        }
    }

    #[test]
    fn config_selects_file_over_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changes.json");
        std::fs::write(&path, r#"{ "only": { "block_index": 5, "testnet_block_index": 6 } }"#)
            .unwrap();

        let config = LedgerConfig {
            schedule_path: Some(path),
            ..LedgerConfig::default()
        };
        let schedule = ProtocolSchedule::for_config(&config).unwrap();
        assert_eq!(schedule.len(), 1);
        assert!(schedule.enabled("only", 5).unwrap());

        let embedded = ProtocolSchedule::for_config(&LedgerConfig::default()).unwrap();
        assert!(embedded.change("subassets").is_ok());
    }
}
