//! Typed rows of every record set the core touches.
//!
//! Field names match the message-log payload keys so a record can be
//! rendered straight into message bindings and decoded straight from a
//! decoder's bindings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::store::{Record, RecordSet, StoreError, StoreResult};

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Declares a status enum stored as its string form. Strings outside the
/// known set are kept verbatim in `Other`, since invalid rows carry free-form
/// reasons (`"invalid: insufficient funds"`).
macro_rules! string_status {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $text,)+
                    $name::Other(text) => text,
                }
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(match s {
                    $($text => $name::$variant,)+
                    other => $name::Other(other.to_string()),
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                match text.parse() {
                    Ok(status) => Ok(status),
                    Err(never) => match never {},
                }
            }
        }
    };
}

string_status!(
    /// Outcome of a one-shot transaction (issuance, send, burn, ...).
    TxStatus { Valid => "valid" }
);

string_status!(
    /// Lifecycle of an order or a bet.
    OfferStatus {
        Open => "open",
        Filled => "filled",
        Cancelled => "cancelled",
        Expired => "expired",
    }
);

string_status!(
    /// Lifecycle of an order, bet or RPS match.
    MatchStatus {
        Pending => "pending",
        PendingAndResolved => "pending and resolved",
        ResolvedAndPending => "resolved and pending",
        Completed => "completed",
        Expired => "expired",
    }
);

impl TxStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, TxStatus::Valid)
    }
}

impl MatchStatus {
    /// Statuses under which an RPS match still escrows both wagers.
    pub fn is_rps_unsettled(&self) -> bool {
        matches!(
            self,
            MatchStatus::Pending | MatchStatus::PendingAndResolved | MatchStatus::ResolvedAndPending
        )
    }
}

/// Dispenser open and dispensing.
pub const DISPENSER_STATUS_OPEN: u8 = 0;
/// Dispenser open on an empty address, waiting for funds.
pub const DISPENSER_STATUS_OPEN_EMPTY_ADDRESS: u8 = 1;
/// Dispenser closed; escrow returned.
pub const DISPENSER_STATUS_CLOSED: u8 = 10;
/// Dispenser closing at a later block.
pub const DISPENSER_STATUS_CLOSING: u8 = 11;

// ---------------------------------------------------------------------------
// Hex helper for binary fields
// ---------------------------------------------------------------------------

/// `Option<Vec<u8>>` serialized as an optional lowercase hex string.
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| hex::decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Key of a balance row: `address \0 asset`.
pub fn balance_key(address: &str, asset: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(address.len() + asset.len() + 1);
    key.extend_from_slice(address.as_bytes());
    key.push(0);
    key.extend_from_slice(asset.as_bytes());
    key
}

/// Key of a `tx_index`-keyed row.
pub fn tx_index_key(tx_index: u64) -> Vec<u8> {
    tx_index.to_be_bytes().to_vec()
}

/// Locates the stored key of a record of `set` from decoded fields.
///
/// Used for updates, which carry only the identifying field plus the
/// changed columns.
pub fn key_from_fields(set: RecordSet, fields: &Map<String, Value>) -> StoreResult<Vec<u8>> {
    let missing = |field: &str| StoreError::NotFound(format!("{set} update without {field}"));
    match set {
        RecordSet::Issuances
        | RecordSet::Destructions
        | RecordSet::Burns
        | RecordSet::Dividends
        | RecordSet::Sweeps
        | RecordSet::Sends => fields
            .get("tx_index")
            .and_then(Value::as_u64)
            .map(tx_index_key)
            .ok_or_else(|| missing("tx_index")),
        RecordSet::Orders | RecordSet::Bets | RecordSet::Rps | RecordSet::Dispensers => fields
            .get("tx_hash")
            .and_then(Value::as_str)
            .map(|hash| hash.as_bytes().to_vec())
            .ok_or_else(|| missing("tx_hash")),
        RecordSet::OrderMatches | RecordSet::BetMatches | RecordSet::RpsMatches => fields
            .get("id")
            .and_then(Value::as_str)
            .map(|id| id.as_bytes().to_vec())
            .ok_or_else(|| missing("id")),
        RecordSet::Assets => fields
            .get("asset_name")
            .and_then(Value::as_str)
            .map(|name| name.as_bytes().to_vec())
            .ok_or_else(|| missing("asset_name")),
        RecordSet::Balances => {
            let address = fields.get("address").and_then(Value::as_str);
            let asset = fields.get("asset").and_then(Value::as_str);
            match (address, asset) {
                (Some(address), Some(asset)) => Ok(balance_key(address, asset)),
                _ => Err(missing("address/asset")),
            }
        }
        RecordSet::Messages => fields
            .get("message_index")
            .and_then(Value::as_u64)
            .map(|index| index.to_be_bytes().to_vec())
            .ok_or_else(|| missing("message_index")),
        RecordSet::Credits | RecordSet::Debits => Err(StoreError::NotFound(format!(
            "{set} is append-only"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Match identifiers
// ---------------------------------------------------------------------------

/// Separator between the two transaction hashes of a match id.
pub const ID_SEPARATOR: char = '_';

const HASH_HEX_LENGTH: usize = 64;

/// Builds a match id from the two matched transactions' hashes.
pub fn make_id(hash_a: &str, hash_b: &str) -> String {
    format!("{hash_a}{ID_SEPARATOR}{hash_b}")
}

/// Splits a match id back into its two transaction hashes.
pub fn parse_id(match_id: &str) -> StoreResult<(String, String)> {
    let malformed = || StoreError::MalformedId(match_id.to_string());
    if match_id.len() != 2 * HASH_HEX_LENGTH + 1 || !match_id.is_ascii() {
        return Err(malformed());
    }
    let (a, rest) = match_id.split_at(HASH_HEX_LENGTH);
    let b = rest.strip_prefix(ID_SEPARATOR).ok_or_else(malformed)?;
    Ok((a.to_string(), b.to_string()))
}

// ---------------------------------------------------------------------------
// Ledger rows
// ---------------------------------------------------------------------------

/// Current holding of one asset by one address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub address: String,
    pub asset: String,
    pub quantity: u64,
}

impl Record for Balance {
    const SET: RecordSet = RecordSet::Balances;
    fn key(&self) -> Option<Vec<u8>> {
        Some(balance_key(&self.address, &self.asset))
    }
}

/// Immutable audit row of a balance increase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub block_index: u64,
    pub address: String,
    pub asset: String,
    pub quantity: u64,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
}

impl Record for Credit {
    const SET: RecordSet = RecordSet::Credits;
    fn key(&self) -> Option<Vec<u8>> {
        None
    }
}

/// Immutable audit row of a balance decrease.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debit {
    pub block_index: u64,
    pub address: String,
    pub asset: String,
    pub quantity: u64,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
}

impl Record for Debit {
    const SET: RecordSet = RecordSet::Debits;
    fn key(&self) -> Option<Vec<u8>> {
        None
    }
}

/// Kind of state change a message describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Insert,
    Update,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Insert => "insert",
            Command::Update => "update",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the append-only message log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_index: u64,
    pub block_index: u64,
    pub command: Command,
    pub category: String,
    /// Sorted-key JSON payload.
    pub bindings: String,
    /// Unix seconds at append time.
    pub timestamp: i64,
}

impl Record for Message {
    const SET: RecordSet = RecordSet::Messages;
    fn key(&self) -> Option<Vec<u8>> {
        Some(self.message_index.to_be_bytes().to_vec())
    }
}

/// Registered asset name with its id and optional sub-asset long name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub asset_id: u64,
    pub asset_name: String,
    pub block_index: u64,
    #[serde(default)]
    pub asset_longname: Option<String>,
}

impl Record for AssetRecord {
    const SET: RecordSet = RecordSet::Assets;
    fn key(&self) -> Option<Vec<u8>> {
        Some(self.asset_name.as_bytes().to_vec())
    }
}

// ---------------------------------------------------------------------------
// Supply-bearing transactions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuance {
    pub tx_index: u64,
    pub tx_hash: String,
    pub block_index: u64,
    pub asset: String,
    pub quantity: u64,
    pub divisible: bool,
    pub source: String,
    pub issuer: String,
    #[serde(default)]
    pub transfer: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fee_paid: u64,
    #[serde(default)]
    pub locked: bool,
    pub status: TxStatus,
    #[serde(default)]
    pub asset_longname: Option<String>,
}

impl Record for Issuance {
    const SET: RecordSet = RecordSet::Issuances;
    fn key(&self) -> Option<Vec<u8>> {
        Some(tx_index_key(self.tx_index))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destruction {
    pub tx_index: u64,
    pub tx_hash: String,
    pub block_index: u64,
    pub source: String,
    pub asset: String,
    pub quantity: u64,
    #[serde(default, with = "hex_bytes")]
    pub tag: Option<Vec<u8>>,
    pub status: TxStatus,
}

impl Record for Destruction {
    const SET: RecordSet = RecordSet::Destructions;
    fn key(&self) -> Option<Vec<u8>> {
        Some(tx_index_key(self.tx_index))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Burn {
    pub tx_index: u64,
    pub tx_hash: String,
    pub block_index: u64,
    pub source: String,
    pub burned: u64,
    pub earned: u64,
    pub status: TxStatus,
}

impl Record for Burn {
    const SET: RecordSet = RecordSet::Burns;
    fn key(&self) -> Option<Vec<u8>> {
        Some(tx_index_key(self.tx_index))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dividend {
    pub tx_index: u64,
    pub tx_hash: String,
    pub block_index: u64,
    pub source: String,
    pub asset: String,
    pub dividend_asset: String,
    pub quantity_per_unit: u64,
    #[serde(default)]
    pub fee_paid: u64,
    pub status: TxStatus,
}

impl Record for Dividend {
    const SET: RecordSet = RecordSet::Dividends;
    fn key(&self) -> Option<Vec<u8>> {
        Some(tx_index_key(self.tx_index))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sweep {
    pub tx_index: u64,
    pub tx_hash: String,
    pub block_index: u64,
    pub source: String,
    pub destination: String,
    pub flags: u64,
    #[serde(default, with = "hex_bytes")]
    pub memo: Option<Vec<u8>>,
    #[serde(default)]
    pub fee_paid: u64,
    pub status: TxStatus,
}

impl Record for Sweep {
    const SET: RecordSet = RecordSet::Sweeps;
    fn key(&self) -> Option<Vec<u8>> {
        Some(tx_index_key(self.tx_index))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSend {
    pub tx_index: u64,
    pub tx_hash: String,
    pub block_index: u64,
    pub source: String,
    pub destination: String,
    pub asset: String,
    pub quantity: u64,
    pub status: TxStatus,
    #[serde(default, with = "hex_bytes")]
    pub memo: Option<Vec<u8>>,
}

impl Record for AssetSend {
    const SET: RecordSet = RecordSet::Sends;
    fn key(&self) -> Option<Vec<u8>> {
        Some(tx_index_key(self.tx_index))
    }
}

// ---------------------------------------------------------------------------
// Escrow-bearing instruments
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub tx_index: u64,
    pub tx_hash: String,
    pub block_index: u64,
    pub source: String,
    pub give_asset: String,
    pub give_quantity: u64,
    pub give_remaining: u64,
    pub get_asset: String,
    pub get_quantity: u64,
    pub get_remaining: u64,
    pub expiration: u64,
    pub expire_index: u64,
    pub status: OfferStatus,
}

impl Record for Order {
    const SET: RecordSet = RecordSet::Orders;
    fn key(&self) -> Option<Vec<u8>> {
        Some(self.tx_hash.as_bytes().to_vec())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMatch {
    pub id: String,
    pub tx0_index: u64,
    pub tx0_hash: String,
    pub tx0_address: String,
    pub tx1_index: u64,
    pub tx1_hash: String,
    pub tx1_address: String,
    pub forward_asset: String,
    pub forward_quantity: u64,
    pub backward_asset: String,
    pub backward_quantity: u64,
    pub block_index: u64,
    pub match_expire_index: u64,
    pub status: MatchStatus,
}

impl Record for OrderMatch {
    const SET: RecordSet = RecordSet::OrderMatches;
    fn key(&self) -> Option<Vec<u8>> {
        Some(self.id.as_bytes().to_vec())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    pub tx_index: u64,
    pub tx_hash: String,
    pub block_index: u64,
    pub source: String,
    pub feed_address: String,
    pub bet_type: u8,
    pub wager_quantity: u64,
    pub wager_remaining: u64,
    pub counterwager_quantity: u64,
    pub counterwager_remaining: u64,
    pub expiration: u64,
    pub expire_index: u64,
    pub status: OfferStatus,
}

impl Record for Bet {
    const SET: RecordSet = RecordSet::Bets;
    fn key(&self) -> Option<Vec<u8>> {
        Some(self.tx_hash.as_bytes().to_vec())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetMatch {
    pub id: String,
    pub tx0_index: u64,
    pub tx0_hash: String,
    pub tx0_address: String,
    pub tx1_index: u64,
    pub tx1_hash: String,
    pub tx1_address: String,
    pub forward_quantity: u64,
    pub backward_quantity: u64,
    pub block_index: u64,
    pub status: MatchStatus,
}

impl Record for BetMatch {
    const SET: RecordSet = RecordSet::BetMatches;
    fn key(&self) -> Option<Vec<u8>> {
        Some(self.id.as_bytes().to_vec())
    }
}

/// An open rock-paper-scissors game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rps {
    pub tx_index: u64,
    pub tx_hash: String,
    pub block_index: u64,
    pub source: String,
    pub possible_moves: u64,
    pub wager: u64,
    pub move_random_hash: String,
    pub expiration: u64,
    pub expire_index: u64,
    pub status: OfferStatus,
}

impl Record for Rps {
    const SET: RecordSet = RecordSet::Rps;
    fn key(&self) -> Option<Vec<u8>> {
        Some(self.tx_hash.as_bytes().to_vec())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpsMatch {
    pub id: String,
    pub tx0_index: u64,
    pub tx0_hash: String,
    pub tx0_address: String,
    pub tx1_index: u64,
    pub tx1_hash: String,
    pub tx1_address: String,
    pub wager: u64,
    pub possible_moves: u64,
    pub block_index: u64,
    pub match_expire_index: u64,
    pub status: MatchStatus,
}

impl Record for RpsMatch {
    const SET: RecordSet = RecordSet::RpsMatches;
    fn key(&self) -> Option<Vec<u8>> {
        Some(self.id.as_bytes().to_vec())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispenser {
    pub tx_index: u64,
    pub tx_hash: String,
    pub block_index: u64,
    pub source: String,
    pub asset: String,
    pub give_quantity: u64,
    pub escrow_quantity: u64,
    pub satoshirate: u64,
    pub give_remaining: u64,
    pub status: u8,
    #[serde(default)]
    pub oracle_address: Option<String>,
}

impl Record for Dispenser {
    const SET: RecordSet = RecordSet::Dispensers;
    fn key(&self) -> Option<Vec<u8>> {
        Some(self.tx_hash.as_bytes().to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HASH_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const HASH_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    #[test]
    fn match_ids_split_back_into_hashes() {
        let id = make_id(HASH_A, HASH_B);
        assert_eq!(id.len(), 129);
        assert_eq!(parse_id(&id).unwrap(), (HASH_A.to_string(), HASH_B.to_string()));
    }

    #[test]
    fn malformed_match_ids_are_rejected() {
        assert!(matches!(parse_id("abc_def"), Err(StoreError::MalformedId(_))));
        let wrong_separator = format!("{HASH_A}-{HASH_B}");
        assert!(matches!(parse_id(&wrong_separator), Err(StoreError::MalformedId(_))));
    }

    #[test]
    fn statuses_keep_unknown_text() {
        let status: TxStatus = serde_json::from_value(json!("invalid: insufficient funds")).unwrap();
        assert_eq!(status, TxStatus::Other("invalid: insufficient funds".to_string()));
        assert!(!status.is_valid());
        assert_eq!(serde_json::to_value(&status).unwrap(), json!("invalid: insufficient funds"));

        let status: MatchStatus = serde_json::from_value(json!("pending and resolved")).unwrap();
        assert!(status.is_rps_unsettled());
        assert!(!MatchStatus::Completed.is_rps_unsettled());
    }

    #[test]
    fn statuses_survive_bincode() {
        let bytes = bincode::serialize(&OfferStatus::Open).unwrap();
        let back: OfferStatus = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, OfferStatus::Open);
    }

    #[test]
    fn binary_fields_are_hex_in_json() {
        let destruction = Destruction {
            tx_index: 7,
            tx_hash: HASH_A.to_string(),
            block_index: 100,
            source: "alice".to_string(),
            asset: "XCP".to_string(),
            quantity: 5,
            tag: Some(vec![0xde, 0xad]),
            status: TxStatus::Valid,
        };
        let value = serde_json::to_value(&destruction).unwrap();
        assert_eq!(value["tag"], json!("dead"));

        let back: Destruction = serde_json::from_value(value).unwrap();
        assert_eq!(back, destruction);

        let bytes = bincode::serialize(&destruction).unwrap();
        let back: Destruction = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.tag, Some(vec![0xde, 0xad]));
    }

    #[test]
    fn update_keys_come_from_identifying_fields() {
        let fields = json!({"tx_hash": HASH_A, "status": "filled"});
        let key = key_from_fields(RecordSet::Orders, fields.as_object().unwrap()).unwrap();
        assert_eq!(key, HASH_A.as_bytes());

        let fields = json!({"tx_index": 9});
        let key = key_from_fields(RecordSet::Issuances, fields.as_object().unwrap()).unwrap();
        assert_eq!(key, 9u64.to_be_bytes());

        let fields = json!({"status": "expired"});
        assert!(key_from_fields(RecordSet::OrderMatches, fields.as_object().unwrap()).is_err());
        assert!(key_from_fields(RecordSet::Credits, fields.as_object().unwrap()).is_err());
    }

    #[test]
    fn balance_keys_separate_address_and_asset() {
        assert_ne!(balance_key("ab", "cXCP"), balance_key("abc", "XCP"));
    }
}
