//! # Asset Identity
//!
//! Every asset has two names for the same thing: a compact numeric
//! [`AssetId`] used on the wire and a human-readable name used everywhere
//! else. This module converts between them.
//!
//! ```text
//! codec.rs    : name <-> id (base-26 and numeric "A<digits>" names)
//! subasset.rs : PARENT.child long names and their base-68 compaction
//! registry.rs : store-backed lookups once ids are registered in `assets`
//! ```
//!
//! Everything here is consensus-critical. The mapping must be a bijection
//! on its valid domain for a fixed network and activation state, or two
//! nodes will disagree about which asset a message refers to.

pub mod codec;
pub mod registry;
pub mod subasset;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::activation::ScheduleError;
use crate::storage::StoreError;

pub use codec::{id_to_name, name_to_id, random_numeric_name};
pub use registry::{asset_id, asset_name, resolve_subasset_longname};
pub use subasset::{
    compact_subasset_longname, expand_subasset_longname, parse_subasset,
    validate_subasset_longname, validate_subasset_parent_name,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while converting or validating asset identities.
#[derive(Debug, Error)]
pub enum AssetError {
    /// Name shorter than four characters, or decodes below `26^3`.
    #[error("asset name too short: {0}")]
    AssetNameTooShort(String),

    /// Malformed name: bad character, bad prefix, numeric range or length.
    #[error("invalid asset name: {0}")]
    InvalidAssetName(String),

    /// Id below the minimum for user-defined assets.
    #[error("asset id too low: {0}")]
    AssetIdTooLow(u64),

    /// Id above `2^64 - 1`.
    #[error("asset id too high: {0}")]
    AssetIdTooHigh(u128),

    /// Name or id not registered in the `assets` record set.
    #[error("no such asset: {0}")]
    NoSuchAsset(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type AssetResult<T> = Result<T, AssetError>;

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// Numeric asset identifier.
///
/// `0` and `1` are the two native currencies. User-defined assets start at
/// `26^3`; ids from `26^12 + 1` upward are numeric assets named `A<id>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId(pub u64);

impl AssetId {
    pub const BTC: AssetId = AssetId(0);
    pub const XCP: AssetId = AssetId(1);

    /// Narrows a wide integer (as produced by a decoder) to an id.
    pub fn from_u128(value: u128) -> AssetResult<Self> {
        u64::try_from(value)
            .map(AssetId)
            .map_err(|_| AssetError::AssetIdTooHigh(value))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for AssetId {
    fn from(value: u64) -> Self {
        AssetId(value)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_ids_above_u64_are_rejected() {
        assert_eq!(AssetId::from_u128(42).unwrap(), AssetId(42));
        assert_eq!(AssetId::from_u128(u64::MAX as u128).unwrap(), AssetId(u64::MAX));
        assert!(matches!(
            AssetId::from_u128(u64::MAX as u128 + 1),
            Err(AssetError::AssetIdTooHigh(_))
        ));
    }
}
