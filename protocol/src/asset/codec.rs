//! Name <-> id conversion for short (non-dotted) asset names.
//!
//! Two naming schemes coexist:
//!
//! - **Alphabetic**: 4-12 uppercase letters, read as a base-26 integer
//!   (`A = 0 ... Z = 25`). Names may not start with `A`, which would be a
//!   leading zero digit.
//! - **Numeric** (after `numeric_asset_names`): `A` followed by the decimal
//!   id, for ids in `[26^12 + 1, 2^64 - 1]`.

use rand::Rng;

use super::{AssetError, AssetId, AssetResult};
use crate::activation::ProtocolSchedule;
use crate::config::{BTC, XCP};

/// Base-26 alphabet. Position is digit value.
pub const B26_DIGITS: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Smallest id a user-defined asset may have.
pub const MIN_ASSET_ID: u64 = 26u64.pow(3);

/// Smallest id of a numeric (`A<digits>`) asset.
pub const MIN_NUMERIC_ASSET_ID: u64 = 26u64.pow(12) + 1;

/// First letter of every numeric asset name.
pub const NUMERIC_ASSET_PREFIX: char = 'A';

/// Shortest acceptable asset name.
pub const MIN_ASSET_NAME_LENGTH: usize = 4;

/// Alphabetic names at or above this length must be numeric once
/// `numeric_asset_names` is active.
pub const MAX_ALPHABETIC_NAME_LENGTH: usize = 12;

const NUMERIC_ASSET_NAMES: &str = "numeric_asset_names";

/// Converts an asset name into its numeric id as of `height`.
///
/// # Errors
///
/// [`AssetError::AssetNameTooShort`] for names under four characters or
/// decoding below `26^3`; [`AssetError::InvalidAssetName`] for bad
/// characters, a non-numeric name starting with `A`, an out-of-range numeric
/// name, or an over-long alphabetic name.
pub fn name_to_id(name: &str, schedule: &ProtocolSchedule, height: u64) -> AssetResult<AssetId> {
    if name == BTC {
        return Ok(AssetId::BTC);
    }
    if name == XCP {
        return Ok(AssetId::XCP);
    }

    if name.chars().count() < MIN_ASSET_NAME_LENGTH {
        return Err(AssetError::AssetNameTooShort(name.to_string()));
    }

    if schedule.enabled(NUMERIC_ASSET_NAMES, height)? {
        if let Some(digits) = name.strip_prefix(NUMERIC_ASSET_PREFIX) {
            return parse_numeric(digits).map(AssetId);
        }
        if name.chars().count() > MAX_ALPHABETIC_NAME_LENGTH {
            return Err(AssetError::InvalidAssetName(
                "long asset names must be numeric".to_string(),
            ));
        }
    }

    if name.starts_with(NUMERIC_ASSET_PREFIX) {
        return Err(AssetError::InvalidAssetName(
            "non-numeric asset name starts with 'A'".to_string(),
        ));
    }

    let mut id: u64 = 0;
    for c in name.chars() {
        let digit = b26_digit(c).ok_or_else(|| {
            AssetError::InvalidAssetName(format!("invalid character: {c}"))
        })?;
        id = id
            .checked_mul(26)
            .and_then(|n| n.checked_add(digit))
            .ok_or_else(|| AssetError::InvalidAssetName("asset name too long".to_string()))?;
    }

    if id < MIN_ASSET_ID {
        return Err(AssetError::AssetNameTooShort(name.to_string()));
    }
    Ok(AssetId(id))
}

/// Converts a numeric id into its asset name as of `height`.
///
/// # Errors
///
/// [`AssetError::AssetIdTooLow`] for ids in `[2, 26^3)`.
pub fn id_to_name(id: AssetId, schedule: &ProtocolSchedule, height: u64) -> AssetResult<String> {
    match id {
        AssetId::BTC => return Ok(BTC.to_string()),
        AssetId::XCP => return Ok(XCP.to_string()),
        _ => {}
    }

    if id.0 < MIN_ASSET_ID {
        return Err(AssetError::AssetIdTooLow(id.0));
    }

    if schedule.enabled(NUMERIC_ASSET_NAMES, height)? && id.0 >= MIN_NUMERIC_ASSET_ID {
        return Ok(format!("{NUMERIC_ASSET_PREFIX}{}", id.0));
    }

    let mut letters = Vec::new();
    let mut n = id.0;
    while n > 0 {
        letters.push(B26_DIGITS[(n % 26) as usize]);
        n /= 26;
    }
    letters.reverse();
    Ok(letters.into_iter().map(char::from).collect())
}

/// Draws a fresh numeric asset name uniformly from the numeric id range.
///
/// Non-deterministic. Callers use it for placeholders only; its output must
/// never feed a consensus or hash-affecting path.
pub fn random_numeric_name() -> String {
    let id = rand::thread_rng().gen_range(MIN_NUMERIC_ASSET_ID..=u64::MAX);
    format!("{NUMERIC_ASSET_PREFIX}{id}")
}

fn b26_digit(c: char) -> Option<u64> {
    if c.is_ascii_uppercase() {
        Some(c as u64 - 'A' as u64)
    } else {
        None
    }
}

fn parse_numeric(digits: &str) -> AssetResult<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AssetError::InvalidAssetName(
            "non-numeric asset name starts with 'A'".to_string(),
        ));
    }
    let out_of_range = || AssetError::InvalidAssetName("numeric asset name not in range".to_string());
    let id = digits.parse::<u64>().map_err(|_| out_of_range())?;
    if id < MIN_NUMERIC_ASSET_ID {
        return Err(out_of_range());
    }
    Ok(id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;
    use proptest::prelude::*;

    /// Numeric names activate at 333_500 on mainnet.
    const BEFORE: u64 = 333_499;
    const AFTER: u64 = 333_500;

    fn mainnet() -> ProtocolSchedule {
        ProtocolSchedule::embedded(Network::Mainnet).unwrap()
    }

    #[test]
    fn native_currencies_have_reserved_ids() {
        let s = mainnet();
        assert_eq!(name_to_id("BTC", &s, AFTER).unwrap(), AssetId(0));
        assert_eq!(name_to_id("XCP", &s, AFTER).unwrap(), AssetId(1));
        assert_eq!(id_to_name(AssetId(0), &s, AFTER).unwrap(), "BTC");
        assert_eq!(id_to_name(AssetId(1), &s, AFTER).unwrap(), "XCP");
    }

    #[test]
    fn alphabetic_names_decode_as_base_26() {
        let s = mainnet();
        assert_eq!(name_to_id("BAAA", &s, BEFORE).unwrap(), AssetId(26u64.pow(3)));
        assert_eq!(name_to_id("BAAB", &s, BEFORE).unwrap(), AssetId(26u64.pow(3) + 1));
        assert_eq!(id_to_name(AssetId(26u64.pow(3)), &s, BEFORE).unwrap(), "BAAA");
    }

    #[test]
    fn short_names_are_rejected() {
        let s = mainnet();
        assert!(matches!(
            name_to_id("BBB", &s, BEFORE),
            Err(AssetError::AssetNameTooShort(_))
        ));
    }

    #[test]
    fn leading_a_is_rejected_without_numeric_names() {
        let s = mainnet();
        assert!(matches!(
            name_to_id("ABCD", &s, BEFORE),
            Err(AssetError::InvalidAssetName(_))
        ));
        assert!(matches!(
            name_to_id("A95428956661682177", &s, BEFORE),
            Err(AssetError::InvalidAssetName(_))
        ));
    }

    #[test]
    fn lowercase_and_digits_are_invalid_characters() {
        let s = mainnet();
        assert!(matches!(
            name_to_id("BbCD", &s, BEFORE),
            Err(AssetError::InvalidAssetName(msg)) if msg.contains('b')
        ));
        assert!(name_to_id("BC1D", &s, AFTER).is_err());
    }

    #[test]
    fn numeric_names_after_activation() {
        let s = mainnet();
        let min = MIN_NUMERIC_ASSET_ID;
        assert_eq!(name_to_id(&format!("A{min}"), &s, AFTER).unwrap(), AssetId(min));
        assert_eq!(id_to_name(AssetId(min), &s, AFTER).unwrap(), format!("A{min}"));
        assert_eq!(
            name_to_id("A18446744073709551615", &s, AFTER).unwrap(),
            AssetId(u64::MAX)
        );
    }

    #[test]
    fn numeric_names_out_of_range_are_rejected() {
        let s = mainnet();
        let below = MIN_NUMERIC_ASSET_ID - 1;
        assert!(matches!(
            name_to_id(&format!("A{below}"), &s, AFTER),
            Err(AssetError::InvalidAssetName(msg)) if msg.contains("range")
        ));
        assert!(matches!(
            name_to_id("A18446744073709551616", &s, AFTER),
            Err(AssetError::InvalidAssetName(msg)) if msg.contains("range")
        ));
        assert!(name_to_id("A12X4", &s, AFTER).is_err());
    }

    #[test]
    fn long_alphabetic_names_must_be_numeric_after_activation() {
        let s = mainnet();
        assert!(matches!(
            name_to_id("BCDEFGHIJKLMN", &s, AFTER),
            Err(AssetError::InvalidAssetName(msg)) if msg.contains("numeric")
        ));
        assert!(name_to_id("BCDEFGHIJKLMN", &s, BEFORE).is_ok());
    }

    #[test]
    fn low_ids_are_rejected() {
        let s = mainnet();
        assert!(matches!(
            id_to_name(AssetId(2), &s, AFTER),
            Err(AssetError::AssetIdTooLow(2))
        ));
        assert!(matches!(
            id_to_name(AssetId(MIN_ASSET_ID - 1), &s, AFTER),
            Err(AssetError::AssetIdTooLow(_))
        ));
    }

    #[test]
    fn large_ids_use_base_26_before_activation() {
        let s = mainnet();
        let name = id_to_name(AssetId(MIN_NUMERIC_ASSET_ID), &s, BEFORE).unwrap();
        assert!(!name.starts_with('A'));
        assert_eq!(name.len(), 13);
        assert_eq!(name_to_id(&name, &s, BEFORE).unwrap(), AssetId(MIN_NUMERIC_ASSET_ID));
    }

    #[test]
    fn random_numeric_names_parse_back() {
        let s = mainnet();
        for _ in 0..32 {
            let name = random_numeric_name();
            let id = name_to_id(&name, &s, AFTER).unwrap();
            assert!(id.0 >= MIN_NUMERIC_ASSET_ID);
        }
    }

    fn valid_id() -> impl Strategy<Value = u64> {
        prop_oneof![
            MIN_ASSET_ID..26u64.pow(12),
            MIN_NUMERIC_ASSET_ID..=u64::MAX,
        ]
    }

    proptest! {
        #[test]
        fn id_round_trips_through_name(id in valid_id(), height in prop_oneof![Just(BEFORE), Just(AFTER)]) {
            let s = mainnet();
            let name = id_to_name(AssetId(id), &s, height).unwrap();
            prop_assert_eq!(name_to_id(&name, &s, height).unwrap(), AssetId(id));
        }

        #[test]
        fn alphabetic_name_round_trips_through_id(name in "[B-Z][A-Z]{3,11}") {
            let s = mainnet();
            for height in [BEFORE, AFTER] {
                let id = name_to_id(&name, &s, height).unwrap();
                prop_assert_eq!(&id_to_name(id, &s, height).unwrap(), &name);
            }
        }
    }
}
