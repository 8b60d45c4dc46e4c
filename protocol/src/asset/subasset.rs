//! Sub-asset long names (`PARENT.child`) and their compact byte form.
//!
//! A long name is stored as the big-endian bytes of a base-68 integer: each
//! character is a digit whose value is its 1-based position in
//! [`SUBASSET_DIGITS`]. Digit `0` is never produced, so the empty string is
//! the only name that compacts to zero bytes.

use super::codec::{MAX_ALPHABETIC_NAME_LENGTH, MIN_ASSET_NAME_LENGTH, NUMERIC_ASSET_PREFIX};
use super::{AssetError, AssetResult};
use crate::config::{BTC, XCP};

/// Characters allowed in the child part of a long name.
pub const SUBASSET_DIGITS: &[u8; 67] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789.-_@!";

/// Radix of the compact encoding: 67 symbols plus the unused zero digit.
const SUBASSET_BASE: u32 = 68;

/// Separator between parent and child, and allowed inside the child.
pub const SUBASSET_SEPARATOR: char = '.';

/// Longest long name, parent and separator included.
pub const MAX_SUBASSET_LONGNAME_LENGTH: usize = 250;

fn subasset_digit(c: char) -> Option<u32> {
    if !c.is_ascii() {
        return None;
    }
    SUBASSET_DIGITS
        .iter()
        .position(|&d| d == c as u8)
        .map(|pos| pos as u32 + 1)
}

/// Splits `full_name` on its first separator and validates both halves.
///
/// Returns `Ok(None)` when the name contains no separator (not a sub-asset),
/// and `Ok(Some((parent, long_name)))` for a valid sub-asset name.
pub fn parse_subasset(full_name: &str) -> AssetResult<Option<(String, String)>> {
    let Some((parent, child)) = full_name.split_once(SUBASSET_SEPARATOR) else {
        return Ok(None);
    };

    validate_subasset_parent_name(parent)?;
    validate_subasset_longname(full_name, Some(child))?;

    Ok(Some((parent.to_string(), full_name.to_string())))
}

/// Validates the parent half of a long name.
pub fn validate_subasset_parent_name(parent: &str) -> AssetResult<()> {
    if parent == BTC || parent == XCP {
        return Err(AssetError::InvalidAssetName(format!(
            "parent asset cannot be {parent}"
        )));
    }
    let length = parent.chars().count();
    if length < MIN_ASSET_NAME_LENGTH {
        return Err(AssetError::InvalidAssetName(
            "parent asset name too short".to_string(),
        ));
    }
    if length > MAX_ALPHABETIC_NAME_LENGTH {
        return Err(AssetError::InvalidAssetName(
            "parent asset name too long".to_string(),
        ));
    }
    if parent.starts_with(NUMERIC_ASSET_PREFIX) {
        return Err(AssetError::InvalidAssetName(
            "parent asset name starts with 'A'".to_string(),
        ));
    }
    if let Some(c) = parent.chars().find(|c| !c.is_ascii_uppercase()) {
        return Err(AssetError::InvalidAssetName(format!(
            "parent asset name contains invalid character: {c}"
        )));
    }
    Ok(())
}

/// Validates a long name's child half.
///
/// When `child` is `None` it is taken from `long_name` after the first
/// separator (empty if there is none).
pub fn validate_subasset_longname(long_name: &str, child: Option<&str>) -> AssetResult<()> {
    let child = match child {
        Some(child) => child,
        None => long_name
            .split_once(SUBASSET_SEPARATOR)
            .map(|(_, child)| child)
            .unwrap_or(""),
    };

    if child.is_empty() {
        return Err(AssetError::InvalidAssetName(
            "subasset name too short".to_string(),
        ));
    }
    if long_name.chars().count() > MAX_SUBASSET_LONGNAME_LENGTH {
        return Err(AssetError::InvalidAssetName(
            "subasset name too long".to_string(),
        ));
    }

    // A leading separator counts as consecutive with the parent's.
    let mut previous = SUBASSET_SEPARATOR;
    for c in child.chars() {
        if subasset_digit(c).is_none() {
            return Err(AssetError::InvalidAssetName(format!(
                "subasset name contains invalid character: {c}"
            )));
        }
        if c == SUBASSET_SEPARATOR && previous == SUBASSET_SEPARATOR {
            return Err(AssetError::InvalidAssetName(
                "subasset name contains consecutive periods".to_string(),
            ));
        }
        previous = c;
    }
    if previous == SUBASSET_SEPARATOR {
        return Err(AssetError::InvalidAssetName(
            "subasset name ends with a period".to_string(),
        ));
    }
    Ok(())
}

/// Compacts a long name into big-endian base-68 bytes.
///
/// # Errors
///
/// [`AssetError::InvalidAssetName`] if a character is outside the sub-asset
/// alphabet.
pub fn compact_subasset_longname(long_name: &str) -> AssetResult<Vec<u8>> {
    let mut limbs: Vec<u32> = Vec::new();
    for c in long_name.chars() {
        let digit = subasset_digit(c).ok_or_else(|| {
            AssetError::InvalidAssetName(format!("subasset name contains invalid character: {c}"))
        })?;
        mul_add(&mut limbs, SUBASSET_BASE, digit);
    }
    Ok(limbs_to_be_bytes(&limbs))
}

/// Expands compact bytes back into a long name. Empty or all-zero input
/// yields the empty string.
pub fn expand_subasset_longname(raw: &[u8]) -> String {
    let mut limbs = be_bytes_to_limbs(raw);
    let mut reversed = Vec::new();
    while !limbs.is_empty() {
        let digit = div_rem(&mut limbs, SUBASSET_BASE) as usize;
        // Digit 0 never comes out of compaction; it wraps to the last symbol.
        let index = (digit + SUBASSET_DIGITS.len() - 1) % SUBASSET_DIGITS.len();
        reversed.push(SUBASSET_DIGITS[index]);
    }
    reversed.into_iter().rev().map(char::from).collect()
}

// -- Little-endian u32 limb arithmetic --------------------------------------

fn mul_add(limbs: &mut Vec<u32>, mul: u32, add: u32) {
    let mut carry = add as u64;
    for limb in limbs.iter_mut() {
        let value = (*limb as u64) * (mul as u64) + carry;
        *limb = value as u32;
        carry = value >> 32;
    }
    if carry > 0 {
        limbs.push(carry as u32);
    }
}

/// Divides in place and returns the remainder. Trailing zero limbs are
/// trimmed, so a zero value is an empty vector.
fn div_rem(limbs: &mut Vec<u32>, divisor: u32) -> u32 {
    let mut rem: u64 = 0;
    for limb in limbs.iter_mut().rev() {
        let current = (rem << 32) | *limb as u64;
        *limb = (current / divisor as u64) as u32;
        rem = current % divisor as u64;
    }
    while limbs.last() == Some(&0) {
        limbs.pop();
    }
    rem as u32
}

fn limbs_to_be_bytes(limbs: &[u32]) -> Vec<u8> {
    let bytes: Vec<u8> = limbs.iter().rev().flat_map(|l| l.to_be_bytes()).collect();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

fn be_bytes_to_limbs(raw: &[u8]) -> Vec<u32> {
    let mut limbs: Vec<u32> = raw
        .rchunks(4)
        .map(|chunk| {
            let mut word = [0u8; 4];
            word[4 - chunk.len()..].copy_from_slice(chunk);
            u32::from_be_bytes(word)
        })
        .collect();
    while limbs.last() == Some(&0) {
        limbs.pop();
    }
    limbs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
