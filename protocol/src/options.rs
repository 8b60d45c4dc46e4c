//! Address option bitmasks (e.g. "require memo on incoming sends").

use thiserror::Error;

use crate::config::{ADDRESS_OPTION_MAX_VALUE, MAX_INT};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("options must be an integer: {0}")]
    NotAnInteger(String),

    #[error("options integer overflow: {0}")]
    Overflow(u64),

    #[error("options out of range: {0}")]
    OutOfRange(u64),

    #[error("options not possible: {0}")]
    NotPossible(u64),
}

pub type OptionsResult<T> = Result<T, OptionsError>;

/// Reads the options from an `"<address> <options>"` string. Returns
/// `None` when there is no second token.
pub fn parse_options_from_string(text: &str) -> OptionsResult<Option<u64>> {
    let mut parts = text.split(' ');
    let Some(token) = parts.nth(1) else {
        return Ok(None);
    };
    token
        .parse::<u64>()
        .map(Some)
        .map_err(|_| OptionsError::NotAnInteger(token.to_string()))
}

/// Rejects bitmasks that set undefined options.
pub fn validate_address_options(options: u64) -> OptionsResult<()> {
    if options > MAX_INT {
        return Err(OptionsError::Overflow(options));
    }
    if options > ADDRESS_OPTION_MAX_VALUE {
        return Err(OptionsError::OutOfRange(options));
    }
    if !active_options(ADDRESS_OPTION_MAX_VALUE, options) {
        return Err(OptionsError::NotPossible(options));
    }
    Ok(())
}

/// `true` when every bit of `options` is set in `config`.
pub fn active_options(config: u64, options: u64) -> bool {
    config & options == options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ADDRESS_OPTION_REQUIRE_MEMO;

    #[test]
    fn options_follow_the_address() {
        assert_eq!(parse_options_from_string("1Alice 1").unwrap(), Some(1));
        assert_eq!(parse_options_from_string("1Alice").unwrap(), None);
        assert_eq!(
            parse_options_from_string("1Alice one"),
            Err(OptionsError::NotAnInteger("one".to_string()))
        );
    }

    #[test]
    fn only_defined_bits_are_valid() {
        validate_address_options(0).unwrap();
        validate_address_options(ADDRESS_OPTION_REQUIRE_MEMO).unwrap();
        assert_eq!(validate_address_options(2), Err(OptionsError::OutOfRange(2)));
        assert_eq!(validate_address_options(u64::MAX), Err(OptionsError::Overflow(u64::MAX)));
    }

    #[test]
    fn active_options_is_a_subset_test() {
        assert!(active_options(0b11, 0b01));
        assert!(active_options(0b01, 0));
        assert!(!active_options(0b01, 0b10));
    }
}
