//! Price representation, switched by the `exact_price_ratio` change.
//!
//! Mainnet computed prices as 28-digit decimals until height 294 500 and as
//! exact fractions from then on; testnet and regtest always use fractions.
//! Peers replaying old blocks must reproduce the decimal rounding, so both
//! representations are kept and consumers handle each.

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::activation::ScheduleError;
use crate::context::BlockContext;

const EXACT_PRICE_RATIO: &str = "exact_price_ratio";
const SIGNIFICANT_DIGITS: u32 = 28;
/// Largest scale a [`Decimal`] can carry.
const MAX_SCALE: u32 = 28;

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("price denominator is zero")]
    ZeroDenominator,

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

pub type PriceResult<T> = Result<T, PriceError>;

/// A price as the protocol computed it at a given height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Price {
    /// Reduced fraction.
    ExactRatio { numerator: u64, denominator: u64 },
    /// Quotient rounded to 28 significant digits, ties to even.
    ApproxDecimal { value: Decimal },
}

impl Price {
    /// `numerator / denominator` in the representation active at the
    /// context height.
    pub fn compute(numerator: u64, denominator: u64, ctx: &BlockContext) -> PriceResult<Self> {
        if denominator == 0 {
            return Err(PriceError::ZeroDenominator);
        }
        if ctx.enabled(EXACT_PRICE_RATIO)? {
            let divisor = gcd(numerator, denominator);
            return Ok(Price::ExactRatio {
                numerator: numerator / divisor,
                denominator: denominator / divisor,
            });
        }
        Ok(Price::ApproxDecimal { value: quotient(numerator, denominator) })
    }

    /// Decimal view of either representation.
    pub fn to_decimal(&self) -> Decimal {
        match self {
            Price::ExactRatio { numerator, denominator } => quotient(*numerator, *denominator),
            Price::ApproxDecimal { value } => *value,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Price::ExactRatio { .. })
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Price::ExactRatio { numerator, denominator } => write!(f, "{numerator}/{denominator}"),
            Price::ApproxDecimal { value } => write!(f, "{value}"),
        }
    }
}

/// `numerator / denominator` rounded once to [`SIGNIFICANT_DIGITS`], ties
/// to even. Exact quotients keep no trailing zeros. A zero denominator
/// yields zero.
fn quotient(numerator: u64, denominator: u64) -> Decimal {
    if denominator == 0 {
        return Decimal::ZERO;
    }
    let d = u128::from(denominator);
    let mut mantissa = u128::from(numerator) / d;
    let mut remainder = u128::from(numerator) % d;
    let mut scale = 0u32;
    let mut digits = digit_count(mantissa);

    while remainder != 0 && digits < SIGNIFICANT_DIGITS && scale < MAX_SCALE {
        remainder *= 10;
        mantissa = mantissa * 10 + remainder / d;
        remainder %= d;
        scale += 1;
        digits = digit_count(mantissa);
    }

    if remainder != 0 {
        // Compare the discarded tail with one half of the last kept digit.
        let twice = remainder * 2;
        if twice > d || (twice == d && mantissa % 2 == 1) {
            mantissa += 1;
        }
        if digit_count(mantissa) > SIGNIFICANT_DIGITS && scale > 0 {
            mantissa /= 10;
            scale -= 1;
        }
    }

    // At most 28 digits, below the 96-bit mantissa limit.
    Decimal::from_i128_with_scale(mantissa as i128, scale)
}

fn digit_count(n: u128) -> u32 {
    if n == 0 {
        0
    } else {
        n.ilog10() + 1
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ProtocolSchedule;
    use crate::config::Network;
    use std::str::FromStr;
    use std::sync::Arc;

    fn ctx(network: Network, height: u64) -> BlockContext {
        BlockContext::new(Arc::new(ProtocolSchedule::embedded(network).unwrap()), height)
    }

    #[test]
    fn decimal_before_activation_on_mainnet() {
        let price = Price::compute(1, 3, &ctx(Network::Mainnet, 294_499)).unwrap();
        assert!(!price.is_exact());
        assert_eq!(
            price.to_decimal(),
            Decimal::from_str("0.3333333333333333333333333333").unwrap()
        );
    }

    #[test]
    fn decimal_keeps_28_significant_digits() {
        let at = ctx(Network::Mainnet, 294_499);
        let cases = [
            (10, 3, "3.333333333333333333333333333"),
            (20, 3, "6.666666666666666666666666667"),
            (2, 3, "0.6666666666666666666666666667"),
            (1_000_000, 7, "142857.1428571428571428571429"),
            (6, 4, "1.5"),
            (100, 4, "25"),
        ];
        for (numerator, denominator, expected) in cases {
            let price = Price::compute(numerator, denominator, &at).unwrap();
            assert_eq!(price.to_decimal().to_string(), expected, "{numerator}/{denominator}");
        }
    }

    #[test]
    fn exact_ratio_decimal_view_uses_the_same_rounding() {
        let price = Price::compute(20, 3, &ctx(Network::Testnet, 0)).unwrap();
        assert_eq!(price.to_decimal().to_string(), "6.666666666666666666666666667");
    }

    #[test]
    fn halfway_rounds_to_even() {
        // n / 2^16 terminates one digit past the 28th.
        let down = quotient(100_000_000_000_000_001, 1 << 16);
        assert_eq!(down.to_string(), "1525878906250.000015258789062");
        let up = quotient(100_000_000_000_000_003, 1 << 16);
        assert_eq!(up.to_string(), "1525878906250.000045776367188");
        assert_eq!(quotient(5, 2).to_string(), "2.5");
    }

    #[test]
    fn fraction_from_activation_on_mainnet() {
        let price = Price::compute(6, 4, &ctx(Network::Mainnet, 294_500)).unwrap();
        assert_eq!(price, Price::ExactRatio { numerator: 3, denominator: 2 });
        assert_eq!(price.to_string(), "3/2");
        assert_eq!(price.to_decimal(), Decimal::from_str("1.5").unwrap());
    }

    #[test]
    fn testnet_and_regtest_always_use_fractions() {
        assert!(Price::compute(1, 3, &ctx(Network::Testnet, 0)).unwrap().is_exact());
        assert!(Price::compute(1, 3, &ctx(Network::Regtest, 0)).unwrap().is_exact());
    }

    #[test]
    fn zero_numerator_reduces_to_zero_over_one() {
        let price = Price::compute(0, 7, &ctx(Network::Mainnet, 300_000)).unwrap();
        assert_eq!(price, Price::ExactRatio { numerator: 0, denominator: 1 });
    }

    #[test]
    fn zero_denominator_is_an_error() {
        assert!(matches!(
            Price::compute(1, 0, &ctx(Network::Mainnet, 300_000)),
            Err(PriceError::ZeroDenominator)
        ));
        assert!(matches!(
            Price::compute(1, 0, &ctx(Network::Mainnet, 1)),
            Err(PriceError::ZeroDenominator)
        ));
    }
}
