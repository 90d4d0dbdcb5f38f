//! Exact integer arithmetic.
//!
//! Every division here rounds toward zero (floor for the unsigned operands we
//! deal with). Intermediate products are widened so the only overflow that can
//! surface is one where the final result itself does not fit.

use ethnum::U256;
use thiserror::Error;

/// Denominator for percentages.
pub const PERCENT_BASE: u64 = 100;

/// Denominator for basis points.
pub const BASIS_POINTS_BASE: u64 = 10_000;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum MathError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow")]
    Overflow,

    #[error("arithmetic underflow")]
    Underflow,
}

pub type MathResult<T> = Result<T, MathError>;

pub fn checked_add(a: u64, b: u64) -> MathResult<u64> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

pub fn checked_sub(a: u64, b: u64) -> MathResult<u64> {
    a.checked_sub(b).ok_or(MathError::Underflow)
}

/// Computes `floor(a * b / c)`.
pub fn mul_div_floor(a: u64, b: u64, c: u64) -> MathResult<u64> {
    if c == 0 {
        return Err(MathError::DivisionByZero);
    }
    let wide = u128::from(a) * u128::from(b) / u128::from(c);
    u64::try_from(wide).map_err(|_| MathError::Overflow)
}

/// Computes `floor(a * b / c)` over 128-bit operands.
pub fn mul_div_floor_u128(a: u128, b: u128, c: u128) -> MathResult<u128> {
    if c == 0 {
        return Err(MathError::DivisionByZero);
    }
    let wide = U256::from(a) * U256::from(b) / U256::from(c);
    u128::try_from(wide).map_err(|_| MathError::Overflow)
}

/// Computes `floor(amount * num0 * num1 / (den0 * den1))`.
///
/// This is the shape of a decimal-aware price conversion, where the factors
/// are a rate and a power of ten on each side.
pub fn scale_floor(amount: u64, num: [u128; 2], den: [u128; 2]) -> MathResult<u64> {
    let den = U256::from(den[0])
        .checked_mul(U256::from(den[1]))
        .ok_or(MathError::Overflow)?;
    if den == U256::ZERO {
        return Err(MathError::DivisionByZero);
    }
    let num = U256::from(amount)
        .checked_mul(U256::from(num[0]))
        .and_then(|v| v.checked_mul(U256::from(num[1])))
        .ok_or(MathError::Overflow)?;
    u64::try_from(num / den).map_err(|_| MathError::Overflow)
}

/// `floor(amount * percent / 100)`.
pub fn percent_of(amount: u64, percent: u64) -> MathResult<u64> {
    mul_div_floor(amount, percent, PERCENT_BASE)
}

/// `floor(amount * 100 / percent)`, the inverse of [`percent_of`].
pub fn inverse_percent(amount: u64, percent: u64) -> MathResult<u64> {
    mul_div_floor(amount, PERCENT_BASE, percent)
}

/// `floor(amount * bps / 10_000)`.
pub fn basis_points_of(amount: u64, bps: u64) -> MathResult<u64> {
    mul_div_floor(amount, bps, BASIS_POINTS_BASE)
}

/// `floor(numerator * 100 / denominator)`.
pub fn ratio_percent(numerator: u64, denominator: u64) -> MathResult<u64> {
    mul_div_floor(numerator, PERCENT_BASE, denominator)
}

/// Integer power of ten as a `u128`.
pub fn pow10(exp: u8) -> MathResult<u128> {
    10u128.checked_pow(u32::from(exp)).ok_or(MathError::Overflow)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_mul_div_floor_rounds_down() {
        assert_eq!(mul_div_floor(10, 1, 3), Ok(3));
        assert_eq!(mul_div_floor(u64::MAX, 2, 2), Ok(u64::MAX));
        assert_eq!(mul_div_floor(1, 1, 0), Err(MathError::DivisionByZero));
        assert_eq!(mul_div_floor(u64::MAX, 2, 1), Err(MathError::Overflow));
    }

    #[test]
    fn test_percent_helpers() {
        assert_eq!(percent_of(1_000_000_000, 150), Ok(1_500_000_000));
        assert_eq!(inverse_percent(1_500_000_000, 150), Ok(1_000_000_000));
        assert_eq!(basis_points_of(1_000_000, 1), Ok(100));
        assert_eq!(ratio_percent(110, 100), Ok(110));
        assert_eq!(ratio_percent(1, 0), Err(MathError::DivisionByZero));
    }

    #[test]
    fn test_scale_floor_handles_wide_products() {
        // 18 decimals on one side and a large rate would overflow u128.
        let out = scale_floor(
            u64::MAX,
            [1_000_000_000_000, pow10(18).expect("pow10")],
            [1_000_000_000_000, pow10(18).expect("pow10")],
        );
        assert_eq!(out, Ok(u64::MAX));
        assert_eq!(scale_floor(1, [1, 1], [0, 1]), Err(MathError::DivisionByZero));
    }

    proptest! {
        #[test]
        fn proptest_mul_div_floor_matches_u128(a in any::<u64>(), b in any::<u64>(), c in 1u64..) {
            let expected = u128::from(a) * u128::from(b) / u128::from(c);
            match mul_div_floor(a, b, c) {
                Ok(v) => prop_assert_eq!(u128::from(v), expected),
                Err(e) => {
                    prop_assert_eq!(e, MathError::Overflow);
                    prop_assert!(expected > u128::from(u64::MAX));
                }
            }
        }

        #[test]
        fn proptest_inverse_percent_never_exceeds_original(
            amount in 0u64..u64::MAX / 1000,
            pct in 1u64..1000,
        ) {
            let scaled = percent_of(amount, pct).expect("fits");
            let back = inverse_percent(scaled, pct).expect("fits");
            prop_assert!(back <= amount);
        }
    }
}
