use crate::utils::error::PositionMathError;
use crate::utils::tick_math::{self, U256, DEBT_INDEX_PRECISION, Q96};

/// Normalizes a raw borrow amount by the market's current debt index,
/// truncating like the contract does.
pub fn calculate_scaled_debt(
    borrow_amount: U256,
    current_debt_index: U256,
) -> Result<U256, PositionMathError> {
    if current_debt_index.is_zero() {
        return Err(PositionMathError::ZeroDebtIndex);
    }
    borrow_amount
        .checked_mul(DEBT_INDEX_PRECISION)
        .and_then(|scaled| scaled.checked_div(current_debt_index))
        .ok_or(PositionMathError::AmountOverflow)
}

/// Scaled debt over collateral, widened to Q64.96.
pub fn collateral_ratio_x96(
    scaled_debt: U256,
    collateral_amount: U256,
) -> Result<U256, PositionMathError> {
    if collateral_amount.is_zero() {
        return Err(PositionMathError::ZeroCollateral);
    }
    scaled_debt
        .checked_mul(Q96)
        .and_then(|numerator| numerator.checked_div(collateral_amount))
        .ok_or(PositionMathError::AmountOverflow)
}

/// Turns raw economic inputs into the spaced tick submitted on-chain.
///
/// scaled debt / collateral becomes a Q64.96 ratio, the ratio becomes the
/// floor tick, and the tick is floored onto the market's spacing grid. The
/// borrow and the repay builders both call this and nothing else, so the two
/// sides always price the same economics into the same bucket.
pub fn calculate_position_tick(
    borrow_amount: U256,
    collateral_amount: U256,
    current_debt_index: U256,
    tick_spacing: i32,
) -> Result<i32, PositionMathError> {
    let scaled_debt = calculate_scaled_debt(borrow_amount, current_debt_index)?;
    let ratio = collateral_ratio_x96(scaled_debt, collateral_amount)?;
    let tick = tick_math::ratio_to_tick(ratio)?;
    Ok(tick_math::round_tick_to_spacing(tick, tick_spacing)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wad(n: u64) -> U256 {
        U256::from(n) * DEBT_INDEX_PRECISION
    }

    #[test]
    fn test_scaled_debt_is_identity_at_base_index() {
        assert_eq!(
            calculate_scaled_debt(wad(1000), DEBT_INDEX_PRECISION).unwrap(),
            wad(1000)
        );
    }

    #[test]
    fn test_scaled_debt_truncates() {
        // 1000e18 * 1e18 / 3e18 leaves a remainder, which is dropped.
        assert_eq!(
            calculate_scaled_debt(wad(1000), wad(3)).unwrap(),
            U256::from_dec_str("333333333333333333333").unwrap()
        );
    }

    #[test]
    fn test_scaled_debt_rejects_zero_index() {
        assert_eq!(
            calculate_scaled_debt(wad(1000), U256::zero()),
            Err(PositionMathError::ZeroDebtIndex)
        );
    }

    #[test]
    fn test_collateral_ratio_is_q96() {
        // Debt equal to collateral is exactly 1.0 in Q64.96.
        assert_eq!(collateral_ratio_x96(wad(1), wad(1)).unwrap(), Q96);
        assert_eq!(
            collateral_ratio_x96(wad(1000), wad(2000)).unwrap(),
            U256::one() << 95
        );
    }

    #[test]
    fn test_half_ratio_lands_on_spaced_tick() {
        // 1000 borrowed against 2000 at the base index is a ratio of exactly
        // 0.5, between ticks; the floor tick -13864 then floors again onto
        // the 60-spacing grid.
        let tick = calculate_position_tick(wad(1000), wad(2000), DEBT_INDEX_PRECISION, 60).unwrap();
        assert_eq!(tick, -13920);
        assert_eq!(tick % 60, 0);

        let quoted = tick_math::tick_to_ratio(tick).unwrap();
        assert!(
            quoted <= U256::one() << 95,
            "spaced tick must quote at or below the position's ratio"
        );
    }

    #[test]
    fn test_accrued_index_shrinks_scaled_debt() {
        // Same nominal amounts, but interest has accrued 5%: the scaled debt
        // shrinks and the position prices into a lower bucket.
        let index = U256::from(1_050_000_000_000_000_000_u128);
        let tick = calculate_position_tick(wad(1000), wad(2000), index, 60).unwrap();
        assert_eq!(tick, -14880);
    }

    #[test]
    fn test_ratio_above_one() {
        let tick = calculate_position_tick(wad(3000), wad(1000), DEBT_INDEX_PRECISION, 10).unwrap();
        assert_eq!(tick, 21970);
    }

    #[test]
    fn test_spacing_of_one_keeps_raw_tick() {
        let tick = calculate_position_tick(wad(750), wad(1000), DEBT_INDEX_PRECISION, 1).unwrap();
        assert_eq!(tick, -5754);
    }

    #[test]
    fn test_doubled_index_halves_the_ratio() {
        let tick = calculate_position_tick(wad(500), wad(1000), wad(2), 60).unwrap();
        assert_eq!(tick, -27780);
    }

    #[test]
    fn test_rejects_zero_collateral() {
        assert_eq!(
            calculate_position_tick(wad(1000), U256::zero(), DEBT_INDEX_PRECISION, 60),
            Err(PositionMathError::ZeroCollateral)
        );
    }

    #[test]
    fn test_rejects_zero_debt_index() {
        assert_eq!(
            calculate_position_tick(wad(1000), wad(2000), U256::zero(), 60),
            Err(PositionMathError::ZeroDebtIndex)
        );
    }

    #[test]
    fn test_dust_borrow_is_unpriceable() {
        // 1 wei of debt against 1000e18 collateral quotes below MIN_RATIO.
        let result = calculate_position_tick(U256::one(), wad(1000), DEBT_INDEX_PRECISION, 60);
        assert!(matches!(
            result,
            Err(PositionMathError::Tick(
                crate::utils::error::TickMathError::RatioOutOfRange(_)
            ))
        ));
    }

    #[test]
    fn test_spacing_error_passes_through() {
        assert_eq!(
            calculate_position_tick(wad(1000), wad(2000), DEBT_INDEX_PRECISION, 0),
            Err(PositionMathError::Tick(
                crate::utils::error::TickMathError::InvalidTickSpacing(0)
            ))
        );
    }
}
