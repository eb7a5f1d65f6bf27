use uint::construct_uint;

use crate::utils::error::TickMathError;

construct_uint! {
    pub struct U256(4);
}

/// Lowest tick index the market can quote.
pub const MIN_TICK: i32 = -887272;
/// Highest tick index the market can quote.
pub const MAX_TICK: i32 = 887272;

pub const Q96: U256 = U256([0, 4294967296, 0, 0]);
pub const Q128: U256 = U256([0, 0, 1, 0]);

/// Debt index values are WAD scaled (18 decimals), like the market contract.
pub const DEBT_INDEX_PRECISION: U256 = U256([0x0de0b6b3a7640000, 0, 0, 0]);

/// Ratio quoted at MIN_TICK. Lowest value `ratio_to_tick` accepts.
pub const MIN_RATIO: U256 = U256([0x1000276a3, 0, 0, 0]);
/// Ratio quoted at MAX_TICK. Valid ratios live in `[MIN_RATIO, MAX_RATIO)`.
/// Decimal: 1461446703485210103287273052203988822378723970342.
pub const MAX_RATIO: U256 = U256([0x5d951d5263988d26, 0xefd1fc6a50648849, 0xfffd8963, 0]);

// Per-bit growth factors of the tick curve in Q128.128. RATIO_FACTOR_BIT0
// covers bit 0 of |tick|, RATIO_FACTORS[i] covers bit i + 1. These have to
// match the deployed market library limb for limb; recomputing them drifts
// in the low bits and moves orders into the wrong bucket.
const RATIO_FACTOR_BIT0: U256 = U256([0xaa2d162d1a594001, 0xfffcb933bd6fad37, 0, 0]);
const RATIO_FACTORS: [U256; 19] = [
    U256([0x59a46990580e213a, 0xfff97272373d4132, 0, 0]),
    U256([0xef12357cf3c7fdcc, 0xfff2e50f5f656932, 0, 0]),
    U256([0x1c3624eaa0941cd0, 0xffe5caca7e10e4e6, 0, 0]),
    U256([0xc9db58835c926644, 0xffcb9843d60f6159, 0, 0]),
    U256([0x472e6896dfb254c0, 0xff973b41fa98c081, 0, 0]),
    U256([0x43ec78b326b52861, 0xff2ea16466c96a38, 0, 0]),
    U256([0x11c461f1969c3053, 0xfe5dee046a99a2a8, 0, 0]),
    U256([0xdcffc83b479aa3a4, 0xfcbe86c7900a88ae, 0, 0]),
    U256([0x6f2b074cf7815e54, 0xf987a7253ac41317, 0, 0]),
    U256([0x940c7a398e4b70f3, 0xf3392b0822b70005, 0, 0]),
    U256([0x43b29c7fa6e889d9, 0xe7159475a2c29b74, 0, 0]),
    U256([0x845ad8f792aa5825, 0xd097f3bdfd2022b8, 0, 0]),
    U256([0x8a65dc1f90e061e5, 0xa9f746462d870fdf, 0, 0]),
    U256([0x90bb3df62baf32f7, 0x70d869a156d2a1b8, 0, 0]),
    U256([0x81231505542fcfa6, 0x31be135f97d08fd9, 0, 0]),
    U256([0xc677de54f3e99bc9, 0x09aa508b5b7a84e1, 0, 0]),
    U256([0x6699c329225ee604, 0x005d6af8dedb8119, 0, 0]),
    U256([0x1ea926041bedfe98, 0x00002216e584f5fa, 0, 0]),
    U256([0x91f7dc42444e8fa2, 0x00000000048a1703, 0, 0]),
];

// Calibration constants for the inverse direction, also lifted verbatim.
// LOG_SCALE converts a Q64.64 binary log into tick units scaled by 2^128;
// the two offsets bracket the fixed-point error so the true tick is always
// one of the two candidates they produce.
const LOG_SCALE: U256 = U256([0xa301d71055774c85, 0x3627, 0, 0]);
const LOG_OFFSET_LOW: U256 = U256([0x5af012a19d003aaa, 0x028f6481ab7f045a, 0, 0]);
const LOG_OFFSET_HIGH: U256 = U256([0x455e260799a0632f, 0xdb2df09e81959a81, 0, 0]);

const FRACTION_MASK: U256 = U256([u64::MAX, u64::MAX, 0, 0]);

/// Quotes the Q64.96 debt/collateral ratio priced at `tick`.
///
/// Bit-exact mirror of the on-chain library: fixed-point exponentiation over
/// the bits of |tick| in Q128.128, reciprocal for the positive side, ceiling
/// conversion down to Q64.96.
pub fn tick_to_ratio(tick: i32) -> Result<U256, TickMathError> {
    if tick < MIN_TICK || tick > MAX_TICK {
        return Err(TickMathError::TickOutOfRange(tick));
    }
    let abs_tick = tick.unsigned_abs();

    let mut ratio = if abs_tick & 1 != 0 {
        RATIO_FACTOR_BIT0
    } else {
        Q128
    };
    for (i, factor) in RATIO_FACTORS.iter().enumerate() {
        if abs_tick & (1 << (i + 1)) != 0 {
            ratio = (ratio * *factor) >> 128;
        }
    }

    // The factor walk only covers the reciprocal half of the curve.
    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 down to Q64.96. Remainders round up; the inverse floors, and
    // the two have to meet for the round trip to hold.
    if (ratio & U256::from(u32::MAX)).is_zero() {
        Ok(ratio >> 32)
    } else {
        Ok((ratio >> 32) + 1)
    }
}

/// Finds the tick whose quoted ratio is the greatest one not exceeding
/// `ratio`, i.e. `tick_to_ratio(t) <= ratio < tick_to_ratio(t + 1)`.
pub fn ratio_to_tick(ratio: U256) -> Result<i32, TickMathError> {
    if ratio < MIN_RATIO || ratio >= MAX_RATIO {
        return Err(TickMathError::RatioOutOfRange(ratio));
    }

    // Work in the Q128.128 frame the calibration constants are built for.
    let q128 = ratio << 32;

    let mut msb = 0u32;
    let mut remaining = q128;
    for width in [128u32, 64, 32, 16, 8, 4, 2, 1] {
        if remaining > (U256::one() << width) - 1 {
            remaining = remaining >> width;
            msb += width;
        }
    }

    // Normalize the mantissa into [2^127, 2^128).
    let mut r = if msb >= 128 {
        q128 >> (msb - 127)
    } else {
        q128 << (127 - msb)
    };

    // Binary log, Q64.64 signed. The integer part comes straight from the
    // msb; each squaring round below resolves one more fractional bit.
    let mut log_2_x64: i128 = ((msb as i128) - 128) << 64;

    for shift in (50..=63).rev() {
        r = (r * r) >> 127;
        let carry = (r >> 128).low_u64();
        log_2_x64 |= (carry as i128) << shift;
        r = r >> carry;
    }

    // Rescale from log2 into tick units. The product outgrows a signed
    // 128-bit word, so the sign rides next to an unsigned magnitude.
    let negative = log_2_x64 < 0;
    let scaled = U256::from(log_2_x64.unsigned_abs()) * LOG_SCALE;

    let (tick_low, tick_high) = if negative {
        (
            floor_shift_q128(U256::zero(), scaled + LOG_OFFSET_LOW),
            floor_shift_q128(LOG_OFFSET_HIGH, scaled),
        )
    } else {
        (
            floor_shift_q128(scaled, LOG_OFFSET_LOW),
            floor_shift_q128(scaled + LOG_OFFSET_HIGH, U256::zero()),
        )
    };
    let tick_low = tick_low as i32;
    let tick_high = tick_high as i32;

    if tick_low == tick_high {
        return Ok(tick_low);
    }
    // Two candidates left. One forward quote settles it and pins the floor
    // convention at the same time.
    if tick_to_ratio(tick_high)? <= ratio {
        Ok(tick_high)
    } else {
        Ok(tick_low)
    }
}

// Signed floor of (pos - neg) / 2^128 without leaving unsigned arithmetic.
fn floor_shift_q128(pos: U256, neg: U256) -> i64 {
    if pos >= neg {
        ((pos - neg) >> 128).low_u64() as i64
    } else {
        let gap = neg - pos;
        let whole = (gap >> 128).low_u64() as i64;
        if (gap & FRACTION_MASK).is_zero() {
            -whole
        } else {
            -(whole + 1)
        }
    }
}

/// Rounds `tick` down to the nearest multiple of `tick_spacing`.
///
/// Floors toward negative infinity, never toward zero: a spaced tick must
/// quote a ratio at or below the raw tick's, also for negative ticks.
pub fn round_tick_to_spacing(tick: i32, tick_spacing: i32) -> Result<i32, TickMathError> {
    if tick_spacing <= 0 {
        return Err(TickMathError::InvalidTickSpacing(tick_spacing));
    }
    Ok(tick.div_euclid(tick_spacing) * tick_spacing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> U256 {
        U256::from_dec_str(s).unwrap()
    }

    #[test]
    fn test_ratio_at_tick_zero_is_one() {
        assert_eq!(tick_to_ratio(0).unwrap(), Q96, "tick 0 must quote exactly 1.0");
    }

    #[test]
    fn test_ratio_at_boundary_ticks() {
        assert_eq!(tick_to_ratio(MIN_TICK).unwrap(), MIN_RATIO);
        assert_eq!(tick_to_ratio(MAX_TICK).unwrap(), MAX_RATIO);
        assert_eq!(
            tick_to_ratio(MAX_TICK).unwrap(),
            dec("1461446703485210103287273052203988822378723970342")
        );
    }

    #[test]
    fn test_ratio_known_values() {
        // One tick away from par, both sides.
        assert_eq!(tick_to_ratio(1).unwrap(), dec("79232123823359799118286999568"));
        assert_eq!(tick_to_ratio(-1).unwrap(), dec("79224201403219477170569942574"));

        // One full spacing step of a 60-spaced market.
        assert_eq!(tick_to_ratio(60).unwrap(), dec("79466191966197645195421774833"));
        assert_eq!(tick_to_ratio(-60).unwrap(), dec("78990846045029531151608375686"));

        // Deep into both halves of the curve.
        assert_eq!(
            tick_to_ratio(123456).unwrap(),
            dec("37980312163600838849089827163598")
        );
        assert_eq!(
            tick_to_ratio(-123456).unwrap(),
            dec("165272515621987480497246433")
        );
    }

    #[test]
    fn test_ratio_rejects_out_of_range_ticks() {
        assert_eq!(
            tick_to_ratio(MAX_TICK + 1),
            Err(TickMathError::TickOutOfRange(887273))
        );
        assert_eq!(
            tick_to_ratio(MIN_TICK - 1),
            Err(TickMathError::TickOutOfRange(-887273))
        );
        assert!(tick_to_ratio(i32::MIN).is_err());
        assert!(tick_to_ratio(i32::MAX).is_err());
    }

    #[test]
    fn test_tick_rejects_out_of_range_ratios() {
        assert_eq!(
            ratio_to_tick(MIN_RATIO - 1),
            Err(TickMathError::RatioOutOfRange(MIN_RATIO - 1))
        );
        // The top of the range is exclusive.
        assert_eq!(
            ratio_to_tick(MAX_RATIO),
            Err(TickMathError::RatioOutOfRange(MAX_RATIO))
        );
        assert!(ratio_to_tick(U256::zero()).is_err());
    }

    #[test]
    fn test_tick_at_boundary_ratios() {
        assert_eq!(ratio_to_tick(MIN_RATIO).unwrap(), MIN_TICK);
        assert_eq!(ratio_to_tick(MAX_RATIO - 1).unwrap(), MAX_TICK - 1);
    }

    #[test]
    fn test_round_trip_holds_across_the_range() {
        // MAX_TICK itself quotes MAX_RATIO, which sits outside the inverse's
        // half-open domain, so the law covers every tick below it.
        let mut tick = MIN_TICK;
        while tick < MAX_TICK {
            let ratio = tick_to_ratio(tick).unwrap();
            assert_eq!(
                ratio_to_tick(ratio).unwrap(),
                tick,
                "round trip broke at tick {}",
                tick
            );
            tick += 9973;
        }
        for tick in -100..100 {
            let ratio = tick_to_ratio(tick).unwrap();
            assert_eq!(ratio_to_tick(ratio).unwrap(), tick);
        }
        for tick in [MIN_TICK, -887271, -13920, -13864, 13863, 500000, 887271] {
            let ratio = tick_to_ratio(tick).unwrap();
            assert_eq!(ratio_to_tick(ratio).unwrap(), tick);
        }
    }

    #[test]
    fn test_floor_convention_between_ticks() {
        // A hair under tick 60's quote belongs to tick 59.
        let at_60 = tick_to_ratio(60).unwrap();
        assert_eq!(ratio_to_tick(at_60 - 1).unwrap(), 59);
        assert_eq!(ratio_to_tick(at_60).unwrap(), 60);

        // 0.5 in Q64.96 lands between ticks.
        let half = U256::one() << 95;
        assert_eq!(ratio_to_tick(half).unwrap(), -13864);
        assert!(tick_to_ratio(-13864).unwrap() <= half);
        assert!(tick_to_ratio(-13863).unwrap() > half);

        // Just above par still floors to 0.
        assert_eq!(ratio_to_tick(Q96 + 1).unwrap(), 0);
        // 2.0 floors to 13863.
        assert_eq!(ratio_to_tick(U256::one() << 97).unwrap(), 13863);
    }

    #[test]
    fn test_quotes_strictly_increase_with_tick() {
        let mut prev = tick_to_ratio(-2000).unwrap();
        for tick in -1999..=2000 {
            let ratio = tick_to_ratio(tick).unwrap();
            assert!(ratio > prev, "quote did not increase at tick {}", tick);
            prev = ratio;
        }
        assert!(tick_to_ratio(MIN_TICK + 1).unwrap() > tick_to_ratio(MIN_TICK).unwrap());
        assert!(tick_to_ratio(MAX_TICK).unwrap() > tick_to_ratio(MAX_TICK - 1).unwrap());
    }

    #[test]
    fn test_round_to_spacing_floors_toward_negative() {
        assert_eq!(round_tick_to_spacing(125, 60).unwrap(), 120);
        assert_eq!(round_tick_to_spacing(-125, 60).unwrap(), -180);
        assert_eq!(round_tick_to_spacing(-180, 60).unwrap(), -180);
        assert_eq!(round_tick_to_spacing(0, 60).unwrap(), 0);
        assert_eq!(round_tick_to_spacing(7, 10).unwrap(), 0);
        assert_eq!(round_tick_to_spacing(-7, 10).unwrap(), -10);
        assert_eq!(round_tick_to_spacing(-1, 1).unwrap(), -1);
        assert_eq!(round_tick_to_spacing(887271, 200).unwrap(), 887200);
        assert_eq!(round_tick_to_spacing(-887272, 200).unwrap(), -887400);
    }

    #[test]
    fn test_round_to_spacing_rejects_bad_spacing() {
        assert_eq!(
            round_tick_to_spacing(100, 0),
            Err(TickMathError::InvalidTickSpacing(0))
        );
        assert_eq!(
            round_tick_to_spacing(100, -60),
            Err(TickMathError::InvalidTickSpacing(-60))
        );
    }

    #[test]
    fn test_spaced_tick_never_quotes_above_input() {
        for ratio in [
            U256::one() << 95,
            U256::one() << 97,
            tick_to_ratio(-13864).unwrap() + 5,
            tick_to_ratio(100000).unwrap() + 12345,
        ] {
            let tick = ratio_to_tick(ratio).unwrap();
            let spaced = round_tick_to_spacing(tick, 60).unwrap();
            assert_eq!(spaced % 60, 0);
            assert!(spaced <= tick);
            assert!(
                tick_to_ratio(spaced).unwrap() <= ratio,
                "spaced tick {} quotes above the input ratio",
                spaced
            );
        }
    }
}
