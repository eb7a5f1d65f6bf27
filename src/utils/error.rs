use std::error::Error;
use std::fmt;

use super::tick_math::U256;

#[derive(Debug, PartialEq, Eq)]
pub enum TickMathError {
    TickOutOfRange(i32),
    RatioOutOfRange(U256),
    InvalidTickSpacing(i32),
}

impl fmt::Display for TickMathError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TickMathError::TickOutOfRange(tick) => write!(f, "Tick out of range: {}", tick),
            TickMathError::RatioOutOfRange(ratio) => write!(f, "Ratio out of range: {}", ratio),
            TickMathError::InvalidTickSpacing(spacing) => {
                write!(f, "Tick spacing must be positive, got {}", spacing)
            }
        }
    }
}

impl Error for TickMathError {}

#[derive(Debug, PartialEq, Eq)]
pub enum PositionMathError {
    ZeroCollateral,
    ZeroDebtIndex,
    AmountOverflow,
    Tick(TickMathError),
}

impl fmt::Display for PositionMathError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PositionMathError::ZeroCollateral => {
                write!(f, "Collateral amount is zero, ratio is undefined")
            }
            PositionMathError::ZeroDebtIndex => {
                write!(f, "Debt index is zero, scaled debt is undefined")
            }
            PositionMathError::AmountOverflow => {
                write!(f, "Amount overflow while forming the ratio")
            }
            PositionMathError::Tick(err) => write!(f, "{}", err),
        }
    }
}

impl Error for PositionMathError {}

impl From<TickMathError> for PositionMathError {
    fn from(error: TickMathError) -> Self {
        PositionMathError::Tick(error)
    }
}
