pub mod decode;
pub mod error;
pub mod position_calcs;
pub mod tick_math;
