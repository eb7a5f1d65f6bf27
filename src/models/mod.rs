pub mod market_model;
pub mod order_model;
