pub mod encryption_api;
pub mod market_api;
