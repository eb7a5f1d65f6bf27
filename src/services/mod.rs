pub mod order_service;
pub mod position_service;
