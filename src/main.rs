mod api;
mod config;
mod models;
mod services;
mod utils;

use crate::api::encryption_api::GatewayEncryptor;
use crate::api::market_api::MarketApi;
use crate::config::{AppConfig, ExecutionMode};
use crate::models::order_model::{OrderSide, Permit};
use crate::services::order_service::OrderService;
use crate::services::position_service::PositionService;
use crate::utils::tick_math::U256;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use dotenv::dotenv;
use env_logger::Env;
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok(); // Load .env file if present
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let market_api = MarketApi::new(config.rpc_url.clone(), config.market_address.clone());
    let encryptor = Arc::new(GatewayEncryptor::new(config.gateway_url.clone()));

    let order_service = OrderService::new(market_api.clone(), encryptor.clone());
    let position_service = PositionService::new(market_api, encryptor);

    // The order request rides in on the environment next to the config.
    let side = OrderSide::from_str(&env::var("ORDER_SIDE").context("ORDER_SIDE must be set")?)?;
    let amount = parse_amount("ORDER_AMOUNT")?;
    let collateral_bound = parse_amount("ORDER_COLLATERAL_BOUND")?;

    let plan = order_service
        .plan_order(side, amount, collateral_bound)
        .await?;

    println!("{}", "Order plan".bold());
    println!("  side:             {}", plan.side.as_str());
    println!("  amount:           {}", plan.amount);
    println!("  collateral bound: {}", plan.collateral_bound);
    println!("  scaled debt:      {}", plan.scaled_debt);
    println!("  ratio (Q64.96):   {}", plan.ratio);
    println!("  tick:             {}", plan.tick.to_string().green());

    match position_service
        .fetch_decrypted_position(&config.wallet_address)
        .await?
    {
        Some(position) => {
            println!("{}", "Current position".bold());
            println!("  owner:      {}", position.owner);
            println!("  tick:       {}", position.tick);
            println!("  debt share: {}", position.debt_share);
            println!("  collateral: {}", position.collateral);
        }
        None => println!("No open position for {}", config.wallet_address),
    }

    match config.execution_mode {
        ExecutionMode::Plan => {
            println!("{}", "Plan mode: nothing was submitted.".yellow());
        }
        ExecutionMode::Submit => {
            let permit = permit_from_env(&config.wallet_address)?;
            let receipt = order_service.submit_order(&plan, &permit).await?;
            println!(
                "{} {} at {}",
                "Submitted:".green(),
                receipt.tx_hash,
                receipt.submitted_at
            );
        }
    }

    Ok(())
}

fn parse_amount(name: &str) -> Result<U256> {
    let raw = env::var(name).with_context(|| format!("{} must be set", name))?;
    U256::from_dec_str(&raw).map_err(|e| anyhow!("{} is not a valid decimal amount: {}", name, e))
}

// The permit is signed elsewhere; we only carry it to the market node.
fn permit_from_env(owner: &str) -> Result<Permit> {
    let deadline = env::var("PERMIT_DEADLINE").context("PERMIT_DEADLINE must be set in submit mode")?;
    let deadline = DateTime::parse_from_rfc3339(&deadline)
        .context("PERMIT_DEADLINE must be an RFC 3339 timestamp")?
        .with_timezone(&Utc);
    let signature =
        env::var("PERMIT_SIGNATURE").context("PERMIT_SIGNATURE must be set in submit mode")?;

    Ok(Permit {
        owner: owner.to_string(),
        deadline,
        signature,
    })
}
