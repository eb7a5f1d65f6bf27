use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use std::env;

const ADDRESS_PATTERN: &str = r"^0x[0-9a-fA-F]{40}$";

pub enum ExecutionMode {
    Plan,
    Submit,
}

pub struct AppConfig {
    pub rpc_url: String,
    pub gateway_url: String,
    pub market_address: String,
    pub wallet_address: String,
    pub execution_mode: ExecutionMode,
}

impl ExecutionMode {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "plan" => Ok(ExecutionMode::Plan),
            "submit" => Ok(ExecutionMode::Submit),
            _ => Err(anyhow!("Invalid execution mode: {}", s)),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let address_format =
            Regex::new(ADDRESS_PATTERN).context("Failed to compile address pattern")?;

        Ok(Self {
            rpc_url: env::var("RPC_URL").context("RPC_URL must be set")?,
            gateway_url: env::var("GATEWAY_URL").context("GATEWAY_URL must be set")?,
            market_address: required_address(&address_format, "MARKET_ADDRESS")?,
            wallet_address: required_address(&address_format, "WALLET_ADDRESS")?,
            execution_mode: ExecutionMode::from_str(
                &env::var("EXECUTION_MODE").unwrap_or_else(|_| "plan".to_string()),
            )?,
        })
    }
}

fn required_address(pattern: &Regex, name: &str) -> Result<String> {
    let value = env::var(name).with_context(|| format!("{} must be set", name))?;
    if !pattern.is_match(&value) {
        bail!(
            "{} must be a 0x-prefixed 20-byte hex address, got {}",
            name,
            value
        );
    }
    Ok(value)
}
