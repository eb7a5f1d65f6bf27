use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use rand::Rng;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::market_model::{MarketModel, PositionModel};
use crate::models::order_model::{Ciphertext, Permit};
use crate::utils::decode::{decode_market_state, parse_hex_u256};
use crate::utils::tick_math::U256;

#[derive(Serialize, Deserialize, Debug)]
pub struct RpcResponse {
    // Null and absent result both map to Value::Null; a position lookup uses
    // null to mean "no position", so it must not be an error here.
    #[serde(default)]
    pub result: Value,
    pub error: Option<Value>,
    pub jsonrpc: String,
    pub id: u64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AccountBlob {
    pub data: String,
}

#[derive(Debug)]
pub enum ApiError {
    RateLimit,
    Other(anyhow::Error),
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(StatusCode::TOO_MANY_REQUESTS) => ApiError::RateLimit,
            _ => ApiError::Other(error.into()),
        }
    }
}

#[derive(Clone)]
pub struct MarketApi {
    client: reqwest::Client,
    rpc_url: String,
    market_address: String,
}

impl MarketApi {
    pub fn new(rpc_url: String, market_address: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            rpc_url,
            market_address,
        }
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, ApiError> {
        let request_id = rand::thread_rng().gen::<u32>() as u64;
        log::debug!("RPC {} (id {})", method, request_id);

        let response = self
            .client
            .post(&self.rpc_url)
            .header("accept", "application/json")
            .header("content-type", "application/json")
            .json(&serde_json::json!({
                "id": request_id,
                "jsonrpc": "2.0",
                "method": method,
                "params": params
            }))
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimit);
        }

        let api_response: RpcResponse = response.json().await?;
        if let Some(error) = api_response.error {
            return Err(ApiError::Other(anyhow!("RPC error from node: {}", error)));
        }
        Ok(api_response.result)
    }

    pub async fn fetch_market(&self) -> Result<MarketModel, ApiError> {
        let result = self
            .rpc_call(
                "cm_getMarketState",
                serde_json::json!([self.market_address]),
            )
            .await?;

        let blob: AccountBlob = serde_json::from_value(result)
            .context("Failed to parse market account response")
            .map_err(ApiError::Other)?;

        let bytes = general_purpose::STANDARD
            .decode(&blob.data)
            .context("Market account data is not valid base64")
            .map_err(ApiError::Other)?;

        let state = decode_market_state(&bytes).map_err(ApiError::Other)?;
        Ok(MarketModel::from_state(self.market_address.clone(), state))
    }

    pub async fn fetch_debt_index(&self) -> Result<U256, ApiError> {
        let result = self
            .rpc_call("cm_getDebtIndex", serde_json::json!([self.market_address]))
            .await?;

        let quantity = result
            .as_str()
            .ok_or_else(|| ApiError::Other(anyhow!("Debt index response is not a string")))?;
        parse_hex_u256(quantity).map_err(ApiError::Other)
    }

    pub async fn fetch_position(&self, owner: &str) -> Result<Option<PositionModel>, ApiError> {
        let result = self
            .rpc_call(
                "cm_getPosition",
                serde_json::json!([self.market_address, owner]),
            )
            .await?;

        if result.is_null() {
            return Ok(None);
        }

        let position: PositionModel = serde_json::from_value(result)
            .context("Failed to parse position response")
            .map_err(ApiError::Other)?;
        Ok(Some(position))
    }

    // Submissions are not idempotent, so callers must never retry these.
    pub async fn submit_borrow(
        &self,
        tick: i32,
        encrypted_amount: &Ciphertext,
        encrypted_max_collateral: &Ciphertext,
        permit: &Permit,
    ) -> Result<String, ApiError> {
        let result = self
            .rpc_call(
                "cm_submitOrder",
                serde_json::json!([{
                    "market": self.market_address,
                    "side": "borrow",
                    "tick": tick,
                    "encryptedAmount": encrypted_amount,
                    "encryptedMaxCollateral": encrypted_max_collateral,
                    "permit": permit
                }]),
            )
            .await?;

        Self::tx_hash_from(result)
    }

    pub async fn submit_repay(
        &self,
        tick: i32,
        encrypted_amount: &Ciphertext,
        encrypted_min_collateral: &Ciphertext,
        permit: &Permit,
    ) -> Result<String, ApiError> {
        let result = self
            .rpc_call(
                "cm_submitOrder",
                serde_json::json!([{
                    "market": self.market_address,
                    "side": "repay",
                    "tick": tick,
                    "encryptedAmount": encrypted_amount,
                    "encryptedMinCollateral": encrypted_min_collateral,
                    "permit": permit
                }]),
            )
            .await?;

        Self::tx_hash_from(result)
    }

    fn tx_hash_from(result: Value) -> Result<String, ApiError> {
        result
            .as_str()
            .map(|hash| hash.to_string())
            .ok_or_else(|| ApiError::Other(anyhow!("Submission response is not a tx hash")))
    }
}
