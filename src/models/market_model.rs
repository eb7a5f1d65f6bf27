use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::order_model::{Ciphertext, CipherType};

// Decoded image of the on-chain market account.
#[derive(Debug, PartialEq, Eq)]
pub struct MarketState {
    pub debt_token: String,
    pub collateral_token: String,
    pub tick_spacing: i32,
    pub paused: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketModel {
    pub address: String,
    pub debt_token: String,
    pub collateral_token: String,
    pub tick_spacing: i32,
    pub paused: bool,
    pub fetched_at: DateTime<Utc>,
}

impl MarketModel {
    pub fn from_state(address: String, state: MarketState) -> Self {
        Self {
            address,
            debt_token: state.debt_token,
            collateral_token: state.collateral_token,
            tick_spacing: state.tick_spacing,
            paused: state.paused,
            fetched_at: Utc::now(),
        }
    }
}

// A position as the market reports it: the tick is public, the magnitudes
// stay ciphertext until the owner decrypts them through the gateway. The
// market tags the width its ciphertexts are sealed at; decryption has to ask
// for that width, not assume one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionModel {
    pub owner: String,
    pub tick: i32,
    pub cipher_type: CipherType,
    pub encrypted_debt_share: Ciphertext,
    pub encrypted_collateral: Ciphertext,
}
