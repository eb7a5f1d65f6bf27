use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::tick_math::U256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Borrow,
    Repay,
}

impl OrderSide {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "borrow" => Ok(OrderSide::Borrow),
            "repay" => Ok(OrderSide::Repay),
            _ => Err(anyhow!("Invalid order side: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Borrow => "borrow",
            OrderSide::Repay => "repay",
        }
    }
}

/// Plaintext width behind a ciphertext, as the gateway tags it on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherType {
    Uint64,
    Uint128,
    Uint256,
}

impl CipherType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CipherType::Uint64 => "uint64",
            CipherType::Uint128 => "uint128",
            CipherType::Uint256 => "uint256",
        }
    }
}

/// Ciphertext as the gateway hands it out. The payload is opaque; the handle
/// is sha256 of the payload bytes and is what the contract call carries.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ciphertext {
    pub handle: String,
    pub payload: String,
}

// Payloads never reach logs.
impl fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Ciphertext")
            .field("handle", &self.handle)
            .field("payload", &"<encrypted>")
            .finish()
    }
}

/// Off-chain signed authorization accompanying every order. Built and signed
/// by the wallet layer, carried through untouched here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permit {
    pub owner: String,
    pub deadline: DateTime<Utc>,
    pub signature: String,
}

impl Permit {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline <= now
    }
}

/// Everything decided before any ciphertext exists. The tick is final here;
/// encryption and submission never move it.
#[derive(Debug, Clone)]
pub struct OrderPlan {
    pub side: OrderSide,
    pub amount: U256,
    /// Max collateral pledged on borrow, min collateral released on repay.
    pub collateral_bound: U256,
    pub scaled_debt: U256,
    pub ratio: U256,
    pub tick: i32,
}

#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub tx_hash: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct DecryptedPosition {
    pub owner: String,
    pub tick: i32,
    pub debt_share: U256,
    pub collateral: U256,
}
