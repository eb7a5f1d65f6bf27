use anyhow::anyhow;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::models::order_model::{Ciphertext, CipherType};
use crate::utils::tick_math::U256;

#[derive(Debug)]
pub enum EncryptionError {
    Rejected(String),
    TagMismatch,
    Other(anyhow::Error),
}

impl fmt::Display for EncryptionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EncryptionError::Rejected(reason) => {
                write!(f, "Gateway rejected the request: {}", reason)
            }
            EncryptionError::TagMismatch => {
                write!(f, "Ciphertext handle does not match its payload")
            }
            EncryptionError::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EncryptionError {}

impl From<reqwest::Error> for EncryptionError {
    fn from(error: reqwest::Error) -> Self {
        EncryptionError::Other(error.into())
    }
}

/// Seam between order building and the confidential gateway. Anything that can
/// seal and open values can stand in for the real gateway.
#[async_trait]
pub trait Encryptor: Send + Sync {
    async fn encrypt(&self, value: U256) -> Result<Ciphertext, EncryptionError>;
    async fn decrypt(
        &self,
        ciphertext: &Ciphertext,
        cipher_type: CipherType,
    ) -> Result<U256, EncryptionError>;
}

#[derive(Serialize, Deserialize, Debug)]
struct DecryptResponse {
    value: String,
}

pub struct GatewayEncryptor {
    client: reqwest::Client,
    gateway_url: String,
}

impl GatewayEncryptor {
    pub fn new(gateway_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            gateway_url,
        }
    }
}

#[async_trait]
impl Encryptor for GatewayEncryptor {
    async fn encrypt(&self, value: U256) -> Result<Ciphertext, EncryptionError> {
        // Do not log the value here.
        log::debug!("Sealing a value with the gateway");

        let response = self
            .client
            .post(format!("{}/encrypt", self.gateway_url))
            .header("accept", "application/json")
            .header("content-type", "application/json")
            .json(&serde_json::json!({
                "value": value.to_string(),
                "type": CipherType::Uint256.as_str()
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let reason = response.text().await.unwrap_or_default();
            return Err(EncryptionError::Rejected(format!("{} {}", status, reason)));
        }

        let ciphertext: Ciphertext = response.json().await?;
        verify_handle(&ciphertext)?;
        Ok(ciphertext)
    }

    async fn decrypt(
        &self,
        ciphertext: &Ciphertext,
        cipher_type: CipherType,
    ) -> Result<U256, EncryptionError> {
        verify_handle(ciphertext)?;
        log::debug!("Opening ciphertext {}", ciphertext.handle);

        let response = self
            .client
            .post(format!("{}/decrypt", self.gateway_url))
            .header("accept", "application/json")
            .header("content-type", "application/json")
            .json(&serde_json::json!({
                "handle": ciphertext.handle,
                "payload": ciphertext.payload,
                "type": cipher_type.as_str()
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let reason = response.text().await.unwrap_or_default();
            return Err(EncryptionError::Rejected(format!("{} {}", status, reason)));
        }

        let decrypted: DecryptResponse = response.json().await?;
        U256::from_dec_str(&decrypted.value).map_err(|e| {
            EncryptionError::Other(anyhow!("Gateway returned a bad decimal value: {}", e))
        })
    }
}

// The handle is sha256 over the raw payload bytes. Anything else got
// corrupted or tampered with in transit.
fn verify_handle(ciphertext: &Ciphertext) -> Result<(), EncryptionError> {
    let payload = general_purpose::STANDARD.decode(&ciphertext.payload).map_err(|e| {
        EncryptionError::Other(anyhow!("Ciphertext payload is not valid base64: {}", e))
    })?;

    let digest = Sha256::digest(&payload);
    let expected = hex::encode(digest);
    let handle = ciphertext
        .handle
        .strip_prefix("0x")
        .unwrap_or(&ciphertext.handle);

    if !handle.eq_ignore_ascii_case(&expected) {
        return Err(EncryptionError::TagMismatch);
    }
    Ok(())
}
