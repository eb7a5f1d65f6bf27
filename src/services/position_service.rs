use crate::api::encryption_api::Encryptor;
use crate::api::market_api::{ApiError, MarketApi};
use crate::models::market_model::PositionModel;
use crate::models::order_model::{Ciphertext, CipherType, DecryptedPosition};
use crate::utils::tick_math::U256;
use anyhow::{anyhow, Result};
use futures::future::try_join;
use std::sync::Arc;
use tokio::time::Duration;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};

const MAX_RETRIES: u32 = 5;
const BASE_DELAY: u64 = 500; // 0.5 seconds
const MAX_DELAY: u64 = 60_000; // 1 minute

pub struct PositionService {
    market_api: MarketApi,
    encryptor: Arc<dyn Encryptor>,
}

impl PositionService {
    pub fn new(market_api: MarketApi, encryptor: Arc<dyn Encryptor>) -> Self {
        Self {
            market_api,
            encryptor,
        }
    }

    /// Fetches the owner's position and opens both encrypted magnitudes.
    /// Read-only; nothing is submitted.
    pub async fn fetch_decrypted_position(
        &self,
        owner: &str,
    ) -> Result<Option<DecryptedPosition>> {
        match self.fetch_position_with_retry(owner).await? {
            Some(position) => Ok(Some(self.open_position(position).await?)),
            None => Ok(None),
        }
    }

    // Both magnitudes are sealed at the width the market tags on the
    // position; decryption asks for that width.
    async fn open_position(&self, position: PositionModel) -> Result<DecryptedPosition> {
        log::info!(
            "Decrypting position for {} at tick {}",
            position.owner,
            position.tick
        );

        let (debt_share, collateral) = try_join(
            self.decrypt_value(&position.encrypted_debt_share, position.cipher_type),
            self.decrypt_value(&position.encrypted_collateral, position.cipher_type),
        )
        .await?;

        Ok(DecryptedPosition {
            owner: position.owner,
            tick: position.tick,
            debt_share,
            collateral,
        })
    }

    async fn decrypt_value(
        &self,
        ciphertext: &Ciphertext,
        cipher_type: CipherType,
    ) -> Result<U256> {
        self.encryptor
            .decrypt(ciphertext, cipher_type)
            .await
            .map_err(|e| anyhow!("Decryption failed: {}", e))
    }

    async fn fetch_position_with_retry(&self, owner: &str) -> Result<Option<PositionModel>> {
        let retry_strategy = ExponentialBackoff::from_millis(BASE_DELAY)
            .max_delay(Duration::from_millis(MAX_DELAY))
            .map(jitter)
            .take(MAX_RETRIES as usize);

        Retry::spawn(retry_strategy, || async {
            match self.market_api.fetch_position(owner).await {
                Ok(position) => Ok(position),
                Err(ApiError::RateLimit) => {
                    log::warn!("Rate limit hit fetching position. Retrying...");
                    Err(anyhow!("Rate limit hit"))
                }
                Err(ApiError::Other(e)) => Err(e),
            }
        })
        .await
    }
}
