use crate::api::encryption_api::Encryptor;
use crate::api::market_api::{ApiError, MarketApi};
use crate::models::market_model::MarketModel;
use crate::models::order_model::{Ciphertext, OrderPlan, OrderSide, Permit, SubmitReceipt};
use crate::utils::position_calcs;
use crate::utils::tick_math::U256;
use anyhow::{anyhow, bail, Result};
use chrono::Utc;
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

pub struct OrderService {
    market_api: MarketApi,
    encryptor: Arc<dyn Encryptor>,
}

impl OrderService {
    pub fn new(market_api: MarketApi, encryptor: Arc<dyn Encryptor>) -> Self {
        Self {
            market_api,
            encryptor,
        }
    }

    /// Resolves an order request against live market state. Everything here
    /// is plaintext; nothing is encrypted or sent until `submit_order`.
    pub async fn plan_order(
        &self,
        side: OrderSide,
        amount: U256,
        collateral_bound: U256,
    ) -> Result<OrderPlan> {
        let (market, debt_index) = try_join(
            self.fetch_market_with_retry(),
            self.fetch_debt_index_with_retry(),
        )
        .await?;

        Self::ensure_open(&market)?;

        let plan = Self::build_plan(side, amount, collateral_bound, debt_index, market.tick_spacing)?;
        log::info!(
            "Planned {} on market {} at tick {}",
            plan.side.as_str(),
            market.address,
            plan.tick
        );
        Ok(plan)
    }

    fn ensure_open(market: &MarketModel) -> Result<()> {
        if market.paused {
            bail!("Market {} is paused, refusing to build orders", market.address);
        }
        Ok(())
    }

    // Network-free so the pricing path stays testable. The tick comes from
    // calculate_position_tick, the one pipeline both sides submit through;
    // the two direct calls only surface the intermediates the plan reports.
    fn build_plan(
        side: OrderSide,
        amount: U256,
        collateral_bound: U256,
        debt_index: U256,
        tick_spacing: i32,
    ) -> Result<OrderPlan> {
        let scaled_debt = position_calcs::calculate_scaled_debt(amount, debt_index)?;
        let ratio = position_calcs::collateral_ratio_x96(scaled_debt, collateral_bound)?;
        let tick = position_calcs::calculate_position_tick(
            amount,
            collateral_bound,
            debt_index,
            tick_spacing,
        )?;

        Ok(OrderPlan {
            side,
            amount,
            collateral_bound,
            scaled_debt,
            ratio,
            tick,
        })
    }

    /// Encrypts the plan's magnitudes and sends the order. The tick was fixed
    /// at planning time and goes out in the clear. Submission happens at most
    /// once; a failure here is surfaced, never retried.
    pub async fn submit_order(&self, plan: &OrderPlan, permit: &Permit) -> Result<SubmitReceipt> {
        let now = Utc::now();
        if permit.is_expired(now) {
            bail!(
                "Permit for {} expired at {}, refusing to submit",
                permit.owner,
                permit.deadline
            );
        }

        let (encrypted_amount, encrypted_bound) = try_join(
            self.encrypt_value(plan.amount),
            self.encrypt_value(plan.collateral_bound),
        )
        .await?;

        log::info!(
            "Submitting {} at tick {} for {}",
            plan.side.as_str(),
            plan.tick,
            permit.owner
        );

        let submission = match plan.side {
            OrderSide::Borrow => {
                self.market_api
                    .submit_borrow(plan.tick, &encrypted_amount, &encrypted_bound, permit)
                    .await
            }
            OrderSide::Repay => {
                self.market_api
                    .submit_repay(plan.tick, &encrypted_amount, &encrypted_bound, permit)
                    .await
            }
        };

        let tx_hash = match submission {
            Ok(hash) => hash,
            Err(ApiError::RateLimit) => {
                bail!("Rate limited while submitting; the order was not sent again")
            }
            Err(ApiError::Other(e)) => return Err(e),
        };

        Ok(SubmitReceipt {
            tx_hash,
            submitted_at: Utc::now(),
        })
    }

    async fn encrypt_value(&self, value: U256) -> Result<Ciphertext> {
        self.encryptor
            .encrypt(value)
            .await
            .map_err(|e| anyhow!("Encryption failed: {}", e))
    }

    async fn fetch_market_with_retry(&self) -> Result<MarketModel> {
        let retry_strategy = ExponentialBackoff::from_millis(BASE_DELAY)
            .max_delay(Duration::from_millis(MAX_DELAY))
            .map(jitter)
            .take(MAX_RETRIES as usize);

        Retry::spawn(retry_strategy, || async {
            match self.market_api.fetch_market().await {
                Ok(market) => Ok(market),
                Err(ApiError::RateLimit) => {
                    log::warn!("Rate limit hit fetching market state. Retrying...");
                    Err(anyhow!("Rate limit hit"))
                }
                Err(ApiError::Other(e)) => Err(e),
            }
        })
        .await
    }

    async fn fetch_debt_index_with_retry(&self) -> Result<U256> {
        let retry_strategy = ExponentialBackoff::from_millis(BASE_DELAY)
            .max_delay(Duration::from_millis(MAX_DELAY))
            .map(jitter)
            .take(MAX_RETRIES as usize);

        Retry::spawn(retry_strategy, || async {
            match self.market_api.fetch_debt_index().await {
                Ok(index) => Ok(index),
                Err(ApiError::RateLimit) => {
                    log::warn!("Rate limit hit fetching debt index. Retrying...");
                    Err(anyhow!("Rate limit hit"))
                }
                Err(ApiError::Other(e)) => Err(e),
            }
        })
        .await
    }
}
