//! Price oracle abstractions and the USD conversion used by the ledger.

use crate::core::units::{self, Fixed};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

/// One round reported by an aggregator feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundData {
    pub round_id: u128,
    pub answer: i128,
    pub started_at: i64,
    pub updated_at: i64,
    pub answered_in_round: u128,
}

/// Source of native/USD price rounds.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn latest_round_data(&self) -> Result<RoundData>;
    async fn decimals(&self) -> Result<u8>;
    async fn description(&self) -> Result<String>;
    async fn version(&self) -> Result<u64>;
}

/// A validated price: USD per native unit.
pub type Price = units::Fixed;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("price feed unavailable: {0}")]
    Unavailable(String),
    #[error("price feed returned a non-positive answer: {0}")]
    InvalidAnswer(i128),
    #[error("price feed reports {0} decimals, more than a 128-bit value can hold")]
    InvalidDecimals(u8),
    #[error("price feed round {0} is incomplete")]
    IncompleteRound(u128),
    #[error("price feed answer is stale: updated {age_secs}s ago, limit {max_age_secs}s")]
    Stale { age_secs: i64, max_age_secs: i64 },
    #[error("USD conversion overflowed")]
    Overflow,
}

/// Wraps a [`PriceFeed`] and validates what it reports.
#[derive(Clone)]
pub struct PriceOracle {
    feed: Arc<dyn PriceFeed>,
    max_age: Option<Duration>,
}

impl PriceOracle {
    pub fn new(feed: Arc<dyn PriceFeed>) -> Self {
        Self {
            feed,
            max_age: None,
        }
    }

    /// Rejects rounds whose `updated_at` is older than `max_age`.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn feed(&self) -> &Arc<dyn PriceFeed> {
        &self.feed
    }

    /// Returns the latest price and its decimal precision.
    #[instrument(name = "OracleGetPrice", skip(self))]
    pub async fn get_price(&self) -> Result<Price, OracleError> {
        let round = self
            .feed
            .latest_round_data()
            .await
            .map_err(|e| OracleError::Unavailable(format!("{e:#}")))?;
        let decimals = self
            .feed
            .decimals()
            .await
            .map_err(|e| OracleError::Unavailable(format!("{e:#}")))?;

        if units::pow10(decimals).is_none() {
            return Err(OracleError::InvalidDecimals(decimals));
        }
        if round.answer <= 0 {
            return Err(OracleError::InvalidAnswer(round.answer));
        }
        if round.updated_at == 0 {
            return Err(OracleError::IncompleteRound(round.round_id));
        }
        if let Some(max_age) = self.max_age {
            let age = Utc::now().timestamp() - round.updated_at;
            if age > max_age.num_seconds() {
                return Err(OracleError::Stale {
                    age_secs: age,
                    max_age_secs: max_age.num_seconds(),
                });
            }
        }

        let price = Price {
            value: round.answer as u128,
            decimals,
        };
        debug!(round_id = round.round_id, %price, "Fetched price");
        Ok(price)
    }

    /// Converts a native amount to USD at the current price.
    ///
    /// The result has the precision of the price (`Price::decimals`).
    pub async fn to_usd(&self, amount: u128, native_decimals: u8) -> Result<Fixed, OracleError> {
        let price = self.get_price().await?;
        let value =
            units::convert(amount, native_decimals, price.value).ok_or(OracleError::Overflow)?;
        Ok(Fixed {
            value,
            decimals: price.decimals,
        })
    }
}
