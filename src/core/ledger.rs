//! The crowdfunding ledger.
//!
//! Contributions are accepted when their USD value, computed through the
//! [`PriceOracle`] at call time, reaches the configured minimum. Only the
//! owner may withdraw, and a withdrawal always sweeps the whole balance.
//!
//! Every mutating operation runs under the ledger's write lock from start to
//! finish, including the oracle query and the outgoing transfer.

use crate::core::Address;
use crate::core::oracle::{OracleError, PriceOracle};
use crate::core::units::{self, Fixed, NATIVE_DECIMALS};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Minimum contribution in whole US dollars.
pub const MINIMUM_USD: u128 = 50;

/// Moves native funds out of the ledger's account.
#[async_trait]
pub trait FundsTransfer: Send + Sync {
    async fn transfer(&self, from: &Address, to: &Address, amount: u128) -> anyhow::Result<()>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FundError {
    #[error("contribution must be greater than zero")]
    ZeroAmount,
    #[error("contribution worth {usd_value} USD is below the {minimum_usd} USD minimum")]
    InsufficientValue { usd_value: Fixed, minimum_usd: u128 },
    #[error(transparent)]
    OracleUnavailable(OracleError),
    #[error("contribution overflows the ledger balance")]
    Overflow,
}

impl From<OracleError> for FundError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Overflow => FundError::Overflow,
            other => FundError::OracleUnavailable(other),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WithdrawError {
    #[error("{caller} is not the owner")]
    NotOwner { caller: Address },
    #[error("transfer to owner failed: {0}")]
    TransferFailed(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("funder index {index} out of range ({count} funders)")]
    IndexOutOfRange { index: usize, count: usize },
}

/// Balances and funders of a ledger.
///
/// `held` always equals the sum of `balances`, and `funders` lists each key of
/// `balances` exactly once in first-contribution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub balances: BTreeMap<Address, u128>,
    pub funders: Vec<Address>,
    pub held: u128,
}

pub struct FundingLedger {
    address: Address,
    owner: Address,
    price_feed: Address,
    minimum_usd: u128,
    oracle: PriceOracle,
    transfer: Arc<dyn FundsTransfer>,
    state: RwLock<LedgerState>,
}

impl FundingLedger {
    /// Creates an empty ledger at `address` owned by `owner`.
    ///
    /// `price_feed` is the address `oracle` reads from; it is reported back by
    /// [`FundingLedger::get_price_feed`].
    pub fn new(
        address: Address,
        owner: Address,
        price_feed: Address,
        oracle: PriceOracle,
        transfer: Arc<dyn FundsTransfer>,
    ) -> Self {
        Self {
            address,
            owner,
            price_feed,
            minimum_usd: MINIMUM_USD,
            oracle,
            transfer,
            state: RwLock::new(LedgerState::default()),
        }
    }

    pub fn with_minimum_usd(mut self, minimum_usd: u128) -> Self {
        self.minimum_usd = minimum_usd;
        self
    }

    /// Restores previously persisted balances.
    pub fn with_state(mut self, state: LedgerState) -> Self {
        self.state = RwLock::new(state);
        self
    }

    #[instrument(name = "LedgerFund", skip(self), fields(ledger = %self.address))]
    pub async fn fund(&self, caller: &Address, amount: u128) -> Result<(), FundError> {
        if amount == 0 {
            return Err(FundError::ZeroAmount);
        }

        let mut state = self.state.write().await;

        let usd_value = self.oracle.to_usd(amount, NATIVE_DECIMALS).await?;
        let minimum = units::pow10(usd_value.decimals)
            .and_then(|unit| unit.checked_mul(self.minimum_usd))
            .ok_or(FundError::Overflow)?;
        if usd_value.value < minimum {
            debug!(%usd_value, "Rejected contribution below minimum");
            return Err(FundError::InsufficientValue {
                usd_value,
                minimum_usd: self.minimum_usd,
            });
        }

        let previous = state.balances.get(caller).copied().unwrap_or(0);
        let balance = previous.checked_add(amount).ok_or(FundError::Overflow)?;
        let held = state.held.checked_add(amount).ok_or(FundError::Overflow)?;

        state.balances.insert(caller.clone(), balance);
        state.held = held;
        if previous == 0 && !state.funders.contains(caller) {
            state.funders.push(caller.clone());
        }

        info!(%caller, amount, %usd_value, "Accepted contribution");
        Ok(())
    }

    /// Sends everything the ledger holds to the owner and clears all records.
    ///
    /// Records are taken out of the ledger before the transfer is made. If the
    /// transfer fails they are put back, so a failed call leaves no trace.
    #[instrument(name = "LedgerWithdraw", skip(self), fields(ledger = %self.address))]
    pub async fn withdraw(&self, caller: &Address) -> Result<u128, WithdrawError> {
        if *caller != self.owner {
            warn!(%caller, "Withdrawal attempted by non-owner");
            return Err(WithdrawError::NotOwner {
                caller: caller.clone(),
            });
        }

        let mut state = self.state.write().await;
        let staged = std::mem::take(&mut *state);
        let amount = staged.held;

        if amount > 0 {
            if let Err(e) = self
                .transfer
                .transfer(&self.address, &self.owner, amount)
                .await
            {
                *state = staged;
                warn!(error = %e, "Withdrawal transfer failed");
                return Err(WithdrawError::TransferFailed(format!("{e:#}")));
            }
        }

        info!(amount, funders = staged.funders.len(), "Withdrew all funds");
        Ok(amount)
    }

    /// Amount contributed by `funder`; zero if unknown.
    pub async fn get_balance(&self, funder: &Address) -> u128 {
        let state = self.state.read().await;
        state.balances.get(funder).copied().unwrap_or(0)
    }

    pub async fn get_funder(&self, index: usize) -> Result<Address, QueryError> {
        let state = self.state.read().await;
        state
            .funders
            .get(index)
            .cloned()
            .ok_or(QueryError::IndexOutOfRange {
                index,
                count: state.funders.len(),
            })
    }

    pub async fn funders_count(&self) -> usize {
        self.state.read().await.funders.len()
    }

    pub async fn held(&self) -> u128 {
        self.state.read().await.held
    }

    /// A consistent copy of the current balances and funders.
    pub async fn snapshot(&self) -> LedgerState {
        self.state.read().await.clone()
    }

    pub fn get_owner(&self) -> &Address {
        &self.owner
    }

    pub fn get_price_feed(&self) -> &Address {
        &self.price_feed
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn minimum_usd(&self) -> u128 {
        self.minimum_usd
    }

    pub fn oracle(&self) -> &PriceOracle {
        &self.oracle
    }
}
