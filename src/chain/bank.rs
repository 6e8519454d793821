use crate::core::{Address, FundsTransfer};
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BankError {
    #[error("insufficient balance in {account}: has {available}, needs {required}")]
    InsufficientBalance {
        account: Address,
        available: u128,
        required: u128,
    },
    #[error("balance of {account} would overflow")]
    Overflow { account: Address },
}

/// Native balances of every account and contract on the local chain.
#[derive(Default)]
pub struct LocalBank {
    balances: Mutex<BTreeMap<Address, u128>>,
}

impl LocalBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_balances(balances: BTreeMap<Address, u128>) -> Self {
        Self {
            balances: Mutex::new(balances),
        }
    }

    pub async fn balance_of(&self, account: &Address) -> u128 {
        self.balances
            .lock()
            .await
            .get(account)
            .copied()
            .unwrap_or(0)
    }

    pub async fn balances(&self) -> BTreeMap<Address, u128> {
        self.balances.lock().await.clone()
    }

    /// Credits `amount` out of thin air. Only used to seed accounts.
    pub async fn mint(&self, account: &Address, amount: u128) -> Result<(), BankError> {
        let mut balances = self.balances.lock().await;
        let balance = balances.entry(account.clone()).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| BankError::Overflow {
                account: account.clone(),
            })?;
        Ok(())
    }

    /// Moves `amount` from `from` to `to`; either both sides change or neither.
    pub async fn send(&self, from: &Address, to: &Address, amount: u128) -> Result<(), BankError> {
        let mut balances = self.balances.lock().await;
        let available = balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(BankError::InsufficientBalance {
                account: from.clone(),
                available,
                required: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let target = balances.get(to).copied().unwrap_or(0);
        let credited = target
            .checked_add(amount)
            .ok_or_else(|| BankError::Overflow { account: to.clone() })?;

        balances.insert(from.clone(), available - amount);
        balances.insert(to.clone(), credited);
        debug!(%from, %to, amount, "Moved native funds");
        Ok(())
    }
}

#[async_trait]
impl FundsTransfer for LocalBank {
    async fn transfer(&self, from: &Address, to: &Address, amount: u128) -> anyhow::Result<()> {
        Ok(self.send(from, to, amount).await?)
    }
}
