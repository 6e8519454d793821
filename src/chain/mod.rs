//! An in-process host for the ledger and its price feed.
//!
//! Plays the part of the execution environment: it keeps native balances for
//! a set of local signers, deploys contracts by name, and serialises every
//! transaction so that no two of them interleave.

pub mod accounts;
pub mod bank;

use crate::core::config::AppConfig;
use crate::core::ledger::LedgerState;
use crate::core::units::parse_ether;
use crate::core::{
    Address, Deployment, DeploymentRegistry, FundingLedger, MemoryRegistry, PriceFeed, PriceOracle,
};
use crate::providers::mock_aggregator::AggregatorState;
use crate::providers::{MockV3Aggregator, RpcPriceFeed};
use anyhow::{Context, Result, bail};
use bank::LocalBank;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

pub const FUND_ME: &str = "FundMe";
pub const MOCK_V3_AGGREGATOR: &str = "MockV3Aggregator";

/// Everything needed to bring a [`LocalChain`] back after a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub network: String,
    pub accounts: Vec<Address>,
    pub balances: BTreeMap<Address, u128>,
    pub nonces: BTreeMap<Address, u64>,
    pub deployments: BTreeMap<String, Deployment>,
    pub aggregators: BTreeMap<Address, AggregatorState>,
    pub ledgers: BTreeMap<Address, LedgerRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub owner: Address,
    pub price_feed: Address,
    pub minimum_usd: u128,
    pub state: LedgerState,
}

pub struct LocalChain {
    network: String,
    config: AppConfig,
    accounts: Vec<Address>,
    bank: Arc<LocalBank>,
    registry: MemoryRegistry,
    nonces: Mutex<BTreeMap<Address, u64>>,
    aggregators: RwLock<BTreeMap<Address, Arc<MockV3Aggregator>>>,
    ledgers: RwLock<BTreeMap<Address, Arc<FundingLedger>>>,
    tx_lock: tokio::sync::Mutex<()>,
}

impl LocalChain {
    /// Starts a fresh chain with `config.accounts.count` funded signers.
    pub async fn new(config: &AppConfig, network: &str) -> Result<Self> {
        config.network_config(network)?;
        let balance = parse_ether(&config.accounts.balance)
            .with_context(|| format!("Invalid account balance: {}", config.accounts.balance))?;

        let accounts: Vec<Address> = (0..config.accounts.count)
            .map(accounts::account_address)
            .collect();
        let bank = LocalBank::new();
        for account in &accounts {
            bank.mint(account, balance).await?;
        }
        info!(network, accounts = accounts.len(), "Started local chain");

        Ok(Self::assemble(config, network, accounts, bank))
    }

    /// Rebuilds a chain from a snapshot taken by [`LocalChain::snapshot`].
    pub fn restore(config: &AppConfig, snapshot: ChainSnapshot) -> Result<Self> {
        let chain = Self::assemble(
            config,
            &snapshot.network,
            snapshot.accounts,
            LocalBank::from_balances(snapshot.balances),
        );
        *chain.nonces.lock().unwrap() = snapshot.nonces;
        for (name, deployment) in snapshot.deployments {
            chain.registry.save(&name, deployment);
        }
        for (address, state) in snapshot.aggregators {
            chain
                .aggregators
                .write()
                .unwrap()
                .insert(address, Arc::new(MockV3Aggregator::from_state(state)));
        }
        for (address, record) in snapshot.ledgers {
            let ledger = chain
                .build_ledger(address.clone(), record.owner, record.price_feed)?
                .with_minimum_usd(record.minimum_usd)
                .with_state(record.state);
            chain
                .ledgers
                .write()
                .unwrap()
                .insert(address, Arc::new(ledger));
        }
        debug!(network = %chain.network, "Restored local chain");
        Ok(chain)
    }

    fn assemble(config: &AppConfig, network: &str, accounts: Vec<Address>, bank: LocalBank) -> Self {
        Self {
            network: network.to_string(),
            config: config.clone(),
            accounts,
            bank: Arc::new(bank),
            registry: MemoryRegistry::new(),
            nonces: Mutex::new(BTreeMap::new()),
            aggregators: RwLock::new(BTreeMap::new()),
            ledgers: RwLock::new(BTreeMap::new()),
            tx_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn snapshot(&self) -> ChainSnapshot {
        let aggregators: Vec<_> = self
            .aggregators
            .read()
            .unwrap()
            .iter()
            .map(|(address, mock)| (address.clone(), mock.clone()))
            .collect();
        let ledgers: Vec<_> = self.ledgers.read().unwrap().values().cloned().collect();
        let nonces = self.nonces.lock().unwrap().clone();

        let mut snapshot = ChainSnapshot {
            network: self.network.clone(),
            accounts: self.accounts.clone(),
            balances: self.bank.balances().await,
            nonces,
            deployments: self.registry.all(),
            ..Default::default()
        };
        for (address, mock) in aggregators {
            snapshot.aggregators.insert(address, mock.state().await);
        }
        for ledger in ledgers {
            snapshot.ledgers.insert(
                ledger.address().clone(),
                LedgerRecord {
                    owner: ledger.get_owner().clone(),
                    price_feed: ledger.get_price_feed().clone(),
                    minimum_usd: ledger.minimum_usd(),
                    state: ledger.snapshot().await,
                },
            );
        }
        snapshot
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_development_chain(&self) -> bool {
        self.config.is_development_chain(&self.network)
    }

    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    pub fn registry(&self) -> &dyn DeploymentRegistry {
        &self.registry
    }

    pub fn named_account(&self, name: &str) -> Result<Address> {
        let index = self
            .config
            .named_account(name)
            .with_context(|| format!("Unknown named account: {name}"))?;
        self.account(index)
    }

    pub fn account(&self, index: usize) -> Result<Address> {
        self.accounts.get(index).cloned().with_context(|| {
            format!(
                "Account index {} out of range ({} accounts)",
                index,
                self.accounts.len()
            )
        })
    }

    /// Resolves a named account, an account index, or a literal address.
    pub fn resolve_account(&self, account: &str) -> Result<Address> {
        if account.starts_with("0x") {
            let address = account.to_lowercase();
            if !self.accounts.contains(&address) {
                bail!("Address {account} is not a local account");
            }
            return Ok(address);
        }
        if let Ok(index) = account.parse::<usize>() {
            return self.account(index);
        }
        self.named_account(account)
    }

    pub async fn balance_of(&self, address: &Address) -> u128 {
        self.bank.balance_of(address).await
    }

    fn next_contract_address(&self, deployer: &Address) -> Result<Address> {
        if !self.accounts.contains(deployer) {
            bail!("Deployer {deployer} is not a local account");
        }
        let mut nonces = self.nonces.lock().unwrap();
        let nonce = nonces.entry(deployer.clone()).or_default();
        let address = accounts::contract_address(deployer, *nonce);
        *nonce += 1;
        Ok(address)
    }

    pub async fn deploy_mock_aggregator(
        &self,
        name: &str,
        from: &Address,
        decimals: u8,
        initial_answer: i128,
    ) -> Result<Deployment> {
        let _tx = self.tx_lock.lock().await;
        let address = self.next_contract_address(from)?;
        let mock = MockV3Aggregator::new(decimals, initial_answer).await;
        self.aggregators
            .write()
            .unwrap()
            .insert(address.clone(), Arc::new(mock));

        let deployment = Deployment {
            contract: MOCK_V3_AGGREGATOR.to_string(),
            address,
            deployer: from.clone(),
            args: vec![decimals.to_string(), initial_answer.to_string()],
        };
        self.registry.save(name, deployment.clone());
        info!(name, address = %deployment.address, "Deployed mock price feed");
        Ok(deployment)
    }

    pub async fn deploy_fund_me(
        &self,
        name: &str,
        from: &Address,
        price_feed: &Address,
    ) -> Result<Deployment> {
        let _tx = self.tx_lock.lock().await;
        let address = self.next_contract_address(from)?;
        let ledger = self
            .build_ledger(address.clone(), from.clone(), price_feed.clone())?
            .with_minimum_usd(self.config.funding.minimum_usd);
        self.ledgers
            .write()
            .unwrap()
            .insert(address.clone(), Arc::new(ledger));

        let deployment = Deployment {
            contract: FUND_ME.to_string(),
            address,
            deployer: from.clone(),
            args: vec![price_feed.clone()],
        };
        self.registry.save(name, deployment.clone());
        info!(name, address = %deployment.address, %price_feed, "Deployed funding ledger");
        Ok(deployment)
    }

    fn build_ledger(&self, address: Address, owner: Address, price_feed: Address) -> Result<FundingLedger> {
        let mut oracle = PriceOracle::new(self.resolve_feed(&price_feed)?);
        if let Some(secs) = self.config.funding.max_price_age_secs {
            oracle = oracle.with_max_age(Duration::seconds(secs));
        }
        Ok(FundingLedger::new(
            address,
            owner,
            price_feed,
            oracle,
            self.bank.clone(),
        ))
    }

    /// A locally deployed mock at `address`, or the live feed over RPC.
    fn resolve_feed(&self, address: &Address) -> Result<Arc<dyn PriceFeed>> {
        if let Some(mock) = self.aggregators.read().unwrap().get(address) {
            return Ok(mock.clone());
        }
        let network = self.config.network_config(&self.network)?;
        let rpc_url = network.rpc_url.as_deref().with_context(|| {
            format!(
                "No price feed deployed at {} and network {} has no rpc_url",
                address, self.network
            )
        })?;
        let feed = RpcPriceFeed::new(rpc_url, address)?.with_retry_policy(self.config.rpc);
        Ok(Arc::new(feed))
    }

    /// The most recent ledger deployed under `name`.
    pub fn fund_me(&self, name: &str) -> Result<Arc<FundingLedger>> {
        let deployment = self.registry.require(name)?;
        self.ledgers
            .read()
            .unwrap()
            .get(&deployment.address)
            .cloned()
            .with_context(|| format!("{} at {} is not a FundMe contract", name, deployment.address))
    }

    /// The most recent mock feed deployed under `name`.
    pub fn mock_aggregator(&self, name: &str) -> Result<Arc<MockV3Aggregator>> {
        let deployment = self.registry.require(name)?;
        self.aggregators
            .read()
            .unwrap()
            .get(&deployment.address)
            .cloned()
            .with_context(|| {
                format!(
                    "{} at {} is not a MockV3Aggregator contract",
                    name, deployment.address
                )
            })
    }

    /// Sends `amount` from `from` into the ledger and records the contribution.
    ///
    /// A rejected contribution is refunded before the error is returned.
    pub async fn fund(&self, ledger: &FundingLedger, from: &Address, amount: u128) -> Result<()> {
        let _tx = self.tx_lock.lock().await;
        self.bank.send(from, ledger.address(), amount).await?;
        if let Err(e) = ledger.fund(from, amount).await {
            self.bank.send(ledger.address(), from, amount).await?;
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn withdraw(&self, ledger: &FundingLedger, from: &Address) -> Result<u128> {
        let _tx = self.tx_lock.lock().await;
        Ok(ledger.withdraw(from).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FundError;
    use crate::core::config::{DECIMALS, INITIAL_ANSWER};

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.accounts.count = 3;
        config.accounts.balance = "100".to_string();
        config
    }

    async fn chain_with_fund_me() -> (LocalChain, Arc<FundingLedger>) {
        let chain = LocalChain::new(&test_config(), "hardhat").await.unwrap();
        let deployer = chain.named_account("deployer").unwrap();
        let mock = chain
            .deploy_mock_aggregator(MOCK_V3_AGGREGATOR, &deployer, DECIMALS, INITIAL_ANSWER)
            .await
            .unwrap();
        chain
            .deploy_fund_me(FUND_ME, &deployer, &mock.address)
            .await
            .unwrap();
        let ledger = chain.fund_me(FUND_ME).unwrap();
        (chain, ledger)
    }

    #[tokio::test]
    async fn test_accounts_are_funded() {
        let chain = LocalChain::new(&test_config(), "hardhat").await.unwrap();
        assert_eq!(chain.accounts().len(), 3);
        for account in chain.accounts() {
            assert_eq!(chain.balance_of(account).await, parse_ether("100").unwrap());
        }
        assert_eq!(
            chain.named_account("deployer").unwrap(),
            chain.accounts()[0]
        );
    }

    #[tokio::test]
    async fn test_unknown_network_is_rejected() {
        assert!(LocalChain::new(&test_config(), "nowhere").await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_account() {
        let chain = LocalChain::new(&test_config(), "hardhat").await.unwrap();
        let second = chain.accounts()[1].clone();
        assert_eq!(chain.resolve_account("1").unwrap(), second);
        assert_eq!(chain.resolve_account(&second.to_uppercase().replacen("0X", "0x", 1)).unwrap(), second);
        assert_eq!(chain.resolve_account("deployer").unwrap(), chain.accounts()[0]);
        assert!(chain.resolve_account("7").is_err());
        assert!(chain.resolve_account("0xdeadbeef").is_err());
        assert!(chain.resolve_account("nobody").is_err());
    }

    #[tokio::test]
    async fn test_fund_moves_native_balance() {
        let (chain, ledger) = chain_with_fund_me().await;
        let funder = chain.account(1).unwrap();
        let one = parse_ether("1").unwrap();

        chain.fund(&ledger, &funder, one).await.unwrap();

        assert_eq!(chain.balance_of(&funder).await, parse_ether("99").unwrap());
        assert_eq!(chain.balance_of(ledger.address()).await, one);
        assert_eq!(ledger.get_balance(&funder).await, one);
    }

    #[tokio::test]
    async fn test_rejected_fund_is_refunded() {
        let (chain, ledger) = chain_with_fund_me().await;
        let funder = chain.account(1).unwrap();

        let err = chain
            .fund(&ledger, &funder, parse_ether("0.01").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FundError>(),
            Some(FundError::InsufficientValue { .. })
        ));
        assert_eq!(chain.balance_of(&funder).await, parse_ether("100").unwrap());
        assert_eq!(chain.balance_of(ledger.address()).await, 0);
    }

    #[tokio::test]
    async fn test_fund_more_than_balance() {
        let (chain, ledger) = chain_with_fund_me().await;
        let funder = chain.account(1).unwrap();
        let result = chain
            .fund(&ledger, &funder, parse_ether("101").unwrap())
            .await;
        assert!(result.is_err());
        assert_eq!(ledger.funders_count().await, 0);
    }

    #[tokio::test]
    async fn test_fund_me_records_feed_and_owner() {
        let (chain, ledger) = chain_with_fund_me().await;
        let mock = chain.registry().require(MOCK_V3_AGGREGATOR).unwrap();
        assert_eq!(ledger.get_price_feed(), &mock.address);
        assert_eq!(ledger.get_owner(), &chain.accounts()[0]);
        assert_ne!(ledger.address(), &mock.address);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_keeps_balances() {
        let (chain, ledger) = chain_with_fund_me().await;
        let funder = chain.account(2).unwrap();
        chain
            .fund(&ledger, &funder, parse_ether("2").unwrap())
            .await
            .unwrap();
        chain
            .mock_aggregator(MOCK_V3_AGGREGATOR)
            .unwrap()
            .update_answer(300_000_000_000)
            .await;

        let snapshot = chain.snapshot().await;
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored =
            LocalChain::restore(&test_config(), serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(restored.snapshot().await, snapshot);
        let ledger = restored.fund_me(FUND_ME).unwrap();
        assert_eq!(ledger.get_balance(&funder).await, parse_ether("2").unwrap());
        assert_eq!(ledger.oracle().get_price().await.unwrap().to_string(), "3000");
    }

    #[tokio::test]
    async fn test_live_feed_requires_rpc_url() {
        let chain = LocalChain::new(&test_config(), "hardhat").await.unwrap();
        let deployer = chain.named_account("deployer").unwrap();
        let result = chain
            .deploy_fund_me(FUND_ME, &deployer, &"0xnotdeployed".to_string())
            .await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("has no rpc_url")
        );
    }
}
