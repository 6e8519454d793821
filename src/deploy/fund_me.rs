use super::DeployScript;
use crate::chain::{FUND_ME, LocalChain, MOCK_V3_AGGREGATOR};
use crate::core::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

/// Deploys the funding ledger from the `deployer` account.
pub struct DeployFundMe;

impl DeployFundMe {
    /// The mock feed on development chains, the configured feed elsewhere.
    fn price_feed_address(chain: &LocalChain) -> Result<Address> {
        if chain.is_development_chain() {
            return Ok(chain.registry().require(MOCK_V3_AGGREGATOR)?.address);
        }
        chain
            .config()
            .network_config(chain.network())?
            .eth_usd_price_feed
            .clone()
            .with_context(|| format!("No eth_usd_price_feed configured for {}", chain.network()))
    }
}

#[async_trait]
impl DeployScript for DeployFundMe {
    fn name(&self) -> &'static str {
        "01-deploy-fund-me"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["all", "fundme"]
    }

    async fn run(&self, chain: &LocalChain) -> Result<()> {
        let deployer = chain.named_account("deployer")?;
        let price_feed = Self::price_feed_address(chain)?;
        let deployment = chain.deploy_fund_me(FUND_ME, &deployer, &price_feed).await?;
        info!(address = %deployment.address, "FundMe deployed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AppConfig;

    #[tokio::test]
    async fn test_live_network_uses_configured_feed() {
        let mut config = AppConfig::default();
        config.accounts.count = 1;
        let chain = LocalChain::new(&config, "sepolia").await.unwrap();

        DeployFundMe.run(&chain).await.unwrap();

        let fund_me = chain.fund_me(FUND_ME).unwrap();
        assert_eq!(
            fund_me.get_price_feed(),
            "0x694AA1769357215DE4FAC081bf1f309aDC325306"
        );
        assert_eq!(fund_me.get_owner(), &chain.accounts()[0]);
    }

    #[tokio::test]
    async fn test_live_network_without_feed() {
        let mut config = AppConfig::default();
        config
            .networks
            .get_mut("sepolia")
            .unwrap()
            .eth_usd_price_feed = None;
        let chain = LocalChain::new(&config, "sepolia").await.unwrap();

        let err = DeployFundMe.run(&chain).await.unwrap_err();
        assert!(err.to_string().contains("No eth_usd_price_feed configured"));
    }
}
