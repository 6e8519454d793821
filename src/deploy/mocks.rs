use super::DeployScript;
use crate::chain::{LocalChain, MOCK_V3_AGGREGATOR};
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// Deploys a mock ETH/USD feed, on development chains only.
pub struct DeployMocks;

#[async_trait]
impl DeployScript for DeployMocks {
    fn name(&self) -> &'static str {
        "00-deploy-mocks"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["all", "mocks"]
    }

    async fn run(&self, chain: &LocalChain) -> Result<()> {
        if !chain.is_development_chain() {
            info!(network = chain.network(), "Not a development chain, no mocks needed");
            return Ok(());
        }
        info!("Local network detected! Deploying mocks...");
        let deployer = chain.named_account("deployer")?;
        let mocks = &chain.config().mocks;
        chain
            .deploy_mock_aggregator(
                MOCK_V3_AGGREGATOR,
                &deployer,
                mocks.decimals,
                mocks.initial_answer,
            )
            .await?;
        info!("Mocks deployed!");
        Ok(())
    }
}
