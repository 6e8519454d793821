//! Tagged deploy scripts, run in order against a [`LocalChain`].

pub mod fund_me;
pub mod mocks;

use crate::chain::LocalChain;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

#[async_trait]
pub trait DeployScript: Send + Sync {
    fn name(&self) -> &'static str;

    fn tags(&self) -> &'static [&'static str];

    async fn run(&self, chain: &LocalChain) -> Result<()>;
}

/// All scripts, in the order they must run.
pub fn scripts() -> Vec<Box<dyn DeployScript>> {
    vec![Box::new(mocks::DeployMocks), Box::new(fund_me::DeployFundMe)]
}

/// Runs every script carrying at least one of `tags`. Returns the names run.
pub async fn fixture(chain: &LocalChain, tags: &[&str]) -> Result<Vec<&'static str>> {
    let mut ran = Vec::new();
    for script in scripts() {
        if !script.tags().iter().any(|tag| tags.contains(tag)) {
            debug!(script = script.name(), "Skipping script, no matching tag");
            continue;
        }
        info!(script = script.name(), network = chain.network(), "Running deploy script");
        script
            .run(chain)
            .await
            .with_context(|| format!("Deploy script {} failed", script.name()))?;
        ran.push(script.name());
    }
    Ok(ran)
}
