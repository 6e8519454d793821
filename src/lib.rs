pub mod chain;
pub mod cli;
pub mod core;
pub mod deploy;
pub mod providers;
pub mod store;

use crate::chain::LocalChain;
use crate::core::config::AppConfig;
use crate::store::KeyValueStore;
use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    Accounts,
    Deploy { tags: Vec<String>, reset: bool },
    Fund { from: String, amount: String },
    Withdraw { from: String },
    Balance { account: Option<String> },
    Funders,
    Price,
    SetPrice { answer: i128 },
    Info,
}

fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");
    Ok(config)
}

/// Loads the chain for `network`, runs `command` against it and saves the result.
pub async fn run_command(
    command: AppCommand,
    config_path: Option<&str>,
    network: Option<&str>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let network = network.unwrap_or(&config.network).to_string();
    let store = KeyValueStore::open(config.data_path()?)?;

    if matches!(command, AppCommand::Deploy { reset: true, .. }) {
        info!(%network, "Discarding saved chain state");
        store.reset_chain(&network)?;
    }
    let chain = match store.load_chain(&network)? {
        Some(snapshot) => LocalChain::restore(&config, snapshot)?,
        None => {
            info!(%network, "Starting a fresh local chain");
            LocalChain::new(&config, &network).await?
        }
    };

    let result = match command {
        AppCommand::Accounts => cli::accounts::run(&chain).await,
        AppCommand::Deploy { tags, .. } => cli::deploy::run(&chain, &tags).await,
        AppCommand::Fund { from, amount } => cli::fund::fund(&chain, &from, &amount).await,
        AppCommand::Withdraw { from } => cli::fund::withdraw(&chain, &from).await,
        AppCommand::Balance { account } => cli::query::balance(&chain, account.as_deref()).await,
        AppCommand::Funders => cli::query::funders(&chain).await,
        AppCommand::Price => cli::query::price(&chain).await,
        AppCommand::SetPrice { answer } => cli::query::set_price(&chain, answer).await,
        AppCommand::Info => cli::query::info(&chain).await,
    };

    // Failed transactions leave no trace, so state is saved either way.
    store.save_chain(&chain.snapshot().await)?;
    result
}
