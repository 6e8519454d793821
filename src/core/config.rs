use crate::core::ledger::MINIMUM_USD;
use crate::providers::util::RetryPolicy;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fs, path::PathBuf};
use tracing::debug;

/// Decimals reported by the mock price feed on development chains.
pub const DECIMALS: u8 = 8;
/// Initial mock answer: 2000 USD with [`DECIMALS`] decimals.
pub const INITIAL_ANSWER: i128 = 200_000_000_000;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub rpc_url: Option<String>,
    pub eth_usd_price_feed: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct MockConfig {
    pub decimals: u8,
    pub initial_answer: i128,
}

impl Default for MockConfig {
    fn default() -> Self {
        MockConfig {
            decimals: DECIMALS,
            initial_answer: INITIAL_ANSWER,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AccountsConfig {
    pub count: usize,
    /// Starting balance of every account, in native units (e.g. `"10000"`).
    pub balance: String,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        AccountsConfig {
            count: 10,
            balance: "10000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct FundingConfig {
    pub minimum_usd: u128,
    /// Oracle answers older than this are refused.
    pub max_price_age_secs: Option<i64>,
}

impl Default for FundingConfig {
    fn default() -> Self {
        FundingConfig {
            minimum_usd: MINIMUM_USD,
            max_price_age_secs: None,
        }
    }
}

fn default_network() -> String {
    "hardhat".to_string()
}

fn default_development_chains() -> Vec<String> {
    vec!["hardhat".to_string(), "localhost".to_string()]
}

fn default_networks() -> BTreeMap<String, NetworkConfig> {
    BTreeMap::from([
        (
            "hardhat".to_string(),
            NetworkConfig {
                chain_id: 31337,
                rpc_url: None,
                eth_usd_price_feed: None,
            },
        ),
        (
            "localhost".to_string(),
            NetworkConfig {
                chain_id: 31337,
                rpc_url: Some("http://127.0.0.1:8545".to_string()),
                eth_usd_price_feed: None,
            },
        ),
        (
            "sepolia".to_string(),
            NetworkConfig {
                chain_id: 11155111,
                rpc_url: Some("https://ethereum-sepolia-rpc.publicnode.com".to_string()),
                eth_usd_price_feed: Some("0x694AA1769357215DE4FAC081bf1f309aDC325306".to_string()),
            },
        ),
    ])
}

fn default_named_accounts() -> BTreeMap<String, usize> {
    BTreeMap::from([("deployer".to_string(), 0)])
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default = "default_development_chains")]
    pub development_chains: Vec<String>,
    #[serde(default = "default_networks")]
    pub networks: BTreeMap<String, NetworkConfig>,
    #[serde(default)]
    pub mocks: MockConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default = "default_named_accounts")]
    pub named_accounts: BTreeMap<String, usize>,
    #[serde(default)]
    pub funding: FundingConfig,
    #[serde(default)]
    pub rpc: RetryPolicy,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            network: default_network(),
            development_chains: default_development_chains(),
            networks: default_networks(),
            mocks: MockConfig::default(),
            accounts: AccountsConfig::default(),
            named_accounts: default_named_accounts(),
            funding: FundingConfig::default(),
            rpc: RetryPolicy::default(),
            data_path: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "fundme", "fundme")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "fundme", "fundme")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn is_development_chain(&self, network: &str) -> bool {
        self.development_chains.iter().any(|n| n == network)
    }

    pub fn network_config(&self, network: &str) -> Result<&NetworkConfig> {
        self.networks
            .get(network)
            .with_context(|| format!("Unknown network: {network}"))
    }

    pub fn named_account(&self, name: &str) -> Option<usize> {
        self.named_accounts.get(name).copied()
    }
}
