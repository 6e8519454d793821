//! Named deployments: "deploy by name, fetch the most recent by name".

use crate::core::Address;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub contract: String,
    pub address: Address,
    pub deployer: Address,
    pub args: Vec<String>,
}

pub trait DeploymentRegistry: Send + Sync {
    /// Records `deployment` under `name`, replacing any earlier one.
    fn save(&self, name: &str, deployment: Deployment);

    fn get(&self, name: &str) -> Option<Deployment>;

    fn all(&self) -> BTreeMap<String, Deployment>;

    fn require(&self, name: &str) -> Result<Deployment> {
        self.get(name)
            .ok_or_else(|| anyhow!("No deployment found for: {}", name))
    }
}

#[derive(Default)]
pub struct MemoryRegistry {
    deployments: RwLock<BTreeMap<String, Deployment>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeploymentRegistry for MemoryRegistry {
    fn save(&self, name: &str, deployment: Deployment) {
        debug!(name, address = %deployment.address, "Saving deployment");
        let mut deployments = self.deployments.write().unwrap();
        deployments.insert(name.to_string(), deployment);
    }

    fn get(&self, name: &str) -> Option<Deployment> {
        let deployments = self.deployments.read().unwrap();
        deployments.get(name).cloned()
    }

    fn all(&self) -> BTreeMap<String, Deployment> {
        self.deployments.read().unwrap().clone()
    }
}
