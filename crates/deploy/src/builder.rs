//! Builder module for creating a [`Deployer`] from the loaded configuration.
//!
//! The builder expands the selected network profile and pins a fork to a concrete block, so
//! every node started by the same [`Deployer`] forks from the same state.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
    Deployer,
    config::{MarginxConfig, Network, NetworkKind},
    rpc::{create_client, json_rpc_call},
};

/// Block header information from an RPC response.
#[derive(Debug, Deserialize)]
struct BlockInfo {
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    number: u64,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    timestamp: u64,
}

/// Deserialize a u64 from a hex string (with 0x prefix).
fn deserialize_u64_from_hex<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(serde::de::Error::custom)
}

/// Fetches the latest block from an Ethereum RPC endpoint.
async fn fetch_latest_block(rpc_url: &str) -> Result<BlockInfo> {
    let client = create_client()?;
    json_rpc_call(
        &client,
        rpc_url,
        "eth_getBlockByNumber",
        vec![serde_json::json!("latest"), serde_json::json!(false)],
    )
    .await
    .context("Failed to fetch the latest block")
}

/// Builder for creating a [`Deployer`].
#[derive(Debug, Clone)]
pub struct DeployerBuilder {
    config: MarginxConfig,
    /// Fetch the fork head when the profile names no fork block.
    pin_fork: bool,
}

impl DeployerBuilder {
    pub fn new(config: MarginxConfig) -> Self {
        Self {
            config,
            pin_fork: true,
        }
    }

    /// Whether to resolve an unpinned fork to the current head of the forked chain.
    ///
    /// When disabled, anvil forks from whatever block is latest when it starts.
    pub fn pin_fork(mut self, pin_fork: bool) -> Self {
        self.pin_fork = pin_fork;
        self
    }

    pub fn config(&self) -> &MarginxConfig {
        &self.config
    }

    /// Build the [`Deployer`].
    pub async fn build(self) -> Result<Deployer> {
        let network = self.config.selected_network()?;
        let network = if self.pin_fork {
            pin_fork(network).await?
        } else {
            network
        };

        tracing::info!(
            network = %network.name,
            topology = %self.config.topology,
            artifacts = %self.config.artifacts.display(),
            deployments = %self.config.deployments.display(),
            "Building deployer configuration..."
        );

        Ok(Deployer {
            network,
            artifacts: self.config.artifacts,
            deployments: self.config.deployments,
            topology: self.config.topology,
            confirmations: self.config.confirmations,
            node: self.config.node,
            fixture_seed: self.config.fixture.seed,
        })
    }
}

async fn pin_fork(mut network: Network) -> Result<Network> {
    let NetworkKind::Local {
        fork: Some(fork), ..
    } = &mut network.kind
    else {
        return Ok(network);
    };
    if fork.block_number.is_some() {
        return Ok(network);
    }

    let block = fetch_latest_block(&fork.url)
        .await
        .with_context(|| format!("Failed to pin the fork of network '{}'", network.name))?;
    tracing::info!(
        network = %network.name,
        block_number = block.number,
        block_timestamp = block.timestamp,
        "Pinned fork to the latest block"
    );
    fork.block_number = Some(block.number);

    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_LOCAL_CHAIN_ID, ForkConfig};

    #[test]
    fn test_block_info_from_hex() {
        let block: BlockInfo = serde_json::from_value(serde_json::json!({
            "number": "0xbc614e",
            "timestamp": "0x60b9c0d0",
            "hash": "0x00"
        }))
        .unwrap();
        assert_eq!(block.number, 12_345_678);
        assert_eq!(block.timestamp, 0x60b9c0d0);
    }

    #[tokio::test]
    async fn test_pin_fork_leaves_pinned_and_unforked_networks() {
        let pinned = Network {
            name: "hardhat".to_string(),
            kind: NetworkKind::Local {
                chain_id: 1,
                fork: Some(ForkConfig {
                    url: "http://127.0.0.1:1".to_string(),
                    block_number: Some(42),
                }),
            },
            mnemonic: String::new(),
        };
        assert_eq!(pin_fork(pinned.clone()).await.unwrap(), pinned);

        let local = Network {
            name: "anvil".to_string(),
            kind: NetworkKind::Local {
                chain_id: DEFAULT_LOCAL_CHAIN_ID,
                fork: None,
            },
            mnemonic: String::new(),
        };
        assert_eq!(pin_fork(local.clone()).await.unwrap(), local);
    }

    #[tokio::test]
    async fn test_build_without_fork() {
        let config = MarginxConfig {
            network: "anvil".to_string(),
            ..Default::default()
        };
        let deployer = DeployerBuilder::new(config).build().await.unwrap();

        assert_eq!(deployer.network.name, "anvil");
        assert!(matches!(
            deployer.network.kind,
            NetworkKind::Local { fork: None, .. }
        ));
        assert_eq!(deployer.fixture_seed.len(), 8);
    }
}
