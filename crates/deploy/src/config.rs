//! Layered configuration: built-in defaults, `Marginx.toml`, `MARGINX_*` environment
//! variables, then command-line overrides.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    accounts::DEFAULT_MNEMONIC,
    rpc::ReceiptPolling,
    seed::{SeedAction, default_fixture_seeds},
    targets::Topology,
};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "Marginx.toml";

/// Prefix of the environment variables read into the configuration.
pub const ENV_PREFIX: &str = "MARGINX_";

/// Chain id of a local node that does not fork anything.
pub const DEFAULT_LOCAL_CHAIN_ID: u64 = 31337;

const MAINNET_FORK_URL: &str = "https://eth-mainnet.alchemyapi.io/v2/${ALCHEMY_API_KEY}";
const ROPSTEN_URL: &str = "https://eth-ropsten.alchemyapi.io/v2/${ALCHEMY_API_KEY}";

/// A network profile.
///
/// A profile with a `url` talks to an existing node. A profile without one starts a local
/// node, forking `fork.url` when it is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork: Option<ForkConfig>,
    /// Used to derive the named account addresses. Defaults to the test mnemonic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkConfig {
    pub url: String,
    /// Block to fork from. Falls back to `BLOCK_NUMBER`, then to the latest block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

/// Settings of the local anvil process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub binary: String,
    pub host: String,
    /// `0` picks a free port.
    pub port: u16,
    pub accounts: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_time: Option<u64>,
    pub startup_timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            binary: "anvil".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8545,
            accounts: 10,
            block_time: None,
            startup_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureConfig {
    /// Seed actions run after every target.
    pub seed: Vec<SeedAction>,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            seed: default_fixture_seeds(),
        }
    }
}

/// The complete configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginxConfig {
    /// Name of the selected profile in `networks`.
    pub network: String,
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Directory holding the compiled contract artifacts.
    pub artifacts: PathBuf,
    /// Directory holding one deployment store per network.
    pub deployments: PathBuf,
    pub topology: Topology,
    pub confirmations: ReceiptPolling,
    pub node: NodeConfig,
    pub fixture: FixtureConfig,
}

impl Default for MarginxConfig {
    fn default() -> Self {
        let networks = BTreeMap::from([
            (
                "hardhat".to_string(),
                NetworkConfig {
                    chain_id: Some(1),
                    fork: Some(ForkConfig {
                        url: MAINNET_FORK_URL.to_string(),
                        block_number: None,
                    }),
                    ..Default::default()
                },
            ),
            (
                "anvil".to_string(),
                NetworkConfig {
                    chain_id: Some(DEFAULT_LOCAL_CHAIN_ID),
                    ..Default::default()
                },
            ),
            (
                "localhost".to_string(),
                NetworkConfig {
                    url: Some("http://127.0.0.1:8545".to_string()),
                    ..Default::default()
                },
            ),
            (
                "ropsten".to_string(),
                NetworkConfig {
                    url: Some(ROPSTEN_URL.to_string()),
                    chain_id: Some(3),
                    mnemonic: Some("${MNEMONIC}".to_string()),
                    ..Default::default()
                },
            ),
        ]);

        Self {
            network: "hardhat".to_string(),
            networks,
            artifacts: PathBuf::from("artifacts"),
            deployments: PathBuf::from("deployments"),
            topology: Topology::default(),
            confirmations: ReceiptPolling::default(),
            node: NodeConfig::default(),
            fixture: FixtureConfig::default(),
        }
    }
}

/// Values given on the command line. Unset fields leave the lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology: Option<Topology>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployments: Option<PathBuf>,
}

/// A network profile with its variables expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub name: String,
    pub kind: NetworkKind,
    pub mnemonic: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkKind {
    /// An existing node that manages the sender keys.
    Remote { url: Url, chain_id: Option<u64> },
    /// A node started by this tool.
    Local { chain_id: u64, fork: Option<ForkConfig> },
}

impl MarginxConfig {
    /// The layered configuration sources, lowest precedence first.
    pub fn figment(path: &Path, overrides: &ConfigOverrides) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(overrides))
    }

    pub fn load(path: &Path, overrides: &ConfigOverrides) -> Result<Self> {
        Self::figment(path, overrides)
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))
    }

    /// Render the configuration as it would be written to `Marginx.toml`.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }

    /// The selected network, expanded against the process environment.
    pub fn selected_network(&self) -> Result<Network> {
        self.selected_network_with(|name| std::env::var(name).ok())
    }

    pub fn selected_network_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Network> {
        let config = self.networks.get(&self.network).with_context(|| {
            let known: Vec<&str> = self.networks.keys().map(String::as_str).collect();
            format!(
                "Unknown network '{}', expected one of: {}",
                self.network,
                known.join(", ")
            )
        })?;

        config
            .resolve(&self.network, &lookup)
            .with_context(|| format!("Failed to configure network '{}'", self.network))
    }
}

impl NetworkConfig {
    fn resolve(&self, name: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Result<Network> {
        let mnemonic = match &self.mnemonic {
            Some(mnemonic) => expand_with(mnemonic, lookup)?,
            None => DEFAULT_MNEMONIC.to_string(),
        };

        let kind = match (&self.url, &self.fork) {
            (Some(_), Some(_)) => anyhow::bail!("a network sets either `url` or `fork`, not both"),
            (Some(url), None) => {
                let url = expand_with(url, lookup)?;
                NetworkKind::Remote {
                    url: Url::parse(&url).context("Failed to parse network URL")?,
                    chain_id: self.chain_id,
                }
            }
            (None, fork) => {
                let fork = match fork {
                    Some(fork) => {
                        let block_number = match fork.block_number {
                            Some(number) => Some(number),
                            None => lookup("BLOCK_NUMBER")
                                .map(|value| {
                                    value.trim().parse::<u64>().with_context(|| {
                                        format!("BLOCK_NUMBER '{value}' is not a block number")
                                    })
                                })
                                .transpose()?,
                        };
                        Some(ForkConfig {
                            url: expand_with(&fork.url, lookup)?,
                            block_number,
                        })
                    }
                    None => None,
                };
                NetworkKind::Local {
                    chain_id: self.chain_id.unwrap_or(DEFAULT_LOCAL_CHAIN_ID),
                    fork,
                }
            }
        };

        Ok(Network {
            name: name.to_string(),
            kind,
            mnemonic,
        })
    }
}

/// Replace every `${NAME}` in `input` with `lookup(NAME)`.
pub fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    let mut expanded = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        expanded.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .with_context(|| format!("Unterminated variable in '{input}'"))?;
        let name = &after[..end];
        let value = lookup(name).with_context(|| format!("Environment variable {name} is not set"))?;
        expanded.push_str(&value);
        rest = &after[end + 1..];
    }

    expanded.push_str(rest);
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn test_expand_with() {
        let lookup = env(&[("ALCHEMY_API_KEY", "abc")]);
        assert_eq!(
            expand_with("https://x/v2/${ALCHEMY_API_KEY}", &lookup).unwrap(),
            "https://x/v2/abc"
        );
        assert_eq!(expand_with("plain", &lookup).unwrap(), "plain");

        let err = expand_with("${MISSING}", &lookup).unwrap_err();
        assert!(err.to_string().contains("MISSING is not set"));
        assert!(expand_with("${OPEN", &lookup).is_err());
    }

    #[test]
    fn test_fork_profile_needs_api_key() {
        let config = MarginxConfig::default();
        let err = config.selected_network_with(env(&[])).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("hardhat"), "{message}");
        assert!(message.contains("ALCHEMY_API_KEY"), "{message}");
    }

    #[test]
    fn test_fork_profile_resolution() {
        let config = MarginxConfig::default();
        let network = config
            .selected_network_with(env(&[("ALCHEMY_API_KEY", "key"), ("BLOCK_NUMBER", "12345678")]))
            .unwrap();

        assert_eq!(network.mnemonic, DEFAULT_MNEMONIC);
        assert_eq!(
            network.kind,
            NetworkKind::Local {
                chain_id: 1,
                fork: Some(ForkConfig {
                    url: "https://eth-mainnet.alchemyapi.io/v2/key".to_string(),
                    block_number: Some(12345678),
                }),
            }
        );
    }

    #[test]
    fn test_remote_profile_resolution() {
        let config = MarginxConfig {
            network: "ropsten".to_string(),
            ..Default::default()
        };
        let network = config
            .selected_network_with(env(&[("ALCHEMY_API_KEY", "key"), ("MNEMONIC", "word list")]))
            .unwrap();

        assert_eq!(network.mnemonic, "word list");
        let NetworkKind::Remote { url, chain_id } = network.kind else {
            panic!("ropsten is a remote network");
        };
        assert_eq!(url.as_str(), "https://eth-ropsten.alchemyapi.io/v2/key");
        assert_eq!(chain_id, Some(3));
    }

    #[test]
    fn test_unknown_network() {
        let config = MarginxConfig {
            network: "goerli".to_string(),
            ..Default::default()
        };
        let err = config.selected_network_with(env(&[])).unwrap_err();
        assert!(err.to_string().contains("Unknown network 'goerli'"));
    }

    #[test]
    fn test_layering() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                network = "localhost"
                topology = "factory-clone"
                artifacts = "out"

                [networks.localhost]
                url = "http://127.0.0.1:9545"

                [[fixture.seed]]
                action = "wrap"
                weth = "WETH"
                from = "taker"
                amount = "3"
                "#,
            )?;
            jail.set_env("MARGINX_TOPOLOGY", "vault");
            jail.set_env("MARGINX_CONFIRMATIONS__ATTEMPTS", "7");

            let overrides = ConfigOverrides {
                network: Some("anvil".to_string()),
                ..Default::default()
            };
            let config: MarginxConfig =
                MarginxConfig::figment(Path::new(CONFIG_FILE), &overrides).extract()?;

            assert_eq!(config.network, "anvil");
            assert_eq!(config.topology, Topology::Vault);
            assert_eq!(config.artifacts, PathBuf::from("out"));
            assert_eq!(config.confirmations.attempts, 7);
            assert_eq!(config.confirmations.delay_ms, ReceiptPolling::default().delay_ms);
            assert_eq!(
                config.networks["localhost"].url.as_deref(),
                Some("http://127.0.0.1:9545")
            );
            assert!(config.networks.contains_key("hardhat"));
            assert_eq!(config.fixture.seed.len(), 1);
            Ok(())
        });
    }

    #[test]
    fn test_defaults_without_file() {
        figment::Jail::expect_with(|_| {
            let config: MarginxConfig =
                MarginxConfig::figment(Path::new(CONFIG_FILE), &ConfigOverrides::default())
                    .extract()?;
            assert_eq!(config.network, "hardhat");
            assert_eq!(config.fixture.seed, default_fixture_seeds());
            Ok(())
        });
    }

    #[test]
    fn test_toml_round_trip() {
        let config = MarginxConfig::default();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[networks.ropsten]"));
        let parsed: MarginxConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
