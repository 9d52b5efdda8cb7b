use std::path::PathBuf;

use clap::{Parser, Subcommand};
use marginx_deploy::{CONFIG_FILE, ConfigOverrides, Tag, Topology};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "marginx")]
#[command(
    author,
    version,
    about = "Deploy and wire the margin trading contracts"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "MARGINX_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the configuration file. A missing file leaves the built-in defaults.
    #[arg(short, long, global = true, env = "MARGINX_CONFIG", default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// The network profile to use (e.g. hardhat, anvil, localhost, ropsten).
    #[arg(short, long, global = true)]
    pub network: Option<String>,

    /// How the notification receiver is registered: `vault` or `factory-clone`.
    #[arg(long, global = true)]
    pub topology: Option<Topology>,

    /// Directory holding the compiled contract artifacts.
    #[arg(long, global = true)]
    pub artifacts: Option<PathBuf>,

    /// Directory holding the persisted deployments.
    #[arg(long, global = true)]
    pub deployments: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// The flags that override the configuration file and environment.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            network: self.network.clone(),
            topology: self.topology,
            artifacts: self.artifacts.clone(),
            deployments: self.deployments.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the ordered targets with their contracts, wiring and seeds.
    Plan {
        /// Only these targets and their dependencies (comma separated).
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<Tag>,
    },

    /// Deploy, wire and seed the selected targets.
    Deploy {
        /// Only these targets and their dependencies (comma separated).
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<Tag>,

        /// Forget the persisted deployments and deploy everything again.
        #[arg(long)]
        reset: bool,
    },

    /// Print the persisted deployments of the selected network.
    List,

    /// Start the local node of the selected network and wait for Ctrl+C.
    Node,

    /// Start a local node and load the test fixture on it.
    Fixture,

    /// Print the resolved configuration as TOML.
    Config,
}

/// `None` selects every target.
pub fn selected_tags(tags: &[Tag]) -> Option<&[Tag]> {
    (!tags.is_empty()).then_some(tags)
}
