//! marginx deploys the margin trading contracts, wires them together and seeds test balances.

mod cli;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command, selected_tags};
use marginx_deploy::{DeployerBuilder, DeploymentStore, MarginxConfig, Plan};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = MarginxConfig::load(&cli.config, &cli.overrides())?;

    tracing::debug!(
        config_path = %cli.config.display(),
        network = %config.network,
        topology = %config.topology,
        "Configuration loaded"
    );

    // These commands never touch a chain.
    match &cli.command {
        Command::Config => {
            print!("{}", config.to_toml()?);
            return Ok(());
        }
        Command::Plan { tags } => {
            let plan = Plan::new(config.topology, selected_tags(tags))?;
            print!("{plan}");
            return Ok(());
        }
        Command::List => {
            let path = DeploymentStore::path_for(&config.deployments, &config.network);
            match DeploymentStore::load(&path)? {
                Some(store) => println!("{}", store.table()),
                None => println!("No deployments recorded for network {}", config.network),
            }
            return Ok(());
        }
        _ => {}
    }

    let deployer = DeployerBuilder::new(config).build().await?;

    match cli.command {
        Command::Deploy { tags, reset } => {
            let report = deployer.deploy(selected_tags(&tags), reset).await?;
            print!("{report}");
            report.ensure_verified()?;
        }
        Command::Fixture => {
            let report = deployer.fixture().await?;
            print!("{report}");
            report.ensure_verified()?;
        }
        Command::Node => deployer.node().await?,
        Command::Config | Command::Plan { .. } | Command::List => {}
    }

    Ok(())
}
