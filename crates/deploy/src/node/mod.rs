//! Local anvil node, started as a child process.

mod cmd;

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use alloy_core::primitives::Address;
use anyhow::Context;
use serde::Deserialize;
use tokio::process::{Child, Command};
use url::Url;

pub use cmd::AnvilCmdBuilder;

use crate::{
    config::{ForkConfig, NodeConfig},
    fs::FsHandler,
    rpc::{ReceiptPolling, RpcChain},
};

/// File anvil writes its accounts to, inside the node data directory.
pub const CONFIG_OUT_FILE: &str = "anvil.json";

/// The part of anvil's `--config-out` file we read.
#[derive(Debug, Deserialize)]
struct AnvilOutput {
    available_accounts: Vec<Address>,
}

fn parse_config_out(content: &str) -> anyhow::Result<Vec<Address>> {
    let output: AnvilOutput =
        serde_json::from_str(content).context("Failed to parse anvil config output")?;
    Ok(output.available_accounts)
}

/// Ask the OS for a free TCP port on `host`.
fn free_port(host: &str) -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind((host, 0))
        .with_context(|| format!("Failed to bind a free port on {host}"))?;
    Ok(listener.local_addr()?.port())
}

/// A running anvil process. Killed when dropped.
#[derive(Debug)]
pub struct LocalNode {
    child: Child,
    url: Url,
    chain_id: u64,
    accounts: Vec<Address>,
    config_out: PathBuf,
}

impl LocalNode {
    /// Start anvil and wait until it answers JSON-RPC.
    ///
    /// `data_dir` receives anvil's config output. A file left there by an earlier node is
    /// removed first.
    pub async fn start(
        config: &NodeConfig,
        chain_id: u64,
        fork: Option<&ForkConfig>,
        mnemonic: &str,
        data_dir: &Path,
    ) -> anyhow::Result<Self> {
        FsHandler::ensure_dir(data_dir)?;
        let config_out = data_dir.join(CONFIG_OUT_FILE);
        FsHandler::remove_stale(&config_out)?;

        let port = match config.port {
            0 => free_port(&config.host)?,
            port => port,
        };

        let mut builder = AnvilCmdBuilder::new(chain_id)
            .host(&config.host)
            .port(port)
            .accounts(config.accounts)
            .mnemonic(mnemonic)
            .block_time(config.block_time)
            .config_out(&config_out);
        if let Some(fork) = fork {
            builder = builder
                .fork_url(&fork.url)
                .fork_block_number(fork.block_number);
        }

        tracing::info!(
            binary = %config.binary,
            host = %config.host,
            port,
            chain_id,
            forking = fork.is_some(),
            fork_block_number = ?fork.and_then(|f| f.block_number),
            "Starting anvil..."
        );

        let mut child = Command::new(&config.binary)
            .args(builder.build())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start '{}', is foundry installed?", config.binary))?;

        let timeout = Duration::from_secs(config.startup_timeout_secs);
        tokio::select! {
            ready = FsHandler::wait_for_file(&config_out, timeout) => {
                ready.context("anvil did not write its config output")?;
            }
            status = child.wait() => {
                let status = status.context("Failed to wait for anvil")?;
                anyhow::bail!("anvil exited with {status} before it was ready");
            }
        }

        let content = tokio::fs::read_to_string(&config_out)
            .await
            .with_context(|| format!("Failed to read {}", config_out.display()))?;
        let accounts = parse_config_out(&content)?;

        let url = Url::parse(&format!("http://{}:{}/", config.host, port))
            .context("Failed to parse anvil URL")?;
        RpcChain::new(url.clone(), ReceiptPolling::default())?
            .wait_until_ready(timeout)
            .await?;

        tracing::info!(url = %url, accounts = accounts.len(), "anvil is ready");

        Ok(Self {
            child,
            url,
            chain_id,
            accounts,
            config_out,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// The unlocked dev accounts, in derivation order.
    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    pub fn config_out(&self) -> &Path {
        &self.config_out
    }

    /// Kill the process and wait for it to exit.
    pub async fn stop(mut self) -> anyhow::Result<()> {
        self.child.kill().await.context("Failed to stop anvil")?;
        tracing::info!(url = %self.url, "anvil stopped");
        Ok(())
    }
}
