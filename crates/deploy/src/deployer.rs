use std::{fmt, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use comfy_table::{Table, presets::UTF8_FULL_CONDENSED};
use derive_more::Deref;
use strum::IntoEnumIterator;

use crate::{
    accounts::{NamedAccounts, Role},
    artifacts::ArtifactStore,
    chain::Chain,
    config::{Network, NetworkKind, NodeConfig},
    context::DeployContext,
    fixture::Fixture,
    fs::FsHandler,
    node::LocalNode,
    plan::{Plan, RunSummary},
    record::DeploymentStore,
    rpc::{ReceiptPolling, RpcChain},
    seed::SeedAction,
    targets::{Tag, Topology},
    wiring::Verification,
};

/// How long to wait for a remote node to answer before giving up.
const REMOTE_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// A connection to the selected network.
///
/// Holds the local node, if one was started, so it lives as long as the session.
#[derive(Deref)]
pub struct Session {
    #[deref]
    pub chain: RpcChain,
    pub accounts: NamedAccounts,
    pub artifacts: ArtifactStore,
    node: Option<LocalNode>,
}

impl Session {
    pub fn node(&self) -> Option<&LocalNode> {
        self.node.as_ref()
    }
}

/// What a deploy or fixture run produced.
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub network: String,
    pub summary: RunSummary,
    pub verifications: Vec<Verification>,
    pub store: DeploymentStore,
}

impl DeployReport {
    /// Fail when a wiring read-back did not match.
    pub fn ensure_verified(&self) -> Result<()> {
        let failed: Vec<String> = self
            .verifications
            .iter()
            .filter(|v| !v.passed())
            .map(|v| format!("{} (expected {}, got {})", v.directive, v.expected, v.actual))
            .collect();
        if !failed.is_empty() {
            anyhow::bail!("Wiring verification failed:\n  {}", failed.join("\n  "));
        }
        Ok(())
    }
}

impl fmt::Display for DeployReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "network {}: {} deployed, {} reused",
            self.network,
            self.summary.deployed(),
            self.summary.reused()
        )?;
        writeln!(f, "{}", self.store.table())?;
        for verification in &self.verifications {
            let status = if verification.passed() { "ok" } else { "MISMATCH" };
            writeln!(f, "[{status}] {}", verification.directive)?;
        }
        Ok(())
    }
}

/// Runs plans against the selected network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployer {
    pub network: Network,
    pub artifacts: PathBuf,
    pub deployments: PathBuf,
    pub topology: Topology,
    pub confirmations: ReceiptPolling,
    pub node: NodeConfig,
    pub fixture_seed: Vec<SeedAction>,
}

impl Deployer {
    /// The ordered plan for `tags` (every target when `None`).
    pub fn plan(&self, tags: Option<&[Tag]>) -> Result<Plan> {
        Ok(Plan::new(self.topology, tags)?)
    }

    /// Where the records of the selected network are kept.
    pub fn store_path(&self) -> PathBuf {
        DeploymentStore::path_for(&self.deployments, &self.network.name)
    }

    fn node_dir(&self) -> PathBuf {
        self.deployments.join(&self.network.name).join("node")
    }

    /// Start the local node of the selected network. Returns `None` for remote networks.
    pub async fn start_node(&self) -> Result<Option<LocalNode>> {
        let NetworkKind::Local { chain_id, fork } = &self.network.kind else {
            return Ok(None);
        };

        let node = LocalNode::start(
            &self.node,
            *chain_id,
            fork.as_ref(),
            &self.network.mnemonic,
            &self.node_dir(),
        )
        .await
        .with_context(|| format!("Failed to start the node of network '{}'", self.network.name))?;
        Ok(Some(node))
    }

    /// Connect to the selected network, starting a local node when it has no URL, and load
    /// the artifacts.
    pub async fn connect(&self) -> Result<Session> {
        let artifacts = ArtifactStore::load_dir(&self.artifacts)?;

        let node = self.start_node().await?;
        let (chain, accounts) = match (&node, &self.network.kind) {
            (Some(node), _) => {
                let chain = RpcChain::new(node.url().clone(), self.confirmations)?;
                let accounts = NamedAccounts::from_accounts(node.accounts().to_vec())?;
                (chain, accounts)
            }
            (None, NetworkKind::Remote { url, chain_id }) => {
                let chain = RpcChain::new(url.clone(), self.confirmations)?;
                chain.wait_until_ready(REMOTE_READY_TIMEOUT).await?;

                if let Some(expected) = chain_id {
                    let actual = chain.chain_id().await?;
                    if actual != *expected {
                        anyhow::bail!(
                            "network '{}' expects chain id {expected}, the node reports {actual}",
                            self.network.name
                        );
                    }
                }

                let accounts = self.remote_accounts(&chain).await?;
                (chain, accounts)
            }
            (None, NetworkKind::Local { .. }) => {
                anyhow::bail!("no node was started for local network '{}'", self.network.name)
            }
        };

        let owner = accounts.get(Role::Owner);
        let owner_balance = chain
            .balance(owner)
            .await
            .context("Failed to fetch the owner balance")?;
        if owner_balance.is_zero() {
            tracing::warn!(%owner, "Owner account holds no ether, deployments will fail");
        }

        tracing::info!(
            network = %self.network.name,
            url = %chain.url(),
            %owner,
            %owner_balance,
            artifacts = artifacts.len(),
            "Connected"
        );

        Ok(Session {
            chain,
            accounts,
            artifacts,
            node,
        })
    }

    /// Prefer the accounts the node manages. Fall back to the configured mnemonic, which only
    /// works when the node holds the matching keys.
    async fn remote_accounts(&self, chain: &RpcChain) -> Result<NamedAccounts> {
        let managed = chain.accounts().await?;
        match NamedAccounts::from_accounts(managed) {
            Ok(accounts) => Ok(accounts),
            Err(err) => {
                tracing::warn!(
                    network = %self.network.name,
                    %err,
                    "Node does not manage enough accounts, deriving them from the mnemonic"
                );
                NamedAccounts::from_mnemonic(
                    &self.network.mnemonic,
                    NamedAccounts::MIN_REQUIRED_ACCOUNTS,
                )
            }
        }
    }

    /// Run the plan for `tags`, re-using and extending the persisted records.
    ///
    /// With `reset`, the persisted records are discarded first.
    pub async fn deploy(&self, tags: Option<&[Tag]>, reset: bool) -> Result<DeployReport> {
        let plan = self.plan(tags)?;
        let session = self.connect().await?;
        let chain_id = session.chain_id().await?;

        let path = self.store_path();
        if reset {
            FsHandler::remove_stale(&path)?;
            tracing::info!(path = %path.display(), "Discarded persisted deployments");
        }
        let store = DeploymentStore::load_for_chain(&path, chain_id)?;

        let mut ctx = DeployContext::new(
            &session.chain,
            session.accounts.clone(),
            &session.artifacts,
            store,
        )
        .persist_to(path.clone());

        let summary = plan
            .execute(&mut ctx)
            .await
            .with_context(|| format!("Deployment to network '{}' failed", self.network.name))?;
        let verifications = plan.verify(&ctx).await?;

        let store = ctx.into_store();
        store.save(&path)?;
        tracing::info!(path = %path.display(), records = store.len(), "Deployments saved");

        Ok(DeployReport {
            network: self.network.name.clone(),
            summary,
            verifications,
            store,
        })
    }

    /// Load the fixture: every target plus the fixture seed actions, against a fresh store.
    pub async fn fixture(&self) -> Result<DeployReport> {
        if matches!(self.network.kind, NetworkKind::Remote { .. }) {
            tracing::warn!(
                network = %self.network.name,
                "Loading the fixture on a remote network, it needs evm_snapshot support"
            );
        }

        let session = self.connect().await?;
        let mut fixture = Fixture::new(self.topology, self.fixture_seed.clone())?;
        let ctx = fixture
            .load(&session.chain, session.accounts.clone(), &session.artifacts)
            .await?;
        let verifications = fixture.plan().verify(&ctx).await?;

        Ok(DeployReport {
            network: self.network.name.clone(),
            summary: fixture.summary().cloned().unwrap_or_default(),
            verifications,
            store: ctx.into_store(),
        })
    }

    /// Start the local node and keep it running until Ctrl+C.
    pub async fn node(&self) -> Result<()> {
        let node = self.start_node().await?.with_context(|| {
            format!(
                "network '{}' is remote, there is no node to start",
                self.network.name
            )
        })?;
        let accounts = NamedAccounts::from_accounts(node.accounts().to_vec())?;

        println!("{} listening on {}", self.network.name, node.url());
        println!("{}", accounts_table(&accounts));

        tracing::info!("Press Ctrl+C to stop the node");
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;

        node.stop().await
    }
}

/// Render the named accounts as a table.
pub fn accounts_table(accounts: &NamedAccounts) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_header(vec!["Role", "Index", "Address"]);
    for role in Role::iter() {
        table.add_row(vec![
            role.to_string(),
            role.index().to_string(),
            accounts.get(role).to_string(),
        ]);
    }
    table
}
