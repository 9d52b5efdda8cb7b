//! Test fixture: deploy, wire and seed once, then hand out the same state by snapshot.

use alloy_core::primitives::U256;
use anyhow::{Context, Result};

use crate::{
    DeployError,
    accounts::NamedAccounts,
    artifacts::ArtifactStore,
    chain::Chain,
    context::DeployContext,
    plan::{Plan, RunSummary},
    record::DeploymentStore,
    seed::SeedAction,
    targets::Topology,
};

#[derive(Debug, Clone)]
struct Snapshot {
    id: U256,
    store: DeploymentStore,
    /// The run that deployed the fixture.
    summary: RunSummary,
}

/// Every target plus the fixture seed actions, loaded at most once per chain.
///
/// The first [`Fixture::load`] runs the full plan against a fresh store and snapshots the
/// chain. Later loads revert to that snapshot instead of redeploying, so each caller starts
/// from the same addresses and balances.
#[derive(Debug, Clone)]
pub struct Fixture {
    plan: Plan,
    snapshot: Option<Snapshot>,
}

impl Fixture {
    pub fn new(topology: Topology, seeds: Vec<SeedAction>) -> Result<Self, DeployError> {
        Ok(Self {
            plan: Plan::new(topology, None)?.with_extra_seed(seeds),
            snapshot: None,
        })
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// What the run that deployed the fixture did, once it was loaded.
    pub fn summary(&self) -> Option<&RunSummary> {
        self.snapshot.as_ref().map(|snapshot| &snapshot.summary)
    }

    /// Deploy the fixture, or restore it when it was already loaded on this chain.
    pub async fn load<'a, C: Chain>(
        &mut self,
        chain: &'a C,
        accounts: NamedAccounts,
        artifacts: &'a ArtifactStore,
    ) -> Result<DeployContext<'a, C>> {
        if let Some(snapshot) = self.snapshot.take() {
            if chain
                .revert(snapshot.id)
                .await
                .context("Failed to revert to fixture snapshot")?
            {
                let id = chain.snapshot().await.context("Failed to snapshot fixture")?;
                tracing::debug!(snapshot = %snapshot.id, next = %id, "Fixture restored");

                let ctx = DeployContext::new(chain, accounts, artifacts, snapshot.store.clone());
                self.snapshot = Some(Snapshot { id, ..snapshot });
                return Ok(ctx);
            }
            tracing::warn!(snapshot = %snapshot.id, "Fixture snapshot is gone, deploying again");
        }

        let chain_id = chain.chain_id().await.context("Failed to fetch chain id")?;
        let mut ctx = DeployContext::new(chain, accounts, artifacts, DeploymentStore::new(chain_id));

        let summary = self
            .plan
            .execute(&mut ctx)
            .await
            .context("Failed to deploy fixture")?;

        let id = chain.snapshot().await.context("Failed to snapshot fixture")?;
        tracing::info!(
            deployed = summary.deployed(),
            snapshot = %id,
            "Fixture loaded"
        );

        self.snapshot = Some(Snapshot {
            id,
            store: ctx.store().clone(),
            summary,
        });
        Ok(ctx)
    }
}
