//! Plan resolution and execution.

use std::{collections::HashSet, fmt};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::Instrument;

use crate::{
    DeployError,
    chain::Chain,
    context::DeployContext,
    graph::DependencyGraph,
    seed::SeedAction,
    targets::{self, DeployTarget, Tag, Topology},
    wiring::Verification,
};

/// What a run did for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetSummary {
    pub tag: Option<Tag>,
    pub deployed: Vec<String>,
    pub reused: Vec<String>,
    pub wired: usize,
    pub seeded: usize,
}

/// What a run did, target by target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub targets: Vec<TargetSummary>,
}

impl RunSummary {
    pub fn deployed(&self) -> usize {
        self.targets.iter().map(|t| t.deployed.len()).sum()
    }

    pub fn reused(&self) -> usize {
        self.targets.iter().map(|t| t.reused.len()).sum()
    }
}

/// Targets in dependency order, plus seed actions to run once every target is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub topology: Topology,
    pub targets: Vec<DeployTarget>,
    pub extra_seed: Vec<SeedAction>,
}

impl Plan {
    /// Resolve the catalog of `topology`, restricted to `tags` and their dependencies.
    pub fn new(topology: Topology, tags: Option<&[Tag]>) -> Result<Self, DeployError> {
        Self::from_targets(topology, targets::catalog(topology), tags)
    }

    /// Order `targets` by their declared dependencies.
    pub fn from_targets(
        topology: Topology,
        targets: Vec<DeployTarget>,
        tags: Option<&[Tag]>,
    ) -> Result<Self, DeployError> {
        let mut graph = DependencyGraph::new();
        for target in &targets {
            graph.add(
                target.tag.to_string(),
                target.dependencies.iter().map(ToString::to_string),
            );
        }

        let selected: Option<Vec<String>> =
            tags.map(|tags| tags.iter().map(ToString::to_string).collect());
        let order = graph.resolve(selected.as_deref())?;

        let mut targets = targets;
        let ordered = order
            .iter()
            .filter_map(|name| {
                let index = targets.iter().position(|t| t.tag.to_string() == *name)?;
                Some(targets.swap_remove(index))
            })
            .collect();

        Ok(Self {
            topology,
            targets: ordered,
            extra_seed: Vec::new(),
        })
    }

    /// Run `seeds` after the last target.
    pub fn with_extra_seed(mut self, seeds: Vec<SeedAction>) -> Self {
        self.extra_seed = seeds;
        self
    }

    /// Check that every name a target refers to is produced earlier in the plan or already
    /// recorded, before anything is sent.
    pub fn preflight<'a>(&self, recorded: impl IntoIterator<Item = &'a str>) -> Result<(), DeployError> {
        let mut known: HashSet<String> = recorded.into_iter().map(String::from).collect();

        for target in &self.targets {
            let tag = target.tag.to_string();
            for contract in &target.contracts {
                check_known(&known, &tag, contract.references())?;
                known.insert(contract.name.clone());
            }
            for directive in &target.wiring {
                check_known(&known, &tag, directive.references())?;
            }
            for action in &target.seed {
                check_known(&known, &tag, action.references())?;
                known.extend(action.produces().map(String::from));
            }
        }

        for action in &self.extra_seed {
            check_known(&known, "fixture", action.references())?;
            known.extend(action.produces().map(String::from));
        }

        Ok(())
    }

    /// Construct, configure and seed every target in order.
    pub async fn execute<C: Chain>(&self, ctx: &mut DeployContext<'_, C>) -> Result<RunSummary> {
        self.preflight(ctx.store().names())?;

        let mut summary = RunSummary::default();
        for target in &self.targets {
            let span = tracing::info_span!("target", tag = %target.tag);
            summary.targets.push(run_target(ctx, target).instrument(span).await?);
        }

        if !self.extra_seed.is_empty() {
            let seeded = run_seeds(ctx, &self.extra_seed, "fixture").await?;
            summary.targets.push(TargetSummary {
                seeded,
                ..Default::default()
            });
        }

        tracing::info!(
            deployed = summary.deployed(),
            reused = summary.reused(),
            "Plan executed"
        );
        Ok(summary)
    }

    /// Read back every wiring directive that has an accessor.
    pub async fn verify<C: Chain>(&self, ctx: &DeployContext<'_, C>) -> Result<Vec<Verification>> {
        let mut verifications = Vec::new();
        for directive in self.targets.iter().flat_map(|t| &t.wiring) {
            let Some(verification) = directive
                .verify(ctx)
                .await
                .with_context(|| format!("Failed to verify {directive}"))?
            else {
                continue;
            };

            if verification.passed() {
                tracing::info!(directive = %verification.directive, "Wiring verified");
            } else {
                tracing::warn!(
                    directive = %verification.directive,
                    expected = %verification.expected,
                    actual = %verification.actual,
                    "Wiring mismatch"
                );
            }
            verifications.push(verification);
        }
        Ok(verifications)
    }
}

async fn run_target<C: Chain>(
    ctx: &mut DeployContext<'_, C>,
    target: &DeployTarget,
) -> Result<TargetSummary> {
    tracing::info!(
        contracts = target.contracts.len(),
        wiring = target.wiring.len(),
        seed = target.seed.len(),
        "Running target"
    );

    let mut summary = TargetSummary {
        tag: Some(target.tag),
        ..Default::default()
    };

    for spec in &target.contracts {
        let deployment = ctx
            .deploy(spec)
            .await
            .with_context(|| format!("Target {} failed to construct {}", target.tag, spec.name))?;
        if deployment.reused {
            summary.reused.push(spec.name.clone());
        } else {
            summary.deployed.push(spec.name.clone());
        }
    }

    for directive in &target.wiring {
        directive
            .apply(ctx)
            .await
            .with_context(|| format!("Target {} failed to wire {directive}", target.tag))?;
        summary.wired += 1;
    }

    summary.seeded = run_seeds(ctx, &target.seed, &target.tag.to_string()).await?;
    Ok(summary)
}

fn check_known<'a>(
    known: &HashSet<String>,
    target: &str,
    references: impl IntoIterator<Item = &'a str>,
) -> Result<(), DeployError> {
    for name in references {
        if !known.contains(name) {
            return Err(DeployError::UnresolvedReference {
                target: target.to_string(),
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

async fn run_seeds<C: Chain>(
    ctx: &mut DeployContext<'_, C>,
    seeds: &[SeedAction],
    label: &str,
) -> Result<usize> {
    for action in seeds {
        action
            .apply(ctx)
            .await
            .with_context(|| format!("{label} failed to seed {action}"))?;
    }
    Ok(seeds.len())
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "topology: {}", self.topology)?;
        for (index, target) in self.targets.iter().enumerate() {
            let dependencies: Vec<String> = target.dependencies.iter().map(ToString::to_string).collect();
            if dependencies.is_empty() {
                writeln!(f, "{}. {}", index + 1, target.tag)?;
            } else {
                writeln!(f, "{}. {} (after {})", index + 1, target.tag, dependencies.join(", "))?;
            }

            for contract in &target.contracts {
                let args: Vec<String> = contract.args.iter().map(ToString::to_string).collect();
                let artifact = match contract.artifact.as_deref() {
                    Some(artifact) => format!(" [{artifact}]"),
                    None => String::new(),
                };
                writeln!(
                    f,
                    "   deploy {}{artifact}({}) as {}",
                    contract.name,
                    args.join(", "),
                    contract.from
                )?;
            }
            for directive in &target.wiring {
                writeln!(f, "   wire   {directive}")?;
            }
            for action in &target.seed {
                writeln!(f, "   seed   {action}")?;
            }
        }
        for action in &self.extra_seed {
            writeln!(f, "   seed   {action}")?;
        }
        Ok(())
    }
}
