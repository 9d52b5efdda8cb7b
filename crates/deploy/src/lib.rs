//! marginx-deploy - Deployment and wiring for the margin trading contracts.
//!
//! This crate deploys the limit-order protocol, the margin notification receiver with its
//! vault or clone factory, and a mock Aave lending stack, then wires them together and seeds
//! balances for tests.

pub mod accounts;
pub mod args;
pub mod artifacts;
mod builder;
pub mod chain;
pub mod config;
pub mod context;
pub mod contracts;
mod deployer;
mod error;
pub mod fixture;
mod fs;
pub mod graph;
pub mod node;
pub mod plan;
pub mod record;
pub mod rpc;
pub mod seed;
pub mod targets;
pub mod wiring;

#[cfg(test)]
pub(crate) mod mock;

pub use accounts::{DEFAULT_MNEMONIC, NamedAccounts, Role};
pub use args::{AddressRef, Amount, Arg, ArgValue};
pub use artifacts::{Artifact, ArtifactStore};
pub use builder::DeployerBuilder;
pub use chain::{Chain, TransactionReceipt, TransactionRequest};
pub use config::{CONFIG_FILE, ConfigOverrides, MarginxConfig, Network, NetworkKind};
pub use context::{DeployContext, Deployment};
pub use deployer::{DeployReport, Deployer, Session, accounts_table};
pub use error::DeployError;
pub use fixture::Fixture;
pub use node::LocalNode;
pub use plan::{Plan, RunSummary, TargetSummary};
pub use record::{DeploymentRecord, DeploymentStore};
pub use rpc::{ReceiptPolling, RpcChain, RpcError};
pub use seed::{SeedAction, default_fixture_seeds};
pub use targets::{ContractSpec, DeployTarget, Tag, Topology};
pub use wiring::{Verification, WiringCall, WiringDirective};
