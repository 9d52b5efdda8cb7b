//! Typed errors that callers need to tell apart.
//!
//! Everything else is propagated as [`anyhow::Error`] with context. These variants travel
//! inside `anyhow` and are recovered with [`DeployError::find`].

use alloy_core::primitives::Address;
use thiserror::Error;

/// Errors raised by the deployment orchestration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeployError {
    /// A contract was looked up by name before it was deployed.
    #[error("deployment '{0}' not found, was its target run first?")]
    MissingDeployment(String),

    /// A target declares a dependency that no known target provides.
    #[error("target '{target}' depends on unknown target '{dependency}'")]
    UnknownDependency { target: String, dependency: String },

    /// The declared dependencies contain a cycle.
    #[error("dependency cycle detected between targets: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// A target refers to a deployment that neither an earlier target nor the store provides.
    #[error("target '{target}' refers to '{name}', which no earlier target deploys")]
    UnresolvedReference { target: String, name: String },

    /// The same name was deployed twice in one run with different bytecode or arguments.
    #[error("deployment '{0}' already exists in this run with a different fingerprint")]
    ConflictingDeployment(String),

    /// No compiled artifact is available for the contract.
    #[error("artifact '{0}' not found")]
    MissingArtifact(String),

    /// The node manages fewer accounts than the named roles need.
    #[error("not enough accounts: need at least {required}, got {available}")]
    NotEnoughAccounts { required: usize, available: usize },

    /// A transaction or call reverted.
    #[error("transaction from {from} reverted: {reason}")]
    Reverted { from: Address, reason: String },
}

impl DeployError {
    /// Find a [`DeployError`] anywhere in an error chain.
    pub fn find(err: &anyhow::Error) -> Option<&DeployError> {
        err.chain().find_map(|cause| cause.downcast_ref::<DeployError>())
    }

    /// Whether the error chain contains a revert.
    pub fn is_revert(err: &anyhow::Error) -> bool {
        matches!(Self::find(err), Some(DeployError::Reverted { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_find_through_context() {
        let err: anyhow::Result<()> = Err(DeployError::MissingDeployment("Vault".to_string()).into());
        let err = err.context("Failed to deploy AaveLendingProtocol").unwrap_err();

        assert_eq!(
            DeployError::find(&err),
            Some(&DeployError::MissingDeployment("Vault".to_string()))
        );
        assert!(!DeployError::is_revert(&err));
    }

    #[test]
    fn test_is_revert() {
        let err = anyhow::Error::from(DeployError::Reverted {
            from: Address::ZERO,
            reason: "Ownable: caller is not the owner".to_string(),
        });
        assert!(DeployError::is_revert(&err));
    }

    #[test]
    fn test_cycle_message() {
        let err = DeployError::DependencyCycle(vec!["A".into(), "B".into(), "A".into()]);
        assert_eq!(
            err.to_string(),
            "dependency cycle detected between targets: A -> B -> A"
        );
    }
}
