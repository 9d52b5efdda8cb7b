//! Deployment targets: what each tag deploys, wires and seeds.
//!
//! A target runs in three phases. It constructs its contracts, then applies its wiring
//! directives, then runs its seed actions. Targets only refer to contracts by name; the plan
//! resolver checks those names before anything is sent.

mod aave;
mod limit_order;
mod notif_receiver;
mod registration;
mod tokens;

use serde::{Deserialize, Serialize};

use crate::{accounts::Role, args::Arg, seed::SeedAction, wiring::WiringDirective};

/// How the notification receiver is registered.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Topology {
    /// The receiver is registered directly on a `Vault`.
    #[default]
    Vault,
    /// Receivers are minimal-proxy clones created through a `FactoryClone`.
    FactoryClone,
}

/// A deployment target tag.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Tag {
    Tokens,
    LimitOrderProtocol,
    NotifReceiver,
    Aave,
    Registration,
}

/// A contract to deploy under a logical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSpec {
    pub name: String,
    /// The artifact to deploy, when it differs from `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    #[serde(default)]
    pub args: Vec<Arg>,
    pub from: Role,
}

impl ContractSpec {
    /// Deploy `artifact` under its own name from the owner account.
    pub fn new(artifact: impl Into<String>) -> Self {
        Self {
            name: artifact.into(),
            artifact: None,
            args: Vec::new(),
            from: Role::Owner,
        }
    }

    /// Record the deployment under `name` instead of the artifact name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        let artifact = std::mem::replace(&mut self.name, name.into());
        self.artifact.get_or_insert(artifact);
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = Arg>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    pub fn signer(mut self, role: Role) -> Self {
        self.from = role;
        self
    }

    pub fn artifact(&self) -> &str {
        self.artifact.as_deref().unwrap_or(&self.name)
    }

    pub fn references(&self) -> Vec<&str> {
        self.args.iter().flat_map(Arg::references).collect()
    }
}

/// A tagged unit of deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployTarget {
    pub tag: Tag,
    #[serde(default)]
    pub dependencies: Vec<Tag>,
    #[serde(default)]
    pub contracts: Vec<ContractSpec>,
    #[serde(default)]
    pub wiring: Vec<WiringDirective>,
    #[serde(default)]
    pub seed: Vec<SeedAction>,
}

impl DeployTarget {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            dependencies: Vec::new(),
            contracts: Vec::new(),
            wiring: Vec::new(),
            seed: Vec::new(),
        }
    }

    pub fn depends_on(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.dependencies.extend(tags);
        self
    }

    pub fn contract(mut self, spec: ContractSpec) -> Self {
        self.contracts.push(spec);
        self
    }

    pub fn wire(mut self, directive: WiringDirective) -> Self {
        self.wiring.push(directive);
        self
    }

    pub fn seed(mut self, action: SeedAction) -> Self {
        self.seed.push(action);
        self
    }

    /// Names this target records, in the order it records them.
    pub fn produces(&self) -> Vec<&str> {
        self.contracts
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.seed.iter().filter_map(SeedAction::produces))
            .collect()
    }
}

/// Every known target for `topology`, in declaration order.
pub fn catalog(topology: Topology) -> Vec<DeployTarget> {
    vec![
        tokens::target(),
        limit_order::target(),
        notif_receiver::target(topology),
        aave::target(topology),
        registration::target(topology),
    ]
}
