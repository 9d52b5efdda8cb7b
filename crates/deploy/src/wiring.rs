//! Post-deploy privileged calls that link contracts together.

use std::fmt;

use alloy_core::primitives::Address;
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{
    accounts::Role,
    args::AddressRef,
    chain::{Chain, TransactionReceipt},
    context::DeployContext,
    contracts::{
        IATokenMock, IFactoryClone, ILendingPoolProviderMock, IMarginTradingNotifReceiver, IVault,
    },
};

/// A one-shot call on a deployed contract, sent by a named account.
///
/// Directives are not idempotent: re-applying one may revert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringDirective {
    pub from: Role,
    #[serde(flatten)]
    pub call: WiringCall,
}

/// The wiring calls, with contracts referred to by deployment name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "kebab-case")]
pub enum WiringCall {
    /// `provider._setLendingPool(pool)`
    SetLendingPool { provider: String, pool: String },
    /// `provider._setLendingPoolCore(core)`
    SetLendingPoolCore { provider: String, core: String },
    /// `token.setLendingPool(pool)` on an interest-bearing token.
    SetATokenPool { token: String, pool: String },
    /// `vault.addReceiver(receiver)`
    AddReceiver { vault: String, receiver: AddressRef },
    /// `vault.approveReceiver(receiver)`
    ApproveReceiver { vault: String, receiver: AddressRef },
    /// `vault.addLendingProtocol(receiver, protocol)`
    AddLendingProtocol {
        vault: String,
        receiver: String,
        protocol: String,
    },
    /// `factory.addLendingProtocol(protocol)`
    AddFactoryLendingProtocol { factory: String, protocol: String },
}

/// The outcome of reading back a wiring directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub directive: String,
    pub expected: String,
    pub actual: String,
}

impl Verification {
    fn address(directive: &WiringDirective, expected: Address, actual: Address) -> Self {
        Self {
            directive: directive.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    fn flag(directive: &WiringDirective, actual: bool) -> Self {
        Self {
            directive: directive.to_string(),
            expected: true.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn passed(&self) -> bool {
        self.expected == self.actual
    }
}

impl WiringDirective {
    /// A directive sent by the owner account.
    pub fn owner(call: WiringCall) -> Self {
        Self {
            from: Role::Owner,
            call,
        }
    }

    /// Every deployment name the directive refers to.
    pub fn references(&self) -> Vec<&str> {
        match &self.call {
            WiringCall::SetLendingPool { provider, pool } => vec![provider.as_str(), pool.as_str()],
            WiringCall::SetLendingPoolCore { provider, core } => {
                vec![provider.as_str(), core.as_str()]
            }
            WiringCall::SetATokenPool { token, pool } => vec![token.as_str(), pool.as_str()],
            WiringCall::AddReceiver { vault, receiver }
            | WiringCall::ApproveReceiver { vault, receiver } => std::iter::once(vault.as_str())
                .chain(receiver.deployment_name())
                .collect(),
            WiringCall::AddLendingProtocol {
                vault,
                receiver,
                protocol,
            } => vec![vault.as_str(), receiver.as_str(), protocol.as_str()],
            WiringCall::AddFactoryLendingProtocol { factory, protocol } => {
                vec![factory.as_str(), protocol.as_str()]
            }
        }
    }

    /// Send the call.
    pub async fn apply<C: Chain>(&self, ctx: &DeployContext<'_, C>) -> Result<TransactionReceipt> {
        let from = self.from;
        match &self.call {
            WiringCall::SetLendingPool { provider, pool } => {
                let call = ILendingPoolProviderMock::_setLendingPoolCall {
                    pool: ctx.address_of(pool)?,
                };
                ctx.execute(from, ctx.address_of(provider)?, call).await
            }
            WiringCall::SetLendingPoolCore { provider, core } => {
                let call = ILendingPoolProviderMock::_setLendingPoolCoreCall {
                    core: ctx.address_of(core)?,
                };
                ctx.execute(from, ctx.address_of(provider)?, call).await
            }
            WiringCall::SetATokenPool { token, pool } => {
                let call = IATokenMock::setLendingPoolCall {
                    pool: ctx.address_of(pool)?,
                };
                ctx.execute(from, ctx.address_of(token)?, call).await
            }
            WiringCall::AddReceiver { vault, receiver } => {
                let call = IVault::addReceiverCall {
                    receiver: ctx.resolve(receiver)?,
                };
                ctx.execute(from, ctx.address_of(vault)?, call).await
            }
            WiringCall::ApproveReceiver { vault, receiver } => {
                let call = IVault::approveReceiverCall {
                    receiver: ctx.resolve(receiver)?,
                };
                ctx.execute(from, ctx.address_of(vault)?, call).await
            }
            WiringCall::AddLendingProtocol {
                vault,
                receiver,
                protocol,
            } => {
                let call = IVault::addLendingProtocolCall {
                    receiver: ctx.address_of(receiver)?,
                    protocol: ctx.address_of(protocol)?,
                };
                ctx.execute(from, ctx.address_of(vault)?, call).await
            }
            WiringCall::AddFactoryLendingProtocol { factory, protocol } => {
                let call = IFactoryClone::addLendingProtocolCall {
                    protocol: ctx.address_of(protocol)?,
                };
                ctx.execute(from, ctx.address_of(factory)?, call).await
            }
        }
    }

    /// Read back the state the directive set.
    ///
    /// Returns `None` for directives without a read accessor.
    pub async fn verify<C: Chain>(&self, ctx: &DeployContext<'_, C>) -> Result<Option<Verification>> {
        let verification = match &self.call {
            WiringCall::SetLendingPool { provider, pool } => {
                let actual = ctx
                    .read(ctx.address_of(provider)?, ILendingPoolProviderMock::getLendingPoolCall {})
                    .await?
                    ._0;
                Verification::address(self, ctx.address_of(pool)?, actual)
            }
            WiringCall::SetLendingPoolCore { provider, core } => {
                let actual = ctx
                    .read(
                        ctx.address_of(provider)?,
                        ILendingPoolProviderMock::getLendingPoolCoreCall {},
                    )
                    .await?
                    ._0;
                Verification::address(self, ctx.address_of(core)?, actual)
            }
            WiringCall::SetATokenPool { .. } => return Ok(None),
            WiringCall::AddReceiver { vault, receiver }
            | WiringCall::ApproveReceiver { vault, receiver } => {
                let call = IVault::approvedReceiverCall {
                    receiver: ctx.resolve(receiver)?,
                };
                let actual = ctx.read(ctx.address_of(vault)?, call).await?._0;
                Verification::flag(self, actual)
            }
            WiringCall::AddLendingProtocol {
                receiver, protocol, ..
            } => {
                let call = IMarginTradingNotifReceiver::lendingProtocolsCall {
                    protocol: ctx.address_of(protocol)?,
                };
                let actual = ctx.read(ctx.address_of(receiver)?, call).await?._0;
                Verification::flag(self, actual)
            }
            WiringCall::AddFactoryLendingProtocol { factory, protocol } => {
                let call = IFactoryClone::lendingProtocolsCall {
                    protocol: ctx.address_of(protocol)?,
                };
                let actual = ctx.read(ctx.address_of(factory)?, call).await?._0;
                Verification::flag(self, actual)
            }
        };

        Ok(Some(verification))
    }
}

impl fmt::Display for WiringDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.call {
            WiringCall::SetLendingPool { provider, pool } => {
                write!(f, "{provider}._setLendingPool({pool})")
            }
            WiringCall::SetLendingPoolCore { provider, core } => {
                write!(f, "{provider}._setLendingPoolCore({core})")
            }
            WiringCall::SetATokenPool { token, pool } => write!(f, "{token}.setLendingPool({pool})"),
            WiringCall::AddReceiver { vault, receiver } => {
                write!(f, "{vault}.addReceiver({receiver})")
            }
            WiringCall::ApproveReceiver { vault, receiver } => {
                write!(f, "{vault}.approveReceiver({receiver})")
            }
            WiringCall::AddLendingProtocol {
                vault,
                receiver,
                protocol,
            } => write!(f, "{vault}.addLendingProtocol({receiver}, {protocol})"),
            WiringCall::AddFactoryLendingProtocol { factory, protocol } => {
                write!(f, "{factory}.addLendingProtocol({protocol})")
            }
        }?;
        write!(f, " as {}", self.from)
    }
}
