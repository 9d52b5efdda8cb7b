//! Seed actions: token balances, approvals and deposits for named accounts.

use std::fmt;

use alloy_core::primitives::U256;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    accounts::Role,
    args::{AddressRef, Amount},
    chain::Chain,
    context::DeployContext,
    contracts::{IERC20Mock, IFactoryClone, ILendingPool, IWETH, names},
};

/// A state-changing call that prepares balances or creates a contract after wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum SeedAction {
    /// `token.mint(to, amount)`
    Mint {
        token: String,
        from: Role,
        to: AddressRef,
        amount: Amount,
    },
    /// `weth.deposit{value: amount}()`
    Wrap {
        weth: String,
        from: Role,
        amount: Amount,
    },
    /// `token.approve(spender, amount)`
    Approve {
        token: String,
        from: Role,
        spender: AddressRef,
        amount: Amount,
    },
    /// `token.transfer(to, amount)`
    Transfer {
        token: String,
        from: Role,
        to: AddressRef,
        amount: Amount,
    },
    /// `pool.deposit(asset, amount, on_behalf_of, 0)`
    Deposit {
        pool: String,
        asset: String,
        from: Role,
        amount: Amount,
        on_behalf_of: AddressRef,
    },
    /// `factory.deploy()`, then record `factory.deployedContracts(index)` as `name`.
    DeployClone {
        factory: String,
        from: Role,
        name: String,
        #[serde(default)]
        index: u64,
    },
}

impl SeedAction {
    /// Every deployment name the action refers to.
    pub fn references(&self) -> Vec<&str> {
        match self {
            Self::Mint { token, to, .. } | Self::Transfer { token, to, .. } => {
                std::iter::once(token.as_str()).chain(to.deployment_name()).collect()
            }
            Self::Approve { token, spender, .. } => std::iter::once(token.as_str())
                .chain(spender.deployment_name())
                .collect(),
            Self::Wrap { weth, .. } => vec![weth.as_str()],
            Self::Deposit {
                pool,
                asset,
                on_behalf_of,
                ..
            } => [pool.as_str(), asset.as_str()]
                .into_iter()
                .chain(on_behalf_of.deployment_name())
                .collect(),
            Self::DeployClone { factory, .. } => vec![factory.as_str()],
        }
    }

    /// The deployment name the action records, if any.
    pub fn produces(&self) -> Option<&str> {
        match self {
            Self::DeployClone { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Run the action.
    pub async fn apply<C: Chain>(&self, ctx: &mut DeployContext<'_, C>) -> Result<()> {
        match self {
            Self::Mint {
                token,
                from,
                to,
                amount,
            } => {
                let call = IERC20Mock::mintCall {
                    account: ctx.resolve(to)?,
                    amount: amount.wei(),
                };
                ctx.execute(*from, ctx.address_of(token)?, call).await?;
            }
            Self::Wrap { weth, from, amount } => {
                ctx.execute_with_value(*from, ctx.address_of(weth)?, IWETH::depositCall {}, amount.wei())
                    .await?;
            }
            Self::Approve {
                token,
                from,
                spender,
                amount,
            } => {
                let call = IERC20Mock::approveCall {
                    spender: ctx.resolve(spender)?,
                    amount: amount.wei(),
                };
                ctx.execute(*from, ctx.address_of(token)?, call).await?;
            }
            Self::Transfer {
                token,
                from,
                to,
                amount,
            } => {
                let call = IERC20Mock::transferCall {
                    to: ctx.resolve(to)?,
                    amount: amount.wei(),
                };
                ctx.execute(*from, ctx.address_of(token)?, call).await?;
            }
            Self::Deposit {
                pool,
                asset,
                from,
                amount,
                on_behalf_of,
            } => {
                let call = ILendingPool::depositCall {
                    asset: ctx.address_of(asset)?,
                    amount: amount.wei(),
                    onBehalfOf: ctx.resolve(on_behalf_of)?,
                    referralCode: 0,
                };
                ctx.execute(*from, ctx.address_of(pool)?, call).await?;
            }
            Self::DeployClone {
                factory,
                from,
                name,
                index,
            } => {
                let factory_address = ctx.address_of(factory)?;
                if ctx.reuse_created(name, factory_address).await?.is_some() {
                    tracing::debug!(action = %self, "Seed action skipped, clone already recorded");
                    return Ok(());
                }

                let receipt = ctx
                    .execute(*from, factory_address, IFactoryClone::deployCall {})
                    .await?;
                let clone = ctx
                    .read(
                        factory_address,
                        IFactoryClone::deployedContractsCall {
                            index: U256::from(*index),
                        },
                    )
                    .await
                    .with_context(|| format!("Failed to read clone {index} of {factory}"))?
                    ._0;
                let sender = ctx.account(*from);
                ctx.record_created(name, names::NOTIF_RECEIVER, clone, factory_address, sender, &receipt)?;
            }
        }

        tracing::debug!(action = %self, "Seed action applied");
        Ok(())
    }
}

impl fmt::Display for SeedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mint {
                token,
                from,
                to,
                amount,
            } => write!(f, "{token}.mint({to}, {amount}) as {from}"),
            Self::Wrap { weth, from, amount } => write!(f, "{weth}.deposit{{value: {amount}}}() as {from}"),
            Self::Approve {
                token,
                from,
                spender,
                amount,
            } => write!(f, "{token}.approve({spender}, {amount}) as {from}"),
            Self::Transfer {
                token,
                from,
                to,
                amount,
            } => write!(f, "{token}.transfer({to}, {amount}) as {from}"),
            Self::Deposit {
                pool,
                asset,
                from,
                amount,
                on_behalf_of,
            } => write!(f, "{pool}.deposit({asset}, {amount}, {on_behalf_of}) as {from}"),
            Self::DeployClone {
                factory,
                from,
                name,
                index,
            } => write!(f, "{factory}.deploy() as {from}, record deployedContracts({index}) as {name}"),
        }
    }
}

/// Balances the fixture gives the order maker and taker: 1 DAI and 1 WETH each, both approved
/// for the limit-order protocol.
pub fn default_fixture_seeds() -> Vec<SeedAction> {
    let amount = Amount::ether(1);
    let lop = AddressRef::deployment(names::LIMIT_ORDER_PROTOCOL);

    [Role::Wallet, Role::Taker]
        .into_iter()
        .flat_map(|role| {
            [
                SeedAction::Mint {
                    token: names::DAI.into(),
                    from: role,
                    to: AddressRef::Account(role),
                    amount,
                },
                SeedAction::Wrap {
                    weth: names::WETH.into(),
                    from: role,
                    amount,
                },
                SeedAction::Approve {
                    token: names::DAI.into(),
                    from: role,
                    spender: lop.clone(),
                    amount,
                },
                SeedAction::Approve {
                    token: names::WETH.into(),
                    from: role,
                    spender: lop.clone(),
                    amount,
                },
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        accounts::NamedAccounts,
        artifacts::ArtifactStore,
        record::{DeploymentRecord, DeploymentStore},
        mock::MockChain,
    };
    use alloy_core::primitives::{Address, B256};
    use alloy_sol_types::{SolCall, SolValue};

    fn store_with(entries: &[(&str, Address)]) -> DeploymentStore {
        let mut store = DeploymentStore::new(31337);
        for (name, address) in entries {
            store.insert(DeploymentRecord {
                name: name.to_string(),
                address: *address,
                artifact: name.to_string(),
                args: vec![],
                fingerprint: String::new(),
                tx_hash: B256::ZERO,
                deployer: Address::ZERO,
                deployed_at: chrono::Utc::now(),
            });
        }
        store
    }

    #[test]
    fn test_toml_config_shape() {
        #[derive(Deserialize)]
        struct Seeds {
            seed: Vec<SeedAction>,
        }

        let seeds: Seeds = toml::from_str(
            r#"
            [[seed]]
            action = "mint"
            token = "ERC20Mock"
            from = "taker"
            to = { account = "taker" }
            amount = "2.5"

            [[seed]]
            action = "approve"
            token = "WETH"
            from = "taker"
            spender = { deployment = "LimitOrderProtocol" }
            amount = "1"
            "#,
        )
        .unwrap();

        assert_eq!(seeds.seed.len(), 2);
        assert_eq!(seeds.seed[0].references(), vec!["ERC20Mock"]);
        assert_eq!(seeds.seed[1].references(), vec!["WETH", "LimitOrderProtocol"]);
        assert_eq!(
            seeds.seed[1].to_string(),
            "WETH.approve(LimitOrderProtocol, 1 ether) as taker"
        );
    }

    #[test]
    fn test_default_fixture_seeds() {
        let seeds = default_fixture_seeds();
        assert_eq!(seeds.len(), 8);
        assert!(seeds.iter().all(|s| s.produces().is_none()));
        assert!(
            seeds
                .iter()
                .any(|s| s.references().contains(&names::LIMIT_ORDER_PROTOCOL))
        );
    }

    #[tokio::test]
    async fn test_wrap_attaches_value() {
        let chain = MockChain::new(3);
        let artifacts = ArtifactStore::default();
        let accounts = NamedAccounts::from_accounts(chain.accounts().await.unwrap()).unwrap();
        let weth = Address::with_last_byte(0x11);
        let mut ctx = DeployContext::new(&chain, accounts, &artifacts, store_with(&[(names::WETH, weth)]));

        SeedAction::Wrap {
            weth: names::WETH.into(),
            from: Role::Taker,
            amount: Amount::ether(1),
        }
        .apply(&mut ctx)
        .await
        .unwrap();

        let sent = chain.sent();
        assert_eq!(sent[0].to, Some(weth));
        assert_eq!(sent[0].from, chain.account(3));
        assert_eq!(sent[0].value, Some(Amount::ether(1).wei()));
        assert_eq!(sent[0].selector(), Some(IWETH::depositCall::SELECTOR));
    }

    #[tokio::test]
    async fn test_deploy_clone_is_recorded() {
        let chain = MockChain::new(4);
        let artifacts = ArtifactStore::default();
        let accounts = NamedAccounts::from_accounts(chain.accounts().await.unwrap()).unwrap();
        let factory = Address::with_last_byte(0x21);
        let clone = Address::with_last_byte(0x22);
        let mut ctx = DeployContext::new(
            &chain,
            accounts,
            &artifacts,
            store_with(&[(names::FACTORY, factory)]),
        );
        chain.respond(
            factory,
            SolCall::abi_encode(&IFactoryClone::deployedContractsCall { index: U256::ZERO }),
            clone.abi_encode(),
        );

        let action = SeedAction::DeployClone {
            factory: names::FACTORY.into(),
            from: Role::Wallet,
            name: names::RECEIVER_CLONE.into(),
            index: 0,
        };
        action.apply(&mut ctx).await.unwrap();

        let record = ctx.store().get(names::RECEIVER_CLONE).unwrap();
        assert_eq!(record.address, clone);
        assert_eq!(record.deployer, chain.account(0));
        assert_eq!(record.artifact, names::NOTIF_RECEIVER);
        assert_eq!(action.produces(), Some(names::RECEIVER_CLONE));
    }

    #[tokio::test]
    async fn test_deploy_clone_reuses_recorded_clone() {
        let chain = MockChain::new(7);
        let artifacts = ArtifactStore::default();
        let factory = Address::with_last_byte(0x31);
        let clone = Address::with_last_byte(0x32);
        chain.respond(
            factory,
            SolCall::abi_encode(&IFactoryClone::deployedContractsCall { index: U256::ZERO }),
            clone.abi_encode(),
        );
        chain.set_code(clone);

        let action = SeedAction::DeployClone {
            factory: names::FACTORY.into(),
            from: Role::Wallet,
            name: names::RECEIVER_CLONE.into(),
            index: 0,
        };
        let accounts = NamedAccounts::from_accounts(chain.accounts().await.unwrap()).unwrap();
        let mut first = DeployContext::new(
            &chain,
            accounts.clone(),
            &artifacts,
            store_with(&[(names::FACTORY, factory)]),
        );
        action.apply(&mut first).await.unwrap();
        let recorded = first.store().get(names::RECEIVER_CLONE).unwrap().clone();
        assert_eq!(chain.sent().len(), 1);

        // A later run over the persisted store does not create another clone.
        let mut rerun = DeployContext::new(&chain, accounts.clone(), &artifacts, first.into_store());
        action.apply(&mut rerun).await.unwrap();
        assert_eq!(chain.sent().len(), 1);
        assert_eq!(rerun.store().get(names::RECEIVER_CLONE).unwrap(), &recorded);

        // Applying it twice in the same run is a no-op too.
        action.apply(&mut rerun).await.unwrap();
        assert_eq!(chain.sent().len(), 1);

        // Once the clone is gone from the chain, it is created again.
        chain.wipe_code(clone);
        let mut restarted = DeployContext::new(&chain, accounts, &artifacts, rerun.into_store());
        action.apply(&mut restarted).await.unwrap();
        assert_eq!(chain.sent().len(), 2);
        assert_ne!(
            restarted.store().get(names::RECEIVER_CLONE).unwrap().tx_hash,
            recorded.tx_hash
        );
    }
}
