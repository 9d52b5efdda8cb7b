use crate::{
    accounts::Role,
    args::{AddressRef, Amount, Arg},
    contracts::names,
    seed::SeedAction,
    wiring::{WiringCall, WiringDirective},
};

use super::{ContractSpec, DeployTarget, Tag, Topology};

/// Liquidity the owner deposits into the pool for each asset.
const SEED_LIQUIDITY_ETHER: u64 = 10;

/// The Aave mock stack and the lending adapter on top of it.
pub(super) fn target(topology: Topology) -> DeployTarget {
    let custodian = match topology {
        Topology::Vault => names::VAULT,
        Topology::FactoryClone => names::FACTORY,
    };

    let target = DeployTarget::new(Tag::Aave)
        .depends_on([Tag::NotifReceiver])
        .contract(ContractSpec::new(names::POOL_CORE))
        .contract(ContractSpec::new(names::PROVIDER))
        .contract(ContractSpec::new(names::VARIABLE_DEBT))
        .contract(ContractSpec::new(names::ADAI).args([Arg::deployed(names::DAI)]))
        .contract(ContractSpec::new(names::AWETH).args([Arg::deployed(names::WETH)]))
        .contract(ContractSpec::new(names::POOL).args([
            Arg::Array(vec![Arg::deployed(names::DAI), Arg::deployed(names::WETH)]),
            Arg::Array(vec![Arg::deployed(names::ADAI), Arg::deployed(names::AWETH)]),
            Arg::Array(vec![Arg::ZeroAddress, Arg::ZeroAddress]),
            Arg::Array(vec![Arg::deployed(names::VARIABLE_DEBT), Arg::ZeroAddress]),
        ]))
        .contract(
            ContractSpec::new(names::AAVE_PROTOCOL)
                .args([Arg::deployed(custodian), Arg::deployed(names::PROVIDER)]),
        )
        .wire(WiringDirective::owner(WiringCall::SetLendingPool {
            provider: names::PROVIDER.into(),
            pool: names::POOL.into(),
        }))
        .wire(WiringDirective::owner(WiringCall::SetLendingPoolCore {
            provider: names::PROVIDER.into(),
            core: names::POOL_CORE.into(),
        }))
        .wire(WiringDirective::owner(WiringCall::SetATokenPool {
            token: names::ADAI.into(),
            pool: names::POOL.into(),
        }))
        .wire(WiringDirective::owner(WiringCall::SetATokenPool {
            token: names::AWETH.into(),
            pool: names::POOL.into(),
        }));

    let amount = Amount::ether(SEED_LIQUIDITY_ETHER);
    let owner = AddressRef::Account(Role::Owner);
    let pool = AddressRef::deployment(names::POOL);

    target
        .seed(SeedAction::Mint {
            token: names::DAI.into(),
            from: Role::Owner,
            to: owner.clone(),
            amount,
        })
        .seed(SeedAction::Approve {
            token: names::DAI.into(),
            from: Role::Owner,
            spender: pool.clone(),
            amount,
        })
        .seed(SeedAction::Deposit {
            pool: names::POOL.into(),
            asset: names::DAI.into(),
            from: Role::Owner,
            amount,
            on_behalf_of: owner.clone(),
        })
        .seed(SeedAction::Wrap {
            weth: names::WETH.into(),
            from: Role::Owner,
            amount,
        })
        .seed(SeedAction::Approve {
            token: names::WETH.into(),
            from: Role::Owner,
            spender: pool,
            amount,
        })
        .seed(SeedAction::Deposit {
            pool: names::POOL.into(),
            asset: names::WETH.into(),
            from: Role::Owner,
            amount,
            on_behalf_of: owner,
        })
}
