use crate::{args::Arg, contracts::names};

use super::{ContractSpec, DeployTarget, Tag, Topology};

/// The custody contract and the margin notification receiver.
///
/// In the factory topology the receiver is deployed uninitialized and serves as the clone
/// implementation.
pub(super) fn target(topology: Topology) -> DeployTarget {
    let target = DeployTarget::new(Tag::NotifReceiver).depends_on([Tag::Tokens, Tag::LimitOrderProtocol]);

    match topology {
        Topology::Vault => target
            .contract(ContractSpec::new(names::VAULT).args([
                Arg::deployed(names::LIMIT_ORDER_PROTOCOL),
                Arg::deployed(names::WETH),
            ]))
            .contract(ContractSpec::new(names::NOTIF_RECEIVER).args([
                Arg::deployed(names::VAULT),
                Arg::deployed(names::LIMIT_ORDER_PROTOCOL),
            ])),
        Topology::FactoryClone => target
            .contract(
                ContractSpec::new(names::NOTIF_RECEIVER)
                    .args([Arg::ZeroAddress, Arg::deployed(names::LIMIT_ORDER_PROTOCOL)]),
            )
            .contract(ContractSpec::new(names::FACTORY).args([
                Arg::deployed(names::NOTIF_RECEIVER),
                Arg::deployed(names::LIMIT_ORDER_PROTOCOL),
                Arg::deployed(names::WETH),
            ])),
    }
}
