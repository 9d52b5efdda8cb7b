use crate::{
    accounts::Role,
    args::AddressRef,
    contracts::names,
    seed::SeedAction,
    wiring::{WiringCall, WiringDirective},
};

use super::{DeployTarget, Tag, Topology};

/// Register the receiver and the lending adapter with the custody contract.
///
/// The factory topology also creates the first receiver clone, owned by `wallet`.
pub(super) fn target(topology: Topology) -> DeployTarget {
    let target = DeployTarget::new(Tag::Registration).depends_on([Tag::NotifReceiver, Tag::Aave]);

    match topology {
        Topology::Vault => target
            .wire(WiringDirective::owner(WiringCall::AddReceiver {
                vault: names::VAULT.into(),
                receiver: AddressRef::deployment(names::NOTIF_RECEIVER),
            }))
            .wire(WiringDirective::owner(WiringCall::AddLendingProtocol {
                vault: names::VAULT.into(),
                receiver: names::NOTIF_RECEIVER.into(),
                protocol: names::AAVE_PROTOCOL.into(),
            })),
        Topology::FactoryClone => target
            .wire(WiringDirective::owner(WiringCall::AddFactoryLendingProtocol {
                factory: names::FACTORY.into(),
                protocol: names::AAVE_PROTOCOL.into(),
            }))
            .seed(SeedAction::DeployClone {
                factory: names::FACTORY.into(),
                from: Role::Wallet,
                name: names::RECEIVER_CLONE.into(),
                index: 0,
            }),
    }
}
