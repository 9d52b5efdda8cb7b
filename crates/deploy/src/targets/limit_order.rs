use crate::contracts::names;

use super::{ContractSpec, DeployTarget, Tag};

pub(super) fn target() -> DeployTarget {
    DeployTarget::new(Tag::LimitOrderProtocol).contract(ContractSpec::new(names::LIMIT_ORDER_PROTOCOL))
}
