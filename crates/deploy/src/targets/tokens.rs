use crate::{args::Arg, contracts::names};

use super::{ContractSpec, DeployTarget, Tag};

/// `WETH` and a mintable DAI.
pub(super) fn target() -> DeployTarget {
    DeployTarget::new(Tag::Tokens)
        .contract(ContractSpec::new(names::WETH))
        .contract(
            ContractSpec::new(names::DAI).args([Arg::string("Dai Stable Coin"), Arg::string("DAI")]),
        )
}
