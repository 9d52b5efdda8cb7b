//! Named account roles.

use alloy_core::primitives::Address;
use alloy_signer_local::{MnemonicBuilder, coins_bip39::English};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::DeployError;

/// The mnemonic anvil and hardhat derive their default accounts from.
pub const DEFAULT_MNEMONIC: &str = "test test test test test test test test test test test junk";

/// A named account role.
///
/// Roles map to fixed account indices:
/// - `wallet`: index 0, an ordinary funded account (order maker)
/// - `deployer`, `owner`: index 1, the privileged signer for deploys and wiring
/// - `receiver`: index 2
/// - `taker`: index 3, the order counterparty
/// - `recipient`: index 4, the beneficiary of lending operations
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
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Role {
    Wallet,
    Deployer,
    Owner,
    Receiver,
    Taker,
    Recipient,
}

impl Role {
    /// The account index this role resolves to.
    pub const fn index(self) -> usize {
        match self {
            Role::Wallet => 0,
            Role::Deployer | Role::Owner => 1,
            Role::Receiver => 2,
            Role::Taker => 3,
            Role::Recipient => 4,
        }
    }
}

/// Accounts resolved for every [`Role`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedAccounts {
    accounts: Vec<Address>,
}

impl NamedAccounts {
    /// The minimum number of accounts needed to resolve every role.
    pub const MIN_REQUIRED_ACCOUNTS: usize = 5;

    /// Create named accounts from the node's account list.
    ///
    /// Returns an error if fewer than [`Self::MIN_REQUIRED_ACCOUNTS`] are provided.
    pub fn from_accounts(accounts: Vec<Address>) -> Result<Self, DeployError> {
        if accounts.len() < Self::MIN_REQUIRED_ACCOUNTS {
            return Err(DeployError::NotEnoughAccounts {
                required: Self::MIN_REQUIRED_ACCOUNTS,
                available: accounts.len(),
            });
        }
        Ok(Self { accounts })
    }

    /// Derive the accounts from a BIP-39 mnemonic on the standard path.
    pub fn from_mnemonic(mnemonic: &str, count: usize) -> anyhow::Result<Self> {
        let accounts = (0..count.max(Self::MIN_REQUIRED_ACCOUNTS))
            .map(|index| derive_address(mnemonic, index as u32))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self::from_accounts(accounts)?)
    }

    /// The address of `role`.
    pub fn get(&self, role: Role) -> Address {
        self.accounts[role.index()]
    }

    /// All accounts, in index order.
    pub fn all(&self) -> &[Address] {
        &self.accounts
    }

    /// The role an address plays, if any. Shared indices report the first role.
    pub fn role_of(&self, address: Address) -> Option<Role> {
        use strum::IntoEnumIterator;
        Role::iter().find(|role| self.get(*role) == address)
    }
}

fn derive_address(mnemonic: &str, index: u32) -> anyhow::Result<Address> {
    let signer = MnemonicBuilder::<English>::default()
        .phrase(mnemonic)
        .index(index)
        .context("Invalid derivation index")?
        .build()
        .context("Failed to derive account from mnemonic")?;
    Ok(Address::from_slice(signer.address().as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_role_indices() {
        assert_eq!(Role::Wallet.index(), 0);
        assert_eq!(Role::Owner.index(), Role::Deployer.index());
        assert_eq!(Role::from_str("recipient").unwrap(), Role::Recipient);
        assert_eq!(Role::Taker.to_string(), "taker");
    }

    #[test]
    fn test_not_enough_accounts() {
        let err = NamedAccounts::from_accounts(vec![Address::ZERO; 3]).unwrap_err();
        assert_eq!(
            err,
            DeployError::NotEnoughAccounts {
                required: 5,
                available: 3
            }
        );
    }

    #[test]
    fn test_roles_resolve_by_index() {
        let accounts: Vec<Address> = (0..6u8).map(Address::with_last_byte).collect();
        let named = NamedAccounts::from_accounts(accounts).unwrap();

        assert_eq!(named.get(Role::Wallet), Address::with_last_byte(0));
        assert_eq!(named.get(Role::Owner), Address::with_last_byte(1));
        assert_eq!(named.get(Role::Recipient), Address::with_last_byte(4));
        assert_eq!(named.role_of(Address::with_last_byte(1)), Some(Role::Deployer));
        assert_eq!(named.role_of(Address::with_last_byte(5)), None);
    }

    #[test]
    fn test_default_mnemonic_derivation() {
        let named = NamedAccounts::from_mnemonic(DEFAULT_MNEMONIC, 5).unwrap();

        assert_eq!(
            named.get(Role::Wallet),
            Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap()
        );
        assert_eq!(
            named.get(Role::Owner),
            Address::from_str("0x70997970C51812dc3A010C7d01b50e0d17dc79C8").unwrap()
        );
    }
}
