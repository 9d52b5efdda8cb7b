//! Constructor arguments, address references and token amounts.

use std::{fmt, str::FromStr};

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{
        Address, U256,
        utils::{format_ether, parse_ether},
    },
};
use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::accounts::Role;

/// A constructor argument as declared by a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Arg {
    /// The address of an earlier deployment.
    Deployed(String),
    /// The address of a named account.
    Account(Role),
    /// `address(0)`.
    ZeroAddress,
    String(String),
    Uint(U256),
    Array(Vec<Arg>),
}

impl Arg {
    pub fn deployed(name: impl Into<String>) -> Self {
        Self::Deployed(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Every deployment name this argument refers to.
    pub fn references(&self) -> Vec<&str> {
        match self {
            Self::Deployed(name) => vec![name.as_str()],
            Self::Array(items) => items.iter().flat_map(Arg::references).collect(),
            _ => vec![],
        }
    }

    /// Resolve references with `lookup`.
    pub fn resolve<E>(
        &self,
        lookup: &impl Fn(&AddressRef) -> Result<Address, E>,
    ) -> Result<ArgValue, E> {
        Ok(match self {
            Self::Deployed(name) => ArgValue::Address(lookup(&AddressRef::Deployment(name.clone()))?),
            Self::Account(role) => ArgValue::Address(lookup(&AddressRef::Account(*role))?),
            Self::ZeroAddress => ArgValue::Address(Address::ZERO),
            Self::String(value) => ArgValue::String(value.clone()),
            Self::Uint(value) => ArgValue::Uint(*value),
            Self::Array(items) => ArgValue::Array(
                items
                    .iter()
                    .map(|item| item.resolve(lookup))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deployed(name) => write!(f, "{name}"),
            Self::Account(role) => write!(f, "<{role}>"),
            Self::ZeroAddress => write!(f, "address(0)"),
            Self::String(value) => write!(f, "{value:?}"),
            Self::Uint(value) => write!(f, "{value}"),
            Self::Array(items) => {
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

/// A resolved constructor argument, as recorded with the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum ArgValue {
    Address(Address),
    String(String),
    Uint(U256),
    Array(Vec<ArgValue>),
}

impl ArgValue {
    pub fn to_sol(&self) -> DynSolValue {
        match self {
            Self::Address(address) => DynSolValue::Address(*address),
            Self::String(value) => DynSolValue::String(value.clone()),
            Self::Uint(value) => DynSolValue::Uint(*value, 256),
            Self::Array(items) => DynSolValue::Array(items.iter().map(ArgValue::to_sol).collect()),
        }
    }

    /// ABI-encode a full argument list, as appended to creation bytecode.
    pub fn encode_all(values: &[ArgValue]) -> Vec<u8> {
        if values.is_empty() {
            return Vec::new();
        }
        DynSolValue::Tuple(values.iter().map(ArgValue::to_sol).collect()).abi_encode_params()
    }
}

/// An address that is either a deployment or a named account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressRef {
    Deployment(String),
    Account(Role),
}

impl AddressRef {
    pub fn deployment(name: impl Into<String>) -> Self {
        Self::Deployment(name.into())
    }

    /// The deployment this reference depends on, if any.
    pub fn deployment_name(&self) -> Option<&str> {
        match self {
            Self::Deployment(name) => Some(name),
            Self::Account(_) => None,
        }
    }
}

impl fmt::Display for AddressRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deployment(name) => write!(f, "{name}"),
            Self::Account(role) => write!(f, "<{role}>"),
        }
    }
}

/// A token amount in wei, written in configuration as a decimal ether string (`"10"`, `"0.5"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Amount(pub U256);

impl Amount {
    /// Whole ether.
    pub fn ether(value: u64) -> Self {
        Self(U256::from(value) * U256::from(10u64).pow(U256::from(18)))
    }

    pub fn wei(&self) -> U256 {
        self.0
    }
}

impl FromStr for Amount {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_ether(s.trim())
            .map(Self)
            .with_context(|| format!("Invalid ether amount '{s}'"))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = format_ether(self.0);
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        write!(f, "{trimmed} ether")
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_ether(self.0))
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
