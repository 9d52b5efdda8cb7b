//! The seam between the orchestration and an Ethereum node.

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes, U64, U256};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A transaction to send with `eth_sendTransaction` or to simulate with `eth_call`.
///
/// `to == None` creates a contract from `data`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub from: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<U64>,
    pub data: Bytes,
}

impl TransactionRequest {
    /// A contract creation from `from`.
    pub fn create(from: Address, init_code: impl Into<Bytes>) -> Self {
        Self {
            from,
            data: init_code.into(),
            ..Default::default()
        }
    }

    /// A call to `to` from `from`.
    pub fn call(from: Address, to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from,
            to: Some(to),
            data: data.into(),
            ..Default::default()
        }
    }

    /// Attach native value to the transaction.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = (!value.is_zero()).then_some(value);
        self
    }

    /// The 4-byte function selector, if the request carries calldata for a call.
    pub fn selector(&self) -> Option<[u8; 4]> {
        if self.to.is_none() || self.data.len() < 4 {
            return None;
        }
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&self.data[..4]);
        Some(selector)
    }
}

/// The subset of a transaction receipt the orchestration reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub gas_used: Option<U256>,
    pub status: U64,
}

impl TransactionReceipt {
    /// Whether the transaction executed without reverting.
    pub fn succeeded(&self) -> bool {
        self.status == U64::from(1)
    }
}

/// An Ethereum node the deployment runs against.
///
/// Transactions are sent from node-managed accounts and every send resolves only once the
/// receipt is available, so callers observe strictly ordered state changes.
pub trait Chain: Send + Sync {
    /// The chain id reported by the node.
    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    /// The accounts the node can send from, in index order.
    fn accounts(&self) -> impl Future<Output = Result<Vec<Address>>> + Send;

    /// Send a transaction and wait for its receipt.
    ///
    /// A revert surfaces as [`crate::DeployError::Reverted`].
    fn send_transaction(
        &self,
        tx: TransactionRequest,
    ) -> impl Future<Output = Result<TransactionReceipt>> + Send;

    /// Execute a read-only call against the latest block.
    fn call(&self, tx: TransactionRequest) -> impl Future<Output = Result<Bytes>> + Send;

    /// The runtime code at `address`.
    fn code_at(&self, address: Address) -> impl Future<Output = Result<Bytes>> + Send;

    /// The native balance of `address`.
    fn balance(&self, address: Address) -> impl Future<Output = Result<U256>> + Send;

    /// Snapshot the chain state, returning the snapshot id.
    fn snapshot(&self) -> impl Future<Output = Result<U256>> + Send;

    /// Revert to a snapshot. The snapshot is consumed.
    fn revert(&self, id: U256) -> impl Future<Output = Result<bool>> + Send;
}
