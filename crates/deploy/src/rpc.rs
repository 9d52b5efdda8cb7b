//! Shared RPC utilities for interacting with Ethereum JSON-RPC endpoints.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U64, U256};
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::{
    DeployError,
    chain::{Chain, TransactionReceipt, TransactionRequest},
};

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between polling attempts when waiting for readiness.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// An error object returned by the node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("RPC error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    /// Whether the node rejected the request because execution reverted.
    pub fn is_revert(&self) -> bool {
        self.code == 3 || self.message.to_lowercase().contains("revert")
    }
}

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// An error object in the response is returned as [`RpcError`].
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        return Err(RpcError {
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
        }
        .into());
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// Wait for a service to be ready by repeatedly calling a check function.
///
/// Returns an error once `timeout` has elapsed without a successful check.
pub async fn wait_until_ready<F, Fut>(
    name: &str,
    timeout: Duration,
    check_fn: F,
) -> Result<(), anyhow::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<(), anyhow::Error>>,
{
    let start = std::time::Instant::now();

    loop {
        if start.elapsed() > timeout {
            anyhow::bail!("Timeout waiting for {} to be ready", name);
        }

        match check_fn().await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::trace!(error = %e, service = %name, "Readiness check failed, retrying...");
            }
        }

        tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
    }
}

/// How long to poll for a transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptPolling {
    /// Maximum number of `eth_getTransactionReceipt` retries.
    pub attempts: usize,
    /// Delay between retries in milliseconds.
    pub delay_ms: u64,
}

impl Default for ReceiptPolling {
    fn default() -> Self {
        Self {
            attempts: 120,
            delay_ms: 500,
        }
    }
}

#[derive(Debug, Error)]
#[error("receipt for {0} not available yet")]
struct ReceiptPending(B256);

/// [`Chain`] backed by a JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcChain {
    client: reqwest::Client,
    url: Url,
    polling: ReceiptPolling,
}

impl RpcChain {
    pub fn new(url: Url, polling: ReceiptPolling) -> anyhow::Result<Self> {
        Ok(Self {
            client: create_client()?,
            url,
            polling,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> anyhow::Result<T> {
        json_rpc_call(&self.client, self.url.as_str(), method, params).await
    }

    /// Wait until the node answers `eth_chainId`.
    pub async fn wait_until_ready(&self, timeout: Duration) -> anyhow::Result<()> {
        wait_until_ready(self.url.as_str(), timeout, move || async move {
            self.chain_id().await.map(|_| ())
        })
        .await
    }

    async fn wait_for_receipt(&self, hash: B256) -> anyhow::Result<TransactionReceipt> {
        let backoff = ConstantBuilder::default()
            .with_delay(Duration::from_millis(self.polling.delay_ms))
            .with_max_times(self.polling.attempts);

        (move || async move {
            let receipt: Option<TransactionReceipt> = self
                .request("eth_getTransactionReceipt", vec![serde_json::json!(hash)])
                .await?;
            receipt.ok_or_else(|| anyhow::Error::from(ReceiptPending(hash)))
        })
        .retry(backoff)
        .when(|e: &anyhow::Error| e.is::<ReceiptPending>())
        .await
        .with_context(|| format!("Failed to fetch receipt for transaction {hash}"))
    }
}

/// Turn a node-side revert into [`DeployError::Reverted`].
fn map_revert(err: anyhow::Error, from: Address) -> anyhow::Error {
    match err.downcast_ref::<RpcError>() {
        Some(rpc) if rpc.is_revert() => DeployError::Reverted {
            from,
            reason: rpc.message.clone(),
        }
        .into(),
        _ => err,
    }
}

impl Chain for RpcChain {
    async fn chain_id(&self) -> anyhow::Result<u64> {
        let id: U64 = self.request("eth_chainId", vec![]).await?;
        Ok(id.to())
    }

    async fn accounts(&self) -> anyhow::Result<Vec<Address>> {
        self.request("eth_accounts", vec![]).await
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> anyhow::Result<TransactionReceipt> {
        let from = tx.from;
        let hash: B256 = self
            .request("eth_sendTransaction", vec![serde_json::to_value(&tx)?])
            .await
            .map_err(|e| map_revert(e, from))?;

        tracing::debug!(tx_hash = %hash, %from, "Transaction sent");

        let receipt = self.wait_for_receipt(hash).await?;
        if !receipt.succeeded() {
            return Err(DeployError::Reverted {
                from,
                reason: format!("transaction {hash} mined with status 0"),
            }
            .into());
        }

        Ok(receipt)
    }

    async fn call(&self, tx: TransactionRequest) -> anyhow::Result<Bytes> {
        let from = tx.from;
        self.request(
            "eth_call",
            vec![serde_json::to_value(&tx)?, serde_json::json!("latest")],
        )
        .await
        .map_err(|e| map_revert(e, from))
    }

    async fn code_at(&self, address: Address) -> anyhow::Result<Bytes> {
        self.request(
            "eth_getCode",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await
    }

    async fn balance(&self, address: Address) -> anyhow::Result<U256> {
        self.request(
            "eth_getBalance",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await
    }

    async fn snapshot(&self) -> anyhow::Result<U256> {
        self.request("evm_snapshot", vec![]).await
    }

    async fn revert(&self, id: U256) -> anyhow::Result<bool> {
        self.request("evm_revert", vec![serde_json::json!(id)]).await
    }
}
