//! In-memory [`Chain`] used by the unit tests.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use alloy_core::primitives::{Address, B256, Bytes, U64, U256, keccak256};
use anyhow::Result;

use crate::{
    DeployError,
    artifacts::{Artifact, ArtifactStore},
    chain::{Chain, TransactionReceipt, TransactionRequest},
    contracts::names,
};

/// Runtime code assigned to every contract the mock creates.
const MOCK_RUNTIME_CODE: &[u8] = &[0x60, 0x80, 0x60, 0x40, 0x52];

#[derive(Debug, Clone, Default)]
struct MockState {
    nonces: HashMap<Address, u64>,
    code: HashMap<Address, Bytes>,
    balances: HashMap<Address, U256>,
    sent: Vec<TransactionRequest>,
}

#[derive(Debug, Default)]
struct Inner {
    chain_id: u64,
    accounts: Vec<Address>,
    state: MockState,
    snapshots: Vec<MockState>,
    restricted: HashMap<[u8; 4], Address>,
    responses: HashMap<(Address, Bytes), Bytes>,
    revert_creations: bool,
}

/// A deterministic chain: contract addresses follow the sender nonce, calls succeed unless a
/// selector is restricted to another sender, and reads answer from canned responses.
#[derive(Debug)]
pub(crate) struct MockChain {
    inner: Mutex<Inner>,
}

impl MockChain {
    /// A chain whose accounts are derived from `seed`, so two seeds never share addresses.
    pub(crate) fn new(seed: u8) -> Self {
        let accounts = (0..10u8)
            .map(|i| {
                let mut bytes = [seed; 20];
                bytes[19] = i;
                Address::from(bytes)
            })
            .collect();

        Self {
            inner: Mutex::new(Inner {
                chain_id: 31337,
                accounts,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("mock chain lock poisoned")
    }


    /// Only `sender` may call functions with `selector`.
    pub(crate) fn restrict(&self, selector: [u8; 4], sender: Address) {
        self.lock().restricted.insert(selector, sender);
    }

    /// Answer `eth_call` to `to` with `calldata` by returning `output`.
    pub(crate) fn respond(&self, to: Address, calldata: Vec<u8>, output: Vec<u8>) {
        self.lock()
            .responses
            .insert((to, Bytes::from(calldata)), Bytes::from(output));
    }

    /// Make every contract creation revert.
    pub(crate) fn revert_creations(&self) {
        self.lock().revert_creations = true;
    }

    /// Give `address` code, as if some other transaction had created a contract there.
    pub(crate) fn set_code(&self, address: Address) {
        self.lock()
            .state
            .code
            .insert(address, Bytes::from_static(MOCK_RUNTIME_CODE));
    }

    /// Remove the code at `address`, as a node restart would.
    pub(crate) fn wipe_code(&self, address: Address) {
        self.lock().state.code.remove(&address);
    }

    /// Every transaction that was mined, in order.
    pub(crate) fn sent(&self) -> Vec<TransactionRequest> {
        self.lock().state.sent.clone()
    }

    pub(crate) fn account(&self, index: usize) -> Address {
        self.lock().accounts[index]
    }
}

impl Chain for MockChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.lock().chain_id)
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.lock().accounts.clone())
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TransactionReceipt> {
        let mut inner = self.lock();

        if let Some(selector) = tx.selector() {
            if let Some(allowed) = inner.restricted.get(&selector) {
                if *allowed != tx.from {
                    return Err(DeployError::Reverted {
                        from: tx.from,
                        reason: "caller is not authorized".to_string(),
                    }
                    .into());
                }
            }
        }
        if tx.to.is_none() && inner.revert_creations {
            return Err(DeployError::Reverted {
                from: tx.from,
                reason: "contract creation reverted".to_string(),
            }
            .into());
        }

        let nonce = inner.state.nonces.entry(tx.from).or_default();
        let current = *nonce;
        *nonce += 1;

        let contract_address = tx.to.is_none().then(|| tx.from.create(current));
        if let Some(address) = contract_address {
            inner
                .state
                .code
                .insert(address, Bytes::from_static(MOCK_RUNTIME_CODE));
        }

        let hash_input = [tx.from.as_slice(), &current.to_be_bytes()].concat();
        let transaction_hash: B256 = keccak256(hash_input);
        let block = inner.state.sent.len() as u64 + 1;
        inner.state.sent.push(tx);

        Ok(TransactionReceipt {
            transaction_hash,
            block_number: Some(U64::from(block)),
            contract_address,
            gas_used: Some(U256::from(21_000)),
            status: U64::from(1),
        })
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Bytes> {
        let inner = self.lock();
        let to = tx.to.unwrap_or_default();
        inner
            .responses
            .get(&(to, tx.data.clone()))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no mock response for call to {to}"))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes> {
        Ok(self.lock().state.code.get(&address).cloned().unwrap_or_default())
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        Ok(self
            .lock()
            .state
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn snapshot(&self) -> Result<U256> {
        let mut inner = self.lock();
        let state = inner.state.clone();
        inner.snapshots.push(state);
        Ok(U256::from(inner.snapshots.len() - 1))
    }

    async fn revert(&self, id: U256) -> Result<bool> {
        let mut inner = self.lock();
        let id: usize = id.to();
        if id >= inner.snapshots.len() {
            return Ok(false);
        }
        inner.snapshots.truncate(id + 1);
        let state = inner.snapshots.pop().unwrap_or_default();
        inner.state = state;
        Ok(true)
    }
}

/// An artifact for every contract the catalog deploys, with distinct placeholder bytecode.
pub(crate) fn mock_artifacts() -> ArtifactStore {
    let all = [
        names::WETH,
        names::DAI,
        names::LIMIT_ORDER_PROTOCOL,
        names::VAULT,
        names::NOTIF_RECEIVER,
        names::FACTORY,
        names::POOL_CORE,
        names::PROVIDER,
        names::VARIABLE_DEBT,
        names::ADAI,
        names::AWETH,
        names::POOL,
        names::AAVE_PROTOCOL,
    ];

    let mut store = ArtifactStore::default();
    for (i, name) in all.iter().enumerate() {
        store.insert(Artifact {
            name: name.to_string(),
            abi: serde_json::json!([]),
            bytecode: Bytes::from(vec![0x60, i as u8]),
        });
    }
    store
}
