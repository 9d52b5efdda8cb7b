//! Per-run deployment state: the chain, the signers and the records deployed so far.

use std::{collections::HashSet, path::PathBuf};

use alloy_core::primitives::{Address, U256};
use alloy_sol_types::SolCall;
use anyhow::{Context, Result};
use chrono::Utc;

use crate::{
    DeployError,
    accounts::{NamedAccounts, Role},
    args::{AddressRef, ArgValue},
    artifacts::ArtifactStore,
    chain::{Chain, TransactionReceipt, TransactionRequest},
    record::{DeploymentRecord, DeploymentStore, fingerprint},
    targets::ContractSpec,
};

/// The result of [`DeployContext::deploy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub record: DeploymentRecord,
    /// Whether an existing record was re-used instead of sending a transaction.
    pub reused: bool,
}

/// Everything a target needs to construct, configure and seed its contracts.
pub struct DeployContext<'a, C> {
    chain: &'a C,
    accounts: NamedAccounts,
    artifacts: &'a ArtifactStore,
    store: DeploymentStore,
    /// Names deployed or re-used during this run.
    touched: HashSet<String>,
    persist_to: Option<PathBuf>,
}

impl<'a, C: Chain> DeployContext<'a, C> {
    pub fn new(
        chain: &'a C,
        accounts: NamedAccounts,
        artifacts: &'a ArtifactStore,
        store: DeploymentStore,
    ) -> Self {
        Self {
            chain,
            accounts,
            artifacts,
            store,
            touched: HashSet::new(),
            persist_to: None,
        }
    }

    /// Rewrite the store at `path` after every new record.
    pub fn persist_to(mut self, path: PathBuf) -> Self {
        self.persist_to = Some(path);
        self
    }

    pub fn chain(&self) -> &'a C {
        self.chain
    }

    pub fn accounts(&self) -> &NamedAccounts {
        &self.accounts
    }

    pub fn store(&self) -> &DeploymentStore {
        &self.store
    }

    pub fn into_store(self) -> DeploymentStore {
        self.store
    }

    /// The address of a named account.
    pub fn account(&self, role: Role) -> Address {
        self.accounts.get(role)
    }

    /// The address a deployment was recorded under.
    pub fn address_of(&self, name: &str) -> Result<Address, DeployError> {
        self.store.address(name)
    }

    pub fn resolve(&self, reference: &AddressRef) -> Result<Address, DeployError> {
        match reference {
            AddressRef::Deployment(name) => self.address_of(name),
            AddressRef::Account(role) => Ok(self.account(*role)),
        }
    }

    /// Deploy `spec`, or re-use the record already stored under its name.
    ///
    /// A record touched earlier in this run must have the same fingerprint. A record from a
    /// previous run is re-used only when its fingerprint matches and its address still has code.
    pub async fn deploy(&mut self, spec: &ContractSpec) -> Result<Deployment> {
        let artifacts = self.artifacts;
        let artifact = artifacts.get(spec.artifact())?;
        let args = spec
            .args
            .iter()
            .map(|arg| arg.resolve(&|reference: &AddressRef| self.resolve(reference)))
            .collect::<Result<Vec<_>, _>>()?;
        let encoded_args = ArgValue::encode_all(&args);
        let fingerprint = fingerprint(&artifact.bytecode, &encoded_args);

        if let Ok(existing) = self.store.get(&spec.name) {
            if self.touched.contains(&spec.name) {
                if existing.fingerprint != fingerprint {
                    return Err(DeployError::ConflictingDeployment(spec.name.clone()).into());
                }
                return Ok(Deployment {
                    record: existing.clone(),
                    reused: true,
                });
            }

            let has_code = !self
                .chain
                .code_at(existing.address)
                .await
                .with_context(|| format!("Failed to fetch code of {}", spec.name))?
                .is_empty();

            if existing.fingerprint == fingerprint && has_code {
                tracing::info!(name = %spec.name, address = %existing.address, "Re-using deployment");
                let record = existing.clone();
                self.touched.insert(spec.name.clone());
                return Ok(Deployment {
                    record,
                    reused: true,
                });
            }

            tracing::info!(
                name = %spec.name,
                address = %existing.address,
                fingerprint_changed = existing.fingerprint != fingerprint,
                has_code,
                "Stored deployment is stale, redeploying"
            );
        }

        let from = self.account(spec.from);
        let init_code = [artifact.bytecode.as_ref(), encoded_args.as_slice()].concat();
        let receipt = self
            .chain
            .send_transaction(TransactionRequest::create(from, init_code))
            .await
            .with_context(|| format!("Failed to deploy {}", spec.name))?;
        let address = receipt
            .contract_address
            .with_context(|| format!("Receipt for {} has no contract address", spec.name))?;

        let record = DeploymentRecord {
            name: spec.name.clone(),
            address,
            artifact: artifact.name.clone(),
            args,
            fingerprint,
            tx_hash: receipt.transaction_hash,
            deployer: from,
            deployed_at: Utc::now(),
        };

        tracing::info!(
            name = %record.name,
            address = %record.address,
            tx_hash = %record.tx_hash,
            "Contract deployed"
        );

        self.insert(record.clone())?;
        Ok(Deployment {
            record,
            reused: false,
        })
    }

    /// The record stored under `name` for a contract `factory` created, when it can be re-used.
    ///
    /// A record from a previous run is re-used only when it names the same factory and its
    /// address still has code. The re-used record becomes part of this run.
    pub async fn reuse_created(
        &mut self,
        name: &str,
        factory: Address,
    ) -> Result<Option<DeploymentRecord>> {
        let Ok(existing) = self.store.get(name) else {
            return Ok(None);
        };
        let existing = existing.clone();

        let same_factory = existing.args == [ArgValue::Address(factory)];
        if self.touched.contains(name) {
            if !same_factory {
                return Err(DeployError::ConflictingDeployment(name.to_string()).into());
            }
            return Ok(Some(existing));
        }

        let has_code = !self
            .chain
            .code_at(existing.address)
            .await
            .with_context(|| format!("Failed to fetch code of {name}"))?
            .is_empty();

        if same_factory && has_code {
            tracing::info!(name = %name, address = %existing.address, "Re-using created contract");
            self.touched.insert(name.to_string());
            return Ok(Some(existing));
        }

        tracing::info!(
            name = %name,
            address = %existing.address,
            same_factory,
            has_code,
            "Stored created contract is stale, creating it again"
        );
        Ok(None)
    }

    /// Record a contract that `factory` created in a transaction sent by `sender`.
    pub fn record_created(
        &mut self,
        name: &str,
        artifact: &str,
        address: Address,
        factory: Address,
        sender: Address,
        receipt: &TransactionReceipt,
    ) -> Result<DeploymentRecord> {
        if self.touched.contains(name) {
            return Err(DeployError::ConflictingDeployment(name.to_string()).into());
        }

        let record = DeploymentRecord {
            name: name.to_string(),
            address,
            artifact: artifact.to_string(),
            args: vec![ArgValue::Address(factory)],
            fingerprint: fingerprint(factory.as_slice(), address.as_slice()),
            tx_hash: receipt.transaction_hash,
            deployer: sender,
            deployed_at: Utc::now(),
        };
        tracing::info!(name = %record.name, address = %record.address, "Created contract recorded");

        self.insert(record.clone())?;
        Ok(record)
    }

    fn insert(&mut self, record: DeploymentRecord) -> Result<()> {
        self.touched.insert(record.name.clone());
        self.store.insert(record);
        if let Some(path) = &self.persist_to {
            self.store.save(path)?;
        }
        Ok(())
    }

    /// Send `call` to `to` from the account of `from`.
    pub async fn execute<T: SolCall>(
        &self,
        from: Role,
        to: Address,
        call: T,
    ) -> Result<TransactionReceipt> {
        self.execute_with_value(from, to, call, U256::ZERO).await
    }

    /// Send `call` with native value attached.
    pub async fn execute_with_value<T: SolCall>(
        &self,
        from: Role,
        to: Address,
        call: T,
        value: U256,
    ) -> Result<TransactionReceipt> {
        let sender = self.account(from);
        let tx = TransactionRequest::call(sender, to, call.abi_encode()).with_value(value);
        let receipt = self
            .chain
            .send_transaction(tx)
            .await
            .with_context(|| format!("{} on {to} from {from} failed", T::SIGNATURE))?;

        tracing::debug!(
            function = T::SIGNATURE,
            %to,
            from = %from,
            tx_hash = %receipt.transaction_hash,
            "Call executed"
        );
        Ok(receipt)
    }

    /// Read a view function of `to`.
    pub async fn read<T: SolCall>(&self, to: Address, call: T) -> Result<T::Return> {
        let tx = TransactionRequest::call(self.account(Role::Wallet), to, call.abi_encode());
        let output = self
            .chain
            .call(tx)
            .await
            .with_context(|| format!("Failed to read {} on {to}", T::SIGNATURE))?;
        T::abi_decode_returns(&output, true)
            .with_context(|| format!("Failed to decode {} output", T::SIGNATURE))
    }
}
