//! Deployment records and their persisted store.

use std::{
    collections::BTreeMap,
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::{Table, presets::UTF8_FULL_CONDENSED};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{DeployError, args::ArgValue};

/// Name of the persisted store inside a network's deployments directory.
pub const DEPLOYMENTS_FILE: &str = "deployments.json";

/// A deployed contract, addressed by its logical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub name: String,
    pub address: Address,
    pub artifact: String,
    #[serde(default)]
    pub args: Vec<ArgValue>,
    pub fingerprint: String,
    pub tx_hash: B256,
    pub deployer: Address,
    pub deployed_at: DateTime<Utc>,
}

/// Compute the fingerprint of a deployment: SHA-256 over the creation bytecode followed by
/// the ABI-encoded constructor arguments, hex encoded.
pub fn fingerprint(bytecode: &[u8], encoded_args: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytecode);
    hasher.update(encoded_args);
    hex::encode(hasher.finalize())
}

/// Deployment records for one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStore {
    pub chain_id: u64,
    records: BTreeMap<String, DeploymentRecord>,
}

impl DeploymentStore {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            records: BTreeMap::new(),
        }
    }

    /// Look up a record by name.
    pub fn get(&self, name: &str) -> Result<&DeploymentRecord, DeployError> {
        self.records
            .get(name)
            .ok_or_else(|| DeployError::MissingDeployment(name.to_string()))
    }

    pub fn address(&self, name: &str) -> Result<Address, DeployError> {
        self.get(name).map(|record| record.address)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Insert a record, replacing any previous record with the same name.
    pub fn insert(&mut self, record: DeploymentRecord) -> Option<DeploymentRecord> {
        self.records.insert(record.name.clone(), record)
    }

    pub fn remove(&mut self, name: &str) -> Option<DeploymentRecord> {
        self.records.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn records(&self) -> impl Iterator<Item = &DeploymentRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The persisted store path for `network` below `root`.
    pub fn path_for(root: &Path, network: &str) -> PathBuf {
        root.join(network).join(DEPLOYMENTS_FILE)
    }

    /// Load the store at `path`.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read deployments from {}", path.display()))?;
        let store = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse deployments from {}", path.display()))?;

        Ok(Some(store))
    }

    /// Load the store at `path`, discarding it when it was written for another chain.
    pub fn load_for_chain(path: &Path, chain_id: u64) -> Result<Self> {
        match Self::load(path)? {
            Some(store) if store.chain_id == chain_id => {
                tracing::debug!(path = %path.display(), records = store.len(), "Loaded deployments");
                Ok(store)
            }
            Some(store) => {
                tracing::warn!(
                    path = %path.display(),
                    stored_chain_id = store.chain_id,
                    chain_id,
                    "Deployments belong to another chain, starting fresh"
                );
                Ok(Self::new(chain_id))
            }
            None => Ok(Self::new(chain_id)),
        }
    }

    /// Write the store to `path` while holding an exclusive lock on it.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize deployments")?;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("Failed to lock {}", path.display()))?;

        let written = overwrite(&mut file, json.as_bytes());
        FileExt::unlock(&file).context("Failed to unlock deployments file")?;
        written.with_context(|| format!("Failed to write deployments to {}", path.display()))?;

        Ok(())
    }

    /// Render the records as a table.
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED).set_header(vec![
            "Name",
            "Address",
            "Artifact",
            "Deployer",
            "Deployed at",
        ]);

        for record in self.records() {
            table.add_row(vec![
                record.name.clone(),
                record.address.to_string(),
                record.artifact.clone(),
                record.deployer.to_string(),
                record.deployed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]);
        }

        table
    }
}

fn overwrite(file: &mut File, content: &[u8]) -> std::io::Result<()> {
    file.set_len(0)?;
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn record(name: &str, last_byte: u8) -> DeploymentRecord {
        DeploymentRecord {
            name: name.to_string(),
            address: Address::with_last_byte(last_byte),
            artifact: name.to_string(),
            args: vec![ArgValue::String("DAI".to_string())],
            fingerprint: fingerprint(&[0x60, 0x80], &[]),
            tx_hash: B256::with_last_byte(last_byte),
            deployer: Address::with_last_byte(1),
            deployed_at: Utc::now(),
        }
    }

    #[test]
    fn test_fingerprint_determinism() {
        let a = fingerprint(&[0x60, 0x80], &[0x01]);
        assert_eq!(a, fingerprint(&[0x60, 0x80], &[0x01]));
        assert_eq!(a.len(), 64, "SHA-256 hash should be 64 hex characters");
        assert_ne!(a, fingerprint(&[0x60, 0x80], &[0x02]));
    }

    #[test]
    fn test_missing_deployment() {
        let store = DeploymentStore::new(1);
        assert_eq!(
            store.address("Vault").unwrap_err(),
            DeployError::MissingDeployment("Vault".to_string())
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new("deployments").unwrap();
        let path = DeploymentStore::path_for(dir.path(), "localhost");

        let mut store = DeploymentStore::new(31337);
        store.insert(record("WETH", 2));
        store.insert(record("ERC20Mock", 3));
        store.save(&path).unwrap();

        let loaded = DeploymentStore::load(&path).unwrap().unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["ERC20Mock", "WETH"]);

        // Rewriting a shorter store must not leave trailing bytes behind.
        store.remove("ERC20Mock");
        store.save(&path).unwrap();
        assert_eq!(DeploymentStore::load(&path).unwrap().unwrap().len(), 1);
    }

    #[test]
    fn test_load_for_other_chain_starts_fresh() {
        let dir = TempDir::new("deployments").unwrap();
        let path = DeploymentStore::path_for(dir.path(), "hardhat");

        let mut store = DeploymentStore::new(1);
        store.insert(record("WETH", 2));
        store.save(&path).unwrap();

        assert_eq!(DeploymentStore::load_for_chain(&path, 1).unwrap().len(), 1);
        assert!(DeploymentStore::load_for_chain(&path, 5).unwrap().is_empty());
        assert!(DeploymentStore::load(&dir.path().join("none.json")).unwrap().is_none());
    }

    #[test]
    fn test_table_lists_records() {
        let mut store = DeploymentStore::new(1);
        store.insert(record("Vault", 9));
        let rendered = store.table().to_string();
        assert!(rendered.contains("Vault"));
        assert!(rendered.contains("Address"));
    }
}
