//! Compiled contract artifacts.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Bytes;
use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

use crate::DeployError;

/// A compiled contract: its ABI and creation bytecode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub abi: Value,
    pub bytecode: Bytes,
}

/// Hardhat writes `bytecode` as a hex string, foundry as `{ "object": "0x.." }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(Bytes),
    Object { object: Bytes },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    #[serde(default)]
    contract_name: Option<String>,
    #[serde(default)]
    abi: Value,
    bytecode: RawBytecode,
}

impl Artifact {
    /// Parse an artifact file's content. `stem` names foundry artifacts, which carry no
    /// contract name of their own.
    ///
    /// Returns `None` for JSON files that are not artifacts.
    pub fn parse(stem: &str, content: &str) -> anyhow::Result<Option<Self>> {
        let value: Value = serde_json::from_str(content).context("Invalid JSON")?;
        if value.get("bytecode").is_none() {
            return Ok(None);
        }

        let raw: RawArtifact =
            serde_json::from_value(value).context("Failed to parse artifact")?;
        let bytecode = match raw.bytecode {
            RawBytecode::Hex(bytes) | RawBytecode::Object { object: bytes } => bytes,
        };

        Ok(Some(Self {
            name: raw.contract_name.unwrap_or_else(|| stem.to_string()),
            abi: raw.abi,
            bytecode,
        }))
    }
}

/// Artifacts indexed by contract name.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    artifacts: BTreeMap<String, Artifact>,
}

impl ArtifactStore {
    /// Load every artifact below `dir`.
    ///
    /// Interfaces and abstract contracts (empty bytecode) are skipped, as are hardhat's
    /// `*.dbg.json` files. When two files define the same name the first one in path order wins.
    pub fn load_dir(dir: &Path) -> anyhow::Result<Self> {
        let mut files = Vec::new();
        collect_json_files(dir, &mut files)
            .with_context(|| format!("Failed to read artifacts from {}", dir.display()))?;
        files.sort();

        let mut store = Self::default();
        for path in files {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();

            let artifact = match Artifact::parse(stem, &content) {
                Ok(Some(artifact)) if !artifact.bytecode.is_empty() => artifact,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable artifact");
                    continue;
                }
            };

            if store.artifacts.contains_key(&artifact.name) {
                tracing::warn!(
                    name = %artifact.name,
                    path = %path.display(),
                    "Duplicate artifact name, keeping the first one"
                );
                continue;
            }
            store.insert(artifact);
        }

        tracing::debug!(count = store.len(), dir = %dir.display(), "Artifacts loaded");
        Ok(store)
    }

    pub fn insert(&mut self, artifact: Artifact) {
        self.artifacts.insert(artifact.name.clone(), artifact);
    }

    pub fn get(&self, name: &str) -> Result<&Artifact, DeployError> {
        self.artifacts
            .get(name)
            .ok_or_else(|| DeployError::MissingArtifact(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.artifacts.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

fn collect_json_files(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            // build-info holds whole compiler outputs, not artifacts.
            if path.file_name().is_some_and(|n| n == "build-info") {
                continue;
            }
            collect_json_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "json")
            && !path.to_string_lossy().ends_with(".dbg.json")
        {
            files.push(path);
        }
    }
    Ok(())
}
