//! A Foundry/Hardhat-style artifact resolver: reads compiled contract
//! output from a directory of `<Contract>.json` files, each holding
//! creation bytecode, deployed (runtime) bytecode, and an ABI.
//!
//! This is the thin, external-collaborator side of `ArtifactResolver` —
//! the core crate only depends on the trait, never on this file format.

use anyhow::Context;
use manifest_core::config::{ArtifactResolver, FacetArtifact};
use manifest_core::error::{ManifestError, Result};
use manifest_core::selectors::{FunctionAbi, InterfaceDescription};
use std::path::PathBuf;

pub struct FsArtifactResolver {
    artifacts_dir: PathBuf,
}

impl FsArtifactResolver {
    pub fn new(artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifacts_dir: artifacts_dir.into(),
        }
    }
}

#[derive(serde::Deserialize)]
struct RawAbiInput {
    #[serde(rename = "type")]
    ty: String,
}

#[derive(serde::Deserialize)]
struct RawAbiEntry {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: Vec<RawAbiInput>,
}

#[derive(serde::Deserialize)]
struct RawArtifact {
    #[serde(rename = "creationBytecode")]
    creation_bytecode: String,
    #[serde(rename = "runtimeBytecode")]
    runtime_bytecode: String,
    abi: Vec<RawAbiEntry>,
}

fn decode_hex(s: &str) -> anyhow::Result<Vec<u8>> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    Ok(hex::decode(s).context("invalid hex in artifact bytecode")?)
}

impl ArtifactResolver for FsArtifactResolver {
    fn resolve(&self, contract_id: &str) -> Result<FacetArtifact> {
        let path = self.artifacts_dir.join(format!("{contract_id}.json"));
        let text = std::fs::read_to_string(&path).map_err(|e| ManifestError::ArtifactUnresolved {
            contract: contract_id.to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;
        let raw: RawArtifact =
            serde_json::from_str(&text).map_err(|e| ManifestError::ArtifactUnresolved {
                contract: contract_id.to_string(),
                reason: format!("invalid artifact JSON: {e}"),
            })?;

        let creation_bytecode = decode_hex(&raw.creation_bytecode).map_err(|e| {
            ManifestError::ArtifactUnresolved {
                contract: contract_id.to_string(),
                reason: e.to_string(),
            }
        })?;
        let runtime_bytecode = decode_hex(&raw.runtime_bytecode).map_err(|e| {
            ManifestError::ArtifactUnresolved {
                contract: contract_id.to_string(),
                reason: e.to_string(),
            }
        })?;

        let functions = raw
            .abi
            .into_iter()
            .filter(|entry| entry.ty == "function")
            .map(|entry| FunctionAbi {
                name: entry.name,
                inputs: entry.inputs.into_iter().map(|i| i.ty).collect(),
            })
            .collect();

        Ok(FacetArtifact {
            creation_bytecode,
            runtime_bytecode,
            interface: InterfaceDescription { functions },
        })
    }
}
