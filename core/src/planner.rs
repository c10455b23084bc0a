//! Address planner: derives per-facet salts and predicted CREATE2
//! addresses from a factory address, creation bytecode, and the release
//! config's optional salt overrides.

use crate::config::{ArtifactResolver, FacetConfig};
use crate::error::{ManifestError, Result};
use crate::hashing::{create2_address, keccak256};
use crate::selectors::derive_selectors;
use alloy_primitives::{Address, B256};
use std::collections::HashMap;

/// The computed record for one facet, produced by the address planner and
/// consumed by the manifest composer.
#[derive(Clone, Debug)]
pub struct FacetEntry {
    pub name: String,
    pub contract: String,
    pub creation: Vec<u8>,
    pub runtime: Vec<u8>,
    pub runtime_hash: B256,
    pub runtime_size: u64,
    pub salt: B256,
    pub init_code_hash: B256,
    pub predicted_address: Address,
    /// The address recorded in the manifest: the predicted address,
    /// unless a previously deployed address is known for this facet.
    pub address: Address,
    pub selectors: Vec<[u8; 4]>,
    pub priority: i64,
    pub gas_limit: Option<u64>,
}

/// Plan one facet: resolve its artifact, compute salt/hashes/address, and
/// derive or validate its selector set.
///
/// `known_addresses` maps facet name to a previously recorded deployed
/// address on the target chain; when present for this facet it becomes
/// `FacetEntry.address` while `predicted_address` and `salt` still reflect
/// the fresh CREATE2 derivation, so downstream verification can compare
/// both.
pub fn plan_facet(
    config: &FacetConfig,
    resolver: &dyn ArtifactResolver,
    factory: Address,
    salt_overrides: &HashMap<String, [u8; 32]>,
    known_addresses: Option<&HashMap<String, Address>>,
) -> Result<FacetEntry> {
    let artifact = resolver
        .resolve(&config.contract)
        .map_err(|e| match e {
            ManifestError::ArtifactUnresolved { .. } => e,
            other => ManifestError::ArtifactUnresolved {
                contract: config.contract.clone(),
                reason: other.to_string(),
            },
        })?;

    if artifact.runtime_bytecode.is_empty() {
        return Err(ManifestError::EmptyRuntimeBytecode {
            facet: config.name.clone(),
        });
    }

    let runtime_hash = keccak256(&artifact.runtime_bytecode);
    let runtime_size = artifact.runtime_bytecode.len() as u64;
    let init_code_hash = keccak256(&artifact.creation_bytecode);

    let salt = match salt_overrides.get(&config.name) {
        Some(bytes) => B256::from(*bytes),
        None => runtime_hash,
    };

    let predicted_address = create2_address(factory, salt, init_code_hash);
    let address = known_addresses
        .and_then(|m| m.get(&config.name))
        .copied()
        .unwrap_or(predicted_address);

    let overrides = if config.selectors.is_empty() {
        None
    } else {
        Some(config.selectors.as_slice())
    };
    let selectors = derive_selectors(&config.name, &artifact.interface, overrides)?;

    tracing::info!(
        facet = %config.name,
        contract = %config.contract,
        predicted = %predicted_address,
        address = %address,
        salt = %salt,
        "facet planned"
    );

    Ok(FacetEntry {
        name: config.name.clone(),
        contract: config.contract.clone(),
        creation: artifact.creation_bytecode,
        runtime: artifact.runtime_bytecode,
        runtime_hash,
        runtime_size,
        salt,
        init_code_hash,
        predicted_address,
        address,
        selectors,
        priority: config.priority,
        gas_limit: config.gas_limit,
    })
}
