//! Preflight validator: re-derives every hash and predicted address from a
//! persisted manifest and compares against on-chain state on each target
//! network. Runs networks concurrently with bounded fan-out; each
//! network's own checks are sequential and pure aside from the two RPC
//! calls (`getCode`, `call`).

use crate::config::ArtifactResolver;
use crate::error::{ManifestError, Result};
use crate::hashing::{create2_address, keccak256};
use crate::manifest::{recompute_manifest_hash, recompute_merkle_root, Manifest};
use crate::signature;
use alloy_primitives::{Address, B256};
use std::collections::HashSet;

/// The network contract the preflight validator depends on. A production
/// implementation wraps an RPC provider; the core only depends on this
/// trait, so offline tests can supply a mock.
#[async_trait::async_trait]
pub trait NetworkAccessor: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;
    async fn get_code(&self, address: Address) -> Result<Vec<u8>>;
    /// Calls the dispatcher's accessor for its currently active manifest
    /// hash. Returns `None` if the dispatcher has no code at `address`.
    async fn active_manifest_hash(&self, dispatcher: Address) -> Result<Option<B256>>;
}

#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct CheckResults {
    pub merkle_root_ok: bool,
    pub manifest_hash_ok: bool,
    pub selectors_sorted_ok: bool,
    pub selectors_unique_ok: bool,
    pub previous_hash_ok: bool,
    pub codehashes_ok: bool,
    pub gas_estimates_ok: bool,
    /// `None` when the manifest carries no signature (absent is accepted).
    pub signature_ok: Option<bool>,
    pub on_chain_hash_ok: Option<bool>,
    /// `None` when preflight was run without an `ArtifactResolver` (offline
    /// structural checks only). Re-resolves each facet's bytecode and
    /// compares `keccak256(bytecode)`/byte length against the recorded
    /// `bytecodeHash`/`bytecodeSize` (step 6 of the on-disk re-derivation).
    pub bytecode_integrity_ok: Option<bool>,
    /// Re-runs the address planner's CREATE2 derivation for every facet and
    /// compares against `salt`/`address` as recorded in the manifest.
    pub predicted_addresses_ok: Option<bool>,
}

#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct ComputedHashes {
    pub merkle_root: Option<B256>,
    pub manifest_hash: Option<B256>,
    pub recovered_signer: Option<Address>,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct PreflightValidation {
    pub network_name: String,
    pub chain_id: u64,
    pub passed: bool,
    pub checks: CheckResults,
    pub computed_hashes: ComputedHashes,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct PreflightReport {
    pub passed: bool,
    pub networks: Vec<PreflightValidation>,
}

/// Gas-per-byte warning band: not fatal, just surfaced as a warning.
const MIN_GAS: u64 = 1;
const MAX_GAS: u64 = 10_000_000;
const MIN_GAS_PER_BYTE: u64 = 1;
const MAX_GAS_PER_BYTE: u64 = 1000;

fn validate_static(
    manifest: &Manifest,
    authorized_signers: &[Address],
    resolver: Option<&dyn ArtifactResolver>,
) -> (CheckResults, ComputedHashes, Vec<String>, Vec<String>) {
    tracing::debug!(version = %manifest.version, chain_id = manifest.network.chain_id, "running static preflight checks");

    let mut checks = CheckResults::default();
    let mut computed = ComputedHashes::default();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match recompute_merkle_root(manifest) {
        Ok(root) => {
            computed.merkle_root = Some(root);
            checks.merkle_root_ok = root == manifest.merkle_root;
            if !checks.merkle_root_ok {
                errors.push(
                    ManifestError::MerkleRootMismatch {
                        expected: manifest.merkle_root,
                        computed: root,
                    }
                    .to_string(),
                );
            }
        }
        Err(e) => errors.push(e.to_string()),
    }

    let hash = recompute_manifest_hash(manifest);
    computed.manifest_hash = Some(hash);
    checks.manifest_hash_ok = hash == manifest.manifest_hash;
    if !checks.manifest_hash_ok {
        errors.push(
            ManifestError::ManifestHashMismatch {
                expected: manifest.manifest_hash,
                computed: hash,
            }
            .to_string(),
        );
    }

    checks.selectors_sorted_ok = manifest.facets.iter().all(|f| {
        f.selectors.windows(2).all(|w| w[0] < w[1])
    });
    if !checks.selectors_sorted_ok {
        errors.push("one or more facets have unsorted selectors".to_string());
    }

    let mut seen: HashSet<[u8; 4]> = HashSet::new();
    checks.selectors_unique_ok = true;
    for facet in &manifest.facets {
        for &s in &facet.selectors {
            if !seen.insert(s) {
                checks.selectors_unique_ok = false;
                errors.push(
                    ManifestError::SelectorDuplicateAcrossFacets {
                        selector: u32::from_be_bytes(s),
                    }
                    .to_string(),
                );
            }
        }
    }

    // previousHash is typed as B256, so "absent or 32 bytes" is a type
    // invariant rather than something to check at runtime.
    checks.previous_hash_ok = true;

    checks.codehashes_ok = true;
    for route in &manifest.routes {
        let facet = manifest.facets.iter().find(|f| f.address == route.facet);
        match facet {
            Some(f) if f.bytecode_hash == route.codehash => {}
            Some(f) => {
                checks.codehashes_ok = false;
                errors.push(
                    ManifestError::CodehashMismatch {
                        facet: f.name.clone(),
                        expected: f.bytecode_hash,
                        computed: route.codehash,
                    }
                    .to_string(),
                );
            }
            None => {
                checks.codehashes_ok = false;
                errors.push(format!(
                    "route selector {:#010x} references unknown facet address {}",
                    u32::from_be_bytes(route.selector),
                    route.facet
                ));
            }
        }
    }

    checks.gas_estimates_ok = true;
    for facet in &manifest.facets {
        if let Some(gas) = facet.gas_limit {
            if !(MIN_GAS..=MAX_GAS).contains(&gas) {
                checks.gas_estimates_ok = false;
                warnings.push(format!(
                    "facet {} gas estimate {gas} outside [{MIN_GAS}, {MAX_GAS}]",
                    facet.name
                ));
                continue;
            }
            if facet.bytecode_size > 0 {
                let ratio = gas / facet.bytecode_size;
                if !(MIN_GAS_PER_BYTE..=MAX_GAS_PER_BYTE).contains(&ratio) {
                    warnings.push(format!(
                        "facet {} gas/byte ratio {ratio} outside [{MIN_GAS_PER_BYTE}, {MAX_GAS_PER_BYTE}]",
                        facet.name
                    ));
                }
            }
        }
    }

    if let Some(resolver) = resolver {
        let mut bytecode_ok = true;
        let mut addresses_ok = true;
        for facet in &manifest.facets {
            match resolver.resolve(&facet.contract) {
                Ok(artifact) => {
                    let runtime_hash = keccak256(&artifact.runtime_bytecode);
                    let runtime_size = artifact.runtime_bytecode.len() as u64;
                    if runtime_hash != facet.bytecode_hash || runtime_size != facet.bytecode_size {
                        bytecode_ok = false;
                        errors.push(
                            ManifestError::CodehashMismatch {
                                facet: facet.name.clone(),
                                expected: facet.bytecode_hash,
                                computed: runtime_hash,
                            }
                            .to_string(),
                        );
                    }

                    let init_code_hash = keccak256(&artifact.creation_bytecode);
                    let predicted = create2_address(manifest.factory, facet.salt, init_code_hash);
                    if predicted != facet.address {
                        addresses_ok = false;
                        errors.push(format!(
                            "facet {} predicted address {predicted} does not match recorded address {}",
                            facet.name, facet.address
                        ));
                    }
                }
                Err(e) => {
                    bytecode_ok = false;
                    addresses_ok = false;
                    errors.push(e.to_string());
                }
            }
        }
        checks.bytecode_integrity_ok = Some(bytecode_ok);
        checks.predicted_addresses_ok = Some(addresses_ok);
    }

    match &manifest.signature {
        None => checks.signature_ok = None,
        Some(sig) => {
            match signature::recover_and_authorize(
                sig,
                manifest.network.chain_id,
                manifest.dispatcher_address,
                &manifest.version,
                manifest.merkle_root,
                manifest.manifest_hash,
                &manifest.timestamp,
                authorized_signers,
            ) {
                Ok(signer) => {
                    checks.signature_ok = Some(true);
                    computed.recovered_signer = Some(signer);
                }
                Err(e) => {
                    checks.signature_ok = Some(false);
                    errors.push(e.to_string());
                }
            }
        }
    }

    (checks, computed, errors, warnings)
}

/// Validate a single network. The static checks (hash/root/sorting/
/// signature) are pure and identical across networks; only the on-chain
/// comparison in step 9 touches the network accessor.
pub async fn validate_network(
    manifest: &Manifest,
    network_name: &str,
    authorized_signers: &[Address],
    resolver: Option<&dyn ArtifactResolver>,
    accessor: &dyn NetworkAccessor,
) -> PreflightValidation {
    let (mut checks, computed, mut errors, mut warnings) =
        validate_static(manifest, authorized_signers, resolver);

    let chain_id = match accessor.chain_id().await {
        Ok(id) => id,
        Err(e) => {
            errors.push(e.to_string());
            manifest.network.chain_id
        }
    };

    match accessor.active_manifest_hash(manifest.dispatcher_address).await {
        Ok(Some(on_chain_hash)) => {
            let matches = Some(on_chain_hash) == computed.manifest_hash;
            checks.on_chain_hash_ok = Some(matches);
            if !matches {
                errors.push(
                    ManifestError::OnChainHashMismatch {
                        network: network_name.to_string(),
                        expected: manifest.manifest_hash,
                        on_chain: on_chain_hash,
                    }
                    .to_string(),
                );
            }
        }
        Ok(None) => {
            checks.on_chain_hash_ok = None;
            warnings.push(format!(
                "dispatcher not yet deployed on {network_name}; on-chain hash not checked"
            ));
        }
        Err(e) => {
            errors.push(e.to_string());
        }
    }

    let passed = errors.is_empty();
    if passed {
        tracing::info!(network = network_name, chain_id, "preflight passed");
    } else {
        tracing::error!(network = network_name, chain_id, errors = errors.len(), "preflight failed");
    }
    PreflightValidation {
        network_name: network_name.to_string(),
        chain_id,
        passed,
        checks,
        computed_hashes: computed,
        errors,
        warnings,
    }
}

/// Run preflight across every target network with bounded concurrency.
/// Per-network validation is independent; a failure on one network never
/// blocks the others from being checked.
pub async fn run(
    manifest: &Manifest,
    networks: &[(String, std::sync::Arc<dyn NetworkAccessor>)],
    authorized_signers: &[Address],
    resolver: Option<&dyn ArtifactResolver>,
    max_concurrent: usize,
) -> PreflightReport {
    use futures::stream::{self, StreamExt};

    let results: Vec<PreflightValidation> = stream::iter(networks.iter())
        .map(|(name, accessor)| async move {
            validate_network(manifest, name, authorized_signers, resolver, accessor.as_ref()).await
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;

    let passed = results.iter().all(|r| r.passed);
    PreflightReport {
        passed,
        networks: results,
    }
}

/// Recompute every facet's predicted CREATE2 address and compare against
/// the manifest's recorded `address` field — this is a convenience used by
/// both preflight and tests, factored out of `validate_static` since it
/// only needs the manifest and resolver, not a network.
pub fn verify_predicted_addresses(
    manifest: &Manifest,
    factory: Address,
    resolver: &dyn ArtifactResolver,
) -> Result<Vec<(String, bool)>> {
    let mut out = Vec::with_capacity(manifest.facets.len());
    for facet in &manifest.facets {
        let artifact = resolver.resolve(&facet.contract)?;
        let init_code_hash = keccak256(&artifact.creation_bytecode);
        let predicted = create2_address(factory, facet.salt, init_code_hash);
        out.push((facet.name.clone(), predicted == facet.address));
    }
    Ok(out)
}
