//! Manifest composer: assembles facet entries into the canonical route
//! list, builds the Merkle tree over their leaves, and produces the three
//! persisted artifacts (manifest, Merkle sidecar, chunk map).

use crate::config::{ArtifactResolver, ReleaseConfig};
use crate::error::{ManifestError, Result};
use crate::hashing::abi_encode_manifest_tuple;
use crate::hashing::keccak256;
use crate::leaf::{leaf_hash, Route};
use crate::merkle::{self, MerkleTree, ProofStep};
use crate::planner::{plan_facet, FacetEntry};
use alloy_primitives::{Address, B256};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct NetworkInfo {
    pub name: String,
    #[serde(rename = "chainId")]
    pub chain_id: u64,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct FacetRecord {
    pub name: String,
    pub contract: String,
    pub address: Address,
    pub salt: B256,
    #[serde(rename = "bytecodeHash")]
    pub bytecode_hash: B256,
    #[serde(rename = "bytecodeSize")]
    pub bytecode_size: u64,
    pub selectors: Vec<[u8; 4]>,
    pub priority: i64,
    #[serde(rename = "gasLimit")]
    pub gas_limit: Option<u64>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RouteRecord {
    pub selector: [u8; 4],
    pub facet: Address,
    pub codehash: B256,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Manifest {
    pub version: String,
    pub timestamp: String,
    pub description: String,
    pub network: NetworkInfo,
    pub factory: Address,
    pub facets: Vec<FacetRecord>,
    pub routes: Vec<RouteRecord>,
    #[serde(rename = "merkleRoot")]
    pub merkle_root: B256,
    #[serde(rename = "manifestHash")]
    pub manifest_hash: B256,
    #[serde(rename = "previousHash", skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Address the `manifestHash` 8-tuple was bound against. Zero for a
    /// pre-dispatcher build.
    #[serde(rename = "dispatcherAddress")]
    pub dispatcher_address: Address,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct LeafMetadata {
    pub selector: [u8; 4],
    pub facet: Address,
    pub codehash: B256,
    #[serde(rename = "facetName")]
    pub facet_name: String,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MerkleSidecar {
    pub root: B256,
    pub leaves: Vec<B256>,
    pub proofs: Vec<Vec<ProofStep>>,
    pub tree: Vec<Vec<B256>>,
    #[serde(rename = "leafMetadata")]
    pub leaf_metadata: Vec<LeafMetadata>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ChunkEntry {
    pub address: Address,
    pub salt: B256,
    pub hash: B256,
    pub size: u64,
    #[serde(rename = "gasLimit")]
    pub gas_limit: Option<u64>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ChunkMap {
    pub chunks: Vec<ChunkEntry>,
}

/// Everything the manifest composer returns: the three artifacts it is
/// responsible for persisting atomically.
pub struct BuildOutput {
    pub manifest: Manifest,
    pub merkle: MerkleSidecar,
    pub chunk_map: ChunkMap,
}

/// Parameters the manifest composer needs beyond the release config
/// itself — the caller's `BuildContext` in the CLI layer assembles these.
pub struct BuildParams<'a> {
    pub factory: Address,
    pub network: NetworkInfo,
    pub dispatcher_address: Address,
    pub timestamp: String,
    pub previous_hash: Option<B256>,
    pub known_addresses: Option<&'a HashMap<String, Address>>,
}

/// Build a manifest from a validated release config.
///
/// Fails fast: the first fatal error (`EmptyRuntimeBytecode`,
/// `EmptySelectorSet`, `DuplicateSelector`, `ArtifactUnresolved`, ...)
/// aborts before any artifact is constructed.
pub fn compose(
    config: &ReleaseConfig,
    resolver: &dyn ArtifactResolver,
    params: &BuildParams<'_>,
) -> Result<BuildOutput> {
    if config.facets.is_empty() {
        tracing::debug!("release config declares no facets");
        return Err(ManifestError::EmptyReleaseConfig);
    }

    tracing::info!(version = %config.version, facets = config.facets.len(), "composing manifest");

    let mut entries: Vec<FacetEntry> = Vec::with_capacity(config.facets.len());
    for facet in &config.facets {
        let entry = plan_facet(
            facet,
            resolver,
            params.factory,
            &config.deployment,
            params.known_addresses,
        )?;
        entries.push(entry);
    }

    // Selector invariants: sorted within a facet (guaranteed by the
    // deriver) and unique across the whole release.
    let mut owner_by_selector: HashMap<[u8; 4], &str> = HashMap::new();
    for entry in &entries {
        let mut prev: Option<[u8; 4]> = None;
        for &selector in &entry.selectors {
            if let Some(p) = prev {
                if selector <= p {
                    return Err(ManifestError::SelectorNotSorted {
                        facet: entry.name.clone(),
                    });
                }
            }
            prev = Some(selector);

            if let Some(&other) = owner_by_selector.get(&selector) {
                return Err(ManifestError::DuplicateSelector {
                    selector: u32::from_be_bytes(selector),
                    first: other.to_string(),
                    second: entry.name.clone(),
                });
            }
            owner_by_selector.insert(selector, &entry.name);
        }
    }

    // Expand every facet's selectors into routes, then sort by leaf hash.
    struct Indexed {
        route: Route,
        facet_name: String,
        leaf: B256,
    }
    let mut routes: Vec<Indexed> = Vec::new();
    for entry in &entries {
        for &selector in &entry.selectors {
            let route = Route {
                selector,
                facet: entry.address,
                codehash: entry.runtime_hash,
            };
            let leaf = leaf_hash(&route);
            routes.push(Indexed {
                route,
                facet_name: entry.name.clone(),
                leaf,
            });
        }
    }

    let leaves: Vec<B256> = routes.iter().map(|r| r.leaf).collect();
    let tree: MerkleTree = merkle::build(&leaves)?;

    // Reorder routes/metadata to match the leaf sort permutation.
    let ordered_routes: Vec<RouteRecord> = tree
        .permutation
        .iter()
        .map(|&i| RouteRecord {
            selector: routes[i].route.selector,
            facet: routes[i].route.facet,
            codehash: routes[i].route.codehash,
        })
        .collect();
    let leaf_metadata: Vec<LeafMetadata> = tree
        .permutation
        .iter()
        .map(|&i| LeafMetadata {
            selector: routes[i].route.selector,
            facet: routes[i].route.facet,
            codehash: routes[i].route.codehash,
            facet_name: routes[i].facet_name.clone(),
        })
        .collect();

    let merkle_root = tree.root();
    let proofs: Vec<Vec<ProofStep>> = (0..tree.leaves().len()).map(|i| tree.proof(i)).collect();

    let chain_id_string = params.network.chain_id.to_string();
    let entry_count = ordered_routes.len() as u64;
    let chunk_count = entries.len() as u64;
    let encoded = abi_encode_manifest_tuple(
        &config.version,
        &chain_id_string,
        params.factory,
        params.dispatcher_address,
        merkle_root,
        entry_count,
        chunk_count,
        &params.timestamp,
    );
    let manifest_hash = keccak256(&encoded);

    let facet_records: Vec<FacetRecord> = entries
        .iter()
        .map(|e| FacetRecord {
            name: e.name.clone(),
            contract: e.contract.clone(),
            address: e.address,
            salt: e.salt,
            bytecode_hash: e.runtime_hash,
            bytecode_size: e.runtime_size,
            selectors: e.selectors.clone(),
            priority: e.priority,
            gas_limit: e.gas_limit,
        })
        .collect();

    let manifest = Manifest {
        version: config.version.clone(),
        timestamp: params.timestamp.clone(),
        description: config.description.clone(),
        network: params.network.clone(),
        factory: params.factory,
        facets: facet_records,
        routes: ordered_routes,
        merkle_root,
        manifest_hash,
        previous_hash: params.previous_hash,
        signature: None,
        dispatcher_address: params.dispatcher_address,
    };

    let merkle_sidecar = MerkleSidecar {
        root: merkle_root,
        leaves: tree.leaves().to_vec(),
        proofs,
        tree: tree.levels.clone(),
        leaf_metadata,
    };

    let chunk_map = ChunkMap {
        chunks: entries
            .iter()
            .map(|e| ChunkEntry {
                address: e.address,
                salt: e.salt,
                hash: e.runtime_hash,
                size: e.runtime_size,
                gas_limit: e.gas_limit,
            })
            .collect(),
    };

    // Invariant 4: routes cover exactly the union of facet selectors.
    let all_selectors: HashSet<[u8; 4]> = entries.iter().flat_map(|e| e.selectors.iter().copied()).collect();
    let route_selectors: HashSet<[u8; 4]> = manifest.routes.iter().map(|r| r.selector).collect();
    if let Some(&missing) = all_selectors.difference(&route_selectors).next() {
        return Err(ManifestError::RouteCoverageMismatch {
            selector: u32::from_be_bytes(missing),
        });
    }
    if let Some(&extra) = route_selectors.difference(&all_selectors).next() {
        return Err(ManifestError::RouteCoverageMismatch {
            selector: u32::from_be_bytes(extra),
        });
    }

    tracing::info!(
        routes = manifest.routes.len(),
        merkle_root = %manifest.merkle_root,
        manifest_hash = %manifest.manifest_hash,
        "manifest composed"
    );

    Ok(BuildOutput {
        manifest,
        merkle: merkle_sidecar,
        chunk_map,
    })
}

/// Recompute the canonical manifest hash from a manifest's own field
/// values — used by the preflight validator to detect tampering.
pub fn recompute_manifest_hash(manifest: &Manifest) -> B256 {
    let chain_id_string = manifest.network.chain_id.to_string();
    let encoded = abi_encode_manifest_tuple(
        &manifest.version,
        &chain_id_string,
        manifest.factory,
        manifest.dispatcher_address,
        manifest.merkle_root,
        manifest.routes.len() as u64,
        manifest.facets.len() as u64,
        &manifest.timestamp,
    );
    keccak256(&encoded)
}

/// Recompute the Merkle root from a manifest's persisted routes.
pub fn recompute_merkle_root(manifest: &Manifest) -> Result<B256> {
    let leaves: Vec<B256> = manifest
        .routes
        .iter()
        .map(|r| {
            leaf_hash(&Route {
                selector: r.selector,
                facet: r.facet,
                codehash: r.codehash,
            })
        })
        .collect();
    Ok(merkle::build(&leaves)?.root())
}
