//! Deployment manifest CLI for the facet-routing dispatcher.
//!
//! Subcommands:
//!   build      - Compose a manifest from a release config and artifacts dir
//!   preflight  - Re-derive every hash in a persisted manifest and check it
//!                against on-chain state on one or more networks

mod network;
mod resolver;

use alloy_primitives::Address;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use manifest_core::artifact_store::{ArtifactStore, WriteOptions};
use manifest_core::config::ReleaseConfig;
use manifest_core::manifest::{BuildParams, Manifest, NetworkInfo};
use manifest_core::preflight::{self, NetworkAccessor};
use network::AlloyNetworkAccessor;
use resolver::FsArtifactResolver;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "manifest")]
#[command(about = "Build and preflight-validate facet-routing deployment manifests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a manifest, Merkle sidecar, and chunk map from a release config
    Build {
        /// Path to the release config JSON (version, facets, deployment overrides)
        #[arg(long)]
        config: String,
        /// Directory of compiled contract artifacts (Foundry/Hardhat-style JSON)
        #[arg(long)]
        artifacts: String,
        /// CREATE2 factory address
        #[arg(long)]
        factory: String,
        /// Dispatcher address the manifest hash is bound to (defaults to zero, pre-deployment)
        #[arg(long)]
        dispatcher: Option<String>,
        /// Network name recorded in the manifest
        #[arg(long)]
        network: String,
        /// Chain ID recorded in the manifest
        #[arg(long)]
        chain_id: u64,
        /// Previous manifest's hash, to chain releases together
        #[arg(long)]
        previous_hash: Option<String>,
        /// Output directory for manifest.json, merkle.json, chunks.json
        #[arg(long)]
        out: String,
        /// Back up any existing output files before overwriting them
        #[arg(long, default_value = "false")]
        backup: bool,
    },
    /// Re-derive every hash in a persisted manifest and optionally check it on-chain
    Preflight {
        /// Path to a persisted manifest.json
        #[arg(long)]
        manifest: String,
        /// `name=rpc_url` pairs, one per target network. Omit to run static checks only.
        #[arg(long = "rpc", value_name = "NAME=URL")]
        rpcs: Vec<String>,
        /// Addresses authorized to sign a manifest. Required only if the
        /// manifest carries a signature; ignored otherwise.
        #[arg(long = "signer")]
        signers: Vec<String>,
        /// Directory of compiled contract artifacts to re-resolve bytecode
        /// and CREATE2 addresses from. Omit to run the manifest-internal
        /// checks only, without re-reading the originating artifacts.
        #[arg(long)]
        artifacts: Option<String>,
        /// Maximum number of networks to check concurrently
        #[arg(long, default_value = "8")]
        max_concurrent: usize,
    },
}

fn parse_address(s: &str) -> Result<Address> {
    s.parse().with_context(|| format!("invalid address: {s}"))
}

fn parse_hash(s: &str) -> Result<alloy_primitives::B256> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).context("invalid hex in hash")?;
    alloy_primitives::B256::try_from(bytes.as_slice())
        .map_err(|_| anyhow::anyhow!("hash must be exactly 32 bytes"))
}

#[allow(clippy::too_many_arguments)]
async fn run_build(
    config_path: String,
    artifacts: String,
    factory: String,
    dispatcher: Option<String>,
    network_name: String,
    chain_id: u64,
    previous_hash: Option<String>,
    out: String,
    backup: bool,
) -> Result<()> {
    let config_text = std::fs::read_to_string(&config_path)
        .with_context(|| format!("reading release config {config_path}"))?;
    let config: ReleaseConfig =
        serde_json::from_str(&config_text).context("parsing release config")?;

    let resolver = FsArtifactResolver::new(artifacts);
    let factory = parse_address(&factory)?;
    let dispatcher_address = match dispatcher {
        Some(d) => parse_address(&d)?,
        None => Address::ZERO,
    };
    let previous_hash = previous_hash.map(|h| parse_hash(&h)).transpose()?;
    let timestamp = timestamp_now();

    let params = BuildParams {
        factory,
        network: NetworkInfo {
            name: network_name,
            chain_id,
        },
        dispatcher_address,
        timestamp,
        previous_hash,
        known_addresses: None,
    };

    let output = manifest_core::manifest::compose(&config, &resolver, &params)?;

    let store = ArtifactStore::new(&out);
    store.ensure_dir(".")?;
    let opts = WriteOptions { backup };
    store.write_json("manifest.json", &output.manifest, opts)?;
    store.write_json("merkle.json", &output.merkle, opts)?;
    store.write_json("chunks.json", &output.chunk_map, opts)?;

    tracing::info!(
        facets = output.manifest.facets.len(),
        routes = output.manifest.routes.len(),
        merkle_root = %output.manifest.merkle_root,
        manifest_hash = %output.manifest.manifest_hash,
        "manifest built"
    );
    println!("manifest hash: {}", output.manifest.manifest_hash);
    println!("merkle root:   {}", output.manifest.merkle_root);
    println!("wrote {out}/manifest.json, {out}/merkle.json, {out}/chunks.json");

    Ok(())
}

async fn run_preflight(
    manifest_path: String,
    rpcs: Vec<String>,
    signers: Vec<String>,
    artifacts: Option<String>,
    max_concurrent: usize,
) -> Result<()> {
    let text = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("reading manifest {manifest_path}"))?;
    let manifest: Manifest = serde_json::from_str(&text).context("parsing manifest")?;
    let authorized_signers = signers
        .iter()
        .map(|s| parse_address(s))
        .collect::<Result<Vec<Address>>>()?;
    let resolver = artifacts.map(FsArtifactResolver::new);
    let resolver_ref = resolver.as_ref().map(|r| r as &dyn manifest_core::config::ArtifactResolver);

    if rpcs.is_empty() {
        let accessor = NoNetworkAccessor;
        let result = preflight::validate_network(
            &manifest,
            "static-only",
            &authorized_signers,
            resolver_ref,
            &accessor,
        )
        .await;
        print_validation(&result);
        if !result.passed {
            anyhow::bail!("static preflight checks failed");
        }
        return Ok(());
    }

    let mut networks: Vec<(String, Arc<dyn NetworkAccessor>)> = Vec::with_capacity(rpcs.len());
    for pair in rpcs {
        let (name, url) = pair
            .split_once('=')
            .with_context(|| format!("--rpc must be NAME=URL, got {pair}"))?;
        let accessor = AlloyNetworkAccessor::connect(url)
            .await
            .with_context(|| format!("connecting to {name} ({url})"))?;
        networks.push((name.to_string(), Arc::new(accessor)));
    }

    let report = preflight::run(
        &manifest,
        &networks,
        &authorized_signers,
        resolver_ref,
        max_concurrent,
    )
    .await;
    for validation in &report.networks {
        print_validation(validation);
    }
    if !report.passed {
        anyhow::bail!("preflight failed on one or more networks");
    }
    Ok(())
}

fn print_validation(result: &preflight::PreflightValidation) {
    let status = if result.passed { "PASS" } else { "FAIL" };
    println!("[{status}] {} (chain {})", result.network_name, result.chain_id);
    for warning in &result.warnings {
        println!("  warning: {warning}");
    }
    for error in &result.errors {
        println!("  error: {error}");
    }
}

/// A `NetworkAccessor` that reports no deployed dispatcher on any network —
/// used when `preflight` is run with no `--rpc` targets, so the static
/// checks (hash recomputation, selector invariants) still run offline.
struct NoNetworkAccessor;

#[async_trait::async_trait]
impl NetworkAccessor for NoNetworkAccessor {
    async fn chain_id(&self) -> manifest_core::Result<u64> {
        Ok(0)
    }
    async fn get_code(&self, _address: Address) -> manifest_core::Result<Vec<u8>> {
        Ok(Vec::new())
    }
    async fn active_manifest_hash(
        &self,
        _dispatcher: Address,
    ) -> manifest_core::Result<Option<alloy_primitives::B256>> {
        Ok(None)
    }
}

/// RFC 3339 UTC timestamp recorded on the manifest.
fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build {
            config,
            artifacts,
            factory,
            dispatcher,
            network,
            chain_id,
            previous_hash,
            out,
            backup,
        } => {
            run_build(
                config,
                artifacts,
                factory,
                dispatcher,
                network,
                chain_id,
                previous_hash,
                out,
                backup,
            )
            .await?
        }
        Commands::Preflight {
            manifest,
            rpcs,
            signers,
            artifacts,
            max_concurrent,
        } => run_preflight(manifest, rpcs, signers, artifacts, max_concurrent).await?,
    }

    Ok(())
}
