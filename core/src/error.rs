//! Error taxonomy for the manifest build and preflight pipelines.
//!
//! One enum spans every fatal condition named in the error-handling design:
//! input errors, integrity errors, cryptographic errors, and I/O errors.
//! Each variant carries the one piece of contextual data a caller needs to
//! act on it — no stack traces, no internal identifiers.

use alloy_primitives::{Address, B256};
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ManifestError>;

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    // ---- input errors -------------------------------------------------
    #[error("invalid hash input: {reason}")]
    InvalidHashInput { reason: String },

    #[error("manifest is missing required field: {field}")]
    MissingManifestField { field: String },

    #[error("invalid address: {value}")]
    InvalidAddress { value: String },

    #[error("invalid selector: {value}")]
    InvalidSelector { value: String },

    #[error("selector {selector:#010x} claimed by both {first} and {second}")]
    DuplicateSelector {
        selector: u32,
        first: String,
        second: String,
    },

    #[error("facet {facet} has empty runtime bytecode")]
    EmptyRuntimeBytecode { facet: String },

    #[error("facet {facet} exposes no externally callable functions")]
    EmptySelectorSet { facet: String },

    #[error("factory address could not be resolved")]
    FactoryUnresolved,

    #[error("artifact resolver could not resolve contract {contract}: {reason}")]
    ArtifactUnresolved { contract: String, reason: String },

    #[error("release config declares no facets")]
    EmptyReleaseConfig,

    // ---- integrity errors ----------------------------------------------
    #[error("merkle root mismatch: expected {expected}, computed {computed}")]
    MerkleRootMismatch { expected: B256, computed: B256 },

    #[error("manifest hash mismatch: expected {expected}, computed {computed}")]
    ManifestHashMismatch { expected: B256, computed: B256 },

    #[error("codehash mismatch for facet {facet}: expected {expected}, computed {computed}")]
    CodehashMismatch {
        facet: String,
        expected: B256,
        computed: B256,
    },

    #[error("on-chain manifest hash mismatch on {network}: expected {expected}, on-chain {on_chain}")]
    OnChainHashMismatch {
        network: String,
        expected: B256,
        on_chain: B256,
    },

    #[error("selectors for facet {facet} are not sorted ascending")]
    SelectorNotSorted { facet: String },

    #[error("selector {selector:#010x} appears in more than one facet")]
    SelectorDuplicateAcrossFacets { selector: u32 },

    #[error("route set does not cover the union of facet selectors (selector {selector:#010x})")]
    RouteCoverageMismatch { selector: u32 },

    #[error("route set is empty")]
    EmptyRouteSet,

    #[error("previousHash must be exactly 32 bytes, got {len}")]
    InvalidPreviousHash { len: usize },

    // ---- cryptographic errors ------------------------------------------
    #[error("manifest signature is invalid: {reason}")]
    SignatureInvalid { reason: String },

    #[error("recovered signer {signer} is not authorized")]
    SignerUnauthorized { signer: Address },

    // ---- I/O errors ------------------------------------------------------
    #[error("file operation failed at {path}: {reason}")]
    FileOperationError { path: PathBuf, reason: String },

    #[error("path {path} escapes the allowed root")]
    SecurityError { path: PathBuf },
}
