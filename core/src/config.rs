//! Input data model: the validated, in-memory shape the core consumes.
//! Parsing an on-disk release-config format into these types is an
//! external collaborator's job; the core only ever sees already-validated
//! values.

use crate::selectors::InterfaceDescription;
use std::collections::HashMap;

/// One logical release. At least one facet is required (checked by the
/// manifest composer, not here, since validity of an empty config depends
/// on pipeline context rather than the type itself).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ReleaseConfig {
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub facets: Vec<FacetConfig>,
    /// Explicit salt overrides keyed by facet name.
    #[serde(default)]
    pub deployment: HashMap<String, [u8; 32]>,
}

/// One entry per facet in a release.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct FacetConfig {
    pub name: String,
    pub contract: String,
    #[serde(default)]
    pub selectors: Vec<[u8; 4]>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub gas_limit: Option<u64>,
}

/// Resolved from `FacetConfig.contract` by an `ArtifactResolver`.
#[derive(Clone, Debug)]
pub struct FacetArtifact {
    pub creation_bytecode: Vec<u8>,
    pub runtime_bytecode: Vec<u8>,
    pub interface: InterfaceDescription,
}

/// Resolves a contract identifier to its compiled artifact. The concrete
/// resolver (reading a build-output directory, a registry, etc.) is an
/// external collaborator; the core only depends on this trait.
pub trait ArtifactResolver {
    fn resolve(&self, contract_id: &str) -> crate::error::Result<FacetArtifact>;
}
