//! Selector deriver: turns a facet's interface description (or an explicit
//! override list) into the sorted, deduplicated set of 4-byte function
//! selectors it exposes.

use crate::error::{ManifestError, Result};
use std::collections::BTreeSet;

/// One function entry from an interface description. Constructors,
/// fallback, and receive entries are never represented here — callers
/// filter them out before construction (they have no selector).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct FunctionAbi {
    pub name: String,
    /// Parameter type strings, in declaration order. Tuple types are
    /// supplied already parenthesized (e.g. `"(uint256,address)"`);
    /// this deriver only canonicalizes the `uint`/`int` aliases.
    pub inputs: Vec<String>,
}

/// An interface description is just the list of externally callable
/// functions a facet exposes.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct InterfaceDescription {
    pub functions: Vec<FunctionAbi>,
}

/// Canonicalize a Solidity parameter type string: bare `uint`/`int`
/// (optionally followed by array brackets) expand to their explicit
/// 256-bit form. Everything else (including tuples, which arrive already
/// parenthesized) passes through unchanged.
fn canonicalize_type(ty: &str) -> String {
    let (base, suffix) = match ty.find('[') {
        Some(idx) => (&ty[..idx], &ty[idx..]),
        None => (ty, ""),
    };
    let base = match base {
        "uint" => "uint256",
        "int" => "int256",
        other => other,
    };
    format!("{base}{suffix}")
}

/// The canonical signature string `name(type1,type2,...)` with no spaces.
pub fn canonical_signature(f: &FunctionAbi) -> String {
    let params: Vec<String> = f.inputs.iter().map(|t| canonicalize_type(t)).collect();
    format!("{}({})", f.name, params.join(","))
}

/// First 4 bytes of `keccak256(signature)`.
pub fn selector_of(f: &FunctionAbi) -> [u8; 4] {
    let sig = canonical_signature(f);
    let hash = crate::hashing::keccak256(sig.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash.as_slice()[..4]);
    out
}

/// Derive the sorted, deduplicated selector set for a facet.
///
/// An explicit `overrides` list, if non-empty, takes precedence over
/// derivation entirely — no derivation is performed in that case.
pub fn derive_selectors(
    facet_name: &str,
    interface: &InterfaceDescription,
    overrides: Option<&[[u8; 4]]>,
) -> Result<Vec<[u8; 4]>> {
    if let Some(explicit) = overrides {
        if !explicit.is_empty() {
            let mut set: BTreeSet<[u8; 4]> = explicit.iter().copied().collect();
            let deduped: Vec<[u8; 4]> = set.iter().copied().collect();
            set.clear();
            tracing::debug!(facet = facet_name, count = deduped.len(), "selectors taken from explicit override");
            return Ok(deduped);
        }
    }

    let set: BTreeSet<[u8; 4]> = interface.functions.iter().map(selector_of).collect();
    if set.is_empty() {
        tracing::debug!(facet = facet_name, "facet exposes no externally callable functions");
        return Err(ManifestError::EmptySelectorSet {
            facet: facet_name.to_string(),
        });
    }
    tracing::debug!(facet = facet_name, count = set.len(), "selectors derived from interface");
    Ok(set.into_iter().collect())
}
