//! Leaf encoder: a pure function from a route triple to its 32-byte
//! Merkle leaf.

use crate::hashing::{abi_encode_route, keccak256};
use alloy_primitives::{Address, B256};

/// A route triple: `(selector, facet_address, runtime_codehash)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Route {
    pub selector: [u8; 4],
    pub facet: Address,
    pub codehash: B256,
}

/// `leaf = keccak256(abiEncode(["bytes4","address","bytes32"], [selector, facet, codehash]))`.
pub fn leaf_hash(route: &Route) -> B256 {
    let encoded = abi_encode_route(route.selector, route.facet, route.codehash);
    keccak256(&encoded)
}
