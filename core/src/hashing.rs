//! Pure hashing and ABI-encoding primitives. No I/O, no fallible paths
//! beyond programmer error (wrong argument sizes).
//!
//! `keccak256` and `pair_hash` mirror the teacher's `lib/src/lib.rs`
//! helpers; the fixed ABI-tuple encoder and CREATE2 derivation generalize
//! that kernel to the triples and tuples this crate hashes.

use crate::error::{ManifestError, Result};
use alloy_primitives::{Address, B256};
use tiny_keccak::{Hasher, Keccak};

/// Compute keccak256. Matches Solidity's `keccak256()` opcode (this is the
/// original Keccak-256, not NIST SHA3-256).
pub fn keccak256(data: &[u8]) -> B256 {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    B256::from(output)
}

/// `keccak256(left || right)`, order preserved — the ordered-pair Merkle
/// hash, not a sorted-pair one.
pub fn pair_hash(left: &B256, right: &B256) -> B256 {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(left.as_slice());
    data[32..].copy_from_slice(right.as_slice());
    keccak256(&data)
}

pub fn concat(parts: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());
    for p in parts {
        out.extend_from_slice(p);
    }
    out
}

fn left_pad32(bytes: &[u8]) -> Result<[u8; 32]> {
    if bytes.len() > 32 {
        return Err(ManifestError::InvalidHashInput {
            reason: format!("value of {} bytes does not fit in a word", bytes.len()),
        });
    }
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(word)
}

/// ABI-encode the `(bytes4, address, bytes32)` route triple as three
/// left-padded 32-byte words, matching Solidity's static-tuple ABI
/// encoding (each value padded to a full word regardless of its natural
/// width).
pub fn abi_encode_route(selector: [u8; 4], facet: Address, codehash: B256) -> Vec<u8> {
    let mut out = Vec::with_capacity(96);
    out.extend_from_slice(&left_pad32(&selector).expect("4 bytes always fits"));
    out.extend_from_slice(&left_pad32(facet.as_slice()).expect("20 bytes always fits"));
    out.extend_from_slice(codehash.as_slice());
    out
}

/// ABI-encode the canonical manifest 8-tuple:
/// `(string, string, address, address, bytes32, uint256, uint256, string)`
/// with values `(version, chainId, factory, dispatcher, merkleRoot,
/// entryCount, chunkCount, timestamp)`.
///
/// Strings use the dynamic ABI head/tail encoding (offset word followed by
/// length-prefixed, word-padded bytes); static fields are left-padded
/// words, matching Solidity `abi.encode`.
#[allow(clippy::too_many_arguments)]
pub fn abi_encode_manifest_tuple(
    version: &str,
    chain_id_string: &str,
    factory: Address,
    dispatcher: Address,
    merkle_root: B256,
    entry_count: u64,
    chunk_count: u64,
    timestamp: &str,
) -> Vec<u8> {
    // Static head: 8 words, one per tuple slot. Dynamic slots (the two
    // strings) hold a byte offset into the tail instead of their value.
    let head_words = 8usize;
    let mut heads: Vec<[u8; 32]> = Vec::with_capacity(head_words);
    let mut tail: Vec<u8> = Vec::new();

    let mut push_dynamic = |s: &str, heads: &mut Vec<[u8; 32]>, tail: &mut Vec<u8>| {
        let offset = (head_words * 32) + tail.len();
        heads.push(left_pad32(&(offset as u64).to_be_bytes()).expect("u64 fits"));
        encode_dynamic_bytes_into(s.as_bytes(), tail);
    };

    // version (dynamic)
    push_dynamic(version, &mut heads, &mut tail);
    // chainId rendered as a decimal string per the manifest's canonical
    // tuple: the spec names the slot `string` for chainId, matching the
    // manifest's `network.chainId` serialization (see manifest.rs).
    push_dynamic(chain_id_string, &mut heads, &mut tail);
    // factory (static address)
    heads.push(left_pad32(factory.as_slice()).expect("20 bytes fits"));
    // dispatcher (static address)
    heads.push(left_pad32(dispatcher.as_slice()).expect("20 bytes fits"));
    // merkleRoot (static bytes32)
    heads.push(*merkle_root.as_ref());
    // entryCount (static uint256)
    heads.push(left_pad32(&entry_count.to_be_bytes()).expect("u64 fits"));
    // chunkCount (static uint256)
    heads.push(left_pad32(&chunk_count.to_be_bytes()).expect("u64 fits"));
    // timestamp (dynamic)
    push_dynamic(timestamp, &mut heads, &mut tail);

    let mut out = Vec::with_capacity(heads.len() * 32 + tail.len());
    for h in heads {
        out.extend_from_slice(&h);
    }
    out.extend_from_slice(&tail);
    out
}

fn encode_dynamic_bytes_into(data: &[u8], tail: &mut Vec<u8>) {
    let len = data.len() as u64;
    tail.extend_from_slice(&left_pad32(&len.to_be_bytes()).expect("u64 fits"));
    tail.extend_from_slice(data);
    let padded_len = data.len().div_ceil(32) * 32;
    tail.resize(tail.len() + (padded_len - data.len()), 0);
}

/// `address = lower20(keccak256(0xff || factory || salt || initCodeHash))`.
pub fn create2_address(factory: Address, salt: B256, init_code_hash: B256) -> Address {
    let mut preimage = [0u8; 85];
    preimage[0] = 0xff;
    preimage[1..21].copy_from_slice(factory.as_slice());
    preimage[21..53].copy_from_slice(salt.as_slice());
    preimage[53..85].copy_from_slice(init_code_hash.as_slice());
    let hash = keccak256(&preimage);
    Address::from_slice(&hash.as_slice()[12..32])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak256_is_deterministic_and_not_identity() {
        let result = keccak256(&[0u8; 32]);
        assert_eq!(result, keccak256(&[0u8; 32]));
        assert_ne!(result, B256::ZERO);
        assert_ne!(result.as_slice(), &[0u8; 32][..]);
    }

    #[test]
    fn pair_hash_is_order_sensitive() {
        let a = keccak256(b"a");
        let b = keccak256(b"b");
        assert_ne!(pair_hash(&a, &b), pair_hash(&b, &a));
    }

    #[test]
    fn create2_matches_manual_derivation() {
        let factory: Address = "0x0000000000000000000000000000000000000001"
            .parse()
            .unwrap();
        let salt = keccak256(b"salt");
        let init_code_hash = keccak256(b"init");
        let addr = create2_address(factory, salt, init_code_hash);

        let mut preimage = vec![0xffu8];
        preimage.extend_from_slice(factory.as_slice());
        preimage.extend_from_slice(salt.as_slice());
        preimage.extend_from_slice(init_code_hash.as_slice());
        let expected = Address::from_slice(&keccak256(&preimage).as_slice()[12..32]);
        assert_eq!(addr, expected);
    }

    #[test]
    fn abi_encode_route_pads_each_field_to_a_word() {
        let facet: Address = "0x0000000000000000000000000000000000000002"
            .parse()
            .unwrap();
        let codehash = keccak256(b"runtime");
        let encoded = abi_encode_route([0x12, 0x34, 0x56, 0x78], facet, codehash);
        assert_eq!(encoded.len(), 96);
        assert_eq!(&encoded[0..28], &[0u8; 28]);
        assert_eq!(&encoded[28..32], &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(&encoded[32..64][..12], &[0u8; 12]);
        assert_eq!(&encoded[32..64][12..], facet.as_slice());
        assert_eq!(&encoded[64..96], codehash.as_slice());
    }
}
