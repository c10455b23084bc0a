//! EIP-712 typed-data verification for an optional manifest signature. The
//! core never signs — it only recovers and checks a signer that's already
//! present on a persisted manifest, per the preflight validator's step 8.

use crate::error::{ManifestError, Result};
use crate::hashing::keccak256;
use alloy_primitives::{Address, Signature, B256};

const DOMAIN_TYPE_HASH_PREIMAGE: &[u8] =
    b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
const MANIFEST_TYPE_HASH_PREIMAGE: &[u8] =
    b"Manifest(string version,bytes32 merkleRoot,bytes32 manifestHash,string timestamp)";
const DOMAIN_NAME: &str = "PayRox Go Beyond";
const DOMAIN_VERSION: &str = "1";

fn left_pad32(bytes: &[u8]) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(bytes);
    word
}

fn domain_separator(chain_id: u64, verifying_contract: Address) -> B256 {
    let type_hash = keccak256(DOMAIN_TYPE_HASH_PREIMAGE);
    let name_hash = keccak256(DOMAIN_NAME.as_bytes());
    let version_hash = keccak256(DOMAIN_VERSION.as_bytes());

    let mut preimage = Vec::with_capacity(32 * 5);
    preimage.extend_from_slice(type_hash.as_slice());
    preimage.extend_from_slice(name_hash.as_slice());
    preimage.extend_from_slice(version_hash.as_slice());
    preimage.extend_from_slice(&left_pad32(&chain_id.to_be_bytes()));
    preimage.extend_from_slice(&left_pad32(verifying_contract.as_slice()));
    keccak256(&preimage)
}

fn manifest_struct_hash(version: &str, merkle_root: B256, manifest_hash: B256, timestamp: &str) -> B256 {
    let type_hash = keccak256(MANIFEST_TYPE_HASH_PREIMAGE);
    let version_hash = keccak256(version.as_bytes());
    let timestamp_hash = keccak256(timestamp.as_bytes());

    let mut preimage = Vec::with_capacity(32 * 5);
    preimage.extend_from_slice(type_hash.as_slice());
    preimage.extend_from_slice(version_hash.as_slice());
    preimage.extend_from_slice(merkle_root.as_slice());
    preimage.extend_from_slice(manifest_hash.as_slice());
    preimage.extend_from_slice(timestamp_hash.as_slice());
    keccak256(&preimage)
}

/// The EIP-712 signing hash: `keccak256(0x1901 || domainSeparator || structHash)`.
pub fn signing_hash(
    chain_id: u64,
    verifying_contract: Address,
    version: &str,
    merkle_root: B256,
    manifest_hash: B256,
    timestamp: &str,
) -> B256 {
    let domain = domain_separator(chain_id, verifying_contract);
    let message = manifest_struct_hash(version, merkle_root, manifest_hash, timestamp);

    let mut preimage = Vec::with_capacity(2 + 32 + 32);
    preimage.extend_from_slice(&[0x19, 0x01]);
    preimage.extend_from_slice(domain.as_slice());
    preimage.extend_from_slice(message.as_slice());
    keccak256(&preimage)
}

/// Recover the signer of `signature_hex` (a `0x`-prefixed 65-byte r||s||v
/// signature) over the manifest's own typed-data hash, and check it against
/// `authorized_signers`. Returns the recovered address on success.
pub fn recover_and_authorize(
    signature_hex: &str,
    chain_id: u64,
    verifying_contract: Address,
    version: &str,
    merkle_root: B256,
    manifest_hash: B256,
    timestamp: &str,
    authorized_signers: &[Address],
) -> Result<Address> {
    let hex_body = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
    let bytes = hex::decode(hex_body).map_err(|e| ManifestError::SignatureInvalid {
        reason: format!("invalid hex: {e}"),
    })?;
    if bytes.len() != 65 {
        return Err(ManifestError::SignatureInvalid {
            reason: format!("expected 65 bytes, got {}", bytes.len()),
        });
    }
    let signature = Signature::try_from(bytes.as_slice()).map_err(|e| ManifestError::SignatureInvalid {
        reason: e.to_string(),
    })?;

    let hash = signing_hash(
        chain_id,
        verifying_contract,
        version,
        merkle_root,
        manifest_hash,
        timestamp,
    );

    let signer = signature
        .recover_address_from_prehash(&hash)
        .map_err(|e| ManifestError::SignatureInvalid {
            reason: e.to_string(),
        })?;

    if !authorized_signers.iter().any(|a| *a == signer) {
        return Err(ManifestError::SignerUnauthorized { signer });
    }
    Ok(signer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_hash_is_deterministic_and_domain_sensitive() {
        let contract: Address = "0x0000000000000000000000000000000000000001"
            .parse()
            .unwrap();
        let root = keccak256(b"root");
        let hash = keccak256(b"hash");
        let a = signing_hash(1, contract, "1.0.0", root, hash, "2026-01-01T00:00:00Z");
        let b = signing_hash(1, contract, "1.0.0", root, hash, "2026-01-01T00:00:00Z");
        assert_eq!(a, b);

        let different_chain = signing_hash(2, contract, "1.0.0", root, hash, "2026-01-01T00:00:00Z");
        assert_ne!(a, different_chain);
    }

    #[test]
    fn malformed_signature_hex_is_rejected() {
        let contract: Address = "0x0000000000000000000000000000000000000001"
            .parse()
            .unwrap();
        let root = keccak256(b"root");
        let hash = keccak256(b"hash");
        let err = recover_and_authorize(
            "0xnot-hex",
            1,
            contract,
            "1.0.0",
            root,
            hash,
            "2026-01-01T00:00:00Z",
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::SignatureInvalid { .. }));
    }

    #[test]
    fn wrong_length_signature_is_rejected() {
        let contract: Address = "0x0000000000000000000000000000000000000001"
            .parse()
            .unwrap();
        let root = keccak256(b"root");
        let hash = keccak256(b"hash");
        let short_sig = format!("0x{}", hex::encode([0u8; 64]));
        let err = recover_and_authorize(
            &short_sig,
            1,
            contract,
            "1.0.0",
            root,
            hash,
            "2026-01-01T00:00:00Z",
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::SignatureInvalid { .. }));
    }
}
