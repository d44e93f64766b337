//! Cryptographic utilities for the greeter
//!
//! This module provides the hash functions shared by the identity derivation, the
//! Merkle tree and the circuit: circom-compatible Poseidon over BN254, Keccak-256 for
//! signal hashing and SHA-256 for seeding identity secrets. It also converts field
//! elements to and from the decimal/hex strings used on the wire.

use alloy_primitives::B256;
use ark_bn254::Fr;
use ark_ff::PrimeField;
use light_poseidon::{parameters::bn254_x5, Poseidon, PoseidonHasher, PoseidonParameters};
use num_bigint::BigUint;
use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

use crate::error::{Error, Result};

/// Hash length in bytes (32 bytes for Keccak-256, SHA-256 and Poseidon)
pub const HASH_LENGTH: usize = 32;

/// Compute Poseidon hash of two field elements
///
/// This is the node hash of the membership tree and the hash the circuit uses
/// for the identity secret and the nullifier hash.
///
/// # Arguments
/// * `left` - Left input field element
/// * `right` - Right input field element
///
/// # Returns
/// * Poseidon hash as a field element
pub fn poseidon_hash(left: Fr, right: Fr) -> Result<Fr> {
    let mut poseidon = Poseidon::<Fr>::new_circom(2)?;
    Ok(poseidon.hash(&[left, right])?)
}

/// Compute Poseidon hash of a single field element
///
/// Used to turn the identity secret into the public commitment.
pub fn poseidon_hash1(input: Fr) -> Result<Fr> {
    let mut poseidon = Poseidon::<Fr>::new_circom(1)?;
    Ok(poseidon.hash(&[input])?)
}

/// Round constants and MDS matrix for a circom Poseidon instance of `width`
/// (number of inputs + 1). The in-circuit gadget is built from these.
pub fn poseidon_parameters(width: usize) -> Result<PoseidonParameters<Fr>> {
    let width = u8::try_from(width)
        .map_err(|_| Error::ProofGenerationFailed(format!("unsupported poseidon width {width}")))?;
    Ok(bn254_x5::get_poseidon_parameters::<Fr>(width)?)
}

/// Compute Keccak-256 hash of input data
///
/// # Arguments
/// * `input` - Input data to hash
///
/// # Returns
/// * Keccak-256 hash as B256
pub fn keccak256<T: AsRef<[u8]>>(input: T) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; HASH_LENGTH];

    hasher.update(input.as_ref());
    hasher.finalize(&mut output);

    B256::from(output)
}

/// Hash arbitrary bytes into the scalar field as `keccak256(bytes) >> 8`
///
/// Dropping the low byte keeps the value below the BN254 modulus, which is how
/// Solidity verifiers hash signals and external nullifiers.
pub fn hash_to_field(bytes: &[u8]) -> Fr {
    let digest = keccak256(bytes);
    Fr::from_be_bytes_mod_order(&digest[..HASH_LENGTH - 1])
}

/// Derive a secret scalar as `SHA-256(seed || domain) mod r`
///
/// The domain string separates the scalars that share one seed.
pub fn sha256_to_field(seed: &[u8], domain: &str) -> Fr {
    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(domain.as_bytes());
    Fr::from_be_bytes_mod_order(&hasher.finalize())
}

/// Parse a field element from a decimal or `0x`-prefixed hex string.
///
/// Values at or above the field modulus are rejected rather than reduced, so
/// that two different strings never name the same element.
pub fn parse_field<F: PrimeField>(value: &str) -> Result<F> {
    let trimmed = value.trim();
    let (digits, radix) = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(digits) => (digits, 16),
        None => (trimmed, 10),
    };
    // parse_bytes also takes a sign and `_` separators
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(Error::InvalidEncoding(format!("not a number: {value:?}")));
    }
    let parsed = BigUint::parse_bytes(digits.as_bytes(), radix)
        .ok_or_else(|| Error::InvalidEncoding(format!("not a number: {value:?}")))?;

    let modulus: BigUint = F::MODULUS.into();
    if parsed >= modulus {
        return Err(Error::InvalidEncoding(format!(
            "{value} is not below the field modulus"
        )));
    }
    Ok(F::from(parsed))
}

/// Render a field element as a decimal string.
pub fn field_to_decimal<F: PrimeField>(value: &F) -> String {
    let n: BigUint = (*value).into();
    n.to_str_radix(10)
}

/// Render a field element as a 0x-prefixed, 32-byte big-endian hex string.
pub fn field_to_hex<F: PrimeField>(value: &F) -> String {
    let n: BigUint = (*value).into();
    let bytes = n.to_bytes_be();
    let mut padded = [0u8; HASH_LENGTH];
    padded[HASH_LENGTH - bytes.len()..].copy_from_slice(&bytes);
    format!("0x{}", hex::encode(padded))
}

/// Serde adapters that carry scalar field elements as decimal strings, the
/// representation JSON verifiers and snarkjs tooling expect.
pub mod serde_field {
    use ark_bn254::Fr;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use super::{field_to_decimal, parse_field};

    pub fn serialize<S: Serializer>(value: &Fr, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&field_to_decimal(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Fr, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_field(&raw).map_err(D::Error::custom)
    }

    pub mod vec {
        use super::*;
        use serde::ser::SerializeSeq;

        pub fn serialize<S: Serializer>(values: &[Fr], serializer: S) -> Result<S::Ok, S::Error> {
            let mut seq = serializer.serialize_seq(Some(values.len()))?;
            for value in values {
                seq.serialize_element(&field_to_decimal(value))?;
            }
            seq.end()
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Fr>, D::Error> {
            Vec::<String>::deserialize(deserializer)?
                .iter()
                .map(|raw| parse_field(raw).map_err(D::Error::custom))
                .collect()
        }
    }
}
