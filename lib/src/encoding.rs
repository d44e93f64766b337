//! Verifier-facing proof encoding.
//!
//! A Solidity Groth16 verifier takes the proof as `uint256[8]`:
//! `[A.x, A.y, B.x.c1, B.x.c0, B.y.c1, B.y.c0, C.x, C.y]`. G2 coordinates carry the
//! imaginary part first and the point at infinity is written as `(0, 0)`.

use alloy_primitives::{FixedBytes, U256};
use alloy_sol_types::{sol, SolCall};
use ark_bn254::{Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ff::{PrimeField, Zero};
use serde::{Deserialize, Serialize};

use crate::crypto::{field_to_decimal, parse_field};
use crate::error::{Error, Result};
use crate::prover::SnarkProof;

sol! {
    function greet(bytes32 greeting, uint256 nullifierHash, uint256[8] proof);
}

/// Eight decimal strings in verifier argument order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedProof(pub [String; 8]);

impl EncodedProof {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// The same values as EVM words.
    pub fn to_words(&self) -> Result<[U256; 8]> {
        let mut words = [U256::ZERO; 8];
        for (word, value) in words.iter_mut().zip(&self.0) {
            *word = U256::from_str_radix(value, 10)
                .map_err(|e| Error::InvalidEncoding(format!("{value}: {e}")))?;
        }
        Ok(words)
    }

    /// Rebuild the proof, rejecting anything a verifier would not accept.
    ///
    /// # Errors
    /// [`Error::InvalidEncoding`] for a non-canonical coordinate or a point that
    /// is off the curve or outside the prime-order subgroup.
    pub fn decode(&self) -> Result<SnarkProof> {
        let [ax, ay, bx1, bx0, by1, by0, cx, cy] = &self.0;
        Ok(SnarkProof {
            a: decode_g1(ax, ay)?,
            b: decode_g2(bx0, bx1, by0, by1)?,
            c: decode_g1(cx, cy)?,
        })
    }
}

/// Encode a proof in verifier argument order.
pub fn encode_for_verifier(proof: &SnarkProof) -> EncodedProof {
    let (ax, ay) = g1_coordinates(&proof.a);
    let (bx, by) = g2_coordinates(&proof.b);
    let (cx, cy) = g1_coordinates(&proof.c);

    EncodedProof([
        field_to_decimal(&ax),
        field_to_decimal(&ay),
        field_to_decimal(&bx.c1),
        field_to_decimal(&bx.c0),
        field_to_decimal(&by.c1),
        field_to_decimal(&by.c0),
        field_to_decimal(&cx),
        field_to_decimal(&cy),
    ])
}

/// ABI calldata for `greet(bytes32,uint256,uint256[8])`.
///
/// The greeting is stored as a right-padded `bytes32` string, so it must fit in
/// 31 bytes.
pub fn greet_calldata(message: &str, nullifier_hash: Fr, proof: &EncodedProof) -> Result<Vec<u8>> {
    let call = greetCall {
        greeting: bytes32_string(message)?,
        nullifierHash: U256::from_limbs(nullifier_hash.into_bigint().0),
        proof: proof.to_words()?,
    };
    Ok(call.abi_encode())
}

fn bytes32_string(message: &str) -> Result<FixedBytes<32>> {
    let bytes = message.as_bytes();
    if bytes.len() > 31 {
        return Err(Error::InvalidEncoding(format!(
            "greeting is {} bytes, bytes32 strings hold at most 31",
            bytes.len()
        )));
    }
    let mut padded = [0u8; 32];
    padded[..bytes.len()].copy_from_slice(bytes);
    Ok(FixedBytes(padded))
}

fn g1_coordinates(point: &G1Affine) -> (Fq, Fq) {
    if point.infinity {
        (Fq::zero(), Fq::zero())
    } else {
        (point.x, point.y)
    }
}

fn g2_coordinates(point: &G2Affine) -> (Fq2, Fq2) {
    if point.infinity {
        (Fq2::zero(), Fq2::zero())
    } else {
        (point.x, point.y)
    }
}

fn decode_g1(x: &str, y: &str) -> Result<G1Affine> {
    let x: Fq = parse_field(x)?;
    let y: Fq = parse_field(y)?;
    if x.is_zero() && y.is_zero() {
        return Ok(G1Affine::identity());
    }

    let point = G1Affine::new_unchecked(x, y);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(Error::InvalidEncoding(format!("({x}, {y}) is not a G1 point")));
    }
    Ok(point)
}

fn decode_g2(x0: &str, x1: &str, y0: &str, y1: &str) -> Result<G2Affine> {
    let x = Fq2::new(parse_field(x0)?, parse_field(x1)?);
    let y = Fq2::new(parse_field(y0)?, parse_field(y1)?);
    if x.is_zero() && y.is_zero() {
        return Ok(G2Affine::identity());
    }

    let point = G2Affine::new_unchecked(x, y);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(Error::InvalidEncoding("not a G2 point in the prime-order subgroup".into()));
    }
    Ok(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keccak256;
    use crate::error::ErrorKind;
    use crate::identity::Identity;
    use crate::merkle::build_merkle_proof;
    use crate::prover::{load_verifying_key, setup_with_rng, verify, Groth16Prover, ProvingSystem};
    use crate::witness::{compose_witness, ExternalNullifier};
    use ark_ec::AffineRepr;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const P_MINUS_2: &str =
        "21888242871839275222246405745257275088696311157297823662689037894645226208581";

    fn generator_proof() -> SnarkProof {
        SnarkProof {
            a: G1Affine::generator(),
            b: G2Affine::generator(),
            c: -G1Affine::generator(),
        }
    }

    #[test]
    fn test_encode_generator_vectors() {
        let encoded = encode_for_verifier(&generator_proof());
        assert_eq!(
            encoded.0,
            [
                "1".to_string(),
                "2".to_string(),
                "11559732032986387107991004021392285783925812861821192530917403151452391805634".to_string(),
                "10857046999023057135944570762232829481370756359578518086990519993285655852781".to_string(),
                "4082367875863433681332203403145435568316851327593401208105741076214120093531".to_string(),
                "8495653923123431417604973247489272438418190587263600148770280649306958101930".to_string(),
                "1".to_string(),
                P_MINUS_2.to_string(),
            ]
        );
    }

    #[test]
    fn test_decode_inverts_encode() {
        let proof = generator_proof();
        assert_eq!(encode_for_verifier(&proof).decode().unwrap(), proof);
    }

    #[test]
    fn test_point_at_infinity_is_zero_pair() {
        let proof = SnarkProof {
            a: G1Affine::identity(),
            b: G2Affine::identity(),
            c: G1Affine::generator(),
        };
        let encoded = encode_for_verifier(&proof);
        assert!(encoded.0[..6].iter().all(|v| v == "0"));
        assert_eq!(encoded.decode().unwrap(), proof);
    }

    #[test]
    fn test_decode_rejects_off_curve_point() {
        let mut encoded = encode_for_verifier(&generator_proof());
        encoded.0[1] = "3".to_string();
        assert_eq!(encoded.decode().unwrap_err().kind(), ErrorKind::InvalidEncoding);
    }

    #[test]
    fn test_decode_rejects_non_canonical_coordinate() {
        let mut encoded = encode_for_verifier(&generator_proof());
        // p itself, one past the largest coordinate
        encoded.0[7] =
            "21888242871839275222246405745257275088696311157297823662689037894645226208583".to_string();
        assert_eq!(encoded.decode().unwrap_err().kind(), ErrorKind::InvalidEncoding);
    }

    #[test]
    fn test_swapped_g2_limbs_fail_decode() {
        let mut encoded = encode_for_verifier(&generator_proof());
        encoded.0.swap(2, 3);
        assert!(encoded.decode().is_err());
    }

    #[test]
    fn test_json_is_flat_array() {
        let encoded = encode_for_verifier(&generator_proof());
        let json = serde_json::to_value(&encoded).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 8);
        assert_eq!(json[7], P_MINUS_2);
    }

    #[test]
    fn test_words_and_calldata() {
        let encoded = encode_for_verifier(&generator_proof());
        let words = encoded.to_words().unwrap();
        assert_eq!(words[0], U256::from(1u64));
        assert_eq!(words[1], U256::from(2u64));

        let calldata = greet_calldata("Hello world", Fr::from(7u64), &encoded).unwrap();
        let selector = keccak256("greet(bytes32,uint256,uint256[8])");
        assert_eq!(&calldata[..4], &selector[..4]);
        assert_eq!(calldata.len(), 4 + 32 * 10);
        assert_eq!(&calldata[4..15], b"Hello world");
        assert_eq!(calldata[4 + 32 + 31], 7);
    }

    #[test]
    fn test_calldata_rejects_long_greeting() {
        let encoded = encode_for_verifier(&generator_proof());
        let long = "a".repeat(32);
        assert!(greet_calldata(&long, Fr::from(1u64), &encoded).is_err());
    }

    #[test]
    fn test_encoded_proof_still_verifies() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let artifacts = setup_with_rng(dir.path(), 1, &mut rng).unwrap();

        let identity = Identity::from_secrets(Fr::from(8u64), Fr::from(9u64)).unwrap();
        let merkle = build_merkle_proof(1, Fr::from(0u64), &[identity.commitment()], identity.commitment())
            .unwrap();
        let witness = compose_witness(&identity, &merkle, &ExternalNullifier::default(), "gm").unwrap();
        let (proof, signals) = Groth16Prover.prove(&witness, &artifacts).unwrap();

        let decoded = encode_for_verifier(&proof).decode().unwrap();
        let vk = load_verifying_key(&artifacts.verifying_key).unwrap();
        assert!(verify(&vk, &decoded, &signals).unwrap());
    }
}
