//! Circuit inputs for one membership proof.

use ark_bn254::Fr;
use serde_json::{json, Value};
use std::fmt;
use zeroize::Zeroize;

use crate::crypto::{field_to_decimal, field_to_hex, hash_to_field};
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::merkle::MerkleProof;

/// Topic the greeter scopes its nullifiers to.
pub const DEFAULT_TOPIC: &str = "greet-v1";

/// Scope of a nullifier. One identity yields one nullifier hash per scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalNullifier(Fr);

impl ExternalNullifier {
    /// Hash a topic string into the field the same way signals are hashed.
    pub fn from_topic(topic: &str) -> Self {
        Self(hash_to_field(topic.as_bytes()))
    }

    pub fn value(&self) -> Fr {
        self.0
    }
}

impl From<Fr> for ExternalNullifier {
    fn from(value: Fr) -> Self {
        Self(value)
    }
}

impl Default for ExternalNullifier {
    fn default() -> Self {
        Self::from_topic(DEFAULT_TOPIC)
    }
}

impl fmt::Display for ExternalNullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&field_to_decimal(&self.0))
    }
}

/// `keccak256(utf8(message)) >> 8`, the signal the verifier recomputes.
pub fn signal_hash(message: &str) -> Fr {
    hash_to_field(message.as_bytes())
}

/// Private and public inputs of the membership circuit.
pub struct Witness {
    pub(crate) identity_trapdoor: Fr,
    pub(crate) identity_nullifier: Fr,
    pub(crate) path_elements: Vec<Fr>,
    pub(crate) path_indices: Vec<u8>,
    pub(crate) root: Fr,
    pub(crate) external_nullifier: Fr,
    pub(crate) signal_hash: Fr,
}

impl Witness {
    pub fn depth(&self) -> usize {
        self.path_elements.len()
    }

    pub fn root(&self) -> Fr {
        self.root
    }

    pub fn external_nullifier(&self) -> Fr {
        self.external_nullifier
    }

    pub fn signal_hash(&self) -> Fr {
        self.signal_hash
    }

    /// Named inputs in the layout of the circom Semaphore circuit, every
    /// scalar as a decimal string. Holds secrets; never log the result.
    pub fn to_circom_inputs(&self) -> Value {
        let decimal = |values: &[Fr]| -> Vec<String> { values.iter().map(field_to_decimal).collect() };
        json!({
            "identityNullifier": field_to_decimal(&self.identity_nullifier),
            "identityTrapdoor": field_to_decimal(&self.identity_trapdoor),
            "treePathIndices": self.path_indices,
            "treeSiblings": decimal(&self.path_elements),
            "externalNullifier": field_to_decimal(&self.external_nullifier),
            "signalHash": field_to_decimal(&self.signal_hash),
        })
    }
}

impl fmt::Debug for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Witness")
            .field("depth", &self.depth())
            .field("root", &field_to_hex(&self.root))
            .field("external_nullifier", &field_to_hex(&self.external_nullifier))
            .field("signal_hash", &field_to_hex(&self.signal_hash))
            .finish_non_exhaustive()
    }
}

impl Drop for Witness {
    fn drop(&mut self) {
        self.identity_trapdoor.zeroize();
        self.identity_nullifier.zeroize();
        self.path_elements.zeroize();
        self.path_indices.zeroize();
    }
}

/// Assemble the circuit inputs binding `message` to a membership proof.
///
/// # Errors
/// * [`Error::WitnessInvalid`] if the Merkle proof is not for this identity
/// * [`Error::MerkleProofInconsistent`] if the path does not reproduce its root
pub fn compose_witness(
    identity: &Identity,
    merkle_proof: &MerkleProof,
    external_nullifier: &ExternalNullifier,
    message: &str,
) -> Result<Witness> {
    if merkle_proof.leaf != identity.commitment() {
        return Err(Error::WitnessInvalid(format!(
            "merkle proof is for leaf {}, not for commitment {}",
            field_to_hex(&merkle_proof.leaf),
            field_to_hex(&identity.commitment())
        )));
    }
    merkle_proof.verify()?;

    Ok(Witness {
        identity_trapdoor: identity.trapdoor(),
        identity_nullifier: identity.nullifier(),
        path_elements: merkle_proof.path_elements.clone(),
        path_indices: merkle_proof.path_indices.clone(),
        root: merkle_proof.root,
        external_nullifier: external_nullifier.value(),
        signal_hash: signal_hash(message),
    })
}
