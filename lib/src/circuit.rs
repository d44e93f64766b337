//! R1CS membership relation.
//!
//! Public inputs, in order: `root`, `nullifierHash`, `signalHash`, `externalNullifier`.
//! The prover shows knowledge of `(trapdoor, nullifier)` and a Merkle path such that
//!
//! * `commitment = H1(H2(nullifier, trapdoor))` is a leaf of the tree with `root`
//! * `nullifierHash = H2(externalNullifier, nullifier)`
//!
//! and binds `signalHash` through a dummy square constraint.

use ark_bn254::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem, ConstraintSystemRef, SynthesisError};
use zeroize::Zeroize;

use crate::crypto::poseidon_parameters;
use crate::error::{Error, Result};
use crate::witness::Witness;

/// In-circuit Poseidon with the circomlib constants, matching
/// [`crate::crypto::poseidon_hash`] output for output.
#[derive(Clone)]
pub struct PoseidonGadget {
    ark: Vec<Fr>,
    mds: Vec<Vec<Fr>>,
    full_rounds: usize,
    partial_rounds: usize,
    width: usize,
}

impl PoseidonGadget {
    /// Gadget hashing `inputs` field elements.
    pub fn new(inputs: usize) -> Result<Self> {
        let params = poseidon_parameters(inputs + 1)?;
        if params.alpha != 5 {
            return Err(Error::ProofGenerationFailed(format!(
                "unsupported poseidon s-box exponent {}",
                params.alpha
            )));
        }
        Ok(Self {
            ark: params.ark,
            mds: params.mds,
            full_rounds: params.full_rounds,
            partial_rounds: params.partial_rounds,
            width: params.width,
        })
    }

    pub fn hash(&self, inputs: &[FpVar<Fr>]) -> std::result::Result<FpVar<Fr>, SynthesisError> {
        if inputs.len() + 1 != self.width {
            return Err(SynthesisError::Unsatisfiable);
        }

        let mut state = Vec::with_capacity(self.width);
        state.push(FpVar::zero());
        state.extend(inputs.iter().cloned());

        let half = self.full_rounds / 2;
        for round in 0..self.full_rounds + self.partial_rounds {
            for (i, element) in state.iter_mut().enumerate() {
                *element += self.ark[round * self.width + i];
            }

            if round < half || round >= half + self.partial_rounds {
                for element in state.iter_mut() {
                    *element = quintic(element)?;
                }
            } else {
                state[0] = quintic(&state[0])?;
            }

            state = self
                .mds
                .iter()
                .map(|row| {
                    row.iter()
                        .zip(&state)
                        .fold(FpVar::zero(), |acc, (m, s)| acc + s * *m)
                })
                .collect();
        }

        Ok(state.swap_remove(0))
    }
}

fn quintic(x: &FpVar<Fr>) -> std::result::Result<FpVar<Fr>, SynthesisError> {
    let x2 = x.square()?;
    let x4 = x2.square()?;
    Ok(x4 * x)
}

/// The membership circuit for one proof.
#[derive(Clone)]
pub struct MembershipCircuit {
    identity_trapdoor: Fr,
    identity_nullifier: Fr,
    path_elements: Vec<Fr>,
    path_indices: Vec<bool>,
    root: Fr,
    nullifier_hash: Fr,
    signal_hash: Fr,
    external_nullifier: Fr,
    hash1: PoseidonGadget,
    hash2: PoseidonGadget,
}

impl MembershipCircuit {
    /// Circuit assigned from a composed witness and its derived nullifier hash.
    pub fn new(witness: &Witness, nullifier_hash: Fr) -> Result<Self> {
        let path_indices = witness
            .path_indices
            .iter()
            .map(|bit| match bit {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(Error::WitnessInvalid(format!("path index {other} is not a bit"))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            identity_trapdoor: witness.identity_trapdoor,
            identity_nullifier: witness.identity_nullifier,
            path_elements: witness.path_elements.clone(),
            path_indices,
            root: witness.root,
            nullifier_hash,
            signal_hash: witness.signal_hash,
            external_nullifier: witness.external_nullifier,
            hash1: PoseidonGadget::new(1)?,
            hash2: PoseidonGadget::new(2)?,
        })
    }

    /// Zero-assigned circuit of the given depth, used for key generation.
    pub fn blank(depth: usize) -> Result<Self> {
        Ok(Self {
            identity_trapdoor: Fr::from(0u64),
            identity_nullifier: Fr::from(0u64),
            path_elements: vec![Fr::from(0u64); depth],
            path_indices: vec![false; depth],
            root: Fr::from(0u64),
            nullifier_hash: Fr::from(0u64),
            signal_hash: Fr::from(0u64),
            external_nullifier: Fr::from(0u64),
            hash1: PoseidonGadget::new(1)?,
            hash2: PoseidonGadget::new(2)?,
        })
    }

    pub fn depth(&self) -> usize {
        self.path_elements.len()
    }

    /// Public inputs in allocation order.
    pub fn public_inputs(&self) -> [Fr; 4] {
        [
            self.root,
            self.nullifier_hash,
            self.signal_hash,
            self.external_nullifier,
        ]
    }

    /// Synthesize the circuit with its assignment and check every constraint.
    ///
    /// # Errors
    /// [`Error::WitnessInvalid`] naming the first unsatisfied constraint.
    pub fn check_satisfied(&self) -> Result<()> {
        let cs = ConstraintSystem::<Fr>::new_ref();
        self.clone()
            .generate_constraints(cs.clone())
            .map_err(|e| Error::WitnessInvalid(e.to_string()))?;

        let satisfied = cs
            .is_satisfied()
            .map_err(|e| Error::WitnessInvalid(e.to_string()))?;
        if !satisfied {
            let which = cs
                .which_is_unsatisfied()
                .ok()
                .flatten()
                .unwrap_or_else(|| "unknown constraint".to_string());
            return Err(Error::WitnessInvalid(format!("unsatisfied constraint {which}")));
        }
        Ok(())
    }
}

impl ConstraintSynthesizer<Fr> for MembershipCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> std::result::Result<(), SynthesisError> {
        let root = FpVar::new_input(cs.clone(), || Ok(self.root))?;
        let nullifier_hash = FpVar::new_input(cs.clone(), || Ok(self.nullifier_hash))?;
        let signal_hash = FpVar::new_input(cs.clone(), || Ok(self.signal_hash))?;
        let external_nullifier = FpVar::new_input(cs.clone(), || Ok(self.external_nullifier))?;

        let trapdoor = FpVar::new_witness(cs.clone(), || Ok(self.identity_trapdoor))?;
        let nullifier = FpVar::new_witness(cs.clone(), || Ok(self.identity_nullifier))?;

        let secret = self.hash2.hash(&[nullifier.clone(), trapdoor])?;
        let mut current = self.hash1.hash(&[secret])?;

        for (sibling, is_right) in self.path_elements.iter().zip(&self.path_indices) {
            let sibling = FpVar::new_witness(cs.clone(), || Ok(*sibling))?;
            let is_right = Boolean::new_witness(cs.clone(), || Ok(*is_right))?;

            let left = is_right.select(&sibling, &current)?;
            let right = is_right.select(&current, &sibling)?;
            current = self.hash2.hash(&[left, right])?;
        }
        current.enforce_equal(&root)?;

        let computed = self.hash2.hash(&[external_nullifier, nullifier])?;
        computed.enforce_equal(&nullifier_hash)?;

        // ties the signal to the proof
        let _ = signal_hash.square()?;

        Ok(())
    }
}

impl Drop for MembershipCircuit {
    fn drop(&mut self) {
        self.identity_trapdoor.zeroize();
        self.identity_nullifier.zeroize();
        self.path_elements.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{poseidon_hash, poseidon_hash1};
    use crate::error::ErrorKind;
    use crate::identity::Identity;
    use crate::merkle::build_merkle_proof;
    use crate::witness::{compose_witness, ExternalNullifier};

    fn witness_for(depth: usize) -> (Witness, Fr) {
        let identity = Identity::from_secrets(Fr::from(17u64), Fr::from(23u64)).unwrap();
        let leaves = [Fr::from(5u64), Fr::from(6u64), identity.commitment()];
        let proof = build_merkle_proof(depth, Fr::from(0u64), &leaves, identity.commitment()).unwrap();
        let scope = ExternalNullifier::from_topic("greet-v1");
        let nullifier_hash = identity.nullifier_hash(&scope).unwrap();
        (compose_witness(&identity, &proof, &scope, "Hello world").unwrap(), nullifier_hash)
    }

    #[test]
    fn test_gadget_matches_native_poseidon() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let a = FpVar::new_witness(cs.clone(), || Ok(Fr::from(1u64))).unwrap();
        let b = FpVar::new_witness(cs.clone(), || Ok(Fr::from(2u64))).unwrap();

        let two = PoseidonGadget::new(2).unwrap().hash(&[a.clone(), b]).unwrap();
        let one = PoseidonGadget::new(1).unwrap().hash(&[a]).unwrap();

        assert_eq!(
            two.value().unwrap(),
            poseidon_hash(Fr::from(1u64), Fr::from(2u64)).unwrap()
        );
        assert_eq!(one.value().unwrap(), poseidon_hash1(Fr::from(1u64)).unwrap());
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_gadget_rejects_wrong_arity() {
        let gadget = PoseidonGadget::new(2).unwrap();
        assert!(gadget.hash(&[FpVar::zero()]).is_err());
    }

    #[test]
    fn test_valid_witness_satisfies_circuit() {
        let (witness, nullifier_hash) = witness_for(3);
        let circuit = MembershipCircuit::new(&witness, nullifier_hash).unwrap();
        circuit.check_satisfied().unwrap();
        assert_eq!(circuit.public_inputs()[0], witness.root());
    }

    #[test]
    fn test_wrong_nullifier_hash_is_unsatisfied() {
        let (witness, nullifier_hash) = witness_for(3);
        let circuit = MembershipCircuit::new(&witness, nullifier_hash + Fr::from(1u64)).unwrap();
        assert_eq!(
            circuit.check_satisfied().unwrap_err().kind(),
            ErrorKind::WitnessInvalid
        );
    }

    #[test]
    fn test_wrong_root_is_unsatisfied() {
        let (mut witness, nullifier_hash) = witness_for(2);
        witness.root += Fr::from(1u64);
        let circuit = MembershipCircuit::new(&witness, nullifier_hash).unwrap();
        assert!(circuit.check_satisfied().is_err());
    }

    #[test]
    fn test_blank_circuit_shape() {
        let blank = MembershipCircuit::blank(4).unwrap();
        assert_eq!(blank.depth(), 4);

        let cs = ConstraintSystem::<Fr>::new_ref();
        blank.generate_constraints(cs.clone()).unwrap();
        // one-variable plus four public inputs
        assert_eq!(cs.num_instance_variables(), 5);
    }
}
