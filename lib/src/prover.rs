//! Proof generation and verification for the membership circuit.
//!
//! The bundled [`Groth16Prover`] reads two artifacts per proof: a JSON circuit manifest
//! and the compressed proving key it pins by SHA-256. [`setup`] produces both together
//! with the verifying key the remote verifier needs.

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, Proof, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::circuit::MembershipCircuit;
use crate::crypto::{poseidon_hash, serde_field};
use crate::error::{Error, Result};
use crate::merkle::MAX_TREE_DEPTH;
use crate::witness::Witness;

/// Name recorded in, and required of, every circuit manifest.
pub const CIRCUIT_NAME: &str = "semaphore-membership";
pub const CIRCUIT_VERSION: &str = "1";

pub const MANIFEST_FILE: &str = "circuit.json";
pub const PROVING_KEY_FILE: &str = "proving.key";
pub const VERIFYING_KEY_FILE: &str = "verifying.key";

/// A Groth16 proof over BN254.
pub type SnarkProof = Proof<Bn254>;

/// Public values a proof attests to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSignals {
    #[serde(with = "serde_field")]
    pub root: Fr,
    #[serde(with = "serde_field")]
    pub nullifier_hash: Fr,
    #[serde(with = "serde_field")]
    pub signal_hash: Fr,
    #[serde(with = "serde_field")]
    pub external_nullifier: Fr,
}

impl PublicSignals {
    /// Verifier inputs, in circuit order.
    pub fn to_inputs(&self) -> [Fr; 4] {
        [
            self.root,
            self.nullifier_hash,
            self.signal_hash,
            self.external_nullifier,
        ]
    }
}

/// Describes the circuit a proving key was generated for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitManifest {
    pub name: String,
    pub version: String,
    pub tree_depth: usize,
    pub proving_key_sha256: String,
}

impl CircuitManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path).map_err(|e| Error::artifact(path, e))?;
        let manifest: Self =
            serde_json::from_slice(&raw).map_err(|e| Error::artifact(path, e))?;

        if manifest.name != CIRCUIT_NAME {
            return Err(Error::artifact(
                path,
                format!("expected circuit {CIRCUIT_NAME}, found {}", manifest.name),
            ));
        }
        if manifest.tree_depth == 0 || manifest.tree_depth > MAX_TREE_DEPTH {
            return Err(Error::artifact(
                path,
                format!("tree depth {} out of range", manifest.tree_depth),
            ));
        }
        Ok(manifest)
    }
}

/// Paths of the files produced by [`setup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitArtifacts {
    pub circuit: PathBuf,
    pub proving_key: PathBuf,
    pub verifying_key: PathBuf,
}

impl CircuitArtifacts {
    /// Standard file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            circuit: dir.join(MANIFEST_FILE),
            proving_key: dir.join(PROVING_KEY_FILE),
            verifying_key: dir.join(VERIFYING_KEY_FILE),
        }
    }
}

/// A backend able to turn a witness into a proof.
pub trait ProvingSystem: Send + Sync {
    /// Prove the membership relation for `witness` with the given artifacts.
    ///
    /// # Errors
    /// * [`Error::ArtifactLoadError`] for a missing, corrupt or mismatched artifact
    /// * [`Error::WitnessInvalid`] if the witness does not satisfy the circuit
    /// * [`Error::ProofGenerationFailed`] if the backend fails
    fn prove(&self, witness: &Witness, artifacts: &CircuitArtifacts)
        -> Result<(SnarkProof, PublicSignals)>;
}

/// Groth16 over BN254.
#[derive(Debug, Default, Clone, Copy)]
pub struct Groth16Prover;

impl ProvingSystem for Groth16Prover {
    fn prove(
        &self,
        witness: &Witness,
        artifacts: &CircuitArtifacts,
    ) -> Result<(SnarkProof, PublicSignals)> {
        let manifest = CircuitManifest::load(&artifacts.circuit)?;
        if witness.depth() != manifest.tree_depth {
            return Err(Error::WitnessInvalid(format!(
                "merkle path has {} levels, circuit expects {}",
                witness.depth(),
                manifest.tree_depth
            )));
        }

        let signals = PublicSignals {
            root: witness.root,
            nullifier_hash: poseidon_hash(witness.external_nullifier, witness.identity_nullifier)?,
            signal_hash: witness.signal_hash,
            external_nullifier: witness.external_nullifier,
        };

        let circuit = MembershipCircuit::new(witness, signals.nullifier_hash)?;
        circuit.check_satisfied()?;

        let proving_key = load_proving_key(&artifacts.proving_key, &manifest)?;

        let start = Instant::now();
        let proof = Groth16::<Bn254>::prove(&proving_key, circuit, &mut OsRng)
            .map_err(|e| Error::ProofGenerationFailed(e.to_string()))?;
        info!(
            depth = manifest.tree_depth,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "generated membership proof"
        );

        Ok((proof, signals))
    }
}

fn load_proving_key(path: &Path, manifest: &CircuitManifest) -> Result<ProvingKey<Bn254>> {
    let bytes = fs::read(path).map_err(|e| Error::artifact(path, e))?;

    let digest = hex::encode(Sha256::digest(&bytes));
    if !digest.eq_ignore_ascii_case(&manifest.proving_key_sha256) {
        return Err(Error::artifact(
            path,
            format!(
                "sha256 {digest} does not match manifest {}",
                manifest.proving_key_sha256
            ),
        ));
    }

    // integrity is pinned by the manifest digest
    let key = ProvingKey::<Bn254>::deserialize_compressed_unchecked(&bytes[..])
        .map_err(|e| Error::artifact(path, e))?;
    debug!(path = %path.display(), bytes = bytes.len(), "loaded proving key");
    Ok(key)
}

/// Read a compressed verifying key.
pub fn load_verifying_key(path: &Path) -> Result<VerifyingKey<Bn254>> {
    let bytes = fs::read(path).map_err(|e| Error::artifact(path, e))?;
    VerifyingKey::<Bn254>::deserialize_compressed(&bytes[..]).map_err(|e| Error::artifact(path, e))
}

/// Generate circuit artifacts for `depth` into `dir` with a fresh OS-random trapdoor.
pub fn setup(dir: &Path, depth: usize) -> Result<CircuitArtifacts> {
    setup_with_rng(dir, depth, &mut OsRng)
}

/// [`setup`] with a caller-provided randomness source.
pub fn setup_with_rng<R: RngCore + CryptoRng>(
    dir: &Path,
    depth: usize,
    rng: &mut R,
) -> Result<CircuitArtifacts> {
    if depth == 0 || depth > MAX_TREE_DEPTH {
        return Err(Error::artifact(dir, format!("tree depth {depth} out of range")));
    }
    fs::create_dir_all(dir).map_err(|e| Error::artifact(dir, e))?;

    let start = Instant::now();
    let (proving_key, verifying_key) =
        Groth16::<Bn254>::circuit_specific_setup(MembershipCircuit::blank(depth)?, rng)
            .map_err(|e| Error::ProofGenerationFailed(e.to_string()))?;

    let artifacts = CircuitArtifacts::in_dir(dir);

    let mut pk_bytes = Vec::new();
    proving_key
        .serialize_compressed(&mut pk_bytes)
        .map_err(|e| Error::artifact(&artifacts.proving_key, e))?;
    let mut vk_bytes = Vec::new();
    verifying_key
        .serialize_compressed(&mut vk_bytes)
        .map_err(|e| Error::artifact(&artifacts.verifying_key, e))?;

    let manifest = CircuitManifest {
        name: CIRCUIT_NAME.to_string(),
        version: CIRCUIT_VERSION.to_string(),
        tree_depth: depth,
        proving_key_sha256: hex::encode(Sha256::digest(&pk_bytes)),
    };
    let manifest_json = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| Error::artifact(&artifacts.circuit, e))?;

    fs::write(&artifacts.proving_key, &pk_bytes)
        .map_err(|e| Error::artifact(&artifacts.proving_key, e))?;
    fs::write(&artifacts.verifying_key, &vk_bytes)
        .map_err(|e| Error::artifact(&artifacts.verifying_key, e))?;
    fs::write(&artifacts.circuit, manifest_json)
        .map_err(|e| Error::artifact(&artifacts.circuit, e))?;

    info!(
        depth,
        dir = %dir.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "wrote circuit artifacts"
    );
    Ok(artifacts)
}

/// Check `proof` against the verifying key and public signals.
pub fn verify(
    verifying_key: &VerifyingKey<Bn254>,
    proof: &SnarkProof,
    signals: &PublicSignals,
) -> Result<bool> {
    Groth16::<Bn254>::verify(verifying_key, &signals.to_inputs(), proof).map_err(|e| {
        Error::ArtifactLoadError {
            path: "verifying key".to_string(),
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::identity::Identity;
    use crate::merkle::build_merkle_proof;
    use crate::witness::{compose_witness, signal_hash, ExternalNullifier};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn artifacts(depth: usize) -> (TempDir, CircuitArtifacts) {
        let dir = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let artifacts = setup_with_rng(dir.path(), depth, &mut rng).unwrap();
        (dir, artifacts)
    }

    fn member_witness(depth: usize) -> (Identity, Witness) {
        let a = Identity::from_secrets(Fr::from(1u64), Fr::from(2u64)).unwrap();
        let b = Identity::from_secrets(Fr::from(3u64), Fr::from(4u64)).unwrap();
        let c = Identity::from_secrets(Fr::from(5u64), Fr::from(6u64)).unwrap();
        let registry = [a.commitment(), b.commitment(), c.commitment()];

        let proof = build_merkle_proof(depth, Fr::from(0u64), &registry, b.commitment()).unwrap();
        let witness = compose_witness(
            &b,
            &proof,
            &ExternalNullifier::from_topic("greet-v1"),
            "Hello world",
        )
        .unwrap();
        (b, witness)
    }

    #[test]
    fn test_prove_and_verify() {
        let (_dir, artifacts) = artifacts(2);
        let (identity, witness) = member_witness(2);

        let (proof, signals) = Groth16Prover.prove(&witness, &artifacts).unwrap();
        let scope = ExternalNullifier::from_topic("greet-v1");
        assert_eq!(signals.nullifier_hash, identity.nullifier_hash(&scope).unwrap());
        assert_eq!(signals.signal_hash, signal_hash("Hello world"));
        assert_eq!(signals.root, witness.root());

        let vk = load_verifying_key(&artifacts.verifying_key).unwrap();
        assert!(verify(&vk, &proof, &signals).unwrap());

        let mut forged = signals;
        forged.signal_hash = signal_hash("Goodbye");
        assert!(!verify(&vk, &proof, &forged).unwrap());
    }

    #[test]
    fn test_repeated_proofs_share_nullifier_hash() {
        let (_dir, artifacts) = artifacts(2);
        let (_, witness) = member_witness(2);

        let (first_proof, first) = Groth16Prover.prove(&witness, &artifacts).unwrap();
        let (second_proof, second) = Groth16Prover.prove(&witness, &artifacts).unwrap();
        assert_eq!(first.nullifier_hash, second.nullifier_hash);
        assert_eq!(first, second);
        // fresh blinding per proof
        assert_ne!(first_proof, second_proof);
    }

    #[test]
    fn test_verifying_key_for_other_arity_is_artifact_error() {
        let (_dir, artifacts) = artifacts(2);
        let (_, witness) = member_witness(2);
        let (proof, signals) = Groth16Prover.prove(&witness, &artifacts).unwrap();

        let mut vk = load_verifying_key(&artifacts.verifying_key).unwrap();
        vk.gamma_abc_g1.pop();
        let err = verify(&vk, &proof, &signals).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArtifactLoadError);
    }

    #[test]
    fn test_depth_mismatch_is_invalid_witness() {
        let (_dir, artifacts) = artifacts(3);
        let (_, witness) = member_witness(2);
        let err = Groth16Prover.prove(&witness, &artifacts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WitnessInvalid);
    }

    #[test]
    fn test_unsatisfied_witness_is_invalid() {
        let (_dir, artifacts) = artifacts(2);
        let (_, mut witness) = member_witness(2);
        witness.identity_trapdoor += Fr::from(1u64);
        let err = Groth16Prover.prove(&witness, &artifacts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WitnessInvalid);
    }

    #[test]
    fn test_missing_artifacts() {
        let dir = TempDir::new().unwrap();
        let (_, witness) = member_witness(2);
        let err = Groth16Prover
            .prove(&witness, &CircuitArtifacts::in_dir(dir.path()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArtifactLoadError);
    }

    #[test]
    fn test_tampered_proving_key_is_rejected() {
        let (_dir, artifacts) = artifacts(2);
        let mut bytes = fs::read(&artifacts.proving_key).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&artifacts.proving_key, bytes).unwrap();

        let (_, witness) = member_witness(2);
        let err = Groth16Prover.prove(&witness, &artifacts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArtifactLoadError);
        assert!(err.to_string().contains("sha256"));
    }

    #[test]
    fn test_manifest_for_other_circuit_is_rejected() {
        let (_dir, artifacts) = artifacts(2);
        let mut manifest = CircuitManifest::load(&artifacts.circuit).unwrap();
        manifest.name = "withdraw".to_string();
        fs::write(&artifacts.circuit, serde_json::to_vec(&manifest).unwrap()).unwrap();

        let err = CircuitManifest::load(&artifacts.circuit).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArtifactLoadError);
    }

    #[test]
    fn test_manifest_records_depth_and_digest() {
        let (_dir, artifacts) = artifacts(2);
        let manifest = CircuitManifest::load(&artifacts.circuit).unwrap();
        assert_eq!(manifest.tree_depth, 2);
        assert_eq!(manifest.proving_key_sha256.len(), 64);

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(&artifacts.circuit).unwrap()).unwrap();
        assert_eq!(raw["treeDepth"], 2);
    }

    #[test]
    fn test_public_signals_json() {
        let signals = PublicSignals {
            root: Fr::from(1u64),
            nullifier_hash: Fr::from(2u64),
            signal_hash: Fr::from(3u64),
            external_nullifier: Fr::from(4u64),
        };
        let json = serde_json::to_value(signals).unwrap();
        assert_eq!(json["nullifierHash"], "2");
        assert_eq!(json["externalNullifier"], "4");
        let back: PublicSignals = serde_json::from_value(json).unwrap();
        assert_eq!(back, signals);
    }
}
