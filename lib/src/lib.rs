pub mod circuit;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod identity;
pub mod merkle;
pub mod prover;
pub mod witness;

// Re-export the pipeline stages for convenience
pub use encoding::{encode_for_verifier, greet_calldata, EncodedProof};
pub use error::{Error, ErrorKind, Result};
pub use identity::{Identity, WalletSignature, IDENTITY_CHALLENGE};
pub use merkle::{build_merkle_proof, MerkleProof, MerkleTree, DEFAULT_TREE_DEPTH};
pub use prover::{
    load_verifying_key, setup, verify, CircuitArtifacts, CircuitManifest, Groth16Prover,
    ProvingSystem, PublicSignals, SnarkProof,
};
pub use witness::{compose_witness, signal_hash, ExternalNullifier, Witness, DEFAULT_TOPIC};
