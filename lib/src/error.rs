//! Error taxonomy for the membership-proof pipeline.
//!
//! Every stage halts on the first failure and reports one of these variants. Host code
//! (wallet adapters, HTTP clients) maps its transport errors into the same enum so the
//! caller can match on [`ErrorKind`] regardless of where the failure happened.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure raised by any stage of the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// No signing capability is configured, or it exposes no accounts.
    #[error("wallet provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The user declined to sign the identity challenge.
    #[error("signature request rejected by the user")]
    UserRejected,

    /// The commitment registry could not be read or contained a malformed entry.
    #[error("failed to fetch identity commitments: {0}")]
    RegistryFetchFailed(String),

    /// The caller's commitment is not present in the registry snapshot.
    #[error("identity commitment {0} is not registered")]
    IdentityNotRegistered(String),

    /// A Merkle path does not reproduce its root, or the tree cannot hold the registry.
    #[error("inconsistent merkle proof: {0}")]
    MerkleProofInconsistent(String),

    /// The witness does not satisfy the circuit constraints.
    #[error("witness rejected by the circuit: {0}")]
    WitnessInvalid(String),

    /// A circuit artifact is missing, corrupt or does not match its manifest.
    #[error("failed to load proving artifact {path}: {reason}")]
    ArtifactLoadError { path: String, reason: String },

    /// The proving backend failed after accepting the witness.
    #[error("proof generation failed: {0}")]
    ProofGenerationFailed(String),

    /// The verifier answered with a server error.
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    /// Transport failure or an unexpected HTTP status.
    #[error("network error: {0}")]
    NetworkError(String),

    /// A proof or field element could not be decoded.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// The run was abandoned through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// The Poseidon permutation could not be instantiated.
    #[error("poseidon hash failed: {0}")]
    Poseidon(#[from] light_poseidon::PoseidonError),
}

/// Discriminant of [`Error`] for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ProviderUnavailable,
    UserRejected,
    RegistryFetchFailed,
    IdentityNotRegistered,
    MerkleProofInconsistent,
    WitnessInvalid,
    ArtifactLoadError,
    ProofGenerationFailed,
    SubmissionRejected,
    NetworkError,
    InvalidEncoding,
    Cancelled,
}

impl Error {
    /// Returns the kind of this error without its payload.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
            Error::UserRejected => ErrorKind::UserRejected,
            Error::RegistryFetchFailed(_) => ErrorKind::RegistryFetchFailed,
            Error::IdentityNotRegistered(_) => ErrorKind::IdentityNotRegistered,
            Error::MerkleProofInconsistent(_) => ErrorKind::MerkleProofInconsistent,
            Error::WitnessInvalid(_) => ErrorKind::WitnessInvalid,
            Error::ArtifactLoadError { .. } => ErrorKind::ArtifactLoadError,
            Error::ProofGenerationFailed(_) => ErrorKind::ProofGenerationFailed,
            Error::SubmissionRejected(_) => ErrorKind::SubmissionRejected,
            Error::NetworkError(_) => ErrorKind::NetworkError,
            Error::InvalidEncoding(_) => ErrorKind::InvalidEncoding,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Poseidon(_) => ErrorKind::ProofGenerationFailed,
        }
    }

    pub(crate) fn artifact(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        Error::ArtifactLoadError {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(Error::UserRejected.kind(), ErrorKind::UserRejected);
        assert_eq!(
            Error::SubmissionRejected("Nullifier already used".into()).kind(),
            ErrorKind::SubmissionRejected
        );
        assert_eq!(
            Error::artifact("keys/proving.key", "missing").kind(),
            ErrorKind::ArtifactLoadError
        );
    }

    #[test]
    fn test_submission_rejected_keeps_reason() {
        let err = Error::SubmissionRejected("Nullifier already used".into());
        assert_eq!(err.to_string(), "submission rejected: Nullifier already used");
    }
}
