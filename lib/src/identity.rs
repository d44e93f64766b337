use ark_bn254::Fr;
use std::fmt;
use zeroize::Zeroize;

use crate::crypto::{field_to_hex, poseidon_hash, poseidon_hash1, sha256_to_field};
use crate::error::Result;
use crate::witness::ExternalNullifier;

/// The fixed, publicly known message a wallet signs to seed an identity.
pub const IDENTITY_CHALLENGE: &str = "Sign this message to create your identity!";

const TRAPDOOR_DOMAIN: &str = "identity_trapdoor";
const NULLIFIER_DOMAIN: &str = "identity_nullifier";

/// Raw signature bytes returned by a wallet for [`IDENTITY_CHALLENGE`].
///
/// Only lives long enough to seed an [`Identity`]; the bytes are wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct WalletSignature(Vec<u8>);

impl WalletSignature {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The signature as a wallet would print it: lowercase hex with a 0x prefix.
    /// This string is the seed of the identity secrets.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for WalletSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletSignature({} bytes)", self.0.len())
    }
}

impl Drop for WalletSignature {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Represents a membership identity, containing the two secret scalars
/// and the public commitment published in the registry.
/// The `trapdoor` and `nullifier` never leave the process; the
/// `commitment` is what the registry stores.
pub struct Identity {
    trapdoor: Fr,
    nullifier: Fr,
    commitment: Fr,
}

impl Identity {
    /// Derives the identity seeded by a wallet signature.
    /// The same signature always yields the same secrets and commitment.
    pub fn from_signature(signature: &WalletSignature) -> Result<Self> {
        let mut seed = signature.to_hex();
        let trapdoor = sha256_to_field(seed.as_bytes(), TRAPDOOR_DOMAIN);
        let nullifier = sha256_to_field(seed.as_bytes(), NULLIFIER_DOMAIN);
        seed.zeroize();

        Self::from_secrets(trapdoor, nullifier)
    }

    /// Rebuilds an identity from its two secret scalars.
    pub fn from_secrets(trapdoor: Fr, nullifier: Fr) -> Result<Self> {
        // commitment = H(H(nullifier, trapdoor)), the same layout the circuit checks
        let secret = poseidon_hash(nullifier, trapdoor)?;
        let commitment = poseidon_hash1(secret)?;

        Ok(Self {
            trapdoor,
            nullifier,
            commitment,
        })
    }

    pub fn trapdoor(&self) -> Fr {
        self.trapdoor
    }

    pub fn nullifier(&self) -> Fr {
        self.nullifier
    }

    /// Public commitment, i.e. this identity's leaf in the membership tree.
    pub fn commitment(&self) -> Fr {
        self.commitment
    }

    /// Calculates the nullifier hash for one external nullifier.
    /// This value is revealed with a proof so the verifier can refuse a
    /// second use of the same identity within that scope.
    pub fn nullifier_hash(&self, external_nullifier: &ExternalNullifier) -> Result<Fr> {
        poseidon_hash(external_nullifier.value(), self.nullifier)
    }
}

/// Only the public commitment is printed.
impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity(commitment: {})", field_to_hex(&self.commitment))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("commitment", &field_to_hex(&self.commitment))
            .finish_non_exhaustive()
    }
}

impl Drop for Identity {
    fn drop(&mut self) {
        self.trapdoor.zeroize();
        self.nullifier.zeroize();
    }
}
