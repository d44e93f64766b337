//! The greeting pipeline: identity, registry, Merkle proof, witness, proof, encoding
//! and submission, strictly in that order.
//!
//! Every step observes one [`CancellationToken`]. Cancelling abandons the run between
//! or during steps; nothing is persisted, so a cancelled run leaves no state behind.
//! The hashing steps (Merkle build, witness composition, proof generation) run on the
//! blocking pool and their results are discarded if the run was cancelled meanwhile.

use ark_bn254::Fr;
use greeter_lib::crypto::field_to_decimal;
use greeter_lib::{
    build_merkle_proof, compose_witness, encode_for_verifier, CircuitArtifacts, EncodedProof,
    Error, ErrorKind, ExternalNullifier, ProvingSystem, PublicSignals, Result,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::registry::CommitmentRegistry;
use crate::submission::{Outcome, SubmissionClient};
use crate::wallet::{derive_identity, WalletProvider};

/// Progress reported while a run advances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    DerivingIdentity,
    FetchingRegistry,
    RegistryFetched { commitments: usize },
    BuildingMerkleProof,
    ComposingWitness,
    GeneratingProof,
    ProofGenerated,
    Submitting,
    Accepted,
    /// Terminal event of a run that did not end in [`PipelineEvent::Accepted`].
    Failed(ErrorKind),
}

/// Fixed parameters of the membership circuit.
#[derive(Debug, Clone)]
pub struct CircuitSettings {
    pub depth: usize,
    pub zero_leaf: Fr,
    pub external_nullifier: ExternalNullifier,
    pub artifacts: CircuitArtifacts,
}

/// What a successful run produced. Contains no secret and no identity commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub message: String,
    pub public_signals: PublicSignals,
    pub proof: EncodedProof,
    pub response: String,
}

/// Collaborators of one pipeline. Runs share nothing mutable, so one `Pipeline` can
/// serve concurrent runs.
pub struct Pipeline {
    wallet: Arc<dyn WalletProvider>,
    registry: Arc<dyn CommitmentRegistry>,
    prover: Arc<dyn ProvingSystem>,
    submission: SubmissionClient,
    settings: CircuitSettings,
    events: Option<UnboundedSender<PipelineEvent>>,
}

impl Pipeline {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        registry: Arc<dyn CommitmentRegistry>,
        prover: Arc<dyn ProvingSystem>,
        submission: SubmissionClient,
        settings: CircuitSettings,
    ) -> Self {
        Self {
            wallet,
            registry,
            prover,
            submission,
            settings,
            events: None,
        }
    }

    /// Report progress on `events`. A closed receiver is ignored.
    pub fn with_events(mut self, events: UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: PipelineEvent) {
        debug!(?event, "pipeline progress");
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    /// Run every step for `message`. The last event sent is either
    /// [`PipelineEvent::Accepted`] or [`PipelineEvent::Failed`].
    ///
    /// # Errors
    /// The first failing step's error; a verifier rejection surfaces as
    /// [`Error::SubmissionRejected`] and cancellation as [`Error::Cancelled`].
    pub async fn run(&self, message: &str, cancel: &CancellationToken) -> Result<Receipt> {
        let result = self.execute(message, cancel).await;
        match &result {
            Ok(_) => self.emit(PipelineEvent::Accepted),
            Err(e) => {
                debug!(error = %e, "pipeline run failed");
                self.emit(PipelineEvent::Failed(e.kind()));
            }
        }
        result
    }

    async fn execute(&self, message: &str, cancel: &CancellationToken) -> Result<Receipt> {
        self.emit(PipelineEvent::DerivingIdentity);
        let identity = cancellable(cancel, derive_identity(self.wallet.as_ref())).await?;

        self.emit(PipelineEvent::FetchingRegistry);
        let commitments = cancellable(cancel, self.registry.fetch_commitments()).await?;
        self.emit(PipelineEvent::RegistryFetched {
            commitments: commitments.len(),
        });

        self.emit(PipelineEvent::BuildingMerkleProof);
        let (depth, zero_leaf) = (self.settings.depth, self.settings.zero_leaf);
        let target = identity.commitment();
        let merkle_proof = off_executor(cancel, Error::MerkleProofInconsistent, move || {
            let proof = build_merkle_proof(depth, zero_leaf, &commitments, target)?;
            proof.verify()?;
            Ok(proof)
        })
        .await?;

        self.emit(PipelineEvent::ComposingWitness);
        let external_nullifier = self.settings.external_nullifier;
        let signal = message.to_string();
        let witness = off_executor(cancel, Error::WitnessInvalid, move || {
            compose_witness(&identity, &merkle_proof, &external_nullifier, &signal)
        })
        .await?;

        self.emit(PipelineEvent::GeneratingProof);
        let prover = Arc::clone(&self.prover);
        let artifacts = self.settings.artifacts.clone();
        let (proof, signals) = off_executor(cancel, Error::ProofGenerationFailed, move || {
            prover.prove(&witness, &artifacts)
        })
        .await?;
        self.emit(PipelineEvent::ProofGenerated);

        let encoded = encode_for_verifier(&proof);

        self.emit(PipelineEvent::Submitting);
        let outcome = cancellable(cancel, self.submission.submit(message, &signals, &encoded)).await?;
        match outcome {
            Outcome::Accepted(response) => {
                info!(
                    nullifier_hash = %field_to_decimal(&signals.nullifier_hash),
                    "greeting accepted"
                );
                Ok(Receipt {
                    message: message.to_string(),
                    public_signals: signals,
                    proof: encoded,
                    response,
                })
            }
            Outcome::Rejected(reason) => Err(Error::SubmissionRejected(reason)),
        }
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

/// Await `step` unless `cancel` fires first.
async fn cancellable<T>(
    cancel: &CancellationToken,
    step: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = step => result,
    }
}

/// Run `work` on the blocking pool, abandoning it if `cancel` fires first. A panicked
/// task is reported through `failed`.
async fn off_executor<T, F>(
    cancel: &CancellationToken,
    failed: fn(String) -> Error,
    work: F,
) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    ensure_live(cancel)?;
    let task = tokio::task::spawn_blocking(work);
    cancellable(cancel, async {
        task.await
            .map_err(|e| failed(format!("worker task failed: {e}")))?
    })
    .await
}
