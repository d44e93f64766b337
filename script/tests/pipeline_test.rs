//! End-to-end pipeline runs against mocked registry and verifier endpoints.

use ark_bn254::Fr;
use greeter_lib::crypto::field_to_decimal;
use greeter_lib::prover::setup_with_rng;
use greeter_lib::{
    load_verifying_key, signal_hash, verify, CircuitArtifacts, ErrorKind, ExternalNullifier,
    Groth16Prover, Identity,
};
use greeter_script::{
    derive_identity, CircuitSettings, HttpRegistry, LocalWallet, Pipeline, PipelineEvent,
    SubmissionClient,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MEMBER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

struct Harness {
    _dir: TempDir,
    server: MockServer,
    artifacts: CircuitArtifacts,
    identity: Identity,
}

impl Harness {
    async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(2024);
        let artifacts = setup_with_rng(dir.path(), 2, &mut rng).unwrap();

        let identity = derive_identity(&wallet()).await.unwrap();
        Self {
            _dir: dir,
            server: MockServer::start().await,
            artifacts,
            identity,
        }
    }

    async fn serve_registry(&self, commitments: &[Fr]) {
        let body: Vec<String> = commitments.iter().map(field_to_decimal).collect();
        Mock::given(method("GET"))
            .and(path("/identityCommitments.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    fn pipeline(&self) -> Pipeline {
        let registry = HttpRegistry::new(
            format!("{}/identityCommitments.json", self.server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();
        let submission =
            SubmissionClient::new(format!("{}/api/greet", self.server.uri()), Duration::from_secs(5))
                .unwrap();

        Pipeline::new(
            Arc::new(wallet()),
            Arc::new(registry),
            Arc::new(Groth16Prover),
            submission,
            CircuitSettings {
                depth: 2,
                zero_leaf: Fr::from(0u64),
                external_nullifier: ExternalNullifier::from_topic("greet-v1"),
                artifacts: self.artifacts.clone(),
            },
        )
    }
}

fn wallet() -> LocalWallet {
    LocalWallet::from_private_key(MEMBER_KEY).unwrap()
}

fn other_members() -> (Fr, Fr) {
    let a = Identity::from_secrets(Fr::from(101u64), Fr::from(102u64)).unwrap();
    let c = Identity::from_secrets(Fr::from(301u64), Fr::from(302u64)).unwrap();
    (a.commitment(), c.commitment())
}

#[tokio::test]
async fn member_greeting_is_accepted() {
    let harness = Harness::start().await;
    let (ca, cc) = other_members();
    harness
        .serve_registry(&[ca, harness.identity.commitment(), cc])
        .await;
    Mock::given(method("POST"))
        .and(path("/api/greet"))
        .respond_with(ResponseTemplate::new(200).set_body_string("greeted"))
        .expect(1)
        .mount(&harness.server)
        .await;

    let (events, mut progress) = mpsc::unbounded_channel();
    let pipeline = harness.pipeline().with_events(events);
    let receipt = pipeline
        .run("Hello world", &CancellationToken::new())
        .await
        .unwrap();
    drop(pipeline);

    assert_eq!(receipt.response, "greeted");
    assert_eq!(receipt.public_signals.signal_hash, signal_hash("Hello world"));
    let scope = ExternalNullifier::from_topic("greet-v1");
    assert_eq!(
        receipt.public_signals.nullifier_hash,
        harness.identity.nullifier_hash(&scope).unwrap()
    );

    let vk = load_verifying_key(&harness.artifacts.verifying_key).unwrap();
    let proof = receipt.proof.decode().unwrap();
    assert!(verify(&vk, &proof, &receipt.public_signals).unwrap());

    let mut seen = Vec::new();
    while let Some(event) = progress.recv().await {
        seen.push(event);
    }
    assert_eq!(seen.first(), Some(&PipelineEvent::DerivingIdentity));
    assert!(seen.contains(&PipelineEvent::RegistryFetched { commitments: 3 }));
    assert_eq!(seen.last(), Some(&PipelineEvent::Accepted));
}

#[tokio::test]
async fn unregistered_identity_never_submits() {
    let harness = Harness::start().await;
    let (ca, cc) = other_members();
    harness.serve_registry(&[ca, cc]).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.server)
        .await;

    let err = harness
        .pipeline()
        .run("Hello world", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IdentityNotRegistered);
}

#[tokio::test]
async fn reused_nullifier_is_rejected_every_time() {
    let harness = Harness::start().await;
    let (ca, cc) = other_members();
    harness
        .serve_registry(&[ca, harness.identity.commitment(), cc])
        .await;
    Mock::given(method("POST"))
        .and(path("/api/greet"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Nullifier already used"))
        .expect(2)
        .mount(&harness.server)
        .await;

    let pipeline = harness.pipeline();
    for _ in 0..2 {
        let err = pipeline
            .run("Hello world", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SubmissionRejected);
        assert!(err.to_string().contains("Nullifier already used"));
    }
}

#[tokio::test]
async fn cancelled_run_touches_nothing() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(0)
        .mount(&harness.server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = harness.pipeline().run("Hello world", &cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn missing_artifacts_fail_before_submission() {
    let mut harness = Harness::start().await;
    let (ca, _) = other_members();
    harness
        .serve_registry(&[ca, harness.identity.commitment()])
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.server)
        .await;

    let empty = TempDir::new().unwrap();
    harness.artifacts = CircuitArtifacts::in_dir(empty.path());
    let err = harness
        .pipeline()
        .run("Hello world", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArtifactLoadError);
}
