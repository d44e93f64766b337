use anyhow::{bail, Context, Result};
use clap::Args;
use colored::*;
use dialoguer::Input;
use greeter_lib::crypto::field_to_decimal;
use greeter_lib::Groth16Prover;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{header, idle_spinner, open_wallet};
use crate::config::{CircuitArgs, EndpointArgs, GreeterConfig, WalletArgs};
use crate::pipeline::{Pipeline, PipelineEvent};
use crate::submission::SubmissionClient;

/// Prove membership and send an anonymous greeting
#[derive(Args, Debug)]
pub struct GreetCommand {
    /// Greeting to send (will prompt if not provided)
    pub message: Option<String>,

    /// Write the receipt (public signals and encoded proof) to this file
    #[arg(long, short = 'o', default_value = "receipt.json")]
    pub out: PathBuf,

    #[command(flatten)]
    pub wallet: WalletArgs,

    #[command(flatten)]
    pub circuit: CircuitArgs,

    #[command(flatten)]
    pub endpoints: EndpointArgs,
}

fn describe(event: &PipelineEvent) -> String {
    match event {
        PipelineEvent::DerivingIdentity => "Waiting for the identity signature...".into(),
        PipelineEvent::FetchingRegistry => "Fetching identity commitments...".into(),
        PipelineEvent::RegistryFetched { commitments } => {
            format!("Fetched {commitments} identity commitments")
        }
        PipelineEvent::BuildingMerkleProof => "Building the membership proof...".into(),
        PipelineEvent::ComposingWitness => "Composing the circuit witness...".into(),
        PipelineEvent::GeneratingProof => {
            "Generating zero-knowledge proof (this may take a while)...".into()
        }
        PipelineEvent::ProofGenerated => "Proof generated".into(),
        PipelineEvent::Submitting => "Submitting the greeting...".into(),
        PipelineEvent::Accepted => "Greeting accepted".into(),
        PipelineEvent::Failed(kind) => format!("Stopped: {kind:?}"),
    }
}

impl GreetCommand {
    pub async fn execute(&self) -> Result<()> {
        header("👋 Greeter - Anonymous Greeting");

        let message = match &self.message {
            Some(message) => message.clone(),
            None => Input::new()
                .with_prompt(format!("{} Your greeting", "💬".bright_green()))
                .interact_text()?,
        };
        if message.trim().is_empty() {
            bail!("greeting must not be empty");
        }

        let config = GreeterConfig::from_args(&self.circuit, &self.endpoints)?;
        let pb = idle_spinner();
        let wallet = open_wallet(&self.wallet, Some(&pb))?;
        let submission = SubmissionClient::new(config.verifier_url.clone(), config.timeout)?;

        println!("{} {}", "Verifier:".bright_white(), config.verifier_url.bright_cyan());
        println!("{} {}", "Topic:".bright_white(), self.circuit.topic.bright_cyan());
        println!();

        let (events, mut progress) = mpsc::unbounded_channel();
        let pipeline = Pipeline::new(
            wallet,
            config.registry()?,
            Arc::new(Groth16Prover),
            submission,
            config.circuit.clone(),
        )
        .with_events(events);

        pb.set_message("Starting...");
        pb.enable_steady_tick(Duration::from_millis(100));
        let printer = {
            let pb = pb.clone();
            tokio::spawn(async move {
                while let Some(event) = progress.recv().await {
                    pb.set_message(describe(&event));
                }
            })
        };

        let cancel = CancellationToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted, abandoning run");
                    cancel.cancel();
                }
            })
        };

        let result = pipeline.run(&message, &cancel).await;
        interrupt.abort();
        drop(pipeline);
        let _ = printer.await;

        let receipt = match result {
            Ok(receipt) => {
                pb.finish_with_message("✅ Greeting accepted");
                receipt
            }
            Err(e) => {
                pb.finish_with_message("❌ Greeting failed");
                return Err(e.into());
            }
        };

        let json = serde_json::to_vec_pretty(&receipt)?;
        std::fs::write(&self.out, json)
            .with_context(|| format!("failed to write {}", self.out.display()))?;

        println!();
        println!(
            "{} {}",
            "Nullifier hash:".bright_white(),
            field_to_decimal(&receipt.public_signals.nullifier_hash).bright_yellow()
        );
        println!("{} {}", "Verifier said:".bright_white(), receipt.response);
        println!(
            "{} {}",
            "💾".bright_blue(),
            format!("Receipt saved to '{}'", self.out.display()).bright_blue()
        );
        Ok(())
    }
}
