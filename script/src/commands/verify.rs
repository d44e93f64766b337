use anyhow::{bail, Context, Result};
use clap::Args;
use colored::*;
use greeter_lib::{load_verifying_key, signal_hash, verify, CircuitArtifacts};
use std::path::PathBuf;

use super::header;
use crate::pipeline::Receipt;

/// Check a saved receipt against the local verifying key
#[derive(Args, Debug)]
pub struct VerifyCommand {
    /// Receipt written by `greet`
    #[arg(default_value = "receipt.json")]
    pub receipt: PathBuf,

    /// Directory holding verifying.key
    #[arg(long, env = "GREETER_ARTIFACTS", default_value = "artifacts")]
    pub artifacts: PathBuf,
}

impl VerifyCommand {
    pub async fn execute(&self) -> Result<()> {
        header("🔍 Greeter - Verify Receipt");

        let raw = std::fs::read(&self.receipt)
            .with_context(|| format!("failed to read {}", self.receipt.display()))?;
        let receipt: Receipt = serde_json::from_slice(&raw)
            .with_context(|| format!("{} is not a greeting receipt", self.receipt.display()))?;

        if signal_hash(&receipt.message) != receipt.public_signals.signal_hash {
            bail!("signal hash does not match the greeting {:?}", receipt.message);
        }

        let proof = receipt.proof.decode()?;
        let verifying_key = load_verifying_key(&CircuitArtifacts::in_dir(&self.artifacts).verifying_key)?;
        if !verify(&verifying_key, &proof, &receipt.public_signals)? {
            bail!("proof does not verify");
        }

        println!("{} {}", "Greeting:".bright_white(), receipt.message.bright_cyan());
        println!(
            "{} {}",
            "✅".bright_green(),
            "Proof verifies against the local verifying key".bright_green().bold()
        );
        Ok(())
    }
}
