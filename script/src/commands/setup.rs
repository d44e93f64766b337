use anyhow::Result;
use clap::Args;
use colored::*;
use greeter_lib::prover;

use super::{header, spinner};
use crate::config::CircuitArgs;

/// Generate the circuit manifest and Groth16 keys
#[derive(Args, Debug)]
pub struct SetupCommand {
    #[command(flatten)]
    pub circuit: CircuitArgs,
}

impl SetupCommand {
    pub async fn execute(&self) -> Result<()> {
        header("🛠️  Greeter - Circuit Setup");

        let settings = self.circuit.settings()?;
        let dir = self.circuit.artifacts.clone();
        let depth = settings.depth;

        let pb = spinner(&format!("Generating keys for a depth-{depth} tree..."));
        let artifacts =
            tokio::task::spawn_blocking(move || prover::setup(&dir, depth)).await??;
        pb.finish_with_message("✅ Keys generated");

        println!();
        println!("{} {}", "Manifest:".bright_white(), artifacts.circuit.display());
        println!("{} {}", "Proving key:".bright_white(), artifacts.proving_key.display());
        println!(
            "{} {}",
            "Verifying key:".bright_white(),
            artifacts.verifying_key.display()
        );
        Ok(())
    }
}
