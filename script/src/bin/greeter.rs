//! Greeter CLI - anonymous greetings from registered members
//!
//! Usage:
//! ```shell
//! # Generate circuit artifacts
//! cargo run --bin greeter -- setup --depth 20
//!
//! # Print the commitment to register
//! cargo run --bin greeter -- identity --private-key $GREETER_PRIVATE_KEY
//!
//! # Prove membership and send a greeting
//! cargo run --bin greeter -- greet "Hello world" --registry-url $GREETER_REGISTRY_URL
//! ```

use clap::{Parser, Subcommand};
use colored::*;
use greeter_lib::{Error, ErrorKind};
use std::process;
use tracing_subscriber::EnvFilter;

use greeter_script::commands::{GreetCommand, IdentityCommand, SetupCommand, VerifyCommand};

#[derive(Parser)]
#[command(
    name = "greeter",
    about = "👋 Greeter - prove you belong, stay anonymous",
    long_about = "Greeter sends a message on behalf of a registered group member without revealing which member sent it.\n\nFeatures:\n• Identity derived from a wallet signature\n• Groth16 membership proofs over a Poseidon Merkle tree\n• One greeting per identity and topic",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 🛠️ Generate circuit artifacts
    Setup(SetupCommand),
    /// 🪪 Print your identity commitment
    Identity(IdentityCommand),
    /// 👋 Send an anonymous greeting
    Greet(GreetCommand),
    /// 🔍 Verify a saved receipt
    Verify(VerifyCommand),
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn tips(error: &anyhow::Error) -> &'static [&'static str] {
    match error.downcast_ref::<Error>().map(Error::kind) {
        Some(ErrorKind::ProviderUnavailable) => &["Check your private key format (64 hex digits)"],
        Some(ErrorKind::IdentityNotRegistered) => {
            &["Run `greeter identity` and add the commitment to the registry"]
        }
        Some(ErrorKind::ArtifactLoadError) => &["Run `greeter setup` with the same --depth"],
        Some(ErrorKind::SubmissionRejected) => {
            &["Each identity can greet once per topic; try another --topic"]
        }
        Some(ErrorKind::NetworkError) | Some(ErrorKind::RegistryFetchFailed) => {
            &["Ensure the registry and verifier URLs are reachable"]
        }
        _ => &["Run with --verbose for detailed logs"],
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let result = match cli.command {
        Commands::Setup(cmd) => cmd.execute().await,
        Commands::Identity(cmd) => cmd.execute().await,
        Commands::Greet(cmd) => cmd.execute().await,
        Commands::Verify(cmd) => cmd.execute().await,
    };

    match result {
        Ok(()) => {
            println!();
            println!(
                "{} {}",
                "✨".bright_green(),
                "Operation completed successfully!".bright_green().bold()
            );
        }
        Err(e) => {
            println!();
            eprintln!("{} {}", "💥".bright_red(), "Operation failed!".bright_red().bold());
            eprintln!("   {}", format!("{e:#}").bright_red());
            println!();
            eprintln!("{} {}", "💡".bright_blue(), "Tips:".bright_blue().bold());
            for tip in tips(&e) {
                eprintln!("   • {tip}");
            }
            process::exit(1);
        }
    }
}
