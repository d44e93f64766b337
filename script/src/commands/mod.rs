pub mod greet;
pub mod identity;
pub mod setup;
pub mod verify;

pub use greet::GreetCommand;
pub use identity::IdentityCommand;
pub use setup::SetupCommand;
pub use verify::VerifyCommand;

use anyhow::Result;
use colored::*;
use console::Term;
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

use crate::config::WalletArgs;
use crate::wallet::{
    AutoApprove, Consent, ConsentGate, LocalWallet, SuspendProgress, TerminalConsent,
    WalletProvider,
};

/// Build the wallet the command signs with, prompting for the key if none is configured.
///
/// With `progress`, the consent prompt pauses that bar while it waits for an answer.
pub(crate) fn open_wallet(
    args: &WalletArgs,
    progress: Option<&ProgressBar>,
) -> Result<Arc<dyn WalletProvider>> {
    let key = match &args.private_key {
        Some(key) => key.clone(),
        None if !Term::stdout().is_term() => String::new(),
        None => {
            println!(
                "{} {}",
                "🔐".bright_blue(),
                "Private key required to sign the identity challenge".bright_cyan()
            );
            Password::new()
                .with_prompt("Enter your private key")
                .allow_empty_password(true)
                .interact()?
        }
    };

    let wallet = LocalWallet::from_optional_key(Some(&key))?;
    println!(
        "{} {}",
        "Account:".bright_white(),
        wallet.address().to_string().bright_cyan()
    );

    let consent: Arc<dyn Consent> = match (args.yes, progress) {
        (true, _) => Arc::new(AutoApprove),
        (false, Some(pb)) => Arc::new(SuspendProgress::new(TerminalConsent, pb.clone())),
        (false, None) => Arc::new(TerminalConsent),
    };
    Ok(Arc::new(ConsentGate::new(wallet, consent)))
}

pub(crate) fn header(title: &str) {
    println!("{}", title.bright_magenta().bold());
    println!("{}", "═".repeat(50).bright_black());
    println!();
}

pub(crate) fn spinner(message: &str) -> ProgressBar {
    let pb = idle_spinner();
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// A styled spinner that stays off screen until it gets a message.
pub(crate) fn idle_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.magenta} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb
}
