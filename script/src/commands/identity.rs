use anyhow::Result;
use clap::Args;
use colored::*;
use greeter_lib::crypto::field_to_decimal;

use super::{header, open_wallet};
use crate::config::WalletArgs;
use crate::wallet::derive_identity;

/// Print the identity commitment to register
#[derive(Args, Debug)]
pub struct IdentityCommand {
    #[command(flatten)]
    pub wallet: WalletArgs,
}

impl IdentityCommand {
    pub async fn execute(&self) -> Result<()> {
        header("🪪 Greeter - Identity");

        let wallet = open_wallet(&self.wallet, None)?;
        let identity = derive_identity(wallet.as_ref()).await?;

        println!();
        println!("{}", "Identity commitment".bright_green().bold());
        println!("{}", field_to_decimal(&identity.commitment()).bright_cyan());
        println!();
        println!(
            "{} {}",
            "💡".bright_blue(),
            "Add this value to the registry before greeting.".bright_blue()
        );
        Ok(())
    }
}
