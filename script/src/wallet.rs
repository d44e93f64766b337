//! Wallet capability and identity derivation.
//!
//! The pipeline only needs two things from a wallet: the accounts it controls and a
//! signature over the identity challenge. [`LocalWallet`] signs with a private key held
//! in memory; [`ConsentGate`] wraps any wallet and asks the user before each signature.

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use dialoguer::Confirm;
use greeter_lib::{Error, Identity, Result, WalletSignature, IDENTITY_CHALLENGE};
use indicatif::ProgressBar;
use std::sync::Arc;
use tracing::{debug, info};

/// Signing capability the pipeline talks to.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Accounts this wallet can sign for.
    async fn request_accounts(&self) -> Result<Vec<Address>>;

    /// Personal-sign `message` with the first account.
    async fn sign_message(&self, message: &str) -> Result<WalletSignature>;
}

/// EIP-191 signer backed by a raw private key.
#[derive(Debug, Clone)]
pub struct LocalWallet {
    signer: PrivateKeySigner,
}

impl LocalWallet {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    /// Parse a hex private key, with or without the `0x` prefix.
    pub fn from_private_key(key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = key
            .trim()
            .parse()
            .map_err(|_| Error::ProviderUnavailable("invalid private key".into()))?;
        Ok(Self::new(signer))
    }

    /// Wallet from an optional key, as read from configuration.
    pub fn from_optional_key(key: Option<&str>) -> Result<Self> {
        match key {
            Some(key) if !key.trim().is_empty() => Self::from_private_key(key),
            _ => Err(Error::ProviderUnavailable(
                "no private key configured (set GREETER_PRIVATE_KEY)".into(),
            )),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

#[async_trait]
impl WalletProvider for LocalWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        Ok(vec![self.signer.address()])
    }

    async fn sign_message(&self, message: &str) -> Result<WalletSignature> {
        let signature = self
            .signer
            .sign_message(message.as_bytes())
            .await
            .map_err(|e| Error::ProviderUnavailable(e.to_string()))?;
        Ok(WalletSignature::new(signature.as_bytes().to_vec()))
    }
}

/// Decides whether a signature request may proceed.
pub trait Consent: Send + Sync {
    fn approve(&self, account: Address, message: &str) -> Result<bool>;
}

/// Interactive yes/no prompt on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConsent;

impl Consent for TerminalConsent {
    fn approve(&self, account: Address, message: &str) -> Result<bool> {
        Confirm::new()
            .with_prompt(format!("Sign \"{message}\" with {account}?"))
            .default(false)
            .interact()
            .map_err(|e| Error::ProviderUnavailable(format!("consent prompt failed: {e}")))
    }
}

/// Approves every request. Used with `--yes`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

impl Consent for AutoApprove {
    fn approve(&self, _account: Address, _message: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Hides a progress bar for as long as the inner prompt is on screen, so its ticks
/// do not redraw over the question.
pub struct SuspendProgress<C> {
    inner: C,
    progress: ProgressBar,
}

impl<C: Consent> SuspendProgress<C> {
    pub fn new(inner: C, progress: ProgressBar) -> Self {
        Self { inner, progress }
    }
}

impl<C: Consent> Consent for SuspendProgress<C> {
    fn approve(&self, account: Address, message: &str) -> Result<bool> {
        self.progress.suspend(|| self.inner.approve(account, message))
    }
}

/// Asks for consent before delegating a signature to the inner wallet.
pub struct ConsentGate<W> {
    inner: W,
    consent: Arc<dyn Consent>,
}

impl<W: WalletProvider> ConsentGate<W> {
    pub fn new(inner: W, consent: Arc<dyn Consent>) -> Self {
        Self { inner, consent }
    }
}

#[async_trait]
impl<W: WalletProvider> WalletProvider for ConsentGate<W> {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        self.inner.request_accounts().await
    }

    async fn sign_message(&self, message: &str) -> Result<WalletSignature> {
        let account = self
            .inner
            .request_accounts()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::ProviderUnavailable("wallet exposes no accounts".into()))?;

        let consent = Arc::clone(&self.consent);
        let prompt = message.to_string();
        let approved = tokio::task::spawn_blocking(move || consent.approve(account, &prompt))
            .await
            .map_err(|e| Error::ProviderUnavailable(format!("consent prompt aborted: {e}")))??;

        if !approved {
            info!(%account, "user declined to sign the identity challenge");
            return Err(Error::UserRejected);
        }
        self.inner.sign_message(message).await
    }
}

/// Derive the caller's identity by signing the fixed challenge.
///
/// # Errors
/// * [`Error::ProviderUnavailable`] if the wallet has no accounts or cannot sign
/// * [`Error::UserRejected`] if the user declines
pub async fn derive_identity(wallet: &dyn WalletProvider) -> Result<Identity> {
    let accounts = wallet.request_accounts().await?;
    let account = accounts
        .first()
        .ok_or_else(|| Error::ProviderUnavailable("wallet exposes no accounts".into()))?;
    debug!(%account, "requesting identity signature");

    let signature = wallet.sign_message(IDENTITY_CHALLENGE).await?;
    let identity = Identity::from_signature(&signature)?;
    info!(%identity, "derived identity");
    Ok(identity)
}
