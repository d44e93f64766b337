//! Greeter host library
//!
//! Everything around the proving core that talks to the outside world:
//!
//! - Wallet capability and identity derivation
//! - Commitment registry accessors (HTTP and file)
//! - Submission to the remote verifier
//! - The cancellable pipeline tying the steps together
//! - CLI configuration and commands

pub mod commands;
pub mod config;
pub mod pipeline;
pub mod registry;
pub mod submission;
pub mod wallet;

pub use pipeline::{CircuitSettings, Pipeline, PipelineEvent, Receipt};
pub use registry::{CommitmentRegistry, FileRegistry, HttpRegistry};
pub use submission::{Outcome, SubmissionClient};
pub use wallet::{derive_identity, ConsentGate, LocalWallet, WalletProvider};
