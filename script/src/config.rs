//! Command-line and environment configuration.
//!
//! Every option can come from a flag or from the environment (a `.env` file is loaded
//! at startup). [`GreeterConfig`] is the validated form the pipeline is built from.

use anyhow::{bail, Context, Result};
use ark_bn254::Fr;
use clap::Args;
use greeter_lib::crypto::parse_field;
use greeter_lib::{CircuitArtifacts, ExternalNullifier, DEFAULT_TOPIC, DEFAULT_TREE_DEPTH};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::pipeline::CircuitSettings;
use crate::registry::{CommitmentRegistry, FileRegistry, HttpRegistry};

/// Wallet options.
#[derive(Args, Debug, Clone)]
pub struct WalletArgs {
    /// Private key that signs the identity challenge
    #[arg(long, short = 'k', env = "GREETER_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Sign without asking for confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Circuit options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct CircuitArgs {
    /// Directory holding circuit.json, proving.key and verifying.key
    #[arg(long, env = "GREETER_ARTIFACTS", default_value = "artifacts")]
    pub artifacts: PathBuf,

    /// Depth of the membership tree
    #[arg(long, env = "GREETER_TREE_DEPTH", default_value_t = DEFAULT_TREE_DEPTH)]
    pub depth: usize,

    /// Value of empty leaves (decimal or 0x hex)
    #[arg(long, env = "GREETER_ZERO_LEAF", default_value = "0")]
    pub zero_leaf: String,

    /// Topic the nullifier is scoped to
    #[arg(long, env = "GREETER_TOPIC", default_value = DEFAULT_TOPIC)]
    pub topic: String,
}

/// Remote endpoints.
#[derive(Args, Debug, Clone)]
pub struct EndpointArgs {
    /// URL serving the identity commitments as a JSON array
    #[arg(long, env = "GREETER_REGISTRY_URL", conflicts_with = "registry_file")]
    pub registry_url: Option<String>,

    /// Local JSON file with the identity commitments
    #[arg(long, env = "GREETER_REGISTRY_FILE")]
    pub registry_file: Option<PathBuf>,

    /// Verifier endpoint receiving the greeting
    #[arg(
        long,
        env = "GREETER_VERIFIER_URL",
        default_value = "http://localhost:3000/api/greet"
    )]
    pub verifier_url: String,

    /// HTTP timeout in seconds
    #[arg(long, env = "GREETER_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

/// Where commitments are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrySource {
    Http(String),
    File(PathBuf),
}

/// Validated settings of a greeting run.
#[derive(Debug, Clone)]
pub struct GreeterConfig {
    pub registry: RegistrySource,
    pub verifier_url: String,
    pub timeout: Duration,
    pub circuit: CircuitSettings,
}

impl CircuitArgs {
    pub fn settings(&self) -> Result<CircuitSettings> {
        if self.depth == 0 || self.depth > greeter_lib::merkle::MAX_TREE_DEPTH {
            bail!(
                "tree depth must be between 1 and {}",
                greeter_lib::merkle::MAX_TREE_DEPTH
            );
        }
        let zero_leaf: Fr = parse_field(&self.zero_leaf)
            .with_context(|| format!("invalid zero leaf {:?}", self.zero_leaf))?;

        Ok(CircuitSettings {
            depth: self.depth,
            zero_leaf,
            external_nullifier: ExternalNullifier::from_topic(&self.topic),
            artifacts: CircuitArtifacts::in_dir(&self.artifacts),
        })
    }
}

impl GreeterConfig {
    pub fn from_args(circuit: &CircuitArgs, endpoints: &EndpointArgs) -> Result<Self> {
        let registry = match (&endpoints.registry_url, &endpoints.registry_file) {
            (Some(url), None) => RegistrySource::Http(url.clone()),
            (None, Some(path)) => RegistrySource::File(path.clone()),
            (Some(_), Some(_)) => bail!("set either a registry URL or a registry file, not both"),
            (None, None) => {
                bail!("no registry configured (set GREETER_REGISTRY_URL or GREETER_REGISTRY_FILE)")
            }
        };
        if endpoints.timeout_secs == 0 {
            bail!("timeout must be at least one second");
        }

        Ok(Self {
            registry,
            verifier_url: endpoints.verifier_url.clone(),
            timeout: Duration::from_secs(endpoints.timeout_secs),
            circuit: circuit.settings()?,
        })
    }

    pub fn registry(&self) -> Result<Arc<dyn CommitmentRegistry>> {
        Ok(match &self.registry {
            RegistrySource::Http(url) => Arc::new(HttpRegistry::new(url.clone(), self.timeout)?),
            RegistrySource::File(path) => Arc::new(FileRegistry::new(path.clone())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        circuit: CircuitArgs,
        #[command(flatten)]
        endpoints: EndpointArgs,
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::try_parse_from(["greeter", "--registry-file", "ids.json"]).unwrap();
        let config = GreeterConfig::from_args(&cli.circuit, &cli.endpoints).unwrap();

        assert_eq!(config.circuit.depth, 20);
        assert_eq!(config.circuit.zero_leaf, Fr::from(0u64));
        assert_eq!(
            config.circuit.external_nullifier,
            ExternalNullifier::from_topic("greet-v1")
        );
        assert_eq!(config.registry, RegistrySource::File(PathBuf::from("ids.json")));
        assert_eq!(config.circuit.artifacts, CircuitArtifacts::in_dir("artifacts"));
    }

    #[test]
    fn test_registry_is_required() {
        let cli = TestCli::try_parse_from(["greeter"]).unwrap();
        assert!(GreeterConfig::from_args(&cli.circuit, &cli.endpoints).is_err());
    }

    #[test]
    fn test_invalid_circuit_settings() {
        let cli = TestCli::try_parse_from(["greeter", "--depth", "0"]).unwrap();
        assert!(cli.circuit.settings().is_err());

        let cli = TestCli::try_parse_from(["greeter", "--zero-leaf", "zero"]).unwrap();
        assert!(cli.circuit.settings().is_err());
    }
}
