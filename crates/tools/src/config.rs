//! Contract toolchain configuration
//!
//! This module builds the typed record handed to the external compile/deploy
//! tool: the Solidity compiler version and the networks it can target.
//! Configuration is resolved in this order:
//!
//! 1. Process environment (unless disabled)
//! 2. `.env` file, for variables the process does not already set
//! 3. Built-in networks, plus any declared in `networks.toml`
//!
//! A missing signing key is not an error at load time: the network is still
//! usable for compile-only work. Call [`Config::validate_for_deploy`] (or
//! load with [`LoadOptions::require_credentials`]) before signing anything.
//!
//! # Examples
//!
//! ```rust,no_run
//! use naturedefender_tools::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! println!("Compiler: {}", config.compiler_version());
//! for (name, network) in config.networks() {
//!     println!("{}: {}", name, network.url);
//! }
//! # Ok(())
//! # }
//! ```

use crate::credential::PrivateKey;
use crate::env::Environment;
use crate::project::ProjectFile;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Solidity compiler release used for every build
pub const COMPILER_VERSION: &str = "0.8.17";

/// Env file read before resolving credentials
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Project file declaring additional networks
pub const DEFAULT_PROJECT_FILE: &str = "networks.toml";

/// Variable holding the deployer key for the built-in network
pub const PRIVATE_KEY_VAR: &str = "PRIVATE_KEY";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read env file {}: {reason}", .path.display())]
    EnvFile { path: PathBuf, reason: String },

    #[error("Invalid RPC URL for network '{network}': {reason}")]
    InvalidUrl { network: String, reason: String },

    #[error("Missing credential for network '{network}': {var} is not set")]
    MissingCredential { network: String, var: String },

    #[error("Network '{0}' has no accounts configured")]
    NoAccounts(String),

    #[error("Malformed private key: {0}")]
    MalformedCredential(String),

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Network '{0}' is built in and cannot be redefined")]
    DuplicateNetwork(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Networks shipped with the toolchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// LightLink Pegasus testnet
    LightlinkTestnet,
}

impl Network {
    pub const ALL: [Network; 1] = [Network::LightlinkTestnet];

    /// Get network name as used in the configuration record
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::LightlinkTestnet => "lightlink-testnet",
        }
    }

    /// Look up a built-in network by name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.as_str() == name)
    }

    /// Get the RPC URL for this network
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::LightlinkTestnet => "https://replicator.pegasus.lightlink.io/rpc/v1",
        }
    }

    /// Variables the signing keys are read from, in account order
    pub fn accounts_env(&self) -> &'static [&'static str] {
        match self {
            Network::LightlinkTestnet => &[PRIVATE_KEY_VAR],
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compiler section of the record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompilerSettings {
    pub version: String,
}

/// Endpoint and signing accounts for one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkDescriptor {
    /// RPC endpoint
    pub url: String,
    /// Keys that resolved to a non-empty value
    pub accounts: Vec<PrivateKey>,
    /// Fixed gas price in wei
    #[serde(rename = "gasPrice", skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u64>,
    /// Account variables that were unset or empty
    #[serde(skip)]
    pub missing_accounts: Vec<String>,
}

impl NetworkDescriptor {
    /// Resolve account variables against the environment
    fn resolve(
        name: &str,
        url: String,
        accounts_env: &[String],
        gas_price: Option<u64>,
        env: &Environment,
    ) -> Self {
        let mut accounts = Vec::new();
        let mut missing_accounts = Vec::new();

        for var in accounts_env {
            match env.get(var).filter(|v| !v.is_empty()) {
                Some(value) => {
                    let source = env.source(var).map_or("unknown", |s| s.as_str());
                    debug!(network = name, var = %var, source, "resolved account key");
                    accounts.push(PrivateKey::new(value));
                }
                None => {
                    warn!(
                        network = name,
                        var = %var,
                        "account key not set; network can only be used for compiling"
                    );
                    missing_accounts.push(var.clone());
                }
            }
        }

        Self {
            url,
            accounts,
            gas_price,
            missing_accounts,
        }
    }

    /// Whether every declared account resolved
    pub fn has_credentials(&self) -> bool {
        !self.accounts.is_empty() && self.missing_accounts.is_empty()
    }
}

/// Options for [`Config::load_with`]
#[derive(Debug, Clone)]
pub struct LoadOptions {
    env_file: Option<PathBuf>,
    project_file: Option<PathBuf>,
    inherit_process_env: bool,
    require_credentials: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            env_file: Some(PathBuf::from(DEFAULT_ENV_FILE)),
            project_file: Some(PathBuf::from(DEFAULT_PROJECT_FILE)),
            inherit_process_env: true,
            require_credentials: false,
        }
    }
}

impl LoadOptions {
    /// Read the env file from `path`
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Skip the env file entirely
    pub fn without_env_file(mut self) -> Self {
        self.env_file = None;
        self
    }

    /// Read extra networks from `path`
    pub fn with_project_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_file = Some(path.into());
        self
    }

    /// Only use built-in networks
    pub fn without_project_file(mut self) -> Self {
        self.project_file = None;
        self
    }

    /// Whether variables from the process environment are visible
    ///
    /// Without it, an env file using `$VAR` substitution is rejected, since
    /// dotenvy would resolve it from the process environment.
    pub fn inherit_process_env(mut self, inherit: bool) -> Self {
        self.inherit_process_env = inherit;
        self
    }

    /// Fail the load if any network is missing an account key
    pub fn require_credentials(mut self, require: bool) -> Self {
        self.require_credentials = require;
        self
    }
}

/// Resolved toolchain configuration
///
/// Serializes to the record the external tool consumes:
/// `{ compiler: { version }, networks: { <name>: { url, accounts } } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    compiler: CompilerSettings,
    networks: BTreeMap<String, NetworkDescriptor>,
}

impl Config {
    /// Load configuration from the process environment, `.env` and `networks.toml`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The env file or project file exists but cannot be parsed
    /// - The project file redefines a built-in network
    /// - A network URL is invalid
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(&LoadOptions::default())
    }

    /// Load configuration with explicit options
    pub fn load_with(options: &LoadOptions) -> Result<Self, ConfigError> {
        let mut env = if options.inherit_process_env {
            Environment::from_process()
        } else {
            Environment::empty()
        };

        if let Some(path) = &options.env_file {
            env.merge_dotenv(path)?;
        }

        let project = match &options.project_file {
            Some(path) => ProjectFile::load(path)?,
            None => None,
        };

        let config = Self::build(&env, project.as_ref())?;

        if options.require_credentials {
            for name in config.networks.keys() {
                config.require_accounts(name)?;
            }
        }

        info!(
            compiler = %config.compiler.version,
            networks = config.networks.len(),
            "configuration loaded"
        );

        Ok(config)
    }

    /// Build configuration from an explicit environment, built-in networks only
    pub fn from_environment(env: &Environment) -> Result<Self, ConfigError> {
        Self::build(env, None)
    }

    /// Build configuration from an explicit environment and project file
    pub fn build(env: &Environment, project: Option<&ProjectFile>) -> Result<Self, ConfigError> {
        let mut networks = BTreeMap::new();

        for network in Network::ALL {
            let accounts_env: Vec<String> =
                network.accounts_env().iter().map(|v| v.to_string()).collect();
            let descriptor = NetworkDescriptor::resolve(
                network.as_str(),
                network.default_rpc_url().to_string(),
                &accounts_env,
                None,
                env,
            );
            networks.insert(network.as_str().to_string(), descriptor);
        }

        if let Some(project) = project {
            for (name, entry) in &project.network {
                if networks.contains_key(name) {
                    return Err(ConfigError::DuplicateNetwork(name.clone()));
                }

                let descriptor = NetworkDescriptor::resolve(
                    name,
                    entry.url.clone(),
                    &entry.accounts_env,
                    entry.gas_price,
                    env,
                );
                networks.insert(name.clone(), descriptor);
            }
        }

        let config = Config {
            compiler: CompilerSettings {
                version: COMPILER_VERSION.to_string(),
            },
            networks,
        };

        config.validate()?;
        Ok(config)
    }

    /// Compiler version string
    pub fn compiler_version(&self) -> &str {
        &self.compiler.version
    }

    /// Compiler section of the record
    pub fn compiler(&self) -> &CompilerSettings {
        &self.compiler
    }

    /// All networks, ordered by name
    pub fn networks(&self) -> &BTreeMap<String, NetworkDescriptor> {
        &self.networks
    }

    /// Get a network by name
    pub fn network(&self, name: &str) -> Result<&NetworkDescriptor, ConfigError> {
        self.networks
            .get(name)
            .ok_or_else(|| ConfigError::UnknownNetwork(name.to_string()))
    }

    /// Get the accounts of a network, failing if any key is missing
    pub fn require_accounts(&self, name: &str) -> Result<&[PrivateKey], ConfigError> {
        let network = self.network(name)?;

        if let Some(var) = network.missing_accounts.first() {
            return Err(ConfigError::MissingCredential {
                network: name.to_string(),
                var: var.clone(),
            });
        }

        if network.accounts.is_empty() {
            return Err(ConfigError::NoAccounts(name.to_string()));
        }

        Ok(&network.accounts)
    }

    /// Validate compiler version and network endpoints
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_compiler_version(&self.compiler.version)?;

        for (name, network) in &self.networks {
            validate_rpc_url(name, &network.url)?;
        }

        Ok(())
    }

    /// Validate that a network can sign transactions
    pub fn validate_for_deploy(&self, name: &str) -> Result<(), ConfigError> {
        let accounts = self.require_accounts(name)?;

        for (index, key) in accounts.iter().enumerate() {
            key.check_format().map_err(|err| {
                ConfigError::ValidationError(format!(
                    "network '{}' account #{}: {}",
                    name, index, err
                ))
            })?;
        }

        Ok(())
    }

    /// Get the hand-off record as JSON, keys included
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The hand-off record with every key masked
    pub fn redacted(&self) -> serde_json::Value {
        let networks: serde_json::Map<String, serde_json::Value> = self
            .networks
            .iter()
            .map(|(name, network)| {
                let accounts: Vec<String> = network.accounts.iter().map(PrivateKey::masked).collect();
                let mut entry = serde_json::json!({
                    "url": network.url,
                    "accounts": accounts,
                });
                if let Some(gas_price) = network.gas_price {
                    entry["gasPrice"] = gas_price.into();
                }
                (name.clone(), entry)
            })
            .collect();

        serde_json::json!({
            "compiler": { "version": self.compiler.version },
            "networks": networks,
        })
    }

    /// Get the masked record as JSON
    pub fn redacted_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(&self.redacted())?)
    }

    /// Print the resolved configuration with keys masked
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════════╗");
        println!("║         TOOLCHAIN CONFIGURATION RESOLVED                       ║");
        println!("╚════════════════════════════════════════════════════════════════╝");
        println!("  Compiler:            solc {}", self.compiler.version);

        for (name, network) in &self.networks {
            self.print_network(name, network);
        }

        println!("╚════════════════════════════════════════════════════════════════╝");
    }

    /// Print one network block of the summary
    pub fn print_network(&self, name: &str, network: &NetworkDescriptor) {
        let label = if Network::from_name(name).is_some() {
            format!("{} (built-in)", name)
        } else {
            name.to_string()
        };

        println!();
        println!("  Network:             {}", label);
        println!("  RPC URL:             {}", network.url);

        for key in &network.accounts {
            println!("  Account:             {}", key);
        }

        for var in &network.missing_accounts {
            println!("  Account:             (not configured: {})", var);
        }

        if network.accounts.is_empty() && network.missing_accounts.is_empty() {
            println!("  Accounts:            (none)");
        }

        if let Some(gas_price) = network.gas_price {
            println!("  Gas Price:           {} wei", gas_price);
        }
    }
}

/// Check that the compiler version is a plain `major.minor.patch` release
fn validate_compiler_version(version: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = version.split('.').collect();

    let well_formed = parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));

    if !well_formed {
        return Err(ConfigError::ValidationError(format!(
            "compiler version must be major.minor.patch: '{}'",
            version
        )));
    }

    Ok(())
}

/// Check that an RPC URL is an absolute http(s) URL with a host
fn validate_rpc_url(network: &str, rpc_url: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        network: network.to_string(),
        reason,
    };

    if rpc_url.is_empty() {
        return Err(invalid("URL is empty".to_string()));
    }

    let parsed = Url::parse(rpc_url).map_err(|err| invalid(err.to_string()))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(invalid(format!(
            "RPC URL must start with http:// or https://: {}",
            rpc_url
        )));
    }

    if parsed.host_str().is_none() {
        return Err(invalid(format!("RPC URL has no host: {}", rpc_url)));
    }

    Ok(())
}
