//! NatureDefender Tools Library
//!
//! Provides the compiler and network configuration handed to the contract
//! build/deploy toolchain.

pub mod config;
pub mod credential;
pub mod env;
pub mod project;

pub use config::{Config, ConfigError, LoadOptions, Network, NetworkDescriptor};
pub use credential::PrivateKey;
pub use env::{Environment, VarSource};
