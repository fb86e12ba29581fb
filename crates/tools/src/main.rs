use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use naturedefender_tools::config::{
    Config, LoadOptions, DEFAULT_ENV_FILE, DEFAULT_PROJECT_FILE,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "naturedefender")]
#[command(about = "NatureDefender toolchain configuration for contract builds and deployment")]
#[command(version)]
struct Cli {
    /// Env file holding account keys
    #[arg(long, global = true, default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,

    /// Project file declaring extra networks
    #[arg(long, global = true, default_value = DEFAULT_PROJECT_FILE)]
    project_file: PathBuf,

    /// Ignore variables from the process environment
    #[arg(long, global = true)]
    no_process_env: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved configuration with keys masked
    Show {
        /// Only show this network
        #[arg(short, long)]
        network: Option<String>,
        /// Output JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Check configuration
    Validate {
        /// Also check that this network can sign transactions
        #[arg(long, value_name = "NETWORK")]
        deploy: Option<String>,
    },
    /// Print the configuration record consumed by the build tool
    Export {
        /// Include raw account keys instead of masked ones
        #[arg(long)]
        reveal_accounts: bool,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("naturedefender_tools=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = LoadOptions::default()
        .with_env_file(cli.env_file)
        .with_project_file(cli.project_file)
        .inherit_process_env(!cli.no_process_env);

    let config = Config::load_with(&options).context("Failed to load configuration")?;

    match cli.command {
        Commands::Show { network, json } => show(&config, network.as_deref(), json),
        Commands::Validate { deploy } => validate(&config, deploy.as_deref()),
        Commands::Export { reveal_accounts } => {
            let output = if reveal_accounts {
                config.to_json()?
            } else {
                config.redacted_json()?
            };
            println!("{}", output);
            Ok(())
        }
    }
}

fn show(config: &Config, network: Option<&str>, json: bool) -> Result<()> {
    match (network, json) {
        (Some(name), true) => {
            config.network(name)?;
            let redacted = config.redacted();
            println!("{}", serde_json::to_string_pretty(&redacted["networks"][name])?);
        }
        (Some(name), false) => {
            let descriptor = config.network(name)?;
            println!("  Compiler:            solc {}", config.compiler_version());
            config.print_network(name, descriptor);
        }
        (None, true) => println!("{}", config.redacted_json()?),
        (None, false) => config.print_summary(),
    }

    Ok(())
}

fn validate(config: &Config, deploy: Option<&str>) -> Result<()> {
    println!("Validating configuration...");
    config.validate()?;

    for (name, network) in config.networks() {
        for var in &network.missing_accounts {
            println!("  ! {}: {} is not set (compile only)", name, var);
        }
    }

    if let Some(name) = deploy {
        config
            .validate_for_deploy(name)
            .with_context(|| format!("Network '{}' is not ready for deployment", name))?;
        println!("  ✓ {} is ready for deployment", name);
    }

    println!("Configuration is valid");
    Ok(())
}
