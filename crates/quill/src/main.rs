//! Quill — extension-aware DNSSEC-validating local name resolver.
//!
//! Serves DNS over UDP, answering conventional names through the configured
//! stub upstreams and HIP-5 extension names through registered handlers.
//! Extension backends register themselves through
//! [`quill_resolver::RegistryBuilder`]; the stock binary ships with an empty
//! registry and acts as a validating stub front end.

mod logging;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use logging::{init_tracing, LogConfig, LogFormat};
use quill_config::Config;
use quill_resolver::{ForwardStub, Hip5ResolverBuilder, RegistryBuilder};
use server::UdpServer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};

/// Quill - local name resolution with DNSSEC and HIP-5 extensions
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the resolver (default)
    Run,

    /// Validate the configuration file
    Validate,

    /// Show version information
    Version,
}

/// Finds the configuration file in standard locations.
fn find_config_file(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path);
    }

    let search_paths = [
        PathBuf::from("./quill.toml"),
        PathBuf::from("/etc/quill/quill.toml"),
    ];

    search_paths.into_iter().find(|p| p.exists())
}

fn parse_log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn init_logging(config: &Config, cli_level: Option<&str>, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if let Some(level) = cli_level {
        parse_log_level(level)
    } else {
        parse_log_level(&config.logging.level)
    };

    let format = match config.logging.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    };

    init_tracing(&LogConfig { level, format });
}

fn print_banner(config: &Config, quiet: bool) {
    if quiet {
        return;
    }

    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!(
        "  {} {}",
        style("Quill").cyan().bold(),
        style(format!("v{version}")).dim()
    );
    println!(
        "  {}",
        style("DNSSEC validation with HIP-5 naming extensions").dim()
    );
    println!();
    println!("  {} {}", style("Server:").green(), config.server.name);
    println!(
        "  {} {}",
        style("Trusted root:").green(),
        config.resolver.root_addr
    );
    println!(
        "  {} {}",
        style("Stub upstreams:").green(),
        config
            .resolver
            .stub_upstreams
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!();
}

async fn run(config: Config, quiet: bool) -> Result<()> {
    print_banner(&config, quiet);

    let stub = Arc::new(ForwardStub::new(config.resolver.stub_upstreams.clone()));

    // The chain-synced signal belongs to whoever supervises the root-zone
    // daemon; standalone, the root endpoint is assumed caught up.
    let resolver = Arc::new(
        Hip5ResolverBuilder::new(stub, config.resolver.root_addr, || true)
            .registry(RegistryBuilder::new().build())
            .min_rsa_key_size(config.dnssec.min_rsa_key_size)
            .build(),
    );

    let mut servers = Vec::new();
    for addr in &config.listeners.udp {
        let server = UdpServer::bind(*addr, resolver.clone())
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        servers.push(server);
    }

    for server in &servers {
        info!(addr = %server.local_addr(), "listening");
    }
    info!("quill resolver started");

    let handles: Vec<_> = servers
        .into_iter()
        .map(|server| tokio::spawn(async move { server.run().await }))
        .collect();

    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for shutdown signal")?;
    info!("shutting down");

    for handle in handles {
        handle.abort();
    }

    Ok(())
}

fn validate_config(path: Option<PathBuf>) -> Result<()> {
    let config_path = find_config_file(path).context("no configuration file found")?;
    println!("Validating configuration: {}", config_path.display());

    let config = Config::from_file(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    config
        .validate()
        .context("configuration validation failed")?;

    println!("{}", style("Configuration is valid").green().bold());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Version) => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some(Commands::Validate) => {
            return validate_config(cli.config);
        }
        _ => {}
    }

    let config = match find_config_file(cli.config.clone()) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => {
            if !cli.quiet {
                eprintln!(
                    "{}",
                    style("No configuration file found, using defaults").yellow()
                );
            }
            Config::default()
        }
    };
    config.validate().context("invalid configuration")?;

    init_logging(&config, cli.log_level.as_deref(), cli.quiet);
    run(config, cli.quiet).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_parsing() {
        assert_eq!(parse_log_level("trace"), Level::TRACE);
        assert_eq!(parse_log_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_log_level("warning"), Level::WARN);
        assert_eq!(parse_log_level("unknown"), Level::INFO);
    }

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["quill"]).unwrap();
        assert!(cli.config.is_none());
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["quill", "-c", "/etc/quill/quill.toml", "validate"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/quill/quill.toml")));
        assert!(matches!(cli.command, Some(Commands::Validate)));
    }
}
